//! Execution plans and the scheduler.
//!
//! A plan is an ordered list of steps; a step either cleans the destination
//! root, runs one named pipeline, or fans a group of pipelines out across
//! threads. Sequential steps run to completion before the next step starts.
//!
//! The scheduler's one ordering invariant: a clean step runs to completion
//! (or fails the whole plan) before any later step writes into the cleaned
//! root. A failing pipeline inside a parallel group never cancels its
//! siblings; failure isolation at pipeline granularity mirrors the
//! executor's per-file isolation.

use crate::pipeline::executor::{self, ExecutionResult, PipelineError};
use crate::pipeline::spec::{PipelineSpec, Registry};
use crate::reload::{ReloadEvent, ReloadHub};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Error that aborts an entire plan.
///
/// Nothing is built on top of a destination root left in an undefined state.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FatalError {
    /// The clean step could not delete the destination root
    #[error("failed to clean {}: {1}", .0.display())]
    Clean(PathBuf, std::io::Error),
    /// A plan step names a pipeline the registry does not know
    #[error("unknown pipeline '{0}'")]
    UnknownPipeline(String),
}

/// One step of an execution plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStep {
    /// Delete the destination root
    Clean,
    /// Run a single named pipeline
    Single(String),
    /// Run a group of pipelines concurrently, waiting for all of them
    Parallel(Vec<String>),
}

/// Ordered composition of steps over registered pipeline names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Steps, executed in order
    pub steps: Vec<PlanStep>,
}

impl ExecutionPlan {
    /// The standard build plan: clean, then every pipeline in parallel.
    pub fn build_all(registry: &Registry) -> Self {
        Self { steps: vec![PlanStep::Clean, PlanStep::Parallel(registry.names())] }
    }

    /// A plan running one named pipeline, without cleaning.
    pub fn single(name: &str) -> Self {
        Self { steps: vec![PlanStep::Single(name.to_string())] }
    }

    /// A plan that only cleans the destination root.
    pub fn clean_only() -> Self {
        Self { steps: vec![PlanStep::Clean] }
    }
}

/// Outcome of one pipeline within an aggregate run.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// Pipeline name
    pub name: String,
    /// Execution result, or the pipeline-level error that prevented the run
    pub result: Result<ExecutionResult, PipelineError>,
}

impl PipelineOutcome {
    /// True when the pipeline ran and no file failed.
    pub fn is_success(&self) -> bool {
        matches!(&self.result, Ok(r) if r.is_success())
    }
}

/// Result of executing a whole plan.
#[derive(Debug, Default)]
pub struct AggregateResult {
    /// Per-pipeline outcomes in completion-recording order
    pub outcomes: Vec<PipelineOutcome>,
    /// Total wall-clock duration
    pub total_duration: Duration,
}

impl AggregateResult {
    /// True when every pipeline ran without any file failure.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.is_success())
    }

    /// Total count of files that failed a transform stage.
    pub fn failed_file_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(|r| r.failed.len())
            .sum()
    }

    /// Multi-line human summary.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(result) => lines.push(format!("  {}", result.summary())),
                Err(e) => lines.push(format!("  {}: pipeline error: {}", outcome.name, e)),
            }
        }
        let status = if self.is_success() { "completed" } else { "completed with errors" };
        lines.push(format!("Build {} in {:.0?}", status, self.total_duration));
        lines.join("\n")
    }
}

/// Executes plans against a registry.
pub struct Scheduler<'a> {
    registry: &'a Registry,
    dest_root: PathBuf,
    hub: Option<&'a ReloadHub>,
}

impl<'a> Scheduler<'a> {
    /// Create a scheduler over a registry and the project destination root.
    pub fn new(registry: &'a Registry, dest_root: impl Into<PathBuf>) -> Self {
        Self { registry, dest_root: dest_root.into(), hub: None }
    }

    /// Notify a reload hub after each pipeline completion.
    pub fn with_reload_hub(mut self, hub: &'a ReloadHub) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Execute a plan.
    ///
    /// Returns `Err` only for fatal conditions (clean failure, unknown
    /// pipeline name); per-file and per-pipeline failures are recorded in
    /// the aggregate result.
    pub fn execute(&self, plan: &ExecutionPlan) -> Result<AggregateResult, FatalError> {
        let start = Instant::now();
        let mut aggregate = AggregateResult::default();

        // Fail fast on unknown names before any destructive step runs
        for step in &plan.steps {
            let names: &[String] = match step {
                PlanStep::Clean => &[],
                PlanStep::Single(name) => std::slice::from_ref(name),
                PlanStep::Parallel(names) => names,
            };
            for name in names {
                if self.registry.get(name).is_none() {
                    return Err(FatalError::UnknownPipeline(name.clone()));
                }
            }
        }

        for step in &plan.steps {
            match step {
                PlanStep::Clean => clean_dest(&self.dest_root)?,
                PlanStep::Single(name) => {
                    aggregate.outcomes.push(self.run_spec(self.lookup(name)?));
                }
                PlanStep::Parallel(names) => {
                    let specs = names
                        .iter()
                        .map(|n| self.lookup(n))
                        .collect::<Result<Vec<_>, _>>()?;
                    aggregate.outcomes.extend(self.run_group(&specs));
                }
            }
        }

        aggregate.total_duration = start.elapsed();
        Ok(aggregate)
    }

    fn lookup(&self, name: &str) -> Result<&PipelineSpec, FatalError> {
        self.registry
            .get(name)
            .ok_or_else(|| FatalError::UnknownPipeline(name.to_string()))
    }

    fn run_spec(&self, spec: &PipelineSpec) -> PipelineOutcome {
        let result = executor::run(spec);
        if let (Some(hub), Ok(execution)) = (self.hub, &result) {
            hub.emit(ReloadEvent::from_result(execution));
        }
        PipelineOutcome { name: spec.name.clone(), result }
    }

    /// Fan a group out across scoped threads and wait for every member.
    fn run_group(&self, specs: &[&PipelineSpec]) -> Vec<PipelineOutcome> {
        if specs.len() <= 1 {
            return specs.iter().map(|s| self.run_spec(s)).collect();
        }

        std::thread::scope(|scope| {
            let handles: Vec<_> = specs
                .iter()
                .map(|spec| scope.spawn(move || self.run_spec(spec)))
                .collect();

            // A worker only terminates by returning its outcome
            handles.into_iter().filter_map(|h| h.join().ok()).collect()
        })
    }
}

/// Delete the destination root, if it exists.
pub fn clean_dest(dest_root: &Path) -> Result<(), FatalError> {
    match fs::remove_dir_all(dest_root) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FatalError::Clean(dest_root.to_path_buf(), e)),
    }
}
