//! Watch mode: per-pipeline rebuilds on file changes
//!
//! Subscribes to filesystem change notifications with debouncing, maps each
//! debounced batch to the pipelines whose watch patterns match the changed
//! paths, and reruns exactly those pipelines. Concurrent changes to N
//! distinct pipelines trigger N independent runs; changes to a pipeline
//! with a run already in flight coalesce into one follow-up run.

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind, Debouncer};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::pipeline::{executor, Registry};
use crate::reload::{ReloadEvent, ReloadHub};

/// Error during watch mode setup
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WatchError {
    /// Failed to initialize the file watcher
    #[error("failed to initialize file watcher: {0}")]
    WatcherInit(notify::Error),
    /// Failed to subscribe a watch root
    #[error("failed to watch {}: {1}", .0.display())]
    WatchPath(PathBuf, notify::Error),
    /// A spec carries an invalid watch pattern
    #[error("invalid watch pattern '{0}': {1}")]
    Pattern(String, glob::PatternError),
    /// Nothing to watch
    #[error("no pipelines registered")]
    NoPipelines,
}

/// Options for watch mode
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Debounce window for coalescing change events
    pub debounce: Duration,
    /// Clear the terminal before each rebuild
    pub clear_screen: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self { debounce: Duration::from_millis(100), clear_screen: false }
    }
}

/// Per-pipeline in-flight bookkeeping.
///
/// `running` guards the at-most-one-concurrent-run-per-pipeline invariant;
/// `pending` records changes that arrived while a run was in flight.
#[derive(Debug, Default)]
struct RunState {
    running: bool,
    pending: bool,
}

/// An active watch subscription over a registry's pipelines.
///
/// Created by [`WatchSession::start`]; torn down by [`WatchSession::stop`]
/// or process exit. Stopping unsubscribes the watches and waits for
/// in-flight runs to finish rather than cancelling them, so no truncated
/// files are left on disk.
#[derive(Debug)]
pub struct WatchSession {
    debouncer: Option<Debouncer<RecommendedWatcher>>,
    event_loop: Option<JoinHandle<()>>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl WatchSession {
    /// Start watching every registered pipeline's watch patterns.
    pub fn start(
        registry: Arc<Registry>,
        options: WatchOptions,
        hub: Option<ReloadHub>,
    ) -> Result<Self, WatchError> {
        if registry.list_all().is_empty() {
            return Err(WatchError::NoPipelines);
        }

        // Precompile each pipeline's watch patterns
        let mut matchers: Vec<(String, Vec<glob::Pattern>)> = Vec::new();
        for spec in registry.list_all() {
            let mut patterns = Vec::with_capacity(spec.watch.len());
            for raw in &spec.watch {
                let pattern = glob::Pattern::new(raw)
                    .map_err(|e| WatchError::Pattern(raw.clone(), e))?;
                patterns.push(pattern);
            }
            matchers.push((spec.name.clone(), patterns));
        }

        let (tx, rx) = channel();
        let mut debouncer =
            new_debouncer(options.debounce, tx).map_err(WatchError::WatcherInit)?;

        for root in watch_roots(&registry) {
            if !root.exists() {
                tracing::warn!(root = %root.display(), "watch root does not exist, skipping");
                continue;
            }
            debouncer
                .watcher()
                .watch(&root, RecursiveMode::Recursive)
                .map_err(|e| WatchError::WatchPath(root.clone(), e))?;
            tracing::debug!(root = %root.display(), "watching");
        }

        let states: Arc<Mutex<HashMap<String, RunState>>> = Arc::new(Mutex::new(
            matchers.iter().map(|(name, _)| (name.clone(), RunState::default())).collect(),
        ));
        let workers: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::new(Mutex::new(Vec::new()));

        let loop_registry = Arc::clone(&registry);
        let loop_states = Arc::clone(&states);
        let loop_workers = Arc::clone(&workers);
        let event_loop = std::thread::spawn(move || {
            // Terminates when the debouncer (and its sender) is dropped
            while let Ok(batch) = rx.recv() {
                match batch {
                    Ok(events) => {
                        let changed: Vec<PathBuf> = events
                            .into_iter()
                            .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                            .map(|e| e.path)
                            .collect();
                        if changed.is_empty() {
                            continue;
                        }

                        for path in &changed {
                            if let Some(name) = path.file_name() {
                                println!(
                                    "[{}] Changed: {}",
                                    timestamp(),
                                    name.to_string_lossy()
                                );
                            }
                        }

                        for name in affected_pipelines(&matchers, &changed) {
                            schedule_run(
                                &loop_registry,
                                &loop_states,
                                &loop_workers,
                                &options,
                                hub.as_ref(),
                                name,
                            );
                        }
                    }
                    Err(error) => {
                        // Non-fatal; keep watching
                        tracing::warn!(?error, "watch error, continuing");
                    }
                }
            }
        });

        Ok(Self { debouncer: Some(debouncer), event_loop: Some(event_loop), workers })
    }

    /// Stop watching.
    ///
    /// Unsubscribes all watches and joins the event loop plus any in-flight
    /// pipeline runs.
    pub fn stop(mut self) {
        // Dropping the debouncer closes the event channel
        self.debouncer.take();
        if let Some(handle) = self.event_loop.take() {
            let _ = handle.join();
        }

        let handles: Vec<_> = match self.workers.lock() {
            Ok(mut workers) => workers.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for handle in handles {
            let _ = handle.join();
        }
    }
}

/// Names of pipelines whose watch patterns match any changed path.
fn affected_pipelines(
    matchers: &[(String, Vec<glob::Pattern>)],
    changed: &[PathBuf],
) -> Vec<String> {
    matchers
        .iter()
        .filter(|(_, patterns)| {
            changed
                .iter()
                .any(|path| patterns.iter().any(|p| p.matches_path(path)))
        })
        .map(|(name, _)| name.clone())
        .collect()
}

/// Directories to subscribe, derived from the literal prefixes of all
/// watch patterns.
fn watch_roots(registry: &Registry) -> BTreeSet<PathBuf> {
    let mut roots = BTreeSet::new();
    for spec in registry.list_all() {
        for pattern in &spec.watch {
            roots.insert(literal_prefix(Path::new(pattern)));
        }
    }

    // Keep only the outermost roots; recursive watches cover descendants
    let mut outer: BTreeSet<PathBuf> = BTreeSet::new();
    for root in roots {
        if !outer.iter().any(|o| root.starts_with(o)) {
            outer.insert(root);
        }
    }
    outer
}

/// The leading components of a pattern that contain no glob metacharacters.
fn literal_prefix(pattern: &Path) -> PathBuf {
    let mut prefix = PathBuf::new();
    for component in pattern.components() {
        let part = component.as_os_str().to_string_lossy();
        if part.contains(['*', '?', '[']) {
            break;
        }
        prefix.push(component);
    }
    // A file pattern's last literal component is the file itself
    if prefix == Path::new(pattern) {
        if let Some(parent) = prefix.parent() {
            return parent.to_path_buf();
        }
    }
    prefix
}

/// Rerun one pipeline, or mark a follow-up if a run is already in flight.
fn schedule_run(
    registry: &Arc<Registry>,
    states: &Arc<Mutex<HashMap<String, RunState>>>,
    workers: &Arc<Mutex<Vec<JoinHandle<()>>>>,
    options: &WatchOptions,
    hub: Option<&ReloadHub>,
    name: String,
) {
    {
        let mut states = match states.lock() {
            Ok(states) => states,
            Err(_) => return,
        };
        let state = states.entry(name.clone()).or_default();
        if state.running {
            state.pending = true;
            return;
        }
        state.running = true;
    }

    let registry = Arc::clone(registry);
    let states = Arc::clone(states);
    let hub = hub.cloned();
    let clear = options.clear_screen;

    let handle = std::thread::spawn(move || loop {
        if clear {
            clear_screen();
        }

        if let Some(spec) = registry.get(&name) {
            println!("[{}] Rebuilding {}...", timestamp(), name);
            match executor::run(spec) {
                Ok(result) => {
                    println!("[{}] {}", timestamp(), result.summary());
                    for (meta, error) in &result.failed {
                        eprintln!(
                            "[{}] Error in {}: {}",
                            timestamp(),
                            meta.source_path.display(),
                            error
                        );
                    }
                    if let Some(hub) = &hub {
                        // Notify even after a partially failed run so the
                        // browser shows the current output state
                        hub.emit(ReloadEvent::from_result(&result));
                    }
                }
                Err(error) => {
                    eprintln!("[{}] Pipeline {} failed: {}", timestamp(), name, error);
                }
            }
        }

        let run_again = {
            let mut states = match states.lock() {
                Ok(states) => states,
                Err(_) => return,
            };
            match states.get_mut(&name) {
                Some(state) if state.pending => {
                    state.pending = false;
                    true
                }
                Some(state) => {
                    state.running = false;
                    false
                }
                None => false,
            }
        };
        if !run_again {
            break;
        }
    });

    if let Ok(mut workers) = workers.lock() {
        workers.push(handle);
    }
}

/// Clear the terminal screen
fn clear_screen() {
    print!("\x1B[2J\x1B[1;1H");
}

/// Current wall-clock time for log lines
pub(crate) fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400;
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
