//! Pipeline engine module for pipewright
//!
//! Provides the core build engine: named pipelines mapping source globs to
//! ordered transform chains, executed once or in parallel groups.
//!
//! # Overview
//!
//! The engine consists of:
//! - **Registry**: named, immutable pipeline specs in registration order
//! - **Executor**: per-pipeline glob resolution and transform-chain folding
//! - **Scheduler**: sequential/parallel plan execution with clean-first ordering

pub mod executor;
pub mod plan;
pub mod spec;
pub mod transform;

pub use executor::*;
pub use plan::*;
pub use spec::*;
pub use transform::*;
