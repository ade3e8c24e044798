//! Pipewright - declarative asset pipeline builder
//!
//! This library provides functionality to:
//! - Declare named file pipelines (source globs + transform chains) in TOML
//! - Run pipelines once, sequentially or in parallel, with per-file error isolation
//! - Watch source trees and rerun only the affected pipeline on change
//! - Serve the built output with live reload pushed to connected browsers

pub mod cli;
pub mod config;
pub mod pipeline;
pub mod reload;
pub mod server;
pub mod transforms;
pub mod watch;
