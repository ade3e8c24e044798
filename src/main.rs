//! Pipewright - command-line asset pipeline builder with watch mode and live reload

use std::process::ExitCode;

use pipewright::cli;

fn main() -> ExitCode {
    cli::run()
}
