//! Command-line interface implementation

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::config::{find_config, load_config, merge_cli_overrides, CliOverrides, Config};
use crate::pipeline::{clean_dest, ExecutionPlan, Registry, Scheduler};
use crate::reload::ReloadHub;
use crate::server::{self, ServerOptions};
use crate::watch::{WatchOptions, WatchSession};

/// Exit codes
const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;
const EXIT_INVALID_ARGS: u8 = 2;

/// Pipewright - declarative asset pipelines with watch mode and live reload
#[derive(Parser)]
#[command(name = "pipewright")]
#[command(about = "Pipewright - build asset pipelines, watch sources, serve with live reload")]
#[command(version)]
pub struct Cli {
    /// Path to pipewright.toml (default: walk up from the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Clean the destination root, then run all pipelines in parallel
    Build {
        /// Override the source root
        #[arg(long)]
        src: Option<PathBuf>,

        /// Override the destination root
        #[arg(long)]
        dest: Option<PathBuf>,
    },
    /// Build, then watch sources and serve the output with live reload
    Watch {
        /// Override the source root
        #[arg(long)]
        src: Option<PathBuf>,

        /// Override the destination root
        #[arg(long)]
        dest: Option<PathBuf>,

        /// Dev server port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Delete the destination root
    Clean,
    /// Run a single named pipeline
    Run {
        /// Pipeline name as declared in pipewright.toml
        name: String,
    },
}

/// Run the CLI application
pub fn run() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let overrides = match &cli.command {
        Commands::Build { src, dest } => CliOverrides {
            src: src.clone(),
            dest: dest.clone(),
            port: None,
        },
        Commands::Watch { src, dest, port } => CliOverrides {
            src: src.clone(),
            dest: dest.clone(),
            port: *port,
        },
        _ => CliOverrides::default(),
    };

    let (config, project_root) = match load_project(&cli, &overrides) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    let registry = match Registry::from_config(&config, &project_root) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let dest_root = resolve_root(&config.project.dest, &project_root);

    match cli.command {
        Commands::Build { .. } => run_build(&registry, &dest_root),
        Commands::Watch { .. } => run_watch(registry, config, dest_root),
        Commands::Clean => run_clean(&dest_root),
        Commands::Run { name } => run_single(&registry, &dest_root, &name),
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Locate and load config, returning it with the project root.
fn load_project(cli: &Cli, overrides: &CliOverrides) -> Result<(Config, PathBuf), ExitCode> {
    let config_path = cli.config.clone().or_else(find_config);

    let (mut config, project_root) = match &config_path {
        Some(path) => {
            if cli.verbose {
                println!("Using config: {}", path.display());
            }
            let config = load_config(Some(path)).map_err(|e| {
                eprintln!("Error loading config: {}", e);
                ExitCode::from(EXIT_INVALID_ARGS)
            })?;
            let root = path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
            (config, root)
        }
        None => {
            if cli.verbose {
                println!("No pipewright.toml found, using defaults");
            }
            let root = std::env::current_dir().unwrap_or_default();
            (Config::default(), root)
        }
    };

    merge_cli_overrides(&mut config, overrides);
    Ok((config, project_root))
}

fn resolve_root(path: &std::path::Path, project_root: &std::path::Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

/// Execute the standard build plan: clean, then all pipelines in parallel.
fn run_build(registry: &Registry, dest_root: &std::path::Path) -> ExitCode {
    let scheduler = Scheduler::new(registry, dest_root);

    match scheduler.execute(&ExecutionPlan::build_all(registry)) {
        Ok(result) => {
            println!("{}", result.summary());
            // Per-file failures are warnings, not a failed build
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Build aborted: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run_clean(dest_root: &std::path::Path) -> ExitCode {
    match clean_dest(dest_root) {
        Ok(()) => {
            println!("Cleaned {}", dest_root.display());
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run_single(registry: &Registry, dest_root: &std::path::Path, name: &str) -> ExitCode {
    let scheduler = Scheduler::new(registry, dest_root);

    match scheduler.execute(&ExecutionPlan::single(name)) {
        Ok(result) => {
            println!("{}", result.summary());
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Build once, then watch and serve until interrupted.
fn run_watch(registry: Registry, config: Config, dest_root: PathBuf) -> ExitCode {
    let hub = ReloadHub::new();

    // Initial build; a partially failed build still enters watch mode so
    // fixes retrigger, but a failed clean leaves nothing to serve
    let scheduler = Scheduler::new(&registry, &dest_root).with_reload_hub(&hub);
    match scheduler.execute(&ExecutionPlan::build_all(&registry)) {
        Ok(result) => println!("{}", result.summary()),
        Err(e) => {
            eprintln!("Build aborted: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    }

    let registry = Arc::new(registry);
    let watch_options = WatchOptions {
        debounce: std::time::Duration::from_millis(config.watch.debounce_ms),
        clear_screen: config.watch.clear_screen,
    };

    let session =
        match WatchSession::start(Arc::clone(&registry), watch_options, Some(hub.clone())) {
            Ok(session) => session,
            Err(e) => {
                eprintln!("Watch error: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        };

    println!("Watching for changes. Press Ctrl+C to stop");

    let server_options = ServerOptions {
        dest_root,
        host: config.serve.host.clone(),
        port: config.serve.port,
    };
    let outcome = server::run_blocking(server_options, hub);

    // Ctrl+C resolved the server's shutdown future; let in-flight runs finish
    session.stop();

    match outcome {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Server error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
