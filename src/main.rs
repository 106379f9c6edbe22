//! Eco build worker CLI
//!
//! Entry point for the `eco-build-worker` command-line tool.

use clap::{Parser, Subcommand};
use eco_build_worker::archive::list_entries;
use eco_build_worker::signal::ShutdownSignal;
use eco_build_worker::{
    digest_archive, ConfiguredBlobStore, ExitCode, HttpFetcher, HttpJobQueue, JobLoop, WorkerConfig,
};
use eco_classifier::PackageFilter;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "eco-build-worker")]
#[command(about = "Package build worker for the Elm package catalogue", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the job queue and build packages until it is empty
    Run {
        /// Path to the worker config file (default: eco-worker.toml if present)
        #[arg(long, short = 'c', env = "ECO_WORKER_CONFIG")]
        config: Option<PathBuf>,

        /// Job queue API root, overrides config and PACKAGE_API_ROOT
        #[arg(long)]
        api_root: Option<String>,

        /// Directory per-job scratch directories are created in
        #[arg(long)]
        work_dir: Option<PathBuf>,
    },

    /// Print the archive and contents digests of a zip as JSON
    Digest {
        /// Archive to hash
        zip: PathBuf,
    },

    /// Print the entries of a zip that belong to the package
    Filter {
        /// Archive to inspect
        zip: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Commands::Run {
            config,
            api_root,
            work_dir,
        } => run_worker(config, api_root, work_dir),
        Commands::Digest { zip } => run_digest(&zip),
        Commands::Filter { zip, json } => run_filter(&zip, json),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn exit(code: ExitCode) -> ! {
    process::exit(code.as_i32())
}

fn run_worker(config_path: Option<PathBuf>, api_root: Option<String>, work_dir: Option<PathBuf>) {
    let config = match load_config(config_path.as_deref(), api_root, work_dir) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Error loading config: {}", e);
            exit(ExitCode::Config);
        }
    };

    let blobs = match ConfiguredBlobStore::from_config(&config.storage) {
        Ok(blobs) => blobs,
        Err(e) => {
            tracing::error!("Error configuring blob storage: {}", e);
            exit(ExitCode::Config);
        }
    };

    let signal = ShutdownSignal::new();
    if let Err(e) = signal.install() {
        tracing::warn!(error = %e, "could not install signal handler, interrupts will not be graceful");
    }

    tracing::info!(
        api_root = %config.queue.api_root,
        work_dir = %config.workspace.work_dir.display(),
        "starting worker"
    );
    let job_loop = JobLoop::new(
        &config,
        HttpJobQueue::new(&config.queue.api_root),
        HttpFetcher::new(config.workspace.max_archive_bytes),
        blobs,
        signal.state(),
    );

    match job_loop.run() {
        Ok(_) => exit(ExitCode::Clean),
        Err(e) => {
            tracing::error!(error = %e, "worker stopped");
            exit(e.exit_code());
        }
    }
}

/// Defaults, then the config file, then environment, then CLI flags.
fn load_config(
    config_path: Option<&Path>,
    api_root: Option<String>,
    work_dir: Option<PathBuf>,
) -> Result<WorkerConfig, Box<dyn std::error::Error>> {
    let loaded = WorkerConfig::load(config_path)?;
    match &loaded.source {
        Some(source) => tracing::info!(
            path = %source.path.display(),
            sha256 = %source.digest,
            "loaded config file"
        ),
        None => tracing::info!("no config file, using built-in defaults"),
    }

    let mut config = loaded.config;
    config.apply_env(|key| std::env::var(key).ok());
    if let Some(api_root) = api_root {
        config.queue.api_root = api_root;
    }
    if let Some(work_dir) = work_dir {
        config.workspace.work_dir = work_dir;
    }
    config.validate()?;
    Ok(config)
}

fn run_digest(zip: &Path) {
    let digest = match digest_archive(zip) {
        Ok(digest) => digest,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(ExitCode::Fatal);
        }
    };
    match serde_json::to_string_pretty(&digest) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing digest: {}", e);
            exit(ExitCode::Fatal);
        }
    }
}

fn run_filter(zip: &Path, json: bool) {
    let entries = match list_entries(zip) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Error reading {}: {}", zip.display(), e);
            exit(ExitCode::Fatal);
        }
    };
    let filter = match PackageFilter::new() {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("Error building package filter: {}", e);
            exit(ExitCode::Fatal);
        }
    };

    let selected = filter.select(&entries);
    if json {
        match serde_json::to_string_pretty(&selected) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing entries: {}", e);
                exit(ExitCode::Fatal);
            }
        }
    } else {
        for entry in &selected {
            println!("{}", entry);
        }
    }
}
