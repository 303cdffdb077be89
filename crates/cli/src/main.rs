//! CLI entry point for Folder Stitch
//!
//! `run` stitches a single folder and waits for the result; `serve` exposes
//! the job endpoints over HTTP.

use clap::{Parser, Subcommand, ValueEnum};
use folder_stitch::{
    by_file_name, default_output_path, run_status_server, Config, JobOutcome, StitchRequest,
    Stitcher,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Folder Stitch - concatenate a folder of clips into one compilation
#[derive(Parser, Debug)]
#[command(name = "folder-stitch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (config.toml)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stitch every media file in a folder and wait for the result
    Run {
        /// Folder holding the clips
        folder: PathBuf,

        /// Compilation name
        #[arg(short, long, default_value = "test")]
        name: String,

        /// Output file (defaults to <folder>.<extension> next to the folder)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep the source clips after a successful stitch
        #[arg(long, default_value = "false")]
        keep_sources: bool,

        /// Input order
        #[arg(long, value_enum, default_value_t = Order::Modified)]
        order: Order,
    },
    /// Serve the job status API
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:7879")]
        addr: SocketAddr,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Order {
    /// Oldest modification time first
    Modified,
    /// File name
    Name,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("folder_stitch=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(env_filter)
            .init();
    }
}

async fn run(
    config: Config,
    folder: PathBuf,
    name: String,
    output: Option<PathBuf>,
    keep_sources: bool,
    order: Order,
) -> ExitCode {
    let output = output.unwrap_or_else(|| {
        let absolute = std::fs::canonicalize(&folder).unwrap_or_else(|_| folder.clone());
        default_output_path(&absolute, &name, &config.stitch.media_extension)
    });

    let mut request = StitchRequest::new(name, folder, output).cleanup_sources(!keep_sources);
    if order == Order::Name {
        request = request.with_comparator(by_file_name());
    }

    let stitcher = Stitcher::new(config);
    let submitted = match stitcher.submit(request) {
        Ok(submitted) => submitted,
        Err(e) => {
            error!(error = %e, "Stitch request rejected");
            return ExitCode::FAILURE;
        }
    };

    info!(output = %submitted.output.display(), "Stitching started");

    match submitted.handle.wait().await {
        JobOutcome::Completed(done) => {
            if !done.cleanup.is_clean() {
                warn!(
                    failed = done.cleanup.failed.len(),
                    "Some source videos could not be deleted"
                );
            }
            info!(output = %done.output.display(), "Done");
            ExitCode::SUCCESS
        }
        JobOutcome::Failed(e) => {
            error!(error = %e, "Stitch failed");
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: Config, addr: SocketAddr) -> ExitCode {
    let stitcher = Arc::new(Stitcher::new(config));

    if let Err(e) = run_status_server(stitcher, addr).await {
        error!(error = %e, "Status server error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing();

    let config = match Config::load_or_default(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!(config = %args.config.display(), error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    match args.command {
        Command::Run {
            folder,
            name,
            output,
            keep_sources,
            order,
        } => run(config, folder, name, output, keep_sources, order).await,
        Command::Serve { addr } => serve(config, addr).await,
    }
}
