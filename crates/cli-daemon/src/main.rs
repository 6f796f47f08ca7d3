//! CLI entry point for the GIF batch daemon
//!
//! Parses command line arguments, sets up logging and starts the daemon.

use clap::Parser;
use gif_batch_daemon::{Config, Daemon, DaemonError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// GIF batch daemon - converts finished videos in watched folders into GIFs
#[derive(Parser, Debug)]
#[command(name = "gif-batch-daemon")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (config.toml)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Skip startup checks (ffmpeg, ffprobe). For testing only.
    #[arg(long, default_value = "false")]
    skip_checks: bool,

    /// Run a single scan and exit
    #[arg(long, default_value = "false")]
    once: bool,

    /// Enable debug logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let default = if verbose {
        "gif_batch_daemon=debug,warn"
    } else {
        "gif_batch_daemon=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn init_daemon(args: &Args) -> Result<Daemon, DaemonError> {
    if args.skip_checks {
        warn!("Skipping startup checks (--skip-checks enabled)");
        let config = Config::load(&args.config)?;
        Ok(Daemon::new_without_checks(config))
    } else {
        Daemon::new(&args.config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging(args.verbose);

    info!(config = %args.config.display(), "GIF batch daemon starting");

    let daemon = match init_daemon(&args) {
        Ok(daemon) => daemon,
        Err(e) => {
            error!("Failed to initialize daemon: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if daemon.config.root_paths.is_empty() {
        warn!("No root_paths configured; scans will do nothing");
    }

    if args.once {
        daemon.scan_once().await;
        return ExitCode::SUCCESS;
    }

    // First Ctrl-C lets the current scan finish; a second one exits at once.
    let handle = daemon.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        info!("Interrupt received, stopping after the current scan");
        handle.stop();

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Second interrupt received, exiting immediately");
            std::process::exit(130);
        }
    });

    let runs = daemon.run().await;
    info!(runs, "Daemon stopped");

    ExitCode::SUCCESS
}
