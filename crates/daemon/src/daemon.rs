//! Daemon startup and main loop for the GIF batch daemon
//!
//! Provides the daemon entry point, startup sequence, and the scheduled scan.

use crate::config::{Config, ConfigError};
use crate::convert::{FfmpegToolkit, MediaToolkit};
use crate::scheduler::{Scheduler, SchedulerHandle};
use crate::startup::{run_startup_checks, StartupError};
use crate::walker::{walk_tree, WalkReport};
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tracing::info;

/// Error type for daemon operations
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Startup check failed
    #[error("Startup check failed: {0}")]
    Startup(#[from] StartupError),
}

/// Daemon state containing all runtime components
pub struct Daemon<T = FfmpegToolkit> {
    /// Configuration loaded from file and environment
    pub config: Config,
    /// Probe and transcode collaborators
    pub tools: T,
    scheduler: Scheduler,
}

impl Daemon<FfmpegToolkit> {
    /// Initialize the daemon with configuration from file
    ///
    /// This performs the full startup sequence:
    /// 1. Load config from file
    /// 2. Apply environment overrides and validate
    /// 3. Run startup checks (ffmpeg, ffprobe)
    pub fn new<P: AsRef<Path>>(config_path: P) -> Result<Self, DaemonError> {
        let config = Config::load(config_path)?;
        Self::with_config(config)
    }

    /// Initialize the daemon with an existing configuration
    pub fn with_config(config: Config) -> Result<Self, DaemonError> {
        run_startup_checks(&config.tools)?;
        Ok(Self::new_without_checks(config))
    }

    /// Initialize the daemon without running startup checks
    ///
    /// Useful for testing when ffmpeg and ffprobe are not available.
    pub fn new_without_checks(config: Config) -> Self {
        let tools = FfmpegToolkit::new(&config.tools);
        Self::with_tools(config, tools)
    }
}

impl<T: MediaToolkit> Daemon<T> {
    /// Initialize the daemon with custom media tools
    pub fn with_tools(config: Config, tools: T) -> Self {
        let scheduler = Scheduler::new(config.schedule_period());
        Self {
            config,
            tools,
            scheduler,
        }
    }

    /// Handle for stopping `run` from elsewhere (e.g. a signal handler)
    pub fn shutdown_handle(&self) -> SchedulerHandle {
        self.scheduler.handle()
    }

    /// Walk every configured root once, one root after another
    pub async fn scan_once(&self) -> WalkReport {
        let started = Instant::now();
        let mut report = WalkReport::default();

        for root in &self.config.root_paths {
            report.merge(walk_tree(root, &self.config, &self.tools).await);
        }

        info!(
            roots = self.config.root_paths.len(),
            folders = report.folders,
            converted = report.converted,
            gifs = report.outputs.len(),
            abandoned = report.abandoned,
            failed = report.failed,
            folder_errors = report.folder_errors,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scan finished"
        );

        report
    }

    /// Run scans on the configured interval until stopped
    ///
    /// A scan that outlasts the interval delays the next one.
    pub async fn run(&self) -> u64 {
        info!(
            interval_minutes = self.config.schedule_interval,
            roots = self.config.root_paths.len(),
            "Starting batch conversion"
        );

        self.scheduler
            .run(move || async move {
                self.scan_once().await;
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DitherMode, ReadinessConfig};
    use crate::convert::{ConvertError, TranscodeStep};
    use crate::probe::{ProbeError, VideoProperties};
    use std::ffi::OsString;
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    struct WritingTools;

    impl MediaToolkit for WritingTools {
        async fn probe(&self, _path: &Path) -> Result<VideoProperties, ProbeError> {
            Ok(VideoProperties {
                width: 320,
                fps: 24.0,
            })
        }

        async fn transcode(&self, _step: TranscodeStep, args: &[OsString]) -> Result<(), ConvertError> {
            let target = args.last().expect("output argument");
            fs::write(target, b"GIF89a").unwrap();
            Ok(())
        }
    }

    fn create_test_config(roots: Vec<PathBuf>) -> Config {
        Config {
            root_paths: roots,
            dither_options: vec![DitherMode::Bayer, DitherMode::None],
            readiness: ReadinessConfig {
                timeout_secs: 5.0,
                poll_interval_secs: 0.01,
            },
            ..Config::default()
        }
    }

    #[test]
    fn test_daemon_initialization_without_checks() {
        let config = create_test_config(vec![PathBuf::from("/srv/in")]);
        let daemon = Daemon::new_without_checks(config.clone());

        assert_eq!(daemon.config, config);
        assert_eq!(daemon.tools.ffmpeg, PathBuf::from("ffmpeg"));
        assert_eq!(daemon.scheduler.period(), Duration::from_secs(120));
    }

    #[test]
    fn test_new_with_missing_config_fails() {
        let result = Daemon::new("/definitely/not/here/config.toml");
        assert!(matches!(result, Err(DaemonError::Config(_))));
    }

    #[tokio::test]
    async fn test_scan_once_walks_every_root() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();
        fs::write(first.join("one.mp4"), b"video").unwrap();
        fs::write(second.join("two.avi"), b"video").unwrap();

        let daemon = Daemon::with_tools(
            create_test_config(vec![first.clone(), second.clone()]),
            WritingTools,
        );
        let report = daemon.scan_once().await;

        assert_eq!(report.converted, 2);
        // bayer variants share one file, plus none, per source
        assert_eq!(report.outputs.len(), 4);
        assert!(first.join("one_bayer.gif").exists());
        assert!(first.join("one_none.gif").exists());
        assert!(second.join("two_bayer.gif").exists());
        assert!(!first.join("one.mp4").exists());
        assert!(!second.join("two.avi").exists());
    }

    #[tokio::test]
    async fn test_run_stops_on_handle() {
        let dir = TempDir::new().unwrap();
        let daemon = Daemon::with_tools(create_test_config(vec![dir.path().to_path_buf()]), WritingTools);
        let handle = daemon.shutdown_handle();
        handle.stop();

        assert_eq!(daemon.run().await, 0);
    }
}
