//! External media tools behind a trait so the pipeline can run without ffmpeg

use super::ffmpeg::{check_status, ConvertError, TranscodeStep};
use crate::config::ToolsConfig;
use crate::probe::{probe_file, ProbeError, VideoProperties};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error};

/// Probe and transcode collaborators used by the walker.
#[allow(async_fn_in_trait)]
pub trait MediaToolkit {
    /// Read width and frame rate of a source video.
    async fn probe(&self, path: &Path) -> Result<VideoProperties, ProbeError>;

    /// Run one ffmpeg pass with the given arguments.
    async fn transcode(&self, step: TranscodeStep, args: &[OsString]) -> Result<(), ConvertError>;
}

/// ffmpeg/ffprobe processes.
#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    /// Kill ffmpeg after this long; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl FfmpegToolkit {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            ffmpeg: tools.ffmpeg.clone(),
            ffprobe: tools.ffprobe.clone(),
            timeout: tools.timeout(),
        }
    }

    fn command_line(&self, args: &[OsString]) -> String {
        let mut line = self.ffmpeg.display().to_string();
        for arg in args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

impl MediaToolkit for FfmpegToolkit {
    async fn probe(&self, path: &Path) -> Result<VideoProperties, ProbeError> {
        probe_file(&self.ffprobe, path).await
    }

    async fn transcode(&self, step: TranscodeStep, args: &[OsString]) -> Result<(), ConvertError> {
        debug!(%step, command = %self.command_line(args), "Running ffmpeg");

        let mut child = Command::new(&self.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ConvertError::Io { step, source })?;

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    if let Err(e) = child.kill().await {
                        error!(%step, error = %e, "Failed to kill timed out ffmpeg");
                    }
                    error!(%step, command = %self.command_line(args), "ffmpeg timed out");
                    return Err(ConvertError::TimedOut {
                        step,
                        secs: limit.as_secs(),
                    });
                }
            },
            None => child.wait().await,
        }
        .map_err(|source| ConvertError::Io { step, source })?;

        check_status(step, status).map_err(|e| {
            error!(%step, command = %self.command_line(args), error = %e, "ffmpeg failed");
            e
        })
    }
}
