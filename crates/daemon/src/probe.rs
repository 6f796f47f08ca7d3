//! Probe module for reading native video properties.
//!
//! Runs ffprobe against a source file and extracts the width and average
//! frame rate of its video stream. The frame rate arrives as a rational
//! string such as `30000/1001` and is parsed strictly, never evaluated.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tokio::process::Command;

/// Error type for probe operations.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// ffprobe command failed to execute.
    #[error("ffprobe failed: {0}")]
    FfprobeFailed(String),

    /// Failed to parse ffprobe JSON output.
    #[error("Failed to parse ffprobe output: {0}")]
    ParseError(String),

    /// Frame rate was not of the form `<integer>/<integer>`.
    #[error("Invalid frame rate '{0}'")]
    InvalidFrameRate(String),

    /// IO error during probe.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A frame rate as reported by ffprobe, e.g. `24/1` or `30000/1001`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    pub numerator: u64,
    pub denominator: u64,
}

impl FrameRate {
    /// Frames per second as a float.
    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl FromStr for FrameRate {
    type Err = ProbeError;

    /// Accepts exactly `<integer>/<integer>`. Zero on either side is rejected
    /// since ffprobe reports `0/0` for streams without a known rate.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProbeError::InvalidFrameRate(s.to_string());

        let (num, den) = s.trim().split_once('/').ok_or_else(invalid)?;
        let is_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !is_digits(num) || !is_digits(den) {
            return Err(invalid());
        }

        let numerator: u64 = num.parse().map_err(|_| invalid())?;
        let denominator: u64 = den.parse().map_err(|_| invalid())?;
        if numerator == 0 || denominator == 0 {
            return Err(invalid());
        }

        Ok(FrameRate {
            numerator,
            denominator,
        })
    }
}

/// Native properties of a source video, read once per file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct VideoProperties {
    /// Width in pixels.
    pub width: u32,
    /// Average frame rate.
    pub fps: f64,
}

/// Raw ffprobe JSON structures for parsing.
mod ffprobe_json {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct FfprobeOutput {
        pub streams: Option<Vec<Stream>>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Stream {
        pub codec_type: Option<String>,
        pub width: Option<u32>,
        pub avg_frame_rate: Option<String>,
    }
}

/// Probes a video file using ffprobe.
///
/// Runs `ffprobe -v quiet -print_format json -show_format -show_streams <path>`
/// and parses the JSON output.
pub async fn probe_file(ffprobe: &Path, path: &Path) -> Result<VideoProperties, ProbeError> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProbeError::FfprobeFailed(format!(
            "ffprobe exited with status {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_ffprobe_output(&stdout)
}

/// Parses ffprobe JSON output into VideoProperties.
///
/// Uses the first stream tagged as video, or the first stream when none is tagged.
pub fn parse_ffprobe_output(json_str: &str) -> Result<VideoProperties, ProbeError> {
    let ffprobe: ffprobe_json::FfprobeOutput =
        serde_json::from_str(json_str).map_err(|e| ProbeError::ParseError(e.to_string()))?;

    let streams = ffprobe.streams.unwrap_or_default();
    let stream = streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .or_else(|| streams.first())
        .ok_or_else(|| ProbeError::ParseError("No streams in ffprobe output".to_string()))?;

    let width = stream
        .width
        .filter(|w| *w > 0)
        .ok_or_else(|| ProbeError::ParseError("Video stream has no width".to_string()))?;

    let rate = stream
        .avg_frame_rate
        .as_deref()
        .ok_or_else(|| ProbeError::ParseError("Video stream has no avg_frame_rate".to_string()))?
        .parse::<FrameRate>()?;

    Ok(VideoProperties {
        width,
        fps: rate.as_f64(),
    })
}
