//! Startup checks module
//!
//! Verifies that the external tools are callable before the first scan:
//! - ffmpeg responds to `-version`
//! - ffprobe responds to `-version`

use crate::config::ToolsConfig;
use std::path::Path;
use std::process::Command;
use thiserror::Error;
use tracing::info;

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{tool} not available: {reason}")]
    ToolUnavailable { tool: &'static str, reason: String },
}

/// Extract the version token from `<tool> -version` output.
///
/// Handles release ("ffmpeg version 6.1.1 ...") and git builds
/// ("ffmpeg version n8.0-12-g... ..."), returning the token as printed.
pub fn parse_tool_version(version_output: &str, tool: &str) -> Option<String> {
    let marker = format!("{} version", tool);

    let version_line = version_output
        .lines()
        .find(|line| line.to_lowercase().contains(&marker))?;

    version_line
        .to_lowercase()
        .split(&marker)
        .nth(1)?
        .split_whitespace()
        .next()
        .map(str::to_string)
}

/// Run `<program> -version` and return the reported version token.
pub fn check_tool_available(program: &Path, tool: &'static str) -> Result<String, StartupError> {
    let output = Command::new(program)
        .arg("-version")
        .output()
        .map_err(|e| StartupError::ToolUnavailable {
            tool,
            reason: format!(
                "{} -version failed; is it installed and in PATH? Error: {}",
                program.display(),
                e
            ),
        })?;

    if !output.status.success() {
        return Err(StartupError::ToolUnavailable {
            tool,
            reason: format!("{} -version exited with {}", program.display(), output.status),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_tool_version(&stdout, tool).unwrap_or_else(|| "unknown".to_string()))
}

/// Run all startup checks in order: ffmpeg, then ffprobe.
pub fn run_startup_checks(tools: &ToolsConfig) -> Result<(), StartupError> {
    let ffmpeg_version = check_tool_available(&tools.ffmpeg, "ffmpeg")?;
    info!(path = %tools.ffmpeg.display(), version = %ffmpeg_version, "Found ffmpeg");

    let ffprobe_version = check_tool_available(&tools.ffprobe, "ffprobe")?;
    info!(path = %tools.ffprobe.display(), version = %ffprobe_version, "Found ffprobe");

    Ok(())
}
