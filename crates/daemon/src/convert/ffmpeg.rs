//! ffmpeg two-pass GIF conversion
//!
//! Each job runs ffmpeg twice: once to build a palette from the source, once
//! to map the source through that palette with the job's dither settings.
//! Arguments are passed as a list, never through a shell.

use super::toolkit::MediaToolkit;
use crate::variants::ConversionJob;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Palette artifact written next to the source, one per folder at a time.
pub const PALETTE_FILE_NAME: &str = "palette_temp.png";

/// The two ffmpeg passes of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeStep {
    PaletteGen,
    PaletteUse,
}

impl fmt::Display for TranscodeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscodeStep::PaletteGen => f.write_str("palette generation"),
            TranscodeStep::PaletteUse => f.write_str("palette application"),
        }
    }
}

/// Error type for conversion operations
#[derive(Debug, Error)]
pub enum ConvertError {
    /// ffmpeg exited with non-zero status
    #[error("ffmpeg {step} failed with exit code: {code}")]
    Failed { step: TranscodeStep, code: i32 },

    /// ffmpeg was terminated by signal
    #[error("ffmpeg {step} was terminated by signal")]
    Terminated { step: TranscodeStep },

    /// ffmpeg ran past the configured timeout and was killed
    #[error("ffmpeg {step} timed out after {secs}s")]
    TimedOut { step: TranscodeStep, secs: u64 },

    /// ffmpeg could not be started or waited on
    #[error("ffmpeg {step} IO error: {source}")]
    Io {
        step: TranscodeStep,
        #[source]
        source: std::io::Error,
    },
}

/// Map an ffmpeg exit status to a result.
pub fn check_status(step: TranscodeStep, status: ExitStatus) -> Result<(), ConvertError> {
    if status.success() {
        Ok(())
    } else {
        match status.code() {
            Some(code) => Err(ConvertError::Failed { step, code }),
            None => Err(ConvertError::Terminated { step }),
        }
    }
}

/// Palette artifact location for a source file.
pub fn palette_path(source: &Path) -> PathBuf {
    source.with_file_name(PALETTE_FILE_NAME)
}

/// Arguments for the palette generation pass.
///
/// `ffmpeg -i <source> -vf scale=<w>:-1:flags=lanczos,palettegen=stats_mode=<stat> -y <palette>`
pub fn palettegen_args(job: &ConversionJob, source: &Path, palette: &Path) -> Vec<OsString> {
    let filter = format!(
        "scale={}:-1:flags=lanczos,palettegen=stats_mode={}",
        job.width, job.stats_mode
    );

    vec![
        OsString::from("-i"),
        source.as_os_str().to_owned(),
        OsString::from("-vf"),
        OsString::from(filter),
        OsString::from("-y"),
        palette.as_os_str().to_owned(),
    ]
}

/// Arguments for the palette application pass.
///
/// Resamples to the job's fps and width, then dithers through the palette.
pub fn paletteuse_args(job: &ConversionJob, source: &Path, palette: &Path) -> Vec<OsString> {
    let filter = format!(
        "fps={},scale={}:-1:flags=lanczos[x];[x][1:v]paletteuse=dither={}:bayer_scale={}:diff_mode=rectangle",
        job.fps, job.width, job.dither, job.quality
    );

    vec![
        OsString::from("-i"),
        source.as_os_str().to_owned(),
        OsString::from("-i"),
        palette.as_os_str().to_owned(),
        OsString::from("-filter_complex"),
        OsString::from(filter),
        OsString::from("-y"),
        job.output_path.as_os_str().to_owned(),
    ]
}

/// Run both passes for one job and remove the palette afterwards.
///
/// The palette is removed whether or not the passes succeeded; failing to
/// remove it is logged only. The first failing pass is returned.
pub async fn execute_job<T: MediaToolkit>(
    tools: &T,
    job: &ConversionJob,
    source: &Path,
) -> Result<(), ConvertError> {
    let palette = palette_path(source);

    let result = async {
        tools
            .transcode(TranscodeStep::PaletteGen, &palettegen_args(job, source, &palette))
            .await?;
        tools
            .transcode(TranscodeStep::PaletteUse, &paletteuse_args(job, source, &palette))
            .await
    }
    .await;

    match std::fs::remove_file(&palette) {
        Ok(()) => debug!(palette = %palette.display(), "Removed palette"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(palette = %palette.display(), "No palette to remove")
        }
        Err(e) => warn!(palette = %palette.display(), error = %e, "Failed to remove palette"),
    }

    if result.is_ok() {
        info!(
            dither = %job.dither,
            quality = job.quality,
            output = %job.output_path.display(),
            "Created GIF"
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DitherMode;
    use crate::probe::{ProbeError, VideoProperties};
    use crate::variants::StatsMode;
    use proptest::prelude::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Helper to convert args to strings for easier testing
    fn to_strings(args: &[OsString]) -> Vec<String> {
        args.iter()
            .filter_map(|arg| arg.to_str().map(String::from))
            .collect()
    }

    /// Helper to check if args contain a flag with a specific value
    fn has_flag_with_value(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|pair| pair[0] == flag && pair[1] == value)
    }

    fn job(output: &Path) -> ConversionJob {
        ConversionJob {
            dither: DitherMode::Bayer,
            quality: 3,
            stats_mode: StatsMode::Diff,
            width: 480,
            fps: 15.0,
            output_path: output.to_path_buf(),
        }
    }

    /// Writes the last argument as a file unless the step is set to fail.
    struct ScriptedTools {
        fail_on: Option<TranscodeStep>,
        calls: Mutex<Vec<TranscodeStep>>,
    }

    impl ScriptedTools {
        fn new(fail_on: Option<TranscodeStep>) -> Self {
            Self {
                fail_on,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl MediaToolkit for ScriptedTools {
        async fn probe(&self, _path: &Path) -> Result<VideoProperties, ProbeError> {
            Ok(VideoProperties {
                width: 640,
                fps: 30.0,
            })
        }

        async fn transcode(&self, step: TranscodeStep, args: &[OsString]) -> Result<(), ConvertError> {
            self.calls.lock().unwrap().push(step);
            if self.fail_on == Some(step) {
                return Err(ConvertError::Failed { step, code: 1 });
            }
            let target = args.last().expect("output argument");
            fs::write(target, b"GIF89a").unwrap();
            Ok(())
        }
    }

    #[test]
    fn test_palette_lives_next_to_source() {
        assert_eq!(
            palette_path(Path::new("/in/sub/clip.mp4")),
            PathBuf::from("/in/sub/palette_temp.png")
        );
    }

    #[test]
    fn test_palettegen_args() {
        let args = to_strings(&palettegen_args(
            &job(Path::new("/in/clip_bayer.gif")),
            Path::new("/in/clip.mp4"),
            Path::new("/in/palette_temp.png"),
        ));

        assert!(has_flag_with_value(&args, "-i", "/in/clip.mp4"));
        assert!(has_flag_with_value(
            &args,
            "-vf",
            "scale=480:-1:flags=lanczos,palettegen=stats_mode=diff"
        ));
        assert!(has_flag_with_value(&args, "-y", "/in/palette_temp.png"));
        assert_eq!(args.last().unwrap(), "/in/palette_temp.png");
    }

    #[test]
    fn test_paletteuse_args() {
        let args = to_strings(&paletteuse_args(
            &job(Path::new("/in/clip_bayer.gif")),
            Path::new("/in/clip.mp4"),
            Path::new("/in/palette_temp.png"),
        ));

        assert_eq!(&args[0..4], ["-i", "/in/clip.mp4", "-i", "/in/palette_temp.png"]);
        assert!(has_flag_with_value(
            &args,
            "-filter_complex",
            "fps=15,scale=480:-1:flags=lanczos[x];[x][1:v]paletteuse=dither=bayer:bayer_scale=3:diff_mode=rectangle"
        ));
        assert_eq!(args.last().unwrap(), "/in/clip_bayer.gif");
    }

    // Paths with shell metacharacters stay single arguments.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_paths_are_passed_verbatim(name in "[a-zA-Z0-9 '\"$;&|_-]{1,30}") {
            let source = PathBuf::from(format!("/in/{}.mp4", name));
            let palette = palette_path(&source);
            let output = PathBuf::from(format!("/in/{}_bayer.gif", name));
            let job = job(&output);

            let gen = palettegen_args(&job, &source, &palette);
            let apply = paletteuse_args(&job, &source, &palette);

            prop_assert_eq!(gen.len(), 6);
            prop_assert_eq!(apply.len(), 8);
            prop_assert_eq!(&gen[1], source.as_os_str());
            prop_assert_eq!(&apply[1], source.as_os_str());
            prop_assert_eq!(&apply[3], palette.as_os_str());
            prop_assert_eq!(apply.last().unwrap(), output.as_os_str());
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_check_status_maps_exit_codes() {
        use std::os::unix::process::ExitStatusExt;

        assert!(check_status(TranscodeStep::PaletteGen, ExitStatus::from_raw(0)).is_ok());
        assert!(matches!(
            check_status(TranscodeStep::PaletteUse, ExitStatus::from_raw(1 << 8)),
            Err(ConvertError::Failed {
                step: TranscodeStep::PaletteUse,
                code: 1
            })
        ));
        // Raw status 9 = killed by SIGKILL, no exit code.
        assert!(matches!(
            check_status(TranscodeStep::PaletteGen, ExitStatus::from_raw(9)),
            Err(ConvertError::Terminated { .. })
        ));
    }

    #[tokio::test]
    async fn test_execute_job_success_removes_palette() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("clip.mp4");
        fs::write(&source, b"video").unwrap();
        let output = dir.path().join("clip_bayer.gif");

        let tools = ScriptedTools::new(None);
        execute_job(&tools, &job(&output), &source).await.unwrap();

        assert!(output.exists());
        assert!(!palette_path(&source).exists());
        assert_eq!(
            *tools.calls.lock().unwrap(),
            vec![TranscodeStep::PaletteGen, TranscodeStep::PaletteUse]
        );
    }

    #[tokio::test]
    async fn test_execute_job_palette_failure_skips_second_pass() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("clip.mp4");
        fs::write(&source, b"video").unwrap();
        let output = dir.path().join("clip_bayer.gif");

        let tools = ScriptedTools::new(Some(TranscodeStep::PaletteGen));
        let result = execute_job(&tools, &job(&output), &source).await;

        assert!(matches!(
            result,
            Err(ConvertError::Failed {
                step: TranscodeStep::PaletteGen,
                ..
            })
        ));
        assert_eq!(*tools.calls.lock().unwrap(), vec![TranscodeStep::PaletteGen]);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_execute_job_apply_failure_still_removes_palette() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("clip.mp4");
        fs::write(&source, b"video").unwrap();
        let output = dir.path().join("clip_bayer.gif");

        let tools = ScriptedTools::new(Some(TranscodeStep::PaletteUse));
        let result = execute_job(&tools, &job(&output), &source).await;

        assert!(result.is_err());
        assert!(!palette_path(&source).exists());
        assert!(!output.exists());
    }
}
