//! GIF batch daemon
//!
//! Background service that watches directory trees for finished video files
//! and converts each into dithered GIF variants with ffmpeg.

pub mod convert;
pub mod daemon;
pub mod probe;
pub mod readiness;
pub mod scheduler;
pub mod startup;
pub mod variants;
pub mod walker;

pub use gif_batch_daemon_config as config;
pub use gif_batch_daemon_config::Config;
pub use convert::{execute_job, ConvertError, FfmpegToolkit, MediaToolkit, TranscodeStep};
pub use daemon::{Daemon, DaemonError};
pub use probe::{parse_ffprobe_output, probe_file, FrameRate, ProbeError, VideoProperties};
pub use readiness::wait_until_ready;
pub use scheduler::{Scheduler, SchedulerHandle};
pub use startup::{run_startup_checks, StartupError};
pub use variants::{plan, ConversionJob, StatsMode};
pub use walker::{process_folder, walk_tree, FileError, FolderReport, WalkError, WalkReport};
