//! Walker module for converting ready videos found under the watched roots.
//!
//! Each folder is listed once per pass; every video that settles within the
//! readiness timeout is converted into all planned variants, one job after
//! another, and deleted only when every job succeeded.

use crate::config::Config;
use crate::convert::{execute_job, ConvertError, MediaToolkit};
use crate::probe::ProbeError;
use crate::readiness::wait_until_ready;
use crate::variants::plan;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Video file extensions picked up by the walker (case-insensitive matching).
pub const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".avi", ".mkv", ".mov"];

/// Checks if a file has a video extension (case-insensitive).
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext_lower = format!(".{}", ext.to_lowercase());
            VIDEO_EXTENSIONS.contains(&ext_lower.as_str())
        })
        .unwrap_or(false)
}

/// Folder-level failures; the folder is skipped for this pass.
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("Failed to create folder {path}: {source}")]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to list folder {path}: {source}")]
    ListFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-file failures; the source is kept and retried next pass.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("Probe failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("Conversion failed: {0}")]
    Convert(#[from] ConvertError),

    #[error("No conversions planned; check dither_options")]
    NothingPlanned,
}

/// Outcome of one `process_folder` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderReport {
    /// Sources fully converted (and deleted, or already gone).
    pub converted: usize,
    /// Sources not ready before the timeout.
    pub abandoned: usize,
    /// Sources whose probe or conversion failed.
    pub failed: usize,
    /// Distinct GIF paths written, in job order.
    pub outputs: Vec<PathBuf>,
}

/// Outcome of one `walk_tree` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalkReport {
    pub folders: usize,
    pub folder_errors: usize,
    pub converted: usize,
    pub abandoned: usize,
    pub failed: usize,
    pub outputs: Vec<PathBuf>,
}

impl WalkReport {
    pub fn absorb(&mut self, folder: FolderReport) {
        self.folders += 1;
        self.converted += folder.converted;
        self.abandoned += folder.abandoned;
        self.failed += folder.failed;
        self.outputs.extend(folder.outputs);
    }

    pub fn merge(&mut self, other: WalkReport) {
        self.folders += other.folders;
        self.folder_errors += other.folder_errors;
        self.converted += other.converted;
        self.abandoned += other.abandoned;
        self.failed += other.failed;
        self.outputs.extend(other.outputs);
    }
}

/// Video files directly inside `dir`, sorted by name.
pub fn list_videos(dir: &Path) -> Result<Vec<PathBuf>, WalkError> {
    let entries = fs::read_dir(dir).map_err(|source| WalkError::ListFolder {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut videos: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_video_file(path))
        .collect();
    videos.sort();
    Ok(videos)
}

/// Probe, plan and run every job for one ready source.
///
/// Stops at the first failing job. Returns the distinct outputs written.
/// An empty plan is an error so the source is never deleted without output.
pub async fn convert_file<T: MediaToolkit>(
    source: &Path,
    config: &Config,
    tools: &T,
) -> Result<Vec<PathBuf>, FileError> {
    let props = tools.probe(source).await?;
    let jobs = plan(source, &props, config);
    debug!(
        source = %source.display(),
        width = props.width,
        fps = props.fps,
        jobs = jobs.len(),
        "Planned conversions"
    );

    if jobs.is_empty() {
        return Err(FileError::NothingPlanned);
    }

    let mut outputs: Vec<PathBuf> = Vec::with_capacity(jobs.len());
    for job in &jobs {
        execute_job(tools, job, source).await?;
        // Variants sharing a name overwrite the same file.
        if !outputs.contains(&job.output_path) {
            outputs.push(job.output_path.clone());
        }
    }
    Ok(outputs)
}

/// Remove a fully converted source. A source that is already gone is logged only.
pub fn delete_source(source: &Path) {
    match fs::remove_file(source) {
        Ok(()) => info!(path = %source.display(), "Deleted original video file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            error!(path = %source.display(), "Could not find source to delete")
        }
        Err(e) => error!(path = %source.display(), error = %e, "Failed to delete source"),
    }
}

/// Convert every ready video directly inside `dir`.
///
/// Creates `dir` when missing. Files are handled one at a time in name order.
pub async fn process_folder<T: MediaToolkit>(
    dir: &Path,
    config: &Config,
    tools: &T,
) -> Result<FolderReport, WalkError> {
    fs::create_dir_all(dir).map_err(|source| WalkError::CreateFolder {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut report = FolderReport::default();
    let readiness = &config.readiness;

    for source in list_videos(dir)? {
        if !source.is_file() {
            continue;
        }

        if !wait_until_ready(&source, readiness.timeout(), readiness.poll_interval()).await {
            report.abandoned += 1;
            continue;
        }

        info!(path = %source.display(), "Processing file");
        match convert_file(&source, config, tools).await {
            Ok(outputs) => {
                delete_source(&source);
                report.converted += 1;
                report.outputs.extend(outputs);
            }
            Err(e) => {
                error!(path = %source.display(), error = %e, "Keeping source after failed conversion");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Run `process_folder` on `root` and every directory below it.
///
/// Directories are visited in file-name order. A missing root is created.
pub async fn walk_tree<T: MediaToolkit>(root: &Path, config: &Config, tools: &T) -> WalkReport {
    let mut report = WalkReport::default();

    if !root.exists() {
        info!(root = %root.display(), "Creating missing root folder");
        match process_folder(root, config, tools).await {
            Ok(folder) => report.absorb(folder),
            Err(e) => {
                error!(error = %e, "Skipping root");
                report.folder_errors += 1;
            }
        }
        return report;
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable directory entry");
                report.folder_errors += 1;
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            continue;
        }

        match process_folder(entry.path(), config, tools).await {
            Ok(folder) => report.absorb(folder),
            Err(e) => {
                error!(error = %e, "Skipping folder");
                report.folder_errors += 1;
            }
        }
    }

    report
}
