//! Variant planning: which GIFs to render for one source video.
//!
//! Every configured dither mode is expanded over its quality range and the
//! palette statistics modes, in a fixed order so repeated runs write the
//! same outputs in the same sequence.

use crate::config::{Config, DitherMode, OutputNaming};
use crate::probe::VideoProperties;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// Frame sampling strategy for palette generation (`palettegen=stats_mode=`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatsMode {
    /// Weight colors from the parts of frames that change.
    Diff,
}

impl StatsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatsMode::Diff => "diff",
        }
    }
}

impl fmt::Display for StatsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stats modes rendered for every (dither, quality) pair.
pub const STATS_MODES: &[StatsMode] = &[StatsMode::Diff];

/// Quality values (`bayer_scale`) tried for a dither mode.
///
/// Bayer gets two scales; every other mode a single value.
pub fn quality_range(dither: DitherMode) -> RangeInclusive<u32> {
    match dither {
        DitherMode::Bayer => 2..=3,
        _ => 1..=1,
    }
}

/// One GIF to render.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionJob {
    pub dither: DitherMode,
    pub quality: u32,
    pub stats_mode: StatsMode,
    /// Output width; height follows the aspect ratio.
    pub width: u32,
    pub fps: f64,
    pub output_path: PathBuf,
}

/// Output path for a variant, next to the source.
pub fn output_path(source: &Path, dither: DitherMode, quality: u32, naming: OutputNaming) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let file_name = match naming {
        OutputNaming::Dither => format!("{}_{}.gif", stem, dither),
        OutputNaming::DitherQuality => format!("{}_{}_q{}.gif", stem, dither, quality),
    };

    source.with_file_name(file_name)
}

/// Enumerate the jobs for `source`.
///
/// Ordered by configured dither mode, then ascending quality, then stats mode.
pub fn plan(source: &Path, props: &VideoProperties, config: &Config) -> Vec<ConversionJob> {
    let width = config.width.unwrap_or(props.width);
    let fps = config.fps.unwrap_or(props.fps);

    let mut jobs = Vec::new();
    for &dither in &config.dither_options {
        for quality in quality_range(dither) {
            for &stats_mode in STATS_MODES {
                jobs.push(ConversionJob {
                    dither,
                    quality,
                    stats_mode,
                    width,
                    fps,
                    output_path: output_path(source, dither, quality, config.output_naming),
                });
            }
        }
    }
    jobs
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn props() -> VideoProperties {
        VideoProperties {
            width: 640,
            fps: 30.0,
        }
    }

    fn config_with(dithers: &[DitherMode]) -> Config {
        Config {
            dither_options: dithers.to_vec(),
            ..Config::default()
        }
    }

    #[test]
    fn test_bayer_and_none_yield_three_jobs_in_order() {
        let config = config_with(&[DitherMode::Bayer, DitherMode::None]);
        let jobs = plan(Path::new("/in/clip.mp4"), &props(), &config);

        let summary: Vec<(DitherMode, u32)> = jobs.iter().map(|j| (j.dither, j.quality)).collect();
        assert_eq!(
            summary,
            vec![
                (DitherMode::Bayer, 2),
                (DitherMode::Bayer, 3),
                (DitherMode::None, 1),
            ]
        );
        assert!(jobs.iter().all(|j| j.stats_mode == StatsMode::Diff));
    }

    #[test]
    fn test_single_floyd_steinberg_job_uses_native_properties() {
        let config = config_with(&[DitherMode::FloydSteinberg]);
        let jobs = plan(Path::new("/in/clip.mp4"), &props(), &config);

        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.dither, DitherMode::FloydSteinberg);
        assert_eq!(job.quality, 1);
        assert_eq!(job.stats_mode.as_str(), "diff");
        assert_eq!(job.width, 640);
        assert!((job.fps - 30.0).abs() < 1e-9);
        assert_eq!(job.output_path, PathBuf::from("/in/clip_floyd_steinberg.gif"));
    }

    #[test]
    fn test_overrides_replace_native_properties() {
        let mut config = config_with(&[DitherMode::Sierra2_4a]);
        config.width = Some(320);
        config.fps = Some(12.5);

        let jobs = plan(Path::new("/in/clip.mov"), &props(), &config);

        assert_eq!(jobs[0].width, 320);
        assert!((jobs[0].fps - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_bayer_variants_share_output_path_by_default() {
        let config = config_with(&[DitherMode::Bayer]);
        let jobs = plan(Path::new("/in/clip.mp4"), &props(), &config);

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].output_path, jobs[1].output_path);
        assert_eq!(jobs[0].output_path, PathBuf::from("/in/clip_bayer.gif"));
    }

    #[test]
    fn test_quality_naming_keeps_bayer_variants_apart() {
        let mut config = config_with(&[DitherMode::Bayer, DitherMode::None]);
        config.output_naming = OutputNaming::DitherQuality;

        let paths: Vec<PathBuf> = plan(Path::new("/in/clip.mp4"), &props(), &config)
            .into_iter()
            .map(|j| j.output_path)
            .collect();

        assert_eq!(
            paths,
            vec![
                PathBuf::from("/in/clip_bayer_q2.gif"),
                PathBuf::from("/in/clip_bayer_q3.gif"),
                PathBuf::from("/in/clip_none_q1.gif"),
            ]
        );
    }

    #[test]
    fn test_output_path_strips_only_last_extension() {
        let path = output_path(
            Path::new("/in/holiday.2024.MKV"),
            DitherMode::Atkinson,
            1,
            OutputNaming::Dither,
        );
        assert_eq!(path, PathBuf::from("/in/holiday.2024_atkinson.gif"));
    }

    #[test]
    fn test_no_dither_options_means_no_jobs() {
        let jobs = plan(Path::new("/in/clip.mp4"), &props(), &Config::default());
        assert!(jobs.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_plan_is_deterministic_and_ordered(
            dithers in prop::collection::vec(prop::sample::select(DitherMode::ALL.to_vec()), 0..6),
            width in 1u32..4096,
            fps in 1u32..120,
        ) {
            let config = config_with(&dithers);
            let props = VideoProperties { width, fps: fps as f64 };
            let source = Path::new("/media/drop/clip.mp4");

            let first = plan(source, &props, &config);
            let second = plan(source, &props, &config);
            prop_assert_eq!(&first, &second);

            let expected_len: usize = dithers
                .iter()
                .map(|d| quality_range(*d).count() * STATS_MODES.len())
                .sum();
            prop_assert_eq!(first.len(), expected_len);

            // Dither modes appear in configured order with ascending quality.
            let mut cursor = 0;
            for dither in &dithers {
                for quality in quality_range(*dither) {
                    prop_assert_eq!(first[cursor].dither, *dither);
                    prop_assert_eq!(first[cursor].quality, quality);
                    cursor += STATS_MODES.len();
                }
            }
        }
    }
}
