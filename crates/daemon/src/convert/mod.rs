//! Conversion of one source video into GIF variants

pub mod ffmpeg;
pub mod toolkit;

pub use ffmpeg::{
    execute_job, palette_path, palettegen_args, paletteuse_args, ConvertError, TranscodeStep,
    PALETTE_FILE_NAME,
};
pub use toolkit::{FfmpegToolkit, MediaToolkit};
