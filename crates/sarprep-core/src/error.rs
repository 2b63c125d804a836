use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Every failure a pipeline stage can surface.
///
/// Precondition variants (`InvalidRatios`, `StagingMismatch`, `Config`) are
/// raised before any file is touched. Per-image failures are normally folded
/// into an [`ItemFailure`] by the stage and do not abort the batch.
#[derive(Debug, Error)]
pub enum PrepError {
    #[error("split ratios must sum to 1.0: train {train} + val {val} + test {test} = {sum}")]
    InvalidRatios { train: f64, val: f64, test: f64, sum: f64 },

    #[error("staging mismatch: {sar} SAR files but {masks} mask files")]
    StagingMismatch { sar: usize, masks: usize },

    #[error("{}: label {value} is outside the class set 0..=4 ({pixels} pixels)", .path.display())]
    InvalidLabel { path: PathBuf, value: u16, pixels: u64 },

    #[error("{}: {color:?} masks are not supported, expected one gray or palette channel", .path.display())]
    UnsupportedMask { path: PathBuf, color: image::ColorType },

    #[error("{}: image is {width}x{height}, too small to split into quadrants", .path.display())]
    TooSmall { path: PathBuf, width: usize, height: usize },

    #[error("{}: cannot decode image: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{}: cannot decode PNG: {source}", .path.display())]
    Png {
        path: PathBuf,
        #[source]
        source: png::DecodingError,
    },

    #[error("{}: cannot write image: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: cannot tell the split, expected exactly one of train/val/test", .0.display())]
    AmbiguousSplit(PathBuf),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PrepError>;

impl PrepError {
    /// Adapter for `map_err` that tags an I/O error with the path involved.
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> PrepError + '_ {
        move |source| PrepError::Io { path: path.to_path_buf(), source }
    }
}

/// A single image that failed inside a batch. The batch keeps going.
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl ItemFailure {
    pub fn new(path: impl Into<PathBuf>, err: &dyn std::fmt::Display) -> Self {
        Self { path: path.into(), reason: err.to_string() }
    }
}
