//! Error handling for the face-age pipeline.
//!
//! Record-level exclusions and file-level skips are not errors; they are
//! reported as data (see [`crate::clinical::ExclusionReason`] and
//! [`crate::imaging::SkipReason`]). This type covers the failures that stop
//! a whole stage: unreadable inputs, malformed tables, bad parameters.

pub mod util;

use std::io;
use std::path::{Path, PathBuf};

use arrow::error::ArrowError;
use ndarray_npy::{ReadNpzError, WriteNpzError};
use parquet::errors::ParquetError;

/// Specialized error type for the pipeline
#[derive(Debug, thiserror::Error)]
pub enum FaceAgeError {
    /// Error opening or reading a file
    #[error("IO error{}: {source}", path_suffix(.path))]
    Io {
        #[source]
        source: io::Error,
        path: Option<PathBuf>,
    },

    /// Error processing Arrow data
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error reading or writing Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Error decoding or encoding an image
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Error reading a compressed array container
    #[error("NPZ read error: {0}")]
    NpzRead(#[from] ReadNpzError),

    /// Error writing a compressed array container
    #[error("NPZ write error: {0}")]
    NpzWrite(#[from] WriteNpzError),

    /// Array shapes that do not line up
    #[error("Shape error: {0}")]
    Shape(String),

    /// Out-of-range or inconsistent parameter
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    /// A required table column is absent
    #[error("Missing column '{0}'")]
    MissingColumn(String),

    /// A date string that none of the configured formats accepts
    #[error("Could not parse date '{0}'")]
    DateParse(String),

    /// Configuration file problems
    #[error("Configuration error: {0}")]
    Config(String),

    /// Face detector could not be created or run
    #[error("Face detector error: {0}")]
    Detector(String),
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" ({})", p.display()))
        .unwrap_or_default()
}

impl From<io::Error> for FaceAgeError {
    fn from(source: io::Error) -> Self {
        Self::Io { source, path: None }
    }
}

impl From<ndarray::ShapeError> for FaceAgeError {
    fn from(error: ndarray::ShapeError) -> Self {
        Self::Shape(error.to_string())
    }
}

impl From<serde_json::Error> for FaceAgeError {
    fn from(error: serde_json::Error) -> Self {
        Self::Config(error.to_string())
    }
}

impl FaceAgeError {
    /// I/O error tied to the file it happened on
    pub fn io_at(source: io::Error, path: &Path) -> Self {
        Self::Io {
            source,
            path: Some(path.to_path_buf()),
        }
    }

    pub fn invalid_parameter(name: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
        }
    }

    pub fn missing_column(name: impl Into<String>) -> Self {
        Self::MissingColumn(name.into())
    }

    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape(message.into())
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, FaceAgeError>;
