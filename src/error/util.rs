//! Utility functions for error handling
//!
//! Path checks that produce errors carrying the offending path, so a failed
//! stage reports which input it could not use.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{FaceAgeError, Result};

/// Open a file for reading, attaching the path to any failure
///
/// # Arguments
/// * `path` - The path to the file to open
/// * `purpose` - Why the file is being opened (for error context)
pub fn safe_open_file(path: &Path, purpose: &str) -> Result<fs::File> {
    if !path.is_file() {
        log::error!("Cannot open {} needed for {purpose}", path.display());
        return Err(FaceAgeError::io_at(
            io::Error::new(io::ErrorKind::NotFound, format!("file needed for {purpose} not found")),
            path,
        ));
    }

    fs::File::open(path).map_err(|e| {
        let context = match e.kind() {
            io::ErrorKind::PermissionDenied => "permission denied - check file permissions".to_string(),
            _ => format!("failed to open file for {purpose}"),
        };
        FaceAgeError::io_at(io::Error::new(e.kind(), format!("{context}: {e}")), path)
    })
}

/// Create (truncate) a file for writing, creating parent directories first
pub fn safe_create_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| FaceAgeError::io_at(e, parent))?;
    }
    fs::File::create(path).map_err(|e| FaceAgeError::io_at(e, path))
}

/// Check that a directory exists and is readable
pub fn validate_directory(path: &Path, purpose: &str) -> Result<()> {
    if !path.is_dir() {
        return Err(FaceAgeError::io_at(
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory needed for {purpose} not found"),
            ),
            path,
        ));
    }

    fs::read_dir(path)
        .map(|_| ())
        .map_err(|e| FaceAgeError::io_at(e, path))
}
