//! Batch face extraction over an image directory
//!
//! Every file is validated before detection: the content must really be a
//! JPEG (the extension is not trusted) and larger than the configured minimum
//! dimension. A file that fails validation, cannot be decoded, trips the
//! detector or holds no face is skipped with a log line; the batch goes on.

use std::fmt;
use std::path::{Path, PathBuf};

use image::{ImageFormat, ImageReader, RgbImage};
use itertools::Itertools;
use log::{debug, info, warn};

use super::detector::FaceDetector;
use super::localizer::{Localization, crop_first_face};
use crate::clinical::LinkedPhoto;
use crate::config::ExtractionConfig;
use crate::error::Result;
use crate::error::util::validate_directory;
use crate::utils::logging::{create_main_progress_bar, finish_progress_bar, log_skipped_photo};

/// Why a file produced no face crop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// File does not exist
    Missing,
    /// Content is not JPEG, whatever the extension says
    NotJpeg(Option<ImageFormat>),
    /// Width or height below the minimum
    TooSmall { width: u32, height: u32 },
    /// I/O or decode failure
    Unreadable(String),
    /// Detector raised an error on this file
    DetectorFailed(String),
    /// Detector found no face
    NoFace,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "file not found"),
            Self::NotJpeg(Some(format)) => write!(f, "not a JPEG ({format:?})"),
            Self::NotJpeg(None) => write!(f, "not a JPEG (unknown format)"),
            Self::TooSmall { width, height } => write!(f, "image too small ({width}x{height})"),
            Self::Unreadable(e) => write!(f, "unreadable image: {e}"),
            Self::DetectorFailed(e) => write!(f, "face detector failed: {e}"),
            Self::NoFace => write!(f, "no face detected"),
        }
    }
}

/// Outcome for one input file, in input order
#[derive(Debug, Clone, PartialEq)]
pub struct FileStatus {
    pub id: String,
    pub path: PathBuf,
    /// `None` when a face was extracted
    pub skipped: Option<SkipReason>,
}

impl FileStatus {
    #[must_use]
    pub const fn face_found(&self) -> bool {
        self.skipped.is_none()
    }
}

/// Faces extracted from a batch of files
///
/// `faces`, `face_flags` and `kept_ids` are parallel and contain kept files
/// only, in input order. `statuses` covers every input.
#[derive(Debug, Clone, Default)]
pub struct BatchExtraction {
    pub faces: Vec<RgbImage>,
    pub face_flags: Vec<bool>,
    pub kept_ids: Vec<String>,
    pub statuses: Vec<FileStatus>,
}

impl BatchExtraction {
    /// Number of files skipped for any reason
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.statuses.iter().filter(|s| !s.face_found()).count()
    }
}

/// Decode a file after checking its real format and size
fn load_validated(path: &Path, min_dimension: u32) -> std::result::Result<RgbImage, SkipReason> {
    if !path.is_file() {
        return Err(SkipReason::Missing);
    }
    let reader = ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|e| SkipReason::Unreadable(e.to_string()))?;
    match reader.format() {
        Some(ImageFormat::Jpeg) => {}
        other => return Err(SkipReason::NotJpeg(other)),
    }
    let image = reader
        .decode()
        .map_err(|e| SkipReason::Unreadable(e.to_string()))?
        .to_rgb8();
    let (width, height) = image.dimensions();
    if width < min_dimension || height < min_dimension {
        return Err(SkipReason::TooSmall { width, height });
    }
    Ok(image)
}

/// Extract one face per file from `(id, path)` pairs
pub fn extract_faces<D: FaceDetector + ?Sized>(
    files: &[(String, PathBuf)],
    detector: &mut D,
    config: &ExtractionConfig,
) -> BatchExtraction {
    let total = files.len();
    let pb = create_main_progress_bar(total as u64, Some("Extracting faces"));
    let mut out = BatchExtraction::default();

    for (i, (id, path)) in files.iter().enumerate() {
        pb.set_message(format!("FILE: {id}"));
        debug!("Processing file {} of {total}, FILE: {id}", i + 1);

        let outcome = load_validated(path, config.min_dimension).and_then(|image| {
            let detections = detector
                .detect(&image)
                .map_err(|e| SkipReason::DetectorFailed(e.to_string()))?;
            match crop_first_face(&image, &detections, config.required_size) {
                Localization::Found(face) => Ok(face),
                Localization::NoFace => Err(SkipReason::NoFace),
            }
        });

        let skipped = match outcome {
            Ok(face) => {
                out.faces.push(face);
                out.face_flags.push(true);
                out.kept_ids.push(id.clone());
                None
            }
            Err(reason) => {
                log_skipped_photo(id, &reason, path);
                Some(reason)
            }
        };
        out.statuses.push(FileStatus {
            id: id.clone(),
            path: path.clone(),
            skipped,
        });
        pb.inc(1);
    }

    finish_progress_bar(&pb, Some("Face extraction complete"));
    info!(
        "Extracted {} faces from {total} files ({} skipped)",
        out.faces.len(),
        out.skipped()
    );
    out
}

/// Extract faces for every regular file in a directory, in file-name order
pub fn extract_faces_from_directory<D: FaceDetector + ?Sized>(
    directory: &Path,
    detector: &mut D,
    config: &ExtractionConfig,
) -> Result<BatchExtraction> {
    validate_directory(directory, "face extraction")?;
    let files = std::fs::read_dir(directory)
        .map_err(|e| crate::error::FaceAgeError::io_at(e, directory))?
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!("Failed to read directory entry in {}: {e}", directory.display());
                None
            }
        })
        .filter(|path| path.is_file())
        .sorted()
        .map(|path| {
            let id = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            (id, path)
        })
        .collect_vec();

    Ok(extract_faces(&files, detector, config))
}

/// Extract faces for linked photos stored as `<directory>/<photo_id>.<ext>`
pub fn extract_faces_for_photos<D: FaceDetector + ?Sized>(
    directory: &Path,
    photos: &[LinkedPhoto],
    detector: &mut D,
    config: &ExtractionConfig,
) -> Result<BatchExtraction> {
    validate_directory(directory, "face extraction")?;
    let files = photos
        .iter()
        .map(|photo| {
            let path = directory.join(format!("{}.{}", photo.photo_id, config.image_extension));
            (photo.photo_id.clone(), path)
        })
        .collect_vec();
    Ok(extract_faces(&files, detector, config))
}
