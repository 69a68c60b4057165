//! Log lines for files the pipeline loads and saves

use std::fmt::Display;
use std::path::Path;
use std::time::Duration;

/// Kind of file on disk, which decides the unit counted in log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    /// CSV or Parquet record table
    Table,
    /// Labelled `.npz` training archive
    Archive,
    /// Unlabelled `.npz` of extracted faces
    FaceCrops,
}

impl Artifact {
    const fn noun(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Archive => "archive",
            Self::FaceCrops => "face crop archive",
        }
    }

    const fn unit(self) -> &'static str {
        match self {
            Self::Table => "rows",
            Self::Archive => "samples",
            Self::FaceCrops => "faces",
        }
    }
}

pub fn log_loading(artifact: Artifact, path: &Path) {
    log::debug!("Loading {} {}", artifact.noun(), path.display());
}

/// `Loaded 1200 samples from archive data.npz in 35ms`
pub fn log_loaded(artifact: Artifact, path: &Path, count: usize, elapsed: Duration) {
    log::info!(
        "Loaded {count} {} from {} {} in {elapsed:?}",
        artifact.unit(),
        artifact.noun(),
        path.display()
    );
}

pub fn log_saved(artifact: Artifact, path: &Path, count: usize) {
    log::info!(
        "Saved {count} {} to {} {}",
        artifact.unit(),
        artifact.noun(),
        path.display()
    );
}

/// A photo left out of a batch
pub fn log_skipped_photo(id: &str, reason: &dyn Display, path: &Path) {
    log::warn!("Skipping photo {id} ({reason}): {}", path.display());
}
