//! Compressed `.npz` containers for datasets
//!
//! Images are stored under `arr_0` and labels under `arr_1`, the names
//! numpy gives positional arrays. Entries are matched with or without the
//! `.npy` suffix so files from either writer load.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Instant;

use ndarray::{Array1, Array4};
use ndarray_npy::{NpzReader, NpzWriter, ReadNpzError};

use super::Dataset;
use crate::error::util::{safe_create_file, safe_open_file};
use crate::error::{FaceAgeError, Result};
use crate::utils::logging::{Artifact, log_loaded, log_loading, log_saved};

/// Entry holding the `N×H×W×3` image array
pub const IMAGES_KEY: &str = "arr_0";
/// Entry holding the `N` age labels
pub const LABELS_KEY: &str = "arr_1";

type Reader = NpzReader<BufReader<File>>;

fn open(path: &Path) -> Result<Reader> {
    let file = safe_open_file(path, "npz archive")?;
    Ok(NpzReader::new(BufReader::new(file))?)
}

/// Archive entry names that may hold `key`, exact match first
fn candidate_names(names: &[String], key: &str) -> Vec<String> {
    let suffixed = format!("{key}.npy");
    let mut candidates: Vec<String> = names
        .iter()
        .filter(|n| n.as_str() == key || *n == &suffixed)
        .cloned()
        .collect();
    candidates.sort_by_key(|n| n.as_str() != key);
    if !candidates.iter().any(|n| n == key) {
        candidates.push(key.to_string());
    }
    candidates
}

/// Read one entry, trying every spelling of its name
fn read_entry<T>(
    npz: &mut Reader,
    key: &str,
    read: impl Fn(&mut Reader, &str) -> std::result::Result<T, ReadNpzError>,
) -> Result<T> {
    let names = npz.names()?;
    let mut last_error = None;
    for name in candidate_names(&names, key) {
        match read(npz, &name) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = Some(e),
        }
    }
    Err(match last_error {
        Some(e) => e.into(),
        None => FaceAgeError::missing_column(key),
    })
}

/// Labels as integer ages; float labels are floored
fn read_labels(npz: &mut Reader) -> Result<Array1<i64>> {
    read_entry(npz, LABELS_KEY, |npz, name| {
        npz.by_name::<_, ndarray::Ix1>(name)
            .or_else(|_| {
                npz.by_name::<ndarray::OwnedRepr<i32>, ndarray::Ix1>(name)
                    .map(|a| a.mapv(i64::from))
            })
            .or_else(|_| {
                npz.by_name::<ndarray::OwnedRepr<f64>, ndarray::Ix1>(name)
                    .map(|a| a.mapv(|v| v.floor() as i64))
            })
            .or_else(|_| {
                npz.by_name::<ndarray::OwnedRepr<f32>, ndarray::Ix1>(name)
                    .map(|a| a.mapv(|v| v.floor() as i64))
            })
    })
}

fn read_images_from(npz: &mut Reader) -> Result<Array4<u8>> {
    read_entry(npz, IMAGES_KEY, |npz, name| npz.by_name(name))
}

/// Load images and labels from one archive
pub fn read_dataset(path: &Path) -> Result<Dataset> {
    let start = Instant::now();
    log_loading(Artifact::Archive, path);
    let mut npz = open(path)?;
    let images = read_images_from(&mut npz)?;
    let labels = read_labels(&mut npz)?;
    let dataset = Dataset::new(images, labels)?;
    log_loaded(Artifact::Archive, path, dataset.len(), start.elapsed());
    Ok(dataset)
}

/// Load several archives and concatenate them in the given order
pub fn read_datasets<P: AsRef<Path>>(paths: &[P]) -> Result<Dataset> {
    let parts = paths
        .iter()
        .map(|p| read_dataset(p.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    if parts.len() == 1 {
        return parts
            .into_iter()
            .next()
            .ok_or_else(|| FaceAgeError::shape("no input archives"));
    }
    Dataset::concat(&parts)
}

/// Load only the image array of an archive
pub fn read_images(path: &Path) -> Result<Array4<u8>> {
    let mut npz = open(path)?;
    read_images_from(&mut npz)
}

/// Write images and labels to a compressed archive
pub fn write_dataset(path: &Path, dataset: &Dataset) -> Result<()> {
    let file = safe_create_file(path)?;
    let mut npz = NpzWriter::new_compressed(BufWriter::new(file));
    npz.add_array(IMAGES_KEY, &dataset.images())?;
    npz.add_array(LABELS_KEY, &dataset.labels())?;
    npz.finish()?;
    log_saved(Artifact::Archive, path, dataset.len());
    Ok(())
}

/// Write an unlabelled image array (face extraction output)
pub fn write_images(path: &Path, images: &Array4<u8>) -> Result<()> {
    let file = safe_create_file(path)?;
    let mut npz = NpzWriter::new_compressed(BufWriter::new(file));
    npz.add_array(IMAGES_KEY, images)?;
    npz.finish()?;
    log_saved(Artifact::FaceCrops, path, images.len_of(ndarray::Axis(0)));
    Ok(())
}
