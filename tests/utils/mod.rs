use std::path::{Path, PathBuf};

use arrow::record_batch::RecordBatch;
use faceage::clinical::table::table_from_rows;
use faceage::dataset::Dataset;
use image::{ImageFormat, Rgb, RgbImage};
use ndarray::{Array1, Array4};

/// Fresh scratch directory under the system temp dir
#[must_use]
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("faceage-{name}-{}", std::process::id()));
    if dir.exists() {
        std::fs::remove_dir_all(&dir).unwrap();
    }
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Dataset with `count` samples per age, images `size × size`
///
/// Pixel `[0, 0, 0]` of each image holds its row index (mod 256) and
/// pixel `[0, 0, 1]` holds its age, so images can be traced back.
#[must_use]
pub fn synthetic_dataset(classes: &[(i64, usize)], size: usize) -> Dataset {
    let labels: Vec<i64> = classes
        .iter()
        .flat_map(|&(age, count)| std::iter::repeat_n(age, count))
        .collect();
    let n = labels.len();
    let images = Array4::from_shape_fn((n, size, size, 3), |(i, y, x, c)| match (y, x, c) {
        (0, 0, 0) => (i % 256) as u8,
        (0, 0, 1) => labels[i] as u8,
        _ => 128,
    });
    Dataset::new(images, Array1::from(labels)).unwrap()
}

/// Clinical columns using the default curation column names
pub const CLINICAL_COLUMNS: [&str; 8] = [
    "pmrn",
    "photo_date",
    "start_date",
    "Tx Start",
    "Last Oncology F/u",
    "Date of Death",
    "DOB",
    "Curative_Intent",
];

/// A clinical row that passes every criterion unless overridden
#[must_use]
pub fn valid_clinical_row(pmrn: &'static str) -> Vec<Option<&'static str>> {
    vec![
        Some(pmrn),
        Some("2015-03-01"),
        Some("2015-03-10"),
        Some("2015-03-12"),
        Some("2017-03-10"),
        None,
        Some("1960-03-01"),
        Some("1"),
    ]
}

#[must_use]
pub fn clinical_table(rows: &[Vec<Option<&str>>]) -> RecordBatch {
    table_from_rows(&CLINICAL_COLUMNS, rows).unwrap()
}

/// Write a mid-grey image in the given format
pub fn write_image(path: &Path, width: u32, height: u32, format: ImageFormat) {
    RgbImage::from_pixel(width, height, Rgb([120, 110, 100]))
        .save_with_format(path, format)
        .unwrap();
}
