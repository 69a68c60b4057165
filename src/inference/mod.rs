//! Face-age prediction boundary
//!
//! The regression network itself lives outside this crate. Anything that
//! maps a standardised `N×H×W×3` batch to `N` ages can implement
//! [`AgeRegressor`]; this module prepares the input and attaches the output
//! to a record table.

use std::sync::Arc;

use arrow::array::{ArrayRef, Float32Array, RecordBatch};
use log::{debug, info};
use ndarray::{Array1, Array4, ArrayView4, Axis, Zip, concatenate};

use crate::clinical::table::append_columns;
use crate::error::{FaceAgeError, Result};

/// Column holding predicted ages
pub const FACE_AGE_COLUMN: &str = "face age";

/// Model predicting an age per standardised image
pub trait AgeRegressor {
    /// One age per image of `batch`
    fn predict(&mut self, batch: ArrayView4<'_, f32>) -> Result<Array1<f32>>;
}

impl<F> AgeRegressor for F
where
    F: FnMut(ArrayView4<'_, f32>) -> Result<Array1<f32>>,
{
    fn predict(&mut self, batch: ArrayView4<'_, f32>) -> Result<Array1<f32>> {
        self(batch)
    }
}

/// Scale every image to zero mean and unit variance over all its pixels
///
/// Constant images map to all zeros.
#[must_use]
pub fn standardize(images: ArrayView4<'_, u8>) -> Array4<f32> {
    let mut out = images.mapv(f32::from);
    for mut sample in out.axis_iter_mut(Axis(0)) {
        let n = sample.len() as f32;
        if n == 0.0 {
            continue;
        }
        let mean = sample.sum() / n;
        let variance = sample.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
        let std = variance.sqrt();
        let scale = if std > 0.0 { std } else { 1.0 };
        sample.mapv_inplace(|v| (v - mean) / scale);
    }
    out
}

/// Predict ages in batches of `batch_size`
pub fn predict_ages<M: AgeRegressor + ?Sized>(
    model: &mut M,
    images: ArrayView4<'_, u8>,
    batch_size: usize,
) -> Result<Array1<f32>> {
    if batch_size == 0 {
        return Err(FaceAgeError::invalid_parameter("batch_size", 0));
    }
    let total = images.len_of(Axis(0));
    let mut predictions = Vec::new();
    for (i, chunk) in images.axis_chunks_iter(Axis(0), batch_size).enumerate() {
        debug!("Predicting batch {} ({} images)", i + 1, chunk.len_of(Axis(0)));
        let input = standardize(chunk);
        let ages = model.predict(input.view())?;
        if ages.len() != chunk.len_of(Axis(0)) {
            return Err(FaceAgeError::shape(format!(
                "model returned {} ages for {} images",
                ages.len(),
                chunk.len_of(Axis(0))
            )));
        }
        predictions.push(ages);
    }
    if predictions.is_empty() {
        return Ok(Array1::zeros(0));
    }
    let views: Vec<_> = predictions.iter().map(Array1::view).collect();
    let ages = concatenate(Axis(0), &views)?;
    info!("Predicted face age for {total} images");
    Ok(ages)
}

/// Mean absolute difference between predicted and reference ages
pub fn mean_absolute_error(predicted: &Array1<f32>, reference: &Array1<i64>) -> Result<f64> {
    if predicted.len() != reference.len() {
        return Err(FaceAgeError::shape(format!(
            "{} predictions for {} labels",
            predicted.len(),
            reference.len()
        )));
    }
    if predicted.is_empty() {
        return Ok(0.0);
    }
    let mut sum = 0.0f64;
    Zip::from(predicted).and(reference).for_each(|&p, &r| {
        sum += (f64::from(p) - r as f64).abs();
    });
    Ok(sum / predicted.len() as f64)
}

/// Append predicted ages to a table with one row per image
pub fn attach_face_age(table: &RecordBatch, ages: &Array1<f32>) -> Result<RecordBatch> {
    if table.num_rows() != ages.len() {
        return Err(FaceAgeError::shape(format!(
            "{} table rows but {} predicted ages",
            table.num_rows(),
            ages.len()
        )));
    }
    let column: ArrayRef = Arc::new(Float32Array::from_iter_values(ages.iter().copied()));
    append_columns(table, vec![(FACE_AGE_COLUMN, column)])
}
