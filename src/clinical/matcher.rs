//! Record matching between the photo log and the clinical database
//!
//! Two steps:
//!
//! 1. [`link_photo_log`] keeps the photo-log rows that carry both a photo
//!    identifier and a treatment start date.
//! 2. [`join_clinical`] pairs the resulting record log with the clinical
//!    database on the patient record number (`pmrn`).

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, StringArray, UInt64Array};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use itertools::Itertools;
use log::{info, warn};
use rustc_hash::FxHashMap;

use super::dates::parse_date_string;
use super::table::{column_strings, drop_column, take_rows};
use crate::config::{DateFormatConfig, PhotoLogColumns};
use crate::error::{FaceAgeError, Result};

/// Column names of the record log produced after face extraction
pub mod record_log {
    pub const ORIGINAL_INDEX: &str = "original_index";
    pub const PMRN: &str = "pmrn";
    pub const PHOTO_ID: &str = "photo_id";
    pub const PHOTO_DATE: &str = "photo_date";
    pub const START_DATE: &str = "start_date";
    pub const FACE_FLAG: &str = "face flag";
}

/// One photo-log row that can be linked to a patient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedPhoto {
    /// Row number in the raw photo log
    pub original_index: usize,
    pub pmrn: String,
    pub photo_id: String,
    /// Photo creation date as exported (parsed later during curation)
    pub photo_date: Option<String>,
    pub start_date: NaiveDate,
}

/// Keep photo-log rows with a photo id and a parseable start date
///
/// Rows with a missing identifier or start date never reach image
/// extraction. Rows whose start date is present but unparseable are dropped
/// with a warning.
pub fn link_photo_log(
    log: &RecordBatch,
    columns: &PhotoLogColumns,
    dates: &DateFormatConfig,
) -> Result<Vec<LinkedPhoto>> {
    let pmrns = column_strings(log, &columns.pmrn)?;
    let photo_ids = column_strings(log, &columns.photo_id)?;
    let photo_dates = column_strings(log, &columns.photo_date)?;
    let start_dates = column_strings(log, &columns.start_date)?;

    let mut linked = Vec::with_capacity(log.num_rows());
    for (idx, (((pmrn, photo_id), photo_date), start)) in pmrns
        .into_iter()
        .zip(photo_ids)
        .zip(photo_dates)
        .zip(start_dates)
        .enumerate()
    {
        let (Some(photo_id), Some(start)) = (photo_id, start) else {
            continue;
        };
        let Some(start_date) = parse_date_string(&start, dates) else {
            warn!("Photo log row {idx}: unparseable start date '{start}', skipping");
            continue;
        };
        linked.push(LinkedPhoto {
            original_index: idx,
            pmrn: pmrn.unwrap_or_default(),
            photo_id,
            photo_date,
            start_date,
        });
    }

    info!(
        "Linked {} of {} photo log rows (missing photo id or start date dropped)",
        linked.len(),
        log.num_rows()
    );
    Ok(linked)
}

/// Build the record log table from linked photos and their face flags
pub fn record_log_table(photos: &[LinkedPhoto], face_flags: &[bool], dates: &DateFormatConfig) -> Result<RecordBatch> {
    if photos.len() != face_flags.len() {
        return Err(FaceAgeError::shape(format!(
            "{} linked photos but {} face flags",
            photos.len(),
            face_flags.len()
        )));
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new(record_log::ORIGINAL_INDEX, arrow::datatypes::DataType::UInt64, false),
        Field::new(record_log::PMRN, arrow::datatypes::DataType::Utf8, true),
        Field::new(record_log::PHOTO_ID, arrow::datatypes::DataType::Utf8, true),
        Field::new(record_log::PHOTO_DATE, arrow::datatypes::DataType::Utf8, true),
        Field::new(record_log::START_DATE, arrow::datatypes::DataType::Utf8, true),
        Field::new(record_log::FACE_FLAG, arrow::datatypes::DataType::Boolean, false),
    ]));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from_iter_values(
            photos.iter().map(|p| p.original_index as u64),
        )),
        Arc::new(StringArray::from_iter_values(photos.iter().map(|p| p.pmrn.as_str()))),
        Arc::new(StringArray::from_iter_values(
            photos.iter().map(|p| p.photo_id.as_str()),
        )),
        Arc::new(photos.iter().map(|p| p.photo_date.as_deref()).collect::<StringArray>()),
        Arc::new(StringArray::from_iter_values(photos.iter().map(|p| {
            p.start_date.format(&dates.default_format).to_string()
        }))),
        Arc::new(BooleanArray::from(face_flags.to_vec())),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

/// Join the record log with the clinical database on `id_column`
///
/// Only patients present in both tables are kept. The first clinical row
/// per patient is used and the log contributes its first row per patient.
/// The result is sorted by patient id. Log columns whose names clash with
/// clinical columns get a `_log` suffix.
///
/// Log rows whose face flag is `false` are dropped before matching. The
/// study's earlier processing scripts only removed the flag column and kept
/// such rows, so their joined tables can hold patients without a usable
/// face. A log without the flag column keeps every row.
pub fn join_clinical(
    record_log: &RecordBatch,
    clinical: &RecordBatch,
    id_column: &str,
) -> Result<RecordBatch> {
    let log_ids = column_strings(record_log, id_column)?;
    let clinical_ids = column_strings(clinical, id_column)?;
    let face_found = face_flags(record_log)?;

    let mut first_clinical_row: FxHashMap<&str, usize> = FxHashMap::default();
    for (row, id) in clinical_ids.iter().enumerate() {
        if let Some(id) = id {
            first_clinical_row.entry(id.as_str()).or_insert(row);
        }
    }

    let pairs: Vec<(&str, usize, usize)> = log_ids
        .iter()
        .enumerate()
        .filter(|(row, _)| face_found[*row])
        .filter_map(|(log_row, id)| {
            let id = id.as_deref()?;
            first_clinical_row
                .get(id)
                .map(|&clinical_row| (id, log_row, clinical_row))
        })
        .unique_by(|(id, _, _)| *id)
        .sorted_by(|a, b| a.0.cmp(b.0))
        .collect();

    let unmatched = log_ids.len() - pairs.len();
    if unmatched > 0 {
        info!("{unmatched} record log rows had no clinical match or no face and were dropped");
    }

    let clinical_rows = take_rows(
        clinical,
        &pairs.iter().map(|(_, _, c)| *c).collect::<Vec<_>>(),
    )?;
    let log_rows = take_rows(
        &drop_column(record_log, record_log::FACE_FLAG)?,
        &pairs.iter().map(|(_, l, _)| *l).collect::<Vec<_>>(),
    )?;

    let clinical_schema = clinical_rows.schema();
    let mut fields: Vec<Field> = clinical_schema
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    let mut arrays: Vec<ArrayRef> = clinical_rows.columns().to_vec();

    let log_schema = log_rows.schema();
    for (field, array) in log_schema.fields().iter().zip(log_rows.columns()) {
        if field.name() == id_column {
            continue;
        }
        let name = if clinical_schema.index_of(field.name()).is_ok() {
            format!("{}_log", field.name())
        } else {
            field.name().clone()
        };
        fields.push(Field::new(name, field.data_type().clone(), true));
        arrays.push(array.clone());
    }

    info!("Joined {} records on '{id_column}'", pairs.len());
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Face flags of the record log; all `true` when the column is absent
fn face_flags(record_log: &RecordBatch) -> Result<Vec<bool>> {
    let Some(column) = record_log.column_by_name(record_log::FACE_FLAG) else {
        return Ok(vec![true; record_log.num_rows()]);
    };
    if let Some(flags) = column.as_any().downcast_ref::<BooleanArray>() {
        return Ok(flags.iter().map(|f| f.unwrap_or(false)).collect());
    }
    Ok(column_strings(record_log, record_log::FACE_FLAG)?
        .into_iter()
        .map(|v| v.is_some_and(|v| is_truthy(&v)))
        .collect())
}

/// Interpret a flag cell the way spreadsheet exports write booleans
#[must_use]
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "1.0" | "true" | "t" | "yes" | "y"
    )
}
