//! Tabular I/O for clinical logs
//!
//! Tables are held as a single Arrow [`RecordBatch`]. CSV inputs are read
//! with every column as nullable `Utf8` so that identifiers keep leading
//! zeros and dates stay in their raw form until [`super::dates`] parses them.
//! Empty cells become nulls. Parquet inputs keep their stored types.

use std::io::{BufReader, Seek};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, StringArray};
use arrow::compute::{cast, concat_batches, take_record_batch};
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::error::util::{safe_create_file, safe_open_file};
use crate::error::{FaceAgeError, Result};
use crate::utils::logging::{Artifact, log_loaded, log_loading, log_saved};

/// Rows used for CSV header and schema discovery
const SCHEMA_INFERENCE_ROWS: usize = 100;

/// Batch size for CSV and Parquet readers
pub const DEFAULT_BATCH_SIZE: usize = 8192;

fn is_parquet(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"))
}

/// Read a CSV or Parquet table into one record batch
pub fn read_table(path: &Path) -> Result<RecordBatch> {
    let start = std::time::Instant::now();
    log_loading(Artifact::Table, path);

    let batch = if is_parquet(path) {
        read_parquet_table(path)?
    } else {
        read_csv_table(path)?
    };

    log_loaded(Artifact::Table, path, batch.num_rows(), start.elapsed());
    Ok(batch)
}

fn read_csv_table(path: &Path) -> Result<RecordBatch> {
    let mut file = safe_open_file(path, "tabular input")?;
    let (inferred, _) = Format::default()
        .with_header(true)
        .infer_schema(&mut file, Some(SCHEMA_INFERENCE_ROWS))?;
    file.rewind().map_err(|e| FaceAgeError::io_at(e, path))?;

    let schema = Arc::new(Schema::new(
        inferred
            .fields()
            .iter()
            .map(|f| Field::new(f.name(), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));

    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_batch_size(DEFAULT_BATCH_SIZE)
        .build(BufReader::new(file))?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

fn read_parquet_table(path: &Path) -> Result<RecordBatch> {
    let file = safe_open_file(path, "tabular input")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.with_batch_size(DEFAULT_BATCH_SIZE).build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

/// Write a table as CSV, or as Parquet when the path ends in `.parquet`
pub fn write_table(batch: &RecordBatch, path: &Path) -> Result<()> {
    let file = safe_create_file(path)?;

    if is_parquet(path) {
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
        writer.write(batch)?;
        writer.close()?;
    } else {
        let mut writer = WriterBuilder::new().with_header(true).build(file);
        writer.write(batch)?;
    }

    log_saved(Artifact::Table, path, batch.num_rows());
    Ok(())
}

/// Build an all-`Utf8` table from column names and row-major cells
pub fn table_from_rows(columns: &[&str], rows: &[Vec<Option<&str>>]) -> Result<RecordBatch> {
    if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
        return Err(FaceAgeError::shape(format!(
            "row has {} cells, table has {} columns",
            bad.len(),
            columns.len()
        )));
    }
    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|name| Field::new(*name, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));
    let arrays = (0..columns.len())
        .map(|col| {
            let values: StringArray = rows.iter().map(|row| row[col]).collect();
            Arc::new(values) as ArrayRef
        })
        .collect();
    Ok(RecordBatch::try_new(schema, arrays)?)
}

/// Values of a column as optional strings; blank cells read as `None`
///
/// Non-string columns are cast to `Utf8` first, so Parquet date columns come
/// back in ISO form.
pub fn column_strings(batch: &RecordBatch, name: &str) -> Result<Vec<Option<String>>> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| FaceAgeError::missing_column(name))?;
    let as_utf8 = if column.data_type() == &DataType::Utf8 {
        column.clone()
    } else {
        cast(column, &DataType::Utf8)?
    };
    let strings = as_utf8
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| FaceAgeError::shape(format!("column '{name}' is not a string column")))?;

    Ok(strings
        .iter()
        .map(|value| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(ToString::to_string)
        })
        .collect())
}

/// Gather rows by index, in the given order
pub fn take_rows(batch: &RecordBatch, indices: &[usize]) -> Result<RecordBatch> {
    let indices = arrow::array::UInt64Array::from(
        indices.iter().map(|&i| i as u64).collect::<Vec<_>>(),
    );
    Ok(take_record_batch(batch, &indices)?)
}

/// Remove a column; absent columns are ignored
pub fn drop_column(batch: &RecordBatch, name: &str) -> Result<RecordBatch> {
    match batch.schema().index_of(name) {
        Ok(idx) => {
            let mut batch = batch.clone();
            batch.remove_column(idx);
            Ok(batch)
        }
        Err(_) => Ok(batch.clone()),
    }
}

/// Append columns after the existing ones
pub fn append_columns(batch: &RecordBatch, columns: Vec<(&str, ArrayRef)>) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut arrays: Vec<ArrayRef> = batch.columns().to_vec();

    for (name, array) in columns {
        if array.len() != batch.num_rows() {
            return Err(FaceAgeError::shape(format!(
                "column '{name}' has {} rows, table has {}",
                array.len(),
                batch.num_rows()
            )));
        }
        fields.push(Field::new(name, array.data_type().clone(), true));
        arrays.push(array);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}
