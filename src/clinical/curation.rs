//! Exclusion criteria and survival outcomes for the curated cohort
//!
//! Each row of the processed clinical table is either kept, with a derived
//! `(chronologic age, event flag, survival time)` triple, or excluded with
//! the first [`ExclusionReason`] it fails. Exclusion never aborts the run.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int32Array};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use log::{debug, info};
use serde::Serialize;

use super::dates::{TimeMode, parse_date_string, time_between};
use super::matcher::is_truthy;
use super::table::{append_columns, column_strings, take_rows};
use crate::config::{CurationConfig, DateFormatConfig};
use crate::error::Result;

/// Derived column names of the curated table
pub mod curated {
    pub const CHRONOLOGIC_AGE: &str = "chronologic age";
    pub const SURVIVAL_TIME: &str = "survival time";
    pub const EVENT_FLAG: &str = "event flag";
}

/// Why a clinical record was left out of the curated cohort
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ExclusionReason {
    /// No patient id or no start date to link on
    MissingLink,
    /// No second treatment-start reference
    MissingTxStart,
    /// A date cell that no configured format parses
    UnparseableDate,
    /// Photo taken too long before or after treatment start
    PhotoToStartGap,
    /// The two treatment-start references disagree by too much
    TxStartGap,
    /// Course not given with curative intent
    NotCurative,
    /// No censoring date to follow the patient to
    MissingFollowUp,
    /// Censoring or death on or before treatment start
    InconsistentDates,
    /// No usable date of birth
    MissingBirthDate,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MissingLink => "missing patient id or start date",
            Self::MissingTxStart => "missing Tx start",
            Self::UnparseableDate => "unparseable date",
            Self::PhotoToStartGap => "photo too far from start date",
            Self::TxStartGap => "Tx start too far from start date",
            Self::NotCurative => "not curative intent",
            Self::MissingFollowUp => "missing follow-up date",
            Self::InconsistentDates => "follow-up not after start date",
            Self::MissingBirthDate => "missing date of birth",
        };
        f.write_str(text)
    }
}

/// Survival outcome of one kept record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurvivalRecord {
    pub pmrn: String,
    /// Years between birth and photo
    pub chronologic_age: f64,
    /// `true` when a date of death is recorded
    pub event: bool,
    /// Years from photo to death, or to censoring when alive
    pub survival_time: f64,
}

/// Output of [`curate`]
#[derive(Debug, Clone)]
pub struct CurationOutcome {
    /// Kept rows with all input columns plus the derived columns
    pub table: RecordBatch,
    /// Derived outcomes, aligned with `table`
    pub records: Vec<SurvivalRecord>,
    /// Input row index and reason for every excluded row
    pub exclusions: Vec<(usize, ExclusionReason)>,
}

impl CurationOutcome {
    /// Number of excluded rows per reason
    #[must_use]
    pub fn exclusion_summary(&self) -> BTreeMap<ExclusionReason, usize> {
        let mut summary = BTreeMap::new();
        for (_, reason) in &self.exclusions {
            *summary.entry(*reason).or_insert(0) += 1;
        }
        summary
    }
}

/// Raw cells of one clinical row
struct RowCells<'a> {
    pmrn: Option<&'a str>,
    photo_date: Option<&'a str>,
    start_date: Option<&'a str>,
    tx_start: Option<&'a str>,
    censor_date: Option<&'a str>,
    death_date: Option<&'a str>,
    birth_date: Option<&'a str>,
    curative_intent: Option<&'a str>,
}

/// Apply the exclusion criteria to one row
///
/// Checks run in a fixed order and the first failure is reported.
fn evaluate_row(
    row: &RowCells<'_>,
    config: &CurationConfig,
    dates: &DateFormatConfig,
) -> std::result::Result<SurvivalRecord, ExclusionReason> {
    let parse = |cell: Option<&str>| -> std::result::Result<Option<NaiveDate>, ExclusionReason> {
        match cell {
            None => Ok(None),
            Some(raw) => parse_date_string(raw, dates)
                .map(Some)
                .ok_or(ExclusionReason::UnparseableDate),
        }
    };

    let tx_start = parse(row.tx_start)?.ok_or(ExclusionReason::MissingTxStart)?;
    let pmrn = row.pmrn.ok_or(ExclusionReason::MissingLink)?;
    let start = parse(row.start_date)?.ok_or(ExclusionReason::MissingLink)?;
    let photo = parse(row.photo_date)?.ok_or(ExclusionReason::MissingLink)?;

    if time_between(photo, start, TimeMode::Days) > config.days_cutoff as f64 {
        return Err(ExclusionReason::PhotoToStartGap);
    }
    if time_between(tx_start, start, TimeMode::Days) > config.tx_start_days_cutoff as f64 {
        return Err(ExclusionReason::TxStartGap);
    }
    if !row.curative_intent.is_some_and(is_truthy) {
        return Err(ExclusionReason::NotCurative);
    }

    let censor = parse(row.censor_date)?;
    let death = parse(row.death_date)?;
    let censor = censor.ok_or(ExclusionReason::MissingFollowUp)?;
    if censor <= start || death.is_some_and(|d| d <= start) {
        return Err(ExclusionReason::InconsistentDates);
    }

    let birth = parse(row.birth_date)
        .ok()
        .flatten()
        .ok_or(ExclusionReason::MissingBirthDate)?;

    let (event, end) = match death {
        Some(death) => (true, death),
        None => (false, censor),
    };

    Ok(SurvivalRecord {
        pmrn: pmrn.to_string(),
        chronologic_age: time_between(birth, photo, TimeMode::Years),
        event,
        survival_time: time_between(end, photo, TimeMode::Years),
    })
}

/// Apply the exclusion criteria and derive survival outcomes
pub fn curate(
    table: &RecordBatch,
    config: &CurationConfig,
    dates: &DateFormatConfig,
) -> Result<CurationOutcome> {
    let cols = &config.columns;
    let pmrn = column_strings(table, &cols.pmrn)?;
    let photo_date = column_strings(table, &cols.photo_date)?;
    let start_date = column_strings(table, &cols.start_date)?;
    let tx_start = column_strings(table, &cols.tx_start)?;
    let censor_date = column_strings(table, &cols.censor_date)?;
    let death_date = column_strings(table, &cols.death_date)?;
    let birth_date = column_strings(table, &cols.birth_date)?;
    let curative_intent = column_strings(table, &cols.curative_intent)?;

    let mut kept_rows = Vec::new();
    let mut records = Vec::new();
    let mut exclusions = Vec::new();

    for row in 0..table.num_rows() {
        let cells = RowCells {
            pmrn: pmrn[row].as_deref(),
            photo_date: photo_date[row].as_deref(),
            start_date: start_date[row].as_deref(),
            tx_start: tx_start[row].as_deref(),
            censor_date: censor_date[row].as_deref(),
            death_date: death_date[row].as_deref(),
            birth_date: birth_date[row].as_deref(),
            curative_intent: curative_intent[row].as_deref(),
        };
        match evaluate_row(&cells, config, dates) {
            Ok(record) => {
                kept_rows.push(row);
                records.push(record);
            }
            Err(reason) => {
                debug!("Excluding row {row} ({:?}): {reason}", cells.pmrn);
                exclusions.push((row, reason));
            }
        }
    }

    let kept = take_rows(table, &kept_rows)?;
    let table = append_columns(
        &kept,
        vec![
            (
                curated::CHRONOLOGIC_AGE,
                Arc::new(Float64Array::from_iter_values(
                    records.iter().map(|r| r.chronologic_age),
                )) as ArrayRef,
            ),
            (
                curated::SURVIVAL_TIME,
                Arc::new(Float64Array::from_iter_values(
                    records.iter().map(|r| r.survival_time),
                )),
            ),
            (
                curated::EVENT_FLAG,
                Arc::new(Int32Array::from_iter_values(
                    records.iter().map(|r| i32::from(r.event)),
                )),
            ),
        ],
    )?;

    let outcome = CurationOutcome {
        table,
        records,
        exclusions,
    };
    info!(
        "Curated {} of {} records",
        outcome.records.len(),
        outcome.records.len() + outcome.exclusions.len()
    );
    for (reason, count) in outcome.exclusion_summary() {
        info!("  excluded {count:>5}: {reason}");
    }
    Ok(outcome)
}
