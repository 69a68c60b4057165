//! Clinical record matching and cohort curation
//!
//! Photo logs and clinical databases are read as Arrow tables, linked on the
//! patient record number and filtered by the study's exclusion criteria.

pub mod curation;
pub mod dates;
pub mod matcher;
pub mod table;

pub use curation::{CurationOutcome, ExclusionReason, SurvivalRecord, curate};
pub use dates::{TimeMode, normalize_date_string, parse_date, parse_date_string, time_between};
pub use matcher::{LinkedPhoto, join_clinical, link_photo_log, record_log_table};
pub use table::{read_table, write_table};
