use approx::assert_relative_eq;
use faceage::clinical::curation::curated;
use faceage::clinical::table::column_strings;
use faceage::clinical::{ExclusionReason, curate, read_table, write_table};
use faceage::config::{CurationConfig, DateFormatConfig};

use crate::utils::{clinical_table, scratch_dir, valid_clinical_row};

#[test]
fn missing_tx_start_and_late_photo_are_excluded() {
    let mut no_tx = valid_clinical_row("100");
    no_tx[3] = None;
    let mut late_photo = valid_clinical_row("200");
    // photo taken 90 days before treatment start
    late_photo[1] = Some("2014-12-10");
    let valid = valid_clinical_row("300");

    let table = clinical_table(&[no_tx, late_photo, valid]);
    let outcome = curate(&table, &CurationConfig::default(), &DateFormatConfig::default()).unwrap();

    assert_eq!(outcome.table.num_rows(), 1);
    assert_eq!(
        outcome.exclusions,
        vec![
            (0, ExclusionReason::MissingTxStart),
            (1, ExclusionReason::PhotoToStartGap)
        ]
    );
    assert_eq!(
        column_strings(&outcome.table, "pmrn").unwrap(),
        vec![Some("300".to_string())]
    );

    let record = &outcome.records[0];
    assert!(!record.event);
    assert_relative_eq!(record.survival_time, 740.0 / 365.0, epsilon = 1e-12);
    assert_relative_eq!(record.chronologic_age, 20088.0 / 365.0, epsilon = 1e-12);
}

#[test]
fn non_curative_and_unfollowed_rows_are_excluded() {
    let mut palliative = valid_clinical_row("1");
    palliative[7] = Some("0");
    let mut no_flag = valid_clinical_row("2");
    no_flag[7] = None;
    let mut no_follow_up = valid_clinical_row("3");
    no_follow_up[4] = None;
    let mut no_dob = valid_clinical_row("4");
    no_dob[6] = None;

    let table = clinical_table(&[palliative, no_flag, no_follow_up, no_dob]);
    let outcome = curate(&table, &CurationConfig::default(), &DateFormatConfig::default()).unwrap();

    assert_eq!(outcome.table.num_rows(), 0);
    let summary = outcome.exclusion_summary();
    assert_eq!(summary.get(&ExclusionReason::NotCurative), Some(&2));
    assert_eq!(summary.get(&ExclusionReason::MissingFollowUp), Some(&1));
    assert_eq!(summary.get(&ExclusionReason::MissingBirthDate), Some(&1));
}

#[test]
fn cutoffs_come_from_config() {
    let mut late_photo = valid_clinical_row("9");
    late_photo[1] = Some("2014-12-10");
    let table = clinical_table(&[late_photo]);
    let config = CurationConfig::builder().days_cutoff(120).build();
    let outcome = curate(&table, &config, &DateFormatConfig::default()).unwrap();
    assert_eq!(outcome.table.num_rows(), 1);
}

#[test]
fn photo_gap_on_the_cutoff_is_kept() {
    // treatment starts 2015-03-10
    let mut on_cutoff = valid_clinical_row("10");
    on_cutoff[1] = Some("2015-02-08");
    let mut past_cutoff = valid_clinical_row("11");
    past_cutoff[1] = Some("2015-02-07");

    let table = clinical_table(&[on_cutoff, past_cutoff]);
    let outcome = curate(&table, &CurationConfig::default(), &DateFormatConfig::default()).unwrap();

    assert_eq!(
        column_strings(&outcome.table, "pmrn").unwrap(),
        vec![Some("10".to_string())]
    );
    assert_eq!(outcome.exclusions, vec![(1, ExclusionReason::PhotoToStartGap)]);
}

#[test]
fn curated_table_survives_parquet() {
    let mut dead = valid_clinical_row("7");
    dead[5] = Some("2016-03-10");
    let table = clinical_table(&[dead, valid_clinical_row("8")]);
    let outcome = curate(&table, &CurationConfig::default(), &DateFormatConfig::default()).unwrap();

    let dir = scratch_dir("curated-parquet");
    let path = dir.join("curated.parquet");
    write_table(&outcome.table, &path).unwrap();
    let back = read_table(&path).unwrap();

    assert_eq!(back.num_rows(), 2);
    assert_eq!(
        column_strings(&back, curated::EVENT_FLAG).unwrap(),
        vec![Some("1".to_string()), Some("0".to_string())]
    );
}
