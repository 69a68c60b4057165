use chrono::NaiveDate;
use faceage::clinical::matcher::record_log;
use faceage::clinical::table::{column_strings, drop_column, table_from_rows};
use faceage::clinical::{join_clinical, link_photo_log, record_log_table};
use faceage::config::{DateFormatConfig, PhotoLogColumns};

fn photo_log() -> arrow::record_batch::RecordBatch {
    table_from_rows(
        &["Old_PatientId", "New_PatientId", "Creation Date", "Start Date"],
        &[
            vec![Some("B"), Some("img2"), Some("2018_05_01"), Some("05/03/2018 09:00:00 AM")],
            vec![Some("A"), Some("img1"), Some("2018_01_01"), Some("01/10/2018 11:30:00 AM")],
            vec![Some("C"), Some("img3"), Some("2018_02_01"), Some("02/02/2018 08:00:00 AM")],
            vec![Some("A"), Some("img4"), Some("2018_06_01"), Some("06/05/2018 10:00:00 AM")],
            vec![Some("D"), None, Some("2018_06_01"), Some("06/05/2018 10:00:00 AM")],
        ],
    )
    .unwrap()
}

#[test]
fn record_log_carries_links_and_face_flags() {
    let dates = DateFormatConfig::default();
    let photos = link_photo_log(&photo_log(), &PhotoLogColumns::default(), &dates).unwrap();
    assert_eq!(photos.len(), 4);
    assert_eq!(photos[1].start_date, NaiveDate::from_ymd_opt(2018, 1, 10).unwrap());

    let log = record_log_table(&photos, &[true, true, false, true], &dates).unwrap();
    assert_eq!(log.num_rows(), 4);
    assert_eq!(
        column_strings(&log, record_log::START_DATE).unwrap()[0],
        Some("2018-05-03".to_string())
    );
    assert!(record_log_table(&photos, &[true], &dates).is_err());
}

#[test]
fn join_keeps_first_row_per_patient_with_a_face() {
    let dates = DateFormatConfig::default();
    let photos = link_photo_log(&photo_log(), &PhotoLogColumns::default(), &dates).unwrap();
    let log = record_log_table(&photos, &[true, true, false, true], &dates).unwrap();

    let clinical = table_from_rows(
        &["pmrn", "DOB", "photo_id"],
        &[
            vec![Some("A"), Some("1950-01-01"), Some("x")],
            vec![Some("C"), Some("1960-01-01"), Some("y")],
            vec![Some("A"), Some("1999-09-09"), Some("z")],
            vec![Some("B"), Some("1970-01-01"), Some("w")],
            vec![Some("E"), Some("1980-01-01"), Some("v")],
        ],
    )
    .unwrap();

    let joined = join_clinical(&log, &clinical, "pmrn").unwrap();
    // C has no face, E has no photo
    assert_eq!(
        column_strings(&joined, "pmrn").unwrap(),
        vec![Some("A".to_string()), Some("B".to_string())]
    );
    assert_eq!(
        column_strings(&joined, "DOB").unwrap(),
        vec![Some("1950-01-01".to_string()), Some("1970-01-01".to_string())]
    );
    // first log row for A is img1
    assert_eq!(
        column_strings(&joined, "photo_id_log").unwrap(),
        vec![Some("img1".to_string()), Some("img2".to_string())]
    );
    assert!(joined.column_by_name(record_log::FACE_FLAG).is_none());
}

#[test]
fn log_without_face_flags_keeps_every_row() {
    let dates = DateFormatConfig::default();
    let photos = link_photo_log(&photo_log(), &PhotoLogColumns::default(), &dates).unwrap();
    let flagged = record_log_table(&photos, &[false; 4], &dates).unwrap();
    let unflagged = drop_column(&flagged, record_log::FACE_FLAG).unwrap();

    let clinical = table_from_rows(
        &["pmrn", "DOB"],
        &[
            vec![Some("B"), Some("1970-01-01")],
            vec![Some("C"), Some("1960-01-01")],
        ],
    )
    .unwrap();

    assert_eq!(join_clinical(&flagged, &clinical, "pmrn").unwrap().num_rows(), 0);
    assert_eq!(
        column_strings(&join_clinical(&unflagged, &clinical, "pmrn").unwrap(), "pmrn").unwrap(),
        vec![Some("B".to_string()), Some("C".to_string())]
    );
}
