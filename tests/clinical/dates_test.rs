use chrono::NaiveDate;
use faceage::clinical::dates::time_between_str;
use faceage::clinical::{TimeMode, parse_date_string, time_between};
use faceage::config::DateFormatConfig;

#[test]
fn time_between_is_symmetric() {
    let pairs = [
        ((2001, 2, 28), (2001, 3, 1)),
        ((1999, 12, 31), (2024, 2, 29)),
        ((2020, 6, 15), (2020, 6, 15)),
    ];
    for ((y1, m1, d1), (y2, m2, d2)) in pairs {
        let a = NaiveDate::from_ymd_opt(y1, m1, d1).unwrap();
        let b = NaiveDate::from_ymd_opt(y2, m2, d2).unwrap();
        for mode in [TimeMode::Days, TimeMode::Years] {
            let forward = time_between(a, b, mode);
            assert_eq!(forward, time_between(b, a, mode));
            assert!(forward >= 0.0);
        }
    }
}

#[test]
fn exported_date_styles_agree() {
    let config = DateFormatConfig::default();
    let expected = NaiveDate::from_ymd_opt(2019, 3, 4);
    assert_eq!(parse_date_string("2019-03-04", &config), expected);
    assert_eq!(parse_date_string("2019_03_04", &config), expected);
    assert_eq!(parse_date_string("03/04/2019 10:15:00 AM", &config), expected);
    assert_eq!(parse_date_string("  ", &config), None);
    assert_eq!(parse_date_string("not a date", &config), None);
}

#[test]
fn string_arithmetic_matches_date_arithmetic() {
    let config = DateFormatConfig::default();
    let days = time_between_str("2010-01-01", "2010_03_02", TimeMode::Days, &config).unwrap();
    assert_eq!(days, 60.0);
    assert!(time_between_str("2010-01-01", "garbage", TimeMode::Days, &config).is_err());
}
