use chrono::NaiveDate;
use faceage::Result;
use faceage::clinical::LinkedPhoto;
use faceage::config::ExtractionConfig;
use faceage::imaging::{Detection, SkipReason, extract_faces, extract_faces_for_photos, extract_faces_from_directory};
use image::{ImageFormat, RgbImage};

use crate::utils::{scratch_dir, write_image};

fn centre_detector(image: &RgbImage) -> Result<Vec<Detection>> {
    let (w, h) = image.dimensions();
    Ok(vec![Detection::new(w as i32 / 4, h as i32 / 4, w as i32 / 2, h as i32 / 2)])
}

#[test]
fn png_with_jpg_extension_is_skipped() {
    let dir = scratch_dir("batch-format");
    let fake = dir.join("fake.jpg");
    let real = dir.join("real.jpg");
    write_image(&fake, 40, 40, ImageFormat::Png);
    write_image(&real, 40, 40, ImageFormat::Jpeg);

    let files = vec![("fake".to_string(), fake), ("real".to_string(), real)];
    let config = ExtractionConfig {
        required_size: 16,
        ..ExtractionConfig::default()
    };
    let mut detector = centre_detector;
    let out = extract_faces(&files, &mut detector, &config);

    assert_eq!(out.faces.len(), 1);
    assert_eq!(out.kept_ids, vec!["real".to_string()]);
    assert_eq!(out.faces[0].dimensions(), (16, 16));
    assert!(matches!(out.statuses[0].skipped, Some(SkipReason::NotJpeg(Some(ImageFormat::Png)))));
    assert!(out.statuses[1].face_found());
}

#[test]
fn problem_files_do_not_stop_the_batch() {
    let dir = scratch_dir("batch-skips");
    write_image(&dir.join("a_tiny.jpg"), 1, 1, ImageFormat::Jpeg);
    std::fs::write(dir.join("b_corrupt.jpg"), [0xFF, 0xD8, 0xFF, 0x00, 0x01]).unwrap();
    write_image(&dir.join("c_good.jpg"), 30, 30, ImageFormat::Jpeg);
    write_image(&dir.join("d_blank.jpg"), 31, 30, ImageFormat::Jpeg);

    let config = ExtractionConfig::default();
    // odd widths stand in for photos without a face
    let mut detector = |image: &RgbImage| -> Result<Vec<Detection>> {
        if image.width() % 2 == 1 { Ok(Vec::new()) } else { centre_detector(image) }
    };
    let out = extract_faces_from_directory(&dir, &mut detector, &config).unwrap();

    let ids: Vec<&str> = out.statuses.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["a_tiny", "b_corrupt", "c_good", "d_blank"]);
    assert!(matches!(out.statuses[0].skipped, Some(SkipReason::TooSmall { width: 1, height: 1 })));
    assert!(matches!(out.statuses[1].skipped, Some(SkipReason::Unreadable(_))));
    assert!(out.statuses[2].face_found());
    assert_eq!(out.statuses[3].skipped, Some(SkipReason::NoFace));
    assert_eq!(out.faces.len(), 1);
    assert_eq!(out.skipped(), 3);
}

#[test]
fn linked_photos_are_looked_up_by_id() {
    let dir = scratch_dir("batch-linked");
    write_image(&dir.join("p1.jpg"), 24, 24, ImageFormat::Jpeg);
    let photo = |id: &str| LinkedPhoto {
        original_index: 0,
        pmrn: "123".to_string(),
        photo_id: id.to_string(),
        photo_date: None,
        start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
    };

    let mut detector = centre_detector;
    let out = extract_faces_for_photos(
        &dir,
        &[photo("p1"), photo("p2")],
        &mut detector,
        &ExtractionConfig::default(),
    )
    .unwrap();
    assert!(out.statuses[0].face_found());
    assert_eq!(out.statuses[1].skipped, Some(SkipReason::Missing));
}
