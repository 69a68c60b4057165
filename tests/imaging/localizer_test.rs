use faceage::imaging::{Detection, FaceRegion, Localization, crop_first_face, extract_face, face_region};
use faceage::Result;
use image::{ImageFormat, Rgb, RgbImage};

use crate::utils::{scratch_dir, write_image};

#[test]
fn negative_box_offset_is_folded() {
    let region = face_region(&Detection::new(-3, 5, 50, 50), 640, 480).unwrap();
    assert_eq!(region.x1, 3);
    assert_eq!(region, FaceRegion { x1: 3, y1: 5, x2: 53, y2: 55 });

    let corner = face_region(&Detection::new(-10, -20, 30, 30), 640, 480).unwrap();
    assert_eq!((corner.x1, corner.y1), (10, 20));
}

#[test]
fn box_past_the_edge_is_clipped() {
    let region = face_region(&Detection::new(600, 450, 100, 100), 640, 480).unwrap();
    assert_eq!((region.width(), region.height()), (40, 30));
}

#[test]
fn crop_is_resized_to_canonical_square() {
    let image = RgbImage::from_fn(300, 200, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 0]));
    let found = crop_first_face(&image, &[Detection::new(10, 10, 90, 120)], 160);
    let face = found.into_face().unwrap();
    assert_eq!(face.dimensions(), (160, 160));
}

#[test]
fn extract_face_from_file() {
    let dir = scratch_dir("localizer");
    let path = dir.join("face.png");
    write_image(&path, 64, 48, ImageFormat::Png);

    let mut detector = |_: &RgbImage| -> Result<Vec<Detection>> { Ok(vec![Detection::new(8, 8, 32, 32)]) };
    let face = extract_face(&path, &mut detector, 20).unwrap();
    assert!(face.found());

    let mut blind = |_: &RgbImage| -> Result<Vec<Detection>> { Ok(Vec::new()) };
    assert_eq!(extract_face(&path, &mut blind, 20).unwrap(), Localization::NoFace);
}
