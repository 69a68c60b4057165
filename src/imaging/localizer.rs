//! Face localisation: first detection → crop → canonical square
//!
//! Only the first box the detector returns is used, not the highest-scoring
//! one. Detectors report boxes near the border with small negative offsets;
//! those offsets are folded back with their absolute value, and the far edge
//! is clipped to the image.

use std::path::Path;

use image::{ImageReader, Rgb, RgbImage};

use super::detector::{Detection, FaceDetector};
use crate::error::{FaceAgeError, Result};

/// Pixel rectangle `[x1, x2) × [y1, y2)` inside an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRegion {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl FaceRegion {
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

/// Result of localising the face in one image
#[derive(Debug, Clone, PartialEq)]
pub enum Localization {
    /// Cropped and resized face
    Found(RgbImage),
    /// Detector returned nothing usable
    NoFace,
}

impl Localization {
    #[must_use]
    pub const fn found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    #[must_use]
    pub fn into_face(self) -> Option<RgbImage> {
        match self {
            Self::Found(face) => Some(face),
            Self::NoFace => None,
        }
    }
}

/// Crop rectangle of a detection inside an `image_width × image_height` image
///
/// Returns `None` when the box has no area or lies entirely outside.
#[must_use]
pub fn face_region(detection: &Detection, image_width: u32, image_height: u32) -> Option<FaceRegion> {
    if detection.width <= 0 || detection.height <= 0 {
        return None;
    }
    let x1 = detection.x.unsigned_abs();
    let y1 = detection.y.unsigned_abs();
    let x2 = x1.saturating_add(detection.width as u32).min(image_width);
    let y2 = y1.saturating_add(detection.height as u32).min(image_height);

    (x1 < x2 && y1 < y2).then_some(FaceRegion { x1, y1, x2, y2 })
}

/// Crop the first detection and resize it to `required_size × required_size`
#[must_use]
pub fn crop_first_face(image: &RgbImage, detections: &[Detection], required_size: u32) -> Localization {
    let Some(first) = detections.first() else {
        return Localization::NoFace;
    };
    let Some(region) = face_region(first, image.width(), image.height()) else {
        return Localization::NoFace;
    };

    let face = image::imageops::crop_imm(image, region.x1, region.y1, region.width(), region.height())
        .to_image();
    Localization::Found(resize_area(&face, required_size, required_size))
}

/// Source pixels and their weights for every destination index on one axis
fn area_weights(src: u32, dst: u32) -> Vec<Vec<(u32, f64)>> {
    let scale = f64::from(src) / f64::from(dst);
    (0..dst)
        .map(|d| {
            let start = f64::from(d) * scale;
            let end = start + scale;
            let mut weights = Vec::new();
            let mut s = start.floor() as u32;
            while f64::from(s) < end && s < src {
                let overlap = end.min(f64::from(s) + 1.0) - start.max(f64::from(s));
                if overlap > 0.0 {
                    weights.push((s, overlap / scale));
                }
                s += 1;
            }
            weights
        })
        .collect()
}

/// Resize by pixel-area averaging
///
/// Each destination pixel is the mean of the source area it covers, with
/// partially covered source pixels weighted by their overlap.
#[must_use]
pub fn resize_area(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    let x_weights = area_weights(image.width(), width);
    let y_weights = area_weights(image.height(), height);

    RgbImage::from_fn(width, height, |dx, dy| {
        let mut acc = [0.0f64; 3];
        for &(sy, wy) in &y_weights[dy as usize] {
            for &(sx, wx) in &x_weights[dx as usize] {
                let pixel = image.get_pixel(sx, sy);
                let w = wx * wy;
                for (c, value) in acc.iter_mut().enumerate() {
                    *value += w * f64::from(pixel[c]);
                }
            }
        }
        Rgb(acc.map(|v| v.round().clamp(0.0, 255.0) as u8))
    })
}

/// Decode an image file as RGB, sniffing the format from its content
pub fn load_rgb(path: &Path) -> Result<RgbImage> {
    let reader = ImageReader::open(path)
        .map_err(|e| FaceAgeError::io_at(e, path))?
        .with_guessed_format()
        .map_err(|e| FaceAgeError::io_at(e, path))?;
    Ok(reader.decode()?.to_rgb8())
}

/// Detect, crop and resize the face of one image file
pub fn extract_face<D: FaceDetector + ?Sized>(
    path: &Path,
    detector: &mut D,
    required_size: u32,
) -> Result<Localization> {
    let image = load_rgb(path)?;
    let detections = detector.detect(&image)?;
    Ok(crop_first_face(&image, &detections, required_size))
}
