//! Face detector boundary
//!
//! The pipeline only needs "give me the boxes for this picture". The
//! [`FaceDetector`] trait captures that, with a SeetaFace implementation on
//! top of `rustface` and a blanket implementation for closures so tests and
//! alternative backends can plug in without a model file.

use image::RgbImage;
use rustface::ImageData;

use crate::config::DetectorConfig;
use crate::error::{FaceAgeError, Result};

/// One detected face in pixel coordinates
///
/// `x`/`y` may be negative for faces touching the image border.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Detector score; only the order of detections is used downstream
    pub confidence: f64,
}

impl Detection {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence: 1.0,
        }
    }
}

/// Anything that can find faces in an RGB image
pub trait FaceDetector {
    /// Detections in the detector's own order
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>>;
}

impl<F> FaceDetector for F
where
    F: FnMut(&RgbImage) -> Result<Vec<Detection>>,
{
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>> {
        self(image)
    }
}

/// SeetaFace frontal detector from `rustface`
pub struct RustfaceDetector {
    inner: Box<dyn rustface::Detector>,
}

impl std::fmt::Debug for RustfaceDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustfaceDetector").finish_non_exhaustive()
    }
}

impl RustfaceDetector {
    /// Load the model and apply the configured search parameters
    pub fn from_config(config: &DetectorConfig) -> Result<Self> {
        let model_path = config.model_path.to_str().ok_or_else(|| {
            FaceAgeError::Detector(format!(
                "model path is not valid UTF-8: {}",
                config.model_path.display()
            ))
        })?;
        let mut inner = rustface::create_detector(model_path).map_err(|e| {
            FaceAgeError::Detector(format!("failed to load face detector {model_path}: {e}"))
        })?;
        inner.set_min_face_size(config.min_face_size);
        inner.set_score_thresh(config.score_thresh);
        inner.set_pyramid_scale_factor(config.pyramid_scale_factor);
        inner.set_slide_window_step(config.slide_window_step, config.slide_window_step);
        log::info!("Loaded face detector from {model_path}");
        Ok(Self { inner })
    }
}

impl FaceDetector for RustfaceDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>> {
        let gray = image::imageops::grayscale(image);
        let (width, height) = gray.dimensions();
        let data = ImageData::new(gray.as_raw(), width, height);

        Ok(self
            .inner
            .detect(&data)
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                Detection {
                    x: bbox.x(),
                    y: bbox.y(),
                    width: bbox.width() as i32,
                    height: bbox.height() as i32,
                    confidence: face.score(),
                }
            })
            .collect())
    }
}
