//! Configuration for the face-age pipeline.
//!
//! Every stage has its own config struct with defaults that reproduce the
//! study settings. [`PipelineConfig`] bundles them and can be loaded from a
//! JSON file; missing keys fall back to the defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FaceAgeError, Result};
use crate::error::util::safe_open_file;

/// Date formats tried, in order, after separator normalisation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateFormatConfig {
    /// List of date format strings to try when parsing dates
    pub date_formats: Vec<String>,
    /// Format used when writing dates back out
    pub default_format: String,
}

impl Default for DateFormatConfig {
    fn default() -> Self {
        Self {
            date_formats: vec![
                "%Y-%m-%d".to_string(), // ISO format: 2023-01-15
                "%m/%d/%Y".to_string(), // US: 01/15/2023, clinical log exports
                "%d.%m.%Y".to_string(), // 15.01.2023
                "%Y%m%d".to_string(),   // Compact: 20230115
            ],
            default_format: "%Y-%m-%d".to_string(),
        }
    }
}

/// Column names of the photo log written by the image archive export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoLogColumns {
    pub pmrn: String,
    pub photo_id: String,
    pub photo_date: String,
    pub start_date: String,
}

impl Default for PhotoLogColumns {
    fn default() -> Self {
        Self {
            pmrn: "Old_PatientId".to_string(),
            photo_id: "New_PatientId".to_string(),
            photo_date: "Creation Date".to_string(),
            start_date: "Start Date".to_string(),
        }
    }
}

/// Column names of the processed clinical database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalColumns {
    pub pmrn: String,
    pub photo_date: String,
    pub start_date: String,
    pub tx_start: String,
    pub censor_date: String,
    pub death_date: String,
    pub birth_date: String,
    pub curative_intent: String,
}

impl Default for ClinicalColumns {
    fn default() -> Self {
        Self {
            pmrn: "pmrn".to_string(),
            photo_date: "photo_date".to_string(),
            start_date: "start_date".to_string(),
            tx_start: "Tx Start".to_string(),
            censor_date: "Last Oncology F/u".to_string(),
            death_date: "Date of Death".to_string(),
            birth_date: "DOB".to_string(),
            curative_intent: "Curative_Intent".to_string(),
        }
    }
}

/// Settings for the face detector backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Path to the SeetaFace frontal model
    pub model_path: PathBuf,
    pub min_face_size: u32,
    pub score_thresh: f64,
    pub pyramid_scale_factor: f32,
    pub slide_window_step: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("seeta_fd_frontal_v1.0.bin"),
            min_face_size: 20,
            score_thresh: 2.0,
            pyramid_scale_factor: 0.8,
            slide_window_step: 4,
        }
    }
}

/// Face extraction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Side length of the canonical square face crop
    pub required_size: u32,
    /// Images narrower or shorter than this are skipped
    pub min_dimension: u32,
    /// Extension appended to photo ids to locate image files
    pub image_extension: String,
    pub photo_log: PhotoLogColumns,
    pub detector: DetectorConfig,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            required_size: 160,
            min_dimension: 2,
            image_extension: "jpg".to_string(),
            photo_log: PhotoLogColumns::default(),
            detector: DetectorConfig::default(),
        }
    }
}

/// Exclusion criteria for the curated clinical cohort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurationConfig {
    /// Maximum days between photo and treatment start
    ///
    /// Inclusive: a gap of exactly this many days is kept. The study's
    /// earlier curation scripts kept only strictly shorter gaps, so counts
    /// can differ from theirs by the rows sitting on the boundary.
    pub days_cutoff: i64,
    /// Maximum days between the two treatment-start references, inclusive
    pub tx_start_days_cutoff: i64,
    pub columns: ClinicalColumns,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            days_cutoff: 30,
            tx_start_days_cutoff: 30,
            columns: ClinicalColumns::default(),
        }
    }
}

impl CurationConfig {
    #[must_use]
    pub fn builder() -> CurationConfigBuilder {
        CurationConfigBuilder::default()
    }
}

/// Builder for [`CurationConfig`]
#[derive(Debug, Clone, Default)]
pub struct CurationConfigBuilder {
    config: CurationConfig,
}

impl CurationConfigBuilder {
    #[must_use]
    pub const fn days_cutoff(mut self, days: i64) -> Self {
        self.config.days_cutoff = days;
        self
    }

    #[must_use]
    pub const fn tx_start_days_cutoff(mut self, days: i64) -> Self {
        self.config.tx_start_days_cutoff = days;
        self
    }

    #[must_use]
    pub fn columns(mut self, columns: ClinicalColumns) -> Self {
        self.config.columns = columns;
        self
    }

    #[must_use]
    pub fn build(self) -> CurationConfig {
        self.config
    }
}

/// Class-balanced resampling settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebalanceConfig {
    /// Inclusive lower age bound
    pub lower_age: i64,
    /// Exclusive upper age bound
    pub upper_age: i64,
    /// Target number of samples per age
    pub target_quota: usize,
    /// Augmentation generator batch size
    pub batch_size: usize,
    /// Drop the last batch's overshoot so each class ends at exactly the quota
    pub trim_to_quota: bool,
    /// Seed for every random draw of the run; OS entropy when absent
    pub seed: Option<u64>,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            lower_age: 18,
            upper_age: 105,
            target_quota: 150,
            batch_size: 20,
            trim_to_quota: false,
            seed: None,
        }
    }
}

impl RebalanceConfig {
    #[must_use]
    pub fn builder() -> RebalanceConfigBuilder {
        RebalanceConfigBuilder::default()
    }

    /// Check bounds, quota and batch size
    pub fn validate(&self) -> Result<()> {
        if self.lower_age >= self.upper_age {
            return Err(FaceAgeError::invalid_parameter(
                "age bounds",
                format!("[{}, {})", self.lower_age, self.upper_age),
            ));
        }
        if self.target_quota == 0 {
            return Err(FaceAgeError::invalid_parameter("target_quota", 0));
        }
        if self.batch_size == 0 {
            return Err(FaceAgeError::invalid_parameter("batch_size", 0));
        }
        Ok(())
    }

    /// Whether `age` lies in `[lower_age, upper_age)`
    #[must_use]
    pub const fn contains(&self, age: i64) -> bool {
        age >= self.lower_age && age < self.upper_age
    }
}

/// Builder for [`RebalanceConfig`]
#[derive(Debug, Clone, Default)]
pub struct RebalanceConfigBuilder {
    config: RebalanceConfig,
}

impl RebalanceConfigBuilder {
    #[must_use]
    pub const fn age_bounds(mut self, lower: i64, upper: i64) -> Self {
        self.config.lower_age = lower;
        self.config.upper_age = upper;
        self
    }

    #[must_use]
    pub const fn target_quota(mut self, quota: usize) -> Self {
        self.config.target_quota = quota;
        self
    }

    #[must_use]
    pub const fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    #[must_use]
    pub const fn trim_to_quota(mut self, trim: bool) -> Self {
        self.config.trim_to_quota = trim;
        self
    }

    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn build(self) -> RebalanceConfig {
        self.config
    }
}

/// How pixels sampled from outside the source image are filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum FillMode {
    /// Every out-of-bounds pixel gets this value in all channels
    Constant { value: u8 },
    /// Repeat the nearest edge pixel
    Nearest,
    /// Mirror about the edge
    Reflect,
    /// Tile the image
    Wrap,
}

impl Default for FillMode {
    fn default() -> Self {
        Self::Constant { value: 0 }
    }
}

/// Ranges of the random geometric transforms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Rotation range in degrees, sampled from `[-r, r]`
    pub rotation_range: f64,
    /// Horizontal shift as a fraction of the width
    pub width_shift_range: f64,
    /// Vertical shift as a fraction of the height
    pub height_shift_range: f64,
    /// Shear angle range in radians
    pub shear_range: f64,
    /// Zoom factors are sampled from `[1 - z, 1 + z]` per axis
    pub zoom_range: f64,
    pub horizontal_flip: bool,
    pub fill_mode: FillMode,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            rotation_range: 20.0,
            width_shift_range: 0.1,
            height_shift_range: 0.1,
            shear_range: 0.2,
            zoom_range: 0.2,
            horizontal_flip: true,
            fill_mode: FillMode::default(),
        }
    }
}

impl AugmentationConfig {
    #[must_use]
    pub fn builder() -> AugmentationConfigBuilder {
        AugmentationConfigBuilder::default()
    }

    /// Config that leaves every image unchanged
    #[must_use]
    pub fn identity() -> Self {
        Self {
            rotation_range: 0.0,
            width_shift_range: 0.0,
            height_shift_range: 0.0,
            shear_range: 0.0,
            zoom_range: 0.0,
            horizontal_flip: false,
            fill_mode: FillMode::default(),
        }
    }

    /// Reject negative ranges and zoom ranges that allow a zero scale
    pub fn validate(&self) -> Result<()> {
        let ranges = [
            ("rotation_range", self.rotation_range),
            ("width_shift_range", self.width_shift_range),
            ("height_shift_range", self.height_shift_range),
            ("shear_range", self.shear_range),
            ("zoom_range", self.zoom_range),
        ];
        for (name, value) in ranges {
            if !value.is_finite() || value < 0.0 {
                return Err(FaceAgeError::invalid_parameter(name, value));
            }
        }
        if self.zoom_range >= 1.0 {
            return Err(FaceAgeError::invalid_parameter("zoom_range", self.zoom_range));
        }
        Ok(())
    }
}

/// Builder for [`AugmentationConfig`]
#[derive(Debug, Clone, Default)]
pub struct AugmentationConfigBuilder {
    config: AugmentationConfig,
}

impl AugmentationConfigBuilder {
    #[must_use]
    pub const fn rotation_range(mut self, degrees: f64) -> Self {
        self.config.rotation_range = degrees;
        self
    }

    #[must_use]
    pub const fn shift_range(mut self, width: f64, height: f64) -> Self {
        self.config.width_shift_range = width;
        self.config.height_shift_range = height;
        self
    }

    #[must_use]
    pub const fn shear_range(mut self, radians: f64) -> Self {
        self.config.shear_range = radians;
        self
    }

    #[must_use]
    pub const fn zoom_range(mut self, zoom: f64) -> Self {
        self.config.zoom_range = zoom;
        self
    }

    #[must_use]
    pub const fn horizontal_flip(mut self, flip: bool) -> Self {
        self.config.horizontal_flip = flip;
        self
    }

    #[must_use]
    pub const fn fill_mode(mut self, fill_mode: FillMode) -> Self {
        self.config.fill_mode = fill_mode;
        self
    }

    #[must_use]
    pub fn build(self) -> AugmentationConfig {
        self.config
    }
}

/// Configuration for the whole pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub extraction: ExtractionConfig,
    pub curation: CurationConfig,
    pub rebalance: RebalanceConfig,
    pub augmentation: AugmentationConfig,
    pub dates: DateFormatConfig,
}

impl PipelineConfig {
    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = safe_open_file(path, "pipeline configuration")?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| FaceAgeError::Config(format!("{}: {e}", path.display())))?;
        config.rebalance.validate()?;
        config.augmentation.validate()?;
        log::info!("Loaded pipeline configuration from {}", path.display());
        Ok(config)
    }
}
