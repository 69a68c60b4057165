//! Face-age research pipeline: face extraction from patient photographs,
//! clinical record matching and curation, and class-balanced rebalancing
//! with geometric augmentation of age-labelled face datasets.

pub mod clinical;
pub mod config;
pub mod dataset;
pub mod error;
pub mod imaging;
pub mod inference;
pub mod survival;
pub mod utils;

// Core types
pub use config::{
    AugmentationConfig, CurationConfig, DateFormatConfig, ExtractionConfig, FillMode,
    PipelineConfig, RebalanceConfig,
};
pub use error::{FaceAgeError, Result};

// Clinical records
pub use clinical::{
    CurationOutcome, ExclusionReason, LinkedPhoto, SurvivalRecord, curate, join_clinical,
    link_photo_log, read_table, record_log_table, write_table,
};

// Faces
pub use imaging::{
    BatchExtraction, Detection, FaceDetector, Localization, RustfaceDetector, SkipReason,
    crop_first_face, extract_faces, face_region,
};

// Datasets
pub use dataset::npz::{read_dataset, read_datasets, write_dataset};
pub use dataset::{AgePool, Dataset, RebalanceReport, augment_class, rebalance, rebalance_and_augment};

// Arrow types
pub use arrow::record_batch::RecordBatch;
