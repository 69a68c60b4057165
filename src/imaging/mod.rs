//! Face localisation and batch extraction

pub mod batch;
pub mod detector;
pub mod localizer;

pub use batch::{
    BatchExtraction, FileStatus, SkipReason, extract_faces, extract_faces_for_photos,
    extract_faces_from_directory,
};
pub use detector::{Detection, FaceDetector, RustfaceDetector};
pub use localizer::{FaceRegion, Localization, crop_first_face, extract_face, face_region, resize_area};
