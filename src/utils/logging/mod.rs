//! Logging and progress tracking for the pipeline stages

pub mod log;
pub mod progress;

pub use log::{Artifact, log_loaded, log_loading, log_saved, log_skipped_photo};
pub use progress::{create_group_progress_bar, create_main_progress_bar, finish_progress_bar};
