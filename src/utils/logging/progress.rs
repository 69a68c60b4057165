//! Progress reporting for long-running pipeline stages
//!
//! Face extraction walks thousands of photos and augmentation walks every
//! age class; both report through these bars. Bars draw to stderr and stay
//! silent when it is not a terminal.

use indicatif::{ProgressBar, ProgressStyle};

/// Style for the per-file bar of a stage
pub const DEFAULT_MAIN_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({per_sec}) {msg}";

/// Style for the per-class bar of a stage
pub const DEFAULT_GROUP_TEMPLATE: &str =
    "{spinner} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}";

fn styled_bar(length: u64, template: &str, description: Option<&str>) -> ProgressBar {
    let pb = ProgressBar::new(length);
    let style = ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);

    if let Some(desc) = description {
        pb.set_message(desc.to_string());
    }
    pb
}

/// Progress bar over the files of a stage
#[must_use]
pub fn create_main_progress_bar(length: u64, description: Option<&str>) -> ProgressBar {
    styled_bar(length, DEFAULT_MAIN_TEMPLATE, description)
}

/// Progress bar over the age classes of a stage
#[must_use]
pub fn create_group_progress_bar(length: u64, description: Option<&str>) -> ProgressBar {
    styled_bar(length, DEFAULT_GROUP_TEMPLATE, description)
}

/// Finish a progress bar with an optional completion message
pub fn finish_progress_bar(pb: &ProgressBar, message: Option<&str>) {
    if let Some(msg) = message {
        pb.finish_with_message(msg.to_string());
    } else {
        pb.finish();
    }
}
