use std::path::PathBuf;

use crate::render::MapStyle;

pub const DEFAULT_INPUT_DIR: &str = "gpx";
pub const DEFAULT_OUTPUT_DOCUMENT: &str = "readme.md";
pub const DEFAULT_TITLE: &str = "Motoriders";
pub const DEFAULT_BASE_URL: &str = "https://github.com/joanboure/motoriders/gpx";
pub const DEFAULT_EXTENSION: &str = "gpx";

/// What to do when a single track cannot be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failing file and leave the index document untouched.
    #[default]
    Abort,
    /// Log the failure, skip the file and list the rest.
    Continue,
}

#[derive(Debug, Clone)]
pub struct GalleryConfig {
    pub input_dir: PathBuf,
    pub output_document: PathBuf,
    /// Prefix for image and download links in the index document.
    pub base_url: String,
    pub title: String,
    pub extension: String,
    pub failure_policy: FailurePolicy,
    pub style: MapStyle,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_document: PathBuf::from(DEFAULT_OUTPUT_DOCUMENT),
            base_url: DEFAULT_BASE_URL.to_string(),
            title: DEFAULT_TITLE.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            failure_policy: FailurePolicy::default(),
            style: MapStyle::default(),
        }
    }
}
