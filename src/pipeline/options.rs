//! Pipeline options.

use crate::render::DEFAULT_DPI;

/// Extraction attempts per table before the last result is accepted.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Options for running the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Extraction attempts per table (at least 1)
    pub max_retries: u32,

    /// Page image resolution in DPI
    pub render_dpi: u32,

    /// Whether to extract invoice header fields
    pub extract_main_info: bool,

    /// Whether to resume from an existing artifact
    pub resume: bool,

    /// Whether to write the artifact after each stage
    pub checkpoint: bool,

    /// Whether the model decides table orientation (deterministic otherwise)
    pub model_orientation: bool,
}

impl PipelineOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the extraction attempt cap.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    /// Set the page image resolution.
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.render_dpi = dpi;
        self
    }

    /// Enable or disable invoice header extraction.
    pub fn with_main_info(mut self, enabled: bool) -> Self {
        self.extract_main_info = enabled;
        self
    }

    /// Enable or disable resuming from an existing artifact.
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Disable per-stage checkpoints.
    pub fn without_checkpoints(mut self) -> Self {
        self.checkpoint = false;
        self
    }

    /// Detect orientation deterministically instead of asking the model.
    pub fn deterministic_orientation(mut self) -> Self {
        self.model_orientation = false;
        self
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            render_dpi: DEFAULT_DPI,
            extract_main_info: false,
            resume: false,
            checkpoint: true,
            model_orientation: true,
        }
    }
}
