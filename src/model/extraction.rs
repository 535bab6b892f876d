//! Extraction results and verification feedback.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Unit in which composition values are expressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueBasis {
    /// Weight percent (wt%)
    WeightPercent,
    /// Molar percent (mol%)
    MolarPercent,
    /// Not stated or not determinable
    #[default]
    Unknown,
}

/// Structured cell data extracted from one table.
///
/// Produced whole by a single extraction attempt and replaced on retry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Row-major cell values
    pub cell_grid: Vec<Vec<String>>,

    /// Unit of the values
    pub value_basis: ValueBasis,

    /// Set when the provider refused the request and this result is a placeholder
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub content_filtered: bool,
}

impl ExtractionResult {
    /// Create a new extraction result.
    pub fn new(cell_grid: Vec<Vec<String>>, value_basis: ValueBasis) -> Self {
        Self {
            cell_grid,
            value_basis,
            content_filtered: false,
        }
    }

    /// Empty placeholder used when the provider's content filter rejects a request.
    pub fn filtered() -> Self {
        Self {
            cell_grid: Vec::new(),
            value_basis: ValueBasis::Unknown,
            content_filtered: true,
        }
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.cell_grid.len()
    }

    /// Number of columns of the widest row.
    pub fn column_count(&self) -> usize {
        self.cell_grid.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Check if no cells were extracted.
    pub fn is_empty(&self) -> bool {
        self.cell_grid.iter().all(Vec::is_empty)
    }
}

/// Verifier response for one extraction attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VerificationFeedback {
    /// Every error found in the extracted values; empty when none
    pub messages: String,

    /// Whether the table should be extracted again using these messages
    pub reextraction_required: bool,
}

/// Advisory record of how verification ended for a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    /// Number of extraction attempts made
    pub attempts: u32,

    /// Whether the verifier accepted the final attempt
    pub accepted: bool,

    /// Feedback from the last rejected attempt, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_feedback: Option<String>,
}
