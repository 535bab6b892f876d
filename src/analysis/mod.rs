//! Document analysis: OCR text and table geometry.
//!
//! A [`DocumentAnalyzer`] returns the raw layout result of an external
//! service; [`build_state`] turns that result into the pages and table
//! fragments the rest of the pipeline works on.

mod adapter;
#[cfg(feature = "http")]
mod azure;

pub use adapter::{build_state, page_content, serialize_table, table_grid, COLUMN_DELIMITER};
#[cfg(feature = "http")]
pub use azure::AzureDocumentIntelligence;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::DocumentSource;

/// Layout analysis result as reported by the service.
///
/// Offsets and lengths count Unicode code points into `content`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    /// Text of the whole document
    #[serde(default)]
    pub content: String,

    /// Pages in document order
    #[serde(default)]
    pub pages: Vec<AnalyzedPage>,

    /// Detected table fragments in reading order
    #[serde(default)]
    pub tables: Vec<AnalyzedTable>,
}

/// One analyzed page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedPage {
    /// Page number (1-indexed)
    pub page_number: u32,

    /// Spans of `content` that belong to this page
    #[serde(default)]
    pub spans: Vec<Span>,
}

/// A range of the global content buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Start offset
    pub offset: usize,
    /// Length
    pub length: usize,
}

/// One detected table fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedTable {
    /// Number of rows
    pub row_count: usize,

    /// Number of columns
    pub column_count: usize,

    /// Cells; missing positions are empty
    #[serde(default)]
    pub cells: Vec<AnalyzedCell>,

    /// Optional caption
    #[serde(default)]
    pub caption: Option<Caption>,

    /// Regions the fragment covers; the first determines its page
    #[serde(default)]
    pub bounding_regions: Vec<BoundingRegion>,
}

/// One table cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedCell {
    /// Row index (0 is the header row)
    pub row_index: usize,

    /// Column index
    pub column_index: usize,

    /// Cell text
    #[serde(default)]
    pub content: String,
}

/// Table caption.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    /// Caption text
    pub content: String,
}

/// Page location of a table fragment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingRegion {
    /// Page number (1-indexed)
    pub page_number: u32,
}

/// External layout analysis service.
pub trait DocumentAnalyzer: Send + Sync {
    /// Analyze a document, blocking until the full result is available.
    fn analyze(&self, source: &DocumentSource) -> Result<AnalyzeResult>;
}
