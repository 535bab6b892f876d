//! Table types.

use super::{ExtractionResult, VerificationRecord};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable table identifier.
///
/// Identifiers are allocated once by [`PipelineState`](super::PipelineState)
/// and never reused, so they survive merging and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A detected table, either a single fragment or a merged logical table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Table identifier
    pub id: TableId,

    /// Serialized cell grid (caption line, then rows joined by `||`)
    pub content: String,

    /// Pages the table spans, ascending and non-empty
    pub page_refs: Vec<u32>,

    /// Structured data, once extracted
    #[serde(default)]
    pub extracted_data: Option<ExtractionResult>,

    /// Outcome of the last verification cycle (advisory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationRecord>,
}

impl Table {
    /// Create a single-page table fragment.
    pub fn fragment(id: TableId, content: impl Into<String>, page: u32) -> Self {
        Self {
            id,
            content: content.into(),
            page_refs: vec![page],
            extracted_data: None,
            verification: None,
        }
    }

    /// Combine fragments into one logical table with a new identifier.
    ///
    /// Contents are joined with a newline in fragment order; pages are the
    /// sorted union of the fragments' pages.
    pub fn merged(id: TableId, fragments: &[Table]) -> Self {
        let content = fragments
            .iter()
            .map(|t| t.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let mut page_refs: Vec<u32> = fragments
            .iter()
            .flat_map(|t| t.page_refs.iter().copied())
            .collect();
        page_refs.sort_unstable();
        page_refs.dedup();

        Self {
            id,
            content,
            page_refs,
            extracted_data: None,
            verification: None,
        }
    }

    /// First page of the table.
    pub fn first_page(&self) -> u32 {
        self.page_refs.first().copied().unwrap_or(0)
    }

    /// Last page of the table.
    pub fn last_page(&self) -> u32 {
        self.page_refs.last().copied().unwrap_or(0)
    }

    /// Check whether the table has a fragment on the given page.
    pub fn spans_page(&self, page: u32) -> bool {
        self.page_refs.binary_search(&page).is_ok()
    }

    /// Check whether structured data has been attached.
    pub fn is_extracted(&self) -> bool {
        self.extracted_data.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment() {
        let table = Table::fragment(TableId(4), "A||B", 7);
        assert_eq!(table.page_refs, vec![7]);
        assert_eq!(table.first_page(), 7);
        assert_eq!(table.last_page(), 7);
        assert!(!table.is_extracted());
    }

    #[test]
    fn test_merged() {
        let a = Table::fragment(TableId(0), "\nSiO2||60", 2);
        let b = Table::fragment(TableId(1), "\nAl2O3||20", 3);
        let merged = Table::merged(TableId(5), &[a, b]);

        assert_eq!(merged.id, TableId(5));
        assert_eq!(merged.content, "\nSiO2||60\n\nAl2O3||20");
        assert_eq!(merged.page_refs, vec![2, 3]);
        assert!(merged.spans_page(3));
        assert!(!merged.spans_page(4));
    }

    #[test]
    fn test_table_id_serializes_as_number() {
        let json = serde_json::to_string(&TableId(3)).unwrap();
        assert_eq!(json, "3");
        assert_eq!(TableId(3).to_string(), "#3");
    }
}
