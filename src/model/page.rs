//! Page-level types.

use super::{PageImage, TableId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single page of the analyzed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// Page number (1-indexed)
    pub number: u32,

    /// OCR text of the page
    pub content: String,

    /// Tables that have at least one fragment on this page
    #[serde(default)]
    pub table_refs: BTreeSet<TableId>,

    /// Rasterized page image, attached after analysis and never checkpointed
    #[serde(skip)]
    pub image: Option<PageImage>,
}

impl Page {
    /// Create a new page with the given text content.
    pub fn new(number: u32, content: impl Into<String>) -> Self {
        Self {
            number,
            content: content.into(),
            table_refs: BTreeSet::new(),
            image: None,
        }
    }

    /// Attach a page image.
    pub fn with_image(mut self, image: PageImage) -> Self {
        self.image = Some(image);
        self
    }

    /// Check whether a table is referenced from this page.
    pub fn references(&self, id: TableId) -> bool {
        self.table_refs.contains(&id)
    }

    /// Check if the page has no text content.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}
