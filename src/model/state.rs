//! Aggregate pipeline state.

use super::{Page, PageImage, Table, TableId};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Retry bookkeeping for one table in the extract/verify loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryProgress {
    /// Current attempt number, starting at 1
    pub retry_counter: u32,

    /// Verifier feedback for the next extraction attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl Default for RetryProgress {
    fn default() -> Self {
        Self {
            retry_counter: 1,
            feedback: None,
        }
    }
}

/// Pages, tables and extraction progress of one document.
///
/// Stages take the state by value and return the next state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineState {
    /// Document identifier the state was created from
    pub document: String,

    /// Full OCR text of the document
    #[serde(default)]
    pub ocr_text: String,

    /// Pages in ascending page-number order
    #[serde(default)]
    pub pages: Vec<Page>,

    /// Tables in reading order
    #[serde(default)]
    pub tables: Vec<Table>,

    /// Per-table retry progress of tables with a pending verification cycle
    #[serde(default)]
    pub retry_progress: BTreeMap<TableId, RetryProgress>,

    #[serde(default)]
    next_table_id: u32,
}

impl PipelineState {
    /// Create an empty state for a document.
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            ..Self::default()
        }
    }

    /// Build a state from analyzed pages and tables.
    ///
    /// The identifier allocator continues after the highest table id seen,
    /// and page table references are rebuilt from the tables.
    pub fn from_parts(
        document: impl Into<String>,
        ocr_text: impl Into<String>,
        pages: Vec<Page>,
        tables: Vec<Table>,
    ) -> Self {
        let next_table_id = tables.iter().map(|t| t.id.0 + 1).max().unwrap_or(0);
        let mut state = Self {
            document: document.into(),
            ocr_text: ocr_text.into(),
            pages,
            tables,
            retry_progress: BTreeMap::new(),
            next_table_id,
        };
        state.rebuild_page_index();
        state
    }

    /// Allocate a table identifier that has never been used in this state.
    pub fn allocate_table_id(&mut self) -> TableId {
        let id = TableId(self.next_table_id);
        self.next_table_id += 1;
        id
    }

    /// Get a page by number (1-indexed).
    pub fn page(&self, number: u32) -> Option<&Page> {
        self.pages.iter().find(|p| p.number == number)
    }

    /// Get a table by identifier.
    pub fn table(&self, id: TableId) -> Option<&Table> {
        self.tables.iter().find(|t| t.id == id)
    }

    /// Get a mutable table by identifier.
    pub fn table_mut(&mut self, id: TableId) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.id == id)
    }

    /// Page numbers in state order.
    pub fn page_numbers(&self) -> Vec<u32> {
        self.pages.iter().map(|p| p.number).collect()
    }

    /// Pages spanned by a table, in `page_refs` order.
    pub fn pages_of<'a>(&'a self, table: &'a Table) -> impl Iterator<Item = &'a Page> + 'a {
        table.page_refs.iter().filter_map(move |&n| self.page(n))
    }

    /// Images of the pages spanned by a table, in `page_refs` order.
    ///
    /// Pages without an attached image are skipped.
    pub fn images_of(&self, table: &Table) -> Vec<PageImage> {
        self.pages_of(table)
            .filter_map(|p| p.image.clone())
            .collect()
    }

    /// First table (in order) without extracted data.
    pub fn next_pending_table(&self) -> Option<TableId> {
        self.tables
            .iter()
            .find(|t| t.extracted_data.is_none())
            .map(|t| t.id)
    }

    /// Rebuild every page's `table_refs` from the tables' `page_refs`.
    pub fn rebuild_page_index(&mut self) {
        let mut index: BTreeMap<u32, BTreeSet<TableId>> = BTreeMap::new();
        for table in &self.tables {
            for &page in &table.page_refs {
                index.entry(page).or_default().insert(table.id);
            }
        }
        for page in &mut self.pages {
            page.table_refs = index.remove(&page.number).unwrap_or_default();
        }
    }

    /// Attach page images by position (image `i` belongs to page `i + 1`).
    pub fn attach_images(&mut self, images: Vec<PageImage>) {
        for (i, image) in images.into_iter().enumerate() {
            let number = i as u32 + 1;
            if let Some(page) = self.pages.iter_mut().find(|p| p.number == number) {
                page.image = Some(image);
            }
        }
    }

    /// Check that every table page reference names a page of the state.
    pub fn check_page_refs(&self) -> Result<()> {
        let last = self.pages.iter().map(|p| p.number).max().unwrap_or(0);
        for table in &self.tables {
            if let Some(&missing) = table.page_refs.iter().find(|&&n| self.page(n).is_none()) {
                return Err(Error::PageOutOfRange(missing, last));
            }
        }
        Ok(())
    }

    /// Check whether every table has extracted data.
    pub fn all_extracted(&self) -> bool {
        self.tables.iter().all(Table::is_extracted)
    }
}
