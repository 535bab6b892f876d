//! Conversion of raw analysis results into pipeline pages and tables.

use rayon::prelude::*;

use super::{AnalyzeResult, AnalyzedTable, Span};
use crate::model::{Page, PageImage, PipelineState, Table, TableId};

/// Delimiter between columns of a serialized table row.
pub const COLUMN_DELIMITER: &str = "||";

/// Byte offsets of every code point in `content`, plus the end offset.
fn char_boundaries(content: &str) -> Vec<usize> {
    content
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(content.len()))
        .collect()
}

fn slice_span<'a>(content: &'a str, boundaries: &[usize], span: &Span) -> &'a str {
    let last = boundaries.len() - 1;
    let start = boundaries[span.offset.min(last)];
    let end = boundaries[span.offset.saturating_add(span.length).min(last)];
    &content[start..end]
}

/// Text of a page: its spans concatenated in reported order.
pub fn page_content(content: &str, spans: &[Span]) -> String {
    let boundaries = char_boundaries(content);
    spans
        .iter()
        .map(|span| slice_span(content, &boundaries, span))
        .collect()
}

/// Dense cell grid of a table; positions without a cell are empty strings.
pub fn table_grid(table: &AnalyzedTable) -> Vec<Vec<String>> {
    let mut grid = vec![vec![String::new(); table.column_count]; table.row_count];
    for cell in &table.cells {
        if let Some(slot) = grid
            .get_mut(cell.row_index)
            .and_then(|row| row.get_mut(cell.column_index))
        {
            *slot = cell.content.clone();
        } else {
            log::debug!(
                "Cell ({}, {}) outside {}x{} table ignored",
                cell.row_index,
                cell.column_index,
                table.row_count,
                table.column_count
            );
        }
    }
    grid
}

/// Serialize a table: caption line first, then one line per row.
pub fn serialize_table(caption: &str, grid: &[Vec<String>]) -> String {
    let mut lines = Vec::with_capacity(grid.len() + 1);
    lines.push(caption.to_string());
    lines.extend(grid.iter().map(|row| row.join(COLUMN_DELIMITER)));
    lines.join("\n")
}

/// Build the initial pipeline state from an analysis result.
///
/// Every detected fragment becomes a single-page table whose page is the
/// page of its first bounding region. Images are attached by position.
pub fn build_state(
    document: &str,
    result: &AnalyzeResult,
    images: Vec<PageImage>,
) -> PipelineState {
    let pages: Vec<Page> = result
        .pages
        .par_iter()
        .map(|page| Page::new(page.page_number, page_content(&result.content, &page.spans)))
        .collect();

    let mut tables: Vec<Table> = result
        .tables
        .par_iter()
        .enumerate()
        .map(|(i, table)| {
            let caption = table.caption.as_ref().map(|c| c.content.as_str()).unwrap_or("");
            let page = table
                .bounding_regions
                .first()
                .map(|r| r.page_number)
                .unwrap_or_else(|| {
                    log::warn!("Table {} has no bounding region; assuming page 1", i);
                    1
                });
            Table::fragment(TableId(i as u32), serialize_table(caption, &table_grid(table)), page)
        })
        .collect();

    // Merging walks tables in page order.
    tables.sort_by_key(Table::first_page);

    log::info!(
        "Analysis of '{}': {} page(s), {} table fragment(s)",
        document,
        pages.len(),
        tables.len()
    );

    let mut state = PipelineState::from_parts(document, result.content.clone(), pages, tables);
    if !images.is_empty() && images.len() != state.pages.len() {
        log::warn!(
            "'{}': {} page image(s) for {} page(s)",
            document,
            images.len(),
            state.pages.len()
        );
    }
    state.attach_images(images);
    state
}
