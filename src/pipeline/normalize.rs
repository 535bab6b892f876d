//! Normalization stage.

use crate::error::Result;
use crate::llm::{
    prompts, request_structured, CompletionRequest, LanguageModel, NormalizationResult, Structured,
};
use crate::model::{NormalizedTable, PipelineState, Table};
use crate::normalize::Normalizer;

/// Reshape one table's grid, asking the model for orientation when given.
///
/// Empty or filtered extractions, and model refusals, use the
/// deterministic orientation detection instead.
pub fn reshape_table(
    model: Option<&dyn LanguageModel>,
    normalizer: &Normalizer,
    table: &Table,
) -> Result<NormalizationResult> {
    let Some(extraction) = table.extracted_data.as_ref() else {
        return Ok(normalizer.fallback(&[]));
    };
    let model = match model {
        Some(model) if !extraction.is_empty() && !extraction.content_filtered => model,
        _ => return Ok(normalizer.fallback(&extraction.cell_grid)),
    };

    let request = CompletionRequest::for_schema::<NormalizationResult>(
        prompts::NORMALIZATION_SYSTEM,
        prompts::normalization_user(extraction),
    );
    match request_structured::<NormalizationResult>(model, &request)? {
        Structured::Value(result) => Ok(result),
        Structured::ContentFiltered(_) => {
            log::warn!("Table {}: normalization filtered; detecting orientation locally", table.id);
            Ok(normalizer.fallback(&extraction.cell_grid))
        }
    }
}

/// Normalize every extracted table.
///
/// Tables without data are skipped.
pub fn normalize_tables(
    state: &PipelineState,
    model: Option<&dyn LanguageModel>,
    normalizer: &Normalizer,
) -> Result<Vec<NormalizedTable>> {
    let mut tables = Vec::with_capacity(state.tables.len());
    for table in &state.tables {
        if !table.is_extracted() {
            log::warn!("Table {} has no data; not normalized", table.id);
            continue;
        }
        let reshaped = reshape_table(model, normalizer, table)?;
        let normalized = normalizer.normalize(table, &reshaped);
        log::debug!(
            "Table {}: {} example(s), {} value(s)",
            table.id,
            normalized.examples.len(),
            normalized.molecule_count()
        );
        tables.push(normalized);
    }
    Ok(tables)
}
