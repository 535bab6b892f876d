//! Table relevance filter.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::llm::{
    prompts, request_structured, CompletionRequest, LanguageModel, Relevance, RelevanceVerdict,
    Structured,
};
use crate::model::{PipelineState, Table};

/// Drop tables the classifier rejects and narrow pages to the survivors.
///
/// The remaining pages are exactly the union of the surviving tables'
/// page references, in ascending page order.
pub fn filter_with<F>(mut state: PipelineState, mut classify: F) -> Result<PipelineState>
where
    F: FnMut(&PipelineState, &Table) -> Result<Relevance>,
{
    let candidates = std::mem::take(&mut state.tables);
    let total = candidates.len();

    let mut kept = Vec::with_capacity(total);
    for table in candidates {
        match classify(&state, &table)? {
            Relevance::Relevant => kept.push(table),
            Relevance::Irrelevant => log::info!("Dropping irrelevant table {}", table.id),
        }
    }

    let referenced: BTreeSet<u32> = kept
        .iter()
        .flat_map(|t| t.page_refs.iter().copied())
        .collect();
    state.pages.retain(|p| referenced.contains(&p.number));
    state.pages.sort_by_key(|p| p.number);
    state.tables = kept;
    state.rebuild_page_index();

    log::info!(
        "'{}': {} of {} table(s) relevant, {} page(s) kept",
        state.document,
        state.tables.len(),
        total,
        state.pages.len()
    );
    Ok(state)
}

/// Ask the model whether a table lists concrete composition examples.
///
/// The request carries the table content, the text of every page it spans
/// and their images. A content-filter refusal counts as `Irrelevant`.
pub fn classify_relevance(
    model: &dyn LanguageModel,
    state: &PipelineState,
    table: &Table,
) -> Result<Relevance> {
    let page_texts: Vec<&str> = state.pages_of(table).map(|p| p.content.as_str()).collect();
    let request = CompletionRequest::for_schema::<RelevanceVerdict>(
        prompts::RELEVANCE_SYSTEM,
        prompts::relevance_user(&table.content, &page_texts),
    )
    .with_images(state.images_of(table));

    let decision = match request_structured::<RelevanceVerdict>(model, &request)? {
        Structured::Value(verdict) => verdict.decision,
        Structured::ContentFiltered(_) => Relevance::Irrelevant,
    };
    log::debug!("Table {}: {:?}", table.id, decision);
    Ok(decision)
}

/// Filter stage: classify every table with the model.
pub fn filter_tables(state: PipelineState, model: &dyn LanguageModel) -> Result<PipelineState> {
    filter_with(state, |state, table| classify_relevance(model, state, table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Page, TableId};

    fn state() -> PipelineState {
        let pages = (1..=5).map(|n| Page::new(n, format!("p{}", n))).collect();
        let tables = vec![
            Table::merged(
                TableId(10),
                &[
                    Table::fragment(TableId(0), "a", 2),
                    Table::fragment(TableId(1), "b", 3),
                ],
            ),
            Table::fragment(TableId(2), "claims", 4),
            Table::fragment(TableId(3), "c", 5),
        ];
        PipelineState::from_parts("doc", "", pages, tables)
    }

    #[test]
    fn test_pages_narrowed_to_survivors() {
        let filtered = filter_with(state(), |_, table| {
            Ok(if table.content == "claims" {
                Relevance::Irrelevant
            } else {
                Relevance::Relevant
            })
        })
        .unwrap();

        assert_eq!(filtered.tables.len(), 2);
        assert_eq!(filtered.page_numbers(), vec![2, 3, 5]);
        assert!(filtered.page(3).unwrap().references(TableId(10)));
        assert!(filtered.page(4).is_none());
    }

    #[test]
    fn test_all_irrelevant_leaves_nothing() {
        let filtered = filter_with(state(), |_, _| Ok(Relevance::Irrelevant)).unwrap();
        assert!(filtered.tables.is_empty());
        assert!(filtered.pages.is_empty());
    }

    #[test]
    fn test_classifier_sees_page_text() {
        let mut seen = Vec::new();
        filter_with(state(), |state, table| {
            let texts: Vec<String> = state.pages_of(table).map(|p| p.content.clone()).collect();
            seen.push(texts);
            Ok(Relevance::Relevant)
        })
        .unwrap();
        assert_eq!(seen[0], vec!["p2".to_string(), "p3".to_string()]);
    }
}
