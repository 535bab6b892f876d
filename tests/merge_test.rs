//! Integration tests for the merge and relevance filter stages.

mod common;

use common::*;
use compextract::error::Error;
use compextract::pipeline::{filter_tables, merge_tables};
use compextract::{build_state, PageImage, PipelineState, TableId};
use serde_json::json;

fn analyzed_state() -> PipelineState {
    let images = (0..4).map(|i| PageImage::png(vec![i])).collect();
    build_state("patent.pdf", &patent_document(), images)
}

#[test]
fn test_fragments_across_page_break_merge() {
    let model = ScriptedModel::new().reply(CONTINUITY, continuous());
    let state = merge_tables(analyzed_state(), &model).unwrap();

    // Pages 2 and 4 are not consecutive, so only one question is asked.
    assert_eq!(model.calls(CONTINUITY), 1);
    assert!(model.prompts(CONTINUITY)[0].contains("pages 1 and 2"));

    assert_eq!(state.tables.len(), 2);
    let merged = &state.tables[0];
    assert_eq!(merged.id, TableId(3));
    assert_eq!(merged.page_refs, vec![1, 2]);
    assert!(merged.content.contains("SiO2"));
    assert!(merged.content.contains("CaO"));

    for number in [1, 2] {
        let page = state.page(number).unwrap();
        assert!(page.references(TableId(3)));
        assert!(!page.references(TableId(0)));
        assert!(!page.references(TableId(1)));
    }
    assert_eq!(state.tables[1].id, TableId(2));
    assert!(state.page(4).unwrap().references(TableId(2)));
}

#[test]
fn test_distinct_fragments_keep_ids() {
    let model = ScriptedModel::new().reply(CONTINUITY, distinct());
    let state = merge_tables(analyzed_state(), &model).unwrap();

    let ids: Vec<_> = state.tables.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![TableId(0), TableId(1), TableId(2)]);
}

#[test]
fn test_filtered_continuity_counts_as_distinct() {
    let model = ScriptedModel::new().refuse(CONTINUITY);
    let state = merge_tables(analyzed_state(), &model).unwrap();
    assert_eq!(state.tables.len(), 3);
}

#[test]
fn test_malformed_verdict_is_schema_error() {
    let model = ScriptedModel::new().reply(CONTINUITY, json!({ "decision": "MAYBE" }));
    let result = merge_tables(analyzed_state(), &model);
    assert!(matches!(result, Err(Error::Schema { .. })));
}

#[test]
fn test_filter_keeps_pages_of_relevant_tables() {
    let model = ScriptedModel::new()
        .reply(CONTINUITY, continuous())
        .reply(RELEVANCE, relevant())
        .reply(RELEVANCE, irrelevant());
    let merged = merge_tables(analyzed_state(), &model).unwrap();
    let state = filter_tables(merged, &model).unwrap();

    assert_eq!(model.calls(RELEVANCE), 2);
    assert_eq!(state.tables.len(), 1);
    assert_eq!(state.tables[0].id, TableId(3));
    assert_eq!(state.page_numbers(), vec![1, 2]);
    assert!(state.pages.iter().all(|p| p.image.is_some()));
}

#[test]
fn test_filter_sends_page_text() {
    let model = ScriptedModel::new()
        .reply(CONTINUITY, continuous())
        .always(RELEVANCE, relevant());
    let merged = merge_tables(analyzed_state(), &model).unwrap();
    let state = filter_tables(merged, &model).unwrap();

    let prompts = model.prompts(RELEVANCE);
    assert!(prompts[0].contains("Example glasses were melted."));
    assert!(prompts[0].contains("Table 1 (continued)"));
    assert!(prompts[1].contains("Properties of the glasses."));
    assert_eq!(state.page_numbers(), vec![1, 2, 4]);
}

#[test]
fn test_filtered_relevance_drops_table() {
    let model = ScriptedModel::new()
        .reply(CONTINUITY, distinct())
        .refuse(RELEVANCE)
        .always(RELEVANCE, relevant());
    let merged = merge_tables(analyzed_state(), &model).unwrap();
    let state = filter_tables(merged, &model).unwrap();

    assert_eq!(state.tables.len(), 2);
    assert!(state.table(TableId(0)).is_none());
    assert_eq!(state.page_numbers(), vec![2, 4]);
}
