//! Cross-page table merging.

use crate::error::Result;
use crate::llm::{
    prompts, request_structured, CompletionRequest, Continuity, ContinuityVerdict, LanguageModel,
};
use crate::model::{PipelineState, Table};

/// Merge table fragments with a continuity classifier.
///
/// Tables are walked once in page order. A table joins the current group
/// only when it starts exactly one page after the group's last fragment
/// and `classify(last_page, next_page)` says `Continuous`; the classifier
/// is not consulted otherwise. Groups of several fragments become one table
/// with a fresh identifier, single fragments keep theirs. Page table
/// references are rebuilt afterwards.
pub fn merge_with<F>(mut state: PipelineState, mut classify: F) -> Result<PipelineState>
where
    F: FnMut(&PipelineState, u32, u32) -> Result<Continuity>,
{
    let mut fragments = std::mem::take(&mut state.tables);
    fragments.sort_by_key(Table::first_page);

    let mut groups: Vec<Vec<Table>> = Vec::new();
    for table in fragments {
        if let Some(group) = groups.last_mut() {
            let last_page = group.last().map(Table::last_page).unwrap_or(0);
            let next_page = table.first_page();
            if next_page == last_page + 1
                && classify(&state, last_page, next_page)? == Continuity::Continuous
            {
                log::debug!("Table {} continues on page {}", table.id, next_page);
                group.push(table);
                continue;
            }
        }
        groups.push(vec![table]);
    }

    let fragment_count: usize = groups.iter().map(Vec::len).sum();
    let mut tables = Vec::with_capacity(groups.len());
    for mut group in groups {
        if group.len() == 1 {
            tables.extend(group.pop());
            continue;
        }
        let id = state.allocate_table_id();
        let merged = Table::merged(id, &group);
        log::info!(
            "Merged {} fragment(s) into table {} spanning pages {:?}",
            group.len(),
            id,
            merged.page_refs
        );
        tables.push(merged);
    }

    log::info!(
        "'{}': {} fragment(s) merged into {} table(s)",
        state.document,
        fragment_count,
        tables.len()
    );
    state.tables = tables;
    state.rebuild_page_index();
    Ok(state)
}

/// Ask the model whether the tables on two consecutive pages are one table.
///
/// A content-filter refusal counts as `Distinct`.
pub fn classify_continuity(
    model: &dyn LanguageModel,
    state: &PipelineState,
    first_page: u32,
    second_page: u32,
) -> Result<Continuity> {
    let images = [first_page, second_page]
        .into_iter()
        .filter_map(|n| state.page(n).and_then(|p| p.image.clone()));
    let request = CompletionRequest::for_schema::<ContinuityVerdict>(
        prompts::CONTINUITY_SYSTEM,
        prompts::continuity_user(first_page, second_page),
    )
    .with_images(images);

    let verdict = request_structured::<ContinuityVerdict>(model, &request)?;
    let decision = verdict
        .unwrap_or_else(|_| ContinuityVerdict {
            reasoning: String::new(),
            decision: Continuity::Distinct,
        })
        .decision;
    log::debug!("Pages {}-{}: {:?}", first_page, second_page, decision);
    Ok(decision)
}

/// Merge stage: merge fragments using the model as classifier.
pub fn merge_tables(state: PipelineState, model: &dyn LanguageModel) -> Result<PipelineState> {
    merge_with(state, |state, first, second| {
        classify_continuity(model, state, first, second)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Completion;
    use crate::model::{Page, PageImage, TableId};
    use std::sync::Mutex;

    /// Records the images of every request and answers `CONTINUOUS`.
    #[derive(Default)]
    struct ImageRecorder(Mutex<Vec<Vec<u8>>>);

    impl LanguageModel for ImageRecorder {
        fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
            let mut seen = self.0.lock().unwrap();
            seen.extend(request.images.iter().map(|image| image.data.clone()));
            Ok(Completion::Json(serde_json::json!({
                "reasoning": "header repeats",
                "decision": "CONTINUOUS"
            })))
        }
    }

    fn state(fragments: &[(u32, u32)], pages: u32) -> PipelineState {
        let pages = (1..=pages).map(|n| Page::new(n, format!("p{}", n))).collect();
        let tables = fragments
            .iter()
            .map(|&(id, page)| Table::fragment(TableId(id), format!("t{}", id), page))
            .collect();
        PipelineState::from_parts("doc", "", pages, tables)
    }

    #[test]
    fn test_continuous_fragments_merge() {
        let mut calls = Vec::new();
        let merged = merge_with(state(&[(0, 1), (1, 2), (2, 3)], 3), |_, a, b| {
            calls.push((a, b));
            Ok(Continuity::Continuous)
        })
        .unwrap();

        assert_eq!(calls, vec![(1, 2), (2, 3)]);
        assert_eq!(merged.tables.len(), 1);
        let table = &merged.tables[0];
        assert_eq!(table.id, TableId(3));
        assert_eq!(table.page_refs, vec![1, 2, 3]);
        assert_eq!(table.content, "t0\nt1\nt2");
        for n in 1..=3 {
            let page = merged.page(n).unwrap();
            assert!(page.references(TableId(3)));
            assert_eq!(page.table_refs.len(), 1);
        }
    }

    #[test]
    fn test_page_gap_never_classified() {
        let mut calls = 0;
        let merged = merge_with(state(&[(0, 1), (1, 3)], 3), |_, _, _| {
            calls += 1;
            Ok(Continuity::Continuous)
        })
        .unwrap();

        assert_eq!(calls, 0);
        assert_eq!(merged.tables.len(), 2);
        assert_eq!(merged.tables[0].id, TableId(0));
        assert_eq!(merged.tables[1].id, TableId(1));
    }

    #[test]
    fn test_distinct_keeps_fragments() {
        let merged = merge_with(state(&[(0, 1), (1, 2)], 2), |_, _, _| Ok(Continuity::Distinct))
            .unwrap();
        assert_eq!(merged.tables.len(), 2);
        assert!(merged.page(2).unwrap().references(TableId(1)));
    }

    #[test]
    fn test_same_page_tables_not_classified() {
        let mut calls = Vec::new();
        let merged = merge_with(state(&[(0, 1), (1, 1), (2, 2)], 2), |_, a, b| {
            calls.push((a, b));
            Ok(Continuity::Continuous)
        })
        .unwrap();

        assert_eq!(calls, vec![(1, 2)]);
        assert_eq!(merged.tables.len(), 2);
        assert_eq!(merged.tables[0].id, TableId(0));
        assert_eq!(merged.tables[1].page_refs, vec![1, 2]);
        assert_eq!(merged.page(1).unwrap().table_refs.len(), 2);
    }

    #[test]
    fn test_classifier_error_is_fatal() {
        let result = merge_with(state(&[(0, 1), (1, 2)], 2), |_, _, _| {
            Err(crate::error::Error::Llm("down".into()))
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_continuity_request_carries_both_pages() {
        let mut state = state(&[(0, 1), (1, 2)], 3);
        state.attach_images(vec![
            PageImage::png(vec![1]),
            PageImage::png(vec![2]),
            PageImage::png(vec![3]),
        ]);
        let model = ImageRecorder::default();

        let decision = classify_continuity(&model, &state, 1, 2).unwrap();

        assert_eq!(decision, Continuity::Continuous);
        assert_eq!(*model.0.lock().unwrap(), vec![vec![1], vec![2]]);
    }
}
