//! Per-table extract/verify loop.
//!
//! The loop is an explicit state machine: [`transition`] maps the current
//! [`LoopState`] and an [`Event`] to the next state and the [`Effect`]s the
//! driver must perform. It does no I/O, so every retry path can be tested
//! without a model. [`run_extraction_loop`] performs the effects against a
//! [`LanguageModel`] and feeds their outcomes back as events.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::llm::{
    prompts, request_structured, CompletionRequest, LanguageModel, Structured, TableDataResult,
};
use crate::model::{
    ExtractionResult, PipelineState, RetryProgress, Table, TableId, VerificationFeedback,
    VerificationRecord,
};

/// Phase of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the next pending table
    Select,
    /// Waiting for an extraction of the active table
    Extract,
    /// Waiting for a verification of the active table
    Verify,
    /// Every table has data
    Done,
}

/// Outcome reported to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Result of a pending-table lookup
    NextPending(Option<TableId>),
    /// The active table received new data
    Extracted,
    /// The verifier answered for the active table
    Verified(VerificationFeedback),
}

/// Work the driver must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Look up the next table without data
    FindPending,
    /// Extract a table, with verifier feedback on a retry
    Extract {
        /// Table to extract
        table: TableId,
        /// Feedback from the previous verification
        feedback: Option<String>,
    },
    /// Verify the data of a table
    Verify {
        /// Table to verify
        table: TableId,
    },
    /// Persist the pipeline state
    Checkpoint,
}

/// State of the extract/verify loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopState {
    /// Current phase
    pub phase: Phase,
    /// Table whose cycle is in progress
    pub active: Option<TableId>,
    /// Retry progress of the table in progress
    pub progress: BTreeMap<TableId, RetryProgress>,
    /// Extraction attempts per table
    pub max_retries: u32,
}

impl LoopState {
    /// Initial state; the first effect to perform is [`Effect::FindPending`].
    pub fn new(max_retries: u32, progress: BTreeMap<TableId, RetryProgress>) -> Self {
        Self {
            phase: Phase::Select,
            active: None,
            progress,
            max_retries: max_retries.max(1),
        }
    }

    /// Retry counter of a table (1 when no cycle is in progress).
    pub fn retry_counter(&self, table: TableId) -> u32 {
        self.progress
            .get(&table)
            .map(|p| p.retry_counter)
            .unwrap_or(1)
    }

    fn finish_table(mut self, table: TableId) -> (Self, Vec<Effect>) {
        self.progress.remove(&table);
        self.active = None;
        self.phase = Phase::Select;
        (self, vec![Effect::Checkpoint, Effect::FindPending])
    }
}

fn invalid(state: &LoopState, event: &Event) -> Error {
    Error::InvalidTransition(format!(
        "{:?} in phase {:?} (active table: {:?})",
        event, state.phase, state.active
    ))
}

/// Advance the loop by one event.
///
/// - `Select` + pending table: start or resume its cycle and extract it.
/// - `Select` + nothing pending: done.
/// - `Extract` + extracted: verify, unless the table has used all of its
///   attempts, in which case the last data is kept and the table finishes.
/// - `Verify` + re-extraction required: count the attempt, keep the
///   feedback, checkpoint and extract the same table again.
/// - `Verify` + accepted: the table finishes.
pub fn transition(mut state: LoopState, event: Event) -> Result<(LoopState, Vec<Effect>)> {
    match (state.phase, state.active, &event) {
        (Phase::Select, None, Event::NextPending(Some(table))) => {
            let table = *table;
            let progress = state.progress.entry(table).or_default();
            let feedback = progress.feedback.clone();
            state.active = Some(table);
            state.phase = Phase::Extract;
            Ok((state, vec![Effect::Extract { table, feedback }]))
        }
        (Phase::Select, None, Event::NextPending(None)) => {
            state.phase = Phase::Done;
            Ok((state, vec![Effect::Checkpoint]))
        }
        (Phase::Extract, Some(table), Event::Extracted) => {
            if state.retry_counter(table) >= state.max_retries {
                log::warn!(
                    "Table {}: verification abandoned after {} attempt(s)",
                    table,
                    state.max_retries
                );
                return Ok(state.finish_table(table));
            }
            state.phase = Phase::Verify;
            Ok((state, vec![Effect::Verify { table }]))
        }
        (Phase::Verify, Some(table), Event::Verified(feedback)) => {
            if !feedback.reextraction_required {
                return Ok(state.finish_table(table));
            }
            let progress = state.progress.entry(table).or_default();
            progress.retry_counter += 1;
            progress.feedback = Some(feedback.messages.clone());
            let feedback = progress.feedback.clone();
            log::info!(
                "Table {}: re-extraction requested (attempt {})",
                table,
                progress.retry_counter
            );
            state.phase = Phase::Extract;
            Ok((
                state,
                vec![Effect::Checkpoint, Effect::Extract { table, feedback }],
            ))
        }
        _ => Err(invalid(&state, &event)),
    }
}

/// Table to select next: a table with a cycle in progress, else the first
/// table without data.
pub fn find_pending(
    state: &PipelineState,
    progress: &BTreeMap<TableId, RetryProgress>,
) -> Option<TableId> {
    progress
        .keys()
        .copied()
        .find(|id| state.table(*id).is_some())
        .or_else(|| state.next_pending_table())
}

/// Extract one table. A content-filter refusal yields an empty placeholder.
pub fn extract_table(
    model: &dyn LanguageModel,
    state: &PipelineState,
    table: &Table,
    feedback: Option<&str>,
) -> Result<ExtractionResult> {
    let request = CompletionRequest::for_schema::<TableDataResult>(
        prompts::EXTRACTION_SYSTEM,
        prompts::extraction_user(&table.content, feedback),
    )
    .with_images(state.images_of(table));

    let extraction = match request_structured::<TableDataResult>(model, &request)? {
        Structured::Value(result) => result.into(),
        Structured::ContentFiltered(reason) => {
            log::warn!("Table {}: extraction filtered ({}); using empty result", table.id, reason);
            ExtractionResult::filtered()
        }
    };
    Ok(extraction)
}

/// Verify the data of one table. A content-filter refusal accepts the data.
pub fn verify_table(
    model: &dyn LanguageModel,
    state: &PipelineState,
    table: &Table,
    extraction: &ExtractionResult,
) -> Result<VerificationFeedback> {
    let request = CompletionRequest::for_schema::<VerificationFeedback>(
        prompts::VERIFICATION_SYSTEM,
        prompts::verification_user(&table.content, extraction),
    )
    .with_images(state.images_of(table));

    Ok(request_structured::<VerificationFeedback>(model, &request)?
        .unwrap_or_else(|_| VerificationFeedback::default()))
}

fn active_table(state: &PipelineState, id: TableId) -> Result<&Table> {
    state
        .table(id)
        .ok_or_else(|| Error::InvalidTransition(format!("table {} does not exist", id)))
}

/// Run the loop until every table has data.
///
/// `checkpoint` is called whenever a table finishes, before every
/// re-extraction and once at the end, with the retry progress copied into
/// the state.
pub fn run_extraction_loop<C>(
    mut state: PipelineState,
    model: &dyn LanguageModel,
    max_retries: u32,
    mut checkpoint: C,
) -> Result<PipelineState>
where
    C: FnMut(&PipelineState) -> Result<()>,
{
    let mut machine = LoopState::new(max_retries, std::mem::take(&mut state.retry_progress));
    let mut effects = vec![Effect::FindPending];

    while !effects.is_empty() {
        let mut events = Vec::new();
        for effect in effects.drain(..) {
            match effect {
                Effect::FindPending => {
                    events.push(Event::NextPending(find_pending(&state, &machine.progress)));
                }
                Effect::Extract { table, feedback } => {
                    let attempt = machine.retry_counter(table);
                    log::info!("Extracting table {} (attempt {})", table, attempt);
                    let target = active_table(&state, table)?;
                    let extraction = extract_table(model, &state, target, feedback.as_deref())?;
                    if let Some(target) = state.table_mut(table) {
                        target.extracted_data = Some(extraction);
                        target
                            .verification
                            .get_or_insert_with(VerificationRecord::default)
                            .attempts = attempt;
                    }
                    events.push(Event::Extracted);
                }
                Effect::Verify { table } => {
                    let target = active_table(&state, table)?;
                    let extraction = target.extracted_data.clone().unwrap_or_default();
                    let feedback = verify_table(model, &state, target, &extraction)?;
                    if let Some(target) = state.table_mut(table) {
                        let record = target
                            .verification
                            .get_or_insert_with(VerificationRecord::default);
                        record.accepted = !feedback.reextraction_required;
                        if feedback.reextraction_required {
                            record.last_feedback = Some(feedback.messages.clone());
                        }
                    }
                    events.push(Event::Verified(feedback));
                }
                Effect::Checkpoint => {
                    state.retry_progress = machine.progress.clone();
                    checkpoint(&state)?;
                }
            }
        }

        for event in events {
            let (next, more) = transition(machine, event)?;
            machine = next;
            effects.extend(more);
        }
    }

    state.retry_progress = machine.progress;
    log::info!(
        "'{}': extraction finished for {} table(s)",
        state.document,
        state.tables.len()
    );
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required(messages: &str) -> Event {
        Event::Verified(VerificationFeedback {
            messages: messages.into(),
            reextraction_required: true,
        })
    }

    fn accepted() -> Event {
        Event::Verified(VerificationFeedback::default())
    }

    fn step(state: LoopState, event: Event) -> (LoopState, Vec<Effect>) {
        transition(state, event).unwrap()
    }

    #[test]
    fn test_accepted_first_time() {
        let state = LoopState::new(3, BTreeMap::new());
        let (state, effects) = step(state, Event::NextPending(Some(TableId(4))));
        assert_eq!(
            effects,
            vec![Effect::Extract {
                table: TableId(4),
                feedback: None
            }]
        );
        let (state, effects) = step(state, Event::Extracted);
        assert_eq!(effects, vec![Effect::Verify { table: TableId(4) }]);
        let (state, effects) = step(state, accepted());
        assert_eq!(effects, vec![Effect::Checkpoint, Effect::FindPending]);
        assert_eq!(state.phase, Phase::Select);
        assert!(state.progress.is_empty());

        let (state, effects) = step(state, Event::NextPending(None));
        assert_eq!(state.phase, Phase::Done);
        assert_eq!(effects, vec![Effect::Checkpoint]);
    }

    #[test]
    fn test_retry_cap_cycles_counter() {
        let table = TableId(0);
        let mut state = LoopState::new(3, BTreeMap::new());
        let mut extractions = 0;
        let mut verifications = 0;
        let mut counters = Vec::new();
        let mut effects: Vec<Effect>;

        (state, _) = step(state, Event::NextPending(Some(table)));
        extractions += 1;
        loop {
            counters.push(state.retry_counter(table));
            (state, effects) = step(state, Event::Extracted);
            if effects.contains(&Effect::FindPending) {
                break;
            }
            verifications += 1;
            (state, effects) = step(state, required("wrong"));
            assert_eq!(effects[0], Effect::Checkpoint);
            assert!(matches!(effects[1], Effect::Extract { .. }));
            extractions += 1;
        }

        assert_eq!(extractions, 3);
        assert_eq!(verifications, 2);
        assert_eq!(counters, vec![1, 2, 3]);
        assert_eq!(state.retry_counter(table), 1);
        assert_eq!(effects, vec![Effect::Checkpoint, Effect::FindPending]);
    }

    #[test]
    fn test_feedback_targets_same_table() {
        let state = LoopState::new(3, BTreeMap::new());
        let (state, _) = step(state, Event::NextPending(Some(TableId(2))));
        let (state, _) = step(state, Event::Extracted);
        let (state, effects) = step(state, required("SiO2 is 65.8"));
        assert_eq!(
            effects,
            vec![
                Effect::Checkpoint,
                Effect::Extract {
                    table: TableId(2),
                    feedback: Some("SiO2 is 65.8".into())
                }
            ]
        );
        assert_eq!(state.active, Some(TableId(2)));
        assert_eq!(state.retry_counter(TableId(2)), 2);
    }

    #[test]
    fn test_resume_uses_stored_feedback() {
        let mut progress = BTreeMap::new();
        progress.insert(
            TableId(1),
            RetryProgress {
                retry_counter: 2,
                feedback: Some("check row 3".into()),
            },
        );
        let state = LoopState::new(3, progress);
        let (_, effects) = step(state, Event::NextPending(Some(TableId(1))));
        assert_eq!(
            effects,
            vec![Effect::Extract {
                table: TableId(1),
                feedback: Some("check row 3".into())
            }]
        );
    }

    #[test]
    fn test_single_attempt_skips_verification() {
        let state = LoopState::new(1, BTreeMap::new());
        let (state, _) = step(state, Event::NextPending(Some(TableId(0))));
        let (_, effects) = step(state, Event::Extracted);
        assert_eq!(effects, vec![Effect::Checkpoint, Effect::FindPending]);
    }

    #[test]
    fn test_invalid_transitions() {
        let state = LoopState::new(3, BTreeMap::new());
        assert!(matches!(
            transition(state.clone(), Event::Extracted),
            Err(Error::InvalidTransition(_))
        ));
        assert!(matches!(
            transition(state, accepted()),
            Err(Error::InvalidTransition(_))
        ));
    }
}
