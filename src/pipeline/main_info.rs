//! Invoice header extraction with one verified retry.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::llm::{
    prompts, request_structured, CompletionRequest, Confidence, LanguageModel, MainInfoResult,
    MainInfoVerdict, Structured,
};
use crate::model::{PageImage, PipelineState};

/// Extracted header fields with the verifier's final judgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainInfoOutcome {
    /// Extracted fields
    pub main_info: MainInfoResult,
    /// Confidence of the last verification
    pub confidence: Confidence,
    /// Verifier reason, if any
    pub reason: Option<String>,
}

fn page_images(state: &PipelineState) -> Vec<PageImage> {
    state.pages.iter().filter_map(|p| p.image.clone()).collect()
}

fn extract(model: &dyn LanguageModel, request: CompletionRequest) -> Result<MainInfoResult> {
    Ok(request_structured::<MainInfoResult>(model, &request)?
        .unwrap_or_else(|_| MainInfoResult::filtered()))
}

fn verify(model: &dyn LanguageModel, info: &MainInfoResult) -> Result<MainInfoVerdict> {
    let serialized = serde_json::to_string_pretty(info)?;
    let request = CompletionRequest::for_schema::<MainInfoVerdict>(
        prompts::MAIN_INFO_VERIFY_SYSTEM,
        prompts::main_info_verify_user(&serialized),
    );
    Ok(match request_structured::<MainInfoVerdict>(model, &request)? {
        Structured::Value(verdict) => verdict,
        Structured::ContentFiltered(reason) => MainInfoVerdict {
            result: Confidence::Unsure,
            reason: Some(format!("Content filter error: {}", reason)),
        },
    })
}

/// Extract supplier, invoice number and date from the OCR text and pages.
///
/// An extraction the verifier rates `VERIFIED` or `CERTAIN` is accepted;
/// otherwise the fields are extracted once more with the previous answer
/// and the verifier's reason, and the second verdict is recorded as is.
pub fn extract_main_info(
    model: &dyn LanguageModel,
    state: &PipelineState,
) -> Result<MainInfoOutcome> {
    let images = page_images(state);
    let first = extract(
        model,
        CompletionRequest::for_schema::<MainInfoResult>(
            prompts::MAIN_INFO_SYSTEM,
            prompts::main_info_user(&state.ocr_text),
        )
        .with_images(images.clone()),
    )?;
    let verdict = verify(model, &first)?;
    if verdict.result.is_accepted() {
        return Ok(MainInfoOutcome {
            main_info: first,
            confidence: verdict.result,
            reason: verdict.reason,
        });
    }

    let reason = verdict.reason.unwrap_or_default();
    log::info!(
        "'{}': main info rated {:?}, retrying ({})",
        state.document,
        verdict.result,
        reason
    );
    let previous = serde_json::to_string_pretty(&first)?;
    let second = extract(
        model,
        CompletionRequest::for_schema::<MainInfoResult>(
            prompts::MAIN_INFO_RETRY_SYSTEM,
            prompts::main_info_retry_user(&previous, &reason, &state.ocr_text),
        )
        .with_images(images),
    )?;
    let verdict = verify(model, &second)?;
    Ok(MainInfoOutcome {
        main_info: second,
        confidence: verdict.result,
        reason: verdict.reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Completion;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    struct Replies(Mutex<Vec<Completion>>);

    impl LanguageModel for Replies {
        fn complete(&self, _request: &CompletionRequest) -> Result<Completion> {
            Ok(self.0.lock().unwrap().remove(0))
        }
    }

    fn info(supplier: &str) -> Completion {
        Completion::Json(json!({
            "supplier": supplier,
            "invoice_number": "R-1",
            "invoice_date": "2024-01-31"
        }))
    }

    fn verdict(result: &str, reason: Value) -> Completion {
        Completion::Json(json!({ "result": result, "reason": reason }))
    }

    #[test]
    fn test_accepted_without_retry() {
        let model = Replies(Mutex::new(vec![info("ACME"), verdict("CERTAIN", Value::Null)]));
        let outcome = extract_main_info(&model, &PipelineState::new("doc")).unwrap();
        assert_eq!(outcome.main_info.supplier, "ACME");
        assert_eq!(outcome.confidence, Confidence::Certain);
        assert!(model.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_single_retry_records_second_verdict() {
        let model = Replies(Mutex::new(vec![
            info("ACNE"),
            verdict("FALSE", json!("supplier misspelled")),
            info("ACME"),
            verdict("UNSURE", json!("date unclear")),
        ]));
        let outcome = extract_main_info(&model, &PipelineState::new("doc")).unwrap();
        assert_eq!(outcome.main_info.supplier, "ACME");
        assert_eq!(outcome.confidence, Confidence::Unsure);
        assert_eq!(outcome.reason.as_deref(), Some("date unclear"));
    }

    #[test]
    fn test_filtered_extraction_placeholder() {
        let model = Replies(Mutex::new(vec![
            Completion::ContentFiltered {
                reason: "policy".into(),
            },
            verdict("VERIFIED", Value::Null),
        ]));
        let outcome = extract_main_info(&model, &PipelineState::new("doc")).unwrap();
        assert_eq!(outcome.main_info, MainInfoResult::filtered());
    }
}
