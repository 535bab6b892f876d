//! Language model boundary.
//!
//! Every stage talks to the model through [`LanguageModel`] with a request
//! that names the typed response it expects. Replies are validated against
//! that type on receipt: a mismatch becomes [`Error::Schema`], and a
//! provider-side content-filter refusal is a distinct, non-error variant so
//! stages can substitute a placeholder instead of failing the document.

#[cfg(feature = "http")]
mod azure;
pub mod prompts;
mod schema;

#[cfg(feature = "http")]
pub use azure::AzureOpenAi;
pub use schema::{
    Confidence, Continuity, ContinuityVerdict, MainInfoResult, MainInfoVerdict,
    NormalizationResult, RawExample, RawMolecule, Relevance, RelevanceVerdict, TableDataResult,
};

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::PageImage;

/// A typed response the model can be asked for.
pub trait StructuredResponse: DeserializeOwned + JsonSchema {
    /// Schema name sent to the provider and used in error messages.
    const NAME: &'static str;
}

/// A structured completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System instructions
    pub system: String,

    /// User message text
    pub user: String,

    /// Images sent after the user text, in order
    pub images: Vec<PageImage>,

    /// Name of the expected response schema
    pub schema_name: &'static str,

    /// JSON schema of the expected response
    pub schema: Value,
}

impl CompletionRequest {
    /// Create a request whose reply must deserialize into `T`.
    pub fn for_schema<T: StructuredResponse>(
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        let schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default();
        Self {
            system: system.into(),
            user: user.into(),
            images: Vec::new(),
            schema_name: T::NAME,
            schema,
        }
    }

    /// Append images to the request.
    pub fn with_images(mut self, images: impl IntoIterator<Item = PageImage>) -> Self {
        self.images.extend(images);
        self
    }
}

/// Raw provider reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// A JSON document, not yet validated against the schema
    Json(Value),
    /// The provider's content filter refused the request
    ContentFiltered {
        /// Provider message
        reason: String,
    },
}

/// Validated reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Structured<T> {
    /// A value of the expected type
    Value(T),
    /// The provider's content filter refused the request
    ContentFiltered(String),
}

impl<T> Structured<T> {
    /// Return the value, or build a substitute from the filter reason.
    pub fn unwrap_or_else(self, f: impl FnOnce(&str) -> T) -> T {
        match self {
            Structured::Value(value) => value,
            Structured::ContentFiltered(reason) => f(&reason),
        }
    }

    /// Check whether the request was filtered.
    pub fn is_filtered(&self) -> bool {
        matches!(self, Structured::ContentFiltered(_))
    }
}

/// A chat model that answers with JSON conforming to a schema.
pub trait LanguageModel: Send + Sync {
    /// Send one request and wait for the reply.
    ///
    /// Content-filter refusals must be reported as
    /// [`Completion::ContentFiltered`]; every other failure is an error.
    fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}

/// Send a request and validate the reply as `T`.
pub fn request_structured<T: StructuredResponse>(
    model: &dyn LanguageModel,
    request: &CompletionRequest,
) -> Result<Structured<T>> {
    log::debug!(
        "LLM request '{}' with {} image(s)",
        request.schema_name,
        request.images.len()
    );
    match model.complete(request)? {
        Completion::Json(value) => serde_json::from_value(value)
            .map(Structured::Value)
            .map_err(|e| Error::Schema {
                schema: T::NAME,
                message: e.to_string(),
            }),
        Completion::ContentFiltered { reason } => {
            log::warn!("Content filter rejected '{}': {}", T::NAME, reason);
            Ok(Structured::ContentFiltered(reason))
        }
    }
}

/// Parse the JSON payload of a model message.
///
/// Models occasionally wrap JSON in a Markdown code fence; the fence is
/// stripped before parsing.
pub fn parse_json_payload(text: &str) -> Result<Value> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim()).map_err(|e| Error::Llm(format!("Invalid JSON reply: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VerificationFeedback;
    use serde_json::json;

    struct FixedModel(Completion);

    impl LanguageModel for FixedModel {
        fn complete(&self, _request: &CompletionRequest) -> Result<Completion> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_request_carries_schema() {
        let request = CompletionRequest::for_schema::<VerificationFeedback>("sys", "user");
        assert_eq!(request.schema_name, "verification_feedback");
        assert!(request.schema["properties"]["reextraction_required"].is_object());
    }

    #[test]
    fn test_structured_value() {
        let model = FixedModel(Completion::Json(json!({
            "messages": "",
            "reextraction_required": false
        })));
        let request = CompletionRequest::for_schema::<VerificationFeedback>("s", "u");
        let reply: Structured<VerificationFeedback> =
            request_structured(&model, &request).unwrap();
        assert_eq!(
            reply,
            Structured::Value(VerificationFeedback {
                messages: String::new(),
                reextraction_required: false,
            })
        );
    }

    #[test]
    fn test_schema_mismatch_is_typed_error() {
        let model = FixedModel(Completion::Json(json!({ "verdict": "ok" })));
        let request = CompletionRequest::for_schema::<VerificationFeedback>("s", "u");
        let err = request_structured::<VerificationFeedback>(&model, &request).unwrap_err();
        assert!(matches!(
            err,
            Error::Schema {
                schema: "verification_feedback",
                ..
            }
        ));
    }

    #[test]
    fn test_content_filter_passes_through() {
        let model = FixedModel(Completion::ContentFiltered {
            reason: "policy".into(),
        });
        let request = CompletionRequest::for_schema::<VerificationFeedback>("s", "u");
        let reply = request_structured::<VerificationFeedback>(&model, &request).unwrap();
        assert!(reply.is_filtered());
        let value = reply.unwrap_or_else(|_| VerificationFeedback::default());
        assert!(!value.reextraction_required);
    }

    #[test]
    fn test_parse_json_payload_fenced() {
        let value = parse_json_payload("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(value, json!({"a": 1}));
        let value = parse_json_payload(" {\"a\": 2} ").unwrap();
        assert_eq!(value, json!({"a": 2}));
        assert!(parse_json_payload("not json").is_err());
    }
}
