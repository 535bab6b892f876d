//! Typed model responses.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::StructuredResponse;
use crate::model::{ExtractionResult, Orientation, ValueBasis, VerificationFeedback};

/// Whether two table fragments on consecutive pages form one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Continuity {
    /// The second fragment continues the first
    Continuous,
    /// The fragments are separate tables
    Distinct,
}

/// Page-break continuity classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ContinuityVerdict {
    /// Short reasoning before the decision
    #[serde(default)]
    pub reasoning: String,
    /// Final decision
    pub decision: Continuity,
}

impl StructuredResponse for ContinuityVerdict {
    const NAME: &'static str = "continuity_verdict";
}

/// Whether a table holds concrete composition examples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relevance {
    /// Concrete example compositions with numeric values
    Relevant,
    /// Ranges, claims, properties or unrelated content
    Irrelevant,
}

/// Table relevance classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RelevanceVerdict {
    /// Short reasoning before the decision
    #[serde(default)]
    pub reasoning: String,
    /// Final decision
    pub decision: Relevance,
}

impl StructuredResponse for RelevanceVerdict {
    const NAME: &'static str = "relevance_verdict";
}

/// Cell data extracted from one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableDataResult {
    /// Row-major cell values, copied with every digit and sign
    pub table_data: Vec<Vec<String>>,
    /// Unit of the values
    pub value_basis: ValueBasis,
}

impl StructuredResponse for TableDataResult {
    const NAME: &'static str = "table_data";
}

impl From<TableDataResult> for ExtractionResult {
    fn from(result: TableDataResult) -> Self {
        ExtractionResult::new(result.table_data, result.value_basis)
    }
}

impl StructuredResponse for VerificationFeedback {
    const NAME: &'static str = "verification_feedback";
}

/// One element entry with its raw cell text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RawMolecule {
    /// Element or oxide symbol from the header
    pub element: String,
    /// Cell text exactly as extracted, including any `<` or `>` prefix
    pub value: String,
}

/// One example with raw cell values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RawExample {
    /// Example label
    pub example_number: String,
    /// Entries in table order
    pub molecules: Vec<RawMolecule>,
}

/// Table reshaped into examples; values are parsed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NormalizationResult {
    /// Direction along which examples run
    pub orientation: Orientation,
    /// Examples in table order
    pub examples: Vec<RawExample>,
}

impl StructuredResponse for NormalizationResult {
    const NAME: &'static str = "normalized_table";
}

/// Invoice header fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MainInfoResult {
    /// Supplier company name, or "null"
    pub supplier: String,
    /// Invoice number, or "null"
    pub invoice_number: String,
    /// Invoice date (not the due date), or "null"
    pub invoice_date: String,
    /// Why a field could not be extracted; empty when complete
    #[serde(default)]
    pub error: String,
}

impl MainInfoResult {
    /// Placeholder stored when the provider filters the request.
    pub fn filtered() -> Self {
        Self {
            supplier: "null".into(),
            invoice_number: "null".into(),
            invoice_date: "null".into(),
            error: "Content filter error".into(),
        }
    }
}

impl StructuredResponse for MainInfoResult {
    const NAME: &'static str = "main_info";
}

/// Verifier confidence in extracted invoice fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    /// Checked against the document
    Verified,
    /// Plausible without doubt
    Certain,
    /// Possibly wrong
    Unsure,
    /// Wrong
    False,
}

impl Confidence {
    /// Whether the extraction can be accepted without a retry.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Confidence::Verified | Confidence::Certain)
    }
}

/// Invoice field verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MainInfoVerdict {
    /// Confidence level
    pub result: Confidence,
    /// Reason when the result is UNSURE or FALSE
    #[serde(default)]
    pub reason: Option<String>,
}

impl StructuredResponse for MainInfoVerdict {
    const NAME: &'static str = "main_info_verdict";
}
