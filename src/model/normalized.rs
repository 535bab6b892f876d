//! Normalized composition records.

use super::{TableId, ValueBasis};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Direction along which a table lists its examples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Each row is one example; element names head the columns
    #[default]
    Vertical,
    /// Each column is one example; element names label the rows
    Horizontal,
}

/// One element with its bounds.
///
/// Bounds are decimal strings with a comma decimal separator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Molecule {
    /// Element or oxide symbol
    pub element: String,
    /// Lower bound
    pub min: Option<String>,
    /// Upper bound
    pub max: Option<String>,
}

/// One example composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedExample {
    /// Example label as printed in the document
    #[serde(rename = "exampleNumber")]
    pub example_number: String,
    /// Elements in table order
    pub molecules: Vec<Molecule>,
}

/// Normalized output for one logical table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTable {
    /// Source table
    pub table_id: TableId,
    /// Pages the source table spans
    pub page_refs: Vec<u32>,
    /// Unit of the values
    pub value_basis: ValueBasis,
    /// Detected orientation
    pub orientation: Orientation,
    /// Example compositions
    pub examples: Vec<NormalizedExample>,
    /// Element names not found in the reference list (kept in `examples`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub abnormal_elements: Vec<String>,
}

impl NormalizedTable {
    /// Check whether every element was recognized.
    pub fn is_clean(&self) -> bool {
        self.abnormal_elements.is_empty()
    }

    /// Total number of element entries across all examples.
    pub fn molecule_count(&self) -> usize {
        self.examples.iter().map(|e| e.molecules.len()).sum()
    }
}
