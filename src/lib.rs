//! # compextract
//!
//! Extraction of chemical-composition tables from scanned documents and
//! patent PDFs.
//!
//! A document is analyzed by an OCR/layout service, its table fragments are
//! merged across page breaks, irrelevant tables are dropped, every remaining
//! table is extracted and verified by a vision-capable language model, and
//! the cell values are normalized into element/min/max records.
//!
//! ## Quick Start
//!
//! Requires the default `http` feature.
//!
//! ```ignore
//! use compextract::{DocumentSource, Pipeline, PipelineOptions};
//!
//! fn main() -> compextract::Result<()> {
//!     let pipeline = Pipeline::from_env("./output")?
//!         .with_options(PipelineOptions::new().with_max_retries(3));
//!
//!     let report = pipeline.run(&DocumentSource::parse("patent.pdf")?)?;
//!     for table in &report.tables {
//!         println!("{}: {} example(s)", table.table_id, table.examples.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Stable table identity**: merged tables get fresh, never reused ids
//! - **Explicit retry loop**: extract/verify as a testable state machine
//! - **Typed model replies**: every response is validated against a schema
//! - **Resumable runs**: per-stage checkpoints with merge-on-write artifacts
//! - **Deterministic normalization**: comparison operators, decimal commas
//!   and element names are parsed without the model

pub mod analysis;
pub mod config;
pub mod detect;
pub mod error;
pub mod llm;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod render;
pub mod store;

// Re-export commonly used types
pub use analysis::{build_state, AnalyzeResult, DocumentAnalyzer};
pub use config::{AzureOpenAiConfig, DocumentIntelligenceConfig};
pub use detect::{detect_kind_from_bytes, detect_kind_from_path, DocumentKind};
pub use error::{Error, Result};
pub use llm::{Completion, CompletionRequest, LanguageModel};
pub use model::{
    DocumentSource, ExtractionResult, Molecule, NormalizedExample, NormalizedTable, Orientation,
    Page, PageImage, PipelineState, Table, TableId, ValueBasis,
};
pub use normalize::{ElementTable, Normalizer};
pub use pipeline::{collect_sources, BatchReport, DocumentReport, Pipeline, PipelineOptions, Stage};
pub use render::{JsonFormat, PageRasterizer, PopplerRasterizer};
pub use store::{ArtifactStore, LocalStore, MemoryStore};

#[cfg(feature = "http")]
pub use analysis::AzureDocumentIntelligence;
#[cfg(feature = "http")]
pub use llm::AzureOpenAi;

use std::path::Path;

/// Read the normalized tables from a `<key>_normalized.json` artifact.
///
/// # Example
///
/// ```no_run
/// use compextract::read_normalized;
///
/// let tables = read_normalized("output/patent_normalized.json").unwrap();
/// println!("{} table(s)", tables.len());
/// ```
pub fn read_normalized<P: AsRef<Path>>(path: P) -> Result<Vec<NormalizedTable>> {
    let text = std::fs::read_to_string(path)?;
    let artifact: store::Artifact = serde_json::from_str(&text)?;
    Ok(store::field(&artifact, "normalized_tables")?.unwrap_or_default())
}

/// Run one local file through the pipeline with services configured from
/// the environment.
///
/// # Example
///
/// ```no_run
/// use compextract::extract_file;
///
/// let report = extract_file("patent.pdf", "./output").unwrap();
/// println!("{} table(s)", report.tables.len());
/// ```
#[cfg(feature = "http")]
pub fn extract_file<P: AsRef<Path>, Q: AsRef<Path>>(
    path: P,
    output_dir: Q,
) -> Result<DocumentReport> {
    Pipeline::from_env(output_dir)?.run(&DocumentSource::path(path))
}
