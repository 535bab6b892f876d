//! Pipeline data model.
//!
//! These types are the shared state threaded through every stage: pages and
//! tables produced by document analysis, the extraction results attached to
//! tables, and the normalized composition records produced at the end. The
//! model is serializable so that each stage can checkpoint it.

mod extraction;
mod image;
mod normalized;
mod page;
mod source;
mod state;
mod table;

pub use extraction::{ExtractionResult, ValueBasis, VerificationFeedback, VerificationRecord};
pub use image::PageImage;
pub use normalized::{Molecule, NormalizedExample, NormalizedTable, Orientation};
pub use page::Page;
pub use source::DocumentSource;
pub use state::{PipelineState, RetryProgress};
pub use table::{Table, TableId};
