//! Document pipeline.
//!
//! Stages run in a fixed order on a [`PipelineState`] passed by value:
//! analysis, optional invoice header extraction, merge, relevance filter,
//! the extract/verify loop and normalization. After each stage the keys it
//! owns are merged into the document's artifact together with
//! `completed_stage`, so a later run with `resume` set skips finished
//! stages.

mod extract;
mod filter;
mod main_info;
mod merge;
mod normalize;
mod options;

pub use extract::{
    extract_table, find_pending, run_extraction_loop, transition, verify_table, Effect, Event,
    LoopState, Phase,
};
pub use filter::{classify_relevance, filter_tables, filter_with};
pub use main_info::{extract_main_info, MainInfoOutcome};
pub use merge::{classify_continuity, merge_tables, merge_with};
pub use normalize::{normalize_tables, reshape_table};
pub use options::{PipelineOptions, DEFAULT_MAX_RETRIES};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::analysis::{build_state, DocumentAnalyzer};
use crate::error::{Error, Result};
use crate::llm::LanguageModel;
use crate::model::{DocumentSource, NormalizedTable, Page, PipelineState, Table};
use crate::normalize::Normalizer;
use crate::render::PageRasterizer;
use crate::store::{field, Artifact, ArtifactStore, Fields, NORMALIZED_SUFFIX};

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// OCR and table detection
    Analysis,
    /// Invoice header extraction
    MainInfo,
    /// Cross-page merge
    Merge,
    /// Relevance filter
    Filter,
    /// Extract/verify loop
    Extraction,
    /// Normalization
    Normalization,
}

/// Result of one document run.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    /// Artifact key
    pub key: String,
    /// Document identifier
    pub document: String,
    /// Pages kept after filtering
    pub pages: usize,
    /// Normalized tables
    pub tables: Vec<NormalizedTable>,
    /// Invoice header fields, when extracted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_info: Option<MainInfoOutcome>,
    /// Last stage found in the artifact when resuming
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resumed_after: Option<Stage>,
    /// Completion time
    pub processed_at: DateTime<Utc>,
}

/// A document that failed in a batch.
#[derive(Debug)]
pub struct BatchFailure {
    /// Document identifier
    pub document: String,
    /// Failure
    pub error: Error,
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Documents that completed
    pub succeeded: Vec<DocumentReport>,
    /// Documents that failed
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    /// Number of documents run.
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Check whether every document completed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Regular files in a directory, sorted by path.
pub fn collect_sources<P: AsRef<Path>>(dir: P) -> Result<Vec<DocumentSource>> {
    let mut paths: Vec<_> = fs::read_dir(dir.as_ref())?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    paths.sort();
    Ok(paths.into_iter().map(DocumentSource::Path).collect())
}

/// Restore the pipeline state stored in an artifact.
pub fn restore_state(document: &str, artifact: &Artifact) -> Result<PipelineState> {
    let ocr_text: String = field(artifact, "ocr_text")?.unwrap_or_default();
    let pages: Vec<Page> = field(artifact, "pages")?
        .ok_or_else(|| Error::Checkpoint("artifact has no pages".into()))?;
    let tables: Vec<Table> = field(artifact, "tables")?
        .ok_or_else(|| Error::Checkpoint("artifact has no tables".into()))?;
    let mut state = PipelineState::from_parts(document, ocr_text, pages, tables);
    state.check_page_refs()?;
    state.retry_progress = field(artifact, "retry_progress")?.unwrap_or_default();
    Ok(state)
}

fn state_fields(state: &PipelineState) -> Result<Fields> {
    Fields::new()
        .with("pages", &state.pages)?
        .with("tables", &state.tables)
}

/// Runs documents through every stage.
pub struct Pipeline {
    analyzer: Box<dyn DocumentAnalyzer>,
    rasterizer: Box<dyn PageRasterizer>,
    model: Box<dyn LanguageModel>,
    store: Box<dyn ArtifactStore>,
    normalizer: Normalizer,
    options: PipelineOptions,
}

impl Pipeline {
    /// Create a pipeline from its collaborators with default options.
    pub fn new(
        analyzer: impl DocumentAnalyzer + 'static,
        rasterizer: impl PageRasterizer + 'static,
        model: impl LanguageModel + 'static,
        store: impl ArtifactStore + 'static,
    ) -> Self {
        Self {
            analyzer: Box::new(analyzer),
            rasterizer: Box::new(rasterizer),
            model: Box::new(model),
            store: Box::new(store),
            normalizer: Normalizer::default(),
            options: PipelineOptions::default(),
        }
    }

    /// Create a pipeline backed by the Azure services configured in the
    /// environment, writing artifacts to `output_dir`.
    #[cfg(feature = "http")]
    pub fn from_env<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        Ok(Self::new(
            crate::analysis::AzureDocumentIntelligence::from_env()?,
            crate::render::PopplerRasterizer::new(),
            crate::llm::AzureOpenAi::from_env()?,
            crate::store::LocalStore::new(output_dir),
        ))
    }

    /// Set options.
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the normalizer (and with it the reference element list).
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Replace the artifact store.
    pub fn with_store(mut self, store: impl ArtifactStore + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    /// Current options.
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    fn checkpoint(&self, key: &str, stage: Option<Stage>, fields: Fields) -> Result<()> {
        if !self.options.checkpoint {
            return Ok(());
        }
        let fields = match stage {
            Some(stage) => fields.with("completed_stage", &stage)?,
            None => fields,
        };
        self.store.merge(key, fields.build())
    }

    fn done(resumed_after: Option<Stage>, stage: Stage) -> bool {
        resumed_after.is_some_and(|completed| completed >= stage)
    }

    /// Analyze a document without running the model stages.
    pub fn analyze(&self, source: &DocumentSource) -> Result<PipelineState> {
        let result = self.analyzer.analyze(source)?;
        Ok(build_state(&source.to_string(), &result, Vec::new()))
    }

    /// Run one document through every remaining stage.
    pub fn run(&self, source: &DocumentSource) -> Result<DocumentReport> {
        if let DocumentSource::Path(path) = source {
            if !path.is_file() {
                log::error!("Document '{}' not found", path.display());
                return Err(Error::MissingDocument);
            }
        }
        let key = source.artifact_key();
        let document = source.to_string();
        let model = self.model.as_ref();

        let artifact = if self.options.resume {
            self.store.load(&key)?
        } else {
            None
        };
        let resumed_after: Option<Stage> = match &artifact {
            Some(artifact) => field(artifact, "completed_stage")?,
            None => None,
        };
        if let Some(stage) = resumed_after {
            log::info!("'{}': resuming after stage {:?}", document, stage);
        }

        let mut main_info = match &artifact {
            Some(artifact) if Self::done(resumed_after, Stage::MainInfo) => {
                restore_main_info(artifact)?
            }
            _ => None,
        };

        if Self::done(resumed_after, Stage::Normalization) {
            let normalized_key = format!("{}{}", key, NORMALIZED_SUFFIX);
            if let Some(normalized) = self.store.load(&normalized_key)? {
                let tables: Vec<NormalizedTable> =
                    field(&normalized, "normalized_tables")?.unwrap_or_default();
                let pages = match &artifact {
                    Some(artifact) => restore_state(&document, artifact)?.pages.len(),
                    None => 0,
                };
                return Ok(DocumentReport {
                    key,
                    document,
                    pages,
                    tables,
                    main_info,
                    resumed_after,
                    processed_at: Utc::now(),
                });
            }
        }

        let images = self.rasterizer.rasterize(source, self.options.render_dpi)?;
        log::debug!("'{}': {} page image(s)", document, images.len());

        let mut state = match (&artifact, resumed_after) {
            (Some(artifact), Some(_)) => {
                let mut state = restore_state(&document, artifact)?;
                state.attach_images(images);
                state
            }
            _ => {
                let result = self.analyzer.analyze(source)?;
                let state = build_state(&document, &result, images);
                state.check_page_refs()?;
                self.checkpoint(
                    &key,
                    Some(Stage::Analysis),
                    state_fields(&state)?
                        .with("document", &document)?
                        .with("ocr_text", &state.ocr_text)?,
                )?;
                state
            }
        };

        if self.options.extract_main_info && !Self::done(resumed_after, Stage::MainInfo) {
            let outcome = extract_main_info(model, &state)?;
            self.checkpoint(
                &key,
                Some(Stage::MainInfo),
                Fields::new()
                    .with("main_info", &outcome.main_info)?
                    .with("confidence", &outcome.confidence)?
                    .with("reason", &outcome.reason)?,
            )?;
            main_info = Some(outcome);
        }

        if !Self::done(resumed_after, Stage::Merge) {
            state = merge_tables(state, model)?;
            self.checkpoint(&key, Some(Stage::Merge), state_fields(&state)?)?;
        }

        if !Self::done(resumed_after, Stage::Filter) {
            state = filter_tables(state, model)?;
            self.checkpoint(&key, Some(Stage::Filter), state_fields(&state)?)?;
        }

        if !Self::done(resumed_after, Stage::Extraction) {
            state = run_extraction_loop(state, model, self.options.max_retries, |state| {
                self.checkpoint(
                    &key,
                    None,
                    Fields::new()
                        .with("tables", &state.tables)?
                        .with("retry_progress", &state.retry_progress)?,
                )
            })?;
            self.checkpoint(
                &key,
                Some(Stage::Extraction),
                Fields::new()
                    .with("tables", &state.tables)?
                    .with("retry_progress", &state.retry_progress)?,
            )?;
        }

        let normalization_model = self.options.model_orientation.then_some(model);
        let tables = normalize_tables(&state, normalization_model, &self.normalizer)?;
        let processed_at = Utc::now();
        self.store.merge(
            &format!("{}{}", key, NORMALIZED_SUFFIX),
            Fields::new()
                .with("document", &document)?
                .with("processed_at", &processed_at)?
                .with("normalized_tables", &tables)?
                .build(),
        )?;
        self.checkpoint(&key, Some(Stage::Normalization), Fields::new())?;

        log::info!(
            "'{}': {} table(s) normalized from {} page(s)",
            document,
            tables.len(),
            state.pages.len()
        );
        Ok(DocumentReport {
            key,
            document,
            pages: state.pages.len(),
            tables,
            main_info,
            resumed_after,
            processed_at,
        })
    }

    /// Run several documents; failures are recorded and the batch goes on.
    pub fn run_batch(&self, sources: &[DocumentSource]) -> BatchReport {
        self.run_batch_with_progress(sources, |_, _| {})
    }

    /// Like [`run_batch`](Self::run_batch), calling `progress` after each
    /// document.
    pub fn run_batch_with_progress<F>(
        &self,
        sources: &[DocumentSource],
        mut progress: F,
    ) -> BatchReport
    where
        F: FnMut(&DocumentSource, std::result::Result<&DocumentReport, &Error>),
    {
        let mut report = BatchReport::default();
        for source in sources {
            match self.run(source) {
                Ok(document) => {
                    progress(source, Ok(&document));
                    report.succeeded.push(document);
                }
                Err(error) => {
                    log::error!("'{}' failed: {}", source, error);
                    progress(source, Err(&error));
                    report.failed.push(BatchFailure {
                        document: source.to_string(),
                        error,
                    });
                }
            }
        }
        log::info!(
            "Batch finished: {} succeeded, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );
        report
    }
}

fn restore_main_info(artifact: &Artifact) -> Result<Option<MainInfoOutcome>> {
    let Some(info) = field(artifact, "main_info")? else {
        return Ok(None);
    };
    let Some(confidence) = field(artifact, "confidence")? else {
        return Ok(None);
    };
    Ok(Some(MainInfoOutcome {
        main_info: info,
        confidence,
        reason: field(artifact, "reason")?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TableId;
    use tempfile::TempDir;

    #[test]
    fn test_stage_order_and_wire_format() {
        assert!(Stage::Analysis < Stage::MainInfo);
        assert!(Stage::Extraction < Stage::Normalization);
        assert_eq!(
            serde_json::to_string(&Stage::MainInfo).unwrap(),
            "\"main_info\""
        );
        assert!(Pipeline::done(Some(Stage::Filter), Stage::Merge));
        assert!(!Pipeline::done(Some(Stage::Filter), Stage::Extraction));
        assert!(!Pipeline::done(None, Stage::Analysis));
    }

    #[test]
    fn test_collect_sources_sorted_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.pdf"), b"%PDF").unwrap();
        fs::write(dir.path().join("a.png"), b"x").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let sources = collect_sources(dir.path()).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].artifact_key(), "a");
        assert_eq!(sources[1].artifact_key(), "b");
    }

    #[test]
    fn test_restore_state_rejects_malformed() {
        let artifact = Fields::new()
            .with("pages", &serde_json::json!({"not": "a list"}))
            .unwrap()
            .build();
        assert!(matches!(
            restore_state("doc", &artifact),
            Err(Error::Checkpoint(_))
        ));
    }

    #[test]
    fn test_restore_state_rebuilds_index() {
        let pages = vec![Page::new(1, "a"), Page::new(2, "b")];
        let tables = vec![Table::fragment(TableId(7), "t", 2)];
        let artifact = Fields::new()
            .with("pages", &pages)
            .unwrap()
            .with("tables", &tables)
            .unwrap()
            .build();
        let mut state = restore_state("doc", &artifact).unwrap();
        assert!(state.page(2).unwrap().references(TableId(7)));
        assert_eq!(state.allocate_table_id(), TableId(8));
    }
}
