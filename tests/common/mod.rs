//! Fake collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use compextract::analysis::{
    AnalyzedCell, AnalyzedPage, AnalyzedTable, BoundingRegion, Caption, Span,
};
use compextract::error::{Error, Result};
use compextract::{
    AnalyzeResult, Completion, CompletionRequest, DocumentAnalyzer, DocumentSource, LanguageModel,
    PageImage, PageRasterizer,
};
use serde_json::{json, Value};

pub const CONTINUITY: &str = "continuity_verdict";
pub const RELEVANCE: &str = "relevance_verdict";
pub const TABLE_DATA: &str = "table_data";
pub const VERIFICATION: &str = "verification_feedback";
pub const NORMALIZATION: &str = "normalized_table";

/// Model answering from per-schema queues, falling back to a fixed reply.
#[derive(Default)]
pub struct ScriptedModel {
    queued: Mutex<HashMap<&'static str, VecDeque<Completion>>>,
    fallback: HashMap<&'static str, Completion>,
    requests: Mutex<Vec<(&'static str, String)>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one reply for a schema.
    pub fn reply(self, schema: &'static str, value: Value) -> Self {
        self.queued
            .lock()
            .unwrap()
            .entry(schema)
            .or_default()
            .push_back(Completion::Json(value));
        self
    }

    /// Queue a content-filter refusal for a schema.
    pub fn refuse(self, schema: &'static str) -> Self {
        self.queued
            .lock()
            .unwrap()
            .entry(schema)
            .or_default()
            .push_back(Completion::ContentFiltered {
                reason: "jailbreak detected".into(),
            });
        self
    }

    /// Reply used once a schema's queue is empty.
    pub fn always(mut self, schema: &'static str, value: Value) -> Self {
        self.fallback.insert(schema, Completion::Json(value));
        self
    }

    /// Number of requests sent for a schema.
    pub fn calls(&self, schema: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| *name == schema)
            .count()
    }

    /// User texts of the requests sent for a schema.
    pub fn prompts(&self, schema: &str) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| *name == schema)
            .map(|(_, user)| user.clone())
            .collect()
    }
}

impl LanguageModel for ScriptedModel {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        self.requests
            .lock()
            .unwrap()
            .push((request.schema_name, request.user.clone()));
        let queued = self
            .queued
            .lock()
            .unwrap()
            .get_mut(request.schema_name)
            .and_then(VecDeque::pop_front);
        queued
            .or_else(|| self.fallback.get(request.schema_name).cloned())
            .ok_or_else(|| Error::Llm(format!("no reply scripted for {}", request.schema_name)))
    }
}

impl LanguageModel for &'static ScriptedModel {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        (**self).complete(request)
    }
}

/// Leak a fake so a pipeline can own a reference to it while the test
/// keeps inspecting it.
pub fn leak<T>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

/// Analyzer returning a fixed result.
pub struct FakeAnalyzer {
    result: AnalyzeResult,
    calls: AtomicUsize,
}

impl FakeAnalyzer {
    pub fn new(result: AnalyzeResult) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DocumentAnalyzer for FakeAnalyzer {
    fn analyze(&self, _source: &DocumentSource) -> Result<AnalyzeResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }
}

impl DocumentAnalyzer for &'static FakeAnalyzer {
    fn analyze(&self, source: &DocumentSource) -> Result<AnalyzeResult> {
        (**self).analyze(source)
    }
}

/// Rasterizer producing one tiny image per page.
pub struct FakeRasterizer(pub usize);

impl PageRasterizer for FakeRasterizer {
    fn rasterize(&self, _source: &DocumentSource, _dpi: u32) -> Result<Vec<PageImage>> {
        Ok((0..self.0).map(|i| PageImage::png(vec![i as u8])).collect())
    }
}

/// Table fragment on one page.
pub fn table(page: u32, caption: &str, rows: &[&[&str]]) -> AnalyzedTable {
    let cells = rows
        .iter()
        .enumerate()
        .flat_map(|(r, row)| {
            row.iter().enumerate().map(move |(c, content)| AnalyzedCell {
                row_index: r,
                column_index: c,
                content: content.to_string(),
            })
        })
        .collect();
    AnalyzedTable {
        row_count: rows.len(),
        column_count: rows.first().map_or(0, |r| r.len()),
        cells,
        caption: (!caption.is_empty()).then(|| Caption {
            content: caption.to_string(),
        }),
        bounding_regions: vec![BoundingRegion { page_number: page }],
    }
}

/// Analysis result with one page per text and the given tables.
pub fn analysis(page_texts: &[&str], tables: Vec<AnalyzedTable>) -> AnalyzeResult {
    let mut content = String::new();
    let mut pages = Vec::new();
    for (i, text) in page_texts.iter().enumerate() {
        let offset = content.chars().count();
        content.push_str(text);
        pages.push(AnalyzedPage {
            page_number: i as u32 + 1,
            spans: vec![Span {
                offset,
                length: text.chars().count(),
            }],
        });
    }
    AnalyzeResult {
        content,
        pages,
        tables,
    }
}

/// Glass composition table split over pages 1 and 2 and a property table
/// on page 4.
pub fn patent_document() -> AnalyzeResult {
    analysis(
        &[
            "Example glasses were melted.\n",
            "Table 1 (continued)\n",
            "Claims follow.\n",
            "Properties of the glasses.\n",
        ],
        vec![
            table(
                1,
                "Table 1",
                &[&["", "Ex. 1", "Ex. 2"], &["SiO2", "60.1", "58.0"]],
            ),
            table(2, "", &[&["CaO", "<5", "3.5"]]),
            table(4, "Table 2", &[&["", "Ex. 1"], &["Tg", "612"]]),
        ],
    )
}

pub fn continuous() -> Value {
    json!({ "reasoning": "header continues", "decision": "CONTINUOUS" })
}

pub fn distinct() -> Value {
    json!({ "reasoning": "new caption", "decision": "DISTINCT" })
}

pub fn relevant() -> Value {
    json!({ "reasoning": "example compositions", "decision": "RELEVANT" })
}

pub fn irrelevant() -> Value {
    json!({ "reasoning": "physical properties", "decision": "IRRELEVANT" })
}

pub fn table_data(rows: Value) -> Value {
    json!({ "table_data": rows, "value_basis": "WEIGHT_PERCENT" })
}

pub fn accepted() -> Value {
    json!({ "messages": "", "reextraction_required": false })
}

pub fn rejected(messages: &str) -> Value {
    json!({ "messages": messages, "reextraction_required": true })
}
