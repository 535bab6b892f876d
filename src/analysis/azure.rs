//! Azure AI Document Intelligence layout client.

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::json;
use std::thread;

use super::{AnalyzeResult, DocumentAnalyzer};
use crate::config::DocumentIntelligenceConfig;
use crate::detect::detect_kind_from_bytes;
use crate::error::{Error, Result};
use crate::model::DocumentSource;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Operation {
    status: String,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Layout analysis through the Document Intelligence REST API.
pub struct AzureDocumentIntelligence {
    config: DocumentIntelligenceConfig,
    client: Client,
}

impl AzureDocumentIntelligence {
    /// Create a client.
    pub fn new(config: DocumentIntelligenceConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(DocumentIntelligenceConfig::from_env()?)
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/documentintelligence/documentModels/{}:analyze?api-version={}&stringIndexType=unicodeCodePoint",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model_id,
            self.config.api_version
        )
    }

    fn submit(&self, source: &DocumentSource) -> Result<String> {
        let request = self
            .client
            .post(self.analyze_url())
            .header("Ocp-Apim-Subscription-Key", &self.config.api_key);

        let request: RequestBuilder = match source {
            DocumentSource::Url(url) => request.json(&json!({ "urlSource": url })),
            DocumentSource::Path(path) => {
                let bytes = std::fs::read(path)?;
                let mime = detect_kind_from_bytes(&bytes)?.mime_type();
                request.header(CONTENT_TYPE, mime).body(bytes)
            }
        };

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                Error::ServiceUnavailable {
                    status: status.as_u16(),
                    message: body,
                }
            } else {
                Error::Analysis(format!("{}: {}", status, body))
            });
        }

        response
            .headers()
            .get("Operation-Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::Analysis("No Operation-Location in response".into()))
    }

    fn poll(&self, operation_url: &str) -> Result<AnalyzeResult> {
        for attempt in 1..=self.config.max_polls {
            thread::sleep(self.config.poll_interval);
            let operation: Operation = self
                .client
                .get(operation_url)
                .header("Ocp-Apim-Subscription-Key", &self.config.api_key)
                .send()?
                .json()?;

            match operation.status.as_str() {
                "succeeded" => {
                    return operation
                        .analyze_result
                        .ok_or_else(|| Error::Analysis("Result has no analyzeResult".into()));
                }
                "failed" | "canceled" => {
                    let detail = operation
                        .error
                        .map(|e| format!("{} {}", e.code, e.message))
                        .unwrap_or_else(|| operation.status.clone());
                    return Err(Error::Analysis(detail));
                }
                status => log::debug!("Analysis {} (poll {})", status, attempt),
            }
        }
        Err(Error::Timeout(format!(
            "analysis did not finish after {} polls",
            self.config.max_polls
        )))
    }
}

impl DocumentAnalyzer for AzureDocumentIntelligence {
    fn analyze(&self, source: &DocumentSource) -> Result<AnalyzeResult> {
        log::info!("Analyzing '{}' with {}", source, self.config.model_id);
        let operation_url = self.submit(source)?;
        self.poll(&operation_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_url() {
        let config = DocumentIntelligenceConfig::new("https://docint.example/", "key");
        let client = AzureDocumentIntelligence::new(config).unwrap();
        assert_eq!(
            client.analyze_url(),
            "https://docint.example/documentintelligence/documentModels/prebuilt-layout:analyze?api-version=2024-11-30&stringIndexType=unicodeCodePoint"
        );
    }

    #[test]
    fn test_operation_parsing() {
        let op: Operation = serde_json::from_str(
            r#"{"status":"failed","error":{"code":"InvalidRequest","message":"bad"}}"#,
        )
        .unwrap();
        assert_eq!(op.status, "failed");
        assert!(op.analyze_result.is_none());
        assert_eq!(op.error.unwrap().code, "InvalidRequest");
    }
}
