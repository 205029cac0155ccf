//! HTTP client for the receipt recognition service
//!
//! The service is consumed as a black box: image bytes in, a finite ordered
//! list of loosely-typed line-item records out, or a retryable failure. The
//! wire format is the Gemini `generateContent` API with a JSON response
//! schema constraining the output to an array of {name, price, quantity}.

use std::time::Duration;

use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;

use crate::config::RecognizerConfig;
use crate::error::{Error, Result};
use crate::types::RawLineItem;

/// Extraction instruction sent alongside the image.
const EXTRACTION_PROMPT: &str = "Extract all line items, prices, and quantities from this \
receipt image. Return ONLY a JSON array. Ignore subtotals, taxes, and totals.";

/// Response body from the generateContent endpoint, reduced to the part we
/// read. Everything else is ignored.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// HTTP client for the recognition service
pub struct RecognizerClient {
    config: RecognizerConfig,
    http_client: reqwest::Client,
    base_url: String,
}

impl RecognizerClient {
    /// Create a new recognizer client from configuration
    ///
    /// Returns an error if the configuration is invalid or missing the API key.
    pub fn new(config: RecognizerConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config.endpoint.trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(api_key) = &config.api_key {
            headers.insert(
                "x-goog-api-key",
                HeaderValue::from_str(api_key)
                    .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
            base_url,
        })
    }

    /// Scan a receipt image (JPEG bytes) into raw line-item records.
    ///
    /// The result is untrusted; callers normalize it via
    /// [`crate::types::normalize_line_items`]. An empty array is a valid
    /// outcome, not an error.
    pub async fn scan_receipt(&self, image: &[u8]) -> Result<Vec<RawLineItem>> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.config.model
        );

        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let request_body = json!({
            "contents": {
                "parts": [
                    { "inline_data": { "mime_type": "image/jpeg", "data": encoded } },
                    { "text": EXTRACTION_PROMPT },
                ],
            },
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "name": { "type": "STRING" },
                            "price": { "type": "NUMBER" },
                            "quantity": { "type": "INTEGER" },
                        },
                        "required": ["name", "price", "quantity"],
                    },
                },
            },
        });

        let response = self
            .http_client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| Error::Recognition(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(Error::Recognition(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Recognition(format!("failed to parse response: {}", e)))?;

        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| Error::Recognition("response contained no text part".to_string()))?;

        parse_items_text(&text)
    }

    /// Scan with retry for transient failures (exponential backoff).
    pub async fn scan_receipt_with_retry(&self, image: &[u8]) -> Result<Vec<RawLineItem>> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(500);

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    attempt = attempt + 1,
                    max = self.config.max_retries + 1,
                    "retrying receipt scan"
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(10));
            }

            match self.scan_receipt(image).await {
                Ok(items) => return Ok(items),
                Err(e) if is_retryable_error(&e) => {
                    tracing::warn!(error = %e, "transient recognition error");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Recognition("max retries exceeded".to_string())))
    }
}

/// Parse the model's JSON text into raw records, leniently.
///
/// Non-object elements are dropped with a warning; a body that is not a
/// JSON array at all is a recognition failure.
fn parse_items_text(text: &str) -> Result<Vec<RawLineItem>> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| Error::Recognition(format!("unparsable item list: {}", e)))?;

    let serde_json::Value::Array(elements) = value else {
        return Err(Error::Recognition("item list is not an array".to_string()));
    };

    let mut items = Vec::with_capacity(elements.len());
    for element in elements {
        match serde_json::from_value::<RawLineItem>(element) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!(error = %e, "dropping malformed item record"),
        }
    }
    Ok(items)
}

/// Check if an error is retryable (transient)
fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Recognition(msg) => {
            // 5xx, timeouts, and connection errors
            msg.contains("API error (5")
                || msg.contains("timeout")
                || msg.contains("connection")
                || msg.contains("request failed")
        }
        _ => false,
    }
}
