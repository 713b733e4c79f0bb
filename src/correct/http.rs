//! Grammar service over HTTP.

use super::{GrammarService, Suggestion, Unavailable};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const INSTRUCTION: &str = "Correct grammar and spelling only. Keep technical terms, \
citations and meaning unchanged. Return the corrected text.";

#[derive(Serialize)]
struct CorrectionRequest<'a> {
    instruction: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct CorrectionResponse {
    suggestion: String,
    #[serde(default = "default_confidence")]
    confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

/// Posts paragraphs as JSON to a correction endpoint.
///
/// Request body: `{"instruction": ..., "text": ...}`. Expected response:
/// `{"suggestion": "...", "confidence": 0.9}`.
pub struct HttpGrammarService {
    endpoint: String,
    api_key: Option<String>,
    client: Option<Client>,
}

impl HttpGrammarService {
    /// Create a service for an endpoint.
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ieeefmt/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| log::warn!("HTTP client unavailable: {}", e))
            .ok();
        Self {
            endpoint: endpoint.into(),
            api_key,
            client,
        }
    }
}

impl GrammarService for HttpGrammarService {
    fn name(&self) -> &str {
        "http"
    }

    fn correct(&self, text: &str) -> Result<Suggestion, Unavailable> {
        let client = self.client.as_ref().ok_or(Unavailable::Disabled)?;
        let mut request = client.post(&self.endpoint).json(&CorrectionRequest {
            instruction: INSTRUCTION,
            text,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                Unavailable::Timeout
            } else {
                Unavailable::Service(e.to_string())
            }
        })?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS | StatusCode::PAYMENT_REQUIRED => {
                return Err(Unavailable::Quota)
            }
            status if !status.is_success() => {
                return Err(Unavailable::Service(format!("HTTP {}", status)))
            }
            _ => {}
        }

        let body: CorrectionResponse = response
            .json()
            .map_err(|e| Unavailable::Malformed(e.to_string()))?;
        Ok(Suggestion::new(body.suggestion, body.confidence))
    }
}
