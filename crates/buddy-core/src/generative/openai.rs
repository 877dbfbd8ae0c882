//! OpenAI text generator using the Responses API.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::trait_def::{GenerationError, TextGenerator};
use crate::config::OpenAiSettings;

/// [`TextGenerator`] backed by `POST {base_url}/responses`.
#[derive(Clone)]
pub struct OpenAiGenerator {
    settings: OpenAiSettings,
    client: reqwest::Client,
}

impl OpenAiGenerator {
    /// Create a generator with its own HTTP client.
    ///
    /// `timeout` bounds each request at the transport level; callers may
    /// also wrap calls in their own timeout.
    pub fn new(settings: OpenAiSettings, timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { settings, client }
    }

    /// The configured model name.
    pub fn model(&self) -> &str {
        &self.settings.model
    }
}

impl std::fmt::Debug for OpenAiGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiGenerator")
            .field("settings", &self.settings)
            .finish()
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "model": &self.settings.model,
            "input": prompt,
        });

        let response = self
            .client
            .post(format!("{}/responses", self.settings.base_url))
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::RequestFailed(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::RequestFailed(format!("HTTP {status}")));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| GenerationError::RequestFailed(format!("invalid response body: {e}")))?;

        let text = extract_output_text(&data).ok_or(GenerationError::EmptyResponse)?;
        debug!(model = %self.settings.model, chars = text.len(), "openai returned text");
        Ok(text)
    }
}

/// Collect every `output[].content[]` entry of type `output_text`.
///
/// Returns the pieces joined by newlines and trimmed, or `None` when there
/// are none.
pub fn extract_output_text(data: &Value) -> Option<String> {
    let texts: Vec<&str> = data
        .get("output")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|c| c.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|c| c.get("text").and_then(Value::as_str))
        .collect();

    if texts.is_empty() {
        return None;
    }
    Some(texts.join("\n").trim().to_owned())
}
