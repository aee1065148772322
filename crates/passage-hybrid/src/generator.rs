//! Text generation over an OpenAI-compatible `responses` endpoint.
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use passage_core::config::GenerationSettings;
use passage_core::traits::Generator;
use passage_core::{Error, Result};

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a str,
    max_output_tokens: u32,
}

pub struct OpenAiGenerator {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiGenerator {
    pub fn new(api_base: &str, model: &str, api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Upstream(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/responses", api_base.trim_end_matches('/')),
            model: model.to_string(),
            api_key,
        })
    }

    /// Reads the credential from the environment variable named in `settings`.
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Upstream(format!("{} not set", settings.api_key_env)))?;
        Self::new(&settings.api_base, &settings.model, api_key, Duration::from_secs(settings.timeout_secs))
    }
}

impl Generator for OpenAiGenerator {
    fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String> {
        let body = ResponsesRequest { model: &self.model, input: prompt, max_output_tokens };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| Error::Upstream(format!("generation request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(Error::Upstream(format!("generation endpoint returned {status}: {detail}")));
        }
        let payload: Value = response
            .json()
            .map_err(|e| Error::Upstream(format!("generation response is not JSON: {e}")))?;
        let text = output_text(&payload).ok_or_else(|| Error::Upstream("generation returned no text".into()))?;
        debug!(model = %self.model, chars = text.len(), "generated");
        Ok(text)
    }
}

/// Concatenated `output_text` parts of a responses payload, trimmed.
/// `None` when there is no non-blank text.
pub fn output_text(payload: &Value) -> Option<String> {
    if let Some(text) = payload.get("output_text").and_then(Value::as_str) {
        let text = text.trim();
        return (!text.is_empty()).then(|| text.to_string());
    }
    let text: String = payload
        .get("output")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
