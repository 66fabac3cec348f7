//! REST generation provider.
//!
//! Speaks a minimal JSON contract: the request body carries the prompt and
//! options, the response body is `{ "text": ..., "usage": {...} }`. Concrete
//! vendor APIs sit behind a gateway that speaks this shape.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::generation::{status_error, Generation, GenerationOptions, GenerationProvider};
use crate::domain::{RemedyError, Result};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

/// Generation provider backed by an HTTP endpoint.
pub struct RestGenerationProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    default_model: Option<String>,
}

impl RestGenerationProvider {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemedyError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: None,
            default_model: None,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }
}

#[async_trait]
impl GenerationProvider for RestGenerationProvider {
    fn name(&self) -> &str {
        "rest"
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Generation> {
        let body = GenerateRequest {
            prompt,
            model: options.model.as_deref().or(self.default_model.as_deref()),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            system: options.system.as_deref(),
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            let retryable = e.is_timeout() || e.is_connect();
            RemedyError::generation(format!("request to {} failed: {e}", self.endpoint), retryable)
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RemedyError::generation(format!("reading response: {e}"), true))?;

        if !status.is_success() {
            return Err(status_error(status.as_u16(), &text));
        }

        debug!(endpoint = %self.endpoint, bytes = text.len(), "generation response received");
        serde_json::from_str::<Generation>(&text)
            .map_err(|e| RemedyError::generation(format!("malformed provider response: {e}"), false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_omits_unset_options() {
        let body = GenerateRequest {
            prompt: "fix it",
            model: None,
            max_tokens: Some(512),
            temperature: None,
            system: None,
        };
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json, serde_json::json!({ "prompt": "fix it", "max_tokens": 512 }));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_retryable() {
        let provider =
            RestGenerationProvider::new("http://127.0.0.1:9/generate", Duration::from_secs(2))
                .expect("client");
        let err = provider
            .generate("p", &GenerationOptions::default())
            .await
            .expect_err("nothing listens on port 9");
        assert!(err.is_retryable());
    }
}
