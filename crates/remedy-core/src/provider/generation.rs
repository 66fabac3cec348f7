//! Abstract code-generation provider, backoff and primary/fallback chaining.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{RemedyError, Result};

/// Options passed with each generation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerationOptions {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system: Option<String>,
}

/// Token accounting reported by a provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Raw text produced by a provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Generation {
    pub text: String,
    #[serde(default)]
    pub usage: Usage,
}

/// A backend that turns prompts into text (REST endpoint, CLI agent, ...).
///
/// Implementations report transient failures (rate limit, timeout, 5xx) as
/// retryable [`RemedyError::Generation`] errors.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Generation>;
}

/// Exponential backoff settings for retryable generation failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackoffConfig {
    /// Retries after the first attempt (0 = run once).
    pub max_retries: u32,
    pub base_delay_ms: u64,
    /// Upper bound on any single delay.
    pub max_delay_ms: u64,
}

impl BackoffConfig {
    /// Largest `max_retries` accepted by config validation.
    pub const MAX_RETRIES: u32 = 10;

    /// Delay before retry number `attempt` (1-based), doubling from the base.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

/// Call `provider`, retrying retryable failures with exponential backoff.
pub async fn generate_with_backoff(
    provider: &dyn GenerationProvider,
    prompt: &str,
    options: &GenerationOptions,
    backoff: &BackoffConfig,
) -> Result<Generation> {
    let max_attempts = backoff.max_retries + 1;
    let mut attempt = 1;
    loop {
        match provider.generate(prompt, options).await {
            Ok(generation) => return Ok(generation),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = backoff.delay_for(attempt);
                warn!(
                    provider = provider.name(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "generation failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Chains a primary provider with a fallback used on retryable failures.
pub struct FallbackProvider {
    primary: Arc<dyn GenerationProvider>,
    fallback: Arc<dyn GenerationProvider>,
    name: String,
}

impl FallbackProvider {
    pub fn new(primary: Arc<dyn GenerationProvider>, fallback: Arc<dyn GenerationProvider>) -> Self {
        let name = format!("{}+{}", primary.name(), fallback.name());
        Self {
            primary,
            fallback,
            name,
        }
    }
}

#[async_trait]
impl GenerationProvider for FallbackProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Generation> {
        match self.primary.generate(prompt, options).await {
            Ok(generation) => Ok(generation),
            Err(err) if err.is_retryable() => {
                debug!(
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    error = %err,
                    "primary provider failed, using fallback"
                );
                self.fallback.generate(prompt, options).await
            }
            Err(err) => Err(err),
        }
    }
}

/// Map an HTTP status to a generation error, marking transient statuses retryable.
pub fn status_error(status: u16, body: &str) -> RemedyError {
    let retryable = status == 429 || status == 408 || (500..=599).contains(&status);
    let snippet: String = body.chars().take(200).collect();
    RemedyError::generation(format!("provider returned {status}: {snippet}"), retryable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedProvider;

    #[test]
    fn test_status_error_retryable() {
        assert!(status_error(429, "slow down").is_retryable());
        assert!(status_error(503, "").is_retryable());
        assert!(!status_error(400, "bad").is_retryable());
        assert!(!status_error(401, "key").is_retryable());
    }

    #[test]
    fn test_backoff_delay_saturates_at_cap() {
        let backoff = BackoffConfig {
            max_retries: 200,
            base_delay_ms: 500,
            max_delay_ms: 4_000,
        };
        assert_eq!(backoff.delay_for(1), Duration::from_millis(500));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(2_000));
        assert_eq!(backoff.delay_for(4), Duration::from_millis(4_000));
        assert_eq!(backoff.delay_for(64), Duration::from_millis(4_000));
        assert_eq!(backoff.delay_for(u32::MAX), Duration::from_millis(4_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_retries_retryable_errors() {
        let provider = ScriptedProvider::new(vec![
            Err(RemedyError::generation("rate limited", true)),
            Err(RemedyError::generation("timeout", true)),
            Ok("done".to_string()),
        ]);
        let generation = generate_with_backoff(
            &provider,
            "prompt",
            &GenerationOptions::default(),
            &BackoffConfig::default(),
        )
        .await
        .expect("third attempt succeeds");
        assert_eq!(generation.text, "done");
        assert_eq!(provider.prompts().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_stops_on_permanent_error() {
        let provider = ScriptedProvider::new(vec![
            Err(RemedyError::generation("bad request", false)),
            Ok("never".to_string()),
        ]);
        let result = generate_with_backoff(
            &provider,
            "prompt",
            &GenerationOptions::default(),
            &BackoffConfig::default(),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(provider.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_used_on_retryable_failure() {
        let primary = Arc::new(ScriptedProvider::new(vec![Err(RemedyError::generation(
            "503", true,
        ))]));
        let fallback = Arc::new(ScriptedProvider::new(vec![Ok("from fallback".to_string())]));
        let chained = FallbackProvider::new(primary.clone(), fallback.clone());

        let generation = chained
            .generate("p", &GenerationOptions::default())
            .await
            .expect("fallback answers");
        assert_eq!(generation.text, "from fallback");
        assert_eq!(primary.prompts().len(), 1);
        assert_eq!(fallback.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_not_used_on_permanent_failure() {
        let primary = Arc::new(ScriptedProvider::new(vec![Err(RemedyError::generation(
            "invalid key",
            false,
        ))]));
        let fallback = Arc::new(ScriptedProvider::new(vec![Ok("unused".to_string())]));
        let chained = FallbackProvider::new(primary, fallback.clone());

        assert!(chained
            .generate("p", &GenerationOptions::default())
            .await
            .is_err());
        assert!(fallback.prompts().is_empty());
    }
}
