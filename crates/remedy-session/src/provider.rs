//! Generation provider backed by a CLI agent session.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use remedy_core::provider::Usage;
use remedy_core::{Generation, GenerationOptions, GenerationProvider, RemedyError};
use tracing::{debug, warn};

use crate::manager::{SessionManager, StartRequest};
use crate::model::SessionStatus;

/// Runs one session per prompt and answers with the final assistant turn.
pub struct SessionGenerationProvider {
    manager: Arc<SessionManager>,
    profile: String,
    name: String,
    cwd: Option<PathBuf>,
    extra_args: Vec<String>,
    timeout: Duration,
}

impl SessionGenerationProvider {
    pub fn new(manager: Arc<SessionManager>, profile: impl Into<String>, timeout: Duration) -> Self {
        let profile = profile.into();
        Self {
            manager,
            name: format!("session:{profile}"),
            profile,
            cwd: None,
            extra_args: Vec::new(),
            timeout,
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }
}

#[async_trait]
impl GenerationProvider for SessionGenerationProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> remedy_core::Result<Generation> {
        let prompt = match options.system.as_deref() {
            Some(system) if !system.is_empty() => format!("{system}\n\n{prompt}"),
            _ => prompt.to_string(),
        };
        let request = StartRequest {
            profile: self.profile.clone(),
            prompt,
            change_id: None,
            model: options.model.clone(),
            extra_args: self.extra_args.clone(),
            cwd: self.cwd.clone(),
        };

        let session_id = self.manager.start(request).await.map_err(|e| {
            RemedyError::generation(format!("{} could not start: {e}", self.name), false)
        })?;

        let record = match tokio::time::timeout(
            self.timeout,
            self.manager.wait_for_exit(&session_id),
        )
        .await
        {
            Ok(record) => record?,
            Err(_) => {
                warn!(session_id = %session_id, timeout_secs = self.timeout.as_secs(), "generation session timed out");
                if let Err(e) = self.manager.stop(&session_id, true).await {
                    debug!(session_id = %session_id, error = %e, "stop after timeout failed");
                }
                return Err(RemedyError::generation(
                    format!("{} timed out after {}s", self.name, self.timeout.as_secs()),
                    true,
                ));
            }
        };

        if record.status != SessionStatus::Completed {
            let reason = record.message.unwrap_or_else(|| format!("{:?}", record.status));
            return Err(RemedyError::generation(
                format!("{} failed: {reason}", self.name),
                false,
            ));
        }

        let text = record
            .last_assistant_turn()
            .map(|turn| turn.content.clone())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(RemedyError::generation(
                format!("{} produced no output", self.name),
                false,
            ));
        }

        Ok(Generation {
            text,
            usage: Usage::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{ProfileRegistry, PromptDelivery, ToolProfile};
    use crate::store::MemorySessionStore;
    use remedy_core::SessionsConfig;

    fn provider_with(program: &str, base_args: &[&str], timeout: Duration) -> SessionGenerationProvider {
        let profile = ToolProfile {
            id: "agent".to_string(),
            program: program.to_string(),
            base_args: base_args.iter().map(|s| s.to_string()).collect(),
            prompt: PromptDelivery::Stdin,
            live_stdin: false,
            continue_args: vec![],
            model_flag: None,
        };
        let manager = Arc::new(SessionManager::new(
            ProfileRegistry::empty().with(profile),
            Arc::new(MemorySessionStore::new()),
            SessionsConfig::default(),
        ));
        SessionGenerationProvider::new(manager, "agent", timeout)
    }

    #[tokio::test]
    async fn test_returns_assistant_turn() {
        let provider = provider_with("cat", &[], Duration::from_secs(10));
        let options = GenerationOptions {
            system: Some("You fix code.".to_string()),
            ..Default::default()
        };
        let generation = provider.generate("fix it", &options).await.expect("generation");
        assert_eq!(generation.text, "You fix code.\n\nfix it");
        assert_eq!(provider.name(), "session:agent");
    }

    #[tokio::test]
    async fn test_failed_process_is_permanent_error() {
        let provider = provider_with("sh", &["-c", "cat >/dev/null; exit 2"], Duration::from_secs(10));
        let err = provider
            .generate("x", &GenerationOptions::default())
            .await
            .expect_err("exit 2");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("exited with code 2"));
    }

    #[tokio::test]
    async fn test_timeout_is_retryable() {
        let provider = provider_with("sleep", &["30"], Duration::from_millis(200));
        let err = provider
            .generate("x", &GenerationOptions::default())
            .await
            .expect_err("timeout");
        assert!(err.is_retryable());
    }
}
