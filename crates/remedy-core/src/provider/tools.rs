//! Abstract validation tools consumed by the validation pipeline.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::Result;

/// Output of one tool invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolOutcome {
    pub passed: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ToolOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            ..Self::default()
        }
    }

    pub fn fail(errors: Vec<String>) -> Self {
        Self {
            passed: false,
            errors,
            warnings: Vec::new(),
        }
    }
}

/// External typecheck, lint and test runners.
///
/// An `Err` means the tool could not be invoked at all (missing binary,
/// misconfiguration); the pipeline reports such stages as skipped.
#[async_trait]
pub trait ValidationTools: Send + Sync {
    async fn typecheck(&self, root: &Path, files: &[String]) -> Result<ToolOutcome>;

    async fn lint(&self, root: &Path, files: &[String]) -> Result<ToolOutcome>;

    async fn test(&self, root: &Path, files: &[String]) -> Result<ToolOutcome>;
}
