//! Remedy Core Library
//!
//! Turns failure signals (CI logs, build errors, runtime exceptions, alerts)
//! into validated code fixes and, policy permitting, merged pull requests.

pub mod classifier;
pub mod config;
pub mod domain;
pub mod fakes;
pub mod fixer;
pub mod git;
pub mod merge_policy;
pub mod metrics;
pub mod obs;
pub mod provider;
pub mod telemetry;
pub mod validation;
pub mod workflow;

pub use domain::{
    AnalysisResult, ApplyReport, BatchFixResult, ErrorType, FailureSignal, FileChange, FixResult,
    Location, MergeDecision, MergeGates, MergePolicy, ParsedError, ProgressEvent, PullRequestRef,
    RemedyError, RepositoryRef, Result, RunOutcome, Severity, StageKind, StageResult, StepStatus,
    ValidationLevel, ValidationResult, WorkflowResult, WorkflowStep,
};

pub use classifier::{ClassifierConfig, ErrorClassifier};
pub use config::{RemedyConfig, SessionsConfig, WorkflowConfig};
pub use fixer::{FixContext, FixGenerator, GenerationConfig, RollbackStore};
pub use git::{capture_head_sha, LocalGitProvider};
pub use merge_policy::{MergePolicyEngine, PolicyTable};
pub use provider::{
    CheckRun, CiStatus, FallbackProvider, Generation, GenerationOptions, GenerationProvider,
    GitProvider, RestGenerationProvider, ToolOutcome, ValidationTools,
};
pub use telemetry::init_tracing;
pub use validation::{ValidationConfig, ValidationPipeline};
pub use workflow::{should_retry, InFlightRuns, WorkflowDeps, WorkflowEngine};
