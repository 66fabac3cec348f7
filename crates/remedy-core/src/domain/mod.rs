//! Domain models for Remedy.
//!
//! Canonical definitions for the core entities:
//! - `FailureSignal`: raw failure input and the repository it targets
//! - `ParsedError`: classified, deduplicated error record
//! - `FileChange`: proposed modification of one file
//! - `ValidationResult`: staged validation outcome
//! - `MergePolicy` / `MergeDecision`: merge gating
//! - `WorkflowResult`: outcome of one remediation run

pub mod change;
pub mod diagnostic;
pub mod error;
pub mod policy;
pub mod signal;
pub mod validation;
pub mod workflow;

pub use change::{AppliedFix, ApplyReport, BatchFixResult, FileChange, FixResult, ProposedFix};
pub use diagnostic::{AnalysisResult, ErrorType, Location, ParsedError, Severity};
pub use error::{RemedyError, Result};
pub use policy::{MergeDecision, MergeGates, MergePolicy, CONSERVATIVE_DEFAULT};
pub use signal::{FailureSignal, RepositoryRef};
pub use validation::{StageKind, StageResult, ValidationLevel, ValidationResult};
pub use workflow::{
    PhaseOutcome, ProgressEvent, PullRequestRef, RunOutcome, StepStatus, WorkflowResult,
    WorkflowStep,
};
