//! Provider abstractions at the engine boundary: code generation, git
//! hosting and validation tools.

pub mod generation;
pub mod git;
pub mod parse;
pub mod rest;
pub mod tools;

pub use generation::{
    generate_with_backoff, status_error, BackoffConfig, FallbackProvider, Generation,
    GenerationOptions, GenerationProvider, Usage,
};
pub use git::{
    CheckConclusion, CheckRun, CheckStatus, CiStatus, GitProvider, MergeMethod, PrState,
    PrStatus, PullRequestRequest,
};
pub use parse::{extract_json_fragment, parse_json_object, strip_code_fences, ParseOutcome};
pub use rest::RestGenerationProvider;
pub use tools::{ToolOutcome, ValidationTools};
