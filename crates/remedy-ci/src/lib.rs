//! Remedy CI - command-backed validation
//!
//! Implements the typecheck, lint and test stages of the validation
//! pipeline by running the project's own tools:
//! - Toolchain presets for Node, Rust and Python
//! - Detection of the toolchain from marker files
//! - Tool output classified into stage errors and warnings

pub mod detect;
pub mod runner;
pub mod stage;
pub mod tools;

// Re-export key types
pub use detect::detect_toolchain;
pub use runner::{CommandOutput, CommandRunner};
pub use stage::{CommandSet, StageCommand, Toolchain};
pub use tools::CommandValidationTools;
