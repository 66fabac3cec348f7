//! Toolchain presets: which commands implement typecheck, lint and test.

use serde::{Deserialize, Serialize};

/// Project toolchains with built-in command presets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Toolchain {
    /// tsc / eslint / npm test
    Node,

    /// cargo check / cargo clippy / cargo test
    Rust,

    /// mypy / ruff / pytest
    Python,
}

impl Toolchain {
    pub fn name(&self) -> &'static str {
        match self {
            Toolchain::Node => "node",
            Toolchain::Rust => "rust",
            Toolchain::Python => "python",
        }
    }

    /// Files whose presence at the project root identifies the toolchain.
    pub fn markers(&self) -> &'static [&'static str] {
        match self {
            Toolchain::Node => &["package.json", "tsconfig.json"],
            Toolchain::Rust => &["Cargo.toml"],
            Toolchain::Python => &["pyproject.toml", "setup.py", "setup.cfg", "requirements.txt"],
        }
    }

    pub fn preset(&self) -> CommandSet {
        match self {
            Toolchain::Node => CommandSet {
                typecheck: Some(StageCommand::new(&["npx", "--no-install", "tsc", "--noEmit"])),
                lint: Some(StageCommand::new(&["npx", "--no-install", "eslint"]).with_files()),
                test: Some(StageCommand::new(&["npm", "test", "--silent"])),
            },
            Toolchain::Rust => CommandSet {
                typecheck: Some(StageCommand::new(&["cargo", "check", "--workspace", "--message-format=short"])),
                lint: Some(StageCommand::new(&[
                    "cargo",
                    "clippy",
                    "--workspace",
                    "--message-format=short",
                    "--",
                    "-D",
                    "warnings",
                ])),
                test: Some(StageCommand::new(&["cargo", "test", "--workspace"])),
            },
            Toolchain::Python => CommandSet {
                typecheck: Some(StageCommand::new(&["mypy"]).with_files()),
                lint: Some(StageCommand::new(&["ruff", "check"]).with_files()),
                test: Some(StageCommand::new(&["pytest", "-q"])),
            },
        }
    }

    pub fn all() -> [Toolchain; 3] {
        [Toolchain::Rust, Toolchain::Node, Toolchain::Python]
    }
}

impl std::fmt::Display for Toolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One external command backing a validation stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageCommand {
    /// Command to execute (first element is executable).
    pub command: Vec<String>,

    /// Append the changed file paths to the command line.
    #[serde(default)]
    pub append_files: bool,
}

impl StageCommand {
    pub fn new(command: &[&str]) -> Self {
        Self {
            command: command.iter().map(|s| s.to_string()).collect(),
            append_files: false,
        }
    }

    pub fn with_files(mut self) -> Self {
        self.append_files = true;
        self
    }

    /// Full argv for a run over `files`.
    pub fn argv(&self, files: &[String]) -> Vec<String> {
        let mut argv = self.command.clone();
        if self.append_files {
            argv.extend(files.iter().cloned());
        }
        argv
    }
}

/// Commands for the three external stages. A missing command leaves its
/// stage skipped.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandSet {
    #[serde(default)]
    pub typecheck: Option<StageCommand>,
    #[serde(default)]
    pub lint: Option<StageCommand>,
    #[serde(default)]
    pub test: Option<StageCommand>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_cover_every_stage() {
        for toolchain in Toolchain::all() {
            let preset = toolchain.preset();
            assert!(preset.typecheck.is_some(), "{toolchain} typecheck");
            assert!(preset.lint.is_some(), "{toolchain} lint");
            assert!(preset.test.is_some(), "{toolchain} test");
        }
    }

    #[test]
    fn test_node_preset_commands() {
        let preset = Toolchain::Node.preset();
        let typecheck = preset.typecheck.expect("typecheck");
        assert!(typecheck.command.contains(&"--noEmit".to_string()));
        assert!(preset.lint.expect("lint").append_files);
    }

    #[test]
    fn test_argv_appends_files_only_when_asked() {
        let files = vec!["src/a.py".to_string()];
        assert_eq!(StageCommand::new(&["pytest"]).argv(&files), vec!["pytest"]);
        assert_eq!(
            StageCommand::new(&["ruff", "check"]).with_files().argv(&files),
            vec!["ruff", "check", "src/a.py"]
        );
    }

    #[test]
    fn test_command_set_missing_stages_default_to_none() {
        let set: CommandSet =
            serde_json::from_str(r#"{"test":{"command":["make","test"]}}"#).expect("parse");
        assert_eq!(set.lint, None);
        let test = set.test.expect("test");
        assert_eq!(test.command, vec!["make", "test"]);
        assert!(!test.append_files);
    }
}
