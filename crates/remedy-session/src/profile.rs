//! Tool profiles: how to call each code-generation CLI.
//!
//! A profile is a capability descriptor. The session manager never branches
//! on a tool's name, only on what its profile says: how the prompt is
//! delivered, whether stdin stays open, and how to continue a conversation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// How the initial prompt reaches the tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromptDelivery {
    /// Passed on the command line, after `flag` when set.
    Argument { flag: Option<String> },
    /// Written to standard input.
    Stdin,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolProfile {
    pub id: String,
    pub program: String,
    #[serde(default)]
    pub base_args: Vec<String>,
    pub prompt: PromptDelivery,
    /// Stdin stays open after the prompt; follow-up input is written to it.
    #[serde(default)]
    pub live_stdin: bool,
    /// Arguments that make a fresh process resume the last conversation.
    /// Empty means the tool cannot be continued by re-spawning.
    #[serde(default)]
    pub continue_args: Vec<String>,
    #[serde(default)]
    pub model_flag: Option<String>,
}

/// Program, arguments and stdin payload for one spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
    pub keep_stdin_open: bool,
}

impl ToolProfile {
    pub fn can_continue(&self) -> bool {
        self.live_stdin || !self.continue_args.is_empty()
    }

    /// Build the invocation for `prompt`. `continuation` selects the
    /// resume arguments.
    pub fn invocation(
        &self,
        prompt: &str,
        model: Option<&str>,
        extra_args: &[String],
        continuation: bool,
    ) -> Invocation {
        let mut args = self.base_args.clone();
        if continuation {
            args.extend(self.continue_args.iter().cloned());
        }
        if let (Some(flag), Some(model)) = (&self.model_flag, model) {
            args.push(flag.clone());
            args.push(model.to_string());
        }
        args.extend(extra_args.iter().cloned());

        let stdin = match &self.prompt {
            PromptDelivery::Argument { flag } => {
                if let Some(flag) = flag {
                    args.push(flag.clone());
                }
                args.push(prompt.to_string());
                None
            }
            PromptDelivery::Stdin => Some(prompt.to_string()),
        };

        Invocation {
            program: self.program.clone(),
            args,
            stdin,
            keep_stdin_open: self.live_stdin,
        }
    }
}

/// Known profiles, keyed by id.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, ToolProfile>,
}

impl ProfileRegistry {
    pub fn empty() -> Self {
        Self {
            profiles: BTreeMap::new(),
        }
    }

    /// Built-in profiles: `claude`, `codex`, `aider`.
    pub fn builtin() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self::empty()
            .with(ToolProfile {
                id: "claude".into(),
                program: "claude".into(),
                base_args: strings(&["--print"]),
                prompt: PromptDelivery::Argument { flag: None },
                live_stdin: false,
                continue_args: strings(&["--continue"]),
                model_flag: Some("--model".into()),
            })
            .with(ToolProfile {
                id: "codex".into(),
                program: "codex".into(),
                base_args: strings(&["exec"]),
                prompt: PromptDelivery::Argument { flag: None },
                live_stdin: false,
                continue_args: strings(&["resume", "--last"]),
                model_flag: Some("--model".into()),
            })
            .with(ToolProfile {
                id: "aider".into(),
                program: "aider".into(),
                base_args: strings(&["--yes-always", "--no-pretty", "--no-stream"]),
                prompt: PromptDelivery::Argument {
                    flag: Some("--message".into()),
                },
                live_stdin: false,
                continue_args: strings(&["--restore-chat-history"]),
                model_flag: Some("--model".into()),
            })
    }

    /// Add or replace a profile.
    pub fn with(mut self, profile: ToolProfile) -> Self {
        self.register(profile);
        self
    }

    pub fn register(&mut self, profile: ToolProfile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    pub fn get(&self, id: &str) -> Result<&ToolProfile> {
        self.profiles
            .get(id)
            .ok_or_else(|| SessionError::UnknownProfile(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profiles() {
        let registry = ProfileRegistry::builtin();
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["aider", "claude", "codex"]);
        assert!(registry.get("claude").unwrap().can_continue());
        assert!(matches!(
            registry.get("cursor"),
            Err(SessionError::UnknownProfile(id)) if id == "cursor"
        ));
    }

    #[test]
    fn test_argument_invocation_with_continuation() {
        let registry = ProfileRegistry::builtin();
        let claude = registry.get("claude").unwrap();

        let first = claude.invocation("fix the build", Some("sonnet"), &[], false);
        assert_eq!(first.args, vec!["--print", "--model", "sonnet", "fix the build"]);
        assert_eq!(first.stdin, None);

        let next = claude.invocation("and the tests", None, &["--verbose".into()], true);
        assert_eq!(next.args, vec!["--print", "--continue", "--verbose", "and the tests"]);
    }

    #[test]
    fn test_flagged_prompt() {
        let registry = ProfileRegistry::builtin();
        let aider = registry.get("aider").unwrap().invocation("hi", None, &[], false);
        assert_eq!(&aider.args[aider.args.len() - 2..], ["--message", "hi"]);
    }

    #[test]
    fn test_stdin_delivery() {
        let profile = ToolProfile {
            id: "repl".into(),
            program: "cat".into(),
            base_args: Vec::new(),
            prompt: PromptDelivery::Stdin,
            live_stdin: true,
            continue_args: Vec::new(),
            model_flag: None,
        };
        let invocation = profile.invocation("hello", Some("ignored"), &[], false);
        assert!(invocation.args.is_empty());
        assert_eq!(invocation.stdin.as_deref(), Some("hello"));
        assert!(invocation.keep_stdin_open);
        assert!(profile.can_continue());
    }
}
