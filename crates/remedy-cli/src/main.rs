//! Remedy CLI
//!
//! The `remedy` command turns failure logs into validated fixes.
//!
//! ## Commands
//!
//! - `classify`: Parse a log or alert payload into classified errors
//! - `validate`: Run the validation pipeline over files in a checkout
//! - `decide`: Evaluate the merge policy for a source and gate inputs
//! - `run`: Run the full remediation workflow for one failure signal
//! - `sessions`: Inspect persisted CLI-agent sessions

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

use remedy_ci::{CommandSet, CommandValidationTools, Toolchain};
use remedy_core::provider::ValidationTools;
use remedy_core::{
    AnalysisResult, ErrorClassifier, FailureSignal, FileChange, GenerationProvider,
    LocalGitProvider, MergeDecision, MergePolicyEngine, RemedyConfig, RepositoryRef,
    RestGenerationProvider, RollbackStore, StageKind, StageResult, ValidationLevel,
    ValidationPipeline, ValidationResult, WorkflowDeps, WorkflowEngine, WorkflowResult,
};
use remedy_session::{SessionGenerationProvider, SessionManager, SessionRecord};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "remedy.toml";

#[derive(Parser)]
#[command(name = "remedy")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Automated failure remediation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "REMEDY_CONFIG")]
    config: Option<PathBuf>,

    /// Result format on stdout
    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ToolchainArg {
    Auto,
    Node,
    Rust,
    Python,
    /// Syntax stage only; external stages are skipped
    Skip,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LevelArg {
    Syntax,
    Typecheck,
    Lint,
    Full,
}

impl From<LevelArg> for ValidationLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Syntax => ValidationLevel::Syntax,
            LevelArg::Typecheck => ValidationLevel::Typecheck,
            LevelArg::Lint => ValidationLevel::Lint,
            LevelArg::Full => ValidationLevel::Full,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Classify the errors in a log file or alert payload
    Classify {
        /// Input file ('-' or omitted reads stdin)
        input: Option<PathBuf>,

        /// Signal source used for the report (github, vercel, sentry, ...)
        #[arg(short, long, default_value = "cli")]
        source: String,

        /// Treat the input as a JSON alert payload
        #[arg(long)]
        payload: bool,

        /// Keep only the highest-priority errors
        #[arg(long)]
        max_errors: Option<usize>,
    },

    /// Validate files of a checkout through the validation pipeline
    Validate {
        /// Repository root
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Deepest stage to run
        #[arg(short, long, value_enum, default_value_t = LevelArg::Full)]
        level: LevelArg,

        /// Toolchain for the typecheck, lint and test stages
        #[arg(short, long, value_enum, default_value_t = ToolchainArg::Auto)]
        toolchain: ToolchainArg,

        /// Files to validate, relative to the root
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Evaluate the merge policy for a fix
    Decide {
        /// Signal source
        #[arg(short, long)]
        source: String,

        /// Signal subtype
        #[arg(long)]
        subtype: Option<String>,

        /// CI checks passed
        #[arg(long)]
        ci_passed: bool,

        /// Validation result JSON (as printed by `validate --format json`)
        #[arg(long, conflicts_with = "validation_passed")]
        validation: Option<PathBuf>,

        /// Treat validation as passed when no result file is given
        #[arg(long)]
        validation_passed: bool,

        /// Fix confidence in [0, 1]
        #[arg(long, default_value = "0.0")]
        confidence: f64,
    },

    /// Run the remediation workflow for one failure signal
    Run {
        /// Failure signal JSON file
        #[arg(long, conflicts_with = "log")]
        signal: Option<PathBuf>,

        /// Raw log file to build the signal from
        #[arg(long, requires = "source")]
        log: Option<PathBuf>,

        /// Signal source for --log
        #[arg(short, long)]
        source: Option<String>,

        /// Signal subtype for --log
        #[arg(long)]
        subtype: Option<String>,

        /// External id for --log (default: derived from the log file name)
        #[arg(long)]
        id: Option<String>,

        /// Local checkout for --log
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Stop before branching; changes are rolled back
        #[arg(long)]
        dry_run: bool,

        /// Retry budget for failed validation
        #[arg(long)]
        max_retries: Option<u32>,

        /// Generate fixes with a CLI agent profile (claude, codex, aider, ...)
        #[arg(long)]
        agent: Option<String>,

        /// REST generation endpoint (overrides the config file)
        #[arg(long, env = "REMEDY_ENDPOINT")]
        endpoint: Option<String>,

        /// Toolchain for validation
        #[arg(short, long, value_enum, default_value_t = ToolchainArg::Auto)]
        toolchain: ToolchainArg,
    },

    /// Inspect CLI-agent sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List persisted sessions
    List,

    /// Show one session with its conversation history
    Show {
        /// Session id
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    remedy_core::init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref())?;
    let format = cli.format;

    match cli.command {
        Commands::Classify {
            input,
            source,
            payload,
            max_errors,
        } => cmd_classify(&config, input.as_deref(), &source, payload, max_errors, format),
        Commands::Validate {
            root,
            level,
            toolchain,
            files,
        } => cmd_validate(&config, &root, level.into(), toolchain, &files, format).await,
        Commands::Decide {
            source,
            subtype,
            ci_passed,
            validation,
            validation_passed,
            confidence,
        } => cmd_decide(
            &config,
            &source,
            subtype.as_deref(),
            ci_passed,
            validation.as_deref(),
            validation_passed,
            confidence,
            format,
        ),
        Commands::Run {
            signal,
            log,
            source,
            subtype,
            id,
            repo,
            dry_run,
            max_retries,
            agent,
            endpoint,
            toolchain,
        } => {
            let mut config = config;
            if dry_run {
                config.workflow.dry_run = true;
            }
            if let Some(max_retries) = max_retries {
                config.workflow.max_retries = max_retries;
            }
            if endpoint.is_some() {
                config.generation.endpoint = endpoint;
            }
            let signal = match (signal, log) {
                (Some(path), _) => read_signal(&path)?,
                (None, Some(log)) => signal_from_log(
                    &log,
                    source.as_deref().unwrap_or("cli"),
                    subtype.as_deref(),
                    id.as_deref(),
                    &repo,
                )?,
                (None, None) => bail!("either --signal or --log is required"),
            };
            cmd_run(&config, signal, agent.as_deref(), toolchain, format).await
        }
        Commands::Sessions { action } => match action {
            SessionsAction::List => cmd_sessions_list(&config, format).await,
            SessionsAction::Show { id } => cmd_sessions_show(&config, &id, format).await,
        },
    }
}

fn load_config(path: Option<&Path>) -> Result<RemedyConfig> {
    let config = match path {
        Some(path) => RemedyConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            RemedyConfig::load(Path::new(DEFAULT_CONFIG_FILE))
                .with_context(|| format!("Failed to load {DEFAULT_CONFIG_FILE}"))?
        }
        None => RemedyConfig::default(),
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "✓"
    } else {
        "✗"
    }
}

fn classifier(config: &RemedyConfig) -> Result<Arc<ErrorClassifier>> {
    let classifier = ErrorClassifier::with_config(config.classifier.clone())
        .context("Failed to build error classifier")?;
    Ok(Arc::new(classifier))
}

/// Classify a log or payload
fn cmd_classify(
    config: &RemedyConfig,
    input: Option<&Path>,
    source: &str,
    payload: bool,
    max_errors: Option<usize>,
    format: Format,
) -> Result<()> {
    let text = read_input(input)?;
    let classifier = classifier(config)?;

    let mut analysis = if payload {
        let value: Value = serde_json::from_str(&text).context("Input is not valid JSON")?;
        classifier.parse_payload(&value, source)
    } else {
        classifier.parse_errors(&text, source)
    };
    if let Some(max) = max_errors {
        analysis.errors = classifier.prioritize(analysis.errors, max);
    }

    if format == Format::Json {
        return print_json(&analysis);
    }
    print_analysis(&classifier, &analysis);
    Ok(())
}

fn print_analysis(classifier: &ErrorClassifier, analysis: &AnalysisResult) {
    if analysis.errors.is_empty() {
        println!("No errors found.");
        return;
    }

    println!(
        "Found {} error(s) ({} matched, {} duplicate(s) removed, {} auto-fixable)",
        analysis.errors.len(),
        analysis.total_found,
        analysis.duplicates_removed,
        analysis.auto_fixable
    );
    println!();
    for error in &analysis.errors {
        let fixable = if classifier.is_auto_fixable(error) {
            " [fixable]"
        } else {
            ""
        };
        println!(
            "  {:?}/{} {} {}{}",
            error.severity, error.error_type, error.location, error.message, fixable
        );
        if let Some(code) = &error.code {
            println!("      code {code}, confidence {:.2}", error.confidence);
        } else {
            println!("      confidence {:.2}", error.confidence);
        }
    }
}

fn validation_tools(
    root: &Path,
    toolchain: ToolchainArg,
    classifier: Arc<ErrorClassifier>,
) -> Arc<dyn ValidationTools> {
    let tools = match toolchain {
        ToolchainArg::Auto => CommandValidationTools::detect(root, classifier.clone())
            .unwrap_or_else(|| {
                warn!(root = %root.display(), "no toolchain detected, external stages will be skipped");
                CommandValidationTools::new(CommandSet::default(), classifier)
            }),
        ToolchainArg::Node => CommandValidationTools::for_toolchain(Toolchain::Node, classifier),
        ToolchainArg::Rust => CommandValidationTools::for_toolchain(Toolchain::Rust, classifier),
        ToolchainArg::Python => {
            CommandValidationTools::for_toolchain(Toolchain::Python, classifier)
        }
        ToolchainArg::Skip => CommandValidationTools::new(CommandSet::default(), classifier),
    };
    Arc::new(tools)
}

/// Validate files in place
async fn cmd_validate(
    config: &RemedyConfig,
    root: &Path,
    level: ValidationLevel,
    toolchain: ToolchainArg,
    files: &[String],
    format: Format,
) -> Result<()> {
    let mut changes = Vec::with_capacity(files.len());
    for file in files {
        let content = std::fs::read_to_string(root.join(file))
            .with_context(|| format!("Failed to read {file}"))?;
        changes.push(FileChange {
            path: file.clone(),
            original: content.clone(),
            modified: content,
            diff: String::new(),
            applied_fixes: Vec::new(),
        });
    }

    let tools = validation_tools(root, toolchain, classifier(config)?);
    let pipeline = ValidationPipeline::new(tools, config.validation.clone());
    let result = pipeline.validate_fix(&changes, root, level).await;

    if format == Format::Json {
        print_json(&result)?;
    } else {
        print_validation(&result);
    }

    if result.passed {
        Ok(())
    } else {
        bail!("Validation failed")
    }
}

fn print_validation(result: &ValidationResult) {
    println!(
        "Validation: {} ({:.0}% of stages passed, {}ms)",
        if result.passed { "✓ PASSED" } else { "✗ FAILED" },
        result.overall_score,
        result.duration_ms
    );
    for stage in &result.stages {
        let status = if stage.skipped {
            "-"
        } else {
            mark(stage.passed)
        };
        println!("  {} {} ({}ms)", status, stage.stage, stage.duration_ms);
        for error in &stage.errors {
            println!("      {error}");
        }
        for warning in &stage.warnings {
            println!("      warning: {warning}");
        }
    }
}

fn synthetic_validation(passed: bool) -> ValidationResult {
    ValidationResult::from_stages(
        vec![StageResult {
            stage: StageKind::Syntax,
            passed,
            skipped: false,
            errors: if passed {
                Vec::new()
            } else {
                vec!["validation reported as failed".to_string()]
            },
            warnings: Vec::new(),
            duration_ms: 0,
        }],
        0,
    )
}

/// Evaluate the merge policy
#[allow(clippy::too_many_arguments)]
fn cmd_decide(
    config: &RemedyConfig,
    source: &str,
    subtype: Option<&str>,
    ci_passed: bool,
    validation: Option<&Path>,
    validation_passed: bool,
    confidence: f64,
    format: Format,
) -> Result<()> {
    let validation = match validation {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str::<ValidationResult>(&text)
                .context("Validation file is not a validation result")?
        }
        None => synthetic_validation(validation_passed),
    };

    let engine = MergePolicyEngine::new(config.policy_table());
    let decision = engine.decide_merge(source, subtype, ci_passed, &validation, confidence);

    if format == Format::Json {
        return print_json(&decision);
    }
    print_decision(&decision);
    Ok(())
}

fn print_decision(decision: &MergeDecision) {
    println!(
        "Merge: {} (policy {})",
        if decision.should_merge { "✓ ALLOWED" } else { "✗ HELD FOR REVIEW" },
        decision.policy.label()
    );
    println!("Reason: {}", decision.reason);
}

fn read_signal(path: &Path) -> Result<FailureSignal> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read signal {}", path.display()))?;
    serde_json::from_str(&text).context("Signal file is not a failure signal")
}

fn signal_from_log(
    log: &Path,
    source: &str,
    subtype: Option<&str>,
    id: Option<&str>,
    repo: &Path,
) -> Result<FailureSignal> {
    let text = std::fs::read_to_string(log)
        .with_context(|| format!("Failed to read log {}", log.display()))?;
    let local_path = repo
        .canonicalize()
        .with_context(|| format!("Repository path {} does not exist", repo.display()))?;
    let name = local_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "repo".to_string());
    let id = match id {
        Some(id) => id.to_string(),
        None => log
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "cli".to_string()),
    };

    let repository = RepositoryRef {
        owner: "local".to_string(),
        name,
        base_branch: "main".to_string(),
        local_path,
    };
    let mut signal = FailureSignal::from_log(id, source, text, repository);
    if let Some(subtype) = subtype {
        signal = signal.with_subtype(subtype);
    }
    Ok(signal)
}

async fn generator(
    config: &RemedyConfig,
    agent: Option<&str>,
    repo: &Path,
) -> Result<Arc<dyn GenerationProvider>> {
    let timeout = Duration::from_secs(config.generation.timeout_secs);

    if let Some(profile) = agent {
        let manager = session_manager(config).await?;
        manager
            .profiles()
            .get(profile)
            .with_context(|| format!("Unknown agent profile '{profile}'"))?;
        let provider = SessionGenerationProvider::new(Arc::new(manager), profile, timeout)
            .with_cwd(repo);
        return Ok(Arc::new(provider));
    }

    let Some(endpoint) = config.generation.endpoint.clone() else {
        bail!("No generation provider: pass --agent or --endpoint, or set generation.endpoint");
    };
    let mut provider = RestGenerationProvider::new(endpoint, timeout)
        .context("Failed to build REST generation provider")?;
    if let Ok(key) = std::env::var(&config.generation.api_key_env) {
        provider = provider.with_api_key(key);
    }
    if let Some(model) = &config.generation.model {
        provider = provider.with_default_model(model.clone());
    }
    Ok(Arc::new(provider))
}

/// Run the remediation workflow
async fn cmd_run(
    config: &RemedyConfig,
    signal: FailureSignal,
    agent: Option<&str>,
    toolchain: ToolchainArg,
    format: Format,
) -> Result<()> {
    let root = signal.repository.local_path.clone();
    let classifier = classifier(config)?;
    let deps = WorkflowDeps {
        generator: generator(config, agent, &root).await?,
        git: Arc::new(LocalGitProvider::default()),
        tools: validation_tools(&root, toolchain, classifier),
        rollbacks: Arc::new(RollbackStore::new()),
    };
    let engine = WorkflowEngine::new(config, deps).context("Failed to build workflow engine")?;

    let mut events = engine.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => eprintln!(
                    "[{}] {} {}",
                    event.step,
                    format!("{:?}", event.status).to_lowercase(),
                    event.message
                ),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    info!(id = %signal.id, source = %signal.source, "starting remediation");
    let result = engine
        .run_with_cancel(&signal, cancel)
        .await
        .context("Workflow could not start")?;
    drop(engine);
    let _ = printer.await;

    if format == Format::Json {
        print_json(&result)?;
    } else {
        print_result(&result);
    }

    if result.succeeded() {
        Ok(())
    } else {
        bail!("Remediation did not complete: {}", result.message)
    }
}

fn print_result(result: &WorkflowResult) {
    println!();
    println!("Run ID: {}", result.run_id);
    println!("Outcome: {:?}", result.outcome);
    println!("Message: {}", result.message);
    println!(
        "Errors: {} found, {} attempt(s)",
        result.errors_found, result.attempts
    );
    for change in &result.changes {
        println!("  ~ {} ({} fix(es))", change.path, change.applied_fixes.len());
    }
    if let Some(validation) = &result.validation {
        println!();
        print_validation(validation);
    }
    if let Some(decision) = &result.decision {
        println!();
        print_decision(decision);
    }
    if let Some(pr) = &result.pull_request {
        println!();
        println!("Pull request #{}: {}", pr.number, pr.url);
    }
}

/// Session manager with the persisted sessions already loaded.
async fn session_manager(config: &RemedyConfig) -> Result<SessionManager> {
    if config.sessions.store_dir.is_none() {
        warn!("sessions.store_dir is not set, nothing is persisted");
    }
    let manager = SessionManager::from_config(&config.sessions);
    manager.load().await.context("Failed to load session store")?;
    Ok(manager)
}

/// List persisted sessions
async fn cmd_sessions_list(config: &RemedyConfig, format: Format) -> Result<()> {
    let manager = session_manager(config).await?;
    let sessions = manager.list_sessions();

    if format == Format::Json {
        return print_json(&sessions);
    }
    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }
    for session in &sessions {
        println!(
            "{}  {:<8} {:<10} {} turn(s)  {}",
            &session.id[..8.min(session.id.len())],
            session.profile_id,
            format!("{:?}", session.status).to_lowercase(),
            session.history.len(),
            session.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}

/// Show one session
async fn cmd_sessions_show(config: &RemedyConfig, id: &str, format: Format) -> Result<()> {
    let manager = session_manager(config).await?;
    let session = find_session(&manager.list_sessions(), id)?;

    if format == Format::Json {
        return print_json(&session);
    }
    println!("session {}", session.id);
    println!("Profile: {}", session.profile_id);
    println!("Status:  {:?}", session.status);
    if let Some(message) = &session.message {
        println!("Message: {message}");
    }
    println!("Created: {}", session.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();
    for turn in &session.history {
        println!("--- {:?} ({})", turn.role, turn.at.format("%H:%M:%S"));
        println!("{}", turn.content.trim_end());
    }
    Ok(())
}

/// Resolve a full id or unique id prefix.
fn find_session(sessions: &[SessionRecord], id: &str) -> Result<SessionRecord> {
    let matches: Vec<&SessionRecord> = sessions.iter().filter(|s| s.id.starts_with(id)).collect();
    match matches.as_slice() {
        [one] => Ok((*one).clone()),
        [] => bail!("Session '{id}' not found"),
        _ => bail!("Session prefix '{id}' is ambiguous ({} matches)", matches.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remedy_session::{FsSessionStore, SessionStatus, SessionStore};

    fn record(id: &str) -> SessionRecord {
        let now = chrono::Utc::now();
        SessionRecord {
            id: id.to_string(),
            profile_id: "claude".to_string(),
            change_id: None,
            model: None,
            extra_args: vec![],
            cwd: None,
            status: SessionStatus::Completed,
            message: None,
            exit_code: Some(0),
            spawn_count: 1,
            history: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_cli_parses_run_with_log() {
        let cli = Cli::try_parse_from([
            "remedy", "run", "--log", "build.log", "--source", "vercel", "--dry-run",
        ])
        .expect("parse");
        match cli.command {
            Commands::Run {
                log,
                source,
                dry_run,
                ..
            } => {
                assert_eq!(log, Some(PathBuf::from("build.log")));
                assert_eq!(source.as_deref(), Some("vercel"));
                assert!(dry_run);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_find_session_by_prefix() {
        let sessions = vec![record("abc123"), record("abd456")];
        assert_eq!(find_session(&sessions, "abc").expect("unique").id, "abc123");
        assert!(find_session(&sessions, "ab").is_err());
        assert!(find_session(&sessions, "zzz").is_err());
    }

    #[test]
    fn test_signal_from_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = dir.path().join("deploy-42.log");
        std::fs::write(&log, "src/app.ts(1,1): error TS2304: Cannot find name 'x'.\n").expect("write");

        let signal =
            signal_from_log(&log, "vercel", Some("build"), None, dir.path()).expect("signal");
        assert_eq!(signal.id, "deploy-42");
        assert_eq!(signal.subtype.as_deref(), Some("build"));
        assert!(signal.repository.local_path.is_absolute());
    }

    #[tokio::test]
    async fn test_agent_generator_loads_persisted_sessions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsSessionStore::new(dir.path());
        store.save(&record("abc123")).await.expect("save");

        let mut config = RemedyConfig::default();
        config.sessions.store_dir = Some(dir.path().to_path_buf());
        let manager = session_manager(&config).await.expect("manager");
        assert!(manager.is_archived("abc123").expect("reloaded"));

        generator(&config, Some("claude"), dir.path())
            .await
            .expect("agent provider");
    }

    #[test]
    fn test_synthetic_validation() {
        assert!(synthetic_validation(true).passed);
        let failed = synthetic_validation(false);
        assert!(!failed.passed);
        assert_eq!(failed.overall_score, 0.0);
    }
}
