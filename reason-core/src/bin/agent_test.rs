//! `agent-test` — thin CLI front-end over the deep-reasoning orchestrator.
//!
//! `agent-test run execute <task> --snapshot <uuid> [--strategy ...] [--retriever ...]`
//! reads the target file, wires real collaborators (an Anthropic-backed LLM
//! port, a subprocess sandbox, a git VCS applier, a static guardrail) and
//! prints the orchestrator's response as JSON. Exit codes: `0` success, `22`
//! validation error, `1` any other failure.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;

use reason_core::adapters::llm_bridge::LlmClientBridge;
use reason_core::adapters::sandbox::SubprocessSandboxExecutor;
use reason_core::adapters::vcs::GitVcsApplier;
use reason_core::adapters::StaticGuardrailValidator;
use reason_core::llm::{AnthropicClient, ClientConfig};
use reason_core::strategy::router::Task;
use reason_core::strategy::selector::ReasoningStrategy;
use reason_core::{DeepReasoningOrchestrator, DeepReasoningRequest, Error, OrchestratorConfig};

#[derive(Parser, Debug)]
#[command(name = "agent-test")]
#[command(about = "Deep reasoning orchestrator CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: TopCommand,
}

#[derive(Subcommand, Debug)]
enum TopCommand {
    /// Run a reasoning workflow.
    Run {
        #[command(subcommand)]
        action: RunAction,
    },
}

#[derive(Subcommand, Debug)]
enum RunAction {
    /// Execute one task end to end: route, reason, reflect, apply or roll back.
    Execute(ExecuteArgs),
}

#[derive(Parser, Debug)]
struct ExecuteArgs {
    /// Natural-language description of the task.
    task: String,

    /// Snapshot identifier the task was planned against.
    #[arg(long)]
    snapshot: String,

    /// Repository root to operate in.
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// File the task targets, relative to `repo`.
    #[arg(long)]
    file: String,

    /// Source language of `file`, for the context analyzer.
    #[arg(long, default_value = "python")]
    language: String,

    /// Force a specific reasoning strategy instead of letting the selector choose.
    #[arg(long, value_parser = parse_strategy)]
    strategy: Option<ReasoningStrategy>,

    /// Retrieval backend identifier, forwarded to the task's metadata; the
    /// concrete index lives outside this crate.
    #[arg(long, value_parser = ["basic", "v3", "multi_hop", "reasoning"], default_value = "basic")]
    retriever: String,

    /// Skip the router and force the System-2 (multi-candidate) path.
    #[arg(long)]
    force_system_2: bool,

    /// Branch to commit accepted changes onto.
    #[arg(long, default_value = "agent-test/run")]
    branch: String,

    /// Guardrail policy profile.
    #[arg(long, default_value = "default")]
    guardrail_profile: String,

    /// Path to a TOML file overriding `OrchestratorConfig` defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Shell command used by the sandbox to run the project's test suite.
    #[arg(long, default_value = "cargo test")]
    test_command: String,
}

fn parse_strategy(value: &str) -> Result<ReasoningStrategy, String> {
    ReasoningStrategy::parse(value).map_err(|e| e.to_string())
}

fn load_config(path: Option<&PathBuf>) -> Result<OrchestratorConfig, Error> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("reading config file {}: {e}", path.display())))?;
            toml::from_str(&raw).map_err(|e| Error::Config(format!("parsing config file {}: {e}", path.display())))?
        }
        None => OrchestratorConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Mirrors the CLI-layer input checks the orchestrator itself does not
/// repeat: an empty or oversized task description, and a snapshot id that
/// isn't a UUID, are caller mistakes the CLI should reject before spending
/// an LLM call.
fn validate_execute_args(args: &ExecuteArgs) -> Result<(), Error> {
    let task = args.task.trim();
    if task.is_empty() {
        return Err(Error::validation("task description cannot be empty"));
    }
    if task.len() > 10_000 {
        return Err(Error::validation(format!("task description too long: {} chars (max 10000)", task.len())));
    }
    uuid::Uuid::parse_str(&args.snapshot)
        .map_err(|e| Error::validation(format!("invalid snapshot id {:?}, expected a UUID: {e}", args.snapshot)))?;
    Ok(())
}

async fn run_execute(args: ExecuteArgs) -> Result<(), Error> {
    validate_execute_args(&args)?;
    let config = load_config(args.config.as_ref())?;

    let current_content = std::fs::read_to_string(args.repo.join(&args.file))
        .map_err(|e| Error::validation(format!("cannot read {}: {e}", args.file)))?;

    let api_key = std::env::var("ANTHROPIC_API_KEY")
        .map_err(|_| Error::initialization("ANTHROPIC_API_KEY is not set"))?;
    let llm_client: Arc<dyn reason_core::llm::LLMClient> =
        Arc::new(AnthropicClient::new(ClientConfig::new(api_key).with_default_model("claude-3-5-sonnet-20241022")));
    let llm = LlmClientBridge::new(llm_client);

    let test_command: Vec<String> = args.test_command.split_whitespace().map(str::to_string).collect();
    let sandbox = SubprocessSandboxExecutor::new(test_command);
    let vcs = GitVcsApplier::new("agent-test", "agent-test@localhost");
    let guardrail = StaticGuardrailValidator::new(200_000);

    let orchestrator = DeepReasoningOrchestrator::new(&llm, &sandbox, &vcs, &guardrail, config)?;

    let mut metadata = std::collections::HashMap::new();
    metadata.insert("retriever".to_string(), serde_json::Value::String(args.retriever.clone()));

    let request = DeepReasoningRequest {
        task: Task {
            task_id: args.snapshot.clone(),
            description: args.task.clone(),
            repo_id: args.repo.display().to_string(),
            snapshot_id: args.snapshot.clone(),
            context_files: vec![args.file.clone()],
            metadata,
        },
        repo_path: args.repo.clone(),
        target_file: args.file.clone(),
        current_content,
        language: args.language.clone(),
        requested_strategy: args.strategy,
        force_system_2: args.force_system_2,
        branch_name: args.branch.clone(),
        guardrail_profile: args.guardrail_profile.clone(),
    };

    let response = orchestrator.execute(&request).await?;
    println!("{}", serde_json::to_string_pretty(&response).expect("response is always serializable"));
    Ok(())
}

fn print_error(err: &Error) {
    let payload = json!({
        "error": {
            "message": err.to_string(),
            "details": {
                "status_code": err.status_code(),
            }
        }
    });
    eprintln!("{payload}");
}

fn exit_code_for(err: &Error) -> i32 {
    if err.status_code() == 422 {
        22
    } else {
        1
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let TopCommand::Run { action } = cli.command;
    let RunAction::Execute(args) = action;

    match run_execute(args).await {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            print_error(&err);
            std::process::exit(exit_code_for(&err));
        }
    }
}
