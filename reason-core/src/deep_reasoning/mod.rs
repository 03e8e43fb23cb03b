//! Deep-Reasoning Orchestrator: the top-level `execute(request) -> response`
//! entry point. Routes each task through the [`Router`], hands System-1
//! tasks to the [`fast_path`] pipeline and System-2 tasks to the
//! [`StrategySelector`] and one of the five executors, screens every
//! candidate through the [`ReflectionJudge`], and applies accepted changes
//! through the VCS adapter — rolling back on ROLLBACK verdicts.

pub mod fast_path;
pub mod tdd;

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::adapters::guardrail::GuardrailValidator;
use crate::adapters::sandbox::SandboxExecutor;
use crate::adapters::vcs::{VcsApplier, VcsChange};
use crate::config::OrchestratorConfig;
use crate::error::{Error, Result};
use crate::strategy::executors::alphacode::{AlphacodeConfig, AlphacodeExecutor};
use crate::strategy::executors::beam::{BeamConfig, BeamExecutor};
use crate::strategy::executors::debate::{DebateConfig, DebateExecutor};
use crate::strategy::executors::o1::{O1Config, O1Executor};
use crate::strategy::executors::tot::{TotConfig, TotExecutor};
use crate::strategy::executors::{ExecutionOutcome, LlmPort};
use crate::strategy::reflection::{ExecutionTrace, GraphImpact, ReflectionInput, StabilityLevel};
use crate::strategy::router::{Path as RoutingPath, ReasoningDecision, Router, RouterContext, Task};
use crate::strategy::selector::{ReasoningStrategy, StrategySelector};

pub use crate::strategy::{ReflectionVerdict, WorkflowResult};
use crate::strategy::{Reflection, ReflectionJudge};

use fast_path::{FastPathConfig, FastPathOrchestrator};

/// Everything the Deep-Reasoning Orchestrator needs for one `execute` call.
#[derive(Debug, Clone)]
pub struct DeepReasoningRequest {
    pub task: Task,
    pub repo_path: PathBuf,
    pub target_file: String,
    pub current_content: String,
    pub language: String,
    pub requested_strategy: Option<ReasoningStrategy>,
    pub force_system_2: bool,
    pub branch_name: String,
    pub guardrail_profile: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepReasoningResponse {
    pub success: bool,
    pub path: RoutingPath,
    pub strategy: Option<ReasoningStrategy>,
    pub workflow_result: WorkflowResult,
    pub reasoning_decision: ReasoningDecision,
    pub reflection: Reflection,
    pub commit_sha: Option<String>,
    pub rolled_back: bool,
    pub execution_time_ms: u64,
    pub cost_usd: f64,
}

/// The full set of external collaborators the orchestrator is wired against.
/// All are trait objects so the orchestrator stays agnostic of concrete
/// provider/sandbox/VCS implementations.
pub struct DeepReasoningOrchestrator<'a> {
    llm: &'a dyn LlmPort,
    sandbox: &'a dyn SandboxExecutor,
    vcs: &'a dyn VcsApplier,
    guardrail: &'a dyn GuardrailValidator,
    config: OrchestratorConfig,
    router: Router,
    selector: StrategySelector,
    reflection_judge: ReflectionJudge,
}

impl<'a> DeepReasoningOrchestrator<'a> {
    pub fn new(
        llm: &'a dyn LlmPort,
        sandbox: &'a dyn SandboxExecutor,
        vcs: &'a dyn VcsApplier,
        guardrail: &'a dyn GuardrailValidator,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            llm,
            sandbox,
            vcs,
            guardrail,
            config,
            router: Router::new(),
            selector: StrategySelector::new(),
            reflection_judge: ReflectionJudge::new(),
        })
    }

    pub async fn execute(&self, request: &DeepReasoningRequest) -> Result<DeepReasoningResponse> {
        let start = std::time::Instant::now();
        let mut file_contents = HashMap::new();
        file_contents.insert(request.target_file.clone(), request.current_content.clone());
        let router_ctx = RouterContext { file_contents: Some(&file_contents), dependency_counts: None };
        let decision = self.router.decide(&request.task, request.force_system_2, &router_ctx);

        // §5 cancellation: the reasoning phase (the only stretch of
        // `execute` that holds LM-call suspension points before any commit
        // is made) is bounded by the configured deadline. Nothing has been
        // applied to the VCS yet at this point, so a timeout here never
        // needs a rollback.
        let deadline = std::time::Duration::from_secs_f64(self.config.timeout_seconds);
        let (strategy, workflow_result) = tokio::time::timeout(deadline, self.reason(request, &decision))
            .await
            .map_err(|_| Error::timeout(deadline.as_millis() as u64))??;

        let reflection = self.reflection_judge.judge(&reflection_input(&strategy, &decision, &workflow_result));

        let mut commit_sha = None;
        let mut rolled_back = false;

        match reflection.verdict {
            ReflectionVerdict::Accept => {
                if let Some(new_content) = workflow_result.changes.first() {
                    let changes = vec![VcsChange { path: request.target_file.clone().into(), content: Some(new_content.clone()) }];
                    let guardrail_report = self.guardrail.validate(&changes, &request.guardrail_profile)?;
                    if !guardrail_report.valid {
                        return Err(Error::execution(format!(
                            "guardrail rejected accepted change: {}",
                            guardrail_report.errors.join("; ")
                        )));
                    }
                    let apply_result = self.vcs.apply_changes(&request.repo_path, &changes, &request.branch_name)?;
                    commit_sha = Some(apply_result.commit_sha);
                }
            }
            ReflectionVerdict::Rollback => {
                rolled_back = self.vcs.reset_hard(&request.repo_path, "HEAD").is_ok();
            }
            ReflectionVerdict::Revise | ReflectionVerdict::Retry => {}
        }

        Ok(DeepReasoningResponse {
            success: workflow_result.success,
            path: decision.path,
            strategy,
            cost_usd: decision.estimated_cost_usd,
            execution_time_ms: start.elapsed().as_millis() as u64,
            reasoning_decision: decision,
            workflow_result,
            reflection,
            commit_sha,
            rolled_back,
        })
    }

    /// Dispatches to Fast-Path (System-1) or the selected strategy with
    /// its own Fast-Path fallback (System-2), independent of the `execute`
    /// timeout wrapper so it stays plainly testable on its own.
    async fn reason(
        &self,
        request: &DeepReasoningRequest,
        decision: &ReasoningDecision,
    ) -> Result<(Option<ReasoningStrategy>, WorkflowResult)> {
        match decision.path {
            RoutingPath::System1 => {
                let fast_path = FastPathOrchestrator::new(self.llm, self.sandbox);
                let result = fast_path
                    .run(
                        &request.task.description,
                        &request.target_file,
                        &request.current_content,
                        &request.language,
                        &FastPathConfig::default(),
                    )
                    .await?;
                Ok((None, result))
            }
            RoutingPath::System2 => match self.run_system_2(request, decision).await {
                Ok(pair) => Ok(pair),
                Err(deep_err) => {
                    let fast_path = FastPathOrchestrator::new(self.llm, self.sandbox);
                    let fallback_result = fast_path
                        .run(
                            &request.task.description,
                            &request.target_file,
                            &request.current_content,
                            &request.language,
                            &FastPathConfig::default(),
                        )
                        .await
                        .map_err(|fallback_err| {
                            Error::fallback(format!(
                                "deep reasoning failed ({deep_err}); fast-path fallback also failed ({fallback_err})"
                            ))
                        })?;
                    Ok((None, fallback_result))
                }
            },
        }
    }

    /// Strategy selection plus dispatch for the System-2 path. An `Err` here
    /// (an LLM call failing outright, not a soft/degraded outcome) is the
    /// trigger for falling back to the Fast-Path pipeline in `reason`.
    async fn run_system_2(
        &self,
        request: &DeepReasoningRequest,
        decision: &ReasoningDecision,
    ) -> Result<(Option<ReasoningStrategy>, WorkflowResult)> {
        let routing = self.selector.select(
            request.requested_strategy,
            request.force_system_2,
            decision,
            request.task.context_files.len(),
        );
        let outcome = self.run_strategy(routing.strategy, &request.task.description).await?;
        if outcome.success {
            Ok((Some(routing.strategy), outcome.workflow_result))
        } else if let Some(fallback) = routing.fallback {
            let fallback_outcome = self.run_strategy(fallback, &request.task.description).await?;
            Ok((Some(fallback), fallback_outcome.workflow_result))
        } else {
            Ok((Some(routing.strategy), outcome.workflow_result))
        }
    }

    async fn run_strategy(&self, strategy: ReasoningStrategy, description: &str) -> Result<ExecutionOutcome> {
        let strategy_config = &self.config.strategy;
        match strategy {
            ReasoningStrategy::Auto => Err(Error::validation("Auto is not an executable strategy")),
            ReasoningStrategy::Tot => TotExecutor::new(self.llm).execute(description, &TotConfig::default()).await,
            ReasoningStrategy::Beam => {
                let config = BeamConfig { beam_width: strategy_config.beam_width, max_depth: strategy_config.max_depth };
                BeamExecutor::new(self.llm).execute(description, &config).await
            }
            ReasoningStrategy::O1 => {
                let config = O1Config {
                    max_refinements: strategy_config.o1_max_attempts,
                    verification_threshold: strategy_config.o1_verification_threshold,
                };
                O1Executor::new(self.llm).execute(description, &config).await
            }
            ReasoningStrategy::Debate => {
                let config = DebateConfig {
                    num_proposers: strategy_config.num_proposers,
                    num_critics: strategy_config.num_critics,
                    max_rounds: strategy_config.max_rounds,
                };
                DebateExecutor::new(self.llm).execute(description, &config).await
            }
            ReasoningStrategy::Alphacode => {
                let config = AlphacodeConfig {
                    sample_count: strategy_config.alphacode_num_samples,
                    temperature: strategy_config.alphacode_temperature,
                    num_clusters: strategy_config.alphacode_num_clusters,
                    parallel_workers: strategy_config.alphacode_parallel_workers,
                    use_real_pytest: strategy_config.alphacode_use_real_pytest,
                    pytest_timeout: strategy_config.alphacode_pytest_timeout as u64,
                    use_semantic_embedding: strategy_config.alphacode_use_semantic_embedding,
                    embedding_cache: strategy_config.alphacode_embedding_cache,
                    cluster_similarity_threshold: 0.6,
                };
                AlphacodeExecutor::new(self.llm, self.sandbox).execute(description, &config).await
            }
        }
    }
}

/// Builds the Reflection Judge's input from a workflow outcome. Without a
/// real dependency-graph diff for this change, graph impact degrades to the
/// router's own complexity/risk signals rather than fabricating a blast
/// radius no collaborator actually measured.
fn reflection_input(strategy: &Option<ReasoningStrategy>, decision: &ReasoningDecision, workflow_result: &WorkflowResult) -> ReflectionInput {
    let stability_level = if decision.risk > 0.7 {
        StabilityLevel::Unstable
    } else if decision.risk > 0.4 {
        StabilityLevel::Moderate
    } else {
        StabilityLevel::Stable
    };

    let test_pass_rate = if workflow_result.success { 1.0 } else { 0.0 };

    ReflectionInput {
        strategy_id: strategy.as_ref().and_then(|s| s.as_metadata_str()).unwrap_or("fast_path").to_string(),
        execution_success: workflow_result.success,
        test_pass_rate,
        graph_impact: GraphImpact {
            nodes_added: 0,
            nodes_removed: 0,
            affected_functions: 0,
            stability_level,
            impact_score: decision.risk,
        },
        execution_trace: ExecutionTrace::default(),
        similar_failures_count: 0,
    }
}
