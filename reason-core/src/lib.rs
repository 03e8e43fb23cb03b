//! # reason-core
//!
//! Deep reasoning orchestration for a code-generation agent: a router decides
//! between a fast linear pipeline and a slower multi-candidate search, a
//! constitutional filter screens every candidate before it reaches disk, and
//! a reproduction-first TDD cycle drives generated changes to a green test
//! suite (or rolls them back).
//!
//! ## Core Components
//!
//! - **Codecontext / Depgraph / Risk**: AST-derived complexity, dependency
//!   impact, and the cached risk score the router consults.
//! - **Strategy**: the router, strategy selector, five reasoning-strategy
//!   executors, the constitutional filter, and the reflection judge.
//! - **Chunkstore**: hierarchical code-chunk storage and dependency mapping.
//! - **Deep reasoning**: the fast-path pipeline, the TDD cycle controller,
//!   and the top-level orchestrator that ties every other component together.
//! - **Adapters**: the external-system ports (VCS, sandbox, guardrail,
//!   search index, experience log, LLM bridge) the orchestrator is wired
//!   against.
//!
//! ## Example
//!
//! ```rust,ignore
//! use reason_core::{DeepReasoningOrchestrator, DeepReasoningRequest, OrchestratorConfig};
//!
//! let orchestrator = DeepReasoningOrchestrator::new(&llm, &sandbox, &vcs, &guardrail, OrchestratorConfig::default())?;
//! let response = orchestrator.execute(&request).await?;
//! ```

pub mod adapters;
pub mod chunkstore;
pub mod codecontext;
pub mod config;
pub mod deep_reasoning;
pub mod depgraph;
pub mod error;
pub mod llm;
pub mod risk;
pub mod strategy;

// Re-exports for convenience
pub use adapters::{
    ChunkSearchIndex, ExperienceRepository, GitVcsApplier, GuardrailValidator, LlmClientBridge,
    SandboxExecutor, SandboxResult, SearchHit, SqliteChunkSearchIndex, SqliteExperienceRepository,
    StaticGuardrailValidator, SubprocessSandboxExecutor, VcsApplier, VcsApplyResult,
};
pub use chunkstore::{
    Chunk, ChunkHistory, ChunkKind, ChunkStore, ChunkToGraphMapping, ChunkToIrMapping,
    DriftReport, DriftType, IncrementalRefreshResult, SqliteChunkStore, SymbolVisibility,
};
pub use codecontext::{CodeContext, CodeContextAnalyzer, ImportInfo};
pub use config::{OrchestratorConfig, StrategyConfig};
pub use deep_reasoning::{
    DeepReasoningOrchestrator, DeepReasoningRequest, DeepReasoningResponse, ReflectionVerdict,
    WorkflowResult,
};
pub use depgraph::{DependencyGraphBuilder, ImpactReport, ModuleGraph};
pub use error::{Error, Result};
pub use llm::{
    AnthropicClient, BatchConfig, BatchExecutor, BatchQueryResult, BatchedLLMQuery,
    BatchedQueryResults, ClientConfig, CompletionRequest, CompletionResponse, CostTracker,
    DualModelConfig, LLMClient, ModelCallTier, ModelSpec, ModelTier, Provider, QueryType,
    RoutingContext, SmartRouter, SwitchStrategy, TierBreakdown,
};
pub use risk::{RiskCalculator, RiskScore};
pub use strategy::{
    constitutional_check, ConstitutionalViolation, ConstitutionalViolationSeverity, Reflection,
    ReflectionJudge, ReasoningDecision, Router, RoutingDecision as StrategyRoutingDecision,
    StrategySelector,
};
