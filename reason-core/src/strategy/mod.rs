//! Routing, selection, constitutional screening, and reflection over the
//! five parallel reasoning strategies.

pub mod constitutional;
pub mod executors;
pub mod reflection;
pub mod router;
pub mod selector;

pub use constitutional::{
    constitutional_check, ConstitutionalViolation, ConstitutionalViolationSeverity,
};
pub use executors::{Candidate, ExecutionOutcome};
pub use reflection::{GraphImpact, Reflection, ReflectionInput, ReflectionJudge, ReflectionVerdict, StabilityLevel};
pub use router::{Path, ReasoningDecision, Router};
pub use selector::{ReasoningStrategy, RoutingDecision, StrategySelector};

use serde::{Deserialize, Serialize};

/// Outcome of an entire workflow run (one strategy execution or Fast-Path pass).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub success: bool,
    pub final_state: String,
    pub changes: Vec<String>,
    pub test_results: Vec<String>,
    pub total_iterations: u32,
    pub total_time_seconds: f64,
    pub errors: Vec<String>,
    pub metadata: WorkflowMetadata,
}

/// Metadata attached to a `WorkflowResult`; `strategy` is `None` for the
/// Fast-Path pipeline, which never names itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub strategy: Option<String>,
    pub total_candidates: Option<u32>,
    pub diversity_score: Option<f64>,
    pub max_attempts: Option<u32>,
    pub extra: std::collections::HashMap<String, serde_json::Value>,
}

impl WorkflowResult {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            final_state: "failed".to_string(),
            changes: Vec::new(),
            test_results: Vec::new(),
            total_iterations: 0,
            total_time_seconds: 0.0,
            errors: vec![reason.into()],
            metadata: WorkflowMetadata::default(),
        }
    }
}
