//! The five strategy executors and their shared contract.
//!
//! Each executor is driven by an `LlmPort` — the thin `generate`/`generate_batch`
//! contract an external LLM provider needs to satisfy, independent of the
//! richer `llm::LLMClient` this crate also carries for direct provider use.

pub mod alphacode;
pub mod beam;
pub mod debate;
pub mod o1;
pub mod tot;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::strategy::constitutional::{constitutional_check, has_critical_violation};
use crate::strategy::reflection::ReflectionVerdict;
use crate::strategy::WorkflowResult;

/// Options accepted by a single `generate` call.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub timeout_ms: Option<u64>,
}

/// `LLMPort` from the external-interfaces section: `generate`/`generate_batch`
/// only. Provider-specific richness lives behind `llm::LLMClient`; adapters
/// bridge one to the other.
#[async_trait]
pub trait LlmPort: Send + Sync {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String>;

    /// Default batch implementation issues calls sequentially; providers
    /// that support real batching override this.
    async fn generate_batch(&self, prompts: &[String], options: &GenerateOptions) -> Result<Vec<String>> {
        let mut outputs = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            outputs.push(self.generate(prompt, options).await?);
        }
        Ok(outputs)
    }
}

/// Strategy-specific superset candidate. Not every field is populated by
/// every executor (e.g. `depth`/`parent_id` are TOT/BEAM-only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub code: String,
    pub reasoning: String,
    pub compile_success: bool,
    pub test_pass_rate: f64,
    pub quality_score: f64,
    pub llm_confidence: f64,
    pub depth: u32,
    pub parent_id: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, code: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            reasoning: reasoning.into(),
            compile_success: false,
            test_pass_rate: 0.0,
            quality_score: 0.0,
            llm_confidence: 0.0,
            depth: 0,
            parent_id: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// `0.3*compile_success + 0.5*test_pass_rate + 0.2*quality`.
    pub fn final_score(&self) -> f64 {
        let compile = if self.compile_success { 1.0 } else { 0.0 };
        0.3 * compile + 0.5 * self.test_pass_rate + 0.2 * self.quality_score
    }
}

/// What an executor hands back to the Deep-Reasoning Orchestrator.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub workflow_result: WorkflowResult,
    pub commit_sha: Option<String>,
    pub reflection_verdict: Option<ReflectionVerdict>,
}

impl ExecutionOutcome {
    fn degraded(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            workflow_result: WorkflowResult::failed(reason),
            commit_sha: None,
            reflection_verdict: Some(ReflectionVerdict::Retry),
        }
    }
}

/// Common parse/length heuristic used as a compile-success proxy when no real
/// compiler/interpreter is wired in (sandbox execution is an external
/// collaborator; this is what executors fall back to before that step runs).
pub fn looks_syntactically_plausible(code: &str) -> bool {
    if code.trim().is_empty() {
        return false;
    }
    let opens: i64 = code.chars().filter(|&c| c == '(' || c == '[' || c == '{').count() as i64;
    let closes: i64 = code.chars().filter(|&c| c == ')' || c == ']' || c == '}').count() as i64;
    opens == closes
}

/// Runs the constitutional check on a candidate's code. Every executor calls
/// this before reporting success; a critical finding converts success to
/// failure with verdict RETRY, per the common executor contract.
pub fn gate_on_constitutional_check(candidate: &Candidate) -> Result<Vec<String>> {
    let violations = constitutional_check(&candidate.code);
    if has_critical_violation(&violations) {
        let ids: Vec<String> = violations
            .iter()
            .filter(|v| v.severity == crate::strategy::ConstitutionalViolationSeverity::Critical)
            .map(|v| v.rule_id.clone())
            .collect();
        return Err(crate::error::Error::execution(format!(
            "critical constitutional violation(s): {}",
            ids.join(", ")
        )));
    }
    Ok(violations.into_iter().map(|v| v.rule_id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_score_matches_weighted_formula() {
        let mut candidate = Candidate::new("c1", "code", "because");
        candidate.compile_success = true;
        candidate.test_pass_rate = 0.8;
        candidate.quality_score = 0.5;
        let expected = 0.3 + 0.5 * 0.8 + 0.2 * 0.5;
        assert!((candidate.final_score() - expected).abs() < 1e-9);
    }

    #[test]
    fn empty_code_is_not_syntactically_plausible() {
        assert!(!looks_syntactically_plausible("   "));
    }

    #[test]
    fn balanced_brackets_are_plausible() {
        assert!(looks_syntactically_plausible("def f(a, b):\n    return [a, b]\n"));
    }

    #[test]
    fn critical_violation_blocks_candidate() {
        let candidate = Candidate::new("c1", r#"password = "admin123""#, "because");
        let err = gate_on_constitutional_check(&candidate).unwrap_err();
        assert_eq!(err.status_code(), 500);
    }
}
