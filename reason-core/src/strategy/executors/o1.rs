//! O1 executor: answer -> verify -> {accept|refine} iterative-verification
//! state machine, used when risk is high and a single careful pass beats
//! breadth.

use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::{gate_on_constitutional_check, looks_syntactically_plausible, Candidate, ExecutionOutcome, GenerateOptions, LlmPort};
use crate::strategy::reflection::ReflectionVerdict;
use crate::strategy::{WorkflowMetadata, WorkflowResult};

#[derive(Debug, Clone)]
pub struct O1Config {
    pub max_refinements: u32,
    pub verification_threshold: f64,
}

impl Default for O1Config {
    fn default() -> Self {
        Self {
            max_refinements: 3,
            verification_threshold: 0.75,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VerificationResult {
    passed: bool,
    confidence: f64,
    issues: Vec<String>,
}

fn verify(candidate: &Candidate, threshold: f64) -> VerificationResult {
    let mut issues = Vec::new();
    if !candidate.compile_success {
        issues.push("candidate is not syntactically plausible".to_string());
    }
    if candidate.code.len() < 8 {
        issues.push("candidate is implausibly short".to_string());
    }

    let confidence = if candidate.compile_success {
        (1.0 - issues.len() as f64 * 0.2).max(0.0)
    } else {
        0.0
    };

    VerificationResult {
        passed: issues.is_empty() && confidence >= threshold,
        confidence,
        issues,
    }
}

pub struct O1Executor<'a> {
    llm: &'a dyn LlmPort,
}

impl<'a> O1Executor<'a> {
    pub fn new(llm: &'a dyn LlmPort) -> Self {
        Self { llm }
    }

    pub async fn execute(&self, description: &str, config: &O1Config) -> Result<ExecutionOutcome> {
        let options = GenerateOptions::default();
        let mut answer = self
            .llm
            .generate(&format!("Carefully answer and implement: {description}"), &options)
            .await?;

        let mut candidate = Candidate::new("o1-0", answer.clone(), "initial answer");
        candidate.compile_success = looks_syntactically_plausible(&candidate.code);

        let mut verification = verify(&candidate, config.verification_threshold);
        let mut attempt = 0;

        while !verification.passed && attempt < config.max_refinements {
            attempt += 1;
            answer = self
                .llm
                .generate(
                    &format!(
                        "Refine this answer for '{description}'. Issues found: {}.\nPrevious answer:\n{answer}",
                        verification.issues.join("; ")
                    ),
                    &options,
                )
                .await?;
            candidate = Candidate::new(format!("o1-{attempt}"), answer.clone(), "refined answer");
            candidate.compile_success = looks_syntactically_plausible(&candidate.code);
            verification = verify(&candidate, config.verification_threshold);
        }

        candidate.test_pass_rate = verification.confidence;
        candidate.quality_score = verification.confidence;

        if !verification.passed {
            return Ok(ExecutionOutcome::degraded(format!(
                "verification did not pass after {attempt} refinement(s): {}",
                verification.issues.join("; ")
            )));
        }

        if let Err(e) = gate_on_constitutional_check(&candidate) {
            return Ok(ExecutionOutcome {
                success: false,
                workflow_result: WorkflowResult::failed(e.to_string()),
                commit_sha: None,
                reflection_verdict: Some(ReflectionVerdict::Retry),
            });
        }

        Ok(ExecutionOutcome {
            success: true,
            workflow_result: WorkflowResult {
                success: true,
                final_state: "o1_complete".to_string(),
                changes: vec![candidate.code.clone()],
                test_results: Vec::new(),
                total_iterations: attempt + 1,
                total_time_seconds: 0.0,
                errors: Vec::new(),
                metadata: WorkflowMetadata {
                    strategy: Some("o1".to_string()),
                    total_candidates: Some(attempt + 1),
                    diversity_score: None,
                    max_attempts: Some(config.max_refinements),
                    extra: Default::default(),
                },
            },
            commit_sha: None,
            reflection_verdict: Some(ReflectionVerdict::Accept),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ImprovingLlm {
        calls: AtomicU32,
    }

    #[async_trait]
    impl LlmPort for ImprovingLlm {
        async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("fn solve() {{ /* attempt {n} */ body_{n}() }}"))
        }
    }

    struct NeverValidLlm;

    #[async_trait]
    impl LlmPort for NeverValidLlm {
        async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<String> {
            Ok("(((".to_string())
        }
    }

    #[tokio::test]
    async fn verification_accepts_a_plausible_answer() {
        let llm = ImprovingLlm { calls: AtomicU32::new(0) };
        let executor = O1Executor::new(&llm);
        let outcome = executor.execute("implement a retry helper", &O1Config::default()).await.unwrap();
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn exhausting_refinements_degrades_gracefully() {
        let llm = NeverValidLlm;
        let executor = O1Executor::new(&llm);
        let outcome = executor
            .execute(
                "impossible task",
                &O1Config {
                    max_refinements: 2,
                    verification_threshold: 0.75,
                },
            )
            .await
            .unwrap();
        assert!(!outcome.success);
    }
}
