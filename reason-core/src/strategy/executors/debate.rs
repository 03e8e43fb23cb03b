//! DEBATE executor: independent proposers each produce a position, critics
//! rate every position, and the top-2 agreeing proposals form the accepted
//! consensus. Used when a change touches many context files and a single
//! generator is likely to miss cross-cutting concerns.

use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::{gate_on_constitutional_check, looks_syntactically_plausible, Candidate, ExecutionOutcome, GenerateOptions, LlmPort};
use crate::strategy::reflection::ReflectionVerdict;
use crate::strategy::{WorkflowMetadata, WorkflowResult};

#[derive(Debug, Clone)]
pub struct DebateConfig {
    pub num_proposers: u32,
    pub num_critics: u32,
    pub max_rounds: u32,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            num_proposers: 3,
            num_critics: 2,
            max_rounds: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CriticRating {
    candidate_id: String,
    score: f64,
}

/// One critic's weighting over compile_success/test_pass_rate/quality_score.
/// Each critic emphasizes a different dimension rather than collapsing to a
/// single self-scoring pass, so `num_critics` actually changes the rating
/// rather than just repeating `final_score()`.
fn critic_weights(critic_index: u32) -> (f64, f64, f64) {
    match critic_index % 4 {
        0 => (0.4, 0.4, 0.2),
        1 => (0.2, 0.6, 0.2),
        2 => (0.3, 0.3, 0.4),
        _ => (0.25, 0.5, 0.25),
    }
}

fn critic_score(candidate: &Candidate, critic_index: u32) -> f64 {
    let (compile_w, test_w, quality_w) = critic_weights(critic_index);
    let compile_term = if candidate.compile_success { 1.0 } else { 0.0 };
    compile_w * compile_term + test_w * candidate.test_pass_rate + quality_w * candidate.quality_score
}

/// Runs `num_critics` independent ratings per candidate and averages them
/// into one consensus score, rather than a single self-scoring pass.
fn critique(candidates: &[Candidate], num_critics: u32) -> Vec<CriticRating> {
    let num_critics = num_critics.max(1);
    candidates
        .iter()
        .map(|c| {
            let total: f64 = (0..num_critics).map(|i| critic_score(c, i)).sum();
            CriticRating {
                candidate_id: c.id.clone(),
                score: total / num_critics as f64,
            }
        })
        .collect()
}

pub struct DebateExecutor<'a> {
    llm: &'a dyn LlmPort,
}

impl<'a> DebateExecutor<'a> {
    pub fn new(llm: &'a dyn LlmPort) -> Self {
        Self { llm }
    }

    pub async fn execute(&self, description: &str, config: &DebateConfig) -> Result<ExecutionOutcome> {
        let n = config.num_proposers.max(2) as usize;
        let options = GenerateOptions::default();

        let mut positions: Vec<Candidate> = Vec::new();
        let mut round = 0;

        loop {
            let prompts: Vec<String> = (0..n)
                .map(|i| {
                    if positions.is_empty() {
                        format!("Proposer {i}: propose a position for implementing '{description}'.")
                    } else {
                        format!(
                            "Proposer {i}: given the prior round's positions, propose an improved position for '{description}'.\nPrior best: {}",
                            positions.first().map(|c| c.code.as_str()).unwrap_or("")
                        )
                    }
                })
                .collect();

            let responses = self.llm.generate_batch(&prompts, &options).await?;
            positions = responses
                .into_iter()
                .enumerate()
                .map(|(idx, code)| {
                    let mut candidate = Candidate::new(format!("debate-{round}-{idx}"), code, "proposer position");
                    candidate.compile_success = looks_syntactically_plausible(&candidate.code);
                    candidate.test_pass_rate = if candidate.compile_success { 0.65 } else { 0.0 };
                    candidate
                })
                .collect();

            let ratings = critique(&positions, config.num_critics);
            let mut scored: Vec<(Candidate, f64)> = positions
                .clone()
                .into_iter()
                .zip(ratings.iter().map(|r| r.score))
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

            let top_two: Vec<&(Candidate, f64)> = scored.iter().take(2).collect();
            let consensus_reached = top_two.len() == 2 && (top_two[0].1 - top_two[1].1).abs() < 0.15;

            positions = scored.into_iter().map(|(c, _)| c).collect();

            round += 1;
            if consensus_reached || round >= config.max_rounds.max(1) {
                break;
            }
        }

        positions.retain(|c| c.compile_success);
        if positions.is_empty() {
            return Ok(ExecutionOutcome::degraded("no proposer produced a syntactically valid position"));
        }

        positions.sort_by(|a, b| b.final_score().partial_cmp(&a.final_score()).unwrap());
        let best = positions.into_iter().next().unwrap();

        if let Err(e) = gate_on_constitutional_check(&best) {
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
                final_state: "debate_complete".to_string(),
                changes: vec![best.code.clone()],
                test_results: Vec::new(),
                total_iterations: round,
                total_time_seconds: 0.0,
                errors: Vec::new(),
                metadata: WorkflowMetadata {
                    strategy: Some("debate".to_string()),
                    total_candidates: Some(n as u32 * round),
                    diversity_score: None,
                    max_attempts: Some(config.max_rounds),
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

    struct ConvergingLlm;

    #[async_trait]
    impl LlmPort for ConvergingLlm {
        async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<String> {
            Ok("fn handle() { apply_change(); }".to_string())
        }

        async fn generate_batch(&self, prompts: &[String], options: &GenerateOptions) -> Result<Vec<String>> {
            let mut out = Vec::new();
            for p in prompts {
                out.push(self.generate(p, options).await?);
            }
            Ok(out)
        }
    }

    #[tokio::test]
    async fn converges_to_a_consensus_candidate() {
        let llm = ConvergingLlm;
        let executor = DebateExecutor::new(&llm);
        let outcome = executor
            .execute("coordinate changes across five modules", &DebateConfig::default())
            .await
            .unwrap();
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn stops_at_max_rounds_without_consensus() {
        struct DivergingLlm(std::sync::atomic::AtomicU32);

        #[async_trait]
        impl LlmPort for DivergingLlm {
            async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<String> {
                let n = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(format!("fn v{n}() {{ option_{n}(); }}"))
            }

            async fn generate_batch(&self, prompts: &[String], options: &GenerateOptions) -> Result<Vec<String>> {
                let mut out = Vec::new();
                for p in prompts {
                    out.push(self.generate(p, options).await?);
                }
                Ok(out)
            }
        }

        let llm = DivergingLlm(std::sync::atomic::AtomicU32::new(0));
        let executor = DebateExecutor::new(&llm);
        let outcome = executor
            .execute(
                "contentious refactor",
                &DebateConfig {
                    num_proposers: 3,
                    num_critics: 2,
                    max_rounds: 2,
                },
            )
            .await
            .unwrap();
        assert!(outcome.success);
    }

    #[test]
    fn more_critics_averages_across_more_weightings() {
        let mut candidate = Candidate::new("c", "fn x() {}", "test");
        candidate.compile_success = true;
        candidate.test_pass_rate = 0.8;
        candidate.quality_score = 0.5;

        let one = critique(std::slice::from_ref(&candidate), 1)[0].score;
        let four = critique(std::slice::from_ref(&candidate), 4)[0].score;
        assert_ne!(one, four);
        assert!((0.0..=1.0).contains(&one));
        assert!((0.0..=1.0).contains(&four));
    }
}
