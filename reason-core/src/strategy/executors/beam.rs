//! BEAM executor: beam search over incremental completions, `beam_width` wide,
//! scored at each depth and pruned to the top `beam_width` survivors.

use std::collections::HashSet;

use crate::error::Result;

use super::{gate_on_constitutional_check, looks_syntactically_plausible, Candidate, ExecutionOutcome, GenerateOptions, LlmPort};
use crate::strategy::reflection::ReflectionVerdict;
use crate::strategy::{WorkflowMetadata, WorkflowResult};

#[derive(Debug, Clone)]
pub struct BeamConfig {
    pub beam_width: u32,
    pub max_depth: u32,
}

impl Default for BeamConfig {
    fn default() -> Self {
        Self {
            beam_width: 3,
            max_depth: 3,
        }
    }
}

/// `0.3*compile_success + 0.5*test_pass_rate + 0.2*length_penalty`.
fn score_with_length_penalty(candidate: &mut Candidate, target_length: usize) {
    candidate.compile_success = looks_syntactically_plausible(&candidate.code);
    candidate.test_pass_rate = if candidate.compile_success { 0.7 } else { 0.0 };
    let length_ratio = if target_length == 0 {
        1.0
    } else {
        (candidate.code.len() as f64 / target_length as f64).min(1.0)
    };
    candidate.quality_score = length_ratio;
}

fn token_set(code: &str) -> HashSet<&str> {
    code.split_whitespace().collect()
}

/// Pairwise code distance: 1 - Jaccard similarity of whitespace-split token
/// sets. Two identical-up-to-whitespace candidates score 0 (no distance);
/// two candidates sharing no tokens score 1.
fn pairwise_code_distance(a: &str, b: &str) -> f64 {
    let ta = token_set(a);
    let tb = token_set(b);
    if ta.is_empty() && tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count().max(1);
    1.0 - (intersection as f64 / union as f64)
}

/// Diversity metric over a whole beam: the mean pairwise code distance
/// across every surviving candidate pair. A single-candidate beam has no
/// pair to compare and reports 0 diversity.
fn diversity_score(candidates: &[Candidate]) -> f64 {
    if candidates.len() < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    let mut pairs = 0usize;
    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            total += pairwise_code_distance(&candidates[i].code, &candidates[j].code);
            pairs += 1;
        }
    }
    total / pairs as f64
}

pub struct BeamExecutor<'a> {
    llm: &'a dyn LlmPort,
}

impl<'a> BeamExecutor<'a> {
    pub fn new(llm: &'a dyn LlmPort) -> Self {
        Self { llm }
    }

    pub async fn execute(&self, description: &str, config: &BeamConfig) -> Result<ExecutionOutcome> {
        let target_length = description.len().saturating_mul(4).max(80);
        let width = config.beam_width.max(1) as usize;

        let mut beam: Vec<Candidate> = vec![Candidate::new("beam-root", "", "seed")];

        for depth in 0..config.max_depth.max(1) {
            let mut prompts = Vec::new();
            for parent in &beam {
                for branch in 0..width {
                    prompts.push(format!(
                        "Continue implementing '{description}' from:\n{}\n(branch {branch}, depth {depth})",
                        parent.code
                    ));
                }
            }

            let options = GenerateOptions::default();
            let completions = self.llm.generate_batch(&prompts, &options).await?;

            let mut next_level: Vec<Candidate> = completions
                .into_iter()
                .enumerate()
                .map(|(idx, code)| {
                    let mut candidate = Candidate::new(format!("beam-{depth}-{idx}"), code, "beam branch");
                    candidate.depth = depth;
                    score_with_length_penalty(&mut candidate, target_length);
                    candidate
                })
                .collect();

            next_level.sort_by(|a, b| b.final_score().partial_cmp(&a.final_score()).unwrap());
            next_level.truncate(width);

            if next_level.is_empty() {
                break;
            }
            beam = next_level;
        }

        beam.retain(|c| c.compile_success);
        if beam.is_empty() {
            return Ok(ExecutionOutcome::degraded("beam search produced no syntactically valid completion"));
        }

        let diversity = diversity_score(&beam);

        beam.sort_by(|a, b| b.final_score().partial_cmp(&a.final_score()).unwrap());
        let best = beam.into_iter().next().unwrap();

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
                final_state: "beam_complete".to_string(),
                changes: vec![best.code.clone()],
                test_results: Vec::new(),
                total_iterations: config.max_depth,
                total_time_seconds: 0.0,
                errors: Vec::new(),
                metadata: WorkflowMetadata {
                    strategy: Some("beam".to_string()),
                    total_candidates: Some((width as u32) * config.max_depth.max(1)),
                    diversity_score: Some(diversity),
                    max_attempts: None,
                    extra: Default::default(),
                },
            },
            commit_sha: None,
            reflection_verdict: Some(ReflectionVerdict::Accept),
        })
    }
}
