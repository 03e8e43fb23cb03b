//! ALPHACODE executor: pre-generate a large sample pool concurrently (bounded
//! by `parallel_workers`), evaluate each sample (real pytest in a sandbox
//! when configured, a structural heuristic otherwise), embed and cluster the
//! survivors, and pick the highest-scoring representative among the
//! per-cluster winners. Reserved for the complexity>0.85 && risk>0.7 corner
//! the Strategy Selector routes here, with BEAM as its named fallback.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use futures::stream::{self, StreamExt};
use rand::Rng;

use crate::adapters::sandbox::SandboxExecutor;
use crate::error::Result;

use super::{gate_on_constitutional_check, looks_syntactically_plausible, Candidate, ExecutionOutcome, GenerateOptions, LlmPort};
use crate::strategy::reflection::ReflectionVerdict;
use crate::strategy::{WorkflowMetadata, WorkflowResult};

#[derive(Debug, Clone)]
pub struct AlphacodeConfig {
    pub sample_count: u32,
    pub temperature: f64,
    pub num_clusters: u32,
    pub parallel_workers: u32,
    pub use_real_pytest: bool,
    pub pytest_timeout: u64,
    pub use_semantic_embedding: bool,
    pub embedding_cache: bool,
    pub cluster_similarity_threshold: f64,
}

impl Default for AlphacodeConfig {
    fn default() -> Self {
        Self {
            sample_count: 16,
            temperature: 0.8,
            num_clusters: 5,
            parallel_workers: 4,
            use_real_pytest: false,
            pytest_timeout: 30,
            use_semantic_embedding: false,
            embedding_cache: true,
            cluster_similarity_threshold: 0.6,
        }
    }
}

/// Structural features standing in for the real evaluator's AST feature
/// extraction: function/class/loop/if counts. Prefixed onto the semantic
/// embedding below, per step 3's "AST features prefixed to a semantic
/// embedding".
fn structural_features(code: &str) -> [f64; 4] {
    let functions = (code.matches("def ").count() + code.matches("fn ").count()) as f64;
    let classes = (code.matches("class ").count() + code.matches("struct ").count()) as f64;
    let loops = (code.matches("for ").count() + code.matches("while ").count()) as f64;
    let ifs = code.matches("if ").count() as f64;
    [functions, classes, loops, ifs]
}

const EMBEDDING_BUCKETS: usize = 16;

/// Cheap hashed bag-of-words vector standing in for a TF-IDF or transformer
/// encoder: every whitespace token falls into one of `EMBEDDING_BUCKETS`
/// hashed slots.
fn semantic_embedding(code: &str) -> [f64; EMBEDDING_BUCKETS] {
    let mut buckets = [0.0; EMBEDDING_BUCKETS];
    for token in code.split_whitespace() {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let bucket = (hasher.finish() as usize) % EMBEDDING_BUCKETS;
        buckets[bucket] += 1.0;
    }
    buckets
}

fn embed(code: &str, use_semantic: bool) -> Vec<f64> {
    let mut vector: Vec<f64> = structural_features(code).to_vec();
    if use_semantic {
        vector.extend(semantic_embedding(code));
    }
    vector
}

/// Embeds `code`, consulting/populating `cache` (keyed by the code string
/// itself, per step 3) only when `use_cache` is set.
fn embed_cached(cache: &mut HashMap<String, Vec<f64>>, code: &str, use_semantic: bool, use_cache: bool) -> Vec<f64> {
    if use_cache {
        if let Some(hit) = cache.get(code) {
            return hit.clone();
        }
        let vector = embed(code, use_semantic);
        cache.insert(code.to_string(), vector.clone());
        vector
    } else {
        embed(code, use_semantic)
    }
}

fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

struct ClusterUnit {
    members: Vec<Candidate>,
    centroid: Vec<f64>,
}

/// Agglomerative clustering by cosine similarity: start with one cluster per
/// candidate, repeatedly merge the most similar pair, until at most
/// `target_clusters` remain (or every candidate has been merged into one).
fn cluster_by_embedding(candidates: Vec<(Candidate, Vec<f64>)>, target_clusters: usize) -> Vec<Vec<Candidate>> {
    let mut clusters: Vec<ClusterUnit> = candidates
        .into_iter()
        .map(|(candidate, embedding)| ClusterUnit { members: vec![candidate], centroid: embedding })
        .collect();

    let target = target_clusters.max(1);
    while clusters.len() > target {
        let mut best_pair = (0usize, 1usize);
        let mut best_similarity = f64::NEG_INFINITY;
        for i in 0..clusters.len() {
            for j in (i + 1)..clusters.len() {
                let sim = cosine_similarity(&clusters[i].centroid, &clusters[j].centroid);
                if sim > best_similarity {
                    best_similarity = sim;
                    best_pair = (i, j);
                }
            }
        }

        let (i, j) = best_pair;
        let merged = clusters.remove(j);
        let base = &mut clusters[i];
        let base_count = base.members.len() as f64;
        let merged_count = merged.members.len() as f64;
        let total = base_count + merged_count;
        base.centroid = base
            .centroid
            .iter()
            .zip(merged.centroid.iter())
            .map(|(a, b)| (a * base_count + b * merged_count) / total)
            .collect();
        base.members.extend(merged.members);
    }

    clusters.into_iter().map(|c| c.members).collect()
}

pub struct AlphacodeExecutor<'a> {
    llm: &'a dyn LlmPort,
    sandbox: &'a dyn SandboxExecutor,
}

impl<'a> AlphacodeExecutor<'a> {
    pub fn new(llm: &'a dyn LlmPort, sandbox: &'a dyn SandboxExecutor) -> Self {
        Self { llm, sandbox }
    }

    pub async fn execute(&self, description: &str, config: &AlphacodeConfig) -> Result<ExecutionOutcome> {
        let sample_count = config.sample_count.max(1) as usize;
        let workers = config.parallel_workers.max(1) as usize;

        // Step 1: pre-generate every sample concurrently, bounded by
        // `parallel_workers`. Per-sample temperature jitters around the
        // configured base rather than using it verbatim, so mass sampling
        // actually explores the neighborhood the config value names.
        let low = (config.temperature - 0.2).max(0.1);
        let high = (config.temperature + 0.2).min(1.5).max(low + 0.01);
        let mut temperatures = Vec::with_capacity(sample_count);
        {
            let mut rng = rand::rng();
            for _ in 0..sample_count {
                temperatures.push(rng.random_range(low..high));
            }
        }

        let generated: Vec<Result<(usize, String)>> = stream::iter(temperatures.into_iter().enumerate())
            .map(|(idx, temperature)| async move {
                let options = GenerateOptions {
                    temperature: Some(temperature),
                    ..Default::default()
                };
                let code = self
                    .llm
                    .generate(&format!("Sample {idx}: implement '{description}' (temperature {temperature:.2})"), &options)
                    .await?;
                Ok((idx, code))
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut samples = Vec::new();
        for result in generated {
            let (idx, code) = result?;
            samples.push((idx, code));
        }

        // Step 2: evaluate every sample, bounded by the same `parallel_workers`
        // pool, each sandbox call isolated in its own scratch directory.
        let evaluated: Vec<Candidate> = stream::iter(samples.into_iter())
            .map(|(idx, code)| async move {
                let mut candidate = Candidate::new(format!("alphacode-{idx}"), code, "sampled attempt");
                if config.use_real_pytest {
                    let mut files = HashMap::new();
                    files.insert("solution.py".to_string(), candidate.code.clone());
                    match self.sandbox.execute_code(&files, config.pytest_timeout).await {
                        Ok(result) => {
                            candidate.compile_success = result.compile_success;
                            candidate.test_pass_rate = result.test_pass_rate;
                        }
                        Err(_) => {
                            // Sandbox error or timeout: degrade to the heuristic
                            // proxy rather than discard the sample outright.
                            candidate.compile_success = looks_syntactically_plausible(&candidate.code);
                            candidate.test_pass_rate = if candidate.compile_success { 0.5 } else { 0.3 };
                        }
                    }
                } else {
                    candidate.compile_success = looks_syntactically_plausible(&candidate.code);
                    candidate.test_pass_rate = if candidate.compile_success { 0.5 } else { 0.0 };
                }
                candidate
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut candidates = evaluated;
        candidates.retain(|c| c.compile_success);
        if candidates.is_empty() {
            return Ok(ExecutionOutcome::degraded("alphacode sampling produced no syntactically valid attempt"));
        }

        // Step 3: embed every survivor, optionally cached by code string.
        let mut embedding_cache: HashMap<String, Vec<f64>> = HashMap::new();
        let embedded: Vec<(Candidate, Vec<f64>)> = candidates
            .into_iter()
            .map(|c| {
                let embedding = embed_cached(&mut embedding_cache, &c.code, config.use_semantic_embedding, config.embedding_cache);
                (c, embedding)
            })
            .collect();

        // Step 4: cluster by cosine similarity into (at most) `num_clusters`.
        let clusters = cluster_by_embedding(embedded, config.num_clusters.max(1) as usize);

        // Step 5: the highest-`final_score` member per cluster, then the
        // overall best among those per-cluster winners — not the largest
        // cluster's best, which can be a different (and weaker) candidate.
        let mut cluster_winners: Vec<Candidate> = Vec::new();
        for mut cluster in clusters {
            cluster.sort_by(|a, b| b.final_score().partial_cmp(&a.final_score()).unwrap());
            if let Some(winner) = cluster.into_iter().next() {
                cluster_winners.push(winner);
            }
        }
        cluster_winners.sort_by(|a, b| b.final_score().partial_cmp(&a.final_score()).unwrap());
        let best = cluster_winners.into_iter().next().expect("at least one non-empty candidate survived filtering");

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
                final_state: "alphacode_complete".to_string(),
                changes: vec![best.code.clone()],
                test_results: Vec::new(),
                total_iterations: 1,
                total_time_seconds: 0.0,
                errors: Vec::new(),
                metadata: WorkflowMetadata {
                    strategy: Some("alphacode".to_string()),
                    total_candidates: Some(sample_count as u32),
                    diversity_score: None,
                    max_attempts: None,
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

    struct NoopSandbox;

    #[async_trait]
    impl SandboxExecutor for NoopSandbox {
        async fn execute_code(&self, _files: &HashMap<String, String>, _timeout_s: u64) -> Result<crate::adapters::sandbox::SandboxResult> {
            Ok(crate::adapters::sandbox::SandboxResult {
                compile_success: true,
                tests_run: 1,
                tests_passed: 1,
                test_pass_rate: 1.0,
                stdout: String::new(),
                stderr: String::new(),
                exit_code: Some(0),
            })
        }

        async fn cleanup(&self) -> Result<()> {
            Ok(())
        }
    }

    struct VariedLlm(AtomicU32);

    #[async_trait]
    impl LlmPort for VariedLlm {
        async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<String> {
            let n = self.0.fetch_add(1, Ordering::SeqCst) % 3;
            Ok(format!("fn attempt_{n}() {{ step_one(); step_two(); }}"))
        }
    }

    #[tokio::test]
    async fn sampling_selects_the_best_cluster_winner() {
        let llm = VariedLlm(AtomicU32::new(0));
        let sandbox = NoopSandbox;
        let executor = AlphacodeExecutor::new(&llm, &sandbox);
        let outcome = executor
            .execute(
                "rewrite the scheduler's retry policy",
                &AlphacodeConfig {
                    sample_count: 9,
                    num_clusters: 3,
                    parallel_workers: 3,
                    ..AlphacodeConfig::default()
                },
            )
            .await
            .unwrap();
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn all_invalid_samples_degrade_gracefully() {
        struct BrokenLlm;

        #[async_trait]
        impl LlmPort for BrokenLlm {
            async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<String> {
                Ok("(((".to_string())
            }
        }

        let llm = BrokenLlm;
        let sandbox = NoopSandbox;
        let executor = AlphacodeExecutor::new(&llm, &sandbox);
        let outcome = executor
            .execute(
                "anything",
                &AlphacodeConfig {
                    sample_count: 4,
                    parallel_workers: 2,
                    ..AlphacodeConfig::default()
                },
            )
            .await
            .unwrap();
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn real_pytest_mode_uses_sandbox_results() {
        let llm = VariedLlm(AtomicU32::new(0));
        let sandbox = NoopSandbox;
        let executor = AlphacodeExecutor::new(&llm, &sandbox);
        let outcome = executor
            .execute(
                "implement the retry budget",
                &AlphacodeConfig {
                    sample_count: 4,
                    parallel_workers: 2,
                    use_real_pytest: true,
                    ..AlphacodeConfig::default()
                },
            )
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.workflow_result.changes.len(), 1);
    }

    #[tokio::test]
    async fn sandbox_error_degrades_instead_of_failing_the_sample() {
        struct FailingSandbox;

        #[async_trait]
        impl SandboxExecutor for FailingSandbox {
            async fn execute_code(&self, _files: &HashMap<String, String>, _timeout_s: u64) -> Result<crate::adapters::sandbox::SandboxResult> {
                Err(crate::error::Error::timeout(1000))
            }

            async fn cleanup(&self) -> Result<()> {
                Ok(())
            }
        }

        let llm = VariedLlm(AtomicU32::new(0));
        let sandbox = FailingSandbox;
        let executor = AlphacodeExecutor::new(&llm, &sandbox);
        let outcome = executor
            .execute(
                "implement the retry budget",
                &AlphacodeConfig {
                    sample_count: 4,
                    parallel_workers: 2,
                    use_real_pytest: true,
                    ..AlphacodeConfig::default()
                },
            )
            .await
            .unwrap();
        assert!(outcome.success);
    }

    #[test]
    fn embedding_cache_returns_identical_vector_for_repeated_code() {
        let mut cache = HashMap::new();
        let a = embed_cached(&mut cache, "fn x() { for i in 0..1 {} }", true, true);
        let b = embed_cached(&mut cache, "fn x() { for i in 0..1 {} }", true, true);
        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clustering_respects_the_target_cluster_count() {
        let candidates: Vec<(Candidate, Vec<f64>)> = (0..8)
            .map(|i| {
                let code = format!("fn v{i}() {{ step(); }}");
                let embedding = embed(&code, false);
                (Candidate::new(format!("c{i}"), code, "x"), embedding)
            })
            .collect();
        let clusters = cluster_by_embedding(candidates, 3);
        assert!(clusters.len() <= 3);
    }
}
