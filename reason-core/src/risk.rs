//! Risk scoring with a per-instance cache keyed by `(file_path, imports hash)`.
//!
//! The cache key construction mirrors the prompt-cache key in `llm::cache`
//! (sha256 over a canonical string) rather than literal md5 — sha2 is already
//! a dependency of this crate and gives the same "equal inputs, equal key"
//! guarantee a content-addressed cache needs.

use std::collections::HashMap;
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use crate::codecontext::CodeContext;
use crate::depgraph::{DependencyGraphBuilder, ModuleGraph, MAX_FILES_FOR_GRAPH};

/// Cache key over `(file_path, sha256(sorted imports))`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RiskCacheKey(String);

impl RiskCacheKey {
    fn new(file_path: &str, imports: &[String]) -> Self {
        let mut sorted = imports.to_vec();
        sorted.sort();

        let mut hasher = Sha256::new();
        hasher.update(sorted.join(",").as_bytes());
        let hash = hasher.finalize();

        RiskCacheKey(format!("{file_path}:{hash:x}"))
    }
}

/// Computes and caches a 0-1 risk score for a file.
pub struct RiskCalculator {
    cache: Mutex<HashMap<RiskCacheKey, RiskScore>>,
    graph_builder: DependencyGraphBuilder,
}

impl Default for RiskCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskCalculator {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            graph_builder: DependencyGraphBuilder::new(),
        }
    }

    /// `risk = 0.4*complexity_risk + 0.3*dependency_risk + 0.3*graph_risk`,
    /// clamped to [0,1]. Cache hits return the cached breakdown without
    /// recomputing any of the three terms.
    pub fn calculate(
        &self,
        ctx: &CodeContext,
        contexts: &HashMap<String, CodeContext>,
        changed_files: &[String],
    ) -> f64 {
        self.calculate_detailed(ctx, contexts, changed_files).total
    }

    /// Same computation as [`Self::calculate`], returning the full
    /// complexity/dependency/graph component breakdown rather than just the
    /// combined total — for callers (logging, telemetry) that want to know
    /// which term drove the score.
    pub fn calculate_detailed(
        &self,
        ctx: &CodeContext,
        contexts: &HashMap<String, CodeContext>,
        changed_files: &[String],
    ) -> RiskScore {
        let imports: Vec<String> = ctx.imports.iter().map(|i| i.module.clone()).collect();
        let key = RiskCacheKey::new(&ctx.file_path, &imports);

        if let Some(cached) = self.cache.lock().expect("risk cache poisoned").get(&key) {
            return *cached;
        }

        let complexity_risk = ctx.complexity_score.clamp(0.0, 1.0);
        let dependency_risk = (ctx.dependency_count as f64 / 20.0).min(1.0);

        let graph_risk = if contexts.len() > MAX_FILES_FOR_GRAPH {
            tracing::warn!(
                file_count = contexts.len(),
                "skipping graph risk: project exceeds MAX_FILES_FOR_GRAPH"
            );
            0.0
        } else {
            self.graph_risk(contexts, changed_files)
        };

        let total = (0.4 * complexity_risk + 0.3 * dependency_risk + 0.3 * graph_risk).clamp(0.0, 1.0);
        let score = RiskScore { complexity_risk, dependency_risk, graph_risk, total };

        self.cache.lock().expect("risk cache poisoned").insert(key, score);
        score
    }

    fn graph_risk(&self, contexts: &HashMap<String, CodeContext>, changed_files: &[String]) -> f64 {
        let graph: ModuleGraph = self.graph_builder.build(contexts);
        let impact = self.graph_builder.impact(&graph, changed_files);
        impact.risk_score
    }

    /// Number of cached entries — surfaced for diagnostics only.
    pub fn cache_len(&self) -> usize {
        self.cache.lock().expect("risk cache poisoned").len()
    }
}

/// A risk score with its component breakdown, for logging/telemetry.
#[derive(Debug, Clone, Copy)]
pub struct RiskScore {
    pub complexity_risk: f64,
    pub dependency_risk: f64,
    pub graph_risk: f64,
    pub total: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecontext::{CodeContextAnalyzer, ImportInfo, Language};

    fn simple_ctx() -> CodeContext {
        CodeContext {
            file_path: "a.py".to_string(),
            language: Language::Python,
            ast_depth: 1,
            complexity_score: 0.1,
            loc: 5,
            imports: vec![ImportInfo {
                module: "os".to_string(),
                line: 1,
            }],
            dependency_count: 1,
            is_simple: true,
            is_complex: false,
        }
    }

    #[test]
    fn cache_hit_returns_identical_value() {
        let calc = RiskCalculator::new();
        let contexts = HashMap::new();
        let ctx = simple_ctx();

        let first = calc.calculate(&ctx, &contexts, &[]);
        let second = calc.calculate(&ctx, &contexts, &[]);
        assert_eq!(first, second);
        assert_eq!(calc.cache_len(), 1);
    }

    #[test]
    fn equal_file_and_imports_share_cache_key_regardless_of_order() {
        let calc = RiskCalculator::new();
        let mut ctx_a = simple_ctx();
        ctx_a.imports = vec![
            ImportInfo { module: "os".into(), line: 1 },
            ImportInfo { module: "sys".into(), line: 2 },
        ];
        let mut ctx_b = ctx_a.clone();
        ctx_b.imports.reverse();

        let contexts = HashMap::new();
        let a = calc.calculate(&ctx_a, &contexts, &[]);
        let b = calc.calculate(&ctx_b, &contexts, &[]);
        assert_eq!(a, b);
        assert_eq!(calc.cache_len(), 1);
    }

    #[test]
    fn result_always_in_unit_interval() {
        let analyzer = CodeContextAnalyzer::new();
        let code = "if a:\n for b in c:\n  while d:\n   try:\n    pass\n   except Exception:\n    pass\n";
        let ctx = analyzer.analyze(code, "complex.py", "python").unwrap();
        let calc = RiskCalculator::new();
        let risk = calc.calculate(&ctx, &HashMap::new(), &[]);
        assert!((0.0..=1.0).contains(&risk));
    }

    #[test]
    fn detailed_breakdown_sums_to_the_same_total_as_calculate() {
        let calc = RiskCalculator::new();
        let ctx = simple_ctx();
        let total = calc.calculate(&ctx, &HashMap::new(), &[]);

        let calc = RiskCalculator::new();
        let score = calc.calculate_detailed(&ctx, &HashMap::new(), &[]);
        assert_eq!(score.total, total);
        assert!((0.0..=1.0).contains(&score.complexity_risk));
        assert!((0.0..=1.0).contains(&score.dependency_risk));
        assert!((0.0..=1.0).contains(&score.graph_risk));
    }
}
