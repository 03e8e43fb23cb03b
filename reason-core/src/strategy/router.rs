//! Router: decide System-1 (fast) vs System-2 (deep) for a task.
//!
//! An ordered set of rules, first match wins, with a score-based fallback
//! that branches on description length and keyword heuristics when code
//! context isn't available.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::codecontext::CodeContextAnalyzer;

/// Threshold above which complexity/risk alone justify SYSTEM_2 when the
/// basic (description-only) router degrades.
const MODERATE_THRESHOLD: f64 = 0.5;
const HIGH_DEPENDENCY_COUNT: usize = 10;

/// A unit of work handed to the orchestrator. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub description: String,
    pub repo_id: String,
    pub snapshot_id: String,
    pub context_files: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// System-1 (fast, linear) vs System-2 (deep, multi-candidate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Path {
    System1,
    System2,
}

/// The Router's output. Cost/time are telemetry only — never a routing input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningDecision {
    pub path: Path,
    pub confidence: f64,
    pub reasoning: String,
    pub complexity: f64,
    pub risk: f64,
    pub estimated_cost_usd: f64,
    pub estimated_time_seconds: f64,
}

impl ReasoningDecision {
    fn new(path: Path, confidence: f64, reasoning: impl Into<String>, complexity: f64, risk: f64) -> Self {
        let (estimated_cost_usd, estimated_time_seconds) = match path {
            Path::System1 => (0.02, 5.0),
            Path::System2 => (0.25, 45.0),
        };
        Self {
            path,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
            complexity: complexity.clamp(0.0, 1.0),
            risk: risk.clamp(0.0, 1.0),
            estimated_cost_usd,
            estimated_time_seconds,
        }
    }
}

/// Optional collaborators the Router consults when available. Absent any of
/// these (or on any failure reading them) the Router falls through to the
/// description-heuristic basic router.
pub struct RouterContext<'a> {
    pub file_contents: Option<&'a HashMap<String, String>>,
    pub dependency_counts: Option<&'a HashMap<String, usize>>,
}

impl Default for RouterContext<'_> {
    fn default() -> Self {
        Self {
            file_contents: None,
            dependency_counts: None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Router {
    analyzer: CodeContextAnalyzer,
}

impl Router {
    pub fn new() -> Self {
        Self {
            analyzer: CodeContextAnalyzer::new(),
        }
    }

    /// `decide(task) -> ReasoningDecision`: force flag, then code-context rules
    /// in order, then the description-heuristic fallback.
    pub fn decide(&self, task: &Task, force_system_2: bool, ctx: &RouterContext<'_>) -> ReasoningDecision {
        if force_system_2 {
            return ReasoningDecision::new(Path::System2, 1.0, "force_system_2", 1.0, 1.0);
        }

        if let (Some(contents), Some(target)) = (ctx.file_contents, task.context_files.first()) {
            if let Some(content) = contents.get(target) {
                let language = guess_language(target);
                match self.analyzer.analyze(content, target, language) {
                    Ok(code_ctx) => {
                        let dependency_count = ctx
                            .dependency_counts
                            .and_then(|m| m.get(target))
                            .copied()
                            .unwrap_or(code_ctx.dependency_count);

                        if code_ctx.is_simple {
                            return ReasoningDecision::new(
                                Path::System1,
                                0.9,
                                "code_context:is_simple",
                                code_ctx.complexity_score,
                                0.1,
                            );
                        }
                        if code_ctx.is_complex {
                            return ReasoningDecision::new(
                                Path::System2,
                                0.85,
                                "code_context:is_complex",
                                code_ctx.complexity_score,
                                0.6,
                            );
                        }
                        if dependency_count > HIGH_DEPENDENCY_COUNT {
                            return ReasoningDecision::new(
                                Path::System2,
                                0.7,
                                format!("code_context:dependency_count={dependency_count}"),
                                code_ctx.complexity_score,
                                0.5,
                            );
                        }
                        return ReasoningDecision::new(
                            Path::System1,
                            0.7,
                            "code_context:default",
                            code_ctx.complexity_score,
                            0.3,
                        );
                    }
                    Err(_) => {
                        // Unsupported language or any analyzer error: fall through
                        // to the basic router below rather than propagate.
                    }
                }
            }
        }

        self.basic_route(task)
    }

    /// Description-length and keyword heuristic used when code-context
    /// services are unavailable or raised an error.
    fn basic_route(&self, task: &Task) -> ReasoningDecision {
        let description = task.description.to_lowercase();
        let keyword_hit = ["refactor", "architecture", "redesign", "migrate", "security"]
            .iter()
            .any(|kw| description.contains(kw));
        let length_signal = (task.description.len() as f64 / 500.0).min(1.0);
        let complexity = if keyword_hit {
            (length_signal + 0.4).min(1.0)
        } else {
            length_signal
        };

        if complexity >= MODERATE_THRESHOLD {
            ReasoningDecision::new(Path::System2, 0.55, "basic_router:keyword_or_length", complexity, complexity)
        } else {
            ReasoningDecision::new(Path::System1, 0.5, "basic_router:default", complexity, complexity * 0.5)
        }
    }
}

fn guess_language(path: &str) -> &'static str {
    if path.ends_with(".py") {
        "python"
    } else if path.ends_with(".rs") {
        "rust"
    } else if path.ends_with(".ts") {
        "typescript"
    } else if path.ends_with(".js") {
        "javascript"
    } else if path.ends_with(".go") {
        "go"
    } else {
        "python"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_task(description: &str, context_files: Vec<String>) -> Task {
        Task {
            task_id: "t".to_string(),
            description: description.to_string(),
            repo_id: "r".to_string(),
            snapshot_id: "s".to_string(),
            context_files,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn force_system_2_always_wins_at_full_confidence() {
        let router = Router::new();
        let task = empty_task("trivial", vec![]);
        let decision = router.decide(&task, true, &RouterContext::default());
        assert_eq!(decision.path, Path::System2);
        assert_eq!(decision.confidence, 1.0);
    }

    #[test]
    fn simple_file_routes_system_1() {
        let router = Router::new();
        let task = empty_task("fix off by one", vec!["utils.py".to_string()]);
        let mut files = HashMap::new();
        files.insert("utils.py".to_string(), "def add(a, b):\n    return a + b\n".to_string());
        let ctx = RouterContext {
            file_contents: Some(&files),
            dependency_counts: None,
        };
        let decision = router.decide(&task, false, &ctx);
        assert_eq!(decision.path, Path::System1);
    }

    #[test]
    fn missing_context_falls_back_to_basic_router() {
        let router = Router::new();
        let task = empty_task("please refactor the entire architecture of this module", vec![]);
        let decision = router.decide(&task, false, &RouterContext::default());
        assert_eq!(decision.path, Path::System2);
    }

    #[test]
    fn decision_numerics_stay_in_unit_interval() {
        let router = Router::new();
        let task = empty_task("x".repeat(2000).as_str(), vec![]);
        let decision = router.decide(&task, false, &RouterContext::default());
        assert!((0.0..=1.0).contains(&decision.confidence));
        assert!((0.0..=1.0).contains(&decision.complexity));
        assert!((0.0..=1.0).contains(&decision.risk));
    }
}
