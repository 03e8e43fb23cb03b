//! Reflection judge: turns execution signals into a single
//! ACCEPT/REVISE/RETRY/ROLLBACK verdict via a first-match decision table.

use serde::{Deserialize, Serialize};

/// ACCEPT is the only verdict that permits a commit to stand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReflectionVerdict {
    Accept,
    Revise,
    Retry,
    Rollback,
}

impl ReflectionVerdict {
    /// Parse from the wire value used at the deep-reasoning response boundary.
    pub fn from_value(value: &str) -> Option<Self> {
        match value {
            "accept" => Some(Self::Accept),
            "revise" => Some(Self::Revise),
            "retry" => Some(Self::Retry),
            "rollback" => Some(Self::Rollback),
            _ => None,
        }
    }

    pub fn as_value(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Revise => "revise",
            Self::Retry => "retry",
            Self::Rollback => "rollback",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityLevel {
    Stable,
    Moderate,
    Unstable,
}

/// Graph impact signals summarizing a change's blast radius.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphImpact {
    pub nodes_added: u32,
    pub nodes_removed: u32,
    pub affected_functions: u32,
    pub stability_level: StabilityLevel,
    pub impact_score: f64,
}

/// Execution-trace coverage/exception deltas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub coverage_delta: f64,
    pub new_exceptions: Vec<String>,
    pub fixed_exceptions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionInput {
    pub strategy_id: String,
    pub execution_success: bool,
    pub test_pass_rate: f64,
    pub graph_impact: GraphImpact,
    pub execution_trace: ExecutionTrace,
    pub similar_failures_count: u32,
}

/// The judge's full output: verdict plus caller-loggable warnings/suggestions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reflection {
    pub verdict: ReflectionVerdict,
    pub warnings: Vec<String>,
    pub suggested_fixes: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ReflectionJudge;

impl ReflectionJudge {
    pub fn new() -> Self {
        Self
    }

    /// First-match decision table: ACCEPT/REVISE/RETRY/ROLLBACK.
    pub fn judge(&self, input: &ReflectionInput) -> Reflection {
        let mut warnings = Vec::new();
        let mut suggested_fixes = Vec::new();

        if !input.execution_success {
            warnings.push("execution did not complete successfully".to_string());
            suggested_fixes.push("inspect the executor's error trace and retry with a narrower prompt".to_string());
            return Reflection {
                verdict: ReflectionVerdict::Retry,
                warnings,
                suggested_fixes,
            };
        }

        if input.test_pass_rate < 0.4 {
            warnings.push(format!("test pass rate {:.2} below acceptance floor", input.test_pass_rate));
            suggested_fixes.push("revise the candidate against the failing tests".to_string());
            return Reflection {
                verdict: ReflectionVerdict::Revise,
                warnings,
                suggested_fixes,
            };
        }

        if input.graph_impact.stability_level == StabilityLevel::Unstable
            && input.graph_impact.impact_score > 0.7
        {
            warnings.push("change touches an unstable region of the dependency graph".to_string());
            suggested_fixes.push("roll back and retry with a smaller, scoped change".to_string());
            return Reflection {
                verdict: ReflectionVerdict::Rollback,
                warnings,
                suggested_fixes,
            };
        }

        if input.execution_trace.coverage_delta < 0.0 && !input.execution_trace.new_exceptions.is_empty() {
            warnings.push("coverage dropped and new exceptions were introduced".to_string());
            suggested_fixes.push(format!(
                "add coverage for: {}",
                input.execution_trace.new_exceptions.join(", ")
            ));
            return Reflection {
                verdict: ReflectionVerdict::Revise,
                warnings,
                suggested_fixes,
            };
        }

        if input.similar_failures_count > 0 {
            warnings.push(format!(
                "{} similar failures observed previously",
                input.similar_failures_count
            ));
        }

        Reflection {
            verdict: ReflectionVerdict::Accept,
            warnings,
            suggested_fixes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input() -> ReflectionInput {
        ReflectionInput {
            strategy_id: "tot".to_string(),
            execution_success: true,
            test_pass_rate: 0.9,
            graph_impact: GraphImpact {
                nodes_added: 1,
                nodes_removed: 0,
                affected_functions: 1,
                stability_level: StabilityLevel::Stable,
                impact_score: 0.1,
            },
            execution_trace: ExecutionTrace::default(),
            similar_failures_count: 0,
        }
    }

    #[test]
    fn execution_failure_retries_first() {
        let mut input = base_input();
        input.execution_success = false;
        input.test_pass_rate = 0.0;
        let reflection = ReflectionJudge::new().judge(&input);
        assert_eq!(reflection.verdict, ReflectionVerdict::Retry);
    }

    #[test]
    fn low_pass_rate_revises() {
        let mut input = base_input();
        input.test_pass_rate = 0.1;
        let reflection = ReflectionJudge::new().judge(&input);
        assert_eq!(reflection.verdict, ReflectionVerdict::Revise);
    }

    #[test]
    fn unstable_high_impact_rolls_back() {
        let mut input = base_input();
        input.graph_impact.stability_level = StabilityLevel::Unstable;
        input.graph_impact.impact_score = 0.9;
        let reflection = ReflectionJudge::new().judge(&input);
        assert_eq!(reflection.verdict, ReflectionVerdict::Rollback);
    }

    #[test]
    fn negative_coverage_with_new_exceptions_revises() {
        let mut input = base_input();
        input.execution_trace.coverage_delta = -0.1;
        input.execution_trace.new_exceptions = vec!["KeyError".to_string()];
        let reflection = ReflectionJudge::new().judge(&input);
        assert_eq!(reflection.verdict, ReflectionVerdict::Revise);
    }

    #[test]
    fn clean_signals_accept() {
        let reflection = ReflectionJudge::new().judge(&base_input());
        assert_eq!(reflection.verdict, ReflectionVerdict::Accept);
    }

    #[test]
    fn verdict_round_trips_through_wire_value() {
        assert_eq!(ReflectionVerdict::from_value("accept"), Some(ReflectionVerdict::Accept));
        assert_eq!(ReflectionVerdict::from_value("bogus"), None);
        assert_eq!(ReflectionVerdict::Rollback.as_value(), "rollback");
    }
}
