//! Constitutional check: a pattern-based scan for forbidden code shapes,
//! classified by severity, that hard-blocks on `Critical`.
//!
//! Findings carry an id, severity, category, location, and suggestion, with
//! a smaller severity lattice than a general-purpose issue tracker would —
//! no `Info` tier, since non-criticals here are always attached to metadata
//! rather than scored.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstitutionalViolationSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstitutionalViolation {
    pub rule_id: String,
    pub severity: ConstitutionalViolationSeverity,
    pub description: String,
    pub line: Option<usize>,
}

struct Rule {
    id: &'static str,
    severity: ConstitutionalViolationSeverity,
    description: &'static str,
    pattern: LazyLock<Regex>,
}

macro_rules! rule {
    ($id:literal, $severity:expr, $desc:literal, $pattern:literal) => {
        Rule {
            id: $id,
            severity: $severity,
            description: $desc,
            pattern: LazyLock::new(|| Regex::new($pattern).expect("static constitutional pattern is valid")),
        }
    };
}

use ConstitutionalViolationSeverity::*;

static RULES: &[Rule] = &[
    rule!(
        "hardcoded-secret",
        Critical,
        "hard-coded secret or credential literal",
        r#"(?i)(password|secret|api_key|token)\s*=\s*['"][^'"]{4,}['"]"#
    ),
    rule!(
        "eval-exec-untrusted",
        Critical,
        "eval/exec over untrusted input",
        r"\b(eval|exec)\s*\("
    ),
    rule!(
        "dangerous-subprocess",
        Critical,
        "subprocess invocation with shell=True or os.system",
        r"shell\s*=\s*True|os\.system\s*\("
    ),
    rule!(
        "sql-string-concat",
        High,
        "SQL built via string concatenation/formatting rather than parameters",
        r#"(?i)(SELECT|INSERT|UPDATE|DELETE)\b.*["']\s*\+|f["']\s*(SELECT|INSERT|UPDATE|DELETE)"#
    ),
    rule!(
        "bare-except",
        Medium,
        "bare except/catch-all swallows errors silently",
        r"except\s*:\s*$|catch\s*\(\s*\)"
    ),
    rule!(
        "todo-marker",
        Low,
        "unresolved TODO/FIXME left in generated code",
        r"(?i)\b(TODO|FIXME)\b"
    ),
];

/// Scan candidate code for forbidden patterns. Returns every finding;
/// callers decide whether a `Critical` finding should block (every executor's
/// contract treats it as a hard block, never a soft warning).
pub fn constitutional_check(code: &str) -> Vec<ConstitutionalViolation> {
    let mut violations = Vec::new();
    for rule in RULES {
        for (line_idx, line) in code.lines().enumerate() {
            if rule.pattern.is_match(line) {
                violations.push(ConstitutionalViolation {
                    rule_id: rule.id.to_string(),
                    severity: rule.severity,
                    description: rule.description.to_string(),
                    line: Some(line_idx + 1),
                });
            }
        }
    }
    violations
}

/// True when any finding is `Critical` — the hard-block condition.
pub fn has_critical_violation(violations: &[ConstitutionalViolation]) -> bool {
    violations
        .iter()
        .any(|v| v.severity == ConstitutionalViolationSeverity::Critical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_hardcoded_password() {
        let violations = constitutional_check(r#"password = "admin123""#);
        assert!(has_critical_violation(&violations));
        assert!(violations.iter().any(|v| v.rule_id == "hardcoded-secret"));
    }

    #[test]
    fn detects_eval_over_input() {
        let violations = constitutional_check("result = eval(user_input)");
        assert!(has_critical_violation(&violations));
    }

    #[test]
    fn non_critical_findings_do_not_block() {
        let violations = constitutional_check("except:\n    pass\n");
        assert!(!violations.is_empty());
        assert!(!has_critical_violation(&violations));
    }

    #[test]
    fn clean_code_has_no_findings() {
        let violations = constitutional_check("def add(a, b):\n    return a + b\n");
        assert!(violations.is_empty());
    }

    #[test]
    fn reports_one_indexed_line_numbers() {
        let violations = constitutional_check("x = 1\neval(x)\n");
        assert_eq!(violations[0].line, Some(2));
    }
}
