//! Static guardrail validator (`IGuardrailValidator`): a profile-driven set
//! of pattern checks applied to a proposed change set before it's allowed to
//! reach the sandbox or VCS applier.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::adapters::vcs::VcsChange;
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GuardrailReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Named bundles of rules; `"default"` applies everything, `"lenient"` skips
/// the size cap, callers can add more profiles without touching call sites.
pub trait GuardrailValidator: Send + Sync {
    fn validate(&self, changes: &[VcsChange], profile: &str) -> Result<GuardrailReport>;
}

static SECRET_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r#"(?i)(api[_-]?key|secret|password|token)\s*[:=]\s*['"][^'"]{8,}['"]"#).unwrap(),
        Regex::new(r"-----BEGIN (RSA |EC |OPENSSH )?PRIVATE KEY-----").unwrap(),
        Regex::new(r"AKIA[0-9A-Z]{16}").unwrap(),
    ]
});

static DESTRUCTIVE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?m)^\s*rm\s+-rf\s+/").unwrap(),
        Regex::new(r"DROP\s+TABLE").unwrap(),
    ]
});

const MAX_CHANGE_BYTES: usize = 200_000;

/// Regex-and-size-cap guardrail. No external network/policy service; every
/// rule is evaluated locally against the literal proposed content.
pub struct StaticGuardrailValidator {
    pub max_change_bytes: usize,
}

impl Default for StaticGuardrailValidator {
    fn default() -> Self {
        Self { max_change_bytes: MAX_CHANGE_BYTES }
    }
}

impl StaticGuardrailValidator {
    pub fn new(max_change_bytes: usize) -> Self {
        Self { max_change_bytes }
    }
}

impl GuardrailValidator for StaticGuardrailValidator {
    fn validate(&self, changes: &[VcsChange], profile: &str) -> Result<GuardrailReport> {
        let mut errors = Vec::new();

        for change in changes {
            let Some(content) = &change.content else { continue };
            let path = change.path.display();

            if profile != "lenient" && content.len() > self.max_change_bytes {
                errors.push(format!("{path}: change exceeds max size ({} > {} bytes)", content.len(), self.max_change_bytes));
            }

            for pattern in SECRET_PATTERNS.iter() {
                if pattern.is_match(content) {
                    errors.push(format!("{path}: matches secret-like pattern `{}`", pattern.as_str()));
                }
            }

            for pattern in DESTRUCTIVE_PATTERNS.iter() {
                if pattern.is_match(content) {
                    errors.push(format!("{path}: matches destructive-operation pattern `{}`", pattern.as_str()));
                }
            }
        }

        Ok(GuardrailReport { valid: errors.is_empty(), errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn change(content: &str) -> VcsChange {
        VcsChange { path: PathBuf::from("f.py"), content: Some(content.to_string()) }
    }

    #[test]
    fn clean_change_passes() {
        let validator = StaticGuardrailValidator::default();
        let report = validator.validate(&[change("def foo(): return 1\n")], "default").unwrap();
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn secret_like_content_is_rejected() {
        let validator = StaticGuardrailValidator::default();
        let report = validator.validate(&[change(r#"api_key = "sk-abcdefgh12345678""#)], "default").unwrap();
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn destructive_shell_is_rejected() {
        let validator = StaticGuardrailValidator::default();
        let report = validator.validate(&[change("rm -rf /\n")], "default").unwrap();
        assert!(!report.valid);
    }

    #[test]
    fn lenient_profile_skips_size_cap() {
        let validator = StaticGuardrailValidator::new(10);
        let report = validator.validate(&[change("x".repeat(100).as_str())], "lenient").unwrap();
        assert!(report.valid);
    }
}
