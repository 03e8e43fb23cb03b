//! Code-context analysis: AST-depth, complexity, LOC, and import extraction.
//!
//! The analyzer works over pre-loaded source text only — it never touches the
//! filesystem. Structural signals are heuristic (regex/brace-depth based)
//! rather than a real parse, matching the external-collaborator boundary that
//! hands a genuine AST to other parts of the system.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Languages the analyzer knows how to score. Anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Python,
    Rust,
    JavaScript,
    TypeScript,
    Go,
}

impl Language {
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "python" | "py" => Ok(Self::Python),
            "rust" | "rs" => Ok(Self::Rust),
            "javascript" | "js" => Ok(Self::JavaScript),
            "typescript" | "ts" => Ok(Self::TypeScript),
            "go" | "golang" => Ok(Self::Go),
            other => Err(Error::validation(format!("unsupported language: {other}"))),
        }
    }
}

/// A single extracted import statement (module path, not yet resolved to a file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportInfo {
    pub module: String,
    pub line: usize,
}

/// Structural analysis of one file's content, derived from its AST.
///
/// Immutable per `(file_path, content_hash)` — callers that need a fresh
/// analysis after an edit construct a new `CodeContext` rather than mutate one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeContext {
    pub file_path: String,
    pub language: Language,
    pub ast_depth: u32,
    pub complexity_score: f64,
    pub loc: usize,
    pub imports: Vec<ImportInfo>,
    pub dependency_count: usize,
    pub is_simple: bool,
    pub is_complex: bool,
}

impl CodeContext {
    /// Simple when shallow and low complexity, complex when either signal
    /// is high.
    fn classify(complexity_score: f64, ast_depth: u32) -> (bool, bool) {
        let is_simple = complexity_score < 0.2 && ast_depth < 4;
        let is_complex = complexity_score > 0.6 || ast_depth > 8;
        (is_simple, is_complex)
    }
}

static DECISION_POINT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bif\b", r"\belif\b", r"\belse\s+if\b", r"\bfor\b", r"\bwhile\b", r"\btry\b",
        r"\bexcept\b", r"\bcatch\b", r"\bcase\b", r"&&", r"\|\|", r"\band\b", r"\bor\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static decision-point pattern is valid"))
    .collect()
});

static PYTHON_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:from\s+(\S+)\s+import|import\s+(\S+))").unwrap());
static RUST_IMPORT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*use\s+([\w:]+)").unwrap());
static JS_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*import\s+.*from\s+['"]([^'"]+)['"]|require\(['"]([^'"]+)['"]\)"#).unwrap()
});
static GO_IMPORT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"^\s*"([^"]+)"\s*$"#).unwrap());

/// Analyzer over pre-loaded source content. Stateless; safe to share.
#[derive(Debug, Default, Clone, Copy)]
pub struct CodeContextAnalyzer;

impl CodeContextAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(
        &self,
        code_content: &str,
        file_path: impl Into<String>,
        language: &str,
    ) -> Result<CodeContext> {
        let language = Language::parse(language)?;
        let file_path = file_path.into();

        let loc = code_content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .count();
        let ast_depth = max_nesting_depth(code_content);
        let decision_points = count_decision_points(code_content);
        // Cyclomatic-complexity-style count normalized against file size so a
        // score stays comparable across files of very different lengths.
        let complexity_score = if loc == 0 {
            0.0
        } else {
            (decision_points as f64 / loc as f64 * 4.0).min(1.0)
        };
        let imports = extract_imports(code_content, language);
        let dependency_count = imports.iter().map(|i| &i.module).collect::<HashSet<_>>().len();

        let (is_simple, is_complex) = CodeContext::classify(complexity_score, ast_depth);

        Ok(CodeContext {
            file_path,
            language,
            ast_depth,
            complexity_score,
            loc,
            imports,
            dependency_count,
            is_simple,
            is_complex,
        })
    }
}

fn max_nesting_depth(code: &str) -> u32 {
    let mut depth: i32 = 0;
    let mut max_depth: i32 = 0;
    let mut indent_stack: Vec<usize> = vec![0];

    for line in code.lines() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
            continue;
        }
        let indent = line.len() - trimmed.len();

        // Brace-based nesting (Rust/JS/Go/TS).
        for ch in trimmed.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    max_depth = max_depth.max(depth);
                }
                '}' => depth = (depth - 1).max(0),
                _ => {}
            }
        }

        // Indentation-based nesting (Python).
        while let Some(&top) = indent_stack.last() {
            if indent < top {
                indent_stack.pop();
            } else {
                break;
            }
        }
        if indent_stack.last() != Some(&indent) {
            indent_stack.push(indent);
        }
        max_depth = max_depth.max(indent_stack.len() as i32 - 1);
    }

    max_depth.max(0) as u32
}

fn count_decision_points(code: &str) -> usize {
    DECISION_POINT_PATTERNS
        .iter()
        .map(|re| re.find_iter(code).count())
        .sum()
}

fn extract_imports(code: &str, language: Language) -> Vec<ImportInfo> {
    let pattern = match language {
        Language::Python => &*PYTHON_IMPORT,
        Language::Rust => &*RUST_IMPORT,
        Language::JavaScript | Language::TypeScript => &*JS_IMPORT,
        Language::Go => &*GO_IMPORT,
    };

    code.lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            pattern.captures(line).and_then(|caps| {
                caps.iter()
                    .skip(1)
                    .flatten()
                    .next()
                    .map(|m| ImportInfo {
                        module: m.as_str().trim_end_matches(';').to_string(),
                        line: idx + 1,
                    })
            })
        })
        .collect()
}
