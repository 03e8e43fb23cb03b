//! Boundary invariants: sibling overlap, span ordering, parent existence,
//! id uniqueness, gap warnings, and flatten-mode candidates.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::types::{Chunk, ChunkKind};

/// Tokens-per-line estimate used to flag oversized class chunks; a real
/// tokenizer is an external collaborator, this is the same coarse heuristic
/// `codecontext` uses for LOC-derived signals.
const EST_TOKENS_PER_LINE: f64 = 8.0;
pub const LARGE_CLASS_TOKEN_THRESHOLD: f64 = 4000.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryViolation {
    SiblingOverlap { parent_id: Option<String>, file_path: String, a: String, b: String },
    InvalidSpan { chunk_id: String, start_line: u32, end_line: u32 },
    DanglingParent { chunk_id: String, parent_id: String },
    DuplicateChunkId { chunk_id: String },
}

impl std::fmt::Display for BoundaryViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SiblingOverlap { file_path, a, b, .. } => {
                write!(f, "sibling chunks '{a}' and '{b}' overlap in '{file_path}'")
            }
            Self::InvalidSpan { chunk_id, start_line, end_line } => {
                write!(f, "chunk '{chunk_id}' has start_line {start_line} > end_line {end_line}")
            }
            Self::DanglingParent { chunk_id, parent_id } => {
                write!(f, "chunk '{chunk_id}' references missing parent '{parent_id}'")
            }
            Self::DuplicateChunkId { chunk_id } => write!(f, "duplicate chunk_id '{chunk_id}'"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundaryReport {
    pub violations: Vec<BoundaryViolation>,
    pub gap_warnings: Vec<String>,
    pub flatten_candidates: Vec<String>,
}

impl BoundaryReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Validate the boundary invariants over a batch of chunks plus the
/// existing-chunk universe (chunks already committed to the store, so a
/// freshly-built child can reference an already-persisted parent).
///
/// `allow_gaps`: when false, inter-sibling gaps are silently accepted; when
/// true, gaps are additionally surfaced as warnings (never errors — a gap
/// between siblings is never a hard violation on its own).
pub fn validate_boundaries(
    batch: &[Chunk],
    existing_ids: &HashSet<String>,
    allow_gaps: bool,
) -> BoundaryReport {
    let mut report = BoundaryReport::default();

    let mut seen_ids: HashMap<&str, usize> = HashMap::new();
    for (i, chunk) in batch.iter().enumerate() {
        if let Some(_prev) = seen_ids.insert(chunk.chunk_id.as_str(), i) {
            report.violations.push(BoundaryViolation::DuplicateChunkId {
                chunk_id: chunk.chunk_id.clone(),
            });
        }
    }

    let batch_ids: HashSet<&str> = batch.iter().map(|c| c.chunk_id.as_str()).collect();
    for chunk in batch {
        if let (Some(start), Some(end)) = (chunk.start_line, chunk.end_line) {
            if start > end {
                report.violations.push(BoundaryViolation::InvalidSpan {
                    chunk_id: chunk.chunk_id.clone(),
                    start_line: start,
                    end_line: end,
                });
            }
        }

        if chunk.kind != ChunkKind::Repo {
            if let Some(parent_id) = &chunk.parent_id {
                if !existing_ids.contains(parent_id.as_str()) && !batch_ids.contains(parent_id.as_str()) {
                    report.violations.push(BoundaryViolation::DanglingParent {
                        chunk_id: chunk.chunk_id.clone(),
                        parent_id: parent_id.clone(),
                    });
                }
            }
        }
    }

    // Group siblings by (parent_id, file_path) and check pairwise overlap.
    let mut groups: HashMap<(Option<&str>, &str), Vec<&Chunk>> = HashMap::new();
    for chunk in batch {
        if chunk.is_deleted {
            continue;
        }
        let Some(file_path) = chunk.file_path.as_deref() else { continue };
        groups
            .entry((chunk.parent_id.as_deref(), file_path))
            .or_default()
            .push(chunk);
    }

    for ((parent_id, file_path), mut siblings) in groups {
        siblings.sort_by_key(|c| c.start_line.unwrap_or(0));
        for window in siblings.windows(2) {
            let (a, b) = (window[0], window[1]);
            if a.kind.is_meta() || b.kind.is_meta() {
                continue;
            }
            if a.overlaps(b) {
                report.violations.push(BoundaryViolation::SiblingOverlap {
                    parent_id: parent_id.map(str::to_string),
                    file_path: file_path.to_string(),
                    a: a.chunk_id.clone(),
                    b: b.chunk_id.clone(),
                });
            } else if allow_gaps {
                if let (Some((_, e1)), Some((s2, _))) = (a.span(), b.span()) {
                    if s2 > e1 + 1 {
                        report.gap_warnings.push(format!(
                            "gap of {} line(s) between '{}' and '{}' in '{}'",
                            s2 - e1 - 1,
                            a.chunk_id,
                            b.chunk_id,
                            file_path
                        ));
                    }
                }
            }
        }
    }

    for chunk in batch {
        if chunk.kind == ChunkKind::Class {
            if let Some((start, end)) = chunk.span() {
                let lines = (end.saturating_sub(start) + 1) as f64;
                if lines * EST_TOKENS_PER_LINE > LARGE_CLASS_TOKEN_THRESHOLD {
                    report.flatten_candidates.push(chunk.chunk_id.clone());
                }
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunkstore::types::Chunk;

    fn file_chunk(id: &str, start: u32, end: u32) -> Chunk {
        let mut c = Chunk::new("r", "s", ChunkKind::Function, id).with_span(start, end);
        c.parent_id = Some("chunk:r:file:mod.py".to_string());
        c.file_path = Some("mod.py".to_string());
        c
    }

    #[test]
    fn overlapping_siblings_are_flagged() {
        let a = file_chunk("f1", 1, 10);
        let b = file_chunk("f2", 5, 15);
        let existing = HashSet::from(["chunk:r:file:mod.py".to_string()]);
        let report = validate_boundaries(&[a, b], &existing, false);
        assert!(!report.is_valid());
    }

    #[test]
    fn non_overlapping_siblings_pass() {
        let a = file_chunk("f1", 1, 10);
        let b = file_chunk("f2", 11, 20);
        let existing = HashSet::from(["chunk:r:file:mod.py".to_string()]);
        let report = validate_boundaries(&[a, b], &existing, false);
        assert!(report.is_valid());
    }

    #[test]
    fn gap_only_warns_when_enabled() {
        let a = file_chunk("f1", 1, 10);
        let b = file_chunk("f2", 15, 20);
        let existing = HashSet::from(["chunk:r:file:mod.py".to_string()]);

        let quiet = validate_boundaries(&[a.clone(), b.clone()], &existing, false);
        assert!(quiet.is_valid());
        assert!(quiet.gap_warnings.is_empty());

        let loud = validate_boundaries(&[a, b], &existing, true);
        assert!(loud.is_valid());
        assert_eq!(loud.gap_warnings.len(), 1);
    }

    #[test]
    fn dangling_parent_is_a_violation() {
        let mut c = file_chunk("f1", 1, 10);
        c.parent_id = Some("chunk:r:file:missing.py".to_string());
        let report = validate_boundaries(&[c], &HashSet::new(), false);
        assert!(!report.is_valid());
    }

    #[test]
    fn meta_kinds_may_overlap() {
        let mut a = file_chunk("a", 1, 50);
        a.kind = ChunkKind::Docstring;
        let b = file_chunk("b", 1, 10);
        let existing = HashSet::from(["chunk:r:file:mod.py".to_string()]);
        let report = validate_boundaries(&[a, b], &existing, false);
        assert!(report.is_valid());
    }
}
