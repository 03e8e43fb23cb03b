//! The `ChunkStore` trait and its in-memory (development/test) backend.
//!
//! Both backends in this module share one contract: mutating operations are
//! serialized per-process behind a mutex, batch upserts dedupe by `chunk_id`
//! keeping the last write, and soft-delete never removes a row outright.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::boundary::{validate_boundaries, BoundaryReport};
use super::types::{Chunk, ChunkKind, ChunkToGraphMapping, ChunkToIrMapping};

/// A page of `(repo, snapshot)` query results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPage {
    pub chunks: Vec<Chunk>,
    pub next_offset: Option<usize>,
    pub total: usize,
}

/// Storage-side interface every chunk store backend implements. Mutating
/// methods validate boundary invariants before committing; a violation is a
/// programming error and is returned as an error, never silently dropped.
pub trait ChunkStore: Send + Sync {
    /// Batch upsert, deduplicated by `chunk_id` (last write wins within the
    /// batch). Runs boundary validation over the merged batch before commit.
    fn upsert_batch(&self, chunks: Vec<Chunk>, allow_gaps: bool) -> Result<BoundaryReport>;

    fn get(&self, chunk_id: &str) -> Result<Option<Chunk>>;

    /// Batch get in a single round trip (no N+1 fan-out to the backend).
    fn get_batch(&self, chunk_ids: &[String]) -> Result<Vec<Chunk>>;

    fn query_by_repo_snapshot(&self, repo_id: &str, snapshot_id: &str, offset: usize, limit: usize) -> Result<ChunkPage>;

    fn query_by_file(&self, repo_id: &str, file_path: &str) -> Result<Vec<Chunk>>;

    /// Resolve `(repo, file, line)` to the most specific covering chunk:
    /// `function < class < file` priority, smallest span wins ties.
    fn query_by_line(&self, repo_id: &str, file_path: &str, line: u32) -> Result<Option<Chunk>>;

    fn query_by_line_batch(&self, repo_id: &str, queries: &[(String, u32)]) -> Result<Vec<Option<Chunk>>> {
        Ok(queries
            .iter()
            .map(|(file, line)| self.query_by_line(repo_id, file, *line).unwrap_or(None))
            .collect())
    }

    /// Soft-delete: sets `is_deleted=true` and bumps `version`. The row
    /// remains readable by id/batch-by-id until a separate GC pass.
    fn soft_delete(&self, chunk_id: &str) -> Result<()>;

    fn get_ir_mapping(&self, repo_id: &str, snapshot_id: &str) -> Result<ChunkToIrMapping>;
    fn set_ir_mapping(&self, mapping: ChunkToIrMapping) -> Result<()>;
    fn get_graph_mapping(&self, repo_id: &str, snapshot_id: &str) -> Result<ChunkToGraphMapping>;
    fn set_graph_mapping(&self, mapping: ChunkToGraphMapping) -> Result<()>;

    /// Bidirectional validation: every id referenced by a mapping resolves to
    /// a chunk that actually exists in `(repo, snapshot)`.
    fn validate_mapping_consistency(&self, repo_id: &str, snapshot_id: &str) -> Result<Vec<String>> {
        let page = self.query_by_repo_snapshot(repo_id, snapshot_id, 0, usize::MAX)?;
        let known: HashSet<&str> = page.chunks.iter().map(|c| c.chunk_id.as_str()).collect();

        let mut errors = Vec::new();
        let ir = self.get_ir_mapping(repo_id, snapshot_id)?;
        for chunk_id in ir.entries.keys() {
            if !known.contains(chunk_id.as_str()) {
                errors.push(format!("chunk_to_ir references unknown chunk '{chunk_id}'"));
            }
        }
        let graph = self.get_graph_mapping(repo_id, snapshot_id)?;
        for chunk_id in graph.entries.keys() {
            if !known.contains(chunk_id.as_str()) {
                errors.push(format!("chunk_to_graph references unknown chunk '{chunk_id}'"));
            }
        }
        Ok(errors)
    }
}

/// In-memory chunk store: development/test backend. Keeps a file-index set
/// per `(repo, file_path)` for O(1) inverse lookup.
#[derive(Default)]
pub struct InMemoryChunkStore {
    inner: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    chunks: HashMap<String, Chunk>,
    file_index: HashMap<(String, String), HashSet<String>>,
    ir_mappings: HashMap<(String, String), ChunkToIrMapping>,
    graph_mappings: HashMap<(String, String), ChunkToGraphMapping>,
}

impl InMemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChunkStore for InMemoryChunkStore {
    fn upsert_batch(&self, chunks: Vec<Chunk>, allow_gaps: bool) -> Result<BoundaryReport> {
        let mut state = self.inner.lock().map_err(|_| Error::Internal("chunk store lock poisoned".into()))?;

        // Dedupe by chunk_id, keeping the last occurrence.
        let mut deduped: HashMap<String, Chunk> = HashMap::new();
        let mut order = Vec::new();
        for chunk in chunks {
            if !deduped.contains_key(&chunk.chunk_id) {
                order.push(chunk.chunk_id.clone());
            }
            deduped.insert(chunk.chunk_id.clone(), chunk);
        }
        let batch: Vec<Chunk> = order.into_iter().map(|id| deduped.remove(&id).unwrap()).collect();

        let existing_ids: HashSet<String> = state.chunks.keys().cloned().collect();
        let report = validate_boundaries(&batch, &existing_ids, allow_gaps);
        if !report.is_valid() {
            return Err(Error::Internal(format!(
                "chunk boundary invariant violated: {}",
                report
                    .violations
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join("; ")
            )));
        }

        for chunk in batch {
            if let Some(file_path) = &chunk.file_path {
                state
                    .file_index
                    .entry((chunk.repo_id.clone(), file_path.clone()))
                    .or_default()
                    .insert(chunk.chunk_id.clone());
            }
            state.chunks.insert(chunk.chunk_id.clone(), chunk);
        }

        Ok(report)
    }

    fn get(&self, chunk_id: &str) -> Result<Option<Chunk>> {
        let state = self.inner.lock().map_err(|_| Error::Internal("chunk store lock poisoned".into()))?;
        Ok(state.chunks.get(chunk_id).cloned())
    }

    fn get_batch(&self, chunk_ids: &[String]) -> Result<Vec<Chunk>> {
        let state = self.inner.lock().map_err(|_| Error::Internal("chunk store lock poisoned".into()))?;
        Ok(chunk_ids.iter().filter_map(|id| state.chunks.get(id).cloned()).collect())
    }

    fn query_by_repo_snapshot(&self, repo_id: &str, snapshot_id: &str, offset: usize, limit: usize) -> Result<ChunkPage> {
        let state = self.inner.lock().map_err(|_| Error::Internal("chunk store lock poisoned".into()))?;
        let mut matches: Vec<Chunk> = state
            .chunks
            .values()
            .filter(|c| c.repo_id == repo_id && c.snapshot_id == snapshot_id)
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.chunk_id.cmp(&b.chunk_id));
        let total = matches.len();
        let page: Vec<Chunk> = matches.into_iter().skip(offset).take(limit).collect();
        let next_offset = if offset + page.len() < total { Some(offset + page.len()) } else { None };
        Ok(ChunkPage { chunks: page, next_offset, total })
    }

    fn query_by_file(&self, repo_id: &str, file_path: &str) -> Result<Vec<Chunk>> {
        let state = self.inner.lock().map_err(|_| Error::Internal("chunk store lock poisoned".into()))?;
        let ids = state.file_index.get(&(repo_id.to_string(), file_path.to_string())).cloned().unwrap_or_default();
        let mut chunks: Vec<Chunk> = ids.into_iter().filter_map(|id| state.chunks.get(&id).cloned()).collect();
        chunks.sort_by_key(|c| c.start_line.unwrap_or(0));
        Ok(chunks)
    }

    fn query_by_line(&self, repo_id: &str, file_path: &str, line: u32) -> Result<Option<Chunk>> {
        let candidates = self.query_by_file(repo_id, file_path)?;
        Ok(best_covering_chunk(&candidates, line))
    }

    fn soft_delete(&self, chunk_id: &str) -> Result<()> {
        let mut state = self.inner.lock().map_err(|_| Error::Internal("chunk store lock poisoned".into()))?;
        match state.chunks.get_mut(chunk_id) {
            Some(chunk) => {
                chunk.is_deleted = true;
                chunk.version += 1;
                Ok(())
            }
            None => Err(Error::validation(format!("no such chunk: {chunk_id}"))),
        }
    }

    fn get_ir_mapping(&self, repo_id: &str, snapshot_id: &str) -> Result<ChunkToIrMapping> {
        let state = self.inner.lock().map_err(|_| Error::Internal("chunk store lock poisoned".into()))?;
        Ok(state
            .ir_mappings
            .get(&(repo_id.to_string(), snapshot_id.to_string()))
            .cloned()
            .unwrap_or_else(|| ChunkToIrMapping {
                repo_id: repo_id.to_string(),
                snapshot_id: snapshot_id.to_string(),
                entries: HashMap::new(),
            }))
    }

    fn set_ir_mapping(&self, mapping: ChunkToIrMapping) -> Result<()> {
        let mut state = self.inner.lock().map_err(|_| Error::Internal("chunk store lock poisoned".into()))?;
        state
            .ir_mappings
            .insert((mapping.repo_id.clone(), mapping.snapshot_id.clone()), mapping);
        Ok(())
    }

    fn get_graph_mapping(&self, repo_id: &str, snapshot_id: &str) -> Result<ChunkToGraphMapping> {
        let state = self.inner.lock().map_err(|_| Error::Internal("chunk store lock poisoned".into()))?;
        Ok(state
            .graph_mappings
            .get(&(repo_id.to_string(), snapshot_id.to_string()))
            .cloned()
            .unwrap_or_else(|| ChunkToGraphMapping {
                repo_id: repo_id.to_string(),
                snapshot_id: snapshot_id.to_string(),
                entries: HashMap::new(),
            }))
    }

    fn set_graph_mapping(&self, mapping: ChunkToGraphMapping) -> Result<()> {
        let mut state = self.inner.lock().map_err(|_| Error::Internal("chunk store lock poisoned".into()))?;
        state
            .graph_mappings
            .insert((mapping.repo_id.clone(), mapping.snapshot_id.clone()), mapping);
        Ok(())
    }
}

/// Shared tie-break: `function < class < file` specificity, smallest span
/// wins within equal specificity.
pub(super) fn best_covering_chunk(candidates: &[Chunk], line: u32) -> Option<Chunk> {
    candidates
        .iter()
        .filter(|c| !c.is_deleted)
        .filter(|c| matches!(c.kind, ChunkKind::Function | ChunkKind::Class | ChunkKind::File))
        .filter(|c| c.span().is_some_and(|(s, e)| s <= line && line <= e))
        .min_by_key(|c| {
            let (s, e) = c.span().unwrap();
            (c.kind.specificity(), e - s)
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(repo: &str, file: &str, kind: ChunkKind, fqn: &str, start: u32, end: u32) -> Chunk {
        let mut c = Chunk::new(repo, "snap1", kind, fqn).with_span(start, end);
        c.file_path = Some(file.to_string());
        c
    }

    #[test]
    fn upsert_dedupes_by_chunk_id_keeping_last() {
        let store = InMemoryChunkStore::new();
        let mut a = chunk("r", "f.py", ChunkKind::Function, "f.foo", 1, 5);
        a.summary = Some("first".into());
        let mut b = a.clone();
        b.summary = Some("second".into());
        store.upsert_batch(vec![a, b], false).unwrap();
        let got = store.get("chunk:r:function:f.foo").unwrap().unwrap();
        assert_eq!(got.summary.as_deref(), Some("second"));
    }

    #[test]
    fn query_by_line_prefers_function_over_class() {
        let store = InMemoryChunkStore::new();
        let class_chunk = chunk("r", "f.py", ChunkKind::Class, "f.Foo", 1, 100);
        let mut func_chunk = chunk("r", "f.py", ChunkKind::Function, "f.Foo.bar", 10, 20);
        func_chunk.parent_id = Some(class_chunk.chunk_id.clone());
        store.upsert_batch(vec![class_chunk, func_chunk], false).unwrap();

        let hit = store.query_by_line("r", "f.py", 15).unwrap().unwrap();
        assert_eq!(hit.kind, ChunkKind::Function);
    }

    #[test]
    fn soft_delete_keeps_chunk_readable() {
        let store = InMemoryChunkStore::new();
        let c = chunk("r", "f.py", ChunkKind::Function, "f.foo", 1, 5);
        let id = c.chunk_id.clone();
        store.upsert_batch(vec![c], false).unwrap();
        store.soft_delete(&id).unwrap();
        let got = store.get(&id).unwrap().unwrap();
        assert!(got.is_deleted);
        assert_eq!(got.version, 2);
    }

    #[test]
    fn batch_get_is_one_round_trip_and_skips_missing() {
        let store = InMemoryChunkStore::new();
        let c = chunk("r", "f.py", ChunkKind::Function, "f.foo", 1, 5);
        let id = c.chunk_id.clone();
        store.upsert_batch(vec![c], false).unwrap();
        let got = store.get_batch(&[id, "chunk:r:function:missing".to_string()]).unwrap();
        assert_eq!(got.len(), 1);
    }

    #[test]
    fn mapping_consistency_flags_unknown_chunk_ids() {
        let store = InMemoryChunkStore::new();
        store
            .set_ir_mapping(ChunkToIrMapping {
                repo_id: "r".into(),
                snapshot_id: "snap1".into(),
                entries: HashMap::from([("chunk:r:function:ghost".to_string(), vec!["ir1".to_string()])]),
            })
            .unwrap();
        let errors = store.validate_mapping_consistency("r", "snap1").unwrap();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn pagination_reports_next_offset() {
        let store = InMemoryChunkStore::new();
        let chunks: Vec<Chunk> = (0..5)
            .map(|i| chunk("r", "f.py", ChunkKind::Function, &format!("f.fn{i}"), i * 10, i * 10 + 5))
            .collect();
        store.upsert_batch(chunks, false).unwrap();
        let page = store.query_by_repo_snapshot("r", "snap1", 0, 2).unwrap();
        assert_eq!(page.chunks.len(), 2);
        assert_eq!(page.total, 5);
        assert_eq!(page.next_offset, Some(2));
    }
}
