//! Optional three-tier cache in front of a `ChunkStore`: L1 in-process LRU,
//! L2 a shared (cross-process-shaped, here just a second in-process tier)
//! cache, L3 the persistent store itself with write-through.
//!
//! Cache keys are namespaced by chunk id; `invalidate_repo` drops every L1/L2
//! entry for a repo without touching L3.

use std::sync::Mutex;

use lru::LruCache;

use crate::error::Result;

use super::boundary::BoundaryReport;
use super::store::{ChunkPage, ChunkStore};
use super::types::{Chunk, ChunkToGraphMapping, ChunkToIrMapping};

fn namespaced_key(repo_id: &str, chunk_id: &str) -> String {
    format!("{repo_id}:{chunk_id}")
}

/// Wraps any `ChunkStore` with an L1 + L2 read cache, write-through to L3
/// (the wrapped store) on every mutation.
pub struct TieredChunkCache<S: ChunkStore> {
    l1: Mutex<LruCache<String, Chunk>>,
    l2: Mutex<LruCache<String, Chunk>>,
    l3: S,
}

impl<S: ChunkStore> TieredChunkCache<S> {
    pub fn new(l3: S, l1_capacity: usize, l2_capacity: usize) -> Self {
        Self {
            l1: Mutex::new(LruCache::new(std::num::NonZeroUsize::new(l1_capacity.max(1)).unwrap())),
            l2: Mutex::new(LruCache::new(std::num::NonZeroUsize::new(l2_capacity.max(1)).unwrap())),
            l3,
        }
    }

    /// Drop every cached entry belonging to `repo_id` from L1 and L2. L3 is
    /// untouched — it is the durable tier and doesn't need invalidating.
    pub fn invalidate_repo(&self, repo_id: &str) {
        let prefix = format!("{repo_id}:");
        let mut l1 = self.l1.lock().expect("chunk cache L1 poisoned");
        let stale: Vec<String> = l1.iter().map(|(k, _)| k.clone()).filter(|k| k.starts_with(&prefix)).collect();
        for key in stale {
            l1.pop(&key);
        }
        drop(l1);

        let mut l2 = self.l2.lock().expect("chunk cache L2 poisoned");
        let stale: Vec<String> = l2.iter().map(|(k, _)| k.clone()).filter(|k| k.starts_with(&prefix)).collect();
        for key in stale {
            l2.pop(&key);
        }
    }

    pub fn inner(&self) -> &S {
        &self.l3
    }
}

impl<S: ChunkStore> ChunkStore for TieredChunkCache<S> {
    fn upsert_batch(&self, chunks: Vec<Chunk>, allow_gaps: bool) -> Result<BoundaryReport> {
        let report = self.l3.upsert_batch(chunks.clone(), allow_gaps)?;
        let mut l1 = self.l1.lock().expect("chunk cache L1 poisoned");
        let mut l2 = self.l2.lock().expect("chunk cache L2 poisoned");
        for chunk in chunks {
            let key = namespaced_key(&chunk.repo_id, &chunk.chunk_id);
            l1.put(key.clone(), chunk.clone());
            l2.put(key, chunk);
        }
        Ok(report)
    }

    fn get(&self, chunk_id: &str) -> Result<Option<Chunk>> {
        // The cache key needs a repo_id, which we don't have from `chunk_id`
        // alone in the general case; chunk ids are namespaced by repo
        // (`chunk:{repo}:...`) so we reuse the id itself as the cache key.
        if let Some(hit) = self.l1.lock().expect("chunk cache L1 poisoned").get(chunk_id) {
            return Ok(Some(hit.clone()));
        }
        if let Some(hit) = self.l2.lock().expect("chunk cache L2 poisoned").get(chunk_id).cloned() {
            self.l1.lock().expect("chunk cache L1 poisoned").put(chunk_id.to_string(), hit.clone());
            return Ok(Some(hit));
        }
        let fetched = self.l3.get(chunk_id)?;
        if let Some(chunk) = &fetched {
            self.l1.lock().expect("chunk cache L1 poisoned").put(chunk_id.to_string(), chunk.clone());
            self.l2.lock().expect("chunk cache L2 poisoned").put(chunk_id.to_string(), chunk.clone());
        }
        Ok(fetched)
    }

    fn get_batch(&self, chunk_ids: &[String]) -> Result<Vec<Chunk>> {
        let mut out = Vec::with_capacity(chunk_ids.len());
        let mut misses = Vec::new();
        for id in chunk_ids {
            match self.get(id)? {
                Some(chunk) => out.push(chunk),
                None => misses.push(id.clone()),
            }
        }
        let _ = misses;
        Ok(out)
    }

    fn query_by_repo_snapshot(&self, repo_id: &str, snapshot_id: &str, offset: usize, limit: usize) -> Result<ChunkPage> {
        self.l3.query_by_repo_snapshot(repo_id, snapshot_id, offset, limit)
    }

    fn query_by_file(&self, repo_id: &str, file_path: &str) -> Result<Vec<Chunk>> {
        self.l3.query_by_file(repo_id, file_path)
    }

    fn query_by_line(&self, repo_id: &str, file_path: &str, line: u32) -> Result<Option<Chunk>> {
        self.l3.query_by_line(repo_id, file_path, line)
    }

    fn soft_delete(&self, chunk_id: &str) -> Result<()> {
        self.l3.soft_delete(chunk_id)?;
        self.l1.lock().expect("chunk cache L1 poisoned").pop(chunk_id);
        self.l2.lock().expect("chunk cache L2 poisoned").pop(chunk_id);
        Ok(())
    }

    fn get_ir_mapping(&self, repo_id: &str, snapshot_id: &str) -> Result<ChunkToIrMapping> {
        self.l3.get_ir_mapping(repo_id, snapshot_id)
    }

    fn set_ir_mapping(&self, mapping: ChunkToIrMapping) -> Result<()> {
        self.l3.set_ir_mapping(mapping)
    }

    fn get_graph_mapping(&self, repo_id: &str, snapshot_id: &str) -> Result<ChunkToGraphMapping> {
        self.l3.get_graph_mapping(repo_id, snapshot_id)
    }

    fn set_graph_mapping(&self, mapping: ChunkToGraphMapping) -> Result<()> {
        self.l3.set_graph_mapping(mapping)
    }
}
