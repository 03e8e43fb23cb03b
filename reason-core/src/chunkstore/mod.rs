//! Chunk store and graph/IR mapping: hierarchical code chunks
//! (repo -> project -> module -> file -> class -> function), their mapping
//! to IR/graph node ids, boundary invariants, and incremental refresh.
//!
//! Two interchangeable backends share the [`ChunkStore`] trait:
//! [`InMemoryChunkStore`] for development/test, [`SqliteChunkStore`] for
//! production. [`cache::TieredChunkCache`] wraps either with an optional
//! L1/L2 read cache, write-through to the wrapped store.

pub mod boundary;
pub mod cache;
pub mod incremental;
pub mod mapping;
pub mod sqlite;
pub mod store;
pub mod types;

pub use boundary::{validate_boundaries, BoundaryReport, BoundaryViolation, LARGE_CLASS_TOKEN_THRESHOLD};
pub use cache::TieredChunkCache;
pub use incremental::{refresh_file, DiffHunk, FileChangeKind, IncrementalRefreshResult};
pub use mapping::{aggregate_defined_symbols, class_public_methods, detect_drift, function_symbol, AggregateSymbols};
pub use sqlite::SqliteChunkStore;
pub use store::{ChunkPage, ChunkStore, InMemoryChunkStore};
pub use types::{
    build_chunk_id, content_hash, disambiguate_chunk_id, Chunk, ChunkHistory, ChunkKind, ChunkToGraphMapping,
    ChunkToIrMapping, DriftReport, DriftType, SymbolVisibility,
};
