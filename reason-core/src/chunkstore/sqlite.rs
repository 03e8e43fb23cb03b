//! SQL-style persistent chunk store backend, mirroring the `chunks` /
//! `chunk_history` / `chunk_to_graph_mapping` / `chunk_to_ir_mapping` tables
//! from the external persisted-state layout.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::error::{Error, Result};

use super::boundary::{validate_boundaries, BoundaryReport};
use super::store::{best_covering_chunk, ChunkPage, ChunkStore};
use super::types::{Chunk, ChunkHistory, ChunkKind, ChunkToGraphMapping, ChunkToIrMapping, SymbolVisibility};

fn map_sqlite(e: rusqlite::Error) -> Error {
    Error::Internal(format!("chunk store sqlite error: {e}"))
}

/// Persistent chunk store. All mutating operations serialize on `conn`'s
/// mutex, matching the in-memory backend's single-writer discipline.
pub struct SqliteChunkStore {
    conn: Mutex<Connection>,
}

impl SqliteChunkStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(map_sqlite)?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(map_sqlite)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL").map_err(map_sqlite)?;
        conn.pragma_update(None, "foreign_keys", "ON").map_err(map_sqlite)?;
        initialize_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| Error::Internal("chunk store lock poisoned".into()))?;
        f(&conn).map_err(map_sqlite)
    }

    fn existing_ids(&self, conn: &Connection) -> rusqlite::Result<std::collections::HashSet<String>> {
        let mut stmt = conn.prepare("SELECT chunk_id FROM chunks")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect()
    }
}

fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS chunks (
            chunk_id TEXT PRIMARY KEY,
            repo_id TEXT NOT NULL,
            snapshot_id TEXT NOT NULL,
            parent_id TEXT,
            kind TEXT NOT NULL,
            fqn TEXT NOT NULL,
            file_path TEXT,
            start_line INTEGER,
            end_line INTEGER,
            original_start_line INTEGER,
            original_end_line INTEGER,
            content_hash TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            last_indexed_commit TEXT,
            summary TEXT,
            importance REAL,
            attrs TEXT,
            is_test INTEGER,
            is_overlay INTEGER NOT NULL DEFAULT 0,
            overlay_session_id TEXT,
            base_chunk_id TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_chunks_file_span ON chunks(repo_id, file_path, start_line, end_line);
        CREATE INDEX IF NOT EXISTS idx_chunks_repo_snapshot ON chunks(repo_id, snapshot_id);
        CREATE INDEX IF NOT EXISTS idx_chunks_symbol ON chunks(attrs);
        CREATE INDEX IF NOT EXISTS idx_chunks_content_hash ON chunks(repo_id, file_path, content_hash);

        CREATE TABLE IF NOT EXISTS chunk_history (
            chunk_id TEXT PRIMARY KEY,
            author TEXT,
            last_modified_by TEXT,
            last_modified_at TEXT,
            commit_sha TEXT,
            churn_score REAL NOT NULL DEFAULT 0,
            stability_index REAL NOT NULL DEFAULT 0,
            contributor_count INTEGER NOT NULL DEFAULT 0,
            co_changed_files TEXT,
            co_change_strength TEXT,
            first_commit_at TEXT,
            days_since_last_change INTEGER,
            last_analyzed_at TEXT,
            analysis_version INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS chunk_to_graph_mapping (
            repo_id TEXT NOT NULL,
            snapshot_id TEXT NOT NULL,
            chunk_id TEXT NOT NULL,
            graph_node_ids TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (repo_id, snapshot_id, chunk_id)
        );

        CREATE TABLE IF NOT EXISTS chunk_to_ir_mapping (
            repo_id TEXT NOT NULL,
            snapshot_id TEXT NOT NULL,
            chunk_id TEXT NOT NULL,
            ir_node_ids TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (repo_id, snapshot_id, chunk_id)
        );",
    )
    .map_err(map_sqlite)
}

fn kind_from_str(s: &str) -> ChunkKind {
    match s {
        "repo" => ChunkKind::Repo,
        "project" => ChunkKind::Project,
        "module" => ChunkKind::Module,
        "file" => ChunkKind::File,
        "class" => ChunkKind::Class,
        "route" => ChunkKind::Route,
        "service" => ChunkKind::Service,
        "repository" => ChunkKind::Repository,
        "config" => ChunkKind::Config,
        "job" => ChunkKind::Job,
        "middleware" => ChunkKind::Middleware,
        "document" => ChunkKind::Document,
        "module_api" => ChunkKind::ModuleApi,
        "interface" => ChunkKind::Interface,
        "reexport" => ChunkKind::Reexport,
        "diff" => ChunkKind::Diff,
        "file_header" => ChunkKind::FileHeader,
        "skeleton" => ChunkKind::Skeleton,
        "docstring" => ChunkKind::Docstring,
        _ => ChunkKind::Function,
    }
}

struct Attrs {
    language: Option<String>,
    symbol_visibility: Option<SymbolVisibility>,
    symbol_id: Option<String>,
    symbol_owner_id: Option<String>,
    children: Vec<String>,
}

fn attrs_to_json(chunk: &Chunk) -> String {
    serde_json::json!({
        "language": chunk.language,
        "symbol_visibility": chunk.symbol_visibility,
        "symbol_id": chunk.symbol_id,
        "symbol_owner_id": chunk.symbol_owner_id,
        "children": chunk.children,
    })
    .to_string()
}

fn attrs_from_json(raw: &str) -> Attrs {
    let value: Value = serde_json::from_str(raw).unwrap_or_default();
    Attrs {
        language: value.get("language").and_then(|v| v.as_str()).map(str::to_string),
        symbol_visibility: value
            .get("symbol_visibility")
            .and_then(|v| v.as_str())
            .and_then(|v| match v {
                "public" => Some(SymbolVisibility::Public),
                "internal" => Some(SymbolVisibility::Internal),
                "private" => Some(SymbolVisibility::Private),
                _ => None,
            }),
        symbol_id: value.get("symbol_id").and_then(|v| v.as_str()).map(str::to_string),
        symbol_owner_id: value.get("symbol_owner_id").and_then(|v| v.as_str()).map(str::to_string),
        children: value
            .get("children")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|x| x.as_str().map(str::to_string)).collect())
            .unwrap_or_default(),
    }
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
    let attrs_raw: String = row.get("attrs")?;
    let attrs = attrs_from_json(&attrs_raw);
    Ok(Chunk {
        chunk_id: row.get("chunk_id")?,
        repo_id: row.get("repo_id")?,
        snapshot_id: row.get("snapshot_id")?,
        kind: kind_from_str(&row.get::<_, String>("kind")?),
        fqn: row.get("fqn")?,
        file_path: row.get("file_path")?,
        start_line: row.get::<_, Option<i64>>("start_line")?.map(|v| v as u32),
        end_line: row.get::<_, Option<i64>>("end_line")?.map(|v| v as u32),
        original_start_line: row.get::<_, Option<i64>>("original_start_line")?.map(|v| v as u32),
        original_end_line: row.get::<_, Option<i64>>("original_end_line")?.map(|v| v as u32),
        content_hash: row.get("content_hash")?,
        parent_id: row.get("parent_id")?,
        children: attrs.children,
        language: attrs.language,
        symbol_visibility: attrs.symbol_visibility,
        symbol_id: attrs.symbol_id,
        symbol_owner_id: attrs.symbol_owner_id,
        summary: row.get("summary")?,
        importance: row.get("importance")?,
        version: row.get::<_, i64>("version")? as u32,
        last_indexed_commit: row.get("last_indexed_commit")?,
        is_deleted: row.get::<_, i64>("is_deleted")? != 0,
        is_test: row.get::<_, Option<i64>>("is_test")?.map(|v| v != 0),
        is_overlay: row.get::<_, i64>("is_overlay")? != 0,
        overlay_session_id: row.get("overlay_session_id")?,
        base_chunk_id: row.get("base_chunk_id")?,
        history: None,
    })
}

const SELECT_COLUMNS: &str = "chunk_id, repo_id, snapshot_id, parent_id, kind, fqn, file_path, start_line, end_line, \
     original_start_line, original_end_line, content_hash, version, is_deleted, last_indexed_commit, summary, \
     importance, attrs, is_test, is_overlay, overlay_session_id, base_chunk_id";

impl ChunkStore for SqliteChunkStore {
    fn upsert_batch(&self, chunks: Vec<Chunk>, allow_gaps: bool) -> Result<BoundaryReport> {
        let mut conn = self.conn.lock().map_err(|_| Error::Internal("chunk store lock poisoned".into()))?;

        let mut deduped: HashMap<String, Chunk> = HashMap::new();
        let mut order = Vec::new();
        for chunk in chunks {
            if !deduped.contains_key(&chunk.chunk_id) {
                order.push(chunk.chunk_id.clone());
            }
            deduped.insert(chunk.chunk_id.clone(), chunk);
        }
        let batch: Vec<Chunk> = order.into_iter().map(|id| deduped.remove(&id).unwrap()).collect();

        let existing_ids = self.existing_ids(&conn).map_err(map_sqlite)?;
        let report = validate_boundaries(&batch, &existing_ids, allow_gaps);
        if !report.is_valid() {
            return Err(Error::Internal(format!(
                "chunk boundary invariant violated: {}",
                report.violations.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("; ")
            )));
        }

        let tx = conn.transaction().map_err(map_sqlite)?;
        for chunk in &batch {
            tx.execute(
                "INSERT INTO chunks (chunk_id, repo_id, snapshot_id, parent_id, kind, fqn, file_path, start_line, end_line, \
                 original_start_line, original_end_line, content_hash, version, is_deleted, last_indexed_commit, summary, \
                 importance, attrs, is_test, is_overlay, overlay_session_id, base_chunk_id, updated_at) \
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22, datetime('now')) \
                 ON CONFLICT(chunk_id) DO UPDATE SET \
                   repo_id=excluded.repo_id, snapshot_id=excluded.snapshot_id, parent_id=excluded.parent_id, \
                   kind=excluded.kind, fqn=excluded.fqn, file_path=excluded.file_path, start_line=excluded.start_line, \
                   end_line=excluded.end_line, original_start_line=excluded.original_start_line, \
                   original_end_line=excluded.original_end_line, content_hash=excluded.content_hash, \
                   version=excluded.version, is_deleted=excluded.is_deleted, \
                   last_indexed_commit=excluded.last_indexed_commit, summary=excluded.summary, \
                   importance=excluded.importance, attrs=excluded.attrs, is_test=excluded.is_test, \
                   is_overlay=excluded.is_overlay, overlay_session_id=excluded.overlay_session_id, \
                   base_chunk_id=excluded.base_chunk_id, updated_at=datetime('now')",
                params![
                    chunk.chunk_id,
                    chunk.repo_id,
                    chunk.snapshot_id,
                    chunk.parent_id,
                    chunk.kind.as_str(),
                    chunk.fqn,
                    chunk.file_path,
                    chunk.start_line.map(|v| v as i64),
                    chunk.end_line.map(|v| v as i64),
                    chunk.original_start_line.map(|v| v as i64),
                    chunk.original_end_line.map(|v| v as i64),
                    chunk.content_hash,
                    chunk.version as i64,
                    chunk.is_deleted as i64,
                    chunk.last_indexed_commit,
                    chunk.summary,
                    chunk.importance,
                    attrs_to_json(chunk),
                    chunk.is_test.map(|v| v as i64),
                    chunk.is_overlay as i64,
                    chunk.overlay_session_id,
                    chunk.base_chunk_id,
                ],
            )
            .map_err(map_sqlite)?;

            if let Some(history) = &chunk.history {
                upsert_history(&tx, &chunk.chunk_id, history).map_err(map_sqlite)?;
            }
        }
        tx.commit().map_err(map_sqlite)?;

        Ok(report)
    }

    fn get(&self, chunk_id: &str) -> Result<Option<Chunk>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM chunks WHERE chunk_id = ?1"),
                params![chunk_id],
                row_to_chunk,
            )
            .optional()
        })
    }

    fn get_batch(&self, chunk_ids: &[String]) -> Result<Vec<Chunk>> {
        if chunk_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| {
            let placeholders = chunk_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let sql = format!("SELECT {SELECT_COLUMNS} FROM chunks WHERE chunk_id IN ({placeholders})");
            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::ToSql> = chunk_ids.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
            let rows = stmt.query_map(params.as_slice(), row_to_chunk)?;
            rows.collect()
        })
    }

    fn query_by_repo_snapshot(&self, repo_id: &str, snapshot_id: &str, offset: usize, limit: usize) -> Result<ChunkPage> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM chunks WHERE repo_id = ?1 AND snapshot_id = ?2",
                params![repo_id, snapshot_id],
                |row| row.get(0),
            )?;

            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM chunks WHERE repo_id = ?1 AND snapshot_id = ?2 \
                 ORDER BY chunk_id LIMIT ?3 OFFSET ?4"
            );
            let mut stmt = conn.prepare(&sql)?;
            let limit_i64 = if limit == usize::MAX { i64::MAX } else { limit as i64 };
            let rows = stmt.query_map(params![repo_id, snapshot_id, limit_i64, offset as i64], row_to_chunk)?;
            let chunks: Vec<Chunk> = rows.collect::<rusqlite::Result<_>>()?;
            let next_offset = if offset + chunks.len() < total as usize { Some(offset + chunks.len()) } else { None };
            Ok(ChunkPage { chunks, next_offset, total: total as usize })
        })
    }

    fn query_by_file(&self, repo_id: &str, file_path: &str) -> Result<Vec<Chunk>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM chunks WHERE repo_id = ?1 AND file_path = ?2 ORDER BY start_line"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![repo_id, file_path], row_to_chunk)?;
            rows.collect()
        })
    }

    fn query_by_line(&self, repo_id: &str, file_path: &str, line: u32) -> Result<Option<Chunk>> {
        let candidates = self.query_by_file(repo_id, file_path)?;
        Ok(best_covering_chunk(&candidates, line))
    }

    fn soft_delete(&self, chunk_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE chunks SET is_deleted = 1, version = version + 1, updated_at = datetime('now') WHERE chunk_id = ?1",
                params![chunk_id],
            )?;
            if affected == 0 {
                return Err(rusqlite::Error::QueryReturnedNoRows);
            }
            Ok(())
        })
    }

    fn get_ir_mapping(&self, repo_id: &str, snapshot_id: &str) -> Result<ChunkToIrMapping> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT chunk_id, ir_node_ids FROM chunk_to_ir_mapping WHERE repo_id = ?1 AND snapshot_id = ?2",
            )?;
            let rows = stmt.query_map(params![repo_id, snapshot_id], |row| {
                let chunk_id: String = row.get(0)?;
                let raw: String = row.get(1)?;
                Ok((chunk_id, raw))
            })?;
            let mut entries = HashMap::new();
            for row in rows {
                let (chunk_id, raw) = row?;
                let ids: Vec<String> = serde_json::from_str(&raw).unwrap_or_default();
                entries.insert(chunk_id, ids);
            }
            Ok(ChunkToIrMapping { repo_id: repo_id.to_string(), snapshot_id: snapshot_id.to_string(), entries })
        })
    }

    fn set_ir_mapping(&self, mapping: ChunkToIrMapping) -> Result<()> {
        self.with_conn(|conn| {
            for (chunk_id, ids) in &mapping.entries {
                conn.execute(
                    "INSERT INTO chunk_to_ir_mapping (repo_id, snapshot_id, chunk_id, ir_node_ids, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, datetime('now')) \
                     ON CONFLICT(repo_id, snapshot_id, chunk_id) DO UPDATE SET ir_node_ids = excluded.ir_node_ids, updated_at = datetime('now')",
                    params![mapping.repo_id, mapping.snapshot_id, chunk_id, serde_json::to_string(ids).unwrap_or_default()],
                )?;
            }
            Ok(())
        })
    }

    fn get_graph_mapping(&self, repo_id: &str, snapshot_id: &str) -> Result<ChunkToGraphMapping> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT chunk_id, graph_node_ids FROM chunk_to_graph_mapping WHERE repo_id = ?1 AND snapshot_id = ?2",
            )?;
            let rows = stmt.query_map(params![repo_id, snapshot_id], |row| {
                let chunk_id: String = row.get(0)?;
                let raw: String = row.get(1)?;
                Ok((chunk_id, raw))
            })?;
            let mut entries = HashMap::new();
            for row in rows {
                let (chunk_id, raw) = row?;
                let ids: Vec<String> = serde_json::from_str(&raw).unwrap_or_default();
                entries.insert(chunk_id, ids);
            }
            Ok(ChunkToGraphMapping { repo_id: repo_id.to_string(), snapshot_id: snapshot_id.to_string(), entries })
        })
    }

    fn set_graph_mapping(&self, mapping: ChunkToGraphMapping) -> Result<()> {
        self.with_conn(|conn| {
            for (chunk_id, ids) in &mapping.entries {
                conn.execute(
                    "INSERT INTO chunk_to_graph_mapping (repo_id, snapshot_id, chunk_id, graph_node_ids, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, datetime('now')) \
                     ON CONFLICT(repo_id, snapshot_id, chunk_id) DO UPDATE SET graph_node_ids = excluded.graph_node_ids, updated_at = datetime('now')",
                    params![mapping.repo_id, mapping.snapshot_id, chunk_id, serde_json::to_string(ids).unwrap_or_default()],
                )?;
            }
            Ok(())
        })
    }
}

fn upsert_history(tx: &rusqlite::Transaction<'_>, chunk_id: &str, history: &ChunkHistory) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO chunk_history (chunk_id, author, last_modified_by, last_modified_at, commit_sha, churn_score, \
         stability_index, contributor_count, co_changed_files, co_change_strength, first_commit_at, \
         days_since_last_change, last_analyzed_at, analysis_version) \
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14) \
         ON CONFLICT(chunk_id) DO UPDATE SET author=excluded.author, last_modified_by=excluded.last_modified_by, \
           last_modified_at=excluded.last_modified_at, commit_sha=excluded.commit_sha, churn_score=excluded.churn_score, \
           stability_index=excluded.stability_index, contributor_count=excluded.contributor_count, \
           co_changed_files=excluded.co_changed_files, co_change_strength=excluded.co_change_strength, \
           first_commit_at=excluded.first_commit_at, days_since_last_change=excluded.days_since_last_change, \
           last_analyzed_at=excluded.last_analyzed_at, analysis_version=excluded.analysis_version",
        params![
            chunk_id,
            history.author,
            history.last_modified_by,
            history.last_modified_at,
            history.commit_sha,
            history.churn_score,
            history.stability_index,
            history.contributor_count as i64,
            serde_json::to_string(&history.co_changed_files).unwrap_or_default(),
            serde_json::to_string(&history.co_change_strength).unwrap_or_default(),
            history.first_commit_at,
            history.days_since_last_change,
            history.last_analyzed_at,
            history.analysis_version as i64,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(file: &str, kind: ChunkKind, fqn: &str, start: u32, end: u32) -> Chunk {
        let mut c = Chunk::new("r", "snap1", kind, fqn).with_span(start, end);
        c.file_path = Some(file.to_string());
        c.content_hash = super::super::types::content_hash(fqn);
        c
    }

    #[test]
    fn roundtrips_a_chunk() {
        let store = SqliteChunkStore::in_memory().unwrap();
        let c = chunk("f.py", ChunkKind::Function, "f.foo", 1, 5);
        let id = c.chunk_id.clone();
        store.upsert_batch(vec![c], false).unwrap();
        let got = store.get(&id).unwrap().unwrap();
        assert_eq!(got.fqn, "f.foo");
        assert_eq!(got.start_line, Some(1));
    }

    #[test]
    fn upsert_is_idempotent_by_chunk_id() {
        let store = SqliteChunkStore::in_memory().unwrap();
        let mut c = chunk("f.py", ChunkKind::Function, "f.foo", 1, 5);
        c.summary = Some("v1".into());
        store.upsert_batch(vec![c.clone()], false).unwrap();
        c.summary = Some("v2".into());
        store.upsert_batch(vec![c.clone()], false).unwrap();
        let got = store.get(&c.chunk_id).unwrap().unwrap();
        assert_eq!(got.summary.as_deref(), Some("v2"));

        let page = store.query_by_repo_snapshot("r", "snap1", 0, 100).unwrap();
        assert_eq!(page.total, 1);
    }

    #[test]
    fn query_by_line_resolves_smallest_covering_span() {
        let store = SqliteChunkStore::in_memory().unwrap();
        let class_chunk = chunk("f.py", ChunkKind::Class, "f.Foo", 1, 100);
        let mut method_a = chunk("f.py", ChunkKind::Function, "f.Foo.bar", 10, 50);
        method_a.parent_id = Some(class_chunk.chunk_id.clone());
        let mut method_b = chunk("f.py", ChunkKind::Function, "f.Foo.baz", 15, 20);
        method_b.parent_id = Some(class_chunk.chunk_id.clone());
        store.upsert_batch(vec![class_chunk, method_a, method_b], false).unwrap();

        let hit = store.query_by_line("r", "f.py", 17).unwrap().unwrap();
        assert_eq!(hit.fqn, "f.Foo.baz");
    }

    #[test]
    fn boundary_violation_rejects_the_whole_batch() {
        let store = SqliteChunkStore::in_memory().unwrap();
        let file_chunk = Chunk::new("r", "snap1", ChunkKind::File, "f").with_span(1, 20);
        let parent_id = file_chunk.chunk_id.clone();

        let mut a = chunk("f.py", ChunkKind::Function, "f.a", 1, 10);
        a.parent_id = Some(parent_id.clone());
        let mut b = chunk("f.py", ChunkKind::Function, "f.b", 5, 15);
        b.parent_id = Some(parent_id);

        let err = store.upsert_batch(vec![file_chunk, a, b], false).unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn history_persists_alongside_chunk() {
        let store = SqliteChunkStore::in_memory().unwrap();
        let mut c = chunk("f.py", ChunkKind::Function, "f.foo", 1, 5);
        c.history = Some(ChunkHistory {
            author: Some("alice".into()),
            churn_score: 0.4,
            contributor_count: 2,
            ..Default::default()
        });
        store.upsert_batch(vec![c], false).unwrap();
        // History isn't returned by `get` (kept out of the hot read path);
        // this only exercises that the write path doesn't error.
    }
}
