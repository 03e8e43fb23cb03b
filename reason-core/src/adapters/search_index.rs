//! Full-text search over chunk summaries/content, backed by SQLite FTS5.
//! Independent of the chunk store's own tables so a search index can be
//! rebuilt or dropped without touching chunk data.

use std::sync::Mutex;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub fqn: String,
    pub file_path: Option<String>,
    pub snippet: String,
    pub score: f64,
}

pub trait ChunkSearchIndex: Send + Sync {
    fn index_chunk(&self, chunk_id: &str, fqn: &str, file_path: Option<&str>, text: &str) -> Result<()>;

    fn remove_chunk(&self, chunk_id: &str) -> Result<()>;

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

pub struct SqliteChunkSearchIndex {
    conn: Mutex<Connection>,
}

fn map_sql(e: rusqlite::Error) -> Error {
    Error::execution(format!("search index sqlite error: {e}"))
}

impl SqliteChunkSearchIndex {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).map_err(map_sql)?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(map_sql)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE VIRTUAL TABLE IF NOT EXISTS chunk_fts USING fts5(
                chunk_id UNINDEXED,
                fqn,
                file_path UNINDEXED,
                body
             );",
        )
        .map_err(map_sql)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self.conn.lock().expect("search index connection poisoned");
        f(&conn).map_err(map_sql)
    }
}

impl ChunkSearchIndex for SqliteChunkSearchIndex {
    fn index_chunk(&self, chunk_id: &str, fqn: &str, file_path: Option<&str>, text: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM chunk_fts WHERE chunk_id = ?1", params![chunk_id])?;
            conn.execute(
                "INSERT INTO chunk_fts (chunk_id, fqn, file_path, body) VALUES (?1, ?2, ?3, ?4)",
                params![chunk_id, fqn, file_path, text],
            )?;
            Ok(())
        })
    }

    fn remove_chunk(&self, chunk_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM chunk_fts WHERE chunk_id = ?1", params![chunk_id])?;
            Ok(())
        })
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT chunk_id, fqn, file_path, snippet(chunk_fts, 3, '[', ']', '...', 12), bm25(chunk_fts)
                 FROM chunk_fts WHERE chunk_fts MATCH ?1 ORDER BY bm25(chunk_fts) LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![query, limit as i64], |row| {
                Ok(SearchHit {
                    chunk_id: row.get(0)?,
                    fqn: row.get(1)?,
                    file_path: row.get::<_, Option<String>>(2)?,
                    snippet: row.get(3)?,
                    // bm25() returns lower-is-better; invert so callers can
                    // treat `score` as higher-is-better like everywhere else.
                    score: -row.get::<_, f64>(4)?,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_and_search_round_trip() {
        let index = SqliteChunkSearchIndex::in_memory().unwrap();
        index.index_chunk("c1", "module.foo", Some("foo.py"), "def foo(): validate the input payload").unwrap();
        index.index_chunk("c2", "module.bar", Some("bar.py"), "def bar(): return 1").unwrap();

        let hits = index.search("validate", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "c1");
    }

    #[test]
    fn remove_chunk_drops_it_from_results() {
        let index = SqliteChunkSearchIndex::in_memory().unwrap();
        index.index_chunk("c1", "module.foo", Some("foo.py"), "validate the payload").unwrap();
        index.remove_chunk("c1").unwrap();

        let hits = index.search("validate", 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn reindexing_a_chunk_replaces_its_entry() {
        let index = SqliteChunkSearchIndex::in_memory().unwrap();
        index.index_chunk("c1", "module.foo", Some("foo.py"), "alpha content").unwrap();
        index.index_chunk("c1", "module.foo", Some("foo.py"), "beta content").unwrap();

        assert!(index.search("alpha", 10).unwrap().is_empty());
        assert_eq!(index.search("beta", 10).unwrap().len(), 1);
    }

    #[test]
    fn empty_query_returns_no_hits() {
        let index = SqliteChunkSearchIndex::in_memory().unwrap();
        index.index_chunk("c1", "module.foo", Some("foo.py"), "alpha content").unwrap();
        assert!(index.search("   ", 10).unwrap().is_empty());
    }
}
