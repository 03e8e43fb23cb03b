//! Append-only experience log: every completed deep-reasoning run writes one
//! record here, feeding the router/selector's learned priors in later runs.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperienceRecord {
    pub record_id: String,
    pub repo_id: String,
    pub task_fingerprint: String,
    pub strategy: String,
    pub risk_score: f64,
    pub reflection_verdict: String,
    pub iterations: u32,
    pub succeeded: bool,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

pub trait ExperienceRepository: Send + Sync {
    fn append(&self, record: ExperienceRecord) -> Result<()>;

    fn recent_for_fingerprint(&self, task_fingerprint: &str, limit: usize) -> Result<Vec<ExperienceRecord>>;

    /// Historical success rate of `strategy` against tasks with this
    /// fingerprint, used by the strategy selector as a learned prior.
    /// Returns `None` when there is no history yet.
    fn success_rate(&self, task_fingerprint: &str, strategy: &str) -> Result<Option<f64>>;
}

pub struct SqliteExperienceRepository {
    conn: Mutex<Connection>,
}

fn map_sql(e: rusqlite::Error) -> Error {
    Error::execution(format!("experience store sqlite error: {e}"))
}

impl SqliteExperienceRepository {
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
            "PRAGMA journal_mode = WAL;
             CREATE TABLE IF NOT EXISTS experience_records (
                 record_id TEXT PRIMARY KEY,
                 repo_id TEXT NOT NULL,
                 task_fingerprint TEXT NOT NULL,
                 strategy TEXT NOT NULL,
                 risk_score REAL NOT NULL,
                 reflection_verdict TEXT NOT NULL,
                 iterations INTEGER NOT NULL,
                 succeeded INTEGER NOT NULL,
                 duration_ms INTEGER NOT NULL,
                 created_at TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_experience_fingerprint
                 ON experience_records(task_fingerprint, strategy);",
        )
        .map_err(map_sql)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self.conn.lock().expect("experience store connection poisoned");
        f(&conn).map_err(map_sql)
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ExperienceRecord> {
    let created_at_raw: String = row.get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    Ok(ExperienceRecord {
        record_id: row.get("record_id")?,
        repo_id: row.get("repo_id")?,
        task_fingerprint: row.get("task_fingerprint")?,
        strategy: row.get("strategy")?,
        risk_score: row.get("risk_score")?,
        reflection_verdict: row.get("reflection_verdict")?,
        iterations: row.get::<_, i64>("iterations")? as u32,
        succeeded: row.get::<_, i64>("succeeded")? != 0,
        duration_ms: row.get::<_, i64>("duration_ms")? as u64,
        created_at,
    })
}

impl ExperienceRepository for SqliteExperienceRepository {
    fn append(&self, record: ExperienceRecord) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO experience_records
                 (record_id, repo_id, task_fingerprint, strategy, risk_score, reflection_verdict, iterations, succeeded, duration_ms, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(record_id) DO NOTHING",
                params![
                    record.record_id,
                    record.repo_id,
                    record.task_fingerprint,
                    record.strategy,
                    record.risk_score,
                    record.reflection_verdict,
                    record.iterations as i64,
                    record.succeeded as i64,
                    record.duration_ms as i64,
                    record.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    fn recent_for_fingerprint(&self, task_fingerprint: &str, limit: usize) -> Result<Vec<ExperienceRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM experience_records WHERE task_fingerprint = ?1
                 ORDER BY created_at DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![task_fingerprint, limit as i64], row_to_record)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
    }

    fn success_rate(&self, task_fingerprint: &str, strategy: &str) -> Result<Option<f64>> {
        self.with_conn(|conn| {
            let totals: Option<(i64, i64)> = conn
                .query_row(
                    "SELECT COUNT(*), SUM(succeeded) FROM experience_records
                     WHERE task_fingerprint = ?1 AND strategy = ?2",
                    params![task_fingerprint, strategy],
                    |row| Ok((row.get(0)?, row.get::<_, Option<i64>>(1)?.unwrap_or(0))),
                )
                .optional()?;
            Ok(totals.filter(|(count, _)| *count > 0).map(|(count, succeeded)| succeeded as f64 / count as f64))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(record_id: &str, strategy: &str, succeeded: bool) -> ExperienceRecord {
        ExperienceRecord {
            record_id: record_id.to_string(),
            repo_id: "r".to_string(),
            task_fingerprint: "fp-1".to_string(),
            strategy: strategy.to_string(),
            risk_score: 0.4,
            reflection_verdict: "pass".to_string(),
            iterations: 1,
            succeeded,
            duration_ms: 1200,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn append_and_fetch_round_trips() {
        let repo = SqliteExperienceRepository::in_memory().unwrap();
        repo.append(sample("e1", "tot", true)).unwrap();

        let recent = repo.recent_for_fingerprint("fp-1", 10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].strategy, "tot");
    }

    #[test]
    fn success_rate_is_none_without_history() {
        let repo = SqliteExperienceRepository::in_memory().unwrap();
        assert_eq!(repo.success_rate("fp-unknown", "tot").unwrap(), None);
    }

    #[test]
    fn success_rate_averages_over_matching_records() {
        let repo = SqliteExperienceRepository::in_memory().unwrap();
        repo.append(sample("e1", "tot", true)).unwrap();
        repo.append(sample("e2", "tot", false)).unwrap();
        repo.append(sample("e3", "tot", true)).unwrap();

        let rate = repo.success_rate("fp-1", "tot").unwrap().unwrap();
        assert!((rate - (2.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn duplicate_record_id_is_idempotent() {
        let repo = SqliteExperienceRepository::in_memory().unwrap();
        repo.append(sample("e1", "tot", true)).unwrap();
        repo.append(sample("e1", "tot", true)).unwrap();
        assert_eq!(repo.recent_for_fingerprint("fp-1", 10).unwrap().len(), 1);
    }
}
