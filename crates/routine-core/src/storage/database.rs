//! SQLite-based run storage and statistics.
//!
//! Provides persistent storage for:
//! - The live run, as JSON in a key-value table
//! - Finished runs (completed or abandoned)
//! - Run statistics (daily and all-time)

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{CoreError, DatabaseError};
use crate::run::{RoutineRun, TaskStatus};

const CURRENT_RUN_KEY: &str = "current_run";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: i64,
    pub run_id: String,
    pub template_id: String,
    pub template_name: String,
    pub pace: String,
    pub status: String,
    pub tasks_completed: u64,
    pub tasks_skipped: u64,
    pub total_pause_ms: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RunStats {
    pub total_runs: u64,
    pub completed_runs: u64,
    pub abandoned_runs: u64,
    pub tasks_completed: u64,
    pub tasks_skipped: u64,
    pub total_pause_ms: i64,
    pub today_runs: u64,
}

/// SQLite database for run storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/routine-runner/routine-runner.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("routine-runner.db");
        Ok(Self::open_at(&path)?)
    }

    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS runs (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id          TEXT NOT NULL UNIQUE,
                template_id     TEXT NOT NULL,
                template_name   TEXT NOT NULL DEFAULT '',
                pace            TEXT NOT NULL,
                status          TEXT NOT NULL,
                tasks_completed INTEGER NOT NULL DEFAULT 0,
                tasks_skipped   INTEGER NOT NULL DEFAULT 0,
                total_pause_ms  INTEGER NOT NULL DEFAULT 0,
                started_at      TEXT,
                ended_at        TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_runs_ended_at ON runs(ended_at);
            CREATE INDEX IF NOT EXISTS idx_runs_template_id ON runs(template_id);",
        )?;
        Ok(())
    }

    /// Record a finished run. Recording the same run twice is a no-op.
    ///
    /// Returns `None` if the run hasn't finished or was already recorded.
    pub fn record_run(&self, run: &RoutineRun) -> Result<Option<i64>, DatabaseError> {
        let Some(ended_at) = run.ended_at.filter(|_| run.is_finished()) else {
            return Ok(None);
        };
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO runs (
                run_id, template_id, template_name, pace, status,
                tasks_completed, tasks_skipped, total_pause_ms, started_at, ended_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                run.id,
                run.template_id,
                run.template_name,
                run.pace.as_str(),
                run.status.as_str(),
                run.count_with_status(TaskStatus::Completed) as u64,
                run.count_with_status(TaskStatus::Skipped) as u64,
                run.total_pause_ms,
                run.started_at.map(|t| t.to_rfc3339()),
                ended_at.to_rfc3339(),
            ],
        )?;
        Ok((inserted > 0).then(|| self.conn.last_insert_rowid()))
    }

    /// Most recent finished runs, newest first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, template_id, template_name, pace, status,
                    tasks_completed, tasks_skipped, total_pause_ms, started_at, ended_at
             FROM runs
             ORDER BY ended_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(RunRecord {
                id: row.get(0)?,
                run_id: row.get(1)?,
                template_id: row.get(2)?,
                template_name: row.get(3)?,
                pace: row.get(4)?,
                status: row.get(5)?,
                tasks_completed: row.get(6)?,
                tasks_skipped: row.get(7)?,
                total_pause_ms: row.get(8)?,
                started_at: row
                    .get::<_, Option<String>>(9)?
                    .and_then(|s| parse_timestamp(&s)),
                ended_at: parse_timestamp(&row.get::<_, String>(10)?).unwrap_or_default(),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn stats(&self) -> Result<RunStats, DatabaseError> {
        self.stats_as_of(Utc::now())
    }

    /// Aggregate statistics; "today" is the UTC day of `now`.
    pub fn stats_as_of(&self, now: DateTime<Utc>) -> Result<RunStats, DatabaseError> {
        let mut stats = RunStats::default();
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*), COALESCE(SUM(tasks_completed), 0),
                    COALESCE(SUM(tasks_skipped), 0), COALESCE(SUM(total_pause_ms), 0)
             FROM runs
             GROUP BY status",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, u64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        for row in rows {
            let (status, count, completed, skipped, pause_ms) = row?;
            stats.total_runs += count;
            stats.tasks_completed += completed;
            stats.tasks_skipped += skipped;
            stats.total_pause_ms += pause_ms;
            match status.as_str() {
                "completed" => stats.completed_runs += count,
                "abandoned" => stats.abandoned_runs += count,
                _ => {}
            }
        }

        let today = now.format("%Y-%m-%d").to_string();
        stats.today_runs = self.conn.query_row(
            "SELECT COUNT(*) FROM runs WHERE ended_at >= ?1",
            params![format!("{today}T00:00:00+00:00")],
            |row| row.get::<_, u64>(0),
        )?;
        Ok(stats)
    }

    // ── Live run ─────────────────────────────────────────────────────

    pub fn load_current_run(&self) -> Result<Option<RoutineRun>, DatabaseError> {
        match self.kv_get(CURRENT_RUN_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn save_current_run(&self, run: &RoutineRun) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(run)?;
        self.kv_set(CURRENT_RUN_KEY, &json)
    }

    pub fn clear_current_run(&self) -> Result<(), DatabaseError> {
        self.kv_delete(CURRENT_RUN_KEY)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), DatabaseError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::{create_run_from_template, end_run, skip_task, start_run};
    use crate::template::{Pace, RoutineTemplate};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 7, 0, 0).unwrap()
    }

    fn finished_run(abandon: bool) -> RoutineRun {
        let template = RoutineTemplate::default_morning();
        let run = create_run_from_template(&template, Pace::Low, t0());
        let run = start_run(&run, t0()).unwrap().run;
        if abandon {
            end_run(&run, t0() + Duration::minutes(1)).unwrap().run
        } else {
            let run = skip_task(&run, &run.tasks[0].id, t0() + Duration::minutes(1))
                .unwrap()
                .run;
            let id = run.active_task_id.clone().unwrap();
            skip_task(&run, &id, t0() + Duration::minutes(2)).unwrap().run
        }
    }

    #[test]
    fn current_run_roundtrip() {
        let db = Database::open_memory().unwrap();
        assert!(db.load_current_run().unwrap().is_none());

        let run = finished_run(false);
        db.save_current_run(&run).unwrap();
        assert_eq!(db.load_current_run().unwrap(), Some(run));

        db.clear_current_run().unwrap();
        assert!(db.load_current_run().unwrap().is_none());
    }

    #[test]
    fn corrupt_current_run_is_reported() {
        let db = Database::open_memory().unwrap();
        db.kv_set(CURRENT_RUN_KEY, "{not json").unwrap();
        assert!(matches!(
            db.load_current_run(),
            Err(DatabaseError::CorruptRun(_))
        ));
    }

    #[test]
    fn record_and_query() {
        let db = Database::open_memory().unwrap();
        let completed = finished_run(false);
        let abandoned = finished_run(true);

        assert!(db.record_run(&completed).unwrap().is_some());
        assert!(db.record_run(&abandoned).unwrap().is_some());
        assert!(db.record_run(&completed).unwrap().is_none());

        let recent = db.recent_runs(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].run_id, completed.id);
        assert_eq!(recent[0].status, "completed");
        assert_eq!(recent[0].tasks_skipped, 2);
        assert_eq!(recent[0].started_at, Some(t0()));

        let stats = db.stats_as_of(t0()).unwrap();
        assert_eq!(stats.total_runs, 2);
        assert_eq!(stats.completed_runs, 1);
        assert_eq!(stats.abandoned_runs, 1);
        assert_eq!(stats.tasks_skipped, 3);
        assert_eq!(stats.today_runs, 2);

        let tomorrow = db.stats_as_of(t0() + Duration::days(1)).unwrap();
        assert_eq!(tomorrow.today_runs, 0);
    }

    #[test]
    fn unfinished_runs_are_not_recorded() {
        let db = Database::open_memory().unwrap();
        let template = RoutineTemplate::default_morning();
        let run = create_run_from_template(&template, Pace::Steady, t0());
        assert_eq!(db.record_run(&run).unwrap(), None);
        assert_eq!(db.stats_as_of(t0()).unwrap(), RunStats::default());
    }
}
