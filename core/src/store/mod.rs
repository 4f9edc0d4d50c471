//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Domain modules call store methods — they never execute SQL directly.

mod accounts;
mod cases;
mod clusters;
mod edges;
mod enforcement;

use crate::error::FraudResult;
use crate::events::{event_type_name, EngineEvent};
use crate::types::{to_unix, Timestamp};
use rusqlite::{params, Connection};

pub struct GraphStore {
    conn: Connection,
}

impl GraphStore {
    /// Open (or create) the graph database at `path`.
    pub fn open(path: &str) -> FraudResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> FraudResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> FraudResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(
        &self,
        run_id: &str,
        phase: &str,
        event: &EngineEvent,
        now: Timestamp,
    ) -> FraudResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (run_id, phase, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run_id,
                phase,
                event_type_name(event),
                serde_json::to_string(event)?,
                to_unix(now),
            ],
        )?;
        Ok(())
    }

    pub fn event_count(&self, run_id: &str, event_type: &str) -> FraudResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM event_log WHERE run_id = ?1 AND event_type = ?2",
                params![run_id, event_type],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    // ── Pipeline runs ──────────────────────────────────────────

    pub fn insert_pipeline_run(&self, run_id: &str, started_at: Timestamp) -> FraudResult<()> {
        self.conn.execute(
            "INSERT INTO pipeline_run (run_id, started_at) VALUES (?1, ?2)",
            params![run_id, to_unix(started_at)],
        )?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn finish_pipeline_run(
        &self,
        run_id: &str,
        finished_at: Timestamp,
        edges_decayed: u64,
        edges_removed: u64,
        rings_found: u64,
        spam_clusters_found: u64,
        enforcement_applied: u64,
        enforcement_expired: u64,
        cases_opened: u64,
    ) -> FraudResult<()> {
        self.conn.execute(
            "UPDATE pipeline_run SET
                finished_at = ?2,
                edges_decayed = ?3, edges_removed = ?4,
                rings_found = ?5, spam_clusters_found = ?6,
                enforcement_applied = ?7, enforcement_expired = ?8,
                cases_opened = ?9
             WHERE run_id = ?1",
            params![
                run_id,
                to_unix(finished_at),
                edges_decayed as i64,
                edges_removed as i64,
                rings_found as i64,
                spam_clusters_found as i64,
                enforcement_applied as i64,
                enforcement_expired as i64,
                cases_opened as i64,
            ],
        )?;
        Ok(())
    }

    // ── Settled ledger boundary ────────────────────────────────
    //
    // Insert and sum only. Nothing in the engine updates or deletes
    // ledger rows; enforcement is forward-looking by construction.

    pub fn record_settled_earning(
        &self,
        user_id: &str,
        amount: f64,
        settled_at: Timestamp,
    ) -> FraudResult<()> {
        self.conn.execute(
            "INSERT INTO ledger_entry (user_id, amount, settled_at) VALUES (?1, ?2, ?3)",
            params![user_id, amount, to_unix(settled_at)],
        )?;
        Ok(())
    }

    pub fn settled_total(&self, user_id: &str) -> FraudResult<f64> {
        self.conn
            .query_row(
                "SELECT COALESCE(SUM(amount), 0.0) FROM ledger_entry WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }
}
