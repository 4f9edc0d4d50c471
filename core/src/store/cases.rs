//! Moderation case rows.

use super::GraphStore;
use crate::case_manager::{CasePriority, CaseRecord, CaseResolution, CaseStatus};
use crate::error::{FraudError, FraudResult};
use crate::types::{from_unix, to_unix, Timestamp};
use rusqlite::params;

type CaseRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    i64,
    Option<i64>,
    Option<String>,
);

const CASE_COLUMNS: &str = "case_id, case_type, signature, cluster_id, linked_user_ids, \
     priority, status, evidence_summary, opened_at, resolved_at, resolution";

fn map_case_row(row: &rusqlite::Row) -> rusqlite::Result<CaseRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn decode_case(raw: CaseRow) -> FraudResult<CaseRecord> {
    let (
        case_id,
        case_type,
        signature,
        cluster_id,
        linked_user_ids,
        priority,
        status,
        evidence_summary,
        opened_at,
        resolved_at,
        resolution,
    ) = raw;
    let resolution = match resolution.as_deref() {
        None => None,
        Some("confirmed") => Some(CaseResolution::Confirmed),
        Some("false_positive") => Some(CaseResolution::FalsePositive),
        Some(other) => {
            return Err(FraudError::Configuration(format!(
                "unknown case resolution '{other}'"
            )))
        }
    };
    Ok(CaseRecord {
        case_id,
        case_type,
        signature,
        cluster_id,
        linked_user_ids: serde_json::from_str(&linked_user_ids)?,
        priority: CasePriority::parse(&priority)?,
        status: CaseStatus::parse(&status)?,
        evidence_summary,
        opened_at: from_unix(opened_at),
        resolved_at: resolved_at.map(from_unix),
        resolution,
    })
}

impl GraphStore {
    pub fn insert_case(&self, record: &CaseRecord) -> FraudResult<()> {
        self.conn().execute(
            &format!(
                "INSERT INTO moderation_case ({CASE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                record.case_id,
                record.case_type,
                record.signature,
                record.cluster_id,
                serde_json::to_string(&record.linked_user_ids)?,
                record.priority.as_str(),
                record.status.as_str(),
                record.evidence_summary,
                to_unix(record.opened_at),
                record.resolved_at.map(to_unix),
                record.resolution.map(|r| r.as_str()),
            ],
        )?;
        Ok(())
    }

    /// The unresolved case for this membership signature, if one exists.
    pub fn open_case_by_signature(&self, signature: &str) -> FraudResult<Option<CaseRecord>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CASE_COLUMNS} FROM moderation_case
             WHERE signature = ?1 AND resolved_at IS NULL
             ORDER BY opened_at DESC, case_id DESC LIMIT 1"
        ))?;
        let mut rows = stmt.query_map(params![signature], map_case_row)?;
        match rows.next() {
            Some(row) => Ok(Some(decode_case(row?)?)),
            None => Ok(None),
        }
    }

    /// Re-detection against an unresolved case: fold in the newest cluster
    /// generation and evidence, never lower the priority.
    pub fn refresh_case(
        &self,
        case_id: &str,
        priority: CasePriority,
        cluster_id: &str,
        evidence_summary: &str,
    ) -> FraudResult<()> {
        self.conn().execute(
            "UPDATE moderation_case SET
                priority = ?2, cluster_id = ?3, evidence_summary = ?4
             WHERE case_id = ?1",
            params![case_id, priority.as_str(), cluster_id, evidence_summary],
        )?;
        Ok(())
    }

    pub fn case_count_for_signature(&self, signature: &str) -> FraudResult<i64> {
        self.conn()
            .query_row(
                "SELECT COUNT(*) FROM moderation_case WHERE signature = ?1",
                params![signature],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    pub fn get_case(&self, case_id: &str) -> FraudResult<CaseRecord> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CASE_COLUMNS} FROM moderation_case WHERE case_id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![case_id], map_case_row)?;
        match rows.next() {
            Some(row) => decode_case(row?),
            None => Err(FraudError::Configuration(format!(
                "unknown case '{case_id}'"
            ))),
        }
    }

    pub fn set_case_status(&self, case_id: &str, status: CaseStatus) -> FraudResult<()> {
        self.conn().execute(
            "UPDATE moderation_case SET status = ?2 WHERE case_id = ?1",
            params![case_id, status.as_str()],
        )?;
        Ok(())
    }

    pub fn resolve_case(
        &self,
        case_id: &str,
        resolution: CaseResolution,
        now: Timestamp,
    ) -> FraudResult<()> {
        self.conn().execute(
            "UPDATE moderation_case SET
                status = 'resolved', resolved_at = ?2, resolution = ?3
             WHERE case_id = ?1",
            params![case_id, to_unix(now), resolution.as_str()],
        )?;
        Ok(())
    }

    pub fn open_case_count(&self) -> FraudResult<i64> {
        self.conn()
            .query_row(
                "SELECT COUNT(*) FROM moderation_case WHERE resolved_at IS NULL",
                [],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }
}
