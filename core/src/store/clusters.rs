//! Cluster persistence: detection rows, membership, review status.

use super::GraphStore;
use crate::cluster::{ClusterRecord, ClusterStatus, Detector};
use crate::error::{FraudError, FraudResult};
use crate::risk::RiskLevel;
use crate::types::{from_unix, to_unix, Timestamp, UserId};
use rusqlite::params;

// Raw cluster row before enum and JSON decoding.
type ClusterRow = (
    String,
    String,
    String,
    f64,
    String,
    String,
    String,
    String,
    i64,
    i64,
    Option<String>,
);

const CLUSTER_COLUMNS: &str = "cluster_id, detector, signature, probability, risk_level, \
     status, characteristics, signals, detected_at, last_detected_at, supersedes";

fn map_cluster_row(row: &rusqlite::Row) -> rusqlite::Result<ClusterRow> {
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

impl GraphStore {
    fn decode_cluster(&self, raw: ClusterRow) -> FraudResult<ClusterRecord> {
        let (
            cluster_id,
            detector,
            signature,
            probability,
            risk_level,
            status,
            characteristics,
            signals,
            detected_at,
            last_detected_at,
            supersedes,
        ) = raw;
        let members = self.cluster_members(&cluster_id)?;
        Ok(ClusterRecord {
            cluster_id,
            detector: Detector::parse(&detector)?,
            signature,
            members,
            probability,
            risk_level: RiskLevel::parse(&risk_level)?,
            status: ClusterStatus::parse(&status)?,
            characteristics: serde_json::from_str(&characteristics)?,
            signals: serde_json::from_str(&signals)?,
            detected_at: from_unix(detected_at),
            last_detected_at: from_unix(last_detected_at),
            supersedes,
        })
    }

    fn cluster_members(&self, cluster_id: &str) -> FraudResult<Vec<UserId>> {
        let mut stmt = self.conn().prepare(
            "SELECT user_id FROM cluster_member WHERE cluster_id = ?1 ORDER BY user_id",
        )?;
        let rows = stmt.query_map(params![cluster_id], |row| row.get(0))?;
        let mut members = Vec::new();
        for row in rows {
            members.push(row?);
        }
        Ok(members)
    }

    pub fn insert_cluster(&self, record: &ClusterRecord) -> FraudResult<()> {
        self.conn().execute(
            &format!(
                "INSERT INTO cluster ({CLUSTER_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                record.cluster_id,
                record.detector.as_str(),
                record.signature,
                record.probability,
                record.risk_level.as_str(),
                record.status.as_str(),
                serde_json::to_string(&record.characteristics)?,
                serde_json::to_string(&record.signals)?,
                to_unix(record.detected_at),
                to_unix(record.last_detected_at),
                record.supersedes,
            ],
        )?;
        for member in &record.members {
            self.conn().execute(
                "INSERT OR IGNORE INTO cluster_member (cluster_id, user_id) VALUES (?1, ?2)",
                params![record.cluster_id, member],
            )?;
        }
        Ok(())
    }

    /// Most recent cluster row carrying this membership signature.
    pub fn latest_cluster_by_signature(
        &self,
        signature: &str,
    ) -> FraudResult<Option<ClusterRecord>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CLUSTER_COLUMNS} FROM cluster
             WHERE signature = ?1
             ORDER BY detected_at DESC, cluster_id DESC LIMIT 1"
        ))?;
        let mut rows = stmt.query_map(params![signature], map_cluster_row)?;
        match rows.next() {
            Some(row) => Ok(Some(self.decode_cluster(row?)?)),
            None => Ok(None),
        }
    }

    pub fn get_cluster(&self, cluster_id: &str) -> FraudResult<ClusterRecord> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CLUSTER_COLUMNS} FROM cluster WHERE cluster_id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![cluster_id], map_cluster_row)?;
        match rows.next() {
            Some(row) => self.decode_cluster(row?),
            None => Err(FraudError::Configuration(format!(
                "unknown cluster '{cluster_id}'"
            ))),
        }
    }

    /// Re-detection of an unchanged cluster only moves its freshness stamp.
    pub fn touch_cluster(&self, cluster_id: &str, last_detected_at: Timestamp) -> FraudResult<()> {
        self.conn().execute(
            "UPDATE cluster SET last_detected_at = ?2 WHERE cluster_id = ?1",
            params![cluster_id, to_unix(last_detected_at)],
        )?;
        Ok(())
    }

    pub fn set_cluster_status(
        &self,
        cluster_id: &str,
        status: ClusterStatus,
    ) -> FraudResult<()> {
        self.conn().execute(
            "UPDATE cluster SET status = ?2 WHERE cluster_id = ?1",
            params![cluster_id, status.as_str()],
        )?;
        Ok(())
    }

    /// How many generations of this signature already exist.
    pub fn cluster_generation_count(&self, signature: &str) -> FraudResult<i64> {
        self.conn()
            .query_row(
                "SELECT COUNT(*) FROM cluster WHERE signature = ?1",
                params![signature],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Recidivism check: true when any listed user belongs to a cluster a
    /// human already confirmed.
    pub fn any_user_previously_confirmed(&self, users: &[UserId]) -> FraudResult<bool> {
        let mut stmt = self.conn().prepare(
            "SELECT EXISTS (
                SELECT 1 FROM cluster_member m
                JOIN cluster c ON c.cluster_id = m.cluster_id
                WHERE m.user_id = ?1 AND c.status = 'confirmed'
             )",
        )?;
        for user in users {
            let hit: i64 = stmt.query_row(params![user], |row| row.get(0))?;
            if hit != 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn cluster_count(&self) -> FraudResult<i64> {
        self.conn()
            .query_row("SELECT COUNT(*) FROM cluster", [], |row| row.get(0))
            .map_err(Into::into)
    }
}
