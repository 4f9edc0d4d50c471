//! Edge table access: reinforcement upserts, temporal decay, snapshots.

use super::GraphStore;
use crate::error::FraudResult;
use crate::graph::EdgeRecord;
use crate::signal::EdgeType;
use crate::types::{from_unix, to_unix, Timestamp};
use rusqlite::params;

impl GraphStore {
    /// Reinforce-or-create an edge. The weight only ever moves up here:
    /// `max(existing, contribution)` clamped to the type ceiling. Decay is
    /// the single path that lowers it.
    #[allow(clippy::too_many_arguments)]
    pub fn upsert_edge(
        &self,
        user_a: &str,
        user_b: &str,
        edge_type: EdgeType,
        contribution: f64,
        ceiling: f64,
        observed_at: Timestamp,
        metadata: &serde_json::Value,
    ) -> FraudResult<()> {
        let observed = to_unix(observed_at);
        self.conn().execute(
            "INSERT INTO edge (user_a, user_b, edge_type, weight, last_reinforced_at, last_decayed_at, metadata)
             VALUES (?1, ?2, ?3, MIN(?4, ?5), ?6, ?6, ?7)
             ON CONFLICT (user_a, user_b, edge_type) DO UPDATE SET
                weight = MIN(MAX(weight, excluded.weight), ?5),
                last_reinforced_at = excluded.last_reinforced_at,
                metadata = excluded.metadata",
            params![
                user_a,
                user_b,
                edge_type.as_str(),
                contribution,
                ceiling,
                observed,
                serde_json::to_string(metadata)?,
            ],
        )?;
        Ok(())
    }

    /// One decay pass. An edge loses `rate` of its weight once per period
    /// of inactivity; `last_decayed_at` stops a second pass inside the same
    /// period from compounding. Edges that sink below `floor` are dropped.
    /// Returns (edges decayed, edges removed).
    pub fn decay_edges(
        &self,
        now: Timestamp,
        period_secs: i64,
        rate: f64,
        floor: f64,
    ) -> FraudResult<(u64, u64)> {
        let now_secs = to_unix(now);
        let updated = self.conn().execute(
            "UPDATE edge SET
                weight = weight * (1.0 - ?2),
                last_decayed_at = ?1
             WHERE ?1 - last_reinforced_at >= ?3
               AND ?1 - last_decayed_at >= ?3",
            params![now_secs, rate, period_secs],
        )?;
        let removed = self.conn().execute(
            "DELETE FROM edge WHERE weight < ?1",
            params![floor],
        )?;
        Ok((updated as u64, removed as u64))
    }

    /// Full edge table in canonical order, for a detection snapshot.
    pub fn snapshot_edges(&self) -> FraudResult<Vec<EdgeRecord>> {
        let mut stmt = self.conn().prepare(
            "SELECT user_a, user_b, edge_type, weight, last_reinforced_at
             FROM edge ORDER BY user_a, user_b, edge_type",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut edges = Vec::new();
        for row in rows {
            let (user_a, user_b, edge_type, weight, reinforced) = row?;
            edges.push(EdgeRecord {
                user_a,
                user_b,
                edge_type: EdgeType::parse(&edge_type)?,
                weight,
                last_reinforced_at: from_unix(reinforced),
            });
        }
        Ok(edges)
    }

    pub fn get_edge(
        &self,
        user_a: &str,
        user_b: &str,
        edge_type: EdgeType,
    ) -> FraudResult<Option<EdgeRecord>> {
        let mut stmt = self.conn().prepare(
            "SELECT user_a, user_b, edge_type, weight, last_reinforced_at
             FROM edge WHERE user_a = ?1 AND user_b = ?2 AND edge_type = ?3",
        )?;
        let mut rows = stmt.query_map(params![user_a, user_b, edge_type.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;
        match rows.next() {
            Some(row) => {
                let (user_a, user_b, edge_type, weight, reinforced) = row?;
                Ok(Some(EdgeRecord {
                    user_a,
                    user_b,
                    edge_type: EdgeType::parse(&edge_type)?,
                    weight,
                    last_reinforced_at: from_unix(reinforced),
                }))
            }
            None => Ok(None),
        }
    }

    pub fn edge_count(&self) -> FraudResult<i64> {
        self.conn()
            .query_row("SELECT COUNT(*) FROM edge", [], |row| row.get(0))
            .map_err(Into::into)
    }
}
