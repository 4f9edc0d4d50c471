//! Enforcement action rows. At most one live action per account: apply
//! escalates or refreshes in place, the expiry sweep retires rows through
//! the `deescalated` flag, human reversal stamps `reversed_at`.

use super::GraphStore;
use crate::enforcement::{ActionRecord, EnforcementLevel};
use crate::error::FraudResult;
use crate::types::{from_unix, to_unix, Timestamp};
use rusqlite::params;

type ActionRow = (i64, String, String, String, String, i64, Option<i64>, Option<i64>);

const ACTION_COLUMNS: &str =
    "action_id, user_id, level, reason_code, reason_text, applied_at, expires_at, reversed_at";

fn map_action_row(row: &rusqlite::Row) -> rusqlite::Result<ActionRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn decode_action(raw: ActionRow) -> FraudResult<ActionRecord> {
    let (action_id, user_id, level, reason_code, reason_text, applied_at, expires_at, reversed_at) =
        raw;
    Ok(ActionRecord {
        action_id,
        user_id,
        level: EnforcementLevel::parse(&level)?,
        reason_code,
        reason_text,
        applied_at: from_unix(applied_at),
        expires_at: expires_at.map(from_unix),
        reversed_at: reversed_at.map(from_unix),
    })
}

impl GraphStore {
    /// The single action currently restricting this account, if any.
    pub fn active_action(
        &self,
        user_id: &str,
        now: Timestamp,
    ) -> FraudResult<Option<ActionRecord>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {ACTION_COLUMNS} FROM enforcement_action
             WHERE user_id = ?1
               AND reversed_at IS NULL
               AND deescalated = 0
               AND (expires_at IS NULL OR expires_at > ?2)
             ORDER BY applied_at DESC, action_id DESC LIMIT 1"
        ))?;
        let mut rows = stmt.query_map(params![user_id, to_unix(now)], map_action_row)?;
        match rows.next() {
            Some(row) => Ok(Some(decode_action(row?)?)),
            None => Ok(None),
        }
    }

    pub fn insert_action(
        &self,
        user_id: &str,
        level: EnforcementLevel,
        reason_code: &str,
        reason_text: &str,
        applied_at: Timestamp,
        expires_at: Option<Timestamp>,
    ) -> FraudResult<()> {
        self.conn().execute(
            "INSERT INTO enforcement_action
                (user_id, level, reason_code, reason_text, applied_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id,
                level.as_str(),
                reason_code,
                reason_text,
                to_unix(applied_at),
                expires_at.map(to_unix),
            ],
        )?;
        Ok(())
    }

    /// Re-detection at the active level: push the expiry out, nothing else.
    pub fn refresh_action_expiry(
        &self,
        action_id: i64,
        expires_at: Option<Timestamp>,
    ) -> FraudResult<()> {
        self.conn().execute(
            "UPDATE enforcement_action SET expires_at = ?2 WHERE action_id = ?1",
            params![action_id, expires_at.map(to_unix)],
        )?;
        Ok(())
    }

    /// Raise the active action to a stricter level in place.
    pub fn escalate_action(
        &self,
        action_id: i64,
        level: EnforcementLevel,
        reason_code: &str,
        reason_text: &str,
        applied_at: Timestamp,
        expires_at: Option<Timestamp>,
    ) -> FraudResult<()> {
        self.conn().execute(
            "UPDATE enforcement_action SET
                level = ?2, reason_code = ?3, reason_text = ?4,
                applied_at = ?5, expires_at = ?6
             WHERE action_id = ?1",
            params![
                action_id,
                level.as_str(),
                reason_code,
                reason_text,
                to_unix(applied_at),
                expires_at.map(to_unix),
            ],
        )?;
        Ok(())
    }

    /// Expired actions the sweep has not yet stepped down, oldest first.
    pub fn expired_unprocessed_actions(&self, now: Timestamp) -> FraudResult<Vec<ActionRecord>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {ACTION_COLUMNS} FROM enforcement_action
             WHERE reversed_at IS NULL
               AND deescalated = 0
               AND expires_at IS NOT NULL
               AND expires_at <= ?1
             ORDER BY expires_at, user_id"
        ))?;
        let rows = stmt.query_map(params![to_unix(now)], map_action_row)?;
        let mut actions = Vec::new();
        for row in rows {
            actions.push(decode_action(row?)?);
        }
        Ok(actions)
    }

    /// Retire an expired action and insert its step-down successor in one
    /// transaction. A torn state (retired action, no successor) must never
    /// be observable.
    #[allow(clippy::too_many_arguments)]
    pub fn step_down_action(
        &self,
        action_id: i64,
        user_id: &str,
        to: EnforcementLevel,
        reason_code: &str,
        reason_text: &str,
        applied_at: Timestamp,
        expires_at: Option<Timestamp>,
    ) -> FraudResult<()> {
        let tx = self.conn().unchecked_transaction()?;
        tx.execute(
            "UPDATE enforcement_action SET deescalated = 1 WHERE action_id = ?1",
            params![action_id],
        )?;
        if to != EnforcementLevel::None {
            tx.execute(
                "INSERT INTO enforcement_action
                    (user_id, level, reason_code, reason_text, applied_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user_id,
                    to.as_str(),
                    reason_code,
                    reason_text,
                    to_unix(applied_at),
                    expires_at.map(to_unix),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Human reversal: stamp every unretired action for this account.
    /// Expired-but-unswept rows are included so a later sweep cannot step
    /// down a user a human already cleared. Returns the number of actions
    /// reversed.
    pub fn reverse_active_actions(&self, user_id: &str, now: Timestamp) -> FraudResult<usize> {
        let reversed = self.conn().execute(
            "UPDATE enforcement_action SET reversed_at = ?2
             WHERE user_id = ?1
               AND reversed_at IS NULL
               AND deescalated = 0",
            params![user_id, to_unix(now)],
        )?;
        Ok(reversed)
    }

    /// Full action history for one account, oldest first.
    pub fn actions_for_user(&self, user_id: &str) -> FraudResult<Vec<ActionRecord>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {ACTION_COLUMNS} FROM enforcement_action
             WHERE user_id = ?1 ORDER BY action_id"
        ))?;
        let rows = stmt.query_map(params![user_id], map_action_row)?;
        let mut actions = Vec::new();
        for row in rows {
            actions.push(decode_action(row?)?);
        }
        Ok(actions)
    }
}
