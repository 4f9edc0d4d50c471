//! Account profile access for the spam detector.

use super::GraphStore;
use crate::error::FraudResult;
use crate::signal::AccountProfile;
use crate::types::{from_unix, to_unix};
use rusqlite::params;

impl GraphStore {
    pub fn upsert_profile(&self, profile: &AccountProfile) -> FraudResult<()> {
        self.conn().execute(
            "INSERT INTO account_profile
                (user_id, created_at, bio, display_name,
                 outbound_message_count, inbound_reply_count, kyc_started)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (user_id) DO UPDATE SET
                created_at = excluded.created_at,
                bio = excluded.bio,
                display_name = excluded.display_name,
                outbound_message_count = excluded.outbound_message_count,
                inbound_reply_count = excluded.inbound_reply_count,
                kyc_started = excluded.kyc_started",
            params![
                profile.user_id,
                to_unix(profile.created_at),
                profile.bio,
                profile.display_name,
                profile.outbound_message_count,
                profile.inbound_reply_count,
                profile.kyc_started as i64,
            ],
        )?;
        Ok(())
    }

    /// Every known profile, in stable user_id order.
    pub fn all_profiles(&self) -> FraudResult<Vec<AccountProfile>> {
        let mut stmt = self.conn().prepare(
            "SELECT user_id, created_at, bio, display_name,
                    outbound_message_count, inbound_reply_count, kyc_started
             FROM account_profile ORDER BY user_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(AccountProfile {
                user_id: row.get(0)?,
                created_at: from_unix(row.get(1)?),
                bio: row.get(2)?,
                display_name: row.get(3)?,
                outbound_message_count: row.get(4)?,
                inbound_reply_count: row.get(5)?,
                kyc_started: row.get::<_, i64>(6)? != 0,
            })
        })?;
        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row?);
        }
        Ok(profiles)
    }
}
