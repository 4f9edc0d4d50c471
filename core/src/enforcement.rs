//! Graduated, reversible enforcement.
//!
//! One state machine per account, keyed by the highest active risk band
//! across every cluster the account belongs to. Enforcement only gates
//! future earning and visibility — there is no code path from this module
//! (or anywhere in the engine) that writes to the settled ledger.

use crate::config::EnforcementConfig;
use crate::error::FraudResult;
use crate::risk::RiskLevel;
use crate::store::GraphStore;
use crate::types::{Timestamp, UserId};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Restriction levels, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementLevel {
    /// No restriction.
    None,
    /// Reduced discovery ranking only.
    VisibilityReduced,
    /// Reduced discovery plus suspension of new monetizable actions.
    MonetizationThrottled,
    /// Hidden from discovery, monetization blocked, pending human review.
    ManualReviewRequired,
}

impl EnforcementLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::VisibilityReduced => "visibility_reduced",
            Self::MonetizationThrottled => "monetization_throttled",
            Self::ManualReviewRequired => "manual_review_required",
        }
    }

    pub fn parse(s: &str) -> FraudResult<Self> {
        match s {
            "none" => Ok(Self::None),
            "visibility_reduced" => Ok(Self::VisibilityReduced),
            "monetization_throttled" => Ok(Self::MonetizationThrottled),
            "manual_review_required" => Ok(Self::ManualReviewRequired),
            other => Err(crate::error::FraudError::Configuration(format!(
                "unknown enforcement level '{other}'"
            ))),
        }
    }

    /// Risk band to restriction level. High risk always lands in manual
    /// review; there is no automatic path back from it.
    pub fn for_band(band: RiskLevel) -> Self {
        match band {
            RiskLevel::None => Self::None,
            RiskLevel::Low => Self::VisibilityReduced,
            RiskLevel::Medium => Self::MonetizationThrottled,
            RiskLevel::High => Self::ManualReviewRequired,
        }
    }

    /// Graduated de-escalation: expiry reverts one step, never straight
    /// to None from an elevated level.
    pub fn step_down(&self) -> Self {
        match self {
            Self::None | Self::VisibilityReduced => Self::None,
            Self::MonetizationThrottled => Self::VisibilityReduced,
            Self::ManualReviewRequired => Self::MonetizationThrottled,
        }
    }

    /// Expiry window for this level. ManualReviewRequired has none: it
    /// ends only through human resolution.
    pub fn expiry_from(&self, now: Timestamp, config: &EnforcementConfig) -> Option<Timestamp> {
        match self {
            Self::None | Self::ManualReviewRequired => None,
            Self::VisibilityReduced => {
                Some(now + Duration::hours(config.visibility_reduced_hours))
            }
            Self::MonetizationThrottled => {
                Some(now + Duration::hours(config.monetization_throttled_hours))
            }
        }
    }
}

/// A persisted enforcement action row.
#[derive(Debug, Clone)]
pub struct ActionRecord {
    pub action_id: i64,
    pub user_id: UserId,
    pub level: EnforcementLevel,
    pub reason_code: String,
    pub reason_text: String,
    pub applied_at: Timestamp,
    pub expires_at: Option<Timestamp>,
    pub reversed_at: Option<Timestamp>,
}

/// Result of applying a target level to one account.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// Nothing to do: target was None, or a stricter action is active.
    Unchanged,
    /// A new or escalated restriction took effect.
    Applied {
        level: EnforcementLevel,
        expires_at: Option<Timestamp>,
    },
    /// Same level was already active; expiry refreshed, nothing stacked.
    Refreshed {
        level: EnforcementLevel,
        expires_at: Option<Timestamp>,
    },
}

/// One step-down produced by the expiry sweep.
#[derive(Debug, Clone)]
pub struct Deescalation {
    pub user_id: UserId,
    pub from: EnforcementLevel,
    pub to: EnforcementLevel,
    pub expires_at: Option<Timestamp>,
}

pub struct EnforcementEngine<'a> {
    store: &'a GraphStore,
    config: &'a EnforcementConfig,
}

impl<'a> EnforcementEngine<'a> {
    pub fn new(store: &'a GraphStore, config: &'a EnforcementConfig) -> Self {
        Self { store, config }
    }

    /// Apply the restriction implied by `band` to one account.
    ///
    /// Idempotent: re-applying the active level refreshes its expiry and
    /// never creates a second concurrent action. A weaker detection never
    /// lowers an active restriction — only expiry or human reversal does.
    pub fn apply(
        &self,
        user_id: &str,
        band: RiskLevel,
        reason_code: &str,
        reason_text: &str,
        now: Timestamp,
    ) -> FraudResult<ApplyOutcome> {
        let target = EnforcementLevel::for_band(band);
        if target == EnforcementLevel::None {
            return Ok(ApplyOutcome::Unchanged);
        }

        let expires_at = target.expiry_from(now, self.config);
        match self.store.active_action(user_id, now)? {
            Some(active) if active.level == target => {
                self.store.refresh_action_expiry(active.action_id, expires_at)?;
                Ok(ApplyOutcome::Refreshed {
                    level: target,
                    expires_at,
                })
            }
            Some(active) if active.level > target => Ok(ApplyOutcome::Unchanged),
            Some(active) => {
                // Escalate in place: one active action per account.
                self.store.escalate_action(
                    active.action_id,
                    target,
                    reason_code,
                    reason_text,
                    now,
                    expires_at,
                )?;
                Ok(ApplyOutcome::Applied {
                    level: target,
                    expires_at,
                })
            }
            None => {
                self.store.insert_action(
                    user_id, target, reason_code, reason_text, now, expires_at,
                )?;
                Ok(ApplyOutcome::Applied {
                    level: target,
                    expires_at,
                })
            }
        }
    }

    /// Sweep expired actions, stepping each affected account down one
    /// level. An expired VisibilityReduced ends at None; an expired
    /// MonetizationThrottled becomes a fresh VisibilityReduced window.
    pub fn expire_pass(&self, now: Timestamp) -> FraudResult<Vec<Deescalation>> {
        let mut deescalations = Vec::new();
        for action in self.store.expired_unprocessed_actions(now)? {
            let to = action.level.step_down();
            let expires_at = to.expiry_from(now, self.config);
            self.store.step_down_action(
                action.action_id,
                &action.user_id,
                to,
                "expiry_step_down",
                "automatic de-escalation after expiry with no new detection",
                now,
                expires_at,
            )?;
            deescalations.push(Deescalation {
                user_id: action.user_id,
                from: action.level,
                to,
                expires_at,
            });
        }
        Ok(deescalations)
    }

    /// Reverse every active action for the given users. Only the case
    /// manager calls this — human resolution is the single path that ends
    /// a restriction before its natural expiry.
    pub fn reverse_for_users(
        &self,
        users: &[UserId],
        now: Timestamp,
    ) -> FraudResult<Vec<UserId>> {
        let mut reversed = Vec::new();
        for user in users {
            if self.store.reverse_active_actions(user, now)? > 0 {
                reversed.push(user.clone());
            }
        }
        Ok(reversed)
    }

    /// Current effective restriction for an account.
    pub fn active_level(&self, user_id: &str, now: Timestamp) -> FraudResult<EnforcementLevel> {
        Ok(self
            .store
            .active_action(user_id, now)?
            .map(|a| a.level)
            .unwrap_or(EnforcementLevel::None))
    }
}
