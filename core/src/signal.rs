//! Signal ingestion boundary.
//!
//! Collaborators (payment system, device-trust system, messaging stats)
//! translate their observations into edge upserts and profile upserts here.
//! Ingestion is fail-isolated per edge: one bad signal never blocks the
//! rest of a batch, and never blocks the detection pipeline.

use crate::error::{FraudError, FraudResult};
use crate::store::GraphStore;
use crate::types::{Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Relationship categories carried by the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Device,
    Network,
    Payment,
    Behavior,
    Social,
    Enforcement,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Network => "network",
            Self::Payment => "payment",
            Self::Behavior => "behavior",
            Self::Social => "social",
            Self::Enforcement => "enforcement",
        }
    }

    pub fn parse(s: &str) -> FraudResult<Self> {
        match s {
            "device" => Ok(Self::Device),
            "network" => Ok(Self::Network),
            "payment" => Ok(Self::Payment),
            "behavior" => Ok(Self::Behavior),
            "social" => Ok(Self::Social),
            "enforcement" => Ok(Self::Enforcement),
            other => Err(FraudError::Configuration(format!(
                "unknown edge type '{other}'"
            ))),
        }
    }

    /// Maximum weight an edge of this type may ever reach.
    /// Reinforcement raises weight toward the ceiling, never past it.
    pub fn ceiling(&self) -> f64 {
        match self {
            Self::Device => 1.0,
            Self::Enforcement => 0.9,
            Self::Network => 0.7,
            Self::Payment => 0.9,
            Self::Behavior => 0.9,
            Self::Social => 1.0,
        }
    }

    /// Weight contribution of a single observation.
    ///
    /// Fixed-strength types ignore `strength`; variable types scale it into
    /// their ceiling. SOCIAL strength is the audience-overlap fraction.
    pub fn contribution(&self, strength: f64) -> f64 {
        let s = strength.clamp(0.0, 1.0);
        match self {
            Self::Device => 1.0,
            Self::Enforcement => 0.9,
            Self::Network => 0.7,
            Self::Payment | Self::Behavior => s * 0.9,
            Self::Social => s,
        }
    }
}

/// Order a user pair canonically so reverse observations hit the same edge.
pub fn canonical_pair(user_a: &str, user_b: &str) -> (UserId, UserId) {
    if user_a <= user_b {
        (user_a.to_string(), user_b.to_string())
    } else {
        (user_b.to_string(), user_a.to_string())
    }
}

/// One raw observation from a collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub edge_type: EdgeType,
    pub user_a: UserId,
    pub user_b: UserId,
    pub strength: f64,
    pub observed_at: Timestamp,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Account attributes consumed by the spam cluster detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountProfile {
    pub user_id: UserId,
    pub created_at: Timestamp,
    pub bio: String,
    pub display_name: String,
    pub outbound_message_count: i64,
    pub inbound_reply_count: i64,
    pub kyc_started: bool,
}

pub struct SignalIngestor<'a> {
    store: &'a GraphStore,
}

impl<'a> SignalIngestor<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        Self { store }
    }

    /// Upsert one edge from one observed signal.
    ///
    /// `new_weight = max(existing, contribution)`, clamped to the type
    /// ceiling; `last_reinforced_at` is refreshed to `observed_at`.
    pub fn record_signal(&self, signal: &Signal) -> FraudResult<()> {
        let edge_label = format!(
            "{}:{}<->{}",
            signal.edge_type.as_str(),
            signal.user_a,
            signal.user_b
        );
        if signal.user_a == signal.user_b {
            return Err(FraudError::SignalIngestion {
                edge: edge_label,
                source: Box::new(FraudError::Configuration(
                    "self-edges are not representable".into(),
                )),
            });
        }
        let (a, b) = canonical_pair(&signal.user_a, &signal.user_b);
        let contribution = signal.edge_type.contribution(signal.strength);
        self.store
            .upsert_edge(
                &a,
                &b,
                signal.edge_type,
                contribution,
                signal.edge_type.ceiling(),
                signal.observed_at,
                &signal.metadata,
            )
            .map_err(|e| FraudError::SignalIngestion {
                edge: edge_label,
                source: Box::new(e),
            })
    }

    /// Ingest a batch, isolating failures per edge. Returns the number of
    /// signals accepted; rejects are logged and skipped.
    pub fn record_batch(&self, signals: &[Signal]) -> usize {
        let mut accepted = 0;
        for signal in signals {
            match self.record_signal(signal) {
                Ok(()) => accepted += 1,
                Err(e) => log::warn!("signal dropped: {e}"),
            }
        }
        accepted
    }

    pub fn upsert_profile(&self, profile: &AccountProfile) -> FraudResult<()> {
        self.store.upsert_profile(profile)
    }
}
