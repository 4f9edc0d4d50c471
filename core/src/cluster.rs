//! Shared cluster shape for both detectors.

use crate::error::{FraudError, FraudResult};
use crate::risk::RiskLevel;
use crate::types::{ClusterId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detector {
    Ring,
    Spam,
}

impl Detector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ring => "ring",
            Self::Spam => "spam",
        }
    }

    pub fn parse(s: &str) -> FraudResult<Self> {
        match s {
            "ring" => Ok(Self::Ring),
            "spam" => Ok(Self::Spam),
            other => Err(FraudError::Configuration(format!(
                "unknown detector '{other}'"
            ))),
        }
    }

    pub fn case_type(&self) -> &'static str {
        match self {
            Self::Ring => "collusion_ring",
            Self::Spam => "spam_cluster",
        }
    }
}

/// Review lifecycle. Transitions only happen through the case manager;
/// detection runs never edit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterStatus {
    Detected,
    UnderReview,
    Confirmed,
    FalsePositive,
}

impl ClusterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detected => "detected",
            Self::UnderReview => "under_review",
            Self::Confirmed => "confirmed",
            Self::FalsePositive => "false_positive",
        }
    }

    pub fn parse(s: &str) -> FraudResult<Self> {
        match s {
            "detected" => Ok(Self::Detected),
            "under_review" => Ok(Self::UnderReview),
            "confirmed" => Ok(Self::Confirmed),
            "false_positive" => Ok(Self::FalsePositive),
            other => Err(FraudError::Configuration(format!(
                "unknown cluster status '{other}'"
            ))),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Confirmed | Self::FalsePositive)
    }
}

/// Output of one detector for one candidate group, before persistence.
#[derive(Debug, Clone)]
pub struct Detection {
    pub detector: Detector,
    /// Sorted, deduplicated member IDs. Derived, never hand-edited.
    pub members: Vec<UserId>,
    pub probability: f64,
    pub risk_level: RiskLevel,
    pub characteristics: serde_json::Value,
    /// Ordered human-readable evidence lines.
    pub signals: Vec<String>,
}

impl Detection {
    pub fn signature(&self) -> String {
        signature(&self.members)
    }
}

/// A persisted cluster row.
#[derive(Debug, Clone)]
pub struct ClusterRecord {
    pub cluster_id: ClusterId,
    pub detector: Detector,
    pub signature: String,
    pub members: Vec<UserId>,
    pub probability: f64,
    pub risk_level: RiskLevel,
    pub status: ClusterStatus,
    pub characteristics: serde_json::Value,
    pub signals: Vec<String>,
    pub detected_at: Timestamp,
    pub last_detected_at: Timestamp,
    pub supersedes: Option<ClusterId>,
}

/// Stable membership signature: sorted member IDs, joined.
/// Identical membership always produces an identical signature, regardless
/// of discovery order.
pub fn signature(members: &[UserId]) -> String {
    let mut sorted: Vec<&str> = members.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join(":")
}

/// FNV-1a over the signature, for compact content-derived IDs.
pub fn signature_hash(signature: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in signature.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Content-derived cluster ID: detector, signature hash, generation.
/// Re-detection of unchanged membership reuses generation 0's row; any
/// change mints the next generation with a `supersedes` cross-reference.
pub fn cluster_id(detector: Detector, signature: &str, generation: i64) -> ClusterId {
    format!(
        "{}-{:016x}-g{}",
        detector.as_str(),
        signature_hash(signature),
        generation
    )
}
