//! Moderation case management — the single boundary to human review.
//!
//! One open case per unresolved cluster signature. Re-detection refreshes
//! the open case instead of duplicating it. Resolution is the only path
//! that reverses enforcement before natural expiry.

use crate::cluster::{signature_hash, ClusterRecord, ClusterStatus};
use crate::enforcement::EnforcementEngine;
use crate::error::{FraudError, FraudResult};
use crate::risk::RiskLevel;
use crate::signal::{EdgeType, Signal, SignalIngestor};
use crate::store::GraphStore;
use crate::types::{CaseId, ClusterId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasePriority {
    Low,
    Medium,
    High,
    Critical,
}

impl CasePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> FraudResult<Self> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(FraudError::Configuration(format!(
                "unknown case priority '{other}'"
            ))),
        }
    }

    pub fn from_band(band: RiskLevel) -> Self {
        match band {
            RiskLevel::None | RiskLevel::Low => Self::Low,
            RiskLevel::Medium => Self::Medium,
            RiskLevel::High => Self::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Open,
    UnderReview,
    Resolved,
    Escalated,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::UnderReview => "under_review",
            Self::Resolved => "resolved",
            Self::Escalated => "escalated",
        }
    }

    pub fn parse(s: &str) -> FraudResult<Self> {
        match s {
            "open" => Ok(Self::Open),
            "under_review" => Ok(Self::UnderReview),
            "resolved" => Ok(Self::Resolved),
            "escalated" => Ok(Self::Escalated),
            other => Err(FraudError::Configuration(format!(
                "unknown case status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseResolution {
    Confirmed,
    FalsePositive,
}

impl CaseResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::FalsePositive => "false_positive",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaseRecord {
    pub case_id: CaseId,
    pub case_type: String,
    pub signature: String,
    pub cluster_id: ClusterId,
    pub linked_user_ids: Vec<UserId>,
    pub priority: CasePriority,
    pub status: CaseStatus,
    pub evidence_summary: String,
    pub opened_at: Timestamp,
    pub resolved_at: Option<Timestamp>,
    pub resolution: Option<CaseResolution>,
}

#[derive(Debug, Clone)]
pub enum CaseOutcome {
    Opened(CaseRecord),
    Refreshed(CaseId),
}

pub struct CaseManager<'a> {
    store: &'a GraphStore,
}

impl<'a> CaseManager<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        Self { store }
    }

    /// Open a case for a detected cluster, or refresh the one already open
    /// for the same membership signature.
    pub fn open_or_refresh(
        &self,
        cluster: &ClusterRecord,
        now: Timestamp,
    ) -> FraudResult<CaseOutcome> {
        let recidivist = self.store.any_user_previously_confirmed(&cluster.members)?;
        let mut priority = CasePriority::from_band(cluster.risk_level);
        if recidivist {
            priority = CasePriority::Critical;
        }

        let evidence = cluster.signals.join("; ");

        if let Some(open) = self.store.open_case_by_signature(&cluster.signature)? {
            let raised = priority.max(open.priority);
            self.store
                .refresh_case(&open.case_id, raised, &cluster.cluster_id, &evidence)?;
            return Ok(CaseOutcome::Refreshed(open.case_id));
        }

        let prior = self.store.case_count_for_signature(&cluster.signature)?;
        let case_id = format!(
            "case-{:016x}-{prior}",
            signature_hash(&cluster.signature)
        );
        let record = CaseRecord {
            case_id,
            case_type: cluster.detector.case_type().to_string(),
            signature: cluster.signature.clone(),
            cluster_id: cluster.cluster_id.clone(),
            linked_user_ids: cluster.members.clone(),
            priority,
            status: CaseStatus::Open,
            evidence_summary: evidence,
            opened_at: now,
            resolved_at: None,
            resolution: None,
        };
        self.store.insert_case(&record)?;
        Ok(CaseOutcome::Opened(record))
    }

    /// Move a case into human review. Also marks the linked cluster.
    pub fn begin_review(&self, case_id: &str) -> FraudResult<()> {
        let case = self.store.get_case(case_id)?;
        self.store
            .set_case_status(case_id, CaseStatus::UnderReview)?;
        self.store
            .set_cluster_status(&case.cluster_id, ClusterStatus::UnderReview)?;
        Ok(())
    }

    /// Record a human resolution.
    ///
    /// FalsePositive reverses every active enforcement action on the
    /// linked users; Confirmed keeps restrictions in place, feeds future
    /// recidivism checks, and strengthens the graph with enforcement
    /// edges between the confirmed members. Returns the users whose
    /// restrictions were reversed.
    pub fn resolve(
        &self,
        case_id: &str,
        resolution: CaseResolution,
        engine: &EnforcementEngine,
        now: Timestamp,
    ) -> FraudResult<Vec<UserId>> {
        let case = self.store.get_case(case_id)?;
        self.store.resolve_case(case_id, resolution, now)?;

        let cluster_status = match resolution {
            CaseResolution::Confirmed => ClusterStatus::Confirmed,
            CaseResolution::FalsePositive => ClusterStatus::FalsePositive,
        };
        self.store
            .set_cluster_status(&case.cluster_id, cluster_status)?;

        match resolution {
            CaseResolution::FalsePositive => {
                engine.reverse_for_users(&case.linked_user_ids, now)
            }
            CaseResolution::Confirmed => {
                let ingestor = SignalIngestor::new(self.store);
                for (i, a) in case.linked_user_ids.iter().enumerate() {
                    for b in case.linked_user_ids.iter().skip(i + 1) {
                        let signal = Signal {
                            edge_type: EdgeType::Enforcement,
                            user_a: a.clone(),
                            user_b: b.clone(),
                            strength: 1.0,
                            observed_at: now,
                            metadata: serde_json::json!({ "case_id": case_id }),
                        };
                        if let Err(e) = ingestor.record_signal(&signal) {
                            log::warn!("enforcement edge dropped: {e}");
                        }
                    }
                }
                Ok(Vec::new())
            }
        }
    }
}
