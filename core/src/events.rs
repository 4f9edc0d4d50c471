//! Engine events and the collaborator output boundary.
//!
//! Every pipeline phase appends its events to the `event_log` table, so a
//! run can be audited or replayed after the fact. Downstream collaborators
//! (notification delivery, moderator review queue) plug in through
//! `CollaboratorHooks`.

use crate::case_manager::CasePriority;
use crate::cluster::Detector;
use crate::enforcement::EnforcementLevel;
use crate::risk::RiskLevel;
use crate::types::{CaseId, ClusterId, RunId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    PipelineStarted {
        run_id: RunId,
        at: Timestamp,
    },
    EdgesDecayed {
        updated: u64,
        removed: u64,
    },
    DecayFailed {
        error: String,
    },
    ClusterDetected {
        cluster_id: ClusterId,
        detector: Detector,
        members: Vec<UserId>,
        probability: f64,
        risk_level: RiskLevel,
    },
    ClusterRefreshed {
        cluster_id: ClusterId,
    },
    DetectorFailed {
        detector: String,
        error: String,
    },
    EnforcementApplied {
        user_id: UserId,
        level: EnforcementLevel,
        reason: String,
        expires_at: Option<Timestamp>,
    },
    EnforcementExpired {
        user_id: UserId,
        from_level: EnforcementLevel,
        to_level: EnforcementLevel,
    },
    EnforcementFailed {
        user_id: UserId,
        error: String,
    },
    CaseCreated {
        case_id: CaseId,
        cluster_id: ClusterId,
        priority: CasePriority,
    },
    PipelineCompleted {
        run_id: RunId,
        at: Timestamp,
    },
}

/// Stable string name for the event_type column.
pub fn event_type_name(event: &EngineEvent) -> &'static str {
    match event {
        EngineEvent::PipelineStarted { .. } => "pipeline_started",
        EngineEvent::EdgesDecayed { .. } => "edges_decayed",
        EngineEvent::DecayFailed { .. } => "decay_failed",
        EngineEvent::ClusterDetected { .. } => "cluster_detected",
        EngineEvent::ClusterRefreshed { .. } => "cluster_refreshed",
        EngineEvent::DetectorFailed { .. } => "detector_failed",
        EngineEvent::EnforcementApplied { .. } => "enforcement_applied",
        EngineEvent::EnforcementExpired { .. } => "enforcement_expired",
        EngineEvent::EnforcementFailed { .. } => "enforcement_failed",
        EngineEvent::CaseCreated { .. } => "case_created",
        EngineEvent::PipelineCompleted { .. } => "pipeline_completed",
    }
}

/// Output interface toward external collaborators.
///
/// Default implementations are no-ops; integrators override what they
/// consume. The methods are infallible: a collaborator that can fail must
/// handle that internally, it cannot stall the batch.
pub trait CollaboratorHooks {
    fn on_enforcement_applied(
        &mut self,
        _user_id: &str,
        _level: EnforcementLevel,
        _reason: &str,
        _expires_at: Option<Timestamp>,
    ) {
    }

    fn on_case_created(
        &mut self,
        _case_id: &str,
        _cluster_id: &str,
        _priority: CasePriority,
        _evidence_summary: &str,
    ) {
    }
}

/// Hooks that do nothing. Used when no collaborator is attached.
pub struct NullHooks;

impl CollaboratorHooks for NullHooks {}
