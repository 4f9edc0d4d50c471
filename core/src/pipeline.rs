//! Batch detection pipeline.
//!
//! One `run()` executes the fixed phase order:
//!
//!   1. edge decay
//!   2. graph snapshot
//!   3. ring detection
//!   4. spam cluster detection
//!   5. cluster persistence
//!   6. enforcement (expiry sweep, then application)
//!   7. case management
//!
//! Detection sees the decayed graph, enforcement sees today's clusters,
//! cases see today's enforcement. Detector and per-user enforcement
//! failures are isolated and logged; storage failures outside those
//! boundaries abort the run.

use crate::case_manager::{CaseManager, CaseOutcome};
use crate::cluster::{cluster_id, ClusterRecord, ClusterStatus, Detection};
use crate::config::EngineConfig;
use crate::enforcement::{ApplyOutcome, EnforcementEngine};
use crate::error::{FraudError, FraudResult};
use crate::events::{CollaboratorHooks, EngineEvent, NullHooks};
use crate::graph::GraphSnapshot;
use crate::ring_detector::detect_rings;
use crate::risk::RiskLevel;
use crate::spam_detector::detect_spam_clusters;
use crate::store::GraphStore;
use crate::types::{RunId, Timestamp, UserId};
use std::collections::BTreeMap;

/// Counters for one completed pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub run_id: RunId,
    pub edges_decayed: u64,
    pub edges_removed: u64,
    pub rings_found: u64,
    pub spam_clusters_found: u64,
    pub clusters_refreshed: u64,
    pub enforcement_applied: u64,
    pub enforcement_expired: u64,
    pub cases_opened: u64,
    pub cases_refreshed: u64,
}

pub struct FraudPipeline {
    pub store: GraphStore,
    config: EngineConfig,
    hooks: Box<dyn CollaboratorHooks>,
}

impl FraudPipeline {
    /// Build a pipeline over an already-migrated store. Config validation
    /// is fatal here: a pipeline never runs on bad weights or bands.
    pub fn new(store: GraphStore, config: EngineConfig) -> FraudResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            hooks: Box::new(NullHooks),
        })
    }

    pub fn with_hooks(mut self, hooks: Box<dyn CollaboratorHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute one full pass at logical time `now`.
    pub fn run(&mut self, now: Timestamp) -> FraudResult<PipelineReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut report = PipelineReport {
            run_id: run_id.clone(),
            ..PipelineReport::default()
        };
        self.store.insert_pipeline_run(&run_id, now)?;
        self.store.append_event(
            &run_id,
            "start",
            &EngineEvent::PipelineStarted {
                run_id: run_id.clone(),
                at: now,
            },
            now,
        )?;
        log::info!("pipeline {run_id} started");

        // Phase 1: decay. A failed decay pass is logged and skipped; the
        // detectors then run over yesterday's weights.
        match self.store.decay_edges(
            now,
            self.config.decay.period_days * 86_400,
            self.config.decay.rate_per_period,
            self.config.decay.weight_floor,
        ) {
            Ok((updated, removed)) => {
                report.edges_decayed = updated;
                report.edges_removed = removed;
                self.store.append_event(
                    &run_id,
                    "decay",
                    &EngineEvent::EdgesDecayed { updated, removed },
                    now,
                )?;
            }
            Err(e) => {
                log::error!("decay pass failed: {e}");
                self.store.append_event(
                    &run_id,
                    "decay",
                    &EngineEvent::DecayFailed {
                        error: e.to_string(),
                    },
                    now,
                )?;
            }
        }

        // Phase 2: snapshot. Both detectors see this one frozen graph.
        let graph = GraphSnapshot::new(self.store.snapshot_edges()?);

        // Phases 3 and 4: detectors, each isolated. One broken detector
        // never blocks the other.
        let rings = self.run_detector(&run_id, "ring", now, || {
            detect_rings(&graph, &self.config.ring, &self.config.bands)
        })?;
        report.rings_found = rings.len() as u64;

        let spam = self.run_detector(&run_id, "spam", now, || {
            let accounts = self.store.all_profiles()?;
            detect_spam_clusters(&accounts, &graph, &self.config.spam, &self.config.bands)
        })?;
        report.spam_clusters_found = spam.len() as u64;

        // Phase 5: persistence. Unchanged re-detections refresh in place;
        // changed ones mint the next generation.
        let mut persisted = Vec::new();
        for detection in rings.into_iter().chain(spam) {
            match self.persist_detection(&run_id, detection, now)? {
                Persisted::New(record) => persisted.push(record),
                Persisted::Refreshed(record) => {
                    report.clusters_refreshed += 1;
                    persisted.push(record);
                }
                Persisted::Suppressed => {}
            }
        }

        // Phase 6: enforcement. Expiry sweep first, so an account both
        // expiring and re-detected today lands on the re-detection.
        let engine = EnforcementEngine::new(&self.store, &self.config.enforcement);
        for d in engine.expire_pass(now)? {
            report.enforcement_expired += 1;
            self.store.append_event(
                &run_id,
                "enforcement",
                &EngineEvent::EnforcementExpired {
                    user_id: d.user_id,
                    from_level: d.from,
                    to_level: d.to,
                },
                now,
            )?;
        }

        for (user_id, (band, reason_code, reason_text)) in user_targets(&persisted) {
            match engine.apply(&user_id, band, &reason_code, &reason_text, now) {
                Ok(ApplyOutcome::Unchanged) => {}
                Ok(ApplyOutcome::Applied { level, expires_at })
                | Ok(ApplyOutcome::Refreshed { level, expires_at }) => {
                    report.enforcement_applied += 1;
                    self.hooks
                        .on_enforcement_applied(&user_id, level, &reason_code, expires_at);
                    self.store.append_event(
                        &run_id,
                        "enforcement",
                        &EngineEvent::EnforcementApplied {
                            user_id,
                            level,
                            reason: reason_code,
                            expires_at,
                        },
                        now,
                    )?;
                }
                Err(e) => {
                    // Fail-isolated per account: the rest of the batch
                    // still gets enforced.
                    let wrapped = FraudError::EnforcementApplication {
                        user: user_id.clone(),
                        source: Box::new(e),
                    };
                    log::error!("{wrapped}");
                    self.store.append_event(
                        &run_id,
                        "enforcement",
                        &EngineEvent::EnforcementFailed {
                            user_id,
                            error: wrapped.to_string(),
                        },
                        now,
                    )?;
                }
            }
        }

        // Phase 7: cases.
        let cases = CaseManager::new(&self.store);
        for cluster in &persisted {
            match cases.open_or_refresh(cluster, now)? {
                CaseOutcome::Opened(case) => {
                    report.cases_opened += 1;
                    self.hooks.on_case_created(
                        &case.case_id,
                        &case.cluster_id,
                        case.priority,
                        &case.evidence_summary,
                    );
                    self.store.append_event(
                        &run_id,
                        "cases",
                        &EngineEvent::CaseCreated {
                            case_id: case.case_id,
                            cluster_id: case.cluster_id,
                            priority: case.priority,
                        },
                        now,
                    )?;
                }
                CaseOutcome::Refreshed(case_id) => {
                    report.cases_refreshed += 1;
                    log::debug!("case {case_id} refreshed");
                }
            }
        }

        self.store.finish_pipeline_run(
            &run_id,
            now,
            report.edges_decayed,
            report.edges_removed,
            report.rings_found,
            report.spam_clusters_found,
            report.enforcement_applied,
            report.enforcement_expired,
            report.cases_opened,
        )?;
        self.store.append_event(
            &run_id,
            "finish",
            &EngineEvent::PipelineCompleted {
                run_id: run_id.clone(),
                at: now,
            },
            now,
        )?;
        log::info!(
            "pipeline {run_id} completed: {} rings, {} spam clusters, {} enforcement actions, {} cases",
            report.rings_found,
            report.spam_clusters_found,
            report.enforcement_applied,
            report.cases_opened
        );
        Ok(report)
    }

    fn run_detector(
        &self,
        run_id: &str,
        name: &str,
        now: Timestamp,
        detect: impl FnOnce() -> FraudResult<Vec<Detection>>,
    ) -> FraudResult<Vec<Detection>> {
        match detect() {
            Ok(detections) => Ok(detections),
            Err(e) => {
                log::error!("{name} detector failed: {e}");
                self.store.append_event(
                    run_id,
                    name,
                    &EngineEvent::DetectorFailed {
                        detector: name.to_string(),
                        error: e.to_string(),
                    },
                    now,
                )?;
                Ok(Vec::new())
            }
        }
    }

    fn persist_detection(
        &self,
        run_id: &str,
        detection: Detection,
        now: Timestamp,
    ) -> FraudResult<Persisted> {
        let signature = detection.signature();
        let existing = self.store.latest_cluster_by_signature(&signature)?;

        if let Some(prior) = &existing {
            let same_evidence = prior.members == detection.members
                && prior.risk_level == detection.risk_level
                && (prior.probability - detection.probability).abs() < 1e-9;

            // A human already ruled this exact detection a false positive.
            // Until the evidence changes, re-detection stays silent instead
            // of re-enforcing a cleared group every run.
            if prior.status == ClusterStatus::FalsePositive && same_evidence {
                log::debug!(
                    "cluster {} suppressed: resolved false positive, evidence unchanged",
                    prior.cluster_id
                );
                return Ok(Persisted::Suppressed);
            }

            let unchanged = !prior.status.is_resolved() && same_evidence;
            if unchanged {
                self.store.touch_cluster(&prior.cluster_id, now)?;
                self.store.append_event(
                    run_id,
                    "persist",
                    &EngineEvent::ClusterRefreshed {
                        cluster_id: prior.cluster_id.clone(),
                    },
                    now,
                )?;
                let mut record = prior.clone();
                record.last_detected_at = now;
                return Ok(Persisted::Refreshed(record));
            }
        }

        let generation = self.store.cluster_generation_count(&signature)?;
        let record = ClusterRecord {
            cluster_id: cluster_id(detection.detector, &signature, generation),
            detector: detection.detector,
            signature,
            members: detection.members,
            probability: detection.probability,
            risk_level: detection.risk_level,
            status: ClusterStatus::Detected,
            characteristics: detection.characteristics,
            signals: detection.signals,
            detected_at: now,
            last_detected_at: now,
            supersedes: existing.map(|prior| prior.cluster_id),
        };
        self.store.insert_cluster(&record)?;
        self.store.append_event(
            run_id,
            "persist",
            &EngineEvent::ClusterDetected {
                cluster_id: record.cluster_id.clone(),
                detector: record.detector,
                members: record.members.clone(),
                probability: record.probability,
                risk_level: record.risk_level,
            },
            now,
        )?;
        Ok(Persisted::New(record))
    }
}

enum Persisted {
    New(ClusterRecord),
    Refreshed(ClusterRecord),
    Suppressed,
}

/// Highest risk band per member across today's clusters, with the cluster
/// that set it. BTreeMap keeps enforcement order stable across runs.
fn user_targets(
    clusters: &[ClusterRecord],
) -> BTreeMap<UserId, (RiskLevel, String, String)> {
    let mut targets: BTreeMap<UserId, (RiskLevel, String, String)> = BTreeMap::new();
    for cluster in clusters {
        let reason_code = cluster.detector.case_type().to_string();
        let reason_text = format!(
            "member of {} (probability {:.2})",
            cluster.cluster_id, cluster.probability
        );
        for user in &cluster.members {
            match targets.get(user) {
                Some((band, _, _)) if *band >= cluster.risk_level => {}
                _ => {
                    targets.insert(
                        user.clone(),
                        (cluster.risk_level, reason_code.clone(), reason_text.clone()),
                    );
                }
            }
        }
    }
    targets
}
