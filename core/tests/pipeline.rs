//! End-to-end pipeline tests.

use chrono::{Duration, TimeZone, Utc};
use fraudgraph_core::case_manager::{CaseManager, CaseResolution};
use fraudgraph_core::cluster::signature;
use fraudgraph_core::config::EngineConfig;
use fraudgraph_core::enforcement::{EnforcementEngine, EnforcementLevel};
use fraudgraph_core::events::CollaboratorHooks;
use fraudgraph_core::pipeline::FraudPipeline;
use fraudgraph_core::signal::{AccountProfile, EdgeType, Signal, SignalIngestor};
use fraudgraph_core::store::GraphStore;
use fraudgraph_core::types::Timestamp;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn store() -> GraphStore {
    let store = GraphStore::in_memory().unwrap();
    store.migrate().unwrap();
    store
}

fn t(days: i64) -> Timestamp {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::days(days)
}

/// Three accounts on shared devices routing payments in a closed loop.
fn seed_ring(store: &GraphStore) {
    let ingestor = SignalIngestor::new(store);
    let members = ["r1", "r2", "r3"];
    let mut signals = Vec::new();
    for (i, a) in members.iter().enumerate() {
        for b in members.iter().skip(i + 1) {
            signals.push(Signal {
                edge_type: EdgeType::Device,
                user_a: a.to_string(),
                user_b: b.to_string(),
                strength: 1.0,
                observed_at: t(0),
                metadata: serde_json::Value::Null,
            });
        }
    }
    for i in 0..members.len() {
        signals.push(Signal {
            edge_type: EdgeType::Payment,
            user_a: members[i].to_string(),
            user_b: members[(i + 1) % members.len()].to_string(),
            strength: 0.9,
            observed_at: t(0),
            metadata: serde_json::Value::Null,
        });
    }
    assert_eq!(ingestor.record_batch(&signals), signals.len());
}

fn seed_farm(store: &GraphStore) {
    let ingestor = SignalIngestor::new(store);
    for i in 0..4i64 {
        ingestor
            .upsert_profile(&AccountProfile {
                user_id: format!("farm-{i}"),
                created_at: t(0) + Duration::minutes(15 * i),
                bio: "best crypto deals join my signals channel".to_string(),
                display_name: format!("dealz_{i}"),
                outbound_message_count: 300,
                inbound_reply_count: 1,
                kyc_started: false,
            })
            .unwrap();
    }
}

/// One pass over a seeded ring: detection, enforcement, case.
#[test]
fn ring_flows_through_to_enforcement_and_case() {
    let store = store();
    seed_ring(&store);
    let mut pipeline = FraudPipeline::new(store, EngineConfig::default()).unwrap();

    let report = pipeline.run(t(1)).unwrap();
    assert_eq!(report.rings_found, 1);
    assert_eq!(report.enforcement_applied, 3);
    assert_eq!(report.cases_opened, 1);

    let config = EngineConfig::default();
    let engine = EnforcementEngine::new(&pipeline.store, &config.enforcement);
    for user in ["r1", "r2", "r3"] {
        assert_eq!(
            engine.active_level(user, t(1)).unwrap(),
            EnforcementLevel::ManualReviewRequired,
            "{user} must be under manual review"
        );
    }
    assert_eq!(pipeline.store.cluster_count().unwrap(), 1);
    assert_eq!(pipeline.store.open_case_count().unwrap(), 1);

    assert_eq!(
        pipeline.store.event_count(&report.run_id, "cluster_detected").unwrap(),
        1
    );
    assert_eq!(
        pipeline.store.event_count(&report.run_id, "pipeline_completed").unwrap(),
        1
    );
}

/// Re-running over an unchanged graph refreshes, never duplicates.
#[test]
fn rerun_is_idempotent() {
    let store = store();
    seed_ring(&store);
    let mut pipeline = FraudPipeline::new(store, EngineConfig::default()).unwrap();

    pipeline.run(t(1)).unwrap();
    let second = pipeline.run(t(2)).unwrap();

    assert_eq!(second.rings_found, 1);
    assert_eq!(second.clusters_refreshed, 1);
    assert_eq!(second.cases_opened, 0);
    assert_eq!(second.cases_refreshed, 1);
    assert_eq!(pipeline.store.cluster_count().unwrap(), 1);
    assert_eq!(pipeline.store.open_case_count().unwrap(), 1);
    assert_eq!(
        pipeline.store.event_count(&second.run_id, "cluster_refreshed").unwrap(),
        1
    );
}

/// A spam farm flows through the same pipeline.
#[test]
fn spam_farm_is_detected_and_enforced() {
    let store = store();
    seed_farm(&store);
    let mut pipeline = FraudPipeline::new(store, EngineConfig::default()).unwrap();

    let report = pipeline.run(t(1)).unwrap();
    assert_eq!(report.spam_clusters_found, 1);
    assert_eq!(report.enforcement_applied, 4);
    assert_eq!(report.cases_opened, 1);

    let config = EngineConfig::default();
    let engine = EnforcementEngine::new(&pipeline.store, &config.enforcement);
    assert_eq!(
        engine.active_level("farm-0", t(1)).unwrap(),
        EnforcementLevel::ManualReviewRequired
    );
}

/// An invalid configuration is fatal at construction, not at run time.
#[test]
fn invalid_config_is_fatal() {
    let store = store();
    let mut config = EngineConfig::default();
    config.ring.weights.isolation = 0.55;
    assert!(FraudPipeline::new(store, config).is_err());
}

struct CountingHooks {
    enforcements: Arc<AtomicUsize>,
    cases: Arc<AtomicUsize>,
}

impl CollaboratorHooks for CountingHooks {
    fn on_enforcement_applied(
        &mut self,
        _user_id: &str,
        _level: EnforcementLevel,
        _reason: &str,
        _expires_at: Option<Timestamp>,
    ) {
        self.enforcements.fetch_add(1, Ordering::SeqCst);
    }

    fn on_case_created(
        &mut self,
        _case_id: &str,
        _cluster_id: &str,
        _priority: fraudgraph_core::case_manager::CasePriority,
        _evidence_summary: &str,
    ) {
        self.cases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Collaborator hooks fire for enforcement and case creation.
#[test]
fn hooks_receive_outputs() {
    let store = store();
    seed_ring(&store);

    let enforcements = Arc::new(AtomicUsize::new(0));
    let cases = Arc::new(AtomicUsize::new(0));
    let hooks = CountingHooks {
        enforcements: Arc::clone(&enforcements),
        cases: Arc::clone(&cases),
    };

    let mut pipeline = FraudPipeline::new(store, EngineConfig::default())
        .unwrap()
        .with_hooks(Box::new(hooks));
    pipeline.run(t(1)).unwrap();

    assert_eq!(enforcements.load(Ordering::SeqCst), 3);
    assert_eq!(cases.load(Ordering::SeqCst), 1);
}

/// A group a human ruled a false positive is not re-enforced by the next
/// run over unchanged evidence.
#[test]
fn false_positive_ruling_survives_redetection() {
    let store = store();
    seed_ring(&store);
    let mut pipeline = FraudPipeline::new(store, EngineConfig::default()).unwrap();
    pipeline.run(t(1)).unwrap();

    let config = EngineConfig::default();
    {
        let engine = EnforcementEngine::new(&pipeline.store, &config.enforcement);
        let cases = CaseManager::new(&pipeline.store);
        let sig = signature(&["r1", "r2", "r3"].map(String::from));
        let case = pipeline
            .store
            .open_case_by_signature(&sig)
            .unwrap()
            .expect("the first run must have opened a case");
        cases
            .resolve(&case.case_id, CaseResolution::FalsePositive, &engine, t(2))
            .unwrap();
    }

    let report = pipeline.run(t(3)).unwrap();
    assert_eq!(report.rings_found, 1, "the detector still sees the group");
    assert_eq!(report.enforcement_applied, 0);
    assert_eq!(report.cases_opened, 0);
    assert_eq!(pipeline.store.cluster_count().unwrap(), 1);
    assert_eq!(pipeline.store.open_case_count().unwrap(), 0);

    let engine = EnforcementEngine::new(&pipeline.store, &config.enforcement);
    for user in ["r1", "r2", "r3"] {
        assert_eq!(
            engine.active_level(user, t(3)).unwrap(),
            EnforcementLevel::None,
            "{user} was cleared and must stay clear"
        );
    }
}

/// A quiet graph produces a quiet run.
#[test]
fn empty_graph_produces_empty_run() {
    let store = store();
    let mut pipeline = FraudPipeline::new(store, EngineConfig::default()).unwrap();
    let report = pipeline.run(t(1)).unwrap();

    assert_eq!(report.rings_found, 0);
    assert_eq!(report.spam_clusters_found, 0);
    assert_eq!(report.enforcement_applied, 0);
    assert_eq!(report.cases_opened, 0);
}
