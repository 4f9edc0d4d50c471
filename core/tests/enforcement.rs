//! Enforcement engine tests: idempotency, escalation, graduated expiry,
//! and the settled-ledger boundary.

use chrono::{Duration, TimeZone, Utc};
use fraudgraph_core::config::EngineConfig;
use fraudgraph_core::enforcement::{ApplyOutcome, EnforcementEngine, EnforcementLevel};
use fraudgraph_core::risk::RiskLevel;
use fraudgraph_core::store::GraphStore;
use fraudgraph_core::types::Timestamp;

fn store() -> GraphStore {
    let store = GraphStore::in_memory().unwrap();
    store.migrate().unwrap();
    store
}

fn t(hours: i64) -> Timestamp {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
}

/// Low risk maps to a 72-hour visibility reduction.
#[test]
fn low_band_applies_visibility_reduction() {
    let store = store();
    let config = EngineConfig::default();
    let engine = EnforcementEngine::new(&store, &config.enforcement);

    let outcome = engine
        .apply("alice", RiskLevel::Low, "collusion_ring", "test", t(0))
        .unwrap();
    assert_eq!(
        outcome,
        ApplyOutcome::Applied {
            level: EnforcementLevel::VisibilityReduced,
            expires_at: Some(t(72)),
        }
    );
    assert_eq!(
        engine.active_level("alice", t(1)).unwrap(),
        EnforcementLevel::VisibilityReduced
    );
}

/// Re-detection at the same level refreshes expiry without stacking a
/// second action.
#[test]
fn reapply_refreshes_instead_of_stacking() {
    let store = store();
    let config = EngineConfig::default();
    let engine = EnforcementEngine::new(&store, &config.enforcement);

    engine
        .apply("alice", RiskLevel::Low, "collusion_ring", "test", t(0))
        .unwrap();
    let outcome = engine
        .apply("alice", RiskLevel::Low, "collusion_ring", "test", t(48))
        .unwrap();
    assert_eq!(
        outcome,
        ApplyOutcome::Refreshed {
            level: EnforcementLevel::VisibilityReduced,
            expires_at: Some(t(48 + 72)),
        }
    );

    assert_eq!(store.actions_for_user("alice").unwrap().len(), 1);
    // Still active past the original expiry.
    assert_eq!(
        engine.active_level("alice", t(100)).unwrap(),
        EnforcementLevel::VisibilityReduced
    );
}

/// A stricter detection escalates the active action in place.
#[test]
fn higher_band_escalates_in_place() {
    let store = store();
    let config = EngineConfig::default();
    let engine = EnforcementEngine::new(&store, &config.enforcement);

    engine
        .apply("alice", RiskLevel::Low, "collusion_ring", "test", t(0))
        .unwrap();
    let outcome = engine
        .apply("alice", RiskLevel::High, "collusion_ring", "test", t(1))
        .unwrap();
    assert_eq!(
        outcome,
        ApplyOutcome::Applied {
            level: EnforcementLevel::ManualReviewRequired,
            expires_at: None,
        }
    );
    assert_eq!(store.actions_for_user("alice").unwrap().len(), 1);
}

/// A weaker detection never lowers an active restriction.
#[test]
fn weaker_band_never_deescalates() {
    let store = store();
    let config = EngineConfig::default();
    let engine = EnforcementEngine::new(&store, &config.enforcement);

    engine
        .apply("alice", RiskLevel::High, "collusion_ring", "test", t(0))
        .unwrap();
    let outcome = engine
        .apply("alice", RiskLevel::Low, "collusion_ring", "test", t(1))
        .unwrap();
    assert_eq!(outcome, ApplyOutcome::Unchanged);
    assert_eq!(
        engine.active_level("alice", t(2)).unwrap(),
        EnforcementLevel::ManualReviewRequired
    );
}

/// Expiry steps down one level at a time: throttled accounts pass through
/// a fresh visibility-reduction window before reaching None.
#[test]
fn expiry_deescalates_gradually() {
    let store = store();
    let config = EngineConfig::default();
    let engine = EnforcementEngine::new(&store, &config.enforcement);

    engine
        .apply("alice", RiskLevel::Medium, "spam_cluster", "test", t(0))
        .unwrap();
    assert_eq!(
        engine.active_level("alice", t(1)).unwrap(),
        EnforcementLevel::MonetizationThrottled
    );

    // 7-day throttle expires.
    let first = engine.expire_pass(t(169)).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].from, EnforcementLevel::MonetizationThrottled);
    assert_eq!(first[0].to, EnforcementLevel::VisibilityReduced);
    assert_eq!(
        engine.active_level("alice", t(169)).unwrap(),
        EnforcementLevel::VisibilityReduced
    );

    // The step-down window expires in turn, landing at None.
    let second = engine.expire_pass(t(169 + 73)).unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].to, EnforcementLevel::None);
    assert_eq!(
        engine.active_level("alice", t(169 + 73)).unwrap(),
        EnforcementLevel::None
    );

    // The sweep must not find anything further.
    assert!(engine.expire_pass(t(1000)).unwrap().is_empty());
}

/// A reversal landing after an action expired but before the next sweep
/// still retires the row: the sweep must never step down an account a
/// human already cleared.
#[test]
fn reversal_after_expiry_blocks_step_down() {
    let store = store();
    let config = EngineConfig::default();
    let engine = EnforcementEngine::new(&store, &config.enforcement);

    engine
        .apply("alice", RiskLevel::Medium, "spam_cluster", "test", t(0))
        .unwrap();
    // The throttle expired at t(168); the human ruling lands before any
    // sweep has processed the expiry.
    let reversed = engine
        .reverse_for_users(&["alice".to_string()], t(170))
        .unwrap();
    assert_eq!(reversed, vec!["alice".to_string()]);

    assert!(
        engine.expire_pass(t(172)).unwrap().is_empty(),
        "sweep must not resurrect a reversed restriction"
    );
    assert_eq!(
        engine.active_level("alice", t(172)).unwrap(),
        EnforcementLevel::None
    );
}

/// The expiry step-down retires the old action and records its successor
/// as one transition, with the successor carrying the step-down reason.
#[test]
fn step_down_is_a_single_transition() {
    let store = store();
    let config = EngineConfig::default();
    let engine = EnforcementEngine::new(&store, &config.enforcement);

    engine
        .apply("alice", RiskLevel::Medium, "spam_cluster", "test", t(0))
        .unwrap();
    engine.expire_pass(t(169)).unwrap();

    let actions = store.actions_for_user("alice").unwrap();
    assert_eq!(actions.len(), 2, "retired action plus its successor");
    assert_eq!(actions[1].level, EnforcementLevel::VisibilityReduced);
    assert_eq!(actions[1].reason_code, "expiry_step_down");
    assert_eq!(
        engine.active_level("alice", t(169)).unwrap(),
        EnforcementLevel::VisibilityReduced
    );
}

/// Manual review never expires on its own.
#[test]
fn manual_review_does_not_expire() {
    let store = store();
    let config = EngineConfig::default();
    let engine = EnforcementEngine::new(&store, &config.enforcement);

    engine
        .apply("alice", RiskLevel::High, "collusion_ring", "test", t(0))
        .unwrap();
    assert!(engine.expire_pass(t(10_000)).unwrap().is_empty());
    assert_eq!(
        engine.active_level("alice", t(10_000)).unwrap(),
        EnforcementLevel::ManualReviewRequired
    );
}

/// Human reversal ends a restriction immediately.
#[test]
fn reversal_clears_active_restrictions() {
    let store = store();
    let config = EngineConfig::default();
    let engine = EnforcementEngine::new(&store, &config.enforcement);

    engine
        .apply("alice", RiskLevel::High, "collusion_ring", "test", t(0))
        .unwrap();
    let reversed = engine
        .reverse_for_users(&["alice".to_string(), "bob".to_string()], t(1))
        .unwrap();
    assert_eq!(reversed, vec!["alice".to_string()]);
    assert_eq!(
        engine.active_level("alice", t(2)).unwrap(),
        EnforcementLevel::None
    );
}

/// Enforcement never touches already-settled earnings.
#[test]
fn settled_ledger_is_untouched_by_enforcement() {
    let store = store();
    let config = EngineConfig::default();

    store.record_settled_earning("alice", 125.50, t(0)).unwrap();
    store.record_settled_earning("alice", 74.50, t(1)).unwrap();
    assert!((store.settled_total("alice").unwrap() - 200.0).abs() < 1e-9);

    let engine = EnforcementEngine::new(&store, &config.enforcement);
    engine
        .apply("alice", RiskLevel::High, "collusion_ring", "test", t(2))
        .unwrap();
    engine.expire_pass(t(500)).unwrap();
    engine.reverse_for_users(&["alice".to_string()], t(600)).unwrap();

    assert!((store.settled_total("alice").unwrap() - 200.0).abs() < 1e-9);
}
