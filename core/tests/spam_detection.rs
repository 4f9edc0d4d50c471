//! Spam cluster detector tests.

use chrono::{Duration, TimeZone, Utc};
use fraudgraph_core::config::EngineConfig;
use fraudgraph_core::graph::{EdgeRecord, GraphSnapshot};
use fraudgraph_core::risk::RiskLevel;
use fraudgraph_core::signal::{AccountProfile, EdgeType};
use fraudgraph_core::spam_detector::{detect_spam_clusters, token_overlap};
use fraudgraph_core::types::Timestamp;

fn at(hours: i64) -> Timestamp {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
}

fn bot(i: usize, created: Timestamp) -> AccountProfile {
    AccountProfile {
        user_id: format!("bot-{i:02}"),
        created_at: created,
        bio: "best crypto deals join my signals channel".to_string(),
        display_name: format!("crypto_dealz_{i}"),
        outbound_message_count: 200,
        inbound_reply_count: 0,
        kyc_started: false,
    }
}

fn organic(i: usize, created: Timestamp) -> AccountProfile {
    let bios = [
        "gardening tips tomatoes herbs",
        "marathon runner coffee addict",
        "jazz piano vinyl collector",
        "mountain photography landscapes",
        "sourdough baking experiments",
        "retro gaming speedruns",
    ];
    let names = [
        "greenthumb",
        "pacer_42",
        "bluenote",
        "summitshot",
        "crumblab",
        "pixelrush",
    ];
    AccountProfile {
        user_id: format!("user-{i:02}"),
        created_at: created,
        bio: bios[i % bios.len()].to_string(),
        display_name: names[i % names.len()].to_string(),
        outbound_message_count: 10,
        inbound_reply_count: 8,
        kyc_started: true,
    }
}

fn empty_graph() -> GraphSnapshot {
    GraphSnapshot::new(Vec::new())
}

/// A burst-registered farm with pasted bios and zero replies scores HIGH.
#[test]
fn burst_registered_farm_scores_high() {
    let config = EngineConfig::default();
    let accounts: Vec<AccountProfile> = (0..5).map(|i| bot(i, at(i as i64 / 2))).collect();

    let detections =
        detect_spam_clusters(&accounts, &empty_graph(), &config.spam, &config.bands).unwrap();
    assert_eq!(detections.len(), 1);

    let farm = &detections[0];
    assert_eq!(farm.members.len(), 5);
    assert!(
        farm.probability >= 0.85,
        "expected HIGH probability, got {}",
        farm.probability
    );
    assert_eq!(farm.risk_level, RiskLevel::High);
}

/// Accounts created more than one window apart never join the same cluster.
#[test]
fn creation_window_separates_waves() {
    let config = EngineConfig::default();
    let mut accounts: Vec<AccountProfile> = (0..3).map(|i| bot(i, at(i as i64))).collect();
    // Second wave, 10 days later. Same bios, different window.
    accounts.extend((10..13).map(|i| bot(i, at(240 + i as i64))));

    let detections =
        detect_spam_clusters(&accounts, &empty_graph(), &config.spam, &config.bands).unwrap();
    assert_eq!(detections.len(), 2, "waves must stay separate clusters");
    for d in &detections {
        assert_eq!(d.members.len(), 3);
    }
}

/// Co-created organic accounts with unrelated profiles are never clustered.
#[test]
fn dissimilar_profiles_are_not_clustered() {
    let config = EngineConfig::default();
    let accounts: Vec<AccountProfile> = (0..6).map(|i| organic(i, at(i as i64))).collect();

    let detections =
        detect_spam_clusters(&accounts, &empty_graph(), &config.spam, &config.bands).unwrap();
    assert!(detections.is_empty());
}

/// Two similar accounts are below the minimum cluster size.
#[test]
fn pairs_are_below_minimum_cluster_size() {
    let config = EngineConfig::default();
    let accounts = vec![bot(0, at(0)), bot(1, at(1))];

    let detections =
        detect_spam_clusters(&accounts, &empty_graph(), &config.spam, &config.bands).unwrap();
    assert!(detections.is_empty());
}

/// A strong graph edge connects co-created accounts even with unrelated
/// profile text.
#[test]
fn strong_graph_edges_connect_dissimilar_accounts() {
    let config = EngineConfig::default();
    let mut accounts: Vec<AccountProfile> = (0..3).map(|i| organic(i, at(i as i64))).collect();
    for account in &mut accounts {
        account.outbound_message_count = 300;
        account.inbound_reply_count = 0;
        account.kyc_started = false;
    }

    let mut edges = Vec::new();
    for i in 0..3 {
        for j in (i + 1)..3 {
            edges.push(EdgeRecord {
                user_a: format!("user-{i:02}"),
                user_b: format!("user-{j:02}"),
                edge_type: EdgeType::Device,
                weight: 1.0,
                last_reinforced_at: at(0),
            });
        }
    }
    let graph = GraphSnapshot::new(edges);

    let detections = detect_spam_clusters(&accounts, &graph, &config.spam, &config.bands).unwrap();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].members.len(), 3);
}

/// Blank bios are not evidence of similarity.
#[test]
fn empty_bios_are_not_similar() {
    assert_eq!(token_overlap("", ""), 0.0);
    assert_eq!(token_overlap("something", ""), 0.0);
    assert_eq!(token_overlap("same words here", "same words here"), 1.0);
}

/// Caller ordering of the account slice never changes the outcome.
#[test]
fn detection_is_order_independent() {
    let config = EngineConfig::default();
    let accounts: Vec<AccountProfile> = (0..5).map(|i| bot(i, at(i as i64 / 2))).collect();
    let mut shuffled = accounts.clone();
    shuffled.reverse();

    let a = detect_spam_clusters(&accounts, &empty_graph(), &config.spam, &config.bands).unwrap();
    let b = detect_spam_clusters(&shuffled, &empty_graph(), &config.spam, &config.bands).unwrap();

    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b.iter()) {
        assert_eq!(x.members, y.members);
        assert_eq!(x.probability.to_bits(), y.probability.to_bits());
    }
}
