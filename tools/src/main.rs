//! graph-runner: headless workload runner for the fraud graph engine.
//!
//! Seeds a synthetic population (one colluding ring, one spam farm, benign
//! background accounts), then drives daily pipeline passes and prints a
//! summary.
//!
//! Usage:
//!   graph-runner --seed 12345 --days 14 --db run.db
//!   graph-runner --config config.json --benign 200

use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use fraudgraph_core::{
    case_manager::CasePriority,
    config::EngineConfig,
    enforcement::{EnforcementEngine, EnforcementLevel},
    events::CollaboratorHooks,
    pipeline::FraudPipeline,
    signal::{AccountProfile, EdgeType, Signal, SignalIngestor},
    store::GraphStore,
    types::Timestamp,
};
use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use std::env;

/// Logs what a real collaborator (notification or review-queue service)
/// would consume.
struct LogHooks;

impl CollaboratorHooks for LogHooks {
    fn on_enforcement_applied(
        &mut self,
        user_id: &str,
        level: EnforcementLevel,
        reason: &str,
        expires_at: Option<Timestamp>,
    ) {
        log::info!(
            "enforcement: {user_id} -> {} ({reason}), expires {expires_at:?}",
            level.as_str()
        );
    }

    fn on_case_created(
        &mut self,
        case_id: &str,
        cluster_id: &str,
        priority: CasePriority,
        _evidence_summary: &str,
    ) {
        log::info!(
            "case opened: {case_id} for {cluster_id}, priority {}",
            priority.as_str()
        );
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let days = parse_arg(&args, "--days", 14u64);
    let benign = parse_arg(&args, "--benign", 100usize);
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");
    let config = match args.windows(2).find(|w| w[0] == "--config") {
        Some(w) => EngineConfig::load(&w[1])?,
        None => EngineConfig::default(),
    };

    println!("fraud graph engine — graph-runner");
    println!("  seed:   {seed}");
    println!("  days:   {days}");
    println!("  benign: {benign}");
    println!("  db:     {db}");
    println!();

    let store = GraphStore::open(db)?;
    store.migrate()?;

    let start = Utc
        .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| anyhow::anyhow!("bad start timestamp"))?;

    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    seed_population(&store, &mut rng, benign, start)?;

    let mut pipeline = FraudPipeline::new(store, config)?.with_hooks(Box::new(LogHooks));
    let mut now = start;
    for day in 1..=days {
        now += Duration::days(1);
        let report = pipeline.run(now)?;
        println!(
            "day {day:>3}: {} rings, {} spam clusters, {} enforced, {} expired, {} cases opened",
            report.rings_found,
            report.spam_clusters_found,
            report.enforcement_applied,
            report.enforcement_expired,
            report.cases_opened
        );
    }

    print_summary(&pipeline, now)?;
    Ok(())
}

/// Seed one colluding ring, one spam farm, and a benign background.
fn seed_population(
    store: &GraphStore,
    rng: &mut Pcg64Mcg,
    benign: usize,
    start: Timestamp,
) -> Result<()> {
    let ingestor = SignalIngestor::new(store);
    let mut signals = Vec::new();

    // Colluding ring: five accounts on shared devices, routing payments
    // in a closed loop. Almost no outside ties.
    let ring: Vec<String> = (0..5).map(|i| format!("ring-{i:02}")).collect();
    for (i, a) in ring.iter().enumerate() {
        for b in ring.iter().skip(i + 1) {
            signals.push(Signal {
                edge_type: EdgeType::Device,
                user_a: a.clone(),
                user_b: b.clone(),
                strength: 1.0,
                observed_at: start,
                metadata: serde_json::json!({ "device": format!("dev-{i}") }),
            });
        }
    }
    for i in 0..ring.len() {
        signals.push(Signal {
            edge_type: EdgeType::Payment,
            user_a: ring[i].clone(),
            user_b: ring[(i + 1) % ring.len()].clone(),
            strength: 0.9,
            observed_at: start,
            metadata: serde_json::json!({ "loop": true }),
        });
    }

    // Spam farm: six accounts registered minutes apart with the same
    // pasted bio, blasting messages nobody answers.
    for i in 0..6i64 {
        let profile = AccountProfile {
            user_id: format!("farm-{i:02}"),
            created_at: start + Duration::minutes(10 * i),
            bio: "best deals crypto signals join my channel now".to_string(),
            display_name: format!("dealz_bot_{i}"),
            outbound_message_count: 400 + 30 * i,
            inbound_reply_count: 2,
            kyc_started: false,
        };
        ingestor.upsert_profile(&profile)?;
    }

    // Benign background: organic accounts with sparse, weak social ties.
    for i in 0..benign {
        let profile = AccountProfile {
            user_id: format!("user-{i:04}"),
            created_at: start - Duration::days(rng.gen_range(30..720)),
            bio: format!("account number {i}, here for the memes"),
            display_name: format!("person_{i}"),
            outbound_message_count: rng.gen_range(0..40),
            inbound_reply_count: rng.gen_range(0..40),
            kyc_started: rng.gen_bool(0.6),
        };
        ingestor.upsert_profile(&profile)?;
        if i > 0 {
            let other = rng.gen_range(0..i);
            signals.push(Signal {
                edge_type: EdgeType::Social,
                user_a: format!("user-{i:04}"),
                user_b: format!("user-{other:04}"),
                strength: rng.gen_range(0.05..0.4),
                observed_at: start,
                metadata: serde_json::Value::Null,
            });
        }
    }

    let accepted = ingestor.record_batch(&signals);
    println!("seeded {accepted}/{} signals", signals.len());
    Ok(())
}

fn print_summary(pipeline: &FraudPipeline, now: Timestamp) -> Result<()> {
    let store = &pipeline.store;
    println!();
    println!("=== RUN SUMMARY ===");
    println!("  edges:      {}", store.edge_count()?);
    println!("  clusters:   {}", store.cluster_count()?);
    println!("  open cases: {}", store.open_case_count()?);

    let engine = EnforcementEngine::new(store, &pipeline.config().enforcement);
    println!();
    println!("=== RING MEMBER RESTRICTIONS ===");
    for i in 0..5 {
        let user = format!("ring-{i:02}");
        let level = engine.active_level(&user, now)?;
        println!("  {user}: {}", level.as_str());
    }
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
