//! Commercial-spam / bot-farm detection.
//!
//! Bot farms register in bursts, paste near-identical bios, blast outbound
//! messages nobody answers, and never start identity verification. The
//! detector connects accounts created within one window whose profiles are
//! suspiciously similar (or that the relationship graph already links
//! strongly), then scores each connected candidate group.

use crate::cluster::{Detection, Detector};
use crate::config::SpamConfig;
use crate::error::FraudResult;
use crate::graph::{connected_components, GraphSnapshot};
use crate::risk::{saturate, RiskBands, RiskLevel, WeightedModel};
use crate::signal::AccountProfile;
use crate::types::UserId;
use std::collections::{BTreeMap, BTreeSet};

/// Detect spam clusters among the given accounts.
///
/// Pure function of its inputs; accounts are re-sorted internally so caller
/// ordering never affects the result.
pub fn detect_spam_clusters(
    accounts: &[AccountProfile],
    graph: &GraphSnapshot,
    config: &SpamConfig,
    bands: &RiskBands,
) -> FraudResult<Vec<Detection>> {
    let model = WeightedModel::new(&config.weights.as_vec()).map_err(|e| {
        crate::error::FraudError::Detection {
            detector: "spam",
            source: Box::new(e),
        }
    })?;

    let mut sorted: Vec<&AccountProfile> = accounts.iter().collect();
    sorted.sort_by(|x, y| (x.created_at, &x.user_id).cmp(&(y.created_at, &y.user_id)));

    let window_secs = config.max_creation_window_hours * 3600;
    let by_id: BTreeMap<&str, &AccountProfile> =
        sorted.iter().map(|p| (p.user_id.as_str(), *p)).collect();

    // Similarity graph: pairs created within one window whose bios or
    // profile attributes match, or that the relationship graph already
    // binds with a strong edge.
    let mut adjacency: BTreeMap<UserId, BTreeSet<UserId>> = BTreeMap::new();
    for (i, a) in sorted.iter().enumerate() {
        for b in sorted.iter().skip(i + 1) {
            let gap = (b.created_at - a.created_at).num_seconds();
            if gap > window_secs {
                break; // sorted by creation time
            }
            let bio_sim = token_overlap(&a.bio, &b.bio);
            let profile_sim = bigram_overlap(&a.display_name, &b.display_name);
            let graph_link = graph
                .max_weight_between(&a.user_id, &b.user_id)
                .unwrap_or(0.0);
            if bio_sim >= config.bio_similarity_threshold
                || profile_sim >= config.profile_similarity_threshold
                || graph_link >= config.bio_similarity_threshold
            {
                adjacency
                    .entry(a.user_id.clone())
                    .or_default()
                    .insert(b.user_id.clone());
                adjacency
                    .entry(b.user_id.clone())
                    .or_default()
                    .insert(a.user_id.clone());
            }
        }
    }

    let candidates = connected_components(&adjacency, config.min_cluster_size);

    let mut detections = Vec::new();
    for members in candidates {
        let profiles: Vec<&AccountProfile> = members
            .iter()
            .filter_map(|id| by_id.get(id.as_str()).copied())
            .collect();
        if profiles.len() < config.min_cluster_size {
            continue;
        }

        let created_min = profiles.iter().map(|p| p.created_at).min();
        let created_max = profiles.iter().map(|p| p.created_at).max();
        let span_secs = match (created_min, created_max) {
            (Some(lo), Some(hi)) => (hi - lo).num_seconds(),
            _ => continue,
        };
        let rapid_creation = 1.0 - (span_secs as f64 / window_secs as f64).clamp(0.0, 1.0);

        let similarity = mean_pairwise_similarity(&profiles);

        let outbound: i64 = profiles.iter().map(|p| p.outbound_message_count).sum();
        let inbound: i64 = profiles.iter().map(|p| p.inbound_reply_count).sum();
        let reply_rate = if outbound > 0 {
            (inbound as f64 / outbound as f64).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let mass_messaging = saturate(outbound as f64, config.min_outbound_messages);
        let kyc_rate = profiles.iter().filter(|p| p.kyc_started).count() as f64
            / profiles.len() as f64;

        let components = [
            rapid_creation,
            similarity,
            mass_messaging,
            1.0 - reply_rate,
            1.0 - kyc_rate,
        ];
        let base = model.score(&components);
        let present = components.iter().filter(|c| **c >= 0.5).count();
        let bonus = if present >= 2 {
            config.multi_signal_bonus
        } else {
            0.0
        };
        let probability = (base + bonus).min(1.0);

        let risk_level = bands.classify(probability);
        if risk_level == RiskLevel::None {
            continue;
        }

        let span_hours = span_secs as f64 / 3600.0;
        let mut signals = vec![format!(
            "{} accounts created within {span_hours:.1}h",
            profiles.len()
        )];
        if similarity >= config.profile_similarity_threshold {
            signals.push(format!("mean profile similarity {similarity:.2}"));
        }
        if outbound > 0 {
            signals.push(format!(
                "{outbound} outbound messages, reply rate {reply_rate:.2}"
            ));
        }
        if kyc_rate == 0.0 {
            signals.push("no member started identity verification".to_string());
        }

        let characteristics = serde_json::json!({
            "member_count": profiles.len(),
            "creation_window_hours": span_hours,
            "bio_similarity": similarity,
            "outbound_message_count": outbound,
            "reply_rate": reply_rate,
            "kyc_progress_rate": kyc_rate,
        });

        detections.push(Detection {
            detector: Detector::Spam,
            members,
            probability,
            risk_level,
            characteristics,
            signals,
        });
    }

    Ok(detections)
}

/// Jaccard overlap of lowercase whitespace tokens. Empty-vs-empty is 0:
/// two blank bios are not evidence of anything.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let ta: BTreeSet<String> = a.split_whitespace().map(|t| t.to_lowercase()).collect();
    let tb: BTreeSet<String> = b.split_whitespace().map(|t| t.to_lowercase()).collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count() as f64;
    let union = ta.union(&tb).count() as f64;
    intersection / union
}

/// Jaccard overlap of lowercase character bigrams, for short attribute
/// strings like display names where token overlap is too coarse.
pub fn bigram_overlap(a: &str, b: &str) -> f64 {
    let ba = bigrams(a);
    let bb = bigrams(b);
    if ba.is_empty() || bb.is_empty() {
        return 0.0;
    }
    let intersection = ba.intersection(&bb).count() as f64;
    let union = ba.union(&bb).count() as f64;
    intersection / union
}

fn bigrams(s: &str) -> BTreeSet<(char, char)> {
    let chars: Vec<char> = s.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

fn mean_pairwise_similarity(profiles: &[&AccountProfile]) -> f64 {
    let mut total = 0.0;
    let mut pairs = 0usize;
    for (i, a) in profiles.iter().enumerate() {
        for b in profiles.iter().skip(i + 1) {
            let bio = token_overlap(&a.bio, &b.bio);
            let name = bigram_overlap(&a.display_name, &b.display_name);
            total += bio.max(name);
            pairs += 1;
        }
    }
    if pairs == 0 {
        0.0
    } else {
        total / pairs as f64
    }
}
