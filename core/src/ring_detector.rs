//! Collusion ring detection.
//!
//! A ring is a connected component of accounts bound by strong edges that
//! is unusually closed off from the rest of the graph: members share
//! devices, route payments among themselves, and have few outside ties.

use crate::cluster::{Detection, Detector};
use crate::config::RingConfig;
use crate::error::{FraudError, FraudResult};
use crate::graph::{connected_components, GraphSnapshot};
use crate::risk::{saturate, RiskBands, WeightedModel};
use crate::signal::EdgeType;
use std::collections::BTreeSet;

/// Detect collusion rings over a graph snapshot.
///
/// Pure function of its inputs: identical snapshot and config always yield
/// identical clusters with bit-identical probabilities.
pub fn detect_rings(
    graph: &GraphSnapshot,
    config: &RingConfig,
    bands: &RiskBands,
) -> FraudResult<Vec<Detection>> {
    let model = WeightedModel::new(&config.weights.as_vec()).map_err(wrap)?;

    let adjacency = graph.adjacency_above(config.strong_edge_threshold);
    let components = connected_components(&adjacency, config.min_ring_size);

    let mut detections = Vec::new();
    for members in components {
        let member_set: BTreeSet<_> = members.iter().cloned().collect();
        let internal = graph.edges_within(&member_set);
        let touching = graph.edge_count_touching(&member_set);
        if internal.is_empty() || touching == 0 {
            continue;
        }

        // Closed-loop measure: internal edges over every edge touching a
        // member, weak external ties included.
        let isolation = internal.len() as f64 / touching as f64;

        let shared_devices = internal
            .iter()
            .filter(|e| e.edge_type == EdgeType::Device)
            .count();
        let payment_loops = internal
            .iter()
            .filter(|e| e.edge_type == EdgeType::Payment)
            .count();
        let avg_weight =
            internal.iter().map(|e| e.weight).sum::<f64>() / internal.len() as f64;

        let distinct_types: BTreeSet<_> = internal.iter().map(|e| e.edge_type).collect();

        let base = model.score(&[
            saturate(shared_devices as f64, config.shared_device_saturation),
            saturate(payment_loops as f64, config.payment_loop_saturation),
            isolation,
            avg_weight,
        ]);
        let bonus = if distinct_types.len() >= 2 {
            config.multi_signal_bonus
        } else {
            0.0
        };
        let probability = (base + bonus).min(1.0);

        let risk_level = bands.classify(probability);
        if risk_level == crate::risk::RiskLevel::None {
            continue;
        }

        let mut signals = Vec::new();
        if shared_devices > 0 {
            signals.push(format!("{shared_devices} shared-device links inside the group"));
        }
        if payment_loops > 0 {
            signals.push(format!("{payment_loops} closed-loop payment links"));
        }
        signals.push(format!("isolation score {isolation:.2}"));
        if distinct_types.len() >= 2 {
            signals.push(format!(
                "{} distinct signal types present",
                distinct_types.len()
            ));
        }

        let characteristics = serde_json::json!({
            "member_count": members.len(),
            "shared_device_count": shared_devices,
            "payment_loop_count": payment_loops,
            "isolation_score": isolation,
            "avg_internal_edge_weight": avg_weight,
        });

        detections.push(Detection {
            detector: Detector::Ring,
            members,
            probability,
            risk_level,
            characteristics,
            signals,
        });
    }

    Ok(detections)
}

fn wrap(source: FraudError) -> FraudError {
    FraudError::Detection {
        detector: "ring",
        source: Box::new(source),
    }
}
