//! Engine configuration.
//!
//! Every tunable lives here. `EngineConfig::validate()` runs at pipeline
//! construction and is fatal: the pipeline refuses to run on bad weights or
//! misordered bands rather than silently scoring with them.

use crate::error::{FraudError, FraudResult};
use crate::risk::RiskBands;
use serde::{Deserialize, Serialize};

/// Edge decay policy (defaults: 5% per 30-day period, floor 0.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayConfig {
    /// One decay period, in days. Edges untouched for at least this long
    /// lose `rate_per_period` of their weight per pass.
    pub period_days: i64,
    /// Fractional weight lost per period, in (0, 1).
    pub rate_per_period: f64,
    /// Edges decaying below this weight are deleted.
    pub weight_floor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingWeights {
    pub shared_devices: f64,
    pub payment_loops: f64,
    pub isolation: f64,
    pub avg_edge_weight: f64,
}

impl RingWeights {
    pub fn as_vec(&self) -> Vec<f64> {
        vec![
            self.shared_devices,
            self.payment_loops,
            self.isolation,
            self.avg_edge_weight,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingConfig {
    /// Minimum edge weight for an edge to bind a component together.
    pub strong_edge_threshold: f64,
    /// Components smaller than this are discarded.
    pub min_ring_size: usize,
    /// Device-edge count at which the device component saturates to 1.0.
    pub shared_device_saturation: f64,
    /// Payment-edge count at which the payment component saturates to 1.0.
    pub payment_loop_saturation: f64,
    pub weights: RingWeights,
    /// Flat bonus when two or more distinct edge types are present.
    pub multi_signal_bonus: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpamWeights {
    pub rapid_creation: f64,
    pub similarity: f64,
    pub mass_messaging: f64,
    pub low_reply_rate: f64,
    pub low_kyc_progress: f64,
}

impl SpamWeights {
    pub fn as_vec(&self) -> Vec<f64> {
        vec![
            self.rapid_creation,
            self.similarity,
            self.mass_messaging,
            self.low_reply_rate,
            self.low_kyc_progress,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpamConfig {
    /// Width of the account-creation window, in hours.
    pub max_creation_window_hours: i64,
    /// Candidate clusters smaller than this are discarded.
    pub min_cluster_size: usize,
    /// Bio token-overlap at or above this connects two accounts.
    pub bio_similarity_threshold: f64,
    /// Profile-attribute similarity at or above this connects two accounts.
    pub profile_similarity_threshold: f64,
    /// Outbound message count at which mass-messaging saturates to 1.0.
    pub min_outbound_messages: f64,
    pub weights: SpamWeights,
    pub multi_signal_bonus: f64,
}

/// Enforcement expiry windows. ManualReviewRequired never expires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcementConfig {
    pub visibility_reduced_hours: i64,
    pub monetization_throttled_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub decay: DecayConfig,
    pub ring: RingConfig,
    pub spam: SpamConfig,
    pub bands: RiskBands,
    pub enforcement: EnforcementConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            decay: DecayConfig {
                period_days: 30,
                rate_per_period: 0.05,
                weight_floor: 0.1,
            },
            ring: RingConfig {
                strong_edge_threshold: 0.7,
                min_ring_size: 3,
                shared_device_saturation: 3.0,
                payment_loop_saturation: 2.0,
                weights: RingWeights {
                    shared_devices: 0.40,
                    payment_loops: 0.30,
                    isolation: 0.20,
                    avg_edge_weight: 0.10,
                },
                multi_signal_bonus: 0.10,
            },
            spam: SpamConfig {
                max_creation_window_hours: 48,
                min_cluster_size: 3,
                bio_similarity_threshold: 0.7,
                profile_similarity_threshold: 0.6,
                min_outbound_messages: 50.0,
                weights: SpamWeights {
                    rapid_creation: 0.30,
                    similarity: 0.25,
                    mass_messaging: 0.20,
                    low_reply_rate: 0.15,
                    low_kyc_progress: 0.10,
                },
                multi_signal_bonus: 0.10,
            },
            bands: RiskBands {
                low: 0.30,
                medium: 0.60,
                high: 0.85,
            },
            enforcement: EnforcementConfig {
                visibility_reduced_hours: 72,
                monetization_throttled_hours: 168,
            },
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file. Used by the runner; tests use `default()`.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid config {path}: {e}"))?;
        Ok(config)
    }

    /// Fatal at startup: the pipeline refuses to run on an invalid config.
    pub fn validate(&self) -> FraudResult<()> {
        if self.decay.period_days <= 0 {
            return Err(FraudError::Configuration(
                "decay.period_days must be positive".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.decay.rate_per_period) || self.decay.rate_per_period == 0.0 {
            return Err(FraudError::Configuration(format!(
                "decay.rate_per_period must be in (0, 1), got {}",
                self.decay.rate_per_period
            )));
        }
        if !(0.0..1.0).contains(&self.decay.weight_floor) {
            return Err(FraudError::Configuration(format!(
                "decay.weight_floor must be in [0, 1), got {}",
                self.decay.weight_floor
            )));
        }
        if !(0.0..=1.0).contains(&self.ring.strong_edge_threshold) {
            return Err(FraudError::Configuration(
                "ring.strong_edge_threshold must be in [0, 1]".into(),
            ));
        }
        if self.ring.min_ring_size < 2 {
            return Err(FraudError::Configuration(
                "ring.min_ring_size must be at least 2".into(),
            ));
        }
        if self.spam.min_cluster_size < 2 {
            return Err(FraudError::Configuration(
                "spam.min_cluster_size must be at least 2".into(),
            ));
        }
        if self.spam.max_creation_window_hours <= 0 {
            return Err(FraudError::Configuration(
                "spam.max_creation_window_hours must be positive".into(),
            ));
        }
        if self.enforcement.visibility_reduced_hours <= 0
            || self.enforcement.monetization_throttled_hours <= 0
        {
            return Err(FraudError::Configuration(
                "enforcement expiry windows must be positive".into(),
            ));
        }
        // Weight vectors are rejected here rather than at scoring time.
        crate::risk::WeightedModel::new(&self.ring.weights.as_vec())?;
        crate::risk::WeightedModel::new(&self.spam.weights.as_vec())?;
        self.bands.validate()?;
        Ok(())
    }
}
