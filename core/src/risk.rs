//! Shared risk scoring primitive.
//!
//! Both detectors reduce their evidence to a vector of normalized [0,1]
//! components and feed it through a `WeightedModel`. The weight vector is
//! validated once, at config load — a model whose weights do not sum to 1.0
//! must never score anything.

use crate::error::{FraudError, FraudResult};
use serde::{Deserialize, Serialize};

const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// Risk classification band for a scored cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(s: &str) -> FraudResult<Self> {
        match s {
            "none" => Ok(Self::None),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(FraudError::Configuration(format!(
                "unknown risk level '{other}'"
            ))),
        }
    }
}

/// Probability thresholds separating the risk bands.
/// Must be strictly increasing and within (0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskBands {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl RiskBands {
    pub fn classify(&self, probability: f64) -> RiskLevel {
        if probability >= self.high {
            RiskLevel::High
        } else if probability >= self.medium {
            RiskLevel::Medium
        } else if probability >= self.low {
            RiskLevel::Low
        } else {
            RiskLevel::None
        }
    }

    pub fn validate(&self) -> FraudResult<()> {
        let ordered = 0.0 < self.low && self.low < self.medium && self.medium < self.high;
        if !ordered || self.high > 1.0 {
            return Err(FraudError::Configuration(format!(
                "risk bands must be strictly increasing within (0, 1]: low={}, medium={}, high={}",
                self.low, self.medium, self.high
            )));
        }
        Ok(())
    }
}

/// A validated weighted combination of normalized component scores.
#[derive(Debug, Clone)]
pub struct WeightedModel {
    weights: Vec<f64>,
}

impl WeightedModel {
    /// Rejects weight vectors that do not sum to 1.0 ± epsilon.
    pub fn new(weights: &[f64]) -> FraudResult<Self> {
        if weights.is_empty() || weights.iter().any(|w| *w < 0.0) {
            return Err(FraudError::Configuration(
                "model weights must be non-empty and non-negative".into(),
            ));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(FraudError::Configuration(format!(
                "model weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(Self {
            weights: weights.to_vec(),
        })
    }

    /// Weighted sum of components, each clamped to [0, 1].
    /// Component count must match the weight vector.
    pub fn score(&self, components: &[f64]) -> f64 {
        debug_assert_eq!(components.len(), self.weights.len());
        self.weights
            .iter()
            .zip(components.iter())
            .map(|(w, c)| w * c.clamp(0.0, 1.0))
            .sum()
    }
}

/// Saturating normalization: `min(value / threshold, 1.0)`.
pub fn saturate(value: f64, threshold: f64) -> f64 {
    if threshold <= 0.0 {
        return 0.0;
    }
    (value / threshold).min(1.0)
}
