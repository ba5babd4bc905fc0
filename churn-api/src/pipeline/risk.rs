//! Risk tiers, labels and recommendations

use churn_common::model::{ModelError, Thresholds};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
        }
    }

    /// Caller-facing decision label
    pub fn label(self) -> &'static str {
        match self {
            RiskTier::High => "will churn",
            RiskTier::Medium | RiskTier::Low => "will stay",
        }
    }

    /// Retention action for the tier
    pub fn recommendation(self) -> &'static str {
        match self {
            RiskTier::High => {
                "Immediate action: contact the customer with a personalised retention offer"
            }
            RiskTier::Medium => "Monitor: schedule proactive engagement and review product fit",
            RiskTier::Low => "Maintain: keep the standard relationship programme",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a probability to a tier using the artifact thresholds
///
/// Binary when only `high` is set, three-tier when `medium` is set too.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskClassifier {
    thresholds: Thresholds,
}

impl RiskClassifier {
    pub fn new(thresholds: Thresholds) -> Result<Self, ModelError> {
        thresholds.validate()?;
        Ok(Self { thresholds })
    }

    pub fn classify(&self, probability: f64) -> RiskTier {
        if probability >= self.thresholds.high {
            return RiskTier::High;
        }
        match self.thresholds.medium {
            Some(medium) if probability >= medium => RiskTier::Medium,
            _ => RiskTier::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditScoreBand {
    Excellent,
    Good,
    Fair,
    Low,
}

pub fn credit_score_band(score: f64) -> CreditScoreBand {
    if score >= 750.0 {
        CreditScoreBand::Excellent
    } else if score >= 650.0 {
        CreditScoreBand::Good
    } else if score >= 500.0 {
        CreditScoreBand::Fair
    } else {
        CreditScoreBand::Low
    }
}
