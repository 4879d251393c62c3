//! Confidence-weighted decision fusion: anomaly score, retrieval relevance,
//! and reasoner confidence collapse into one severity/tier verdict.

use crate::config::FusionConfig;
use crate::intel::RetrievalResult;
use crate::model::AnomalyScore;
use crate::reason::ThreatAssessment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Risk tier controlling response autonomy: GREEN executes silently, YELLOW
/// executes with a notification, RED requires approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Green,
    Yellow,
    Red,
}

/// Terminal decision for one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub event_id: String,
    pub severity: Severity,
    pub tier: Tier,
    pub confidence: f32,
    pub anomaly: f32,
    pub threat_type: String,
}

pub struct DecisionFuser {
    config: FusionConfig,
}

impl DecisionFuser {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    pub fn fuse(
        &self,
        event_id: &str,
        score: &AnomalyScore,
        retrieval: &RetrievalResult,
        assessment: &ThreatAssessment,
    ) -> Verdict {
        let c = &self.config;

        // Retrieval relevance gates the reasoner: an explanation with no
        // well-matched intel behind it is discounted, not trusted.
        let grounded = retrieval.max_similarity() >= c.min_relevance;
        let effective_confidence = if grounded {
            assessment.confidence
        } else {
            assessment.confidence * c.grounding_discount
        };

        let weighted = (c.anomaly_weight * score.value
            + c.reasoner_weight * effective_confidence)
            .clamp(0.0, 1.0);

        let severity = if weighted >= c.high_threshold {
            Severity::High
        } else if weighted >= c.medium_threshold {
            Severity::Medium
        } else {
            Severity::Low
        };

        let confidence = ((score.value + effective_confidence) / 2.0).clamp(0.0, 1.0);

        Verdict {
            event_id: event_id.to_string(),
            severity,
            tier: tier_for(severity, confidence, c),
            confidence,
            anomaly: score.value,
            threat_type: assessment.threat_type.clone(),
        }
    }

    /// Verdict for a score below the anomaly threshold: the pipeline
    /// short-circuited, no retrieval or reasoning happened.
    pub fn benign(&self, event_id: &str, score: &AnomalyScore) -> Verdict {
        Verdict {
            event_id: event_id.to_string(),
            severity: Severity::Low,
            tier: Tier::Green,
            confidence: (1.0 - score.value).clamp(0.0, 1.0),
            anomaly: score.value,
            threat_type: "benign".to_string(),
        }
    }
}

/// Total, deterministic tier mapping. Exhaustive over every
/// (severity, confidence) combination; no fallthrough error case.
pub fn tier_for(severity: Severity, confidence: f32, config: &FusionConfig) -> Tier {
    match severity {
        Severity::Low => Tier::Green,
        Severity::Medium => {
            if confidence >= config.medium_confidence {
                Tier::Yellow
            } else {
                Tier::Green
            }
        }
        Severity::High => {
            if confidence >= config.high_confidence {
                Tier::Red
            } else {
                Tier::Yellow
            }
        }
    }
}
