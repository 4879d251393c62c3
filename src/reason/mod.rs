//! Retrieval-augmented reasoning over anomalous events. The reasoning
//! service itself is an opaque external collaborator; this module owns prompt
//! construction and response parsing.

mod assess;
mod client;

pub use assess::Reasoner;
pub use client::{DisabledReasoner, HttpReasoner, MockReasoner, MockReply, ReasoningService};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Structured explanation for one anomalous event. Ephemeral; consumed by the
/// decision fuser and never persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatAssessment {
    pub threat_type: String,
    pub rationale: String,
    /// Matched MITRE technique ids (e.g. T1110). Ordered set for stable
    /// serialization.
    #[serde(default)]
    pub technique_ids: BTreeSet<String>,
    /// Reasoner-reported confidence in [0,1].
    pub confidence: f32,
    /// Advisory remediation suggestions; never executed directly.
    #[serde(default)]
    pub recommended_actions: Vec<String>,
}

impl ThreatAssessment {
    /// Zero-confidence assessment used when the reasoning service is
    /// unavailable or unparsable. Availability beats completeness for this
    /// non-authoritative stage.
    pub fn degraded() -> Self {
        Self {
            threat_type: "unknown".to_string(),
            rationale: "reasoning unavailable".to_string(),
            technique_ids: BTreeSet::new(),
            confidence: 0.0,
            recommended_actions: Vec::new(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.confidence == 0.0 && self.threat_type == "unknown"
    }
}
