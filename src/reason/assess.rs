//! Bounded-context assessment of an anomalous event: retrieval hits are
//! rendered into a prompt, the reasoning service is called with bounded
//! retries, and any failure degrades instead of stalling the pipeline.

use super::{ReasoningService, ThreatAssessment};
use crate::config::ReasonerConfig;
use crate::error::TriageError;
use crate::event::LogEvent;
use crate::intel::{IntelIndex, RetrievalResult};
use crate::model::AnomalyScore;
use rand::Rng;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub struct Reasoner {
    service: Arc<dyn ReasoningService>,
    index: Arc<dyn IntelIndex>,
    config: ReasonerConfig,
}

impl Reasoner {
    pub fn new(
        service: Arc<dyn ReasoningService>,
        index: Arc<dyn IntelIndex>,
        config: ReasonerConfig,
    ) -> Self {
        Self {
            service,
            index,
            config,
        }
    }

    /// Assess one anomalous event. Never fails: transient service errors are
    /// retried with bounded exponential backoff, everything else degrades to
    /// a zero-confidence assessment.
    pub async fn assess(
        &self,
        event: &LogEvent,
        score: &AnomalyScore,
        retrieval: &RetrievalResult,
    ) -> ThreatAssessment {
        let prompt = self.build_prompt(event, score, retrieval).await;

        for attempt in 1..=self.config.max_attempts {
            let call = self.service.reason(&prompt);
            let outcome =
                match tokio::time::timeout(Duration::from_millis(self.config.timeout_ms), call)
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(TriageError::ReasoningUnavailable("call timed out".into())),
                };

            match outcome {
                Ok(text) => match parse_assessment(&text) {
                    Ok(assessment) => return assessment,
                    Err(e) => {
                        // Malformed responses are not retryable.
                        warn!(event_id = %event.id, error = %e, "reasoning response unparsable");
                        return ThreatAssessment::degraded();
                    }
                },
                Err(TriageError::ReasoningUnavailable(reason)) => {
                    warn!(event_id = %event.id, attempt, %reason, "reasoning unavailable");
                    if attempt < self.config.max_attempts {
                        tokio::time::sleep(self.backoff(attempt)).await;
                    }
                }
                Err(e) => {
                    warn!(event_id = %event.id, error = %e, "reasoning failed");
                    return ThreatAssessment::degraded();
                }
            }
        }

        ThreatAssessment::degraded()
    }

    /// Exponential backoff with jitter, capped at 10s.
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self
            .config
            .backoff_base_ms
            .saturating_mul(1u64 << (attempt - 1).min(8));
        let jitter = rand::thread_rng().gen_range(0..=base / 2 + 1);
        Duration::from_millis((base + jitter).min(10_000))
    }

    /// Render the event and its retrieved context into one prompt, dropping
    /// the lowest-similarity documents first to stay inside the budget.
    async fn build_prompt(
        &self,
        event: &LogEvent,
        score: &AnomalyScore,
        retrieval: &RetrievalResult,
    ) -> String {
        let mut prompt = format!(
            "Security event under triage (anomaly score {:.2}, model {}):\n{}\n",
            score.value,
            score.model_version,
            event.summary()
        );

        let budget = self.config.context_budget_chars;
        let mut used = prompt.len();
        let mut context = String::new();

        // Hits arrive sorted by descending similarity; appending until the
        // budget runs out drops the least relevant documents first.
        for hit in &retrieval.hits {
            let Some(doc) = self.index.get(&hit.doc_id).await else {
                continue;
            };
            let entry = format!(
                "\n--- {} (similarity {:.2}) ---\n{}\n",
                doc.id, hit.similarity, doc.text
            );
            if used + entry.len() > budget {
                break;
            }
            used += entry.len();
            context.push_str(&entry);
        }

        if context.is_empty() {
            prompt.push_str("\nNo related threat intelligence was retrieved.\n");
        } else {
            prompt.push_str("\nRelated threat intelligence:\n");
            prompt.push_str(&context);
        }

        prompt.push_str(
            "\nRespond with JSON: {\"threat_type\": string, \"rationale\": string, \
             \"technique_ids\": [string], \"confidence\": number 0..1, \
             \"recommended_actions\": [string]}",
        );
        prompt
    }
}

#[derive(Deserialize)]
struct RawAssessment {
    threat_type: String,
    rationale: String,
    #[serde(default)]
    technique_ids: BTreeSet<String>,
    confidence: f32,
    #[serde(default)]
    recommended_actions: Vec<String>,
}

/// Parse the service's reply. Tolerates surrounding prose or code fences by
/// extracting the outermost JSON object.
fn parse_assessment(text: &str) -> Result<ThreatAssessment, TriageError> {
    let start = text
        .find('{')
        .ok_or_else(|| TriageError::ReasoningMalformed("no JSON object in reply".into()))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| TriageError::ReasoningMalformed("unterminated JSON object".into()))?;
    if end < start {
        return Err(TriageError::ReasoningMalformed("unbalanced braces".into()));
    }

    let raw: RawAssessment = serde_json::from_str(&text[start..=end])
        .map_err(|e| TriageError::ReasoningMalformed(e.to_string()))?;

    Ok(ThreatAssessment {
        threat_type: raw.threat_type,
        rationale: raw.rationale,
        technique_ids: raw.technique_ids,
        confidence: raw.confidence.clamp(0.0, 1.0),
        recommended_actions: raw.recommended_actions,
    })
}
