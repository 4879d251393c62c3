//! Normalized, PII-redacted log events as handed over by the upstream
//! normalizer. Read-only within the pipeline; retained for the lifetime of
//! the derived alert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source system the event was normalized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSource {
    Cicids,
    Cloudtrail,
    System,
    Custom,
}

/// Outcome of the logged action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failed,
    Denied,
}

/// One normalized security log event. Flow characteristics from network
/// sources (duration, packet/byte counts, rates) arrive through `metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub id: String,
    pub ts: DateTime<Utc>,
    pub source: LogSource,
    /// Anonymized subject identifier (user, role, or service principal).
    pub subject: String,
    pub action: String,
    pub resource: String,
    pub outcome: Outcome,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl LogEvent {
    pub fn new(
        source: LogSource,
        subject: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
        outcome: Outcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ts: Utc::now(),
            source,
            subject: subject.into(),
            action: action.into(),
            resource: resource.into(),
            outcome,
            metadata: serde_json::Map::new(),
        }
    }

    /// Numeric metadata field, if present and numeric.
    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(|v| v.as_f64())
    }

    /// Compact one-line rendering used in reasoning prompts and audit logs.
    pub fn summary(&self) -> String {
        format!(
            "[{}] subject={} action={} resource={} outcome={:?}",
            self.ts.to_rfc3339(),
            self.subject,
            self.action,
            self.resource,
            self.outcome
        )
    }
}
