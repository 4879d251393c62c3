//! Event → fixed-length feature vector. Pure and total over well-formed
//! input; the only failure mode is a schema mismatch.

use super::FeatureVector;
use crate::config::SchemaConfig;
use crate::error::TriageError;
use crate::event::{LogEvent, Outcome};
use chrono::Timelike;

/// Flow-characteristic metadata keys contributed by network sources. Declared
/// numeric: a present-but-non-numeric value is a schema violation.
const FLOW_KEYS: [&str; 5] = [
    "flow_duration",
    "total_packets",
    "total_bytes",
    "packets_per_second",
    "bytes_per_second",
];

/// Optional historical-frequency hint computed by the upstream normalizer.
const SUBJECT_FREQ_KEY: &str = "subject_event_count";

pub struct Vectorizer {
    schema: SchemaConfig,
}

impl Vectorizer {
    pub fn new(schema: SchemaConfig) -> Self {
        Self { schema }
    }

    /// Minimum feature_dim the layout needs: action one-hot + overflow slot,
    /// time-of-day, outcome one-hot, resource sensitivity, flow block,
    /// subject frequency.
    fn required_dim(&self) -> usize {
        self.schema.action_vocab.len() + 1 + 3 + 3 + 1 + FLOW_KEYS.len() + 1
    }

    pub fn vectorize(
        &self,
        event: &LogEvent,
        schema_version: u32,
    ) -> Result<FeatureVector, TriageError> {
        self.validate(event, schema_version)?;

        let dim = self.schema.feature_dim;
        let mut values = vec![0.0f32; dim];
        let mut i = 0;

        // Action one-hot with a single overflow slot for unknown actions.
        let vocab = &self.schema.action_vocab;
        match vocab.iter().position(|a| a == &event.action) {
            Some(pos) => values[i + pos] = 1.0,
            None => values[i + vocab.len()] = 1.0,
        }
        i += vocab.len() + 1;

        // Time of day as a point on the unit circle, plus day of week.
        let seconds = event.ts.num_seconds_from_midnight() as f32;
        let phase = seconds / 86_400.0 * std::f32::consts::TAU;
        values[i] = phase.sin();
        values[i + 1] = phase.cos();
        values[i + 2] = chrono::Datelike::weekday(&event.ts).num_days_from_monday() as f32 / 6.0;
        i += 3;

        // Outcome one-hot.
        let outcome_slot = match event.outcome {
            Outcome::Success => 0,
            Outcome::Failed => 1,
            Outcome::Denied => 2,
        };
        values[i + outcome_slot] = 1.0;
        i += 3;

        // Resource sensitivity: highest matching prefix weight.
        values[i] = self
            .schema
            .sensitive_resources
            .iter()
            .filter(|s| event.resource.starts_with(&s.prefix))
            .map(|s| s.weight)
            .fold(0.0, f32::max);
        i += 1;

        // Flow characteristics, log-scaled so byte counts and rates share a
        // comparable range.
        for key in FLOW_KEYS {
            if let Some(v) = event.metadata_f64(key) {
                values[i] = log_scale(v);
            }
            i += 1;
        }

        if let Some(v) = event.metadata_f64(SUBJECT_FREQ_KEY) {
            values[i] = log_scale(v);
        }

        Ok(FeatureVector {
            schema_version,
            values,
            event_id: event.id.clone(),
        })
    }

    fn validate(&self, event: &LogEvent, schema_version: u32) -> Result<(), TriageError> {
        let mismatch = |detail: String| TriageError::SchemaMismatch {
            version: schema_version,
            detail,
        };

        if schema_version != self.schema.version {
            return Err(mismatch(format!(
                "vectorizer accepts schema {}",
                self.schema.version
            )));
        }
        if self.schema.feature_dim < self.required_dim() {
            return Err(mismatch(format!(
                "feature_dim {} below layout minimum {}",
                self.schema.feature_dim,
                self.required_dim()
            )));
        }
        for (name, value) in [
            ("subject", &event.subject),
            ("action", &event.action),
            ("resource", &event.resource),
        ] {
            if value.trim().is_empty() {
                return Err(mismatch(format!("required field `{name}` is empty")));
            }
        }
        for key in FLOW_KEYS.iter().chain([SUBJECT_FREQ_KEY].iter()) {
            if let Some(v) = event.metadata.get(*key) {
                if !v.is_number() {
                    return Err(mismatch(format!("metadata `{key}` is not numeric")));
                }
            }
        }
        Ok(())
    }
}

/// ln(1+x) squashed to [0,1) with a soft knee around 1e6.
fn log_scale(v: f64) -> f32 {
    let x = (1.0 + v.max(0.0)).ln() as f32;
    (x / (1.0 + x)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaConfig;
    use crate::event::{LogSource, Outcome};

    fn sample_event() -> LogEvent {
        let mut ev = LogEvent::new(
            LogSource::Cicids,
            "user_123",
            "network_flow",
            "/admin/console",
            Outcome::Failed,
        );
        ev.metadata
            .insert("total_bytes".into(), serde_json::json!(48_211));
        ev
    }

    #[test]
    fn vectorize_is_deterministic() {
        let v = Vectorizer::new(SchemaConfig::default());
        let ev = sample_event();
        let a = v.vectorize(&ev, 1).unwrap();
        let b = v.vectorize(&ev, 1).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.dim(), SchemaConfig::default().feature_dim);
    }

    #[test]
    fn unknown_action_uses_overflow_slot() {
        let v = Vectorizer::new(SchemaConfig::default());
        let mut ev = sample_event();
        ev.action = "teleport".into();
        let fv = v.vectorize(&ev, 1).unwrap();
        let vocab_len = SchemaConfig::default().action_vocab.len();
        assert_eq!(fv.values[vocab_len], 1.0);
        assert!(fv.values[..vocab_len].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn sensitive_resource_weight_applied() {
        let v = Vectorizer::new(SchemaConfig::default());
        let fv = v.vectorize(&sample_event(), 1).unwrap();
        let sens_slot = SchemaConfig::default().action_vocab.len() + 1 + 3 + 3;
        assert_eq!(fv.values[sens_slot], 1.0);
    }

    #[test]
    fn wrong_schema_version_rejected() {
        let v = Vectorizer::new(SchemaConfig::default());
        let err = v.vectorize(&sample_event(), 2).unwrap_err();
        assert!(matches!(err, TriageError::SchemaMismatch { version: 2, .. }));
    }

    #[test]
    fn empty_required_field_rejected() {
        let v = Vectorizer::new(SchemaConfig::default());
        let mut ev = sample_event();
        ev.subject = "".into();
        assert!(matches!(
            v.vectorize(&ev, 1),
            Err(TriageError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn non_numeric_flow_field_rejected() {
        let v = Vectorizer::new(SchemaConfig::default());
        let mut ev = sample_event();
        ev.metadata
            .insert("total_packets".into(), serde_json::json!("many"));
        assert!(matches!(
            v.vectorize(&ev, 1),
            Err(TriageError::SchemaMismatch { .. })
        ));
    }
}
