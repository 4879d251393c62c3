//! Pipeline configuration. Thresholds, fusion weights, and tier boundaries
//! are externally supplied policy, not constants baked into the components.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutosecConfig {
    /// Data directory (alert store, consumed spool files)
    pub data_dir: PathBuf,
    /// Path to the ONNX anomaly model
    pub model_path: PathBuf,
    /// Version tag recorded on every AnomalyScore
    pub model_version: String,
    /// Feature schema (vectorizer layout)
    pub schema: SchemaConfig,
    /// Anomaly scoring policy
    pub scorer: ScorerConfig,
    /// Intelligence index and retrieval
    pub intel: IntelConfig,
    /// Reasoning service client
    pub reasoner: ReasonerConfig,
    /// Decision fusion weights and tier boundaries
    pub fusion: FusionConfig,
    /// Spool-directory ingestion
    pub ingest: IngestConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Schema version the vectorizer accepts
    pub version: u32,
    /// Fixed feature vector length for this model version
    pub feature_dim: usize,
    /// Known actions, one-hot encoded in declaration order
    pub action_vocab: Vec<String>,
    /// Resource prefixes with a sensitivity weight in [0,1]
    pub sensitive_resources: Vec<SensitiveResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitiveResource {
    pub prefix: String,
    pub weight: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerConfig {
    /// Scores below this short-circuit the pipeline (no retrieval, no
    /// reasoning). Primary cost control.
    pub anomaly_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelConfig {
    /// Embedding dimensionality shared by all indexed documents
    pub embedding_dim: usize,
    /// Nearest neighbors retrieved per anomalous event
    pub top_k: usize,
    /// Index query timeout (milliseconds)
    pub query_timeout_ms: u64,
    /// Directory of JSONL intel corpus files loaded at startup
    pub corpus_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonerConfig {
    /// Reasoning-service endpoint; None disables reasoning (always degraded)
    pub endpoint: Option<String>,
    pub model: String,
    /// Per-call timeout (milliseconds)
    pub timeout_ms: u64,
    /// Bounded attempts for transient failures
    pub max_attempts: u32,
    /// Base delay for exponential backoff (milliseconds)
    pub backoff_base_ms: u64,
    /// Context budget in characters; lowest-similarity documents drop first
    pub context_budget_chars: usize,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Weight of the anomaly score in the severity combination
    pub anomaly_weight: f32,
    /// Weight of the (gated) reasoner confidence
    pub reasoner_weight: f32,
    /// Severity boundaries on the weighted score
    pub medium_threshold: f32,
    pub high_threshold: f32,
    /// Confidence boundaries for tier promotion
    pub medium_confidence: f32,
    pub high_confidence: f32,
    /// Minimum top retrieval similarity for an assessment to count as
    /// grounded
    pub min_relevance: f32,
    /// Applied to reasoner confidence when retrieval is below min_relevance
    pub grounding_discount: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Directory polled for .jsonl event batches
    pub spool_dir: PathBuf,
    /// Poll interval (seconds); 0 means process once and exit
    pub poll_interval_secs: u64,
    /// Concurrent triage runs
    pub max_in_flight: usize,
    /// In-memory terminal action records older than this are pruned between
    /// spool passes; the alert store keeps the durable copy
    pub record_retention_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for AutosecConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".autosec"),
            model_path: PathBuf::from("model.onnx"),
            model_version: "anomaly-v1".to_string(),
            schema: SchemaConfig::default(),
            scorer: ScorerConfig::default(),
            intel: IntelConfig::default(),
            reasoner: ReasonerConfig::default(),
            fusion: FusionConfig::default(),
            ingest: IngestConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            version: 1,
            feature_dim: 32,
            action_vocab: [
                "login",
                "logout",
                "api_call",
                "file_access",
                "network_flow",
                "privilege_change",
                "config_change",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            sensitive_resources: vec![
                SensitiveResource {
                    prefix: "/admin".to_string(),
                    weight: 1.0,
                },
                SensitiveResource {
                    prefix: "/secrets".to_string(),
                    weight: 1.0,
                },
                SensitiveResource {
                    prefix: "/billing".to_string(),
                    weight: 0.7,
                },
            ],
        }
    }
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            anomaly_threshold: 0.5,
        }
    }
}

impl Default for IntelConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 256,
            top_k: 5,
            query_timeout_ms: 2_000,
            corpus_dir: PathBuf::from("corpus"),
        }
    }
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "security-analyst".to_string(),
            timeout_ms: 15_000,
            max_attempts: 3,
            backoff_base_ms: 500,
            context_budget_chars: 6_000,
            max_tokens: 1024,
            temperature: 0.0,
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            anomaly_weight: 0.6,
            reasoner_weight: 0.4,
            medium_threshold: 0.5,
            high_threshold: 0.75,
            medium_confidence: 0.5,
            high_confidence: 0.6,
            min_relevance: 0.3,
            grounding_discount: 0.5,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            spool_dir: PathBuf::from("spool"),
            poll_interval_secs: 5,
            max_in_flight: 16,
            record_retention_secs: 3_600,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl AutosecConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<AutosecConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }
}
