//! AutoSec Core — autonomous security-event triage pipeline.
//!
//! Modular structure:
//! - [`event`] — Normalized security log events
//! - [`features`] — Deterministic feature vectorization
//! - [`model`] — ONNX anomaly scoring with hot model rotation
//! - [`intel`] — Threat-intelligence similarity index
//! - [`reason`] — Retrieval-augmented threat assessment
//! - [`fusion`] — Confidence-weighted severity and tier decisions
//! - [`response`] — Tiered action execution with approval gating
//! - [`orchestrator`] — Per-event pipeline sequencing
//! - [`storage`] — Encrypted alert store and corpus loading
//! - [`logging`] — Structured JSON logging

pub mod config;
pub mod error;
pub mod event;
pub mod features;
pub mod fusion;
pub mod intel;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod reason;
pub mod response;
pub mod storage;

pub use config::AutosecConfig;
pub use error::{Result, TriageError};
pub use event::{LogEvent, LogSource, Outcome};
pub use features::{FeatureVector, Vectorizer};
pub use fusion::{DecisionFuser, Severity, Tier, Verdict};
pub use intel::{IntelDocument, IntelIndex, MemoryIntelIndex, RetrievalResult, TextEmbedder};
pub use logging::StructuredLogger;
pub use model::{AnomalyModel, AnomalyScore, OnnxModel, ScorerHandle, StaticModel};
pub use orchestrator::{Orchestrator, Stage, TriageOutcome};
pub use reason::{HttpReasoner, Reasoner, ThreatAssessment};
pub use response::{ActionRecord, ActionStatus, LogOnlyExecutor, ResponseMachine};
pub use storage::AlertStore;
