//! Threat-intelligence similarity index: embedded MITRE technique
//! descriptions, CVE text, and past-incident summaries.

mod embed;
mod index;

pub use embed::TextEmbedder;
pub use index::MemoryIntelIndex;

use crate::error::TriageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Technique,
    Cve,
    Incident,
}

/// Immutable once indexed; owned exclusively by the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelDocument {
    pub id: String,
    pub source: SourceType,
    /// Stored L2-normalized so cosine similarity reduces to a dot product.
    /// Intel from different sources must be comparable on one scale.
    pub embedding: Vec<f32>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub doc_id: String,
    pub similarity: f32,
}

/// ≤ k hits, descending similarity, ties broken by ascending document id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<RetrievalHit>,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self { hits: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn max_similarity(&self) -> f32 {
        self.hits.first().map(|h| h.similarity).unwrap_or(0.0)
    }
}

/// Similarity index over intel documents. Query and mutation may be backed by
/// a remote or disk-backed store; both are awaited with caller timeouts.
#[async_trait]
pub trait IntelIndex: Send + Sync {
    /// k nearest documents by cosine similarity. An empty index yields an
    /// empty result, not an error; an empty corpus is a degraded but valid
    /// operating mode.
    async fn query(&self, embedding: &[f32], k: usize) -> Result<RetrievalResult, TriageError>;

    async fn upsert(&self, doc: IntelDocument) -> Result<(), TriageError>;

    async fn remove(&self, id: &str) -> Result<bool, TriageError>;

    async fn get(&self, id: &str) -> Option<Arc<IntelDocument>>;

    async fn len(&self) -> usize;
}
