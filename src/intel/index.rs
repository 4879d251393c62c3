//! In-memory intel index. Documents are held behind Arcs and replaced
//! wholesale on upsert, so a concurrent query never observes a partially
//! updated document.

use super::{embed, IntelDocument, IntelIndex, RetrievalHit, RetrievalResult};
use crate::error::TriageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub struct MemoryIntelIndex {
    dim: usize,
    docs: RwLock<HashMap<String, Arc<IntelDocument>>>,
}

impl MemoryIntelIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            docs: RwLock::new(HashMap::new()),
        }
    }

    fn check_dim(&self, got: usize) -> Result<(), TriageError> {
        if got != self.dim {
            return Err(TriageError::EmbeddingDimension {
                expected: self.dim,
                got,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl IntelIndex for MemoryIntelIndex {
    async fn query(&self, embedding: &[f32], k: usize) -> Result<RetrievalResult, TriageError> {
        self.check_dim(embedding.len())?;

        let snapshot: Vec<Arc<IntelDocument>> = {
            let docs = self.docs.read().expect("index lock");
            docs.values().cloned().collect()
        };

        // Embeddings are stored normalized, so cosine similarity is a dot
        // product.
        let mut hits: Vec<RetrievalHit> = snapshot
            .iter()
            .map(|doc| RetrievalHit {
                doc_id: doc.id.clone(),
                similarity: dot(embedding, &doc.embedding),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        hits.truncate(k);

        Ok(RetrievalResult { hits })
    }

    async fn upsert(&self, mut doc: IntelDocument) -> Result<(), TriageError> {
        self.check_dim(doc.embedding.len())?;
        embed::normalize(&mut doc.embedding);
        self.docs
            .write()
            .expect("index lock")
            .insert(doc.id.clone(), Arc::new(doc));
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool, TriageError> {
        Ok(self.docs.write().expect("index lock").remove(id).is_some())
    }

    async fn get(&self, id: &str) -> Option<Arc<IntelDocument>> {
        self.docs.read().expect("index lock").get(id).cloned()
    }

    async fn len(&self) -> usize {
        self.docs.read().expect("index lock").len()
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intel::SourceType;

    fn doc(id: &str, embedding: Vec<f32>) -> IntelDocument {
        IntelDocument {
            id: id.to_string(),
            source: SourceType::Technique,
            embedding,
            text: format!("doc {id}"),
        }
    }

    #[tokio::test]
    async fn empty_index_returns_empty_result() {
        let index = MemoryIntelIndex::new(4);
        let result = index.query(&[1.0, 0.0, 0.0, 0.0], 5).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(result.max_similarity(), 0.0);
    }

    #[tokio::test]
    async fn query_sorted_descending_with_id_tiebreak() {
        let index = MemoryIntelIndex::new(2);
        index.upsert(doc("b", vec![1.0, 0.0])).await.unwrap();
        index.upsert(doc("a", vec![1.0, 0.0])).await.unwrap();
        index.upsert(doc("c", vec![0.0, 1.0])).await.unwrap();

        let result = index.query(&[1.0, 0.0], 3).await.unwrap();
        let ids: Vec<&str> = result.hits.iter().map(|h| h.doc_id.as_str()).collect();
        // Equal-similarity docs ordered by id; orthogonal doc last.
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(result.hits[0].similarity >= result.hits[1].similarity);
        assert!(result.hits[1].similarity > result.hits[2].similarity);
    }

    #[tokio::test]
    async fn query_respects_k_and_index_size() {
        let index = MemoryIntelIndex::new(2);
        for i in 0..4 {
            index
                .upsert(doc(&format!("d{i}"), vec![1.0, i as f32]))
                .await
                .unwrap();
        }
        assert_eq!(index.query(&[1.0, 0.0], 2).await.unwrap().hits.len(), 2);
        assert_eq!(index.query(&[1.0, 0.0], 10).await.unwrap().hits.len(), 4);
    }

    #[tokio::test]
    async fn upsert_replaces_and_remove_deletes() {
        let index = MemoryIntelIndex::new(2);
        index.upsert(doc("x", vec![1.0, 0.0])).await.unwrap();
        index.upsert(doc("x", vec![0.0, 1.0])).await.unwrap();
        assert_eq!(index.len().await, 1);

        let result = index.query(&[0.0, 1.0], 1).await.unwrap();
        assert!((result.hits[0].similarity - 1.0).abs() < 1e-5);

        assert!(index.remove("x").await.unwrap());
        assert!(!index.remove("x").await.unwrap());
        assert_eq!(index.len().await, 0);
    }

    #[tokio::test]
    async fn dimension_mismatch_rejected() {
        let index = MemoryIntelIndex::new(4);
        let err = index.upsert(doc("x", vec![1.0, 0.0])).await.unwrap_err();
        assert!(matches!(
            err,
            TriageError::EmbeddingDimension {
                expected: 4,
                got: 2
            }
        ));
    }
}
