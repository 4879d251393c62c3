//! Deterministic feature-hashing text embedder. Used for corpus documents
//! that ship without precomputed embeddings and for query-side event text,
//! so every vector in the index lives on the same scale.

use sha2::{Digest, Sha256};

pub struct TextEmbedder {
    dim: usize,
}

impl TextEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Hash each token into a signed slot and L2-normalize the accumulation.
    /// Token hashing uses SHA-256 so embeddings are stable across processes
    /// and releases.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut values = vec![0.0f32; self.dim];
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let slot = u64::from_le_bytes(digest[..8].try_into().expect("digest slice")) as usize
                % self.dim;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            values[slot] += sign;
        }
        normalize(&mut values);
        values
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(|t| t.to_lowercase())
}

pub(crate) fn normalize(values: &mut [f32]) {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in values.iter_mut() {
            *v /= norm;
        }
    }
}
