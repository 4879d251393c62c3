//! Startup corpus loading: JSONL intel files under a directory are parsed,
//! embedded when they carry no precomputed embedding, and upserted into the
//! index. Malformed lines are skipped, not fatal.

use crate::error::Result;
use crate::intel::{IntelDocument, IntelIndex, SourceType, TextEmbedder};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Deserialize)]
struct RawDocument {
    id: String,
    source: SourceType,
    text: String,
    /// Precomputed embedding; text-only corpora omit it.
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

/// Load every `.jsonl` file under `dir` into the index. Returns the number of
/// documents indexed.
pub async fn load_corpus(
    dir: &Path,
    embedder: &TextEmbedder,
    index: &dyn IntelIndex,
) -> Result<usize> {
    let mut loaded = 0usize;

    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        let data = std::fs::read_to_string(path)?;
        for (lineno, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let raw: RawDocument = match serde_json::from_str(line) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(file = %path.display(), line = lineno + 1, error = %e, "skipping corpus line");
                    continue;
                }
            };
            let embedding = match raw.embedding {
                Some(embedding) => embedding,
                None => embedder.embed(&raw.text),
            };
            let doc = IntelDocument {
                id: raw.id,
                source: raw.source,
                embedding,
                text: raw.text,
            };
            match index.upsert(doc).await {
                Ok(()) => loaded += 1,
                Err(e) => {
                    warn!(file = %path.display(), line = lineno + 1, error = %e, "corpus upsert rejected")
                }
            }
        }
    }

    info!(count = loaded, dir = %dir.display(), "intel corpus loaded");
    Ok(loaded)
}
