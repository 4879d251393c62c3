//! Retrieval benchmark: k-nearest query against a populated intel index.

use autosec_core::intel::{IntelDocument, IntelIndex, MemoryIntelIndex, SourceType, TextEmbedder};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const DIM: usize = 256;

fn populate(index: &MemoryIntelIndex, embedder: &TextEmbedder, n: usize) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        for i in 0..n {
            let text = format!("technique {} lateral movement over remote services", i);
            let doc = IntelDocument {
                id: format!("T{:04}", i),
                source: SourceType::Technique,
                embedding: embedder.embed(&text),
                text,
            };
            index.upsert(doc).await.unwrap();
        }
    });
}

fn bench_query_1000_docs(c: &mut Criterion) {
    let embedder = TextEmbedder::new(DIM);
    let index = MemoryIntelIndex::new(DIM);
    populate(&index, &embedder, 1000);
    let query = embedder.embed("denied privilege change on admin resource");
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("intel_query_1000_docs_top5", |b| {
        b.iter(|| rt.block_on(index.query(black_box(&query), 5)))
    });
}

fn bench_embed(c: &mut Criterion) {
    let embedder = TextEmbedder::new(DIM);
    let text = "repeated authentication failures from a single subject against /admin";

    c.bench_function("embed_summary", |b| {
        b.iter(|| embedder.embed(black_box(text)))
    });
}

criterion_group!(benches, bench_query_1000_docs, bench_embed);
criterion_main!(benches);
