use criterion::{criterion_group, criterion_main, Criterion};
use mosaiq_common::models::{QueryResult, Row, SourceKind};
use mosaiq_merge::{flatten_row, merge, MergeConfig, MergeStrategy};
use serde_json::{json, Value};

fn build_document(depth: usize, width: usize) -> Row {
    fn nested(depth: usize, width: usize) -> Value {
        if depth == 0 {
            return json!("leaf");
        }
        let mut map = serde_json::Map::new();
        for i in 0..width {
            map.insert(format!("k{i}"), nested(depth - 1, width));
        }
        Value::Object(map)
    }

    match nested(depth, width) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn build_result(rows: usize, depth: usize, width: usize) -> QueryResult {
    let docs: Vec<Row> = (0..rows).map(|_| build_document(depth, width)).collect();
    QueryResult::ok("doc1", SourceKind::Document, docs)
}

fn benchmark_flatten(c: &mut Criterion) {
    let mut group = c.benchmark_group("document_flatten");

    // Shallow, wide documents (the common API-response shape)
    let wide = build_document(2, 16);
    group.bench_function("flatten_wide_2x16", |b| {
        b.iter(|| {
            let _ = flatten_row(&wide);
        })
    });

    // Deep, narrow documents stress the recursion and key concatenation
    let deep = build_document(8, 2);
    group.bench_function("flatten_deep_8x2", |b| {
        b.iter(|| {
            let _ = flatten_row(&deep);
        })
    });

    group.finish();

    let mut group_merge = c.benchmark_group("merge_documents");
    let config = MergeConfig::new(MergeStrategy::Concat);

    let small = [build_result(100, 3, 4)];
    group_merge.bench_function("merge_100_docs_3x4", |b| {
        b.iter(|| {
            let _ = merge(&small, &config).unwrap();
        })
    });

    let large = [build_result(1000, 3, 4)];
    group_merge.bench_function("merge_1000_docs_3x4", |b| {
        b.iter(|| {
            let _ = merge(&large, &config).unwrap();
        })
    });

    group_merge.finish();
}

criterion_group!(benches, benchmark_flatten);
criterion_main!(benches);
