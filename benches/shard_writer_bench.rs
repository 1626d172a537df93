use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use pileshard::io::{write_shards, Record};

const NB_RECORDS: usize = 10_000;
// bench protocol:
//
// 10k records of ~1kB each, written with a 1MB shard budget
//
// - plain jsonl
// - gzipped jsonl

fn records() -> Vec<Record> {
    (0..NB_RECORDS)
        .map(|i| {
            Record::new(format!("doc-{}", i))
                .with_text("lorem ipsum dolor sit amet ".repeat(38))
                .with_source("bench")
        })
        .collect()
}

fn write(records: &[Record], filename: &str) {
    let dst = tempfile::tempdir().unwrap();
    write_shards(records.iter().cloned(), dst.path(), filename, 1_000_000).unwrap();
}

fn bench_writer(c: &mut Criterion) {
    let records = records();
    let mut group = c.benchmark_group("ShardWriter");
    group.sample_size(10);
    for filename in ["bench.jsonl", "bench.jsonl.gz"] {
        group.bench_with_input(
            BenchmarkId::new("write_shards", filename),
            &filename,
            |b, filename| b.iter(|| write(&records, filename)),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_writer);
criterion_main!(benches);
