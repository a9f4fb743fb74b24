use std::convert::Infallible;
use std::hint::black_box;
use std::io::Cursor;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use geoimport::validate::validate_chunk;
use geoimport::{validate_line, ColumnMapping, ImportProcessor, MemoryStore, PipelineConfig};

const HEADER: &str = "ip,country_code,country,city,latitude,longitude,mystery_value";

fn sample_chunk(lines: usize) -> String {
    (0..lines)
        .map(|i| {
            format!(
                "10.{}.{}.{},SI,Nepal,DuBuquemouth,-84.875,{}.{:04},7823011346\n",
                (i >> 16) & 0xFF,
                (i >> 8) & 0xFF,
                i & 0xFF,
                (i / 10_000) % 180,
                i % 10_000
            )
        })
        .collect()
}

fn bench_validate_line_valid(c: &mut Criterion) {
    let mapping = ColumnMapping::from_header(HEADER);
    let line = "70.95.73.73,SI,Nepal,DuBuquemouth,-84.875,7.206,7823011346";
    c.bench_function("validate_line_valid", |b| {
        b.iter(|| {
            black_box(validate_line(black_box(line), &mapping).is_ok());
        });
    });
}

fn bench_validate_line_bad_ip(c: &mut Criterion) {
    let mapping = ColumnMapping::from_header(HEADER);
    let line = "70.95.73.73.1,SI,Nepal,DuBuquemouth,-84.875,7.206,7823011346";
    c.bench_function("validate_line_bad_ip", |b| {
        b.iter(|| {
            black_box(validate_line(black_box(line), &mapping).is_err());
        });
    });
}

fn bench_validate_chunk(c: &mut Criterion) {
    let mapping = ColumnMapping::from_header(HEADER);
    let chunk = sample_chunk(10_000);
    let mut group = c.benchmark_group("validate_chunk");
    group.throughput(Throughput::Bytes(chunk.len() as u64));
    group.bench_function("10k_lines", |b| {
        b.iter(|| {
            let outcome = validate_chunk::<_, Infallible>(chunk.as_bytes(), &mapping, |record| {
                black_box(record);
                Ok(())
            });
            black_box(outcome)
        });
    });
    group.finish();
}

fn bench_pipeline_dry_run(c: &mut Criterion) {
    let mut input = String::from(HEADER);
    input.push('\n');
    input.push_str(&sample_chunk(50_000));

    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    group.throughput(Throughput::Bytes(input.len() as u64));
    group.bench_function("dry_run_50k_lines", |b| {
        b.iter(|| {
            let store = MemoryStore::discarding();
            let summary = ImportProcessor::new(PipelineConfig::default())
                .run(Cursor::new(input.as_bytes()), &store)
                .unwrap();
            black_box(summary.valid)
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_validate_line_valid,
    bench_validate_line_bad_ip,
    bench_validate_chunk,
    bench_pipeline_dry_run
);
criterion_main!(benches);
