use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use telemetrygen::{GenerationConfig, Generator, NullSink, RecordBuilder, Resource};

const RECORDS: u64 = 100_000;

fn bench_record_builder(c: &mut Criterion) {
    let resource = Resource::new(
        [
            ("service.name", "bench"),
            ("host.name", "bench-host"),
            ("deployment.environment", "perf"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
    );
    let builder = RecordBuilder::new(Arc::new(resource), GenerationConfig::default().record_attributes);

    c.bench_function("record_builder/build_now", |b| {
        b.iter(|| criterion::black_box(builder.build_now()));
    });
}

fn bench_unthrottled_run(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("generator");
    group.throughput(Throughput::Elements(RECORDS));
    group.sample_size(10);

    for workers in [1usize, 4, 16] {
        group.bench_with_input(BenchmarkId::new("null_sink", workers), &workers, |b, &workers| {
            b.to_async(&runtime).iter(|| async move {
                let config = GenerationConfig::count(RECORDS).with_workers(workers);
                let report = Generator::new(config, Arc::new(NullSink::new()))
                    .run()
                    .await
                    .unwrap();
                assert_eq!(report.total_records, RECORDS);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_record_builder, bench_unthrottled_run);
criterion_main!(benches);
