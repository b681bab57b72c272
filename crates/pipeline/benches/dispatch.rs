//! Enqueue/dispatch throughput
//!
//! Measures a full inject → process → sink round trip through a single
//! pass-through stage, which is dominated by the vnode dispatch path.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use plumb_fittings::create_default_registry;
use plumb_pipeline::PipelineBuilder;
use plumb_protocol::{FittingSpec, Item, PartitionId, PipelineOptions, TraceLevel};

fn bench_dispatch(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let registry = Arc::new(create_default_registry());

    let mut group = c.benchmark_group("dispatch");
    for &count in &[100u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let registry = Arc::clone(&registry);
            b.to_async(&runtime).iter(|| {
                let registry = Arc::clone(&registry);
                async move {
                    let mut pipeline = PipelineBuilder::new(registry)
                        .options(PipelineOptions {
                            trace: TraceLevel::Off,
                            ..PipelineOptions::default()
                        })
                        .fitting(FittingSpec::new("echo", "pass"))
                        .build()
                        .unwrap();

                    for n in 0..count {
                        pipeline.inject(PartitionId::new(0), Item::from(n as i64)).await;
                    }
                    pipeline.eoi();

                    let items = pipeline.sink().drain_until_eoi().await;
                    assert_eq!(items.len(), count as usize);
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);
