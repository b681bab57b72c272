//! End-to-end pipeline tests
//!
//! Whole pipelines over the public API: inject, drain, relocate, kill.

use std::sync::Arc;
use std::time::Duration;

use plumb_fittings::{
    create_default_registry, Emit, Fitting, FittingError, FittingModule, FittingRegistry,
    FittingResult, InitCtx, Mapper,
};
use plumb_pipeline::{MetricsSnapshot, Pipeline, PipelineBuilder, PipelineError, WorkerRef};
use plumb_protocol::{Arg, FittingSpec, Item, PartitionId, Partfun, PipelineOptions, TraceLevel};
use plumb_routing::NodeId;
use tokio::time::timeout;

const P0: PartitionId = PartitionId::new(0);
const P1: PartitionId = PartitionId::new(1);

fn registry() -> Arc<FittingRegistry> {
    Arc::new(create_default_registry())
}

fn double_spec(name: &str) -> FittingSpec {
    FittingSpec::new(name, "xform").with_arg(Arg::shared(Mapper::map(|i: &Item| {
        Item::from(i.as_i64().unwrap() * 2)
    })))
}

fn add_one_spec(name: &str) -> FittingSpec {
    FittingSpec::new(name, "xform").with_arg(Arg::shared(Mapper::map(|i: &Item| {
        Item::from(i.as_i64().unwrap() + 1)
    })))
}

/// Poll the pipeline's counters until a condition holds
async fn wait_metrics(pipeline: &Pipeline, check: impl Fn(&MetricsSnapshot) -> bool) {
    timeout(Duration::from_secs(5), async {
        loop {
            if check(&pipeline.metrics()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("metrics condition not reached in time");
}

/// Poll a stage until its control is gone
async fn wait_stage_gone(pipeline: &Pipeline, name: &str) {
    let handle = pipeline.stage(name).expect("stage exists").clone();
    timeout(Duration::from_secs(5), async {
        loop {
            if handle.workers().await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("stage '{}' did not terminate", name));
}

/// Drain the sink with a guard against a wedged pipeline
async fn drain(pipeline: &mut Pipeline) -> Vec<Item> {
    timeout(Duration::from_secs(5), pipeline.sink().drain_until_eoi())
        .await
        .expect("pipeline did not reach EOI in time")
}

fn as_sorted_i64(items: &[Item]) -> Vec<i64> {
    let mut values: Vec<i64> = items.iter().map(|i| i.as_i64().unwrap()).collect();
    values.sort_unstable();
    values
}

#[tokio::test]
async fn test_single_stage_pass_through() {
    let mut pipeline = PipelineBuilder::new(registry())
        .fitting(FittingSpec::new("echo", "pass"))
        .build()
        .unwrap();

    for payload in ["a", "b", "c"] {
        pipeline.inject(P0, Item::from(payload)).await;
    }
    pipeline.eoi();

    // A single partition is a single FIFO queue: order is preserved
    let items = drain(&mut pipeline).await;
    assert_eq!(
        items,
        vec![Item::from("a"), Item::from("b"), Item::from("c")]
    );

    wait_stage_gone(&pipeline, "echo").await;
}

#[tokio::test]
async fn test_eoi_without_inputs_passes_straight_through() {
    let mut pipeline = PipelineBuilder::new(registry())
        .fitting(FittingSpec::new("echo", "pass"))
        .build()
        .unwrap();

    pipeline.eoi();

    let items = drain(&mut pipeline).await;
    assert!(items.is_empty());
    wait_stage_gone(&pipeline, "echo").await;

    let snapshot = pipeline.metrics();
    assert_eq!(snapshot.workers_spawned, 0);
    assert_eq!(snapshot.eoi_forwards, 1);
}

#[tokio::test]
async fn test_two_stages_two_partitions_follow_routing() {
    let mut pipeline = PipelineBuilder::new(registry())
        .fitting(double_spec("double").with_partfun(Partfun::Follow))
        .fitting(add_one_spec("add-one"))
        .build()
        .unwrap();

    pipeline.inject(P0, Item::from(1i64)).await;
    pipeline.inject(P1, Item::from(2i64)).await;
    pipeline.eoi();

    let items = drain(&mut pipeline).await;
    assert_eq!(as_sorted_i64(&items), vec![3, 5]);

    // Termination: every control winds down once EOI has passed through
    wait_stage_gone(&pipeline, "double").await;
    wait_stage_gone(&pipeline, "add-one").await;

    let snapshot = pipeline.metrics();
    assert_eq!(snapshot.items_processed, 4);
    assert_eq!(snapshot.eoi_forwards, 2);
}

#[tokio::test]
async fn test_partfun_spreads_outputs_across_partitions() {
    // A stage's partfun routes items INTO it: "gather" spreads its inputs
    // across two partitions by parity
    let mut pipeline = PipelineBuilder::new(registry())
        .fitting(FittingSpec::new("scatter", "pass"))
        .fitting(
            FittingSpec::new("gather", "pass").with_partfun(Partfun::fun(|item: &Item| {
                PartitionId::new(item.as_i64().unwrap_or(0) as u32 % 2)
            })),
        )
        .build()
        .unwrap();

    for n in 1i64..=4 {
        pipeline.inject(P0, Item::from(n)).await;
    }

    // The second stage ends up with one worker per target partition
    timeout(Duration::from_secs(5), async {
        loop {
            let workers = pipeline.stage("gather").unwrap().workers().await.unwrap();
            if workers.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("scatter should reach both partitions");

    pipeline.eoi();
    let items = drain(&mut pipeline).await;
    assert_eq!(as_sorted_i64(&items), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_handoff_preserves_the_output_multiset() {
    let mut pipeline = PipelineBuilder::new(registry())
        .nodes(2)
        .fitting(double_spec("double"))
        .build()
        .unwrap();

    for n in 1i64..=4 {
        pipeline.inject(P0, Item::from(n)).await;
    }
    wait_metrics(&pipeline, |m| m.items_processed >= 2).await;

    // Relocate P0 to the second node mid-stream
    let stage = pipeline.stage("double").unwrap().clone();
    let from = pipeline.node(NodeId::new(0)).unwrap().clone();
    let to = pipeline.node(NodeId::new(1)).unwrap().clone();
    from.start_handoff(&stage, P0, &to);

    pipeline.eoi();

    let items = drain(&mut pipeline).await;
    assert_eq!(as_sorted_i64(&items), vec![2, 4, 6, 8]);

    let snapshot = pipeline.metrics();
    assert_eq!(snapshot.handoffs, 1);
    assert_eq!(snapshot.workers_spawned, 2);
    wait_stage_gone(&pipeline, "double").await;
}

#[tokio::test]
async fn test_handoff_carries_module_state() {
    let mut pipeline = PipelineBuilder::new(registry())
        .nodes(2)
        .fitting(FittingSpec::new("total", "sum"))
        .build()
        .unwrap();

    for n in [1i64, 2, 3, 4] {
        pipeline.inject(P0, Item::from(n)).await;
    }
    wait_metrics(&pipeline, |m| m.items_processed == 4).await;

    // The whole running total must travel in the archive
    let stage = pipeline.stage("total").unwrap().clone();
    let from = pipeline.node(NodeId::new(0)).unwrap().clone();
    let to = pipeline.node(NodeId::new(1)).unwrap().clone();
    from.start_handoff(&stage, P0, &to);

    pipeline.eoi();

    let items = drain(&mut pipeline).await;
    assert_eq!(items, vec![Item::from(10i64)]);

    let snapshot = pipeline.metrics();
    assert_eq!(snapshot.handoffs, 1);
    assert_eq!(snapshot.workers_spawned, 2);
}

#[tokio::test]
async fn test_builder_death_abandons_the_pipeline() {
    let mut pipeline = PipelineBuilder::new(registry())
        .fitting(FittingSpec::new("echo", "pass"))
        .build()
        .unwrap();

    pipeline.inject(P0, Item::from("live")).await;
    match timeout(Duration::from_secs(5), pipeline.sink().recv())
        .await
        .unwrap()
        .unwrap()
    {
        plumb_pipeline::SinkEvent::Result { item, .. } => assert_eq!(item, Item::from("live")),
        other => panic!("expected a result, got {:?}", other),
    }

    pipeline.abort();
    wait_stage_gone(&pipeline, "echo").await;

    // A relocated worker arriving now finds nobody home
    let handle = pipeline.stage("echo").unwrap();
    let vnode = pipeline.node(NodeId::new(0)).unwrap().clone();
    let err = handle
        .get_details(P1, WorkerRef::new(), vnode)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Gone));
}

#[tokio::test]
async fn test_fan_out_delivery() {
    let fan = Mapper::new(|i: &Item| {
        let n = i.as_i64().unwrap();
        vec![Item::from(n), Item::from(n + 100)]
    });
    let mut pipeline = PipelineBuilder::new(registry())
        .options(PipelineOptions {
            trace: TraceLevel::Verbose,
            ..PipelineOptions::default()
        })
        .fitting(FittingSpec::new("fan", "xform").with_arg(Arg::shared(fan)))
        .fitting(FittingSpec::new("relay", "pass"))
        .build()
        .unwrap();

    for n in [1i64, 2, 3] {
        pipeline.inject(P0, Item::from(n)).await;
    }
    pipeline.eoi();

    // No duplicates, no losses
    let items = drain(&mut pipeline).await;
    assert_eq!(as_sorted_i64(&items), vec![1, 2, 3, 101, 102, 103]);
}

#[tokio::test]
async fn test_rejected_spec_aborts_construction() {
    let err = PipelineBuilder::new(registry())
        .fitting(FittingSpec::new("bad", "no-such-module"))
        .build()
        .unwrap_err();
    assert!(matches!(err, PipelineError::Spec(_)));

    let err = PipelineBuilder::new(registry()).build().unwrap_err();
    assert!(err.to_string().contains("no fittings"));

    // xform without its mapper argument fails validation, not first input
    let err = PipelineBuilder::new(registry())
        .fitting(FittingSpec::new("maim", "xform").with_arg(Arg::value(1)))
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("Mapper"));
}

// A module whose instances refuse to start, for the vanish path
struct Stillborn;

impl Fitting for Stillborn {
    fn init(&mut self, _ctx: &InitCtx<'_>) -> FittingResult<()> {
        Err(FittingError::failed("refusing to start"))
    }

    fn process(&mut self, _item: Item, _out: &mut dyn Emit) -> FittingResult<()> {
        unreachable!("init always fails")
    }

    fn done(&mut self, _out: &mut dyn Emit) -> FittingResult<()> {
        unreachable!("init always fails")
    }
}

struct StillbornModule;

impl FittingModule for StillbornModule {
    fn create(&self, _arg: &Arg) -> FittingResult<Box<dyn Fitting>> {
        Ok(Box::new(Stillborn))
    }

    fn name(&self) -> &'static str {
        "stillborn"
    }
}

#[tokio::test]
async fn test_init_failure_is_tolerated_by_the_barrier() {
    let mut registry = FittingRegistry::new();
    registry.register("stillborn", StillbornModule);

    let mut pipeline = PipelineBuilder::new(Arc::new(registry))
        .fitting(FittingSpec::new("doomed", "stillborn"))
        .build()
        .unwrap();

    // The worker registers, then dies in init; its monitor cleans up
    pipeline.inject(P0, Item::from(1i64)).await;
    wait_metrics(&pipeline, |m| m.workers_vanished == 1).await;

    pipeline.eoi();
    let items = drain(&mut pipeline).await;
    assert!(items.is_empty());
    wait_stage_gone(&pipeline, "doomed").await;
}
