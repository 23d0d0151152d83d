use criterion::*;
use std::hint::black_box;

use hive::prelude::*;
use hive::ComponentBase;

#[derive(Default)]
struct Agent {
    base: ComponentBase<Agent>,
    wealth: f32,
}

impl Component for Agent {
    type Args = f32;
    type DestroyArgs = ();

    fn base(&self) -> &ComponentBase<Self> {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase<Self> {
        &mut self.base
    }

    fn construct(&mut self, wealth: f32) {
        self.wealth = wealth;
    }
}

const AGENTS: u64 = 100_000;

type GrowableOrch = Orchestrator<Agent, GrowableStorage<Agent, 128>>;
type PartitionedOrch = Orchestrator<Agent, PartitionedGrowableStorage<Agent, 128>>;

fn populate(orchestrator: &mut GrowableOrch, count: u64) {
    for id in 0..count {
        orchestrator.push(id, id as f32);
    }
}

fn iterate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");

    group.bench_function("push_100k_growable", |b| {
        b.iter_batched(
            GrowableOrch::new,
            |mut orchestrator| {
                populate(&mut orchestrator, AGENTS);
                black_box(orchestrator);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("iter_write_wealth_100k", |b| {
        b.iter_batched(
            || {
                let mut orchestrator = GrowableOrch::new();
                populate(&mut orchestrator, AGENTS);
                orchestrator
            },
            |mut orchestrator| {
                for agent in orchestrator.iter_mut() {
                    agent.wealth *= 1.0001;
                }
                black_box(orchestrator);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("get_by_id_100k", |b| {
        b.iter_batched(
            || {
                let mut orchestrator = GrowableOrch::new();
                populate(&mut orchestrator, AGENTS);
                orchestrator
            },
            |orchestrator| {
                let mut total = 0.0f32;
                for id in 0..AGENTS {
                    if let Some(agent) = orchestrator.get(id) {
                        total += unsafe { agent.as_ref() }.wealth;
                    }
                }
                black_box(total);
                black_box(orchestrator);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("partitioned_push_pop_100k", |b| {
        b.iter_batched(
            PartitionedOrch::new,
            |mut orchestrator| {
                for id in 0..AGENTS {
                    orchestrator.push_in(id % 2 == 0, id, id as f32);
                }
                for id in (0..AGENTS).step_by(2) {
                    let ptr = orchestrator.get(id).expect("live id");
                    orchestrator.pop(ptr);
                }
                black_box(orchestrator);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, iterate_benchmark);
criterion_main!(benches);
