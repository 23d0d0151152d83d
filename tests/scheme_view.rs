use std::sync::atomic::{AtomicUsize, Ordering};

use hive::prelude::*;
use hive::ComponentBase;

#[derive(Default)]
struct Client {
    base: ComponentBase<Client>,
    side: bool,
    hits: u32,
}

impl Component for Client {
    type Args = bool;
    type DestroyArgs = ();

    fn base(&self) -> &ComponentBase<Self> {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase<Self> {
        &mut self.base
    }

    fn construct(&mut self, side: bool) {
        self.side = side;
    }
}

#[derive(Default)]
struct Npc {
    base: ComponentBase<Npc>,
    side: bool,
}

impl Component for Npc {
    type Args = bool;
    type DestroyArgs = ();

    fn base(&self) -> &ComponentBase<Self> {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase<Self> {
        &mut self.base
    }

    fn construct(&mut self, side: bool) {
        self.side = side;
    }
}

type GrowStore = SchemeStore<(
    Orchestrator<Client, GrowableStorage<Client, 128>>,
    Orchestrator<Npc, GrowableStorage<Npc, 128>>,
)>;

type PartStore = SchemeStore<(
    Orchestrator<Client, PartitionedGrowableStorage<Client, 128>>,
    Orchestrator<Npc, PartitionedGrowableStorage<Npc, 128>>,
)>;

fn grow_scheme() -> Scheme<(Client, Npc)> {
    Scheme::new()
}

fn populate_grow(store: &mut GrowStore, count: u64) {
    let scheme = grow_scheme();
    for id in 0..count {
        scheme.create(store, id, (scheme.args(false), scheme.args(false)));
    }
}

fn populate_partitioned(store: &mut PartStore, on_true: u64, on_false: u64) {
    let scheme = Scheme::<(Client, Npc)>::new();
    for id in 0..on_true {
        scheme.create(store, id, (scheme.args_in(true, true), scheme.args_in(true, true)));
    }
    for id in 0..on_false {
        let id = on_true + id;
        scheme.create(store, id, (scheme.args_in(false, false), scheme.args_in(false, false)));
    }
}

#[test]
fn continuous_walks_aligned_tuples_in_order() {
    let pool = WorkerPool::new(2).expect("worker pool");
    let counter = WaitCounter::new();
    let mut store = GrowStore::new();
    populate_grow(&mut store, 2);

    let index = AtomicUsize::new(0);
    SchemeView::<(Client, Npc)>::continuous(&counter, &pool, &mut store, |client, npc| {
        let expected = index.fetch_add(1, Ordering::AcqRel) as u64;
        assert_eq!(client.id(), expected);
        assert_eq!(npc.id(), expected);
        client.hits += 1;
    });

    counter.wait();
    assert_eq!(index.load(Ordering::Acquire), 2);
    for client in store.get::<Client, _>().iter() {
        assert_eq!(client.hits, 1);
    }
}

#[test]
fn parallel_visits_every_tuple_exactly_once() {
    let pool = WorkerPool::new(4).expect("worker pool");
    let counter = WaitCounter::new();
    let mut store = GrowStore::new();
    populate_grow(&mut store, 2);

    let visited = AtomicUsize::new(0);
    SchemeView::<(Client, Npc)>::parallel(&counter, &pool, &mut store, |client, npc| {
        // no ordering between elements; only the pairing is guaranteed
        assert_eq!(client.id(), npc.id());
        client.hits += 1;
        visited.fetch_add(1, Ordering::AcqRel);
    });

    counter.wait();
    assert_eq!(visited.load(Ordering::Acquire), 2);
    for client in store.get::<Client, _>().iter() {
        assert_eq!(client.hits, 1);
    }
}

#[test]
fn continuous_by_resolves_peers_through_search() {
    let pool = WorkerPool::new(2).expect("worker pool");
    let counter = WaitCounter::new();
    let mut store = GrowStore::new();
    populate_grow(&mut store, 3);

    let visited = AtomicUsize::new(0);
    SchemeView::<(Client, Npc)>::continuous_by::<Npc, _, _, _, _, _, _>(
        &counter,
        &pool,
        &mut store,
        |client, npc| {
            assert_eq!(client.id(), npc.id());
            visited.fetch_add(1, Ordering::AcqRel);
        },
    );

    counter.wait();
    assert_eq!(visited.load(Ordering::Acquire), 3);
}

#[test]
fn parallel_by_resolves_peers_through_search() {
    let pool = WorkerPool::new(4).expect("worker pool");
    let counter = WaitCounter::new();
    let mut store = GrowStore::new();
    populate_grow(&mut store, 5);

    let visited = AtomicUsize::new(0);
    SchemeView::<(Client, Npc)>::parallel_by::<Npc, _, _, _, _, _, _>(
        &counter,
        &pool,
        &mut store,
        |client, npc| {
            assert_eq!(client.id(), npc.id());
            visited.fetch_add(1, Ordering::AcqRel);
        },
    );

    counter.wait();
    assert_eq!(visited.load(Ordering::Acquire), 5);
}

#[test]
fn views_over_an_empty_scheme_schedule_nothing() {
    let pool = WorkerPool::new(2).expect("worker pool");
    let counter = WaitCounter::new();
    let mut store = GrowStore::new();

    SchemeView::<(Client, Npc)>::continuous(&counter, &pool, &mut store, |_c, _n| {
        panic!("no element should be visited");
    });
    SchemeView::<(Client, Npc)>::parallel(&counter, &pool, &mut store, |_c, _n| {
        panic!("no element should be visited");
    });

    counter.wait();
    assert_eq!(counter.completed(), 0);

    // nothing was locked; the store accepts mutation right away
    populate_grow(&mut store, 1);
    assert_eq!(grow_scheme().len(&store), 1);
}

#[test]
fn mutation_is_restored_after_wait() {
    let pool = WorkerPool::new(2).expect("worker pool");
    let mut store = GrowStore::new();
    populate_grow(&mut store, 2);

    let counter = WaitCounter::new();
    SchemeView::<(Client, Npc)>::continuous(&counter, &pool, &mut store, |client, _npc| {
        client.hits += 1;
    });
    counter.wait();

    // the wait callback released the write locks
    populate_grow(&mut store, 1);
    assert_eq!(grow_scheme().len(&store), 3);
}

#[test]
fn until_partition_views_see_only_the_true_side() {
    let pool = WorkerPool::new(2).expect("worker pool");
    let mut store = PartStore::new();
    populate_partitioned(&mut store, 3, 2);

    let counter = WaitCounter::new();
    let visited = AtomicUsize::new(0);
    SchemeViewUntilPartition::<(Client, Npc)>::continuous(
        &counter,
        &pool,
        &mut store,
        |client, npc| {
            assert!(client.side);
            assert!(npc.side);
            visited.fetch_add(1, Ordering::AcqRel);
        },
    );
    counter.wait();
    assert_eq!(visited.load(Ordering::Acquire), 3);

    let counter = WaitCounter::new();
    let visited = AtomicUsize::new(0);
    SchemeViewUntilPartition::<(Client, Npc)>::parallel(
        &counter,
        &pool,
        &mut store,
        |client, npc| {
            assert!(client.side && npc.side);
            visited.fetch_add(1, Ordering::AcqRel);
        },
    );
    counter.wait();
    assert_eq!(visited.load(Ordering::Acquire), 3);
}

#[test]
fn from_partition_views_see_only_the_false_side() {
    let pool = WorkerPool::new(2).expect("worker pool");
    let mut store = PartStore::new();
    populate_partitioned(&mut store, 3, 2);

    let counter = WaitCounter::new();
    let visited = AtomicUsize::new(0);
    SchemeViewFromPartition::<(Client, Npc)>::continuous(
        &counter,
        &pool,
        &mut store,
        |client, npc| {
            assert!(!client.side);
            assert!(!npc.side);
            visited.fetch_add(1, Ordering::AcqRel);
        },
    );
    counter.wait();
    assert_eq!(visited.load(Ordering::Acquire), 2);

    let counter = WaitCounter::new();
    let visited = AtomicUsize::new(0);
    SchemeViewFromPartition::<(Client, Npc)>::parallel_by::<Client, _, _, _, _, _, _>(
        &counter,
        &pool,
        &mut store,
        |client, npc| {
            assert!(!client.side && !npc.side);
            visited.fetch_add(1, Ordering::AcqRel);
        },
    );
    counter.wait();
    assert_eq!(visited.load(Ordering::Acquire), 2);
}

#[test]
fn partition_views_skip_an_empty_side() {
    let pool = WorkerPool::new(2).expect("worker pool");
    let mut store = PartStore::new();
    populate_partitioned(&mut store, 0, 2);

    let counter = WaitCounter::new();
    SchemeViewUntilPartition::<(Client, Npc)>::continuous(
        &counter,
        &pool,
        &mut store,
        |_client, _npc| {
            panic!("the true side is empty");
        },
    );
    counter.wait();
    assert_eq!(counter.completed(), 0);
}
