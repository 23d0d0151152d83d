use hive::engine::random::{tl_rand_bool, tl_rand_index};
use hive::prelude::*;
use hive::ComponentBase;

#[derive(Default)]
struct Client {
    base: ComponentBase<Client>,
    side: bool,
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

const INITIAL_SIZE: usize = 100;
const CAPACITY: usize = INITIAL_SIZE * 2;
const MOVES: usize = 100;

type GrowableOrch = Orchestrator<Client, GrowableStorage<Client, CAPACITY>>;
type StaticOrch = Orchestrator<Client, StaticStorage<Client, CAPACITY>>;
type StaticGrowableOrch = Orchestrator<Client, StaticGrowableStorage<Client, CAPACITY>>;
type PartStaticOrch = Orchestrator<Client, PartitionedStaticStorage<Client, CAPACITY>>;
type PartGrowableOrch = Orchestrator<Client, PartitionedGrowableStorage<Client, CAPACITY>>;

fn assert_exclusive<SA, SB>(
    a: &Orchestrator<Client, SA>,
    b: &Orchestrator<Client, SB>,
    id: u64,
) where
    SA: Storage<Client>,
    SB: Storage<Client>,
{
    let in_a = a.get(id).is_some();
    let in_b = b.get(id).is_some();
    assert!(in_a ^ in_b, "id {id} must live in exactly one orchestrator");
}

fn assert_consistent<S: Storage<Client>>(orchestrator: &Orchestrator<Client, S>) {
    assert_eq!(orchestrator.iter().count(), orchestrator.len());
}

fn assert_partition_consistent<S>(orchestrator: &Orchestrator<Client, S>)
where
    S: PartitionedStorage<Client>,
{
    let until = orchestrator.iter_until_partition().count();
    let from = orchestrator.iter_from_partition().count();
    assert_eq!(until + from, orchestrator.len());
    for client in orchestrator.iter_until_partition() {
        assert!(client.side);
    }
    for client in orchestrator.iter_from_partition() {
        assert!(!client.side);
    }
}

// Two continuous orchestrators trading random ids: membership stays
// exclusive and the total population is conserved.
#[test]
fn moves_between_continuous_orchestrators() {
    let mut a = GrowableOrch::new();
    let mut b = StaticOrch::new();

    for id in 0..INITIAL_SIZE as u64 {
        a.push(id, false);
        b.push(INITIAL_SIZE as u64 + id, false);
    }

    for _ in 0..MOVES {
        let id = tl_rand_index(INITIAL_SIZE * 2) as u64;
        assert_exclusive(&a, &b, id);

        if let Some(obj) = a.get(id) {
            a.transfer(&mut b, obj);
        } else {
            let obj = b.get(id).expect("id must be in one orchestrator");
            b.transfer(&mut a, obj);
        }

        assert_eq!(a.len() + b.len(), INITIAL_SIZE * 2);
        assert_exclusive(&a, &b, id);
        assert_consistent(&a);
        assert_consistent(&b);
    }
}

// Moving between two partitioned orchestrators propagates the side
// automatically.
#[test]
fn moves_between_partitioned_orchestrators_preserve_the_side() {
    let mut a = PartStaticOrch::new();
    let mut b = PartGrowableOrch::new();

    for id in 0..INITIAL_SIZE as u64 {
        let side = tl_rand_bool();
        a.push_in(side, id, side);
        let side = tl_rand_bool();
        b.push_in(side, INITIAL_SIZE as u64 + id, side);
    }

    for _ in 0..MOVES {
        let id = tl_rand_index(INITIAL_SIZE * 2) as u64;
        assert_exclusive(&a, &b, id);

        if let Some(obj) = a.get(id) {
            let side = a.partition(obj);
            let moved = a.transfer_preserving(&mut b, obj);
            assert_eq!(b.partition(moved), side);
        } else {
            let obj = b.get(id).expect("id must be in one orchestrator");
            let side = b.partition(obj);
            let moved = b.transfer_preserving(&mut a, obj);
            assert_eq!(a.partition(moved), side);
        }

        assert_eq!(a.len() + b.len(), INITIAL_SIZE * 2);
        assert_exclusive(&a, &b, id);
        assert_partition_consistent(&a);
        assert_partition_consistent(&b);
    }
}

// A continuous source has no side to propagate; the caller supplies it.
#[test]
fn moves_from_continuous_into_partitioned_take_an_explicit_side() {
    let mut a = GrowableOrch::new();
    let mut b = PartGrowableOrch::new();

    for id in 0..INITIAL_SIZE as u64 {
        let side = tl_rand_bool();
        a.push(id, side);
        let side = tl_rand_bool();
        b.push_in(side, INITIAL_SIZE as u64 + id, side);
    }

    for _ in 0..MOVES {
        let id = tl_rand_index(INITIAL_SIZE * 2) as u64;
        assert_exclusive(&a, &b, id);

        if let Some(obj) = a.get(id) {
            let side = unsafe { obj.as_ref() }.side;
            let moved = a.transfer_to_partition(&mut b, obj, side);
            assert_eq!(b.partition(moved), side);
        } else {
            let obj = b.get(id).expect("id must be in one orchestrator");
            b.transfer(&mut a, obj);
        }

        assert_eq!(a.len() + b.len(), INITIAL_SIZE * 2);
        assert_exclusive(&a, &b, id);
        assert_consistent(&a);
        assert_partition_consistent(&b);
    }
}

#[test]
fn moves_between_static_and_static_growable() {
    let mut a = StaticOrch::new();
    let mut b = StaticGrowableOrch::new();

    for id in 0..INITIAL_SIZE as u64 {
        a.push(id, false);
        b.push(INITIAL_SIZE as u64 + id, false);
    }

    for _ in 0..MOVES {
        let id = tl_rand_index(INITIAL_SIZE * 2) as u64;
        assert_exclusive(&a, &b, id);

        if let Some(obj) = a.get(id) {
            a.transfer(&mut b, obj);
        } else {
            let obj = b.get(id).expect("id must be in one orchestrator");
            b.transfer(&mut a, obj);
        }

        assert_eq!(a.len() + b.len(), INITIAL_SIZE * 2);
        assert_exclusive(&a, &b, id);
        assert_consistent(&a);
        assert_consistent(&b);
    }
}

// Round trip: A → B → A. The id stays retrievable and handles cached
// before the first move keep resolving throughout.
#[test]
fn move_round_trip_keeps_cached_tickets_valid() {
    let mut a = GrowableOrch::new();
    let mut b = GrowableOrch::new();

    let ptr = a.push(42, false);
    a.push(43, false);
    let ticket = unsafe { ptr.as_ref() }.base().ticket().cloned().expect("ticket");

    let in_b = a.transfer(&mut b, ptr);
    assert!(ticket.valid());
    assert_eq!(ticket.get(), in_b);
    assert!(a.get(42).is_none());
    assert_eq!(b.get(42), Some(in_b));

    let back = b.transfer(&mut a, in_b);
    assert!(ticket.valid());
    assert_eq!(ticket.get(), back);
    assert_eq!(a.get(42), Some(back));
    assert!(b.get(42).is_none());
    assert_eq!(unsafe { back.as_ref() }.id(), 42);

    assert_eq!(a.len(), 2);
    assert_eq!(b.len(), 0);
}

// The element relocated to fill the source hole keeps its own handle
// intact.
#[test]
fn move_refreshes_the_backfilled_element() {
    let mut a = GrowableOrch::new();
    let mut b = GrowableOrch::new();

    let first = a.push(1, false);
    a.push(2, false);
    a.push(3, false);
    let t3 = unsafe { a.get(3).expect("live").as_ref() }
        .base()
        .ticket()
        .cloned()
        .expect("ticket");

    // id 1 sits at index 0; the tail (id 3) backfills it
    a.transfer(&mut b, first);

    assert!(t3.valid());
    assert_eq!(a.get(3), Some(t3.get()));
    assert_eq!(unsafe { t3.get().as_ref() }.id(), 3);
    assert_eq!(a.len(), 2);
    assert_eq!(b.len(), 1);
}
