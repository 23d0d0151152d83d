use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hive::prelude::*;
use hive::ComponentBase;
use hive::ThreadLocalPool;
use hive::VariantTaskManager;

#[derive(Default)]
struct Client {
    base: ComponentBase<Client>,
    value: u32,
}

impl Component for Client {
    type Args = u32;
    type DestroyArgs = ();

    fn base(&self) -> &ComponentBase<Self> {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase<Self> {
        &mut self.base
    }

    fn construct(&mut self, value: u32) {
        self.value = value;
    }
}

#[test]
fn scheduled_tasks_run_on_execute() {
    let pool = WorkerPool::new(2).expect("worker pool");
    let manager = TaskManager::new(&pool);

    let fired = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let fired = Arc::clone(&fired);
        manager.schedule(move || {
            fired.fetch_add(1, Ordering::AcqRel);
        });
    }

    assert_eq!(fired.load(Ordering::Acquire), 0, "tasks must not run before execute");
    manager.execute();
    assert_eq!(fired.load(Ordering::Acquire), 3);

    manager.execute();
    assert_eq!(fired.load(Ordering::Acquire), 3, "drained tasks must not run twice");
}

// A task scheduled by a running task lands in the fresh buffer and runs
// on the following pass, not the current one.
#[test]
fn tasks_scheduled_while_draining_run_next_pass() {
    let pool = WorkerPool::new(2).expect("worker pool");
    let manager = Arc::new(TaskManager::new(&pool));

    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    {
        let manager_inner = Arc::clone(&manager);
        let first = Arc::clone(&first);
        let second = Arc::clone(&second);
        manager.schedule(move || {
            first.fetch_add(1, Ordering::AcqRel);
            let second = Arc::clone(&second);
            manager_inner.schedule(move || {
                second.fetch_add(1, Ordering::AcqRel);
            });
        });
    }

    manager.execute();
    assert_eq!(first.load(Ordering::Acquire), 1);
    assert_eq!(second.load(Ordering::Acquire), 0, "nested task ran in the same pass");

    manager.execute();
    assert_eq!(second.load(Ordering::Acquire), 1);
}

#[test]
fn schedule_if_skips_invalidated_tickets() {
    let pool = WorkerPool::new(2).expect("worker pool");
    let manager = TaskManager::new(&pool);

    let mut orchestrator: Orchestrator<Client, GrowableStorage<Client, 8>> = Orchestrator::new();
    let alive = orchestrator.push(1, 10);
    let doomed = orchestrator.push(2, 20);

    let alive_ticket = unsafe { alive.as_ref() }.base().ticket().cloned().expect("ticket");
    let doomed_ticket = unsafe { doomed.as_ref() }.base().ticket().cloned().expect("ticket");

    let ran = Arc::new(AtomicUsize::new(0));
    {
        let ran = Arc::clone(&ran);
        manager.schedule_if(alive_ticket, move |client| {
            assert_eq!(client.id(), 1);
            client.value += 1;
            ran.fetch_add(1, Ordering::AcqRel);
        });
    }
    {
        let ran = Arc::clone(&ran);
        manager.schedule_if(doomed_ticket, move |_client| {
            ran.fetch_add(1, Ordering::AcqRel);
        });
    }

    orchestrator.pop(doomed);
    manager.execute();

    assert_eq!(ran.load(Ordering::Acquire), 1, "only the valid ticket's task may run");
    let survivor = orchestrator.get(1).expect("live id");
    assert_eq!(unsafe { survivor.as_ref() }.value, 11);
}

#[test]
fn schedule_if2_requires_both_tickets() {
    let pool = WorkerPool::new(2).expect("worker pool");
    let manager = TaskManager::new(&pool);

    let mut orchestrator: Orchestrator<Client, GrowableStorage<Client, 8>> = Orchestrator::new();
    let a = orchestrator.push(1, 0);
    let b = orchestrator.push(2, 0);

    let ta = unsafe { a.as_ref() }.base().ticket().cloned().expect("ticket");
    let tb = unsafe { b.as_ref() }.base().ticket().cloned().expect("ticket");

    let ran = Arc::new(AtomicUsize::new(0));
    {
        let ran = Arc::clone(&ran);
        manager.schedule_if2(ta.clone(), tb.clone(), move |first, second| {
            assert_eq!(first.id(), 1);
            assert_eq!(second.id(), 2);
            ran.fetch_add(1, Ordering::AcqRel);
        });
    }
    manager.execute();
    assert_eq!(ran.load(Ordering::Acquire), 1);

    orchestrator.pop(b);
    {
        let ran = Arc::clone(&ran);
        manager.schedule_if2(ta, tb, move |_first, _second| {
            ran.fetch_add(1, Ordering::AcqRel);
        });
    }
    manager.execute();
    assert_eq!(ran.load(Ordering::Acquire), 1, "a dead ticket must veto the task");
}

enum Command {
    Bump(u32),
    Reset,
}

#[test]
fn variant_manager_drains_through_the_visitor() {
    let pool = WorkerPool::new(2).expect("worker pool");
    let manager: VariantTaskManager<Command> = VariantTaskManager::new(&pool);

    manager.schedule(Command::Bump(2));
    manager.schedule(Command::Bump(3));
    manager.schedule(Command::Reset);

    let mut total = 0u32;
    let mut resets = 0u32;
    manager.execute(|command| match command {
        Command::Bump(amount) => total += amount,
        Command::Reset => resets += 1,
    });

    assert_eq!(total, 5);
    assert_eq!(resets, 1);

    let mut untouched = true;
    manager.execute(|_| untouched = false);
    assert!(untouched, "a drained manager must stay empty");
}

#[test]
fn pool_reuses_released_slots() {
    let pool: ThreadLocalPool<u64, 4> = ThreadLocalPool::new();

    let first = pool.get(1);
    let address = &*first as *const u64 as usize;
    pool.release(first);
    assert_eq!(pool.free_count(), 1);

    let second = pool.get(2);
    assert_eq!(pool.free_count(), 0);
    assert_eq!(&*second as *const u64 as usize, address, "the freed slot must be reused");
    assert_eq!(*second, 2);
    pool.release(second);
}

#[test]
fn rebalance_drains_non_sink_lists_into_the_sink() {
    let pool: Arc<ThreadLocalPool<u64, 4>> = Arc::new(ThreadLocalPool::new());
    pool.mark_sink();

    // a worker thread builds up a free list of its own
    {
        let pool = Arc::clone(&pool);
        std::thread::spawn(move || {
            let mut held = Vec::new();
            for value in 0..5 {
                held.push(pool.get(value));
            }
            for object in held {
                pool.release(object);
            }
            assert_eq!(pool.free_count(), 5);
        })
        .join()
        .expect("worker thread");
    }

    assert_eq!(pool.free_count(), 0, "the sink starts with an empty list");
    pool.rebalance();
    assert_eq!(pool.free_count(), 5, "the worker's free list must land in the sink");
}

#[test]
fn rebalance_is_skipped_while_lists_stay_large() {
    let pool: Arc<ThreadLocalPool<u64, 4>> = Arc::new(ThreadLocalPool::new());
    pool.mark_sink();

    // push one worker's free list past the 256 / worker_count target
    {
        let pool = Arc::clone(&pool);
        std::thread::spawn(move || {
            let mut held = Vec::new();
            for value in 0..200 {
                held.push(pool.get(value));
            }
            for object in held {
                pool.release(object);
            }
        })
        .join()
        .expect("worker thread");
    }

    pool.rebalance();
    assert_eq!(pool.free_count(), 0, "rebalance must be skipped above the target");
}
