use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::{Duration, Instant};

use tickworld::prelude::*;

struct Position {
    x: f32,
    y: f32,
}
impl Component for Position {}

struct Velocity {
    x: f32,
    y: f32,
}
impl Component for Velocity {}

struct Pulse(u32);
impl Component for Pulse {}

struct Counter(u32);
impl Component for Counter {}

struct Unmatched;
impl Component for Unmatched {}

#[test]
fn physics_integration_step() {
    let world = World::new();
    let entity = world.create_entity();
    entity.add(Position { x: 0.0, y: 0.0 });
    entity.add(Velocity { x: 1.0, y: 2.0 });
    world.finish_tick();

    let dt = 0.5f32;
    world.tick_system::<(Write<Position>, Read<Velocity>), _, _>(
        Execution::Inline,
        Iteration::Sequential,
        move |position: &mut Position, velocity: &Velocity| {
            position.x += velocity.x * dt;
            position.y += velocity.y * dt;
        },
    );

    let position = world.get_component::<Position>(entity.id());
    assert_eq!(position.x, 0.5);
    assert_eq!(position.y, 1.0);
}

#[test]
fn systems_may_take_the_entity_handle() {
    static SEEN: AtomicU32 = AtomicU32::new(u32::MAX);

    fn record(entity: EntityHandle<'_>, _position: &Position) {
        SEEN.store(entity.id(), Ordering::SeqCst);
    }

    let world = World::new();
    let entity = world.create_entity();
    entity.add(Position { x: 0.0, y: 0.0 });
    world.finish_tick();

    world.tick_system::<(Read<Position>,), _, _>(
        Execution::Inline,
        Iteration::Sequential,
        record,
    );
    assert_eq!(SEEN.load(Ordering::SeqCst), entity.id());
}

#[test]
fn conflicting_dispatch_waits_for_the_writer() {
    let world = World::new();
    let entity = world.create_entity();
    entity.add(Position { x: 0.0, y: 0.0 });
    world.finish_tick();

    let writer_end: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));
    let reader_start: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));

    {
        let writer_end = Arc::clone(&writer_end);
        world.tick_system::<(Write<Position>,), _, _>(
            Execution::Background,
            Iteration::Sequential,
            move |_position: &mut Position| {
                sleep(Duration::from_millis(150));
                *writer_end.lock().unwrap() = Some(Instant::now());
            },
        );
    }
    {
        let reader_start = Arc::clone(&reader_start);
        world.tick_system::<(Read<Position>,), _, _>(
            Execution::Background,
            Iteration::Sequential,
            move |_position: &Position| {
                *reader_start.lock().unwrap() = Some(Instant::now());
            },
        );
    }
    world.finish_tick();

    let end = writer_end.lock().unwrap().expect("writer ran");
    let start = reader_start.lock().unwrap().expect("reader ran");
    assert!(
        start >= end,
        "a reader of Position must not start before the running writer finishes",
    );
}

#[test]
fn disjoint_writers_run_concurrently() {
    let world = World::new();
    let entity = world.create_entity();
    entity.add(Position { x: 0.0, y: 0.0 });
    entity.add(Pulse(0));
    world.finish_tick();

    let slow_ran = Arc::new(AtomicBool::new(false));
    let fast_ran = Arc::new(AtomicBool::new(false));

    {
        let slow_ran = Arc::clone(&slow_ran);
        world.tick_system::<(Write<Position>,), _, _>(
            Execution::Background,
            Iteration::Sequential,
            move |_position: &mut Position| {
                sleep(Duration::from_millis(200));
                slow_ran.store(true, Ordering::SeqCst);
            },
        );
    }

    let dispatched_at = Instant::now();
    {
        let fast_ran = Arc::clone(&fast_ran);
        world.tick_system::<(Write<Pulse>,), _, _>(
            Execution::Background,
            Iteration::Sequential,
            move |pulse: &mut Pulse| {
                pulse.0 += 1;
                fast_ran.store(true, Ordering::SeqCst);
            },
        );
    }
    let returned_at = Instant::now();

    assert!(
        returned_at - dispatched_at < Duration::from_millis(100),
        "dispatching a non-conflicting system must not join the running writer",
    );

    world.finish_tick();
    assert!(slow_ran.load(Ordering::SeqCst));
    assert!(fast_ran.load(Ordering::SeqCst));
    assert_eq!(world.get_component::<Pulse>(entity.id()).0, 1);
}

#[test]
fn writes_are_visible_to_conflicting_successors() {
    let world = World::new();
    for _ in 0..100 {
        world.create_entity().add(Counter(0));
    }
    world.finish_tick();

    world.tick_system::<(Write<Counter>,), _, _>(
        Execution::Background,
        Iteration::Sequential,
        |counter: &mut Counter| {
            counter.0 += 1;
        },
    );

    let total = Arc::new(AtomicU32::new(0));
    {
        let total = Arc::clone(&total);
        world.tick_system::<(Read<Counter>,), _, _>(
            Execution::Inline,
            Iteration::Sequential,
            move |counter: &Counter| {
                total.fetch_add(counter.0, Ordering::SeqCst);
            },
        );
    }
    assert_eq!(total.load(Ordering::SeqCst), 100);
}

#[test]
fn entities_created_mid_dispatch_wait_for_the_next_tick() {
    static VISITS: AtomicUsize = AtomicUsize::new(0);
    static SPAWNED: AtomicBool = AtomicBool::new(false);

    fn spawn_once(entity: EntityHandle<'_>, _position: &Position) {
        VISITS.fetch_add(1, Ordering::SeqCst);
        if !SPAWNED.swap(true, Ordering::SeqCst) {
            let created = entity.world().create_entity();
            created.add(Position { x: 9.0, y: 9.0 });
        }
    }

    let world = World::new();
    world.create_entity().add(Position { x: 0.0, y: 0.0 });
    world.finish_tick();

    world.tick_system::<(Read<Position>,), _, _>(
        Execution::Inline,
        Iteration::Sequential,
        spawn_once,
    );
    assert_eq!(
        VISITS.load(Ordering::SeqCst),
        1,
        "the entity created during the dispatch must not be visited",
    );

    world.finish_tick();
    let visited = Arc::new(AtomicUsize::new(0));
    {
        let visited = Arc::clone(&visited);
        world.tick_system::<(Read<Position>,), _, _>(
            Execution::Inline,
            Iteration::Sequential,
            move |_position: &Position| {
                visited.fetch_add(1, Ordering::SeqCst);
            },
        );
    }
    assert_eq!(visited.load(Ordering::SeqCst), 2);
}

#[test]
fn zero_match_parallel_dispatch_never_invokes_the_system() {
    let world = World::new();
    world.create_entity().add(Position { x: 0.0, y: 0.0 });
    world.finish_tick();

    let hits = Arc::new(AtomicUsize::new(0));
    {
        let hits = Arc::clone(&hits);
        world.tick_system::<(Write<Unmatched>,), _, _>(
            Execution::Inline,
            Iteration::Parallel,
            move |_unmatched: &mut Unmatched| {
                hits.fetch_add(1, Ordering::SeqCst);
            },
        );
    }
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn parallel_iteration_is_complete() {
    let world = World::new();
    for _ in 0..512 {
        world.create_entity().add(Counter(0));
    }
    world.finish_tick();

    world.tick_system::<(Write<Counter>,), _, _>(
        Execution::Inline,
        Iteration::Parallel,
        |counter: &mut Counter| {
            counter.0 += 1;
        },
    );

    let mut visited = 0usize;
    for handle in world.entities_with::<(Counter,)>() {
        assert_eq!(handle.get::<Counter>().0, 1);
        visited += 1;
    }
    assert_eq!(visited, 512);
}

#[test]
fn finish_tick_joins_workers_and_validates_entities() {
    let world = World::new();
    let entity = world.create_entity();
    entity.add(Pulse(0));
    world.finish_tick();

    let late = world.create_entity();
    late.add(Pulse(0));
    assert!(!world.is_valid(late.id()));

    let worker_done = Arc::new(AtomicBool::new(false));
    {
        let worker_done = Arc::clone(&worker_done);
        world.tick_system::<(Write<Pulse>,), _, _>(
            Execution::Background,
            Iteration::Sequential,
            move |_pulse: &mut Pulse| {
                sleep(Duration::from_millis(100));
                worker_done.store(true, Ordering::SeqCst);
            },
        );
    }

    world.finish_tick();
    assert!(
        worker_done.load(Ordering::SeqCst),
        "finish_tick must join every running worker",
    );
    assert!(world.is_valid(entity.id()));
    assert!(world.is_valid(late.id()));
}
