use criterion::*;
use std::hint::black_box;

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

fn spawn_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn");

    group.bench_function("create_with_two_components_10k", |b| {
        b.iter_batched(
            World::new,
            |world| {
                for index in 0..10_000u32 {
                    let entity = world.create_entity();
                    entity.add(Position {
                        x: index as f32,
                        y: 0.0,
                    });
                    entity.add(Velocity { x: 1.0, y: 1.0 });
                }
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("recycle_hot_slot", |b| {
        b.iter_batched(
            || {
                let world = World::new();
                for _ in 0..1_000 {
                    world.create_entity().add(Position { x: 0.0, y: 0.0 });
                }
                world.finish_tick();
                world
            },
            |world| {
                let id = world.create_entity().id();
                world.destroy_entity(id);
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, spawn_benchmark);
criterion_main!(benches);
