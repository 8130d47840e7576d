//! # Concurrent Access
//!
//! Drives one shared coordinator from several threads and checks that the
//! single lock domain keeps storage, signatures and membership consistent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use tessera_core::{Coordinator, Entity, Job, KernelConfig, Signature, System};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Health(u32);

#[derive(Debug, Clone, Copy, PartialEq)]
struct Armor(u32);

#[derive(Default)]
struct Combat;
impl System for Combat {}

const THREADS: usize = 8;
const PER_THREAD: usize = 50;

fn shared_world() -> Arc<Coordinator> {
    let world = Coordinator::init(KernelConfig::with_entity_capacity(THREADS * PER_THREAD)).unwrap();
    let health = world.register_component::<Health>().unwrap();
    let armor = world.register_component::<Armor>().unwrap();
    world.register_system::<Combat>().unwrap();
    world
        .set_system_signature::<Combat>(Signature::EMPTY.with(health).with(armor))
        .unwrap();
    Arc::new(world)
}

#[test]
fn test_parallel_creation_yields_unique_identifiers() {
    let world = shared_world();
    let barrier = Arc::new(Barrier::new(THREADS));

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let world = Arc::clone(&world);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..PER_THREAD)
                    .map(|_| {
                        let entity = world.create_entity().unwrap();
                        world.add_component(entity, Health(100)).unwrap();
                        entity
                    })
                    .collect::<Vec<Entity>>()
            })
        })
        .collect();

    let mut all: Vec<Entity> = workers.into_iter().flat_map(|w| w.join().unwrap()).collect();
    all.sort();
    all.dedup();
    assert_eq!(all.len(), THREADS * PER_THREAD);
    assert_eq!(world.living_count(), THREADS * PER_THREAD);
    assert!(world.create_entity().is_err());
}

#[test]
fn test_membership_consistent_under_contention() {
    let world = shared_world();
    let combat = world.get_system::<Combat>().unwrap();

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let world = Arc::clone(&world);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let entity = world.create_entity().unwrap();
                    world.add_component(entity, Health(10)).unwrap();
                    world.add_component(entity, Armor(1)).unwrap();
                    if (t + i) % 2 == 0 {
                        world.remove_component::<Armor>(entity).unwrap();
                    }
                    if i % 5 == 0 {
                        world.destroy_entity(entity).unwrap();
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let expected = world.entities_with::<Health, Armor>().unwrap();
    assert_eq!(combat.entities(), expected);
    for entity in world.entities() {
        assert_eq!(
            combat.contains(entity),
            world.has_component::<Armor>(entity).unwrap()
        );
    }
}

#[test]
fn test_readers_and_writers_interleave() {
    let world = shared_world();
    let seed = world.create_entity().unwrap();
    world.add_component(seed, Health(0)).unwrap();

    let writer = {
        let world = Arc::clone(&world);
        thread::spawn(move || {
            for _ in 0..1_000 {
                world.with_component(seed, |health: &mut Health| health.0 += 1).unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let world = Arc::clone(&world);
            thread::spawn(move || {
                let mut last = 0;
                for _ in 0..1_000 {
                    let kernel = world.read();
                    let current = kernel.component::<Health>(seed).unwrap().0;
                    assert!(current >= last);
                    last = current;
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(*world.get_component::<Health>(seed).unwrap(), Health(1_000));
}

#[test]
fn test_throttled_update_on_another_thread() {
    struct Regenerate {
        runs: Arc<AtomicUsize>,
    }
    impl System for Regenerate {
        fn update(&self, world: &Coordinator, entities: &[Entity], _delta_time: f32) {
            for &entity in entities {
                world.with_component(entity, |health: &mut Health| health.0 += 5).unwrap();
            }
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    let world = shared_world();
    let runs = Arc::new(AtomicUsize::new(0));
    let regenerate = world
        .register_system_with(Regenerate {
            runs: Arc::clone(&runs),
        })
        .unwrap();
    let health = world.component_type_id::<Health>().unwrap();
    world
        .set_system_signature::<Regenerate>(Signature::EMPTY.with(health))
        .unwrap();
    regenerate.throttle().set_tps(10.0);

    let entity = world.create_entity().unwrap();
    world.add_component(entity, Health(0)).unwrap();

    let mut spawned = Vec::new();
    // 0.04 + 0.04 stays under the 0.1s interval; the third frame crosses it.
    for _ in 0..2 {
        assert!(!regenerate.execute_when_possible(&world, 0.04, |job: Job| {
            spawned.push(thread::spawn(job));
        }));
    }
    assert!(regenerate.execute_when_possible(&world, 0.04, |job: Job| {
        spawned.push(thread::spawn(job));
    }));
    for handle in spawned {
        handle.join().unwrap();
    }

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(*world.get_component::<Health>(entity).unwrap(), Health(5));
    assert!(!regenerate.throttle().is_running());
}
