//! # Kernel Soak Run
//!
//! Hammers one shared coordinator from several mutator threads while the
//! frame driver ticks paced systems on the worker pool, then checks that
//! membership still agrees with the signatures.
//!
//! Usage: `kernel_soak [seconds] [mutator_threads] [config.toml]`

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tessera::{FrameDriver, WorkerPool};
use tessera_core::{Coordinator, Entity, KernelConfig, KernelError, KernelResult, Signature, System};

/// Target frame time for 60 FPS.
const FRAME_TIME: Duration = Duration::from_micros(16_666);

#[derive(Clone, Copy, Debug)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy, Debug)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Clone, Copy, Debug)]
struct Lifetime(u32);

/// Integrates velocity into position.
#[derive(Default)]
struct Movement {
    passes: AtomicU64,
}

impl System for Movement {
    fn update(&self, world: &Coordinator, entities: &[Entity], delta_time: f32) {
        for &entity in entities {
            // Mutators may strip components between the snapshot and here.
            let velocity = match world.try_get_component::<Velocity>(entity) {
                Ok(Some(velocity)) => *velocity,
                _ => continue,
            };
            if let Ok(Some(mut position)) = world.try_get_component::<Position>(entity) {
                position.x += velocity.dx * delta_time;
                position.y += velocity.dy * delta_time;
            }
        }
        self.passes.fetch_add(1, Ordering::Relaxed);
    }
}

/// Ages entities and reports how many have expired.
#[derive(Default)]
struct Aging {
    expired: AtomicU64,
}

impl System for Aging {
    fn update(&self, world: &Coordinator, entities: &[Entity], _delta_time: f32) {
        for &entity in entities {
            let result = world.with_component(entity, |lifetime: &mut Lifetime| {
                lifetime.0 = lifetime.0.saturating_sub(1);
                lifetime.0 == 0
            });
            if matches!(result, Ok(true)) {
                self.expired.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

struct SoakArgs {
    duration: Duration,
    mutators: usize,
    config: KernelConfig,
}

fn parse_args() -> KernelResult<SoakArgs> {
    let mut args = std::env::args().skip(1);
    let seconds = args.next().and_then(|s| s.parse().ok()).unwrap_or(5u64);
    let mutators = args.next().and_then(|s| s.parse().ok()).unwrap_or(4usize);
    let config = match args.next() {
        Some(path) => KernelConfig::from_toml_file(path)?,
        None => KernelConfig::default(),
    };
    Ok(SoakArgs {
        duration: Duration::from_secs(seconds),
        mutators,
        config,
    })
}

/// Outcome counters shared by the mutator threads.
#[derive(Default)]
struct SoakCounters {
    ops: AtomicU64,
    rejected: AtomicU64,
    failures: AtomicU64,
}

impl SoakCounters {
    /// Fails the run if any mutator hit an error other than capacity exhaustion.
    fn verdict(&self, consistent: bool) -> Result<(), String> {
        let failures = self.failures.load(Ordering::Relaxed);
        if failures > 0 {
            return Err(format!("{failures} mutator operations failed unexpectedly"));
        }
        if !consistent {
            return Err("system membership diverged from entity signatures".to_string());
        }
        Ok(())
    }
}

/// One mutator thread: random-ish churn driven by a xorshift sequence.
fn mutate(world: &Coordinator, seed: u64, stop: &AtomicBool, counters: &SoakCounters) {
    let mut state = seed | 1;
    let mut owned: Vec<Entity> = Vec::new();

    while !stop.load(Ordering::Relaxed) {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;

        let result = match state % 6 {
            0 | 1 => world.create_entity().and_then(|entity| {
                world.add_component(entity, Position { x: 0.0, y: 0.0 })?;
                world.add_component(entity, Lifetime(120))?;
                owned.push(entity);
                Ok(())
            }),
            2 => match owned.pop() {
                Some(entity) => world.destroy_entity(entity),
                None => Ok(()),
            },
            3 => match owned.last() {
                Some(&entity) => world
                    .add_component(entity, Velocity { dx: 1.0, dy: -1.0 })
                    .map(drop),
                None => Ok(()),
            },
            4 => match owned.first() {
                Some(&entity) => world.remove_component::<Velocity>(entity).map(drop),
                None => Ok(()),
            },
            _ => world.entities_with::<Position, Velocity>().map(drop),
        };

        match result {
            Ok(()) => {
                counters.ops.fetch_add(1, Ordering::Relaxed);
            }
            Err(KernelError::CapacityExhausted { .. }) => {
                counters.rejected.fetch_add(1, Ordering::Relaxed);
            }
            Err(error) => {
                counters.failures.fetch_add(1, Ordering::Relaxed);
                eprintln!("mutator {seed}: unexpected error: {error}");
                stop.store(true, Ordering::Relaxed);
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args()?;

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                       TESSERA KERNEL SOAK                        ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();
    println!("  Duration:        {:?}", args.duration);
    println!("  Mutator threads: {}", args.mutators);
    println!("  Entity capacity: {}", args.config.entity_capacity);
    println!();

    let world = Arc::new(Coordinator::init(args.config)?);
    let position = world.register_component::<Position>()?;
    let velocity = world.register_component::<Velocity>()?;
    let lifetime = world.register_component::<Lifetime>()?;

    let movement = world.register_system::<Movement>()?;
    world.set_system_signature::<Movement>(Signature::EMPTY.with(position).with(velocity))?;
    let aging = world.register_system::<Aging>()?;
    world.set_system_signature::<Aging>(Signature::EMPTY.with(lifetime))?;
    movement.throttle().set_tps(60.0);
    aging.throttle().set_tps(10.0);

    let threads = thread::available_parallelism().map_or(2, usize::from).min(4);
    let mut driver = FrameDriver::new(Arc::clone(&world), WorkerPool::new(threads)?);
    driver.attach(movement.clone());
    driver.attach(aging.clone());

    let stop = Arc::new(AtomicBool::new(false));
    let counters = Arc::new(SoakCounters::default());

    let mutators: Vec<_> = (0..args.mutators)
        .map(|index| {
            let world = Arc::clone(&world);
            let stop = Arc::clone(&stop);
            let counters = Arc::clone(&counters);
            thread::spawn(move || mutate(&world, 0x9E37_79B9_7F4A_7C15 ^ index as u64, &stop, &counters))
        })
        .collect();

    let start = Instant::now();
    let mut last = Instant::now();
    let mut slowest_tick_us = 0;
    while start.elapsed() < args.duration && !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        let delta = now.duration_since(last).as_secs_f32().min(0.1);
        last = now;

        let stats = driver.tick(delta);
        slowest_tick_us = slowest_tick_us.max(stats.tick_us);
        driver.render();

        if let Some(remaining) = FRAME_TIME.checked_sub(now.elapsed()) {
            thread::sleep(remaining);
        }
    }

    stop.store(true, Ordering::Relaxed);
    for mutator in mutators {
        if mutator.join().is_err() {
            counters.failures.fetch_add(1, Ordering::Relaxed);
            eprintln!("mutator thread panicked");
        }
    }
    driver.shutdown();

    let elapsed = start.elapsed().as_secs_f64();
    let total_ops = counters.ops.load(Ordering::Relaxed);
    let consistent = {
        let kernel = world.read();
        let expected = kernel.entities_with::<Position, Velocity>()?;
        expected == movement.entities()
    };

    println!("┌─ RESULTS ──────────────────────────────────────────────────────┐");
    println!("│ Frames:            {}", driver.frame());
    println!("│ Updates run:       {}", driver.pool().completed());
    println!("│ Slowest tick:      {slowest_tick_us} us");
    println!("│ Kernel ops:        {total_ops} ({:.0} ops/s)", total_ops as f64 / elapsed);
    println!("│ Capacity rejects:  {}", counters.rejected.load(Ordering::Relaxed));
    println!("│ Mutator failures:  {}", counters.failures.load(Ordering::Relaxed));
    println!("│ Living entities:   {}", world.living_count());
    println!("│ Movement passes:   {}", movement.passes.load(Ordering::Relaxed));
    println!("│ Expired lifetimes: {}", aging.expired.load(Ordering::Relaxed));
    println!("│ Membership check:  {}", if consistent { "OK" } else { "MISMATCH" });
    println!("└──────────────────────────────────────────────────────────────────┘");

    counters.verdict(consistent).map_err(Into::into)
}
