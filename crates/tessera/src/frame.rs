//! # Frame Driver
//!
//! ```text
//! Frame N:
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. TICK                                                             │
//! │    └─ every paced system is offered the elapsed time; the ones      │
//! │       whose interval has elapsed hand an update job to the pool     │
//! │                                                                     │
//! │ 2. RENDER                                                           │
//! │    └─ every system renders on the calling thread                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Updates run on worker threads against the shared coordinator. A system
//! never has more than one update in flight, so a slow system skips frames
//! instead of queueing them.

use std::sync::Arc;
use std::time::Instant;

use tessera_core::{Coordinator, System, SystemHandle};

use crate::worker_pool::WorkerPool;

/// Statistics for one call to [`FrameDriver::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frame number, starting at zero.
    pub frame: u64,
    /// Systems offered time this frame.
    pub offered: usize,
    /// Update jobs handed to the pool this frame.
    pub dispatched: usize,
    /// Time spent in `tick`, in microseconds.
    pub tick_us: u64,
}

/// Type-erased view of a registered system.
trait PacedSystem: Send + Sync {
    fn offer(&self, world: &Arc<Coordinator>, delta: f32, pool: &WorkerPool) -> bool;
    fn render(&self, world: &Coordinator);
    fn name(&self) -> &'static str;
}

impl<T: System> PacedSystem for SystemHandle<T> {
    fn offer(&self, world: &Arc<Coordinator>, delta: f32, pool: &WorkerPool) -> bool {
        self.execute_when_possible(world, delta, pool.scheduler())
    }

    fn render(&self, world: &Coordinator) {
        SystemHandle::render(self, world);
    }

    fn name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Drives paced system updates and synchronous rendering.
pub struct FrameDriver {
    world: Arc<Coordinator>,
    pool: WorkerPool,
    systems: Vec<Box<dyn PacedSystem>>,
    frame: u64,
    dispatched_total: u64,
}

impl FrameDriver {
    /// Creates a driver with no systems attached.
    #[must_use]
    pub fn new(world: Arc<Coordinator>, pool: WorkerPool) -> Self {
        Self {
            world,
            pool,
            systems: Vec::new(),
            frame: 0,
            dispatched_total: 0,
        }
    }

    /// Attaches a system. Systems are ticked in attachment order.
    pub fn attach<T: System>(&mut self, handle: SystemHandle<T>) {
        tracing::debug!(system = std::any::type_name::<T>(), "system attached to frame driver");
        self.systems.push(Box::new(handle));
    }

    /// Number of attached systems.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// The shared coordinator.
    #[must_use]
    pub fn world(&self) -> &Arc<Coordinator> {
        &self.world
    }

    /// The pool update jobs are sent to.
    #[must_use]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Frames ticked so far.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Update jobs dispatched since the driver was created.
    #[must_use]
    pub fn dispatched_total(&self) -> u64 {
        self.dispatched_total
    }

    /// Offers `delta` seconds to every attached system.
    pub fn tick(&mut self, delta: f32) -> FrameStats {
        let start = Instant::now();
        let mut dispatched = 0;
        for system in &self.systems {
            if system.offer(&self.world, delta, &self.pool) {
                tracing::trace!(system = system.name(), frame = self.frame, "update dispatched");
                dispatched += 1;
            }
        }

        let stats = FrameStats {
            frame: self.frame,
            offered: self.systems.len(),
            dispatched,
            tick_us: u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX),
        };
        self.frame += 1;
        self.dispatched_total += dispatched as u64;
        stats
    }

    /// Renders every attached system on the calling thread.
    pub fn render(&self) {
        for system in &self.systems {
            system.render(&self.world);
        }
    }

    /// Waits for outstanding updates and stops the pool.
    pub fn shutdown(&mut self) {
        self.pool.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tessera_core::{Entity, KernelConfig, Signature};

    struct Marker;

    #[derive(Default)]
    struct Counting {
        updates: AtomicUsize,
        renders: AtomicUsize,
    }

    impl System for Counting {
        fn update(&self, _world: &Coordinator, _entities: &[Entity], _delta_time: f32) {
            self.updates.fetch_add(1, Ordering::SeqCst);
        }

        fn render(&self, _world: &Coordinator, entities: &[Entity]) {
            self.renders.fetch_add(entities.len(), Ordering::SeqCst);
        }
    }

    fn driver() -> (FrameDriver, SystemHandle<Counting>) {
        let world = Arc::new(Coordinator::init(KernelConfig::with_entity_capacity(16)).unwrap());
        let marker = world.register_component::<Marker>().unwrap();
        let counting = world.register_system::<Counting>().unwrap();
        world
            .set_system_signature::<Counting>(Signature::EMPTY.with(marker))
            .unwrap();
        counting.throttle().set_tps(10.0);

        let mut driver = FrameDriver::new(world, WorkerPool::new(2).unwrap());
        driver.attach(counting.clone());
        (driver, counting)
    }

    #[test]
    fn test_tick_dispatches_once_interval_elapsed() {
        let (mut driver, counting) = driver();
        assert_eq!(driver.system_count(), 1);

        let first = driver.tick(0.05);
        assert_eq!(first.frame, 0);
        assert_eq!(first.offered, 1);
        assert_eq!(first.dispatched, 0);

        let second = driver.tick(0.06);
        assert_eq!(second.frame, 1);
        assert_eq!(second.dispatched, 1);

        driver.shutdown();
        assert_eq!(counting.updates.load(Ordering::SeqCst), 1);
        assert_eq!(driver.dispatched_total(), 1);
        assert_eq!(driver.frame(), 2);
    }

    #[test]
    fn test_render_sees_members() {
        let (driver, counting) = driver();
        let world = Arc::clone(driver.world());
        for _ in 0..3 {
            let entity = world.create_entity().unwrap();
            world.add_component(entity, Marker).unwrap();
        }

        driver.render();
        assert_eq!(counting.renders.load(Ordering::SeqCst), 3);
    }
}
