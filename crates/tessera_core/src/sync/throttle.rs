//! # Tick Throttle
//!
//! Advisory pacing for systems that should not run every frame.
//!
//! The throttle accumulates frame time. Once a full interval (`1 / tps`) has
//! built up it hands one unit of work to a scheduling function supplied by
//! the caller, usually a thread pool. A single atomic flag keeps at most one
//! unit of work per throttle outstanding.
//!
//! ```text
//! frame:   ─┬──────┬──────┬──────┬──────┬─
//! delta:    +8ms   +8ms   +8ms   +8ms   +8ms     (threshold 33ms)
//! fires:                         ▲ job(33ms)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::DEFAULT_TICK_RATE;

/// A unit of work handed to an external scheduler.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Accumulator and threshold, guarded together.
#[derive(Clone, Copy, Debug)]
struct Pacing {
    accumulated: f32,
    threshold: f32,
}

/// Time-based pacing helper with a single outstanding job.
#[derive(Debug)]
pub struct TickThrottle {
    pacing: Mutex<Pacing>,
    running: Arc<AtomicBool>,
}

impl Default for TickThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_RATE)
    }
}

impl TickThrottle {
    /// Creates a throttle firing at most `tps` times per second.
    ///
    /// A rate that is not finite and positive falls back to
    /// [`DEFAULT_TICK_RATE`].
    #[must_use]
    pub fn new(tps: f32) -> Self {
        Self {
            pacing: Mutex::new(Pacing {
                accumulated: 0.0,
                threshold: interval(tps),
            }),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Changes the rate. The accumulated time is kept.
    ///
    /// Same fallback as [`TickThrottle::new`] for invalid rates.
    pub fn set_tps(&self, tps: f32) {
        self.pacing.lock().threshold = interval(tps);
    }

    /// Interval between jobs, in seconds.
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.pacing.lock().threshold
    }

    /// Time accumulated since the last job was handed out.
    #[must_use]
    pub fn accumulated(&self) -> f32 {
        self.pacing.lock().accumulated
    }

    /// Adds elapsed time without trying to fire.
    pub fn add_delta(&self, delta: f32) {
        self.pacing.lock().accumulated += delta;
    }

    /// Returns `true` once a full interval has accumulated.
    #[must_use]
    pub fn can_execute(&self) -> bool {
        let pacing = self.pacing.lock();
        pacing.accumulated >= pacing.threshold
    }

    /// Returns `true` while a handed-out job has not finished.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Accumulates `delta` and, if an interval has elapsed and no job is
    /// outstanding, passes `scheduler` a job that runs `task(threshold)`.
    ///
    /// Returns `true` if a job was handed out. The accumulator is reset only
    /// when that happens; while a job is still running time keeps piling up.
    ///
    /// The outstanding flag is cleared when the job finishes, unwinds, or is
    /// dropped unexecuted by the scheduler.
    pub fn execute_when_possible<F, S>(&self, delta: f32, task: F, scheduler: S) -> bool
    where
        F: FnOnce(f32) + Send + 'static,
        S: FnOnce(Job),
    {
        let mut pacing = self.pacing.lock();
        pacing.accumulated += delta;
        if pacing.accumulated < pacing.threshold {
            return false;
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let interval = pacing.threshold;
        pacing.accumulated = 0.0;
        drop(pacing);

        let release = RunningGuard(Arc::clone(&self.running));
        scheduler(Box::new(move || {
            let _release = release;
            task(interval);
        }));
        true
    }
}

/// Interval for `tps`, using the same bounds as `KernelConfig::validate`.
fn interval(tps: f32) -> f32 {
    if tps.is_finite() && tps > 0.0 {
        1.0 / tps
    } else {
        tracing::warn!(tps, fallback = DEFAULT_TICK_RATE, "invalid tick rate");
        1.0 / DEFAULT_TICK_RATE
    }
}

/// Clears the outstanding flag on drop.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_fires_once_threshold_reached() {
        let throttle = TickThrottle::new(10.0);
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&runs);
        assert!(!throttle.execute_when_possible(0.05, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }, |job| job()));
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        let counter = Arc::clone(&runs);
        assert!(throttle.execute_when_possible(0.06, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }, |job| job()));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(throttle.accumulated().abs() < f32::EPSILON);
        assert!(!throttle.is_running());
    }

    #[test]
    fn test_task_receives_threshold() {
        let throttle = TickThrottle::new(4.0);
        let seen = Arc::new(Mutex::new(0.0f32));
        let slot = Arc::clone(&seen);

        throttle.execute_when_possible(1.0, move |dt| *slot.lock() = dt, |job| job());
        assert!((*seen.lock() - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn test_single_outstanding_job() {
        let throttle = TickThrottle::new(100.0);
        let mut parked: Vec<Job> = Vec::new();

        assert!(throttle.execute_when_possible(1.0, |_| {}, |job| parked.push(job)));
        assert!(throttle.is_running());
        // Interval elapsed again, but the first job has not run yet.
        assert!(!throttle.execute_when_possible(1.0, |_| {}, |job| parked.push(job)));
        assert_eq!(parked.len(), 1);

        for job in parked.drain(..) {
            job();
        }
        assert!(!throttle.is_running());
        assert!(throttle.execute_when_possible(0.0, |_| {}, |job| job()));
    }

    #[test]
    fn test_dropped_job_releases_flag() {
        let throttle = TickThrottle::new(100.0);
        assert!(throttle.execute_when_possible(1.0, |_| {}, drop));
        assert!(!throttle.is_running());
    }

    #[test]
    fn test_invalid_rates_fall_back_to_default() {
        let default_threshold = 1.0 / DEFAULT_TICK_RATE;
        for tps in [0.0, -5.0, f32::NAN, f32::INFINITY] {
            let throttle = TickThrottle::new(tps);
            assert!((throttle.threshold() - default_threshold).abs() < f32::EPSILON);
        }

        let throttle = TickThrottle::new(4.0);
        throttle.set_tps(0.0);
        assert!((throttle.threshold() - default_threshold).abs() < f32::EPSILON);
        throttle.add_delta(0.001);
        assert!(!throttle.can_execute());
    }

    #[test]
    fn test_set_tps() {
        let throttle = TickThrottle::default();
        assert!((throttle.threshold() - 1.0 / 30.0).abs() < f32::EPSILON);

        throttle.set_tps(2.0);
        throttle.add_delta(0.4);
        assert!(!throttle.can_execute());
        throttle.add_delta(0.1);
        assert!(throttle.can_execute());
    }
}
