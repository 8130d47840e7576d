//! # Worker Pool
//!
//! Fixed set of OS threads draining one job channel.
//!
//! Paced systems never own threads. They hand a [`Job`] to whatever
//! scheduling function the caller passes; [`WorkerPool::scheduler`] is the
//! one used by the frame driver.
//!
//! A panicking job is caught and logged so the worker survives it.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tessera_core::Job;

/// Counters shared between the pool and its workers.
#[derive(Debug, Default)]
struct PoolCounters {
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// A fixed-size thread pool fed through a crossbeam channel.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<PoolCounters>,
}

impl WorkerPool {
    /// Spawns `threads` workers (at least one).
    ///
    /// # Errors
    ///
    /// Fails if the operating system refuses to spawn a thread. Workers
    /// already started are shut down before returning.
    pub fn new(threads: usize) -> io::Result<Self> {
        let threads = threads.max(1);
        let (sender, receiver) = unbounded::<Job>();
        let counters = Arc::new(PoolCounters::default());

        let mut pool = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(threads),
            counters,
        };
        for index in 0..threads {
            let receiver = receiver.clone();
            let counters = Arc::clone(&pool.counters);
            let worker = thread::Builder::new()
                .name(format!("tessera-worker-{index}"))
                .spawn(move || worker_loop(&receiver, &counters))?;
            pool.workers.push(worker);
        }

        tracing::debug!(threads, "worker pool started");
        Ok(pool)
    }

    /// Number of worker threads.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Queues a boxed job.
    ///
    /// Returns `false` if the pool has been shut down; the job is then
    /// dropped without running.
    pub fn submit(&self, job: Job) -> bool {
        match &self.sender {
            Some(sender) => sender.send(job).is_ok(),
            None => false,
        }
    }

    /// Queues a closure.
    pub fn spawn<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Box::new(task))
    }

    /// A scheduling function for [`TickThrottle`](tessera_core::TickThrottle)
    /// and [`SystemHandle::execute_when_possible`](tessera_core::SystemHandle::execute_when_possible).
    pub fn scheduler(&self) -> impl Fn(Job) + '_ {
        move |job| {
            if !self.submit(job) {
                tracing::warn!("job dropped: worker pool is shut down");
            }
        }
    }

    /// Jobs queued but not yet picked up by a worker.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.sender.as_ref().map_or(0, Sender::len)
    }

    /// Jobs that ran to completion.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.counters.completed.load(Ordering::Relaxed)
    }

    /// Jobs that panicked.
    #[must_use]
    pub fn panicked(&self) -> u64 {
        self.counters.panicked.load(Ordering::Relaxed)
    }

    /// Closes the queue, lets the workers drain it and joins them.
    pub fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("worker thread terminated abnormally");
            }
        }
        tracing::debug!(
            completed = self.completed(),
            panicked = self.panicked(),
            "worker pool stopped"
        );
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(receiver: &Receiver<Job>, counters: &PoolCounters) {
    while let Ok(job) = receiver.recv() {
        if panic::catch_unwind(AssertUnwindSafe(job)).is_ok() {
            counters.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            counters.panicked.fetch_add(1, Ordering::Relaxed);
            tracing::error!("job panicked on worker thread");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_runs_every_job_before_shutdown_returns() {
        let mut pool = WorkerPool::new(4).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            assert!(pool.spawn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.shutdown();

        assert_eq!(counter.load(Ordering::SeqCst), 100);
        assert_eq!(pool.completed(), 100);
    }

    #[test]
    fn test_submit_after_shutdown_is_rejected() {
        let mut pool = WorkerPool::new(1).unwrap();
        pool.shutdown();
        assert!(!pool.spawn(|| {}));
        assert_eq!(pool.queued(), 0);
    }

    #[test]
    fn test_panicking_job_does_not_kill_worker() {
        let mut pool = WorkerPool::new(1).unwrap();
        pool.spawn(|| panic!("boom"));
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&ran);
        pool.spawn(move || {
            flag.store(1, Ordering::SeqCst);
        });
        pool.shutdown();

        assert_eq!(pool.panicked(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_threads_rounds_up() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.threads(), 1);
    }
}
