//! # Pacing and Synchronization Helpers
//!
//! The kernel itself serializes through one lock in the
//! [`Coordinator`](crate::Coordinator). This module holds the pieces that sit
//! beside it:
//!
//! ```text
//! frame delta ──► TickThrottle ──(interval elapsed, nothing running)──► scheduler(job)
//!                      ▲                                                   │
//!                      └──────────── flag released when job ends ◄─────────┘
//! ```

mod throttle;

pub use throttle::{Job, TickThrottle};
