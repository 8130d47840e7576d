//! # Tessera
//!
//! The application side of the ECS kernel.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────┐  tick(delta)   ┌──────────────────────┐
//!   │ FrameDriver  │───────────────>│ SystemHandle<T>      │
//!   │              │                │   TickThrottle       │
//!   └──────┬───────┘                └──────────┬───────────┘
//!          │ render()                          │ Job
//!          │                                   ▼
//!          │                        ┌──────────────────────┐
//!          │                        │ WorkerPool           │
//!          │                        │   crossbeam channel  │
//!          │                        └──────────┬───────────┘
//!          ▼                                   ▼
//!   ┌─────────────────────────────────────────────────────┐
//!   │ Arc<Coordinator>   (tessera_core)                   │
//!   └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `worker_pool`: fixed thread pool used as the pacing scheduler
//! - `frame`: per-frame ticking and rendering of registered systems

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod frame;
pub mod worker_pool;

pub use tessera_core as core;

pub use frame::{FrameDriver, FrameStats};
pub use worker_pool::WorkerPool;
