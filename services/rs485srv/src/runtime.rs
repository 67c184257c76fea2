//! Runtime orchestration layer
//!
//! Bounded worker pool for per-device operations and the periodic supervisor
//! tasks (heartbeat sweep, statistics reset).

pub mod supervisor;
pub mod worker_pool;

pub use supervisor::{Supervisor, SupervisorConfig, SupervisorContext};
pub use worker_pool::{TaskHandle, WorkerPool};
