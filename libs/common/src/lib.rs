//! Shared service plumbing
//!
//! Provides the functions every adapter service needs at startup and shutdown:
//! - logging initialization (console + optional rolling file)
//! - shutdown signal handling
//! - hex helpers for frame dumps
//! - common command-line arguments (feature `cli`)

pub mod bootstrap_args;
pub mod error;
pub mod hex;
pub mod logging;
pub mod service_bootstrap;
pub mod shutdown;

pub use error::{Error, Result};

// Re-export common dependencies
pub use tokio;

// Re-export CLI dependencies when cli feature is enabled
#[cfg(feature = "cli")]
pub use clap;
