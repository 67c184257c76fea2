//! Core adapter state and orchestration
//!
//! - `connection` / `registry`: per-device link state and the concurrent map holding it
//! - `statistics`: global per-operation counters
//! - `health` / `permission` / `handlers`: pure decision logic used by the manager
//! - `error_mapping`: system error codes to protocol error codes
//! - `manager`: the public protocol manager

pub mod clock;
pub mod connection;
pub mod error_mapping;
pub mod handlers;
pub mod health;
pub mod log_sink;
pub mod manager;
pub mod permission;
pub mod registry;
pub mod statistics;
pub mod types;
