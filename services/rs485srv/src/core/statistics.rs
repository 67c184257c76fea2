//! Global per-operation counters
//!
//! Owned by the protocol manager and shared with the statistics-reset
//! supervisor. Connection level counters live on each connection and are not
//! touched by [`Statistics::reset`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::types::OperationCounters;

/// Operation names used as counter keys
pub mod ops {
    pub const INITIALIZE: &str = "initialize";
    pub const PARSE: &str = "parse";
    pub const PROCESS: &str = "process";
    pub const BUILD: &str = "build";
    pub const HEARTBEAT: &str = "heartbeat";
}

#[derive(Debug, Default)]
pub struct Statistics {
    messages: DashMap<&'static str, AtomicU64>,
    errors: DashMap<&'static str, AtomicU64>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_message(&self, operation: &'static str) {
        self.messages
            .entry(operation)
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, operation: &'static str) {
        self.errors
            .entry(operation)
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_messages(&self) -> u64 {
        Self::sum(&self.messages)
    }

    pub fn total_errors(&self) -> u64 {
        Self::sum(&self.errors)
    }

    pub fn operation(&self, operation: &str) -> OperationCounters {
        OperationCounters {
            messages: Self::read(&self.messages, operation),
            errors: Self::read(&self.errors, operation),
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, OperationCounters> {
        let mut out: BTreeMap<String, OperationCounters> = BTreeMap::new();
        for entry in self.messages.iter() {
            out.entry(entry.key().to_string()).or_default().messages =
                entry.value().load(Ordering::Relaxed);
        }
        for entry in self.errors.iter() {
            out.entry(entry.key().to_string()).or_default().errors =
                entry.value().load(Ordering::Relaxed);
        }
        out
    }

    pub fn reset(&self) {
        self.messages.clear();
        self.errors.clear();
    }

    fn sum(map: &DashMap<&'static str, AtomicU64>) -> u64 {
        map.iter().map(|entry| entry.value().load(Ordering::Relaxed)).sum()
    }

    fn read(map: &DashMap<&'static str, AtomicU64>, operation: &str) -> u64 {
        map.get(operation)
            .map(|entry| entry.value().load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_totals() {
        let stats = Statistics::new();
        stats.record_message(ops::PROCESS);
        stats.record_message(ops::PROCESS);
        stats.record_message(ops::PARSE);
        stats.record_error(ops::PROCESS);

        assert_eq!(stats.total_messages(), 3);
        assert_eq!(stats.total_errors(), 1);
        assert_eq!(
            stats.operation(ops::PROCESS),
            OperationCounters {
                messages: 2,
                errors: 1
            }
        );
        assert_eq!(stats.operation(ops::BUILD), OperationCounters::default());

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["parse"].messages, 1);
    }

    #[test]
    fn test_reset_clears_everything() {
        let stats = Statistics::new();
        stats.record_message(ops::HEARTBEAT);
        stats.record_error(ops::BUILD);
        stats.reset();
        assert_eq!(stats.total_messages(), 0);
        assert_eq!(stats.total_errors(), 0);
        assert!(stats.snapshot().is_empty());
    }

    #[test]
    fn test_concurrent_increments() {
        let stats = std::sync::Arc::new(Statistics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = std::sync::Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_message(ops::PROCESS);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().ok();
        }
        assert_eq!(stats.total_messages(), 8000);
    }
}
