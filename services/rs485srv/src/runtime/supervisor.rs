//! Periodic supervision tasks
//!
//! Two background loops run while the adapter is started:
//! - heartbeat sweep: disconnects devices whose last heartbeat is older than the timeout
//! - statistics reset: clears the global per-operation counters

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::clock::Clock;
use crate::core::log_sink::{dispatch, CommAction, CommLogEntry, CommLogSink};
use crate::core::registry::ConnectionRegistry;
use crate::core::statistics::Statistics;
use crate::core::types::DeviceId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub heartbeat_sweep_interval: Duration,
    pub heartbeat_timeout_ms: i64,
    pub statistics_reset_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            heartbeat_sweep_interval: Duration::from_secs(30),
            heartbeat_timeout_ms: 60_000,
            statistics_reset_interval: Duration::from_secs(300),
        }
    }
}

/// Lower bound for loop periods; tokio intervals reject a zero period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

fn loop_period(name: &str, configured: Duration) -> Duration {
    if configured < MIN_PERIOD {
        warn!("{} interval {:?} is below {:?}, using {:?}", name, configured, MIN_PERIOD, MIN_PERIOD);
        return MIN_PERIOD;
    }
    configured
}

/// Shared state the supervisor loops operate on
#[derive(Clone)]
pub struct SupervisorContext {
    pub registry: Arc<ConnectionRegistry>,
    pub statistics: Arc<Statistics>,
    pub clock: Arc<dyn Clock>,
    pub log_sink: Arc<dyn CommLogSink>,
}

/// Disconnect every connected device whose last heartbeat is more than
/// `timeout_ms` in the past. Returns the affected device ids.
pub fn sweep_heartbeat_timeouts(ctx: &SupervisorContext, timeout_ms: i64) -> Vec<DeviceId> {
    let now = ctx.clock.now_millis();
    let expired = ctx.registry.sweep_stale(now, timeout_ms);

    for &device_id in &expired {
        warn!("Device {} heartbeat timeout, connection dropped", device_id);
        dispatch(
            &ctx.log_sink,
            CommLogEntry::new(
                device_id,
                CommAction::HeartbeatTimeout,
                format!("no heartbeat for more than {}ms", timeout_ms),
                now,
            ),
        );
    }
    expired
}

pub struct Supervisor {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Supervisor {
    /// Spawn the supervision loops. The first tick of each loop fires one full
    /// period after start.
    pub fn start(ctx: SupervisorContext, config: SupervisorConfig) -> Self {
        let cancel = CancellationToken::new();
        let mut tasks = Vec::with_capacity(2);

        {
            let ctx = ctx.clone();
            let cancel = cancel.clone();
            let period = loop_period("Heartbeat sweep", config.heartbeat_sweep_interval);
            let timeout_ms = config.heartbeat_timeout_ms;
            tasks.push(tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            let expired = sweep_heartbeat_timeouts(&ctx, timeout_ms);
                            if !expired.is_empty() {
                                info!("Heartbeat sweep disconnected {} device(s)", expired.len());
                            }
                        }
                    }
                }
                debug!("Heartbeat sweep stopped");
            }));
        }

        {
            let statistics = Arc::clone(&ctx.statistics);
            let cancel = cancel.clone();
            let period = loop_period("Statistics reset", config.statistics_reset_interval);
            tasks.push(tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            debug!(
                                "Resetting statistics ({} messages, {} errors)",
                                statistics.total_messages(),
                                statistics.total_errors()
                            );
                            statistics.reset();
                        }
                    }
                }
                debug!("Statistics reset task stopped");
            }));
        }

        info!(
            "Supervisor started: heartbeat sweep every {:?} (timeout {}ms), statistics reset every {:?}",
            config.heartbeat_sweep_interval, config.heartbeat_timeout_ms, config.statistics_reset_interval
        );
        Self { cancel, tasks }
    }

    pub async fn stop(self) {
        self.cancel.cancel();
        for result in futures::future::join_all(self.tasks).await {
            if let Err(e) = result {
                warn!("Supervisor task ended abnormally: {}", e);
            }
        }
        info!("Supervisor stopped");
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::config::serial::SerialConfig;
    use crate::core::clock::ManualClock;
    use crate::core::connection::DeviceConnection;
    use crate::core::log_sink::MemoryLogSink;
    use crate::core::statistics::ops;

    fn context(clock: Arc<ManualClock>, sink: Arc<MemoryLogSink>) -> SupervisorContext {
        SupervisorContext {
            registry: Arc::new(ConnectionRegistry::new()),
            statistics: Arc::new(Statistics::new()),
            clock,
            log_sink: sink,
        }
    }

    fn connect(ctx: &SupervisorContext, device_id: DeviceId, now: i64) -> Arc<DeviceConnection> {
        let conn = Arc::new(DeviceConnection::new(device_id, "RS485-MODBUS-RTU", SerialConfig::default()));
        conn.connect(now);
        ctx.registry.insert(Arc::clone(&conn));
        conn
    }

    #[tokio::test]
    async fn test_sweep_disconnects_only_stale_devices() {
        let clock = Arc::new(ManualClock::new(0));
        let sink = Arc::new(MemoryLogSink::new());
        let ctx = context(Arc::clone(&clock), Arc::clone(&sink));

        let stale = connect(&ctx, 1, 0);
        clock.set(50_000);
        let fresh = connect(&ctx, 2, 50_000);

        clock.set(60_001);
        let expired = sweep_heartbeat_timeouts(&ctx, 60_000);

        assert_eq!(expired, vec![1]);
        assert!(!stale.is_connected());
        assert!(fresh.is_connected());
        assert!(ctx.registry.contains(1));

        let entries = sink.wait_for(1, Duration::from_secs(1)).await;
        assert_eq!(entries[0].action, CommAction::HeartbeatTimeout);
        assert_eq!(entries[0].device_id, 1);
    }

    #[tokio::test]
    async fn test_sweep_boundary_is_exclusive() {
        let clock = Arc::new(ManualClock::new(0));
        let ctx = context(Arc::clone(&clock), Arc::new(MemoryLogSink::new()));
        let conn = connect(&ctx, 7, 0);

        clock.set(60_000);
        assert!(sweep_heartbeat_timeouts(&ctx, 60_000).is_empty());
        assert!(conn.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_loops_fire_on_schedule() {
        let clock = Arc::new(ManualClock::new(0));
        let ctx = context(Arc::clone(&clock), Arc::new(MemoryLogSink::new()));
        let conn = connect(&ctx, 3, 0);
        ctx.statistics.record_message(ops::PROCESS);

        let config = SupervisorConfig {
            heartbeat_sweep_interval: Duration::from_secs(30),
            heartbeat_timeout_ms: 60_000,
            statistics_reset_interval: Duration::from_secs(300),
        };
        let supervisor = Supervisor::start(ctx.clone(), config);

        clock.set(61_000);
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(!conn.is_connected());
        assert_eq!(ctx.statistics.total_messages(), 1);

        tokio::time::sleep(Duration::from_secs(270)).await;
        assert_eq!(ctx.statistics.total_messages(), 0);

        supervisor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_intervals_still_run() {
        let clock = Arc::new(ManualClock::new(0));
        let ctx = context(Arc::clone(&clock), Arc::new(MemoryLogSink::new()));
        let conn = connect(&ctx, 4, 0);
        ctx.statistics.record_message(ops::PROCESS);

        let config = SupervisorConfig {
            heartbeat_sweep_interval: Duration::ZERO,
            heartbeat_timeout_ms: 1_000,
            statistics_reset_interval: Duration::ZERO,
        };
        let supervisor = Supervisor::start(ctx.clone(), config);

        clock.set(2_000);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!conn.is_connected());
        assert_eq!(ctx.statistics.total_messages(), 0);

        supervisor.stop().await;
    }
}
