//! Health scoring for heartbeat results

use super::types::{ConnectionSnapshot, HealthStatus};

const DISCONNECTED_PENALTY: f64 = 50.0;
const SLOW_RESPONSE_MS: f64 = 1000.0;
const SLOW_RESPONSE_PENALTY: f64 = 20.0;
const SLUGGISH_RESPONSE_MS: f64 = 500.0;
const SLUGGISH_RESPONSE_PENALTY: f64 = 10.0;
const ERROR_RATE_WEIGHT: f64 = 50.0;
const LONG_IDLE_MS: i64 = 60_000;
const LONG_IDLE_PENALTY: f64 = 15.0;
const SHORT_IDLE_MS: i64 = 30_000;
const SHORT_IDLE_PENALTY: f64 = 5.0;

const UNHEALTHY_BELOW: f64 = 50.0;
const WARNING_ERROR_COUNT: u64 = 100;
const HEALTHY_FROM: f64 = 90.0;

/// Score in `[0, 100]`, higher is better
pub fn health_score(snapshot: &ConnectionSnapshot) -> f64 {
    let mut score = 100.0;

    if !snapshot.connected {
        score -= DISCONNECTED_PENALTY;
    }

    let avg = snapshot.average_response_time_ms;
    if avg > SLOW_RESPONSE_MS {
        score -= SLOW_RESPONSE_PENALTY;
    } else if avg > SLUGGISH_RESPONSE_MS {
        score -= SLUGGISH_RESPONSE_PENALTY;
    }

    score -= snapshot.error_rate() * ERROR_RATE_WEIGHT;

    let idle = snapshot.idle_ms();
    if idle > LONG_IDLE_MS {
        score -= LONG_IDLE_PENALTY;
    } else if idle > SHORT_IDLE_MS {
        score -= SHORT_IDLE_PENALTY;
    }

    f64::max(score, 0.0)
}

/// First matching rule wins
pub fn classify(snapshot: &ConnectionSnapshot, score: f64) -> HealthStatus {
    if !snapshot.connected {
        HealthStatus::Offline
    } else if score < UNHEALTHY_BELOW {
        HealthStatus::Unhealthy
    } else if snapshot.error_count > WARNING_ERROR_COUNT {
        HealthStatus::Warning
    } else if score >= HEALTHY_FROM {
        HealthStatus::Healthy
    } else {
        HealthStatus::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> ConnectionSnapshot {
        ConnectionSnapshot {
            device_id: 1,
            device_model: "TEMP_SENSOR_485_V1".into(),
            connected: true,
            authenticated: true,
            write_enabled: true,
            connection_time_ms: 0,
            last_heartbeat_ms: 0,
            last_activity_ms: 0,
            message_count: 0,
            error_count: 0,
            average_response_time_ms: 0.0,
            uptime_ms: 0,
            taken_at_ms: 0,
        }
    }

    #[test]
    fn test_fresh_connection_is_healthy() {
        let snap = snapshot();
        assert_eq!(health_score(&snap), 100.0);
        assert_eq!(classify(&snap, 100.0), HealthStatus::Healthy);
    }

    #[test]
    fn test_penalties() {
        let mut snap = snapshot();
        snap.average_response_time_ms = 600.0;
        assert_eq!(health_score(&snap), 90.0);
        snap.average_response_time_ms = 1500.0;
        assert_eq!(health_score(&snap), 80.0);

        let mut snap = snapshot();
        snap.taken_at_ms = 45_000;
        assert_eq!(health_score(&snap), 95.0);
        snap.taken_at_ms = 61_000;
        assert_eq!(health_score(&snap), 85.0);

        let mut snap = snapshot();
        snap.message_count = 3;
        snap.error_count = 1;
        assert_eq!(health_score(&snap), 87.5);
        assert_eq!(classify(&snap, 87.5), HealthStatus::Normal);
    }

    #[test]
    fn test_offline_and_floor() {
        let mut snap = snapshot();
        snap.connected = false;
        snap.authenticated = false;
        snap.error_count = 10;
        snap.average_response_time_ms = 5000.0;
        snap.taken_at_ms = 600_000;
        // 100 - 50 - 20 - 50 - 15 floors at zero
        assert_eq!(health_score(&snap), 0.0);
        assert_eq!(classify(&snap, 0.0), HealthStatus::Offline);
    }

    #[test]
    fn test_warning_needs_many_errors() {
        let mut snap = snapshot();
        snap.message_count = 10_000;
        snap.error_count = 101;
        let score = health_score(&snap);
        assert!(score > 90.0);
        assert_eq!(classify(&snap, score), HealthStatus::Warning);

        assert_eq!(classify(&snap, 40.0), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_score_monotonic_in_error_count() {
        let mut snap = snapshot();
        snap.message_count = 50;
        let mut previous = f64::MAX;
        for errors in 0..500 {
            snap.error_count = errors;
            let score = health_score(&snap);
            assert!(score <= previous, "score rose at {} errors", errors);
            previous = score;
        }
    }
}
