//! Time utilities for the zone simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Tick rate defaults
pub const DEFAULT_SIMULATION_TPS: u32 = 20; // 50ms ticks
pub const DEFAULT_SNAPSHOT_TPS: u32 = 10;

/// Simulation ticks between two snapshots (at least one)
pub fn snapshot_interval(simulation_tps: u32, snapshot_tps: u32) -> u32 {
    (simulation_tps / snapshot_tps.max(1)).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_interval_never_zero() {
        assert_eq!(snapshot_interval(20, 10), 2);
        assert_eq!(snapshot_interval(20, 60), 1);
        assert_eq!(snapshot_interval(30, 0), 30);
    }
}
