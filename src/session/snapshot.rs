//! Snapshot cadence

/// Decides on which ticks a zone snapshot goes out
pub struct SnapshotCadence {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotCadence {
    pub fn new(snapshot_interval: u32) -> Self {
        // First call to should_send fires so observers get state right away
        let snapshot_interval = snapshot_interval.max(1);
        Self {
            ticks_since_snapshot: snapshot_interval - 1,
            snapshot_interval,
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for zone events and new observers)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }
}
