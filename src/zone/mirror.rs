//! Read-only replica of the zone for non-authoritative participants

use glam::Vec2;

use super::state::ZoneSnapshot;

/// Last zone snapshot seen by an observer
#[derive(Debug, Clone, Default)]
pub struct ZoneMirror {
    latest: Option<ZoneSnapshot>,
}

impl ZoneMirror {
    pub fn new() -> Self {
        Self { latest: None }
    }

    /// Apply a replicated snapshot. Snapshots not newer than the last applied
    /// one are dropped; returns whether this one was taken.
    pub fn apply(&mut self, snapshot: ZoneSnapshot) -> bool {
        match self.latest {
            Some(current) if snapshot.tick <= current.tick => false,
            _ => {
                self.latest = Some(snapshot);
                true
            }
        }
    }

    pub fn latest(&self) -> Option<&ZoneSnapshot> {
        self.latest.as_ref()
    }

    pub fn current_center(&self) -> Option<Vec2> {
        self.latest.map(|s| s.center())
    }

    pub fn current_radius(&self) -> Option<f32> {
        self.latest.map(|s| s.radius)
    }

    pub fn has_completed_all_phases(&self) -> bool {
        self.latest.is_some_and(|s| s.completed)
    }
}
