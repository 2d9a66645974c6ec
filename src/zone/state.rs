//! Zone state and its replicated snapshot

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::timer::{Tick, TickRate, TickTimer};

/// Authoritative zone state
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneState {
    /// Center on the horizontal plane
    pub center: Vec2,
    pub radius: f32,
    /// Index of the phase in progress, -1 before the first phase
    pub active_phase_index: i32,
    pub phase_timer: TickTimer,
}

impl ZoneState {
    pub fn new(center: Vec2, radius: f32) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
            active_phase_index: -1,
            phase_timer: TickTimer::NONE,
        }
    }
}

/// Zone state as sent to observers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    /// Authority tick the snapshot was taken on
    pub tick: u64,
    pub center_x: f32,
    pub center_y: f32,
    pub radius: f32,
    pub active_phase_index: i32,
    /// Seconds left in the running phase (0 when no phase is running)
    pub phase_remaining_secs: f32,
    /// All phases done, the zone will not change again
    pub completed: bool,
}

impl ZoneSnapshot {
    pub fn capture(state: &ZoneState, now: Tick, rate: TickRate, completed: bool) -> Self {
        Self {
            tick: now.0,
            center_x: state.center.x,
            center_y: state.center.y,
            radius: state.radius,
            active_phase_index: state.active_phase_index,
            phase_remaining_secs: state.phase_timer.remaining_secs(now, rate).unwrap_or(0.0),
            completed,
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.center_x, self.center_y)
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.distance_squared(self.center()) <= self.radius * self.radius
    }

    /// Distance from the zone edge (negative = inside, positive = outside)
    pub fn edge_distance(&self, point: Vec2) -> f32 {
        point.distance(self.center()) - self.radius
    }
}
