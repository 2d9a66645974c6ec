//! Geometry for drawing the zone: boundary ring, wall mesh transform and
//! phase preview rings. Pure read-side code, safe on every participant.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::phase::ZoneSettings;

/// Fewest segments a ring may be drawn with
pub const MIN_RING_SEGMENTS: usize = 8;
/// Most segments a ring may be drawn with
pub const MAX_RING_SEGMENTS: usize = 4096;
pub const DEFAULT_RING_SEGMENTS: usize = 120;

/// Line appearance for the boundary ring
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineStyle {
    /// RGBA, 0..1
    pub color: [f32; 4],
    pub width: f32,
    /// Lift above the ground so the line does not z-fight
    pub height_offset: f32,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            color: [0.2, 0.6, 1.0, 1.0],
            width: 0.35,
            height_offset: 0.1,
        }
    }
}

/// Zone view the projectors read from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneView {
    pub center: Vec2,
    pub radius: f32,
    pub ground_height: f32,
}

impl ZoneView {
    pub fn world_center(&self) -> Vec3 {
        Vec3::new(self.center.x, self.ground_height, self.center.y)
    }
}

/// Projects the zone boundary as a closed polyline
#[derive(Debug, Clone)]
pub struct RingProjector {
    segments: usize,
    style: LineStyle,
    last_view: Option<ZoneView>,
    points: Vec<Vec3>,
}

impl RingProjector {
    pub fn new(segments: usize, style: LineStyle) -> Self {
        Self {
            segments: segments.clamp(MIN_RING_SEGMENTS, MAX_RING_SEGMENTS),
            style: LineStyle {
                width: style.width.max(0.0),
                ..style
            },
            last_view: None,
            points: Vec::new(),
        }
    }

    pub fn segments(&self) -> usize {
        self.segments
    }

    pub fn style(&self) -> &LineStyle {
        &self.style
    }

    /// Ring points for `view`. Empty when the radius is degenerate.
    pub fn project(&self, view: &ZoneView) -> Vec<Vec3> {
        if view.radius <= f32::EPSILON {
            return Vec::new();
        }

        let y = view.ground_height + self.style.height_offset;
        (0..self.segments)
            .map(|i| {
                let angle = std::f32::consts::TAU * i as f32 / self.segments as f32;
                let (sin, cos) = angle.sin_cos();
                Vec3::new(
                    view.center.x + cos * view.radius,
                    y,
                    view.center.y + sin * view.radius,
                )
            })
            .collect()
    }

    /// Recompute the ring if center, radius or ground changed since the last
    /// call. Returns the fresh points, or `None` when nothing changed.
    pub fn update(&mut self, view: ZoneView) -> Option<&[Vec3]> {
        if self.last_view == Some(view) {
            return None;
        }

        self.points = self.project(&view);
        self.last_view = Some(view);
        Some(&self.points)
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }
}

impl Default for RingProjector {
    fn default() -> Self {
        Self::new(DEFAULT_RING_SEGMENTS, LineStyle::default())
    }
}

/// Scale and position for a unit cylinder mesh standing on the zone edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WallTransform {
    pub position: Vec3,
    pub scale: Vec3,
}

/// Fits a cylinder wall mesh to the zone
#[derive(Debug, Clone, Copy)]
pub struct WallProjector {
    pub wall_height: f32,
    /// Mesh size at scale 1
    pub base_scale: Vec3,
}

impl WallProjector {
    const MIN_EXTENT: f32 = 0.01;

    pub fn transform(&self, view: &ZoneView) -> WallTransform {
        let diameter = view.radius.max(Self::MIN_EXTENT) * 2.0;

        WallTransform {
            position: view.world_center() + Vec3::new(0.0, self.wall_height * 0.5, 0.0),
            scale: Vec3::new(
                diameter / self.base_scale.x.max(Self::MIN_EXTENT),
                self.wall_height / self.base_scale.y.max(Self::MIN_EXTENT),
                diameter / self.base_scale.z.max(Self::MIN_EXTENT),
            ),
        }
    }
}

impl Default for WallProjector {
    fn default() -> Self {
        Self {
            wall_height: 30.0,
            base_scale: Vec3::ONE,
        }
    }
}

/// One ring in the phase preview
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreviewRing {
    /// None for the initial radius, otherwise the phase index
    pub phase: Option<u32>,
    pub radius: f32,
    pub alpha: f32,
}

/// Rings for the initial radius and every phase target, fading with depth.
/// All drawn around the initial center since random centers are not known
/// ahead of time.
pub fn phase_preview(settings: &ZoneSettings) -> Vec<PreviewRing> {
    if settings.phases.is_empty() {
        return Vec::new();
    }

    let count = settings.phases.len() as f32;
    let initial = PreviewRing {
        phase: None,
        radius: settings.initial_radius,
        alpha: 0.6,
    };

    std::iter::once(initial)
        .chain(settings.phases.iter().enumerate().map(|(i, phase)| PreviewRing {
            phase: Some(i as u32),
            radius: phase.target_radius,
            alpha: 0.5 + (0.2 - 0.5) * (i as f32 / count),
        }))
        .filter(|ring| ring.radius > 0.0)
        .collect()
}
