//! Shrinking safe zone: phase table, authoritative driver, observer mirror
//! and drawing geometry

pub mod authority;
pub mod driver;
pub mod mirror;
pub mod phase;
pub mod projector;
pub mod state;
pub mod timer;

pub use authority::{AuthoritativeState, AuthorityToken, Replicate, SessionRole};
pub use driver::{ShrinkDriver, ZoneEvent};
pub use mirror::ZoneMirror;
pub use phase::{Phase, PhaseTable, ZoneSettings};
pub use projector::{phase_preview, LineStyle, PreviewRing, RingProjector, WallProjector, ZoneView};
pub use state::{ZoneSnapshot, ZoneState};
pub use timer::{Tick, TickRate, TickTimer};
