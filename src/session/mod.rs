//! Zone sessions: one authoritative zone per session, ticked on its own task

pub mod runner;
pub mod service;
pub mod snapshot;

pub use runner::{SessionHandle, SessionRegistry, SessionTiming, ZoneSession};
pub use service::{SessionError, SessionService};

use uuid::Uuid;

/// Commands delivered to a session loop
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Observer starts receiving zone updates
    Subscribe { client_id: Uuid },
    /// Observer stopped listening (or disconnected)
    Leave { client_id: Uuid },
    /// Tear the session down at the next tick
    Stop,
}
