//! Session service - creates, tracks and stops zone sessions

use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::zone::{SessionRole, ZoneSettings};

use super::runner::{SessionHandle, SessionRegistry, SessionTiming, ZoneSession};
use super::SessionCommand;

/// Session service
pub struct SessionService {
    registry: Arc<SessionRegistry>,
    role: SessionRole,
    timing: SessionTiming,
}

impl SessionService {
    pub fn new(registry: Arc<SessionRegistry>, role: SessionRole, timing: SessionTiming) -> Self {
        Self {
            registry,
            role,
            timing,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Spawn a new session task. The session removes itself from the
    /// registry when its loop ends.
    pub fn create_session(
        &self,
        settings: ZoneSettings,
        seed: Option<u64>,
    ) -> Result<SessionHandle, SessionError> {
        let token = self.role.claim_authority().ok_or(SessionError::NotAuthority)?;
        let id = Uuid::new_v4();
        let seed = seed.unwrap_or_else(|| rand::thread_rng().gen());

        let (session, handle) = ZoneSession::new(id, token, settings, seed, self.timing);
        self.registry.insert(handle.clone());

        info!(
            session_id = %id,
            seed,
            phases = handle.settings.phases.len(),
            initial_radius = handle.settings.initial_radius,
            "Created zone session"
        );

        let registry = self.registry.clone();
        tokio::spawn(async move {
            session.run().await;
            registry.remove(&id);
        });

        Ok(handle)
    }

    /// Ask a session to stop at its next tick
    pub async fn stop_session(&self, id: Uuid) -> Result<(), SessionError> {
        let handle = self.registry.get(&id).ok_or(SessionError::NotFound(id))?;

        if handle.command_tx.send(SessionCommand::Stop).await.is_err() {
            warn!(session_id = %id, "Session loop already gone");
            self.registry.remove(&id);
            return Err(SessionError::Closed(id));
        }

        Ok(())
    }
}

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("This server is not the session authority")]
    NotAuthority,

    #[error("Session not found: {0}")]
    NotFound(Uuid),

    #[error("Session already closed: {0}")]
    Closed(Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::{Phase, PhaseTable};

    fn timing() -> SessionTiming {
        SessionTiming {
            simulation_tps: 20,
            snapshot_tps: 10,
        }
    }

    #[tokio::test]
    async fn client_role_cannot_create_sessions() {
        let service = SessionService::new(
            Arc::new(SessionRegistry::new()),
            SessionRole::Client,
            timing(),
        );
        assert!(matches!(
            service.create_session(ZoneSettings::default(), None),
            Err(SessionError::NotAuthority)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_session_leaves_the_registry() {
        let registry = Arc::new(SessionRegistry::new());
        let service = SessionService::new(registry.clone(), SessionRole::Server, timing());
        let settings = ZoneSettings::new(30.0, true, PhaseTable::new(vec![Phase::new(5.0, 5.0)]));

        let handle = service.create_session(settings, Some(42)).unwrap();
        assert_eq!(handle.seed, 42);
        assert_eq!(registry.active_sessions(), 1);

        let mut rx = handle.subscribe();
        service.stop_session(handle.id).await.unwrap();

        loop {
            if let Ok(crate::ws::protocol::ServerMsg::SessionEnded { reason, .. }) = rx.recv().await {
                assert_eq!(reason, "stopped");
                break;
            }
        }

        // Let the spawned task finish its cleanup
        for _ in 0..10 {
            if registry.active_sessions() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(registry.active_sessions(), 0);
        assert!(matches!(
            service.stop_session(handle.id).await,
            Err(SessionError::NotFound(_))
        ));
    }
}
