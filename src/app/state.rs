//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::session::{SessionRegistry, SessionService, SessionTiming};
use crate::util::rate_limit::{create_limiter, Limiter, SESSION_CREATE_RATE_LIMIT};
use crate::zone::SessionRole;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionService>,
    pub session_registry: Arc<SessionRegistry>,
    pub create_limiter: Arc<Limiter>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Initialize session registry
        let session_registry = Arc::new(SessionRegistry::new());

        // Initialize session service
        let timing = SessionTiming {
            simulation_tps: config.simulation_tps,
            snapshot_tps: config.snapshot_tps,
        };
        let role = SessionRole::from_is_server(config.is_session_server);
        let sessions = Arc::new(SessionService::new(session_registry.clone(), role, timing));

        Self {
            config,
            sessions,
            session_registry,
            create_limiter: create_limiter(SESSION_CREATE_RATE_LIMIT),
        }
    }
}
