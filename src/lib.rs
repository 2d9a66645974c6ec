//! Authoritative shrinking safe zone for multiplayer arena sessions.
//!
//! [`zone`] holds the simulation itself and can be embedded on its own; the
//! remaining modules wrap it in a small tokio/axum server.

pub mod app;
pub mod config;
pub mod http;
pub mod session;
pub mod util;
pub mod ws;
pub mod zone;
