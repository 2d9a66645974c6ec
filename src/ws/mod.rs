//! WebSocket endpoint for zone observers

pub mod handler;
pub mod protocol;
