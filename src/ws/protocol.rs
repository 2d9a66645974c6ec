//! WebSocket protocol message definitions
//! These are the wire types for observer-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::zone::{Phase, ZoneEvent, ZoneSnapshot};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Start receiving zone updates for a session
    Subscribe { session_id: Uuid },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Stop receiving updates
    Leave,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { client_id: Uuid, server_time: u64 },

    /// Confirmation of a subscription
    Subscribed {
        session_id: Uuid,
        /// Seed the zone centers are drawn from
        seed: u64,
        tick_rate: u32,
        initial_radius: f32,
        phases: Vec<Phase>,
    },

    /// Zone state (sent at regular intervals and after every zone event)
    ZoneSnapshot { zone: ZoneSnapshot },

    /// Zone phase transitions
    ZoneEvent { tick: u64, event: ZoneEvent },

    /// Session has been torn down
    SessionEnded { session_id: Uuid, reason: String },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn client_messages_are_type_tagged() {
        let id = Uuid::new_v4();
        let msg: ClientMsg =
            serde_json::from_str(&format!(r#"{{"type":"subscribe","session_id":"{}"}}"#, id))
                .unwrap();
        assert!(matches!(msg, ClientMsg::Subscribe { session_id } if session_id == id));

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"leave"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Leave));
    }

    #[test]
    fn snapshots_are_tagged_zone_snapshot() {
        let msg = ServerMsg::ZoneSnapshot {
            zone: ZoneSnapshot {
                tick: 4,
                center_x: 0.0,
                center_y: 0.0,
                radius: 60.0,
                active_phase_index: 0,
                phase_remaining_secs: 59.8,
                completed: false,
            },
        };
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "zone_snapshot");
        assert_eq!(json["zone"]["tick"], 4);
    }

    #[test]
    fn zone_event_nests_its_own_tag() {
        let msg = ServerMsg::ZoneEvent {
            tick: 9,
            event: ZoneEvent::PhaseCompleted {
                index: 1,
                center: Vec2::new(1.0, 2.0),
                radius: 25.0,
            },
        };
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "zone_event");
        assert_eq!(json["event"]["event_type"], "phase_completed");
        assert_eq!(json["event"]["center"], serde_json::json!([1.0, 2.0]));
    }
}
