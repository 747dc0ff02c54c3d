//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::{Command, Coord, Placement, PlayerView};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Take the empty guest seat
    Join,

    /// Deploy the full roster
    SubmitPlacement { placements: Vec<Placement> },

    /// Relocate one of your units to an empty cell
    Move { source: Coord, target: Coord },

    /// Fire a unit's pattern at the enemy board
    Attack { source: Coord, target: Coord },

    /// Repair a friendly unit with an Infantry
    Heal { source: Coord, target: Coord },

    Surrender,

    /// Ask the server to settle an opponent's empty clock
    ClaimTimeout,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

impl ClientMsg {
    /// Game command carried by this message, if any
    pub fn into_command(self) -> Option<Command> {
        match self {
            ClientMsg::Join => Some(Command::Join),
            ClientMsg::SubmitPlacement { placements } => {
                Some(Command::SubmitPlacement { placements })
            }
            ClientMsg::Move { source, target } => Some(Command::Move { source, target }),
            ClientMsg::Attack { source, target } => Some(Command::Attack { source, target }),
            ClientMsg::Heal { source, target } => Some(Command::Heal { source, target }),
            ClientMsg::Surrender => Some(Command::Surrender),
            ClientMsg::ClaimTimeout => Some(Command::ClaimTimeout),
            ClientMsg::Ping { .. } => None,
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        player_id: String,
        match_id: Uuid,
        server_time: u64,
    },

    /// Current match state as this connection may see it
    View(Box<PlayerView>),

    /// A command from this connection was refused; state unchanged
    Rejected {
        command: String,
        code: String,
        message: String,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
        server_time: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::UnitKind;

    #[test]
    fn parses_tagged_commands() {
        let msg: ClientMsg = serde_json::from_str(
            r#"{"type":"attack","source":{"x":5,"y":0},"target":{"x":0,"y":7}}"#,
        )
        .unwrap();
        assert_eq!(
            msg.into_command(),
            Some(Command::Attack {
                source: Coord { x: 5, y: 0 },
                target: Coord { x: 0, y: 7 },
            })
        );

        let msg: ClientMsg = serde_json::from_str(
            r#"{"type":"submit_placement","placements":[{"x":1,"y":2,"kind":"scanner"}]}"#,
        )
        .unwrap();
        assert_eq!(
            msg.into_command(),
            Some(Command::SubmitPlacement {
                placements: vec![Placement {
                    x: 1,
                    y: 2,
                    kind: UnitKind::Scanner
                }]
            })
        );

        let ping: ClientMsg = serde_json::from_str(r#"{"type":"ping","t":42}"#).unwrap();
        assert!(ping.into_command().is_none());
    }

    #[test]
    fn server_messages_are_tagged() {
        let msg = ServerMsg::Rejected {
            command: "move".to_string(),
            code: "invalid_command".to_string(),
            message: "not your turn".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "rejected");
        assert_eq!(json["code"], "invalid_command");

        let json = serde_json::to_value(ServerMsg::Pong { t: 1, server_time: 2 }).unwrap();
        assert_eq!(json["type"], "pong");
    }
}
