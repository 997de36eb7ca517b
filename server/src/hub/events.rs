use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a connected member (one per connection, not per user).
pub type MemberId = Uuid;

/// Prefix for presence channel names; one channel per debate room.
pub const CHANNEL_PREFIX: &str = "debate:";

/// Channel name for a room, e.g. "debate:r1".
pub fn room_channel(room_id: &str) -> String {
    format!("{CHANNEL_PREFIX}{room_id}")
}

/// Extract the room id from a channel name. None if the prefix is wrong
/// or the room id is empty.
pub fn parse_channel(channel: &str) -> Option<&str> {
    channel
        .strip_prefix(CHANNEL_PREFIX)
        .filter(|room| !room.is_empty())
}

/// Commands a client sends over its presence WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Open the presence channel for a room.
    Join { channel: String },

    /// Announce own presence. Valid only after the `subscribed` ack;
    /// a client never inflates the count for itself before it is counted.
    Track {
        joined_at: DateTime<Utc>,
        online_at: DateTime<Utc>,
    },

    /// Explicitly leave the room (navigating away, unmounting).
    Leave,
}

/// Events the hub delivers to a member's connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresenceEvent {
    /// Channel subscription handshake completed; the member may now track.
    Subscribed { channel: String },

    /// Full membership snapshot, sent to every member of the room on any
    /// change. The displayed listener count is `members.len()`.
    Sync {
        channel: String,
        members: Vec<MemberSnapshot>,
    },

    /// Error from the hub.
    Error { code: String, message: String },
}

/// One tracked member in a sync snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSnapshot {
    pub member_id: MemberId,
    pub joined_at: DateTime<Utc>,
    pub online_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_channel_format() {
        assert_eq!(room_channel("r1"), "debate:r1");
    }

    #[test]
    fn test_parse_channel() {
        assert_eq!(parse_channel("debate:r1"), Some("r1"));
        assert_eq!(parse_channel("debate:"), None);
        assert_eq!(parse_channel("chat:r1"), None);
        assert_eq!(parse_channel("r1"), None);
    }

    #[test]
    fn test_command_json_tags_are_snake_case() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type":"join","channel":"debate:r1"}"#).unwrap();
        match cmd {
            ClientCommand::Join { channel } => assert_eq!(channel, "debate:r1"),
            _ => panic!("Expected Join command"),
        }

        let cmd: ClientCommand = serde_json::from_str(r#"{"type":"leave"}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::Leave));
    }

    #[test]
    fn test_sync_event_serialization() {
        let event = PresenceEvent::Sync {
            channel: "debate:r1".into(),
            members: vec![MemberSnapshot {
                member_id: Uuid::new_v4(),
                joined_at: Utc::now(),
                online_at: Utc::now(),
            }],
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"sync""#));
        assert!(json.contains(r#""channel":"debate:r1""#));
    }
}
