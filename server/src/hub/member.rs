use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::events::{MemberId, PresenceEvent};

/// Maximum queued outbound events per member (prevents memory exhaustion from slow clients).
pub const MAX_OUTBOUND_QUEUE: usize = 256;

/// Lifecycle of a member within a room. A member is only counted while
/// Active; the subscription handshake gates Joining -> Active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberState {
    Joining,
    Active,
    Left,
}

/// Per-room presence metadata for one member.
#[derive(Debug, Clone)]
pub struct MemberPresence {
    pub state: MemberState,
    pub joined_at: DateTime<Utc>,
    pub online_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl MemberPresence {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            state: MemberState::Joining,
            joined_at: now,
            online_at: now,
            last_seen_at: now,
        }
    }

    /// Joining -> Active, recording the timestamps the client announced.
    pub fn activate(
        &mut self,
        joined_at: DateTime<Utc>,
        online_at: DateTime<Utc>,
    ) -> Result<(), String> {
        match self.state {
            MemberState::Joining => {
                self.state = MemberState::Active;
                self.joined_at = joined_at;
                self.online_at = online_at;
                self.last_seen_at = Utc::now();
                Ok(())
            }
            MemberState::Active => Err("Already tracked".into()),
            MemberState::Left => Err("Member has left".into()),
        }
    }

    /// Any state -> Left. Idempotent.
    pub fn depart(&mut self) {
        self.state = MemberState::Left;
        self.last_seen_at = Utc::now();
    }

    /// Refresh liveness (heartbeat / pong).
    pub fn touch(&mut self) {
        self.last_seen_at = Utc::now();
    }

    pub fn is_active(&self) -> bool {
        self.state == MemberState::Active
    }
}

impl Default for MemberPresence {
    fn default() -> Self {
        Self::new()
    }
}

/// A connected member session: the hub's handle for delivering events
/// to one WebSocket connection.
#[derive(Debug)]
pub struct MemberSession {
    pub id: MemberId,
    pub room_id: String,
    /// Send outbound events to this member's write loop (bounded to prevent memory exhaustion).
    pub outbound: mpsc::Sender<PresenceEvent>,
    pub connected_at: DateTime<Utc>,
}

impl MemberSession {
    pub fn new(id: MemberId, room_id: String, outbound: mpsc::Sender<PresenceEvent>) -> Self {
        Self {
            id,
            room_id,
            outbound,
            connected_at: Utc::now(),
        }
    }

    /// Send an event to this member. Returns false if the channel is closed
    /// or the outbound queue is full (slow client protection, drops the event rather than blocking).
    pub fn send(&self, event: PresenceEvent) -> bool {
        self.outbound.try_send(event).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_member_is_joining_and_uncounted() {
        let p = MemberPresence::new();
        assert_eq!(p.state, MemberState::Joining);
        assert!(!p.is_active());
    }

    #[test]
    fn test_activate_from_joining() {
        let mut p = MemberPresence::new();
        let now = Utc::now();
        p.activate(now, now).unwrap();
        assert!(p.is_active());
        assert_eq!(p.joined_at, now);
    }

    #[test]
    fn test_activate_twice_is_rejected() {
        let mut p = MemberPresence::new();
        let now = Utc::now();
        p.activate(now, now).unwrap();
        assert!(p.activate(now, now).is_err());
    }

    #[test]
    fn test_activate_after_depart_is_rejected() {
        let mut p = MemberPresence::new();
        p.depart();
        let now = Utc::now();
        assert!(p.activate(now, now).is_err());
        assert_eq!(p.state, MemberState::Left);
    }

    #[test]
    fn test_depart_is_idempotent() {
        let mut p = MemberPresence::new();
        let now = Utc::now();
        p.activate(now, now).unwrap();
        p.depart();
        p.depart();
        assert_eq!(p.state, MemberState::Left);
        assert!(!p.is_active());
    }
}
