use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use super::events::{MemberId, MemberSnapshot, PresenceEvent, room_channel};
use super::member::{MAX_OUTBOUND_QUEUE, MemberPresence, MemberSession};
use super::room::RoomState;

/// The central hub that synchronizes per-room membership across connected
/// clients. Transport-agnostic; the WebSocket adapter calls into this.
///
/// Membership is eventually consistent: sync events carry the full
/// snapshot, and a client's displayed count is the cardinality of the
/// last snapshot it received. No ordering is guaranteed between
/// concurrent joins and leaves from different clients.
pub struct PresenceHub {
    /// All rooms with at least one member, keyed by room id.
    rooms: DashMap<String, RoomState>,
    /// All connected members, keyed by member id.
    sessions: DashMap<MemberId, Arc<MemberSession>>,
}

impl PresenceHub {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            sessions: DashMap::new(),
        }
    }

    /// Register a new member in a room. Returns the member id and an event
    /// receiver; the first event is the `subscribed` acknowledgment. The
    /// member stays Joining (uncounted) until it tracks.
    pub fn join(&self, room_id: &str) -> (MemberId, mpsc::Receiver<PresenceEvent>) {
        let member_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(MAX_OUTBOUND_QUEUE);

        let session = Arc::new(MemberSession::new(member_id, room_id.to_string(), tx));
        self.sessions.insert(member_id, session.clone());

        self.rooms
            .entry(room_id.to_string())
            .or_insert_with(|| RoomState::new(room_id.to_string()))
            .members
            .insert(member_id, MemberPresence::new());

        // Queue the handshake ack before anything else so the client only
        // announces itself once the subscription is confirmed.
        session.send(PresenceEvent::Subscribed {
            channel: room_channel(room_id),
        });

        info!(%member_id, %room_id, "member joined room");
        (member_id, rx)
    }

    /// Announce a member's presence: Joining -> Active, then broadcast a
    /// sync snapshot to every member of the room, including the new one.
    pub fn track(
        &self,
        member_id: MemberId,
        joined_at: DateTime<Utc>,
        online_at: DateTime<Utc>,
    ) -> Result<(), String> {
        let room_id = self
            .sessions
            .get(&member_id)
            .map(|s| s.room_id.clone())
            .ok_or("Member not found")?;

        {
            let mut room = self
                .rooms
                .get_mut(&room_id)
                .ok_or(format!("No such room: {room_id}"))?;
            let presence = room
                .members
                .get_mut(&member_id)
                .ok_or("Member not in room")?;
            presence.activate(joined_at, online_at)?;
        }

        info!(%member_id, %room_id, "member tracked presence");
        self.broadcast_sync(&room_id);
        Ok(())
    }

    /// Remove a member from its room and let the remaining members converge
    /// to the smaller count on the next sync. Idempotent; transport
    /// failures and explicit leaves both land here.
    pub fn leave(&self, member_id: MemberId) {
        let Some((_, session)) = self.sessions.remove(&member_id) else {
            return;
        };
        let room_id = session.room_id.clone();

        let mut room_now_empty = false;
        if let Some(mut room) = self.rooms.get_mut(&room_id) {
            if let Some(presence) = room.members.get_mut(&member_id) {
                presence.depart();
            }
            room.members.remove(&member_id);
            room_now_empty = room.is_empty();
        }

        if room_now_empty {
            // Tear down the room state with the last member.
            self.rooms.remove_if(&room_id, |_, room| room.is_empty());
        } else {
            self.broadcast_sync(&room_id);
        }

        info!(%member_id, %room_id, "member left room");
    }

    /// Refresh a member's liveness timestamp (ping/pong).
    pub fn heartbeat(&self, member_id: MemberId) {
        let Some(session) = self.sessions.get(&member_id) else {
            return;
        };
        if let Some(mut room) = self.rooms.get_mut(&session.room_id)
            && let Some(presence) = room.members.get_mut(&member_id)
        {
            presence.touch();
        }
    }

    /// Number of counted (Active) members in a room.
    pub fn active_count(&self, room_id: &str) -> usize {
        self.rooms
            .get(room_id)
            .map(|r| r.active_count())
            .unwrap_or(0)
    }

    /// Deliver an error event to a single member.
    pub fn send_error(&self, member_id: MemberId, code: &str, message: &str) {
        if let Some(session) = self.sessions.get(&member_id) {
            session.send(PresenceEvent::Error {
                code: code.to_string(),
                message: message.to_string(),
            });
        }
    }

    /// Broadcast the current membership snapshot to every member of a room.
    fn broadcast_sync(&self, room_id: &str) {
        // Collect under the room lock, deliver after dropping it.
        let (recipients, snapshot): (Vec<MemberId>, Vec<MemberSnapshot>) =
            match self.rooms.get(room_id) {
                Some(room) => (room.members.keys().copied().collect(), room.snapshot()),
                None => return,
            };

        let event = PresenceEvent::Sync {
            channel: room_channel(room_id),
            members: snapshot,
        };

        for member_id in recipients {
            if let Some(session) = self.sessions.get(&member_id)
                && !session.send(event.clone())
            {
                warn!(%member_id, "failed to deliver sync (channel closed or full)");
            }
        }
    }
}

impl Default for PresenceHub {
    fn default() -> Self {
        Self::new()
    }
}
