use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::events::{MemberId, MemberSnapshot};
use super::member::MemberPresence;

/// In-memory state for a single room. Created on first join, dropped
/// when the last member leaves.
#[derive(Debug)]
pub struct RoomState {
    pub room_id: String,
    pub members: HashMap<MemberId, MemberPresence>,
    pub created_at: DateTime<Utc>,
}

impl RoomState {
    pub fn new(room_id: String) -> Self {
        Self {
            room_id,
            members: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Number of members currently counted (Active only).
    pub fn active_count(&self) -> usize {
        self.members.values().filter(|m| m.is_active()).count()
    }

    /// Snapshot of Active members for a sync event. The listener count a
    /// client displays is the cardinality of this set.
    pub fn snapshot(&self) -> Vec<MemberSnapshot> {
        self.members
            .iter()
            .filter(|(_, p)| p.is_active())
            .map(|(id, p)| MemberSnapshot {
                member_id: *id,
                joined_at: p.joined_at,
                online_at: p.online_at,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
