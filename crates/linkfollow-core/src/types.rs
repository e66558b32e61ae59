use serde::{Deserialize, Serialize};

use crate::ids::{ActorId, EventId, ItemId};

/// Two-value cursor over externally observed event ids. `previous` is
/// the lower bound for the next discovery query; `current` is the
/// highest event id seen so far. Invariant: `previous <= current`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checkpoint {
    pub current: EventId,
    pub previous: EventId,
}

impl Checkpoint {
    pub fn initial() -> Self {
        Self { current: 0, previous: 0 }
    }

    /// Shift the window forward: the old `current` becomes the new
    /// lower bound, and `current` max-merges the newly observed id.
    pub fn advanced(self, new_current: EventId) -> Self {
        Self {
            previous: self.current,
            current: self.current.max(new_current),
        }
    }
}

/// Everything the delivery collaborator needs to issue one follow call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FollowRequest {
    pub actor_id: ActorId,
    pub actor_name: String,
    pub source_url: String,
}

/// One unit of pending outbound work. The on-disk record is the single
/// source of truth; nothing in memory survives a restart.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueItem {
    pub id: ItemId,
    pub key: String,
    pub payload: FollowRequest,
    pub attempt_errors: u32,
    pub enqueued_at_unix: i64,
}

/// One discovery result row: an actor that referenced a tracked link.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mention {
    pub actor_id: ActorId,
    pub actor_name: String,
    pub event_id: EventId,
}
