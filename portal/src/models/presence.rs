use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row of `user_presence`, keyed by the user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presence {
    pub id: Uuid,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
}

impl Presence {
    pub fn online(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: user_id,
            is_online: true,
            last_seen: now,
        }
    }
}
