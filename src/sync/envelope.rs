use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::Activity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
}

/// One frame on a family's channel, discriminated by `type`. Frames with an
/// unrecognized tag decode to `Unknown` so older peers can skip newer ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    /// Full-replace snapshot, sent once right after a connection opens.
    Sync { data: Vec<Activity> },
    Activity {
        action: Action,
        data: Activity,
        #[serde(rename = "senderId", skip_serializing_if = "Option::is_none")]
        sender_id: Option<Uuid>,
    },
    #[serde(other)]
    Unknown,
}

impl Envelope {
    pub fn sync(data: Vec<Activity>) -> Self {
        Envelope::Sync { data }
    }

    pub fn activity(action: Action, data: Activity, sender_id: Option<Uuid>) -> Self {
        Envelope::Activity {
            action,
            data,
            sender_id,
        }
    }

    pub fn decode(frame: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(frame)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
