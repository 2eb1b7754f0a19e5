use std::fmt;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use anonroom_llm::ImagePayload;

/// Sender id of the scripted AI participant.
pub const BOT_SENDER_ID: &str = "gemini-bot";
pub const BOT_DISPLAY_NAME: &str = "GeminiBot";
pub const BOT_ACCENT_COLOR: &str = "#8b5cf6";

/// Sender id used for room notices; never a real participant.
pub const SYSTEM_SENDER_ID: &str = "system";
pub const SYSTEM_DISPLAY_NAME: &str = "System";

/// Accent colors handed out to participants at login.
pub const ACCENT_PALETTE: [&str; 7] = [
    "#3b82f6", "#ef4444", "#10b981", "#f59e0b", "#8b5cf6", "#ec4899", "#06b6d4",
];

/// Stable identifier for one message. UUIDv7, so ids sort roughly by creation time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new_v7() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    Text,
    Image,
    System,
}

/// The local human user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub display_name: String,
    pub accent_color: String,
}

impl Participant {
    /// Creates a participant from a typed username, or `None` when it is blank.
    pub fn login(display_name: &str) -> Option<Self> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return None;
        }

        let accent_color = ACCENT_PALETTE
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(ACCENT_PALETTE[0]);

        Some(Self {
            id: Uuid::new_v4().to_string(),
            display_name: display_name.to_string(),
            accent_color: accent_color.to_string(),
        })
    }
}

/// One chat record, serialized with the field names used by history exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub sender_id: String,
    pub display_name: String,
    /// Text, or a `data:` URL for images.
    pub content: String,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
    #[serde(default)]
    pub is_pending: bool,
}

impl Message {
    pub fn text_from(participant: &Participant, content: impl Into<String>) -> Self {
        Self::authored(participant, MessageKind::Text, content.into())
    }

    pub fn image_from(participant: &Participant, image: &ImagePayload) -> Self {
        Self::authored(participant, MessageKind::Image, image.to_data_url())
    }

    /// Creates the empty AI placeholder that the aggregator fills in.
    pub fn bot_placeholder() -> Self {
        Self {
            id: MessageId::new_v7(),
            sender_id: BOT_SENDER_ID.to_string(),
            display_name: BOT_DISPLAY_NAME.to_string(),
            content: String::new(),
            kind: MessageKind::Text,
            created_at: Utc::now(),
            accent_color: Some(BOT_ACCENT_COLOR.to_string()),
            is_pending: true,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new_v7(),
            sender_id: SYSTEM_SENDER_ID.to_string(),
            display_name: SYSTEM_DISPLAY_NAME.to_string(),
            content: content.into(),
            kind: MessageKind::System,
            created_at: Utc::now(),
            accent_color: None,
            is_pending: false,
        }
    }

    fn authored(participant: &Participant, kind: MessageKind, content: String) -> Self {
        Self {
            id: MessageId::new_v7(),
            sender_id: participant.id.clone(),
            display_name: participant.display_name.clone(),
            content,
            kind,
            created_at: Utc::now(),
            accent_color: Some(participant.accent_color.clone()),
            is_pending: false,
        }
    }

    pub fn is_from_bot(&self) -> bool {
        self.sender_id == BOT_SENDER_ID
    }

    pub fn is_system(&self) -> bool {
        matches!(self.kind, MessageKind::System)
    }
}

/// Partial update applied to a pending message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub is_pending: Option<bool>,
}

impl MessagePatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            is_pending: None,
        }
    }

    pub fn finalize() -> Self {
        Self {
            content: None,
            is_pending: Some(false),
        }
    }

    pub fn finalize_with(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            is_pending: Some(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_trims_and_rejects_blank_names() {
        assert!(Participant::login("   ").is_none());

        let participant = Participant::login("  GhostRider ").unwrap();
        assert_eq!(participant.display_name, "GhostRider");
        assert!(ACCENT_PALETTE.contains(&participant.accent_color.as_str()));
        assert!(Uuid::parse_str(&participant.id).is_ok());
    }

    #[test]
    fn message_ids_are_unique_and_time_ordered() {
        let ids = (0..64).map(|_| MessageId::new_v7()).collect::<Vec<_>>();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
        assert!(ids.first() < ids.last());
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let participant = Participant::login("ghost").unwrap();
        let message = Message::text_from(&participant, "hi");
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["senderId"], participant.id.as_str());
        assert_eq!(value["displayName"], "ghost");
        assert_eq!(value["kind"], "TEXT");
        assert_eq!(value["isPending"], false);
        assert!(value.get("createdAt").is_some());
        assert!(value.get("accentColor").is_some());
    }

    #[test]
    fn system_messages_have_no_participant_attribution() {
        let message = Message::system("welcome");
        assert!(message.is_system());
        assert!(!message.is_pending);
        assert_eq!(message.sender_id, SYSTEM_SENDER_ID);
        assert!(message.accent_color.is_none());
        assert!(serde_json::to_value(&message).unwrap().get("accentColor").is_none());
    }

    #[test]
    fn placeholder_is_pending_and_empty() {
        let placeholder = Message::bot_placeholder();
        assert!(placeholder.is_pending);
        assert!(placeholder.content.is_empty());
        assert!(placeholder.is_from_bot());
    }
}
