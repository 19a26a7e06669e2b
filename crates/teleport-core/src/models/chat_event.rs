use std::cmp::Ordering;

use nostr_sdk::Event;
use serde::{Deserialize, Serialize};

use super::tag_utils::{extract_tag_str, has_tag_value};
use crate::channel::Channel;
use crate::constants::{tags, TOPIC_MARKER};

/// A group chat event as held in the working set and the channel cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub id: String,
    pub content: String,
    /// Hex public key of the signer
    pub pubkey: String,
    /// Signer-supplied timestamp, used only as sort key
    pub created_at: u64,
    #[serde(default)]
    pub kind: u16,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
}

impl ChatEvent {
    pub fn from_event(event: &Event) -> Self {
        Self {
            id: event.id.to_hex(),
            content: event.content.clone(),
            pubkey: event.pubkey.to_hex(),
            created_at: event.created_at.as_u64(),
            kind: event.kind.as_u16(),
            tags: event.tags.iter().map(|t| t.as_slice().to_vec()).collect(),
            sig: Some(event.sig.to_string()),
        }
    }

    /// Value of the `g` tag
    pub fn group(&self) -> Option<&str> {
        extract_tag_str(&self.tags, tags::GROUP)
    }

    /// Display name from the `n` tag, if the author set one
    pub fn nickname(&self) -> Option<&str> {
        extract_tag_str(&self.tags, tags::NICKNAME).filter(|n| !n.is_empty())
    }

    /// Whether the event carries this channel's group tag and the teleport topic tag.
    pub fn belongs_to(&self, channel: &Channel) -> bool {
        self.group() == Some(channel.as_str()) && has_tag_value(&self.tags, tags::TOPIC, TOPIC_MARKER)
    }

    /// Working-set order: ascending `created_at`, ties broken by `id`.
    pub fn display_order(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.id.cmp(&other.id))
    }
}
