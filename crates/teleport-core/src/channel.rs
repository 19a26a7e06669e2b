//! Channel names and their derived keys.
//!
//! A channel is identified by a normalized name: surrounding whitespace and a
//! single leading `#` marker are removed and the rest is lower-cased. The same
//! normalized name is used as the `g` tag value, inside the subscription
//! filter and to derive the channel's cache key.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::CACHE_KEY_PREFIX;
use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Channel(String);

impl Channel {
    /// Normalize `raw` into a channel name.
    /// Returns `None` when nothing is left after normalization.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let stripped = trimmed.strip_prefix('#').unwrap_or(trimmed).trim();
        if stripped.is_empty() {
            return None;
        }
        Some(Self(stripped.to_lowercase()))
    }

    /// Parse an external location cue such as a URL fragment (`#abc`).
    pub fn from_location_cue(cue: &str) -> Option<Self> {
        Self::parse(cue)
    }

    /// Render the location cue for this channel (`#abc`).
    pub fn location_cue(&self) -> String {
        format!("#{}", self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storage key of this channel's cache slot
    pub fn cache_key(&self) -> String {
        format!("{}{}", CACHE_KEY_PREFIX, self.0)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Channel {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(CoreError::InvalidChannel(value))
    }
}

impl std::str::FromStr for Channel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| CoreError::InvalidChannel(s.to_string()))
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        channel.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_marker_and_case() {
        assert_eq!(Channel::parse("#ABC").unwrap().as_str(), "abc");
        assert_eq!(Channel::parse("  #Foo ").unwrap().as_str(), "foo");
        assert_eq!(Channel::parse("bar").unwrap().as_str(), "bar");
    }

    #[test]
    fn test_only_one_marker_is_stripped() {
        assert_eq!(Channel::parse("##x").unwrap().as_str(), "#x");
    }

    #[test]
    fn test_empty_is_not_a_channel() {
        assert!(Channel::parse("").is_none());
        assert!(Channel::parse("#").is_none());
        assert!(Channel::parse("   ").is_none());
        assert!("#".parse::<Channel>().is_err());
    }

    #[test]
    fn test_location_cue_round_trip() {
        let channel = Channel::from_location_cue("#Lobby").unwrap();
        assert_eq!(channel.location_cue(), "#lobby");
        assert_eq!(
            Channel::from_location_cue(&channel.location_cue()),
            Some(channel)
        );
    }

    #[test]
    fn test_cache_key_is_per_channel() {
        let a = Channel::parse("abc").unwrap();
        let b = Channel::parse("#ABC").unwrap();
        let c = Channel::parse("abd").unwrap();
        assert_eq!(a.cache_key(), "teleport_cache_abc");
        assert_eq!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), c.cache_key());
    }

    #[test]
    fn test_serde_normalizes() {
        let channel: Channel = serde_json::from_str("\"#Rust\"").unwrap();
        assert_eq!(channel.as_str(), "rust");
        assert!(serde_json::from_str::<Channel>("\"#\"").is_err());
    }
}
