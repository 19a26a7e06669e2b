//! Application-wide constants
//!
//! Centralized location for protocol markers, storage keys and retention
//! bounds shared by the sync engine, cache and publisher.

/// Default relay set used when no relays are configured
pub const DEFAULT_RELAYS: &[&str] = &[
    "wss://relay.damus.io",
    "wss://nos.lol",
    "wss://relay.primal.net",
];

/// Topic marker carried in the `t` tag of every chat event
pub const TOPIC_MARKER: &str = "teleport";

/// Maximum events kept in a working set and in a channel cache slot
pub const MAX_CACHED_EVENTS: usize = 500;

/// Subscription lookback window in seconds (24 hours)
pub const LOOKBACK_SECS: u64 = 24 * 60 * 60;

/// Storage key under which the ephemeral secret is persisted
pub const EPHEMERAL_KEY_STORAGE_KEY: &str = "teleport_ephemeral_sk";

/// Prefix for per-channel cache keys
pub const CACHE_KEY_PREFIX: &str = "teleport_cache_";

// Nostr event kinds used by teleport
pub mod kinds {
    /// Ephemeral group broadcast (geo/group chat class)
    pub const GROUP_CHAT: u16 = 20000;
}

// Tag names
pub mod tags {
    /// Group (channel) tag
    pub const GROUP: &str = "g";
    /// Topic tag
    pub const TOPIC: &str = "t";
    /// Display-name tag
    pub const NICKNAME: &str = "n";
}
