//! Per-channel durable snapshot of the working set.
//!
//! Each channel owns one storage slot (`Channel::cache_key`). Snapshots are a
//! JSON array of `ChatEvent`, truncated to the newest `MAX_CACHED_EVENTS`.
//!
//! # Trust on load
//! A snapshot is never taken at face value: every cached event is re-checked
//! against the channel's group and topic tags, so a slot written by an older
//! schema or shared with another writer cannot leak foreign events.
//!
//! # Failure policy
//! Loading never fails (missing or corrupt data is a cache miss) and saving is
//! best effort (errors such as an exceeded quota are logged and dropped).

use std::sync::Arc;

use crate::channel::Channel;
use crate::constants::MAX_CACHED_EVENTS;
use crate::models::ChatEvent;
use crate::store::storage::{LocalStorage, StorageError};

#[derive(Debug, thiserror::Error)]
enum CacheError {
    #[error("cache entry is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Clone)]
pub struct ChannelCache {
    storage: Arc<dyn LocalStorage>,
}

impl ChannelCache {
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        Self { storage }
    }

    /// Cached events for `channel`, filtered and ordered. Empty on any failure.
    pub fn load(&self, channel: &Channel) -> Vec<ChatEvent> {
        let Some(raw) = self.storage.get(&channel.cache_key()) else {
            return Vec::new();
        };

        match serde_json::from_str::<Vec<ChatEvent>>(&raw).map_err(CacheError::from) {
            Ok(events) => {
                let total = events.len();
                let kept = retain_newest(
                    events
                        .into_iter()
                        .filter(|event| event.belongs_to(channel))
                        .collect(),
                );
                if kept.len() != total {
                    tracing::debug!(
                        "channel_cache: dropped {} foreign or excess events for {}",
                        total - kept.len(),
                        channel
                    );
                }
                kept
            }
            Err(e) => {
                tracing::debug!("channel_cache: treating {} as a miss: {}", channel, e);
                Vec::new()
            }
        }
    }

    /// Persist the newest `MAX_CACHED_EVENTS` of `events` for `channel`.
    pub fn save(&self, channel: &Channel, events: &[ChatEvent]) {
        if let Err(e) = self.try_save(channel, events) {
            tracing::warn!("channel_cache: failed to save {}: {}", channel, e);
        }
    }

    /// Drop the slot for `channel`.
    pub fn clear(&self, channel: &Channel) {
        if let Err(e) = self.storage.remove(&channel.cache_key()) {
            tracing::warn!("channel_cache: failed to clear {}: {}", channel, e);
        }
    }

    fn try_save(&self, channel: &Channel, events: &[ChatEvent]) -> Result<(), CacheError> {
        let snapshot = retain_newest(events.to_vec());
        let json = serde_json::to_string(&snapshot)?;
        self.storage.set(&channel.cache_key(), &json)?;
        Ok(())
    }
}

fn retain_newest(mut events: Vec<ChatEvent>) -> Vec<ChatEvent> {
    events.sort_by(ChatEvent::display_order);
    if events.len() > MAX_CACHED_EVENTS {
        events.drain(..events.len() - MAX_CACHED_EVENTS);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tag_utils::tag;
    use crate::store::storage::{FileStorage, MemoryStorage};
    use tempfile::tempdir;

    fn ev(id: &str, created_at: u64, group: &str) -> ChatEvent {
        ChatEvent {
            id: id.to_string(),
            content: format!("msg {id}"),
            pubkey: "pk".to_string(),
            created_at,
            kind: 20000,
            tags: vec![tag("g", group), tag("t", "teleport")],
            sig: None,
        }
    }

    fn memory_cache() -> (Arc<MemoryStorage>, ChannelCache) {
        let storage = Arc::new(MemoryStorage::new());
        (storage.clone(), ChannelCache::new(storage))
    }

    #[test]
    fn test_load_missing_is_empty() {
        let (_, cache) = memory_cache();
        assert!(cache.load(&Channel::parse("abc").unwrap()).is_empty());
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let (_, cache) = memory_cache();
        let abc = Channel::parse("abc").unwrap();
        let events = vec![ev("b", 200, "abc"), ev("a", 100, "abc")];

        cache.save(&abc, &events);

        let loaded = cache.load(&abc);
        assert_eq!(loaded, vec![ev("a", 100, "abc"), ev("b", 200, "abc")]);
    }

    #[test]
    fn test_roundtrip_truncates_and_filters() {
        let (_, cache) = memory_cache();
        let abc = Channel::parse("abc").unwrap();
        let mut events: Vec<ChatEvent> = (0..(MAX_CACHED_EVENTS as u64 + 20))
            .map(|i| ev(&format!("e{i:04}"), i, "abc"))
            .collect();
        events.push(ev("foreign", 10_000, "xyz"));

        cache.save(&abc, &events);
        let loaded = cache.load(&abc);

        let mut expected: Vec<ChatEvent> = events
            .iter()
            .filter(|e| e.belongs_to(&abc))
            .cloned()
            .collect();
        expected.sort_by(ChatEvent::display_order);
        // The foreign event is newest, so it occupies one of the saved slots
        // and is then filtered out on load.
        let expected: Vec<ChatEvent> = expected[expected.len() - (MAX_CACHED_EVENTS - 1)..].to_vec();
        assert_eq!(loaded, expected);
        assert!(loaded.iter().all(|e| e.group() == Some("abc")));
    }

    #[test]
    fn test_channels_do_not_share_slots() {
        let (_, cache) = memory_cache();
        let abc = Channel::parse("abc").unwrap();
        let xyz = Channel::parse("xyz").unwrap();
        cache.save(&abc, &[ev("a", 1, "abc")]);

        assert!(cache.load(&xyz).is_empty());
        assert_eq!(cache.load(&abc).len(), 1);
    }

    #[test]
    fn test_foreign_entries_in_slot_are_filtered() {
        let (storage, cache) = memory_cache();
        let abc = Channel::parse("abc").unwrap();
        let stale = vec![ev("mine", 1, "abc"), ev("theirs", 2, "xyz")];
        storage
            .set(&abc.cache_key(), &serde_json::to_string(&stale).unwrap())
            .unwrap();

        let loaded = cache.load(&abc);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "mine");
    }

    #[test]
    fn test_corrupt_slot_is_a_miss() {
        let (storage, cache) = memory_cache();
        let abc = Channel::parse("abc").unwrap();
        storage.set(&abc.cache_key(), "{not json").unwrap();
        assert!(cache.load(&abc).is_empty());

        storage.set(&abc.cache_key(), r#"{"id":"e1"}"#).unwrap();
        assert!(cache.load(&abc).is_empty());
    }

    #[test]
    fn test_save_failure_is_swallowed() {
        let storage = Arc::new(MemoryStorage::with_quota(16));
        let cache = ChannelCache::new(storage.clone());
        let abc = Channel::parse("abc").unwrap();

        cache.save(&abc, &[ev("a", 1, "abc")]);

        assert_eq!(storage.get(&abc.cache_key()), None);
        assert!(cache.load(&abc).is_empty());
    }

    #[test]
    fn test_clear_removes_slot() {
        let (_, cache) = memory_cache();
        let abc = Channel::parse("abc").unwrap();
        cache.save(&abc, &[ev("a", 1, "abc")]);
        cache.clear(&abc);
        assert!(cache.load(&abc).is_empty());
    }

    #[test]
    fn test_file_backed_cache_persists_across_instances() {
        let dir = tempdir().unwrap();
        let abc = Channel::parse("abc").unwrap();
        {
            let cache = ChannelCache::new(Arc::new(FileStorage::new(dir.path()).unwrap()));
            cache.save(&abc, &[ev("a", 1, "abc")]);
        }
        let cache = ChannelCache::new(Arc::new(FileStorage::new(dir.path()).unwrap()));
        assert_eq!(cache.load(&abc), vec![ev("a", 1, "abc")]);
    }
}
