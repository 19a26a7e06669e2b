use std::collections::HashSet;

use crate::constants::MAX_CACHED_EVENTS;
use crate::models::ChatEvent;

/// What `WorkingSet::insert` did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// An event with the same id is already present
    Duplicate,
    /// The set is full and the event is older than everything it holds
    TooOld,
}

/// Deduplicated, time-ordered events for the active channel.
///
/// Ordered ascending by `created_at`, ties broken by `id`. Holds at most
/// `MAX_CACHED_EVENTS`; the oldest entries are dropped first.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    events: Vec<ChatEvent>,
    ids: HashSet<String>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an arbitrary sequence; later duplicates are dropped.
    pub fn from_events(events: impl IntoIterator<Item = ChatEvent>) -> Self {
        let mut set = Self::new();
        for event in events {
            if set.ids.insert(event.id.clone()) {
                set.events.push(event);
            }
        }
        set.events.sort_by(ChatEvent::display_order);
        set.enforce_bound();
        set
    }

    /// Insert `event` in sorted position. The set is left untouched unless
    /// the outcome is `Inserted`.
    pub fn insert(&mut self, event: ChatEvent) -> InsertOutcome {
        if self.ids.contains(&event.id) {
            return InsertOutcome::Duplicate;
        }
        let pos = self
            .events
            .partition_point(|existing| existing.display_order(&event).is_lt());
        if pos == 0 && self.events.len() >= MAX_CACHED_EVENTS {
            return InsertOutcome::TooOld;
        }
        self.ids.insert(event.id.clone());
        self.events.insert(pos, event);
        self.enforce_bound();
        InsertOutcome::Inserted
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn events(&self) -> &[ChatEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.ids.clear();
    }

    fn enforce_bound(&mut self) {
        if self.events.len() > MAX_CACHED_EVENTS {
            let excess = self.events.len() - MAX_CACHED_EVENTS;
            for dropped in self.events.drain(..excess) {
                self.ids.remove(&dropped.id);
            }
        }
    }
}
