//! Multi-relay subscription and working-set owner for the active channel.
//!
//! Phases: `Idle` → `Hydrating` (cache loaded, working set seeded) →
//! `Subscribed` (transport subscription open, pump task admitting events) →
//! `Closed`. Reconfiguring the channel or the relay set tears down the
//! current subscription and re-enters `Hydrating`.
//!
//! Every candidate event, from the network or from a local publish, is
//! inserted under the engine lock, so duplicate suppression and ordering
//! hold even when admissions race. Cache writes happen outside that lock;
//! the pump writes once per batch of queued relay messages.

use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::channel::Channel;
use crate::error::CoreError;
use crate::events::SyncUpdate;
use crate::models::ChatEvent;
use crate::nostr::transport::{RelayTransport, SubscriptionMessage};
use crate::store::{ChannelCache, InsertOutcome, WorkingSet};
use crate::sync::ChannelFilter;

const UPDATE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Hydrating,
    Subscribed,
    Closed,
}

/// Result of offering one event to the working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Inserted,
    /// An event with the same id is already present
    Duplicate,
    /// Group or topic tag does not match the active channel
    WrongChannel,
    NoChannel,
    /// The working set is full and the event predates all of it
    TooOld,
}

struct EngineState {
    phase: SyncPhase,
    channel: Option<Channel>,
    relays: Vec<String>,
    working_set: WorkingSet,
    subscription_id: Option<String>,
    pump: Option<JoinHandle<()>>,
    caught_up: bool,
}

struct EngineInner {
    transport: Arc<dyn RelayTransport>,
    cache: ChannelCache,
    state: Mutex<EngineState>,
    updates: broadcast::Sender<SyncUpdate>,
    /// Orders snapshot-then-write cache saves without holding `state`
    persist: Mutex<()>,
    /// Serializes open/close so teardown and re-subscribe never interleave
    lifecycle: tokio::sync::Mutex<()>,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        if let Some(pump) = self.state.get_mut().pump.take() {
            pump.abort();
        }
    }
}

#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    pub fn new(transport: Arc<dyn RelayTransport>, cache: ChannelCache) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(EngineInner {
                transport,
                cache,
                state: Mutex::new(EngineState {
                    phase: SyncPhase::Idle,
                    channel: None,
                    relays: Vec::new(),
                    working_set: WorkingSet::new(),
                    subscription_id: None,
                    pump: None,
                    caught_up: false,
                }),
                updates,
                persist: Mutex::new(()),
                lifecycle: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Initial relay set, used by the first `open`.
    pub fn with_relays(self, relays: Vec<String>) -> Self {
        self.inner.state.lock().relays = relays;
        self
    }

    pub fn updates(&self) -> broadcast::Receiver<SyncUpdate> {
        self.inner.updates.subscribe()
    }

    pub fn phase(&self) -> SyncPhase {
        self.inner.state.lock().phase
    }

    pub fn channel(&self) -> Option<Channel> {
        self.inner.state.lock().channel.clone()
    }

    pub fn relays(&self) -> Vec<String> {
        self.inner.state.lock().relays.clone()
    }

    /// Snapshot of the working set in display order.
    pub fn messages(&self) -> Vec<ChatEvent> {
        self.inner.state.lock().working_set.events().to_vec()
    }

    /// Switch to `channel` on `relays`.
    ///
    /// A no-op when already subscribed to the same channel and relay set.
    /// On transport failure the engine keeps the hydrated cache in
    /// `Hydrating` and returns the error.
    pub async fn open(&self, channel: Channel, relays: Vec<String>) -> Result<(), CoreError> {
        let _lifecycle = self.inner.lifecycle.lock().await;

        {
            let state = self.inner.state.lock();
            if state.phase == SyncPhase::Subscribed
                && state.channel.as_ref() == Some(&channel)
                && state.relays == relays
            {
                tracing::debug!("sync: {} already subscribed, nothing to do", channel);
                return Ok(());
            }
        }

        self.teardown_subscription().await;

        let cached = self.inner.cache.load(&channel);
        {
            let mut state = self.inner.state.lock();
            state.channel = Some(channel.clone());
            state.relays = relays.clone();
            state.working_set = WorkingSet::from_events(cached);
            state.phase = SyncPhase::Hydrating;
            state.caught_up = false;
            tracing::info!(
                "sync: hydrated {} with {} cached event(s)",
                channel,
                state.working_set.len()
            );
            let _ = self.inner.updates.send(SyncUpdate::Reset {
                channel: channel.clone(),
                events: state.working_set.events().to_vec(),
            });
        }

        let filter = ChannelFilter::for_channel(&channel, unix_now());
        let subscription = match self.inner.transport.subscribe(&relays, &filter).await {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::warn!("sync: subscribe for {} failed: {}", channel, e);
                return Err(e);
            }
        };

        let pump = tokio::spawn(run_pump(
            Arc::downgrade(&self.inner),
            subscription.messages,
        ));
        let mut state = self.inner.state.lock();
        state.subscription_id = Some(subscription.id);
        state.pump = Some(pump);
        state.phase = SyncPhase::Subscribed;
        tracing::info!("sync: subscribed to {} on {} relay(s)", channel, relays.len());
        Ok(())
    }

    /// Replace the relay set. Re-subscribes when a channel is active.
    pub async fn set_relays(&self, relays: Vec<String>) -> Result<(), CoreError> {
        match self.channel() {
            Some(channel) => self.open(channel, relays).await,
            None => {
                self.inner.state.lock().relays = relays;
                Ok(())
            }
        }
    }

    /// Close the subscription and drop the working set. Idempotent.
    pub async fn close(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.teardown_subscription().await;

        let mut state = self.inner.state.lock();
        if state.phase == SyncPhase::Closed {
            return;
        }
        state.phase = SyncPhase::Closed;
        state.channel = None;
        state.working_set.clear();
        state.caught_up = false;
        let _ = self.inner.updates.send(SyncUpdate::Closed);
        tracing::info!("sync: closed");
    }

    /// Offer `event` to the working set of the active channel.
    ///
    /// The event must carry the active channel's group and topic tags (a
    /// stale callback from a previous channel is dropped here) and must not
    /// share an id with an admitted event. Inserted events are persisted to
    /// the channel cache and announced as `SyncUpdate::Appended`.
    pub fn admit(&self, event: ChatEvent) -> Admission {
        match self.stage(event) {
            Ok(update) => {
                self.flush(vec![update]);
                Admission::Inserted
            }
            Err(admission) => admission,
        }
    }

    /// Insert into the working set without touching the cache. On success
    /// returns the `Appended` update to announce once the cache is written.
    fn stage(&self, event: ChatEvent) -> Result<SyncUpdate, Admission> {
        let mut state = self.inner.state.lock();
        let Some(channel) = state.channel.clone() else {
            return Err(Admission::NoChannel);
        };
        if !event.belongs_to(&channel) {
            tracing::debug!("sync: dropping {} not addressed to {}", event.id, channel);
            return Err(Admission::WrongChannel);
        }
        match state.working_set.insert(event.clone()) {
            InsertOutcome::Inserted => {}
            InsertOutcome::Duplicate => return Err(Admission::Duplicate),
            InsertOutcome::TooOld => {
                tracing::debug!("sync: {} is older than the retained window", event.id);
                return Err(Admission::TooOld);
            }
        }
        tracing::debug!("sync: admitted {} into {}", event.id, channel);
        Ok(SyncUpdate::Appended { channel, event })
    }

    /// Persist once, then announce the staged updates.
    fn flush(&self, staged: Vec<SyncUpdate>) {
        if staged.is_empty() {
            return;
        }
        self.persist();
        for update in staged {
            let _ = self.inner.updates.send(update);
        }
    }

    /// Write the current working set to the channel cache. The snapshot is
    /// taken under the state lock; the write happens after releasing it.
    fn persist(&self) {
        let _persist = self.inner.persist.lock();
        let snapshot = {
            let state = self.inner.state.lock();
            state
                .channel
                .clone()
                .map(|channel| (channel, state.working_set.events().to_vec()))
        };
        if let Some((channel, events)) = snapshot {
            self.inner.cache.save(&channel, &events);
        }
    }

    fn mark_caught_up(&self) {
        let mut state = self.inner.state.lock();
        if state.caught_up {
            return;
        }
        if let Some(channel) = state.channel.clone() {
            state.caught_up = true;
            tracing::info!("sync: caught up on {}", channel);
            let _ = self.inner.updates.send(SyncUpdate::CaughtUp { channel });
        }
    }

    async fn teardown_subscription(&self) {
        let (subscription_id, pump) = {
            let mut state = self.inner.state.lock();
            (state.subscription_id.take(), state.pump.take())
        };
        if let Some(pump) = pump {
            pump.abort();
        }
        if let Some(id) = subscription_id {
            self.inner.transport.unsubscribe(&id).await;
        }
    }
}

async fn run_pump(
    engine: Weak<EngineInner>,
    mut messages: mpsc::UnboundedReceiver<SubscriptionMessage>,
) {
    while let Some(first) = messages.recv().await {
        let Some(inner) = engine.upgrade() else {
            break;
        };
        let engine = SyncEngine { inner };

        // Admit everything already queued, then write the cache once
        let mut staged = Vec::new();
        let mut next = Some(first);
        while let Some(message) = next {
            match message {
                SubscriptionMessage::Event(event) => {
                    if let Ok(update) = engine.stage(event) {
                        staged.push(update);
                    }
                }
                SubscriptionMessage::EndOfStoredEvents => {
                    engine.flush(std::mem::take(&mut staged));
                    engine.mark_caught_up();
                }
            }
            next = messages.try_recv().ok();
        }
        engine.flush(staged);
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
