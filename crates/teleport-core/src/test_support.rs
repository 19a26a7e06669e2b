//! In-memory transport and fixtures for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use nostr_sdk::Event;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

use crate::constants::{kinds, tags, TOPIC_MARKER};
use crate::error::{CoreError, RelayFailure};
use crate::events::SyncUpdate;
use crate::models::tag_utils::tag;
use crate::models::ChatEvent;
use crate::nostr::transport::{PublishAttempt, RelaySubscription, RelayTransport, SubscriptionMessage};
use crate::sync::ChannelFilter;

/// How a scripted relay answers a publish.
#[derive(Debug, Clone)]
pub enum RelayScript {
    Accept,
    AcceptAfter(Duration),
    Reject(String),
    /// Never answers
    Hang,
}

#[derive(Debug, Clone)]
pub struct RecordedSubscription {
    pub id: String,
    pub relays: Vec<String>,
    pub filter: ChannelFilter,
}

#[derive(Default)]
pub struct MockTransport {
    subscriptions: Mutex<Vec<RecordedSubscription>>,
    sender: Mutex<Option<mpsc::UnboundedSender<SubscriptionMessage>>>,
    unsubscribed: Mutex<Vec<String>>,
    published: Mutex<Vec<Event>>,
    scripts: Mutex<HashMap<String, RelayScript>>,
    fail_subscriptions: AtomicBool,
    next_id: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unscripted relays accept immediately.
    pub fn script(&self, relay: &str, script: RelayScript) {
        self.scripts.lock().insert(relay.to_string(), script);
    }

    pub fn fail_subscriptions(&self, fail: bool) {
        self.fail_subscriptions.store(fail, Ordering::SeqCst);
    }

    /// Push a message into the most recent subscription.
    pub fn deliver(&self, message: SubscriptionMessage) {
        if let Some(sender) = self.sender.lock().as_ref() {
            let _ = sender.send(message);
        }
    }

    pub fn last_subscription(&self) -> Option<RecordedSubscription> {
        self.subscriptions.lock().last().cloned()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    pub fn unsubscribed(&self) -> Vec<String> {
        self.unsubscribed.lock().clone()
    }

    pub fn published(&self) -> Vec<Event> {
        self.published.lock().clone()
    }
}

impl RelayTransport for MockTransport {
    fn subscribe<'a>(
        &'a self,
        relays: &'a [String],
        filter: &'a ChannelFilter,
    ) -> BoxFuture<'a, Result<RelaySubscription, CoreError>> {
        async move {
            if self.fail_subscriptions.load(Ordering::SeqCst) {
                return Err(CoreError::Transport("subscribe refused".to_string()));
            }
            let id = format!("sub-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            let (tx, rx) = mpsc::unbounded_channel();
            *self.sender.lock() = Some(tx);
            self.subscriptions.lock().push(RecordedSubscription {
                id: id.clone(),
                relays: relays.to_vec(),
                filter: filter.clone(),
            });
            Ok(RelaySubscription { id, messages: rx })
        }
        .boxed()
    }

    fn unsubscribe<'a>(&'a self, subscription_id: &'a str) -> BoxFuture<'a, ()> {
        async move {
            self.unsubscribed.lock().push(subscription_id.to_string());
        }
        .boxed()
    }

    fn publish(&self, relays: &[String], event: &Event) -> Vec<PublishAttempt> {
        self.published.lock().push(event.clone());
        let scripts = self.scripts.lock();
        relays
            .iter()
            .map(|url| {
                let url = url.clone();
                let script = scripts.get(&url).cloned().unwrap_or(RelayScript::Accept);
                async move {
                    match script {
                        RelayScript::Accept => Ok(url),
                        RelayScript::AcceptAfter(delay) => {
                            tokio::time::sleep(delay).await;
                            Ok(url)
                        }
                        RelayScript::Reject(reason) => Err(RelayFailure {
                            relay_url: url,
                            reason,
                        }),
                        RelayScript::Hang => futures::future::pending().await,
                    }
                }
                .boxed()
            })
            .collect()
    }
}

/// A well-formed chat event for `group`.
pub fn chat_event(id: &str, created_at: u64, group: &str) -> ChatEvent {
    ChatEvent {
        id: id.to_string(),
        content: format!("message {id}"),
        pubkey: "pk".to_string(),
        created_at,
        kind: kinds::GROUP_CHAT,
        tags: vec![tag(tags::GROUP, group), tag(tags::TOPIC, TOPIC_MARKER)],
        sig: None,
    }
}

pub async fn recv_update(updates: &mut broadcast::Receiver<SyncUpdate>) -> SyncUpdate {
    tokio::time::timeout(Duration::from_secs(2), updates.recv())
        .await
        .expect("timed out waiting for sync update")
        .expect("update channel closed")
}
