//! Relay transport capability.
//!
//! The sync engine and publisher only see `RelayTransport`: subscribe with a
//! filter, unsubscribe, and publish with one outcome future per relay.
//! `NostrTransport` implements it over a shared `nostr_sdk::Client`.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use nostr_sdk::prelude::*;
use tokio::sync::{broadcast, mpsc};

use crate::error::{CoreError, RelayFailure};
use crate::models::ChatEvent;
use crate::sync::ChannelFilter;

/// Message delivered on a subscription's channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionMessage {
    Event(ChatEvent),
    /// A relay finished sending stored events
    EndOfStoredEvents,
}

/// An open subscription. Dropping the receiver stops delivery; call
/// `RelayTransport::unsubscribe` to release it on the relays.
#[derive(Debug)]
pub struct RelaySubscription {
    pub id: String,
    pub messages: mpsc::UnboundedReceiver<SubscriptionMessage>,
}

/// Resolves to the accepting relay URL, or the relay's failure.
pub type PublishAttempt = BoxFuture<'static, Result<String, RelayFailure>>;

pub trait RelayTransport: Send + Sync {
    fn subscribe<'a>(
        &'a self,
        relays: &'a [String],
        filter: &'a ChannelFilter,
    ) -> BoxFuture<'a, Result<RelaySubscription, CoreError>>;

    fn unsubscribe<'a>(&'a self, subscription_id: &'a str) -> BoxFuture<'a, ()>;

    /// One attempt per relay in `relays`, in the same order.
    fn publish(&self, relays: &[String], event: &Event) -> Vec<PublishAttempt>;
}

pub struct NostrTransport {
    client: Client,
    connect_timeout: Duration,
}

impl NostrTransport {
    pub fn new() -> Self {
        Self::with_client(Client::builder().build())
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn shutdown(&self) {
        self.client.shutdown().await;
    }

    async fn ensure_relays(client: &Client, relays: &[String], connect_timeout: Duration) {
        for url in relays {
            if let Err(e) = client.add_relay(url.as_str()).await {
                tracing::warn!("transport: cannot add relay {}: {}", url, e);
            }
        }
        if tokio::time::timeout(connect_timeout, client.connect())
            .await
            .is_err()
        {
            tracing::warn!("transport: connect timed out after {:?}", connect_timeout);
        }
    }
}

impl Default for NostrTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayTransport for NostrTransport {
    fn subscribe<'a>(
        &'a self,
        relays: &'a [String],
        filter: &'a ChannelFilter,
    ) -> BoxFuture<'a, Result<RelaySubscription, CoreError>> {
        async move {
            Self::ensure_relays(&self.client, relays, self.connect_timeout).await;

            // Take the receiver before subscribing so no early event is missed
            let notifications = self.client.notifications();
            let output = self
                .client
                .subscribe_to(relays.iter().map(String::as_str), filter.to_nostr_filter(), None)
                .await
                .map_err(|e| CoreError::Transport(e.to_string()))?;

            for (url, reason) in &output.failed {
                tracing::warn!("transport: subscribe failed on {}: {}", url, reason);
            }
            let subscription_id = output.val;
            tracing::info!(
                "transport: subscription {} open on {} relay(s)",
                subscription_id,
                output.success.len()
            );

            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(forward_notifications(
                notifications,
                subscription_id.clone(),
                tx,
            ));

            Ok(RelaySubscription {
                id: subscription_id.to_string(),
                messages: rx,
            })
        }
        .boxed()
    }

    fn unsubscribe<'a>(&'a self, subscription_id: &'a str) -> BoxFuture<'a, ()> {
        async move {
            self.client
                .unsubscribe(&SubscriptionId::new(subscription_id))
                .await;
            tracing::debug!("transport: subscription {} closed", subscription_id);
        }
        .boxed()
    }

    fn publish(&self, relays: &[String], event: &Event) -> Vec<PublishAttempt> {
        let event = Arc::new(event.clone());
        relays
            .iter()
            .map(|url| {
                let client = self.client.clone();
                let event = event.clone();
                let url = url.clone();
                let connect_timeout = self.connect_timeout;
                async move {
                    Self::ensure_relays(&client, std::slice::from_ref(&url), connect_timeout)
                        .await;
                    match client.send_event_to([url.as_str()], &event).await {
                        Ok(output) if !output.success.is_empty() => Ok(url),
                        Ok(output) => {
                            let reason = output
                                .failed
                                .into_values()
                                .next()
                                .unwrap_or_else(|| "rejected".to_string());
                            Err(RelayFailure {
                                relay_url: url,
                                reason,
                            })
                        }
                        Err(e) => Err(RelayFailure {
                            relay_url: url,
                            reason: e.to_string(),
                        }),
                    }
                }
                .boxed()
            })
            .collect()
    }
}

/// Pump relay-pool notifications belonging to `subscription_id` into `tx`
/// until the receiver is dropped or the pool shuts down.
async fn forward_notifications(
    mut notifications: broadcast::Receiver<RelayPoolNotification>,
    subscription_id: SubscriptionId,
    tx: mpsc::UnboundedSender<SubscriptionMessage>,
) {
    loop {
        let received = tokio::select! {
            _ = tx.closed() => break,
            received = notifications.recv() => received,
        };

        let message = match received {
            Ok(RelayPoolNotification::Event {
                subscription_id: sid,
                event,
                ..
            }) if sid == subscription_id => SubscriptionMessage::Event(ChatEvent::from_event(&event)),
            Ok(RelayPoolNotification::Message {
                message: RelayMessage::EndOfStoredEvents(sid),
                ..
            }) if sid.to_string() == subscription_id.to_string() => {
                SubscriptionMessage::EndOfStoredEvents
            }
            Ok(RelayPoolNotification::Shutdown) => break,
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(
                    "transport: subscription {} lagged, {} notifications skipped",
                    subscription_id,
                    skipped
                );
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        if tx.send(message).is_err() {
            break;
        }
    }
    tracing::debug!("transport: forwarder for {} stopped", subscription_id);
}
