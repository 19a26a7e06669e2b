//! Outbound chat messages.
//!
//! `send` builds the template, signs it with the active identity, races the
//! signed event across all relays, and on the first acceptance hands the
//! event to the sync engine so the author sees it before any relay echo.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::stream::{FuturesUnordered, StreamExt};
use nostr_sdk::Event;
use parking_lot::{Mutex, RwLock};

use crate::channel::Channel;
use crate::constants::{kinds, tags, TOPIC_MARKER};
use crate::error::{CoreError, RelayFailure};
use crate::models::tag_utils::tag;
use crate::models::ChatEvent;
use crate::nostr::auth::{EventTemplate, KeyManager};
use crate::nostr::transport::RelayTransport;
use crate::sync::{Admission, SyncEngine};

/// A publish that at least one relay accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub event_id: String,
    /// First relay to accept
    pub accepted_by: String,
    /// What the working set did with the optimistic insert
    pub admission: Admission,
}

pub struct Publisher {
    keys: Arc<Mutex<KeyManager>>,
    engine: SyncEngine,
    transport: Arc<dyn RelayTransport>,
    nickname: RwLock<String>,
    publish_timeout: Option<Duration>,
}

impl Publisher {
    pub fn new(
        keys: Arc<Mutex<KeyManager>>,
        engine: SyncEngine,
        transport: Arc<dyn RelayTransport>,
    ) -> Self {
        Self {
            keys,
            engine,
            transport,
            nickname: RwLock::new(String::new()),
            publish_timeout: None,
        }
    }

    /// Bound the relay race. Relays still pending at the deadline count as failed.
    pub fn with_publish_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn nickname(&self) -> String {
        self.nickname.read().clone()
    }

    pub fn set_nickname(&self, nickname: &str) {
        *self.nickname.write() = nickname.trim().to_string();
    }

    /// Build the unsigned message for `channel`. The `n` tag is left out when
    /// no nickname is set.
    pub fn template(&self, text: &str, channel: &Channel, created_at: u64) -> EventTemplate {
        let mut event_tags = vec![
            tag(tags::GROUP, channel.as_str()),
            tag(tags::TOPIC, TOPIC_MARKER),
        ];
        let nickname = self.nickname();
        if !nickname.is_empty() {
            event_tags.push(tag(tags::NICKNAME, &nickname));
        }
        EventTemplate {
            kind: kinds::GROUP_CHAT,
            created_at,
            tags: event_tags,
            content: text.to_string(),
        }
    }

    pub async fn send(&self, text: &str, channel: &Channel) -> Result<PublishOutcome, CoreError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CoreError::EmptyMessage);
        }

        // Resolve under the lock, sign outside it: external signers round-trip
        let identity = self
            .keys
            .lock()
            .active_identity()
            .ok_or(CoreError::SigningUnavailable)?;

        let template = self.template(text, channel, unix_now());
        let event = identity.sign(template).await?;
        let event_id = event.id.to_hex();
        tracing::debug!("publish: signed {} for {}", event_id, channel);

        let relays = self.engine.relays();
        let accepted_by = self.race(&relays, &event).await?;
        tracing::info!("publish: {} accepted by {}", event_id, accepted_by);

        let admission = self.engine.admit(ChatEvent::from_event(&event));
        Ok(PublishOutcome {
            event_id,
            accepted_by,
            admission,
        })
    }

    /// First relay to accept wins. Fails only when every relay failed, no
    /// relay is configured, or the timeout expired first.
    async fn race(&self, relays: &[String], event: &Event) -> Result<String, CoreError> {
        let mut attempts: FuturesUnordered<_> =
            self.transport.publish(relays, event).into_iter().collect();
        let mut failures: Vec<RelayFailure> = Vec::new();

        let race = async {
            while let Some(attempt) = attempts.next().await {
                match attempt {
                    Ok(relay_url) => return Some(relay_url),
                    Err(failure) => {
                        tracing::debug!("publish: {}", failure);
                        failures.push(failure);
                    }
                }
            }
            None
        };

        // `None` when the deadline hit before the race settled
        let settled = match self.publish_timeout {
            Some(timeout) => tokio::time::timeout(timeout, race).await.ok(),
            None => Some(race.await),
        };

        match settled {
            Some(Some(relay_url)) => Ok(relay_url),
            Some(None) => {
                tracing::warn!("publish: rejected by all {} relay(s)", relays.len());
                Err(CoreError::PublishFailed { failures })
            }
            None => {
                tracing::warn!("publish: timed out after {:?}", self.publish_timeout);
                let failed: HashSet<String> =
                    failures.iter().map(|f| f.relay_url.clone()).collect();
                for relay_url in relays.iter().filter(|url| !failed.contains(*url)) {
                    failures.push(RelayFailure {
                        relay_url: relay_url.clone(),
                        reason: "timed out".to_string(),
                    });
                }
                Err(CoreError::PublishFailed { failures })
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
