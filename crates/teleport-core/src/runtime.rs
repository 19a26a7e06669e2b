use std::sync::Arc;

use anyhow::{Context, Result};
use nostr_sdk::NostrSigner;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::channel::Channel;
use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::events::SyncUpdate;
use crate::nostr::{KeyManager, PublishOutcome, Publisher, RelayTransport, SigningMode};
use crate::store::{ChannelCache, FileStorage, LocalStorage};
use crate::sync::SyncEngine;

/// Owns the core components and wires them to one storage and one transport.
pub struct CoreRuntime {
    storage: Arc<dyn LocalStorage>,
    keys: Arc<Mutex<KeyManager>>,
    engine: SyncEngine,
    publisher: Publisher,
}

impl CoreRuntime {
    /// Runtime persisting to `<data_dir>/storage`.
    pub fn new(
        config: CoreConfig,
        transport: Arc<dyn RelayTransport>,
        external_signer: Option<Arc<dyn NostrSigner>>,
    ) -> Result<Self> {
        let storage_dir = config.storage_dir();
        std::fs::create_dir_all(&storage_dir)
            .with_context(|| format!("creating {}", storage_dir.display()))?;
        let storage = FileStorage::new(&storage_dir)
            .with_context(|| format!("opening storage at {}", storage_dir.display()))?;
        Ok(Self::with_storage(
            config,
            Arc::new(storage),
            transport,
            external_signer,
        ))
    }

    pub fn with_storage(
        config: CoreConfig,
        storage: Arc<dyn LocalStorage>,
        transport: Arc<dyn RelayTransport>,
        external_signer: Option<Arc<dyn NostrSigner>>,
    ) -> Self {
        let mut key_manager =
            KeyManager::new(config.signing_mode, storage.clone(), external_signer);
        if let Some(secret) = &config.local_secret {
            if !key_manager.set_local_secret(secret) {
                tracing::warn!("runtime: configured local secret is not a valid key");
            }
        }
        let keys = Arc::new(Mutex::new(key_manager));

        let engine = SyncEngine::new(transport.clone(), ChannelCache::new(storage.clone()))
            .with_relays(config.relay_urls.clone());
        let publisher = Publisher::new(keys.clone(), engine.clone(), transport)
            .with_publish_timeout(config.publish_timeout());
        publisher.set_nickname(&config.nickname);

        Self {
            storage,
            keys,
            engine,
            publisher,
        }
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn key_manager(&self) -> Arc<Mutex<KeyManager>> {
        self.keys.clone()
    }

    pub fn storage(&self) -> Arc<dyn LocalStorage> {
        self.storage.clone()
    }

    pub fn updates(&self) -> broadcast::Receiver<SyncUpdate> {
        self.engine.updates()
    }

    pub fn relays(&self) -> Vec<String> {
        self.engine.relays()
    }

    /// Join the channel named by `cue` (`abc`, `#abc`, ` #ABC `).
    pub async fn select_channel(&self, cue: &str) -> Result<Channel, CoreError> {
        let channel = Channel::from_location_cue(cue)
            .ok_or_else(|| CoreError::InvalidChannel(cue.to_string()))?;
        self.engine.open(channel.clone(), self.relays()).await?;
        Ok(channel)
    }

    pub async fn set_relays(&self, relays: Vec<String>) -> Result<(), CoreError> {
        self.engine.set_relays(relays).await
    }

    /// Delete the cached history of the channel named by `cue`. An active
    /// subscription keeps its working set and rewrites the slot on the next
    /// admission.
    pub fn clear_history(&self, cue: &str) -> Result<Channel, CoreError> {
        let channel = Channel::from_location_cue(cue)
            .ok_or_else(|| CoreError::InvalidChannel(cue.to_string()))?;
        ChannelCache::new(self.storage.clone()).clear(&channel);
        tracing::info!("runtime: cleared cached history of {}", channel);
        Ok(channel)
    }

    /// Publish `text` to the active channel.
    pub async fn send(&self, text: &str) -> Result<PublishOutcome, CoreError> {
        let channel = self.engine.channel().ok_or(CoreError::NoActiveChannel)?;
        self.publisher.send(text, &channel).await
    }

    pub fn set_nickname(&self, nickname: &str) {
        self.publisher.set_nickname(nickname);
    }

    pub fn set_signing_mode(&self, mode: SigningMode) {
        self.keys.lock().set_mode(mode);
    }

    /// Returns whether `secret` parsed to a valid key.
    pub fn set_local_secret(&self, secret: &str) -> bool {
        self.keys.lock().set_local_secret(secret)
    }

    pub async fn shutdown(&self) {
        self.engine.close().await;
    }
}
