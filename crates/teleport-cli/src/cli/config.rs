use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use teleport_core::nostr::SigningMode;
use teleport_core::CoreConfig;

/// CLI configuration that can be loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Relay URLs, replacing the built-in defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relays: Option<Vec<String>>,

    /// Channel joined when none is given on the command line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_mode: Option<SigningMode>,

    /// nsec or hex secret for local signing mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// bunker:// URI of a remote signer for extension mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bunker_uri: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_timeout_secs: Option<u64>,
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Overlay this file's settings onto `base`. Unset fields keep the base value.
    pub fn apply(&self, base: &mut CoreConfig) {
        if let Some(data_dir) = &self.data_dir {
            base.data_dir = data_dir.clone();
        }
        if let Some(relays) = &self.relays {
            base.relay_urls = relays.clone();
        }
        if let Some(nickname) = &self.nickname {
            base.nickname = nickname.clone();
        }
        if let Some(mode) = self.signing_mode {
            base.signing_mode = mode;
        }
        if let Some(secret) = &self.secret {
            base.local_secret = Some(secret.clone());
        }
        if self.publish_timeout_secs.is_some() {
            base.publish_timeout_secs = self.publish_timeout_secs;
        }
    }
}
