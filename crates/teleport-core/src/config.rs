use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::DEFAULT_RELAYS;
use crate::nostr::SigningMode;

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub data_dir: PathBuf,
    pub relay_urls: Vec<String>,
    pub nickname: String,
    pub signing_mode: SigningMode,
    /// `nsec1…` or hex secret for `local` mode
    pub local_secret: Option<String>,
    /// Upper bound on a publish race; unbounded when `None`
    pub publish_timeout_secs: Option<u64>,
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            relay_urls: DEFAULT_RELAYS.iter().map(|r| r.to_string()).collect(),
            nickname: String::new(),
            signing_mode: SigningMode::default(),
            local_secret: None,
            publish_timeout_secs: None,
        }
    }

    /// Directory holding the key/value storage files.
    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir.join("storage")
    }

    pub fn publish_timeout(&self) -> Option<Duration> {
        self.publish_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("teleport");
        Self::new(data_dir)
    }
}
