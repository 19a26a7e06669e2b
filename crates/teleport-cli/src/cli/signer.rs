use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use nostr_connect::prelude::{NostrConnect, NostrConnectURI};
use nostr_sdk::prelude::{Keys, NostrSigner};

/// Remote signer for extension mode from a `bunker://` URI. A fresh client
/// key is generated per session.
pub fn connect_bunker(uri: &str, timeout: Duration) -> Result<Arc<dyn NostrSigner>> {
    let trimmed = uri.trim();
    if trimmed.is_empty() {
        bail!("bunker URI is empty");
    }
    let parsed = NostrConnectURI::parse(trimmed).context("invalid bunker URI")?;
    if parsed.relays().is_empty() {
        bail!("invalid bunker URI: missing relay");
    }
    let signer = NostrConnect::new(parsed, Keys::generate(), timeout, None)
        .context("failed to create remote signer")?;
    tracing::info!("signer: remote signer configured");
    Ok(Arc::new(signer))
}
