use std::fmt;

/// A single relay's refusal or failure during a publish race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFailure {
    pub relay_url: String,
    pub reason: String,
}

impl fmt::Display for RelayFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.relay_url, self.reason)
    }
}

/// Failures surfaced to the user as inline notices.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// No identity can be resolved under the current signing mode
    #[error("No signing identity available for the current mode")]
    SigningUnavailable,

    /// Every relay rejected or errored, or the race timed out
    #[error("Publish failed on all relays{}", format_failures(.failures))]
    PublishFailed { failures: Vec<RelayFailure> },

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Invalid channel name: {0:?}")]
    InvalidChannel(String),

    #[error("No channel selected")]
    NoActiveChannel,

    /// The signer was reachable but refused or failed to sign
    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

fn format_failures(failures: &[RelayFailure]) -> String {
    if failures.is_empty() {
        return String::new();
    }
    let joined: Vec<String> = failures.iter().map(ToString::to_string).collect();
    format!(" ({})", joined.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_failed_lists_relays() {
        let err = CoreError::PublishFailed {
            failures: vec![
                RelayFailure {
                    relay_url: "wss://a".to_string(),
                    reason: "blocked".to_string(),
                },
                RelayFailure {
                    relay_url: "wss://b".to_string(),
                    reason: "timeout".to_string(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "Publish failed on all relays (wss://a: blocked; wss://b: timeout)"
        );
    }

    #[test]
    fn test_publish_failed_without_relays() {
        let err = CoreError::PublishFailed { failures: vec![] };
        assert_eq!(err.to_string(), "Publish failed on all relays");
    }
}
