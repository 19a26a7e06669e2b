pub mod auth;
pub mod publish;
pub mod transport;

pub use auth::{parse_secret, EventTemplate, Identity, KeyManager, SigningMode};
pub use publish::{PublishOutcome, Publisher};
pub use transport::{
    NostrTransport, PublishAttempt, RelaySubscription, RelayTransport, SubscriptionMessage,
};
