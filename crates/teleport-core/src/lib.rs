pub mod channel;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod models;
pub mod nostr;
pub mod runtime;
pub mod store;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use channel::Channel;
pub use config::CoreConfig;
pub use error::{CoreError, RelayFailure};
pub use events::SyncUpdate;
pub use models::ChatEvent;
pub use runtime::CoreRuntime;
