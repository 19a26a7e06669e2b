pub mod chat;
pub mod config;
pub mod logging;
pub mod signer;

pub use chat::{format_event, parse_input, run_chat, ChatInput};
pub use config::CliConfig;
pub use logging::init_logging;
pub use signer::connect_bunker;
