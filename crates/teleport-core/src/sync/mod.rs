pub mod engine;
pub mod filter;

pub use engine::{Admission, SyncEngine, SyncPhase};
pub use filter::ChannelFilter;
