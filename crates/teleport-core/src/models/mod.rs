pub mod chat_event;
pub mod tag_utils;

pub use chat_event::ChatEvent;
