use crate::channel::Channel;
use crate::models::ChatEvent;

/// Change notifications for the presentation layer.
///
/// `Reset` replaces the whole list (channel switch, cache hydration) while
/// `Appended` adds one event, so a view can tell reset-scroll from
/// append-scroll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncUpdate {
    Reset {
        channel: Channel,
        events: Vec<ChatEvent>,
    },
    Appended {
        channel: Channel,
        event: ChatEvent,
    },
    /// First end-of-stored-events seen for the current subscription
    CaughtUp { channel: Channel },
    /// The engine was closed and its working set dropped
    Closed,
}
