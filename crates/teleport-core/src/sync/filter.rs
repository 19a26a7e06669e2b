use nostr_sdk::{Alphabet, Filter, Kind, SingleLetterTag, Timestamp};
use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::constants::{kinds, LOOKBACK_SECS, MAX_CACHED_EVENTS, TOPIC_MARKER};

/// Subscription query for one channel.
///
/// Serializes to the relay wire shape:
/// `{"kinds":[20000],"#g":["abc"],"#t":["teleport"],"since":..,"limit":500}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelFilter {
    pub kinds: Vec<u16>,
    #[serde(rename = "#g")]
    pub groups: Vec<String>,
    #[serde(rename = "#t")]
    pub topics: Vec<String>,
    pub since: u64,
    pub limit: usize,
}

impl ChannelFilter {
    /// Filter for `channel` looking back `LOOKBACK_SECS` from `now`.
    pub fn for_channel(channel: &Channel, now: u64) -> Self {
        Self {
            kinds: vec![kinds::GROUP_CHAT],
            groups: vec![channel.as_str().to_string()],
            topics: vec![TOPIC_MARKER.to_string()],
            since: now.saturating_sub(LOOKBACK_SECS),
            limit: MAX_CACHED_EVENTS,
        }
    }

    pub fn to_nostr_filter(&self) -> Filter {
        Filter::new()
            .kinds(self.kinds.iter().copied().map(Kind::from))
            .custom_tags(SingleLetterTag::lowercase(Alphabet::G), self.groups.clone())
            .custom_tags(SingleLetterTag::lowercase(Alphabet::T), self.topics.clone())
            .since(Timestamp::from(self.since))
            .limit(self.limit)
    }
}
