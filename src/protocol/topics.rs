//! Topic construction for telemetry messages

use super::messages::Channel;

/// Topic for one channel: the parent topic with the channel name appended
///
/// No separator is inserted. The configured parent topic is expected to
/// already end with the delimiter the broker's consumers use.
pub fn channel_topic(parent_topic: &str, channel: Channel) -> String {
    format!("{parent_topic}{}", channel.as_str())
}
