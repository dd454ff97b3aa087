use crate::domain::models::{EMAIL_MESSENGER, TxChannel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelClass {
    /// Sent once per dispatch regardless of recipient count.
    Broadcast,
    /// Sent once per resolved recipient.
    SubscriberScoped,
}

pub fn classify(channel: &str) -> ChannelClass {
    if channel == EMAIL_MESSENGER {
        ChannelClass::SubscriberScoped
    } else {
        ChannelClass::Broadcast
    }
}

#[derive(Debug, Default)]
pub struct PartitionedChannels<'a> {
    pub broadcast: Vec<&'a TxChannel>,
    pub subscriber_scoped: Vec<&'a TxChannel>,
}

/// Splits channels by class, keeping the original relative order on each side.
pub fn partition(channels: &[TxChannel]) -> PartitionedChannels<'_> {
    let mut partitioned = PartitionedChannels::default();
    for channel in channels {
        match classify(&channel.channel) {
            ChannelClass::Broadcast => partitioned.broadcast.push(channel),
            ChannelClass::SubscriberScoped => partitioned.subscriber_scoped.push(channel),
        }
    }
    partitioned
}
