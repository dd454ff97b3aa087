use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::OutboundMessage;

/// Envelope published to the delivery subsystem for every pushed message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessageEvent {
    pub event_id: Uuid,
    pub messenger: String,
    pub published_at: DateTime<Utc>,
    pub message: OutboundMessage,
}

impl OutboundMessageEvent {
    pub fn new(message: OutboundMessage) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            messenger: message.messenger.clone(),
            published_at: Utc::now(),
            message,
        }
    }
}
