use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{application::services::messenger::MessageSink, domain::models::OutboundMessage};

/// Sink that keeps every pushed message in memory. Pushes addressed to
/// subscribers marked with [`RecordingSink::fail_for`] are rejected and not
/// recorded.
#[derive(Clone)]
pub struct RecordingSink {
    messenger: String,
    pushed: Arc<RwLock<Vec<OutboundMessage>>>,
    failing: Arc<RwLock<HashSet<i64>>>,
    delay: Arc<RwLock<Option<Duration>>>,
}

impl RecordingSink {
    pub fn new(messenger: &str) -> Arc<Self> {
        Arc::new(Self {
            messenger: messenger.to_string(),
            pushed: Arc::default(),
            failing: Arc::default(),
            delay: Arc::default(),
        })
    }

    pub async fn fail_for(&self, subscriber_id: i64) {
        self.failing.write().await.insert(subscriber_id);
    }

    /// Every push waits `delay` before it is recorded.
    pub async fn delay_pushes(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    pub async fn messages(&self) -> Vec<OutboundMessage> {
        self.pushed.read().await.clone()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    fn messenger(&self) -> &str {
        &self.messenger
    }

    async fn push(&self, message: OutboundMessage) -> anyhow::Result<()> {
        if self.failing.read().await.contains(&message.subscriber.id) {
            anyhow::bail!(
                "{} rejected message for subscriber {}",
                self.messenger,
                message.subscriber.id
            );
        }
        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.pushed.write().await.push(message);
        Ok(())
    }
}
