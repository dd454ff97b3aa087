use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::models::OutboundMessage;

/// Downstream delivery for a single messenger. Errors are reported back to
/// the dispatcher, which logs them and never retries.
#[async_trait]
pub trait MessageSink: Send + Sync {
    fn messenger(&self) -> &str;
    async fn push(&self, message: OutboundMessage) -> anyhow::Result<()>;
}

#[derive(Clone, Default)]
pub struct MessengerGateway {
    sinks: HashMap<String, Arc<dyn MessageSink>>,
}

impl MessengerGateway {
    pub fn new(sinks: Vec<Arc<dyn MessageSink>>) -> Self {
        let mut map = HashMap::new();
        for sink in sinks {
            map.insert(sink.messenger().to_string(), sink);
        }
        Self { sinks: map }
    }

    pub fn get(&self, messenger: &str) -> Option<Arc<dyn MessageSink>> {
        self.sinks.get(messenger).cloned()
    }

    pub fn is_registered(&self, messenger: &str) -> bool {
        self.sinks.contains_key(messenger)
    }

    /// Routes the message to the sink registered under its messenger name.
    pub async fn push(&self, message: OutboundMessage) -> anyhow::Result<()> {
        let sink = self
            .get(&message.messenger)
            .ok_or_else(|| anyhow::anyhow!("unknown messenger `{}`", message.messenger))?;
        sink.push(message).await
    }
}
