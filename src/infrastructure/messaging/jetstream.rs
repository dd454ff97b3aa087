use std::sync::Arc;

use async_nats::jetstream;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::{
    application::services::messenger::MessageSink,
    domain::{events::OutboundMessageEvent, models::OutboundMessage},
};

#[derive(Clone)]
pub struct JetstreamConfig {
    pub url: String,
    pub stream: String,
    /// Messages for messenger `m` are published on `<subject_prefix>.m`.
    pub subject_prefix: String,
}

/// Publishes outbound messages of one messenger to JetStream, where the
/// delivery workers pick them up.
pub struct JetstreamSink {
    context: jetstream::Context,
    messenger: String,
    subject: String,
}

impl JetstreamSink {
    /// Connects once and returns a sink per messenger, all sharing the
    /// same JetStream context and stream.
    pub async fn connect(
        config: &JetstreamConfig,
        messengers: &[String],
    ) -> anyhow::Result<Vec<Arc<dyn MessageSink>>> {
        let client = async_nats::connect(&config.url).await?;
        let context = jetstream::new(client);

        context
            .get_or_create_stream(jetstream::stream::Config {
                name: config.stream.clone(),
                subjects: vec![format!("{}.>", config.subject_prefix)],
                ..Default::default()
            })
            .await?;

        info!(
            stream = %config.stream,
            messengers = ?messengers,
            "jetstream sinks ready"
        );

        Ok(messengers
            .iter()
            .map(|messenger| {
                Arc::new(Self {
                    context: context.clone(),
                    messenger: messenger.clone(),
                    subject: format!("{}.{}", config.subject_prefix, messenger),
                }) as Arc<dyn MessageSink>
            })
            .collect())
    }
}

#[async_trait]
impl MessageSink for JetstreamSink {
    fn messenger(&self) -> &str {
        &self.messenger
    }

    async fn push(&self, message: OutboundMessage) -> anyhow::Result<()> {
        let event = OutboundMessageEvent::new(message);
        let payload = serde_json::to_vec(&event)?;

        self.context
            .publish(self.subject.clone(), payload.into())
            .await?
            .await?;

        debug!(
            event_id = %event.event_id,
            subject = %self.subject,
            "published outbound message"
        );
        Ok(())
    }
}
