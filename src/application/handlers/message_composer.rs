use crate::{
    application::{services::renderer::RenderedContent, usecases::validate_tx_message::ValidatedTx},
    domain::{
        models::{OutboundMessage, Subscriber},
        value_objects::MessageHeaders,
    },
};

/// Builds outbound messages for one dispatch call. The parts shared by every
/// message (sender, headers, attachments, data) are taken from the validated
/// request once and copied into each composed message.
pub struct MessageComposer<'a> {
    tx: &'a ValidatedTx,
    headers: MessageHeaders,
}

impl<'a> MessageComposer<'a> {
    pub fn new(tx: &'a ValidatedTx) -> Self {
        Self {
            tx,
            headers: MessageHeaders::from_sets(&tx.headers),
        }
    }

    /// `recipient` is the subscriber the message is addressed to, or the
    /// rendering context of a broadcast. `literal_content` replaces the
    /// rendered body when present.
    pub fn compose(
        &self,
        rendered: RenderedContent,
        recipient: &Subscriber,
        messenger: &str,
        literal_content: Option<&str>,
    ) -> OutboundMessage {
        let body = match literal_content.filter(|c| !c.is_empty()) {
            Some(content) => content.as_bytes().to_vec(),
            None => rendered.body.into_bytes(),
        };

        OutboundMessage {
            subscriber: recipient.clone(),
            to: vec![recipient.email.clone()],
            from: self.tx.from_email.clone(),
            subject: rendered.subject,
            content_type: self.tx.content_type,
            messenger: messenger.to_string(),
            body,
            attachments: self.tx.attachments.clone(),
            headers: self.headers.clone(),
            data: self.tx.data.clone(),
        }
    }
}
