use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::subscriber::Subscriber;
use crate::domain::value_objects::MessageHeaders;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Html,
    Markdown,
    Plain,
}

/// One channel entry of a multi-channel message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxChannel {
    pub channel: String,
    pub template_id: i64,
    /// Literal body that replaces the rendered template body when set.
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    pub name: String,
    pub header: MessageHeaders,
    pub content: Vec<u8>,
}

impl Attachment {
    /// Builds an attachment with the MIME part headers a mail transport
    /// expects. An empty content type falls back to `application/octet-stream`.
    pub fn new(name: impl Into<String>, content_type: Option<&str>, content: Vec<u8>) -> Self {
        let name = name.into();
        let content_type = content_type
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or("application/octet-stream");

        let mut header = MessageHeaders::new();
        header.set(
            "Content-Disposition",
            format!("attachment; filename=\"{name}\""),
        );
        header.set("Content-Type", format!("{content_type}; name=\"{name}\""));
        header.set("Content-Transfer-Encoding", "base64");

        Self {
            name,
            header,
            content,
        }
    }
}

/// A transport-ready message handed to a sink. Built once per
/// (recipient, messenger) pair and never touched again by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundMessage {
    pub subscriber: Subscriber,
    pub to: Vec<String>,
    pub from: String,
    pub subject: String,
    pub content_type: ContentType,
    pub messenger: String,
    pub body: Vec<u8>,
    pub attachments: Vec<Attachment>,
    pub headers: MessageHeaders,
    pub data: Value,
}
