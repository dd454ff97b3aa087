use std::collections::BTreeMap;

use poem_openapi::{ApiRequest, Multipart, Object, payload::Json, types::multipart::Upload};

use crate::presentation::models::ContentTypeKind;

#[derive(Object, Debug, Clone)]
pub struct TxChannelDto {
    pub channel: String,
    pub template_id: i64,
    /// Literal body sent instead of the rendered template.
    pub content: Option<String>,
}

/// A transactional message. Exactly one of `subscriber_emails`,
/// `subscriber_ids`, `list_ids` or `list_names` (or the singular
/// `subscriber_email` / `subscriber_id`) selects the recipients.
#[derive(Object, Debug, Clone, Default)]
pub struct TxMessageDto {
    pub subscriber_email: Option<String>,
    #[oai(default)]
    pub subscriber_emails: Vec<String>,
    pub subscriber_id: Option<i64>,
    #[oai(default)]
    pub subscriber_ids: Vec<i64>,
    #[oai(default)]
    pub list_ids: Vec<i64>,
    #[oai(default)]
    pub list_names: Vec<String>,
    #[oai(default)]
    pub template_id: i64,
    pub from_email: Option<String>,
    pub subject: Option<String>,
    #[oai(default)]
    pub content_type: ContentTypeKind,
    pub messenger: Option<String>,
    #[oai(default)]
    pub messengers: Vec<String>,
    #[oai(default)]
    pub channels: Vec<TxChannelDto>,
    #[oai(default)]
    pub headers: Vec<BTreeMap<String, String>>,
    pub data: Option<serde_json::Value>,
}

/// Multipart variant: the message as JSON in `data`, files in `file`.
#[derive(Multipart)]
pub struct TxMultipartDto {
    pub data: String,
    pub file: Vec<Upload>,
}

#[derive(ApiRequest)]
pub enum TxRequestPayload {
    Json(Json<TxMessageDto>),
    Multipart(TxMultipartDto),
}
