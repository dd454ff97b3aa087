use poem::http::StatusCode;
use serde_json::Value;
use tracing::error;

use crate::{
    application::usecases::validate_tx_message::TxMessageRequest,
    domain::{
        errors::TxError,
        models::{Attachment, TxChannel},
    },
    presentation::http::requests::TxMessageDto,
};

pub fn map_tx_request(dto: TxMessageDto, attachments: Vec<Attachment>) -> TxMessageRequest {
    TxMessageRequest {
        subscriber_email: dto.subscriber_email,
        subscriber_emails: dto.subscriber_emails,
        subscriber_id: dto.subscriber_id,
        subscriber_ids: dto.subscriber_ids,
        list_ids: dto.list_ids,
        list_names: dto.list_names,
        template_id: dto.template_id,
        from_email: dto.from_email,
        subject: dto.subject,
        content_type: dto.content_type.into(),
        messenger: dto.messenger,
        messengers: dto.messengers,
        channels: dto
            .channels
            .into_iter()
            .map(|c| TxChannel {
                channel: c.channel,
                template_id: c.template_id,
                content: c.content,
            })
            .collect(),
        headers: dto.headers,
        attachments,
        data: dto.data.unwrap_or(Value::Object(Default::default())),
    }
}

/// Request problems are the caller's fault; a failing lookup backend is not.
pub fn map_tx_error(err: TxError) -> poem::Error {
    let status = match &err {
        TxError::Resolution { source, .. } => {
            error!(error = %err, cause = %source, "recipient resolution failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        TxError::Validation(_)
        | TxError::TemplateNotFound(_)
        | TxError::Render { .. }
        | TxError::RecipientsNotFound(_) => StatusCode::BAD_REQUEST,
    };
    poem::Error::from_string(err.to_string(), status)
}

pub fn bad_request(message: impl Into<String>) -> poem::Error {
    poem::Error::from_string(message.into(), StatusCode::BAD_REQUEST)
}
