use serde_json::Value;

use crate::{
    application::services::{email::sanitize_email, messenger::MessengerGateway},
    config::DispatchConfig,
    domain::{
        errors::TxError,
        models::{Attachment, ContentType, TxChannel},
        value_objects::{HeaderSet, RecipientSpec},
    },
};

/// A transactional send as received from the transport, before validation.
#[derive(Debug, Clone, Default)]
pub struct TxMessageRequest {
    pub subscriber_email: Option<String>,
    pub subscriber_emails: Vec<String>,
    pub subscriber_id: Option<i64>,
    pub subscriber_ids: Vec<i64>,
    pub list_ids: Vec<i64>,
    pub list_names: Vec<String>,
    pub template_id: i64,
    pub from_email: Option<String>,
    pub subject: Option<String>,
    pub content_type: ContentType,
    pub messenger: Option<String>,
    pub messengers: Vec<String>,
    pub channels: Vec<TxChannel>,
    pub headers: Vec<HeaderSet>,
    pub attachments: Vec<Attachment>,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// One global template sent through every listed messenger.
    Legacy {
        template_id: i64,
        messengers: Vec<String>,
    },
    /// Per-channel templates. Never empty.
    Channels(Vec<TxChannel>),
}

#[derive(Debug, Clone)]
pub struct ValidatedTx {
    pub recipients: RecipientSpec,
    pub delivery: Delivery,
    pub from_email: String,
    pub subject: Option<String>,
    pub content_type: ContentType,
    pub headers: Vec<HeaderSet>,
    pub attachments: Vec<Attachment>,
    pub data: Value,
}

pub struct TxValidator<'a> {
    config: &'a DispatchConfig,
    gateway: &'a MessengerGateway,
}

impl<'a> TxValidator<'a> {
    pub fn new(config: &'a DispatchConfig, gateway: &'a MessengerGateway) -> Self {
        Self { config, gateway }
    }

    pub fn validate(&self, mut request: TxMessageRequest) -> Result<ValidatedTx, TxError> {
        let recipients = recipient_spec(&mut request)?;

        let from_email = request
            .from_email
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| self.config.default_from_email.clone());

        let messenger = match request.messenger.filter(|m| !m.is_empty()) {
            None => self.config.default_messenger.clone(),
            Some(name) if self.gateway.is_registered(&name) => name,
            Some(name) => {
                return Err(TxError::validation(format!("unknown messenger `{name}`")));
            }
        };

        let delivery = if request.channels.is_empty() {
            let messengers = if request.messengers.is_empty() {
                vec![messenger]
            } else {
                request.messengers
            };
            Delivery::Legacy {
                template_id: request.template_id,
                messengers,
            }
        } else {
            Delivery::Channels(request.channels)
        };

        Ok(ValidatedTx {
            recipients,
            delivery,
            from_email,
            subject: request.subject.filter(|s| !s.is_empty()),
            content_type: request.content_type,
            headers: request.headers,
            attachments: request.attachments,
            data: request.data,
        })
    }
}

/// Folds the singular selectors into their plural forms and checks that
/// exactly one selector family remains.
fn recipient_spec(request: &mut TxMessageRequest) -> Result<RecipientSpec, TxError> {
    let email = request.subscriber_email.take().filter(|e| !e.is_empty());
    let id = request.subscriber_id.take().filter(|id| *id != 0);

    if email.is_some() && !request.subscriber_emails.is_empty() {
        return Err(TxError::validation("do not send `subscriber_email`"));
    }
    if id.is_some() && !request.subscriber_ids.is_empty() {
        return Err(TxError::validation("do not send `subscriber_id`"));
    }
    request.subscriber_emails.extend(email);
    request.subscriber_ids.extend(id);

    let mut families = Vec::with_capacity(1);
    if !request.subscriber_emails.is_empty() {
        families.push(RecipientSpec::Emails(std::mem::take(
            &mut request.subscriber_emails,
        )));
    }
    if !request.subscriber_ids.is_empty() {
        families.push(RecipientSpec::SubscriberIds(std::mem::take(
            &mut request.subscriber_ids,
        )));
    }
    if !request.list_ids.is_empty() {
        families.push(RecipientSpec::ListIds(std::mem::take(&mut request.list_ids)));
    }
    if !request.list_names.is_empty() {
        families.push(RecipientSpec::ListNames(std::mem::take(
            &mut request.list_names,
        )));
    }

    if families.len() > 1 {
        return Err(TxError::validation(
            "send only ONE of: subscriber_emails OR subscriber_ids OR list_ids OR list_names",
        ));
    }
    let Some(spec) = families.pop() else {
        return Err(TxError::validation(
            "send subscriber_emails OR subscriber_ids OR list_ids OR list_names",
        ));
    };

    match spec {
        RecipientSpec::Emails(emails) => emails
            .into_iter()
            .map(|e| if e.is_empty() { Ok(e) } else { sanitize_email(&e) })
            .collect::<Result<Vec<_>, _>>()
            .map(RecipientSpec::Emails),
        other => Ok(other),
    }
}
