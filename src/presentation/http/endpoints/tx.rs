use std::sync::Arc;

use poem_openapi::{OpenApi, payload::Json, types::ParseFromJSON};
use tracing::info;

use crate::{
    domain::models::Attachment,
    presentation::http::{
        endpoints::root::{ApiState, EndpointsTags},
        mappers::{bad_request, map_tx_error, map_tx_request},
        requests::{TxMessageDto, TxMultipartDto, TxRequestPayload},
        responses::OkResponseDto,
    },
};

#[derive(Clone)]
pub struct TxEndpoints {
    state: Arc<ApiState>,
}

impl TxEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl TxEndpoints {
    /// Send a transactional message to one or more subscribers.
    #[oai(path = "/tx", method = "post", tag = EndpointsTags::Transactional)]
    pub async fn send_tx(&self, payload: TxRequestPayload) -> poem::Result<Json<OkResponseDto>> {
        let (dto, attachments) = match payload {
            TxRequestPayload::Json(Json(dto)) => (dto, Vec::new()),
            TxRequestPayload::Multipart(form) => read_multipart(form).await?,
        };

        let outcome = self
            .state
            .send_tx_usecase
            .execute(map_tx_request(dto, attachments))
            .await
            .map_err(map_tx_error)?;

        info!(
            sent = outcome.sent,
            skipped = outcome.skipped,
            failed = outcome.failed.len(),
            "transactional message dispatched"
        );

        Ok(Json(OkResponseDto { data: true }))
    }
}

async fn read_multipart(
    form: TxMultipartDto,
) -> poem::Result<(TxMessageDto, Vec<Attachment>)> {
    let value: serde_json::Value = serde_json::from_str(&form.data)
        .map_err(|err| bad_request(format!("invalid JSON in `data`: {err}")))?;
    let dto = TxMessageDto::parse_from_json(Some(value))
        .map_err(|err| bad_request(format!("invalid JSON in `data`: {}", err.into_message())))?;

    let mut attachments = Vec::with_capacity(form.file.len());
    for upload in form.file {
        let name = upload.file_name().unwrap_or_default().to_string();
        let content_type = upload.content_type().map(str::to_string);
        let content = upload
            .into_vec()
            .await
            .map_err(|err| bad_request(format!("error reading attachment: {err}")))?;
        attachments.push(Attachment::new(name, content_type.as_deref(), content));
    }

    Ok((dto, attachments))
}
