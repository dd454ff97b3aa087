use std::sync::Arc;

use poem_openapi::Tags;

use crate::application::usecases::send_tx_message::SendTxMessageUseCase;

#[derive(Clone)]
pub struct ApiState {
    pub send_tx_usecase: Arc<SendTxMessageUseCase>,
}

/// Enum of API sections (tags)
#[derive(Tags)]
pub enum EndpointsTags {
    Health,
    Transactional,
}
