use std::sync::Arc;

use tracing::warn;

use crate::{
    application::{
        handlers::{
            dispatch_engine::{DispatchEngine, DispatchMode, DispatchOutcome},
            recipient_resolver::RecipientResolver,
        },
        services::messenger::MessengerGateway,
        usecases::validate_tx_message::{Delivery, TxMessageRequest, TxValidator},
    },
    config::DispatchConfig,
    domain::{errors::TxError, models::Template, repositories::TemplateRepository},
};

pub struct SendTxMessageUseCase {
    templates: Arc<dyn TemplateRepository>,
    resolver: RecipientResolver,
    engine: DispatchEngine,
    gateway: Arc<MessengerGateway>,
    config: DispatchConfig,
}

impl SendTxMessageUseCase {
    pub fn new(
        templates: Arc<dyn TemplateRepository>,
        resolver: RecipientResolver,
        engine: DispatchEngine,
        gateway: Arc<MessengerGateway>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            templates,
            resolver,
            engine,
            gateway,
            config,
        }
    }

    /// Validates, resolves and dispatches one transactional message.
    ///
    /// Messages to resolvable recipients are sent even when the call
    /// ultimately fails with [`TxError::RecipientsNotFound`].
    pub async fn execute(&self, request: TxMessageRequest) -> Result<DispatchOutcome, TxError> {
        let tx = TxValidator::new(&self.config, &self.gateway).validate(request)?;

        let mode = match &tx.delivery {
            Delivery::Legacy {
                template_id,
                messengers,
            } => DispatchMode::Legacy {
                template: self.legacy_template(*template_id).await?,
                messengers: messengers.clone(),
            },
            Delivery::Channels(channels) => DispatchMode::MultiChannel {
                channels: channels.clone(),
            },
        };

        let resolution = self.resolver.resolve(&tx.recipients).await?;

        self.engine
            .dispatch(&tx, &mode, resolution)
            .await?
            .into_result()
    }

    async fn legacy_template(&self, template_id: i64) -> Result<Template, TxError> {
        match self.templates.get(template_id).await {
            Ok(Some(template)) => Ok(template),
            Ok(None) => Err(TxError::TemplateNotFound(template_id)),
            Err(err) => {
                warn!(template_id, error = %err, "error fetching template");
                Err(TxError::TemplateNotFound(template_id))
            }
        }
    }
}
