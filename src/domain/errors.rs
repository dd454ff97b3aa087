use thiserror::Error;

/// Errors surfaced to the caller of a transactional send.
#[derive(Debug, Error)]
pub enum TxError {
    #[error("Invalid fields: {0}")]
    Validation(String),
    #[error("template {0} not found")]
    TemplateNotFound(i64),
    #[error("error fetching {context}")]
    Resolution {
        context: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("error rendering message for subscriber {subscriber_id}")]
    Render {
        subscriber_id: i64,
        #[source]
        source: RenderError,
    },
    /// Every recipient selector that could not be resolved, joined by `"; "`.
    #[error("{0}")]
    RecipientsNotFound(String),
}

impl TxError {
    pub fn validation(reason: impl Into<String>) -> Self {
        TxError::Validation(reason.into())
    }

    pub fn resolution(context: impl Into<String>, source: anyhow::Error) -> Self {
        TxError::Resolution {
            context: context.into(),
            source,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("unknown template variable `{0}`")]
    UnknownVariable(String),
    #[error("unterminated placeholder at byte {0}")]
    Unterminated(usize),
}
