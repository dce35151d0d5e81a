use thiserror::Error;

/// Errors raised while building or configuring schedulers.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to spawn worker thread for queue `{label}`: {source}")]
    Spawn {
        label: String,
        source: std::io::Error,
    },

    #[error("invalid queue configuration: {message}")]
    InvalidConfig { message: String },
}

impl SchedulerError {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Ways a [`Promise`](crate::Promise) can finish without a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromiseError {
    #[error("promise work panicked: {message}")]
    Panicked { message: String },

    #[error("promise was cancelled")]
    Cancelled,
}

/// Best-effort extraction of a panic payload's message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
