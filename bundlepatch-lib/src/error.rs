use crate::label::Label;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by the delivery backend.
///
/// This is the only error kind the patch state machine observes. Reasons are
/// kept as rendered strings so the error can travel inside outcomes and events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend failed to initialize: {0}")]
    Initialization(String),

    #[error("Backend has not been initialized")]
    NotInitialized,

    #[error("No bundles are registered under label '{0}'")]
    UnknownLabel(Label),

    #[error("Failed to resolve download size for label '{label}': {reason}")]
    DownloadSize { label: Label, reason: String },

    #[error("Failed to download dependencies for label '{label}': {reason}")]
    Download { label: Label, reason: String },

    #[error("Backend operation '{operation}' timed out after {elapsed:?}")]
    Timeout {
        operation: String,
        elapsed: Duration,
    },
}

impl BackendError {
    pub fn initialization(err: &anyhow::Error) -> Self {
        Self::Initialization(format!("{err:#}"))
    }

    pub fn download_size(label: &Label, err: &anyhow::Error) -> Self {
        Self::DownloadSize {
            label: label.clone(),
            reason: format!("{err:#}"),
        }
    }

    pub fn download(label: &Label, err: &anyhow::Error) -> Self {
        Self::Download {
            label: label.clone(),
            reason: format!("{err:#}"),
        }
    }

    pub fn timeout(operation: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed,
        }
    }
}
