// Failures of a single notification invocation. None are retried locally.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    RecipientNotFound(String),

    #[error("{key} is not set, please configure it under [mail] in the config file")]
    ConfigurationMissing { key: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("report summary for host '{host}' has no '{metric}' metric")]
    MalformedRecord { host: String, metric: String },

    #[error("'{metric}' total overflows while adding host '{host}'")]
    MetricOverflow { host: String, metric: String },

    #[error("{operation} failed: {source}")]
    Collaborator {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("mail delivery failed: {0}")]
    Delivery(#[source] anyhow::Error),
}

impl DispatchError {
    pub(crate) fn collaborator(operation: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| DispatchError::Collaborator { operation, source }
    }
}
