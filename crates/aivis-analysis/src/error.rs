use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Missing or blank required input. Raised before any job row exists.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{collaborator} returned HTTP {status}")]
    UpstreamStatus {
        collaborator: &'static str,
        status: u16,
    },

    #[error("{collaborator} did not respond within {secs}s")]
    Timeout {
        collaborator: &'static str,
        secs: u64,
    },

    #[error("malformed response from {collaborator}: {reason}")]
    MalformedResponse {
        collaborator: &'static str,
        reason: String,
    },

    #[error("model {model} returned an empty answer")]
    EmptyAnswer { model: String },

    #[error(transparent)]
    Core(#[from] aivis_core::CoreError),

    #[error("persistence error: {0}")]
    Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl AnalysisError {
    /// `true` for collaborator failures that end a job in `failed` rather
    /// than propagating to the caller.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AnalysisError::Http(_)
                | AnalysisError::UpstreamStatus { .. }
                | AnalysisError::Timeout { .. }
                | AnalysisError::MalformedResponse { .. }
                | AnalysisError::EmptyAnswer { .. }
        )
    }

    pub(crate) fn persistence<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AnalysisError::Persistence(Box::new(err))
    }
}
