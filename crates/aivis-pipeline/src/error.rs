use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("database error: {0}")]
    Db(#[from] aivis_db::DbError),

    #[error(transparent)]
    Analysis(#[from] aivis_analysis::AnalysisError),

    #[error(transparent)]
    Trust(#[from] aivis_trust::TrustError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("prompt {0} not found or inactive")]
    PromptNotFound(i64),

    #[error("citation {0} not found")]
    CitationNotFound(i64),

    #[error("citation {0} has no claim to verify")]
    MissingClaim(i64),
}

impl PipelineError {
    /// `true` when the request was rejected before anything was written.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PipelineError::Analysis(aivis_analysis::AnalysisError::Validation(_))
                | PipelineError::MissingClaim(_)
        )
    }
}
