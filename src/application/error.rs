use thiserror::Error;

use crate::domain::error::DomainError;
use crate::infra::error::InfraError;

use super::gateway::GatewayError;
use super::raster::RasterError;

/// Failure of one in-flight submission, tagged by the pipeline stage that
/// raised it. Annotation failures are absent by policy: the image is
/// already public at that point, so they degrade to a logged warning on the
/// receipt instead of failing the submission.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("render failed: {0}")]
    Render(#[from] RasterError),
    #[error("delivery failed: {0}")]
    Delivery(GatewayError),
}

impl PipelineError {
    /// The single short notice shown privately to the requester. Internal
    /// detail stays in the tracing output.
    pub fn user_message(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "Your card text could not be accepted.",
            PipelineError::Render(_) => "Your card could not be rendered. Nothing was posted.",
            PipelineError::Delivery(_) => "Your card rendered but could not be posted.",
        }
    }
}

/// Top-level application error for process bootstrap and command dispatch.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
