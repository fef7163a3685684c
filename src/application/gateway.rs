//! Delivery and annotation boundary consumed by the pipeline.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Opaque identity of a published artifact, as issued by the delivery
/// channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle(pub String);

/// A published artifact located in the feed channel, ready for annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub channel_id: String,
    pub message_id: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway transport error: {0}")]
    Transport(String),
    #[error("gateway rejected the call with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("gateway response missing `{field}`")]
    MalformedResponse { field: &'static str },
}

impl GatewayError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}

/// Remote publication surface. The pipeline treats every call as an opaque,
/// fallible remote operation and never retries.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Publish a rendered image to the output channel.
    async fn publish(&self, image: Bytes) -> Result<ArtifactHandle, GatewayError>;

    /// Locate the published artifact in the feed channel by identity.
    async fn resolve(&self, handle: &ArtifactHandle) -> Result<ResolvedArtifact, GatewayError>;

    /// Apply one reaction marker to the resolved artifact.
    async fn annotate(&self, artifact: &ResolvedArtifact, marker: &str)
    -> Result<(), GatewayError>;
}
