//! Discord delivery & annotation adapter.
//!
//! Thin REST wrapper over the webhook publish call, feed-channel message
//! lookup, and reaction application. No retries; every failure maps to a
//! [`GatewayError`] for the pipeline to contain.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::info;

use crate::application::gateway::{
    ArtifactHandle, DeliveryGateway, GatewayError, ResolvedArtifact,
};
use crate::config::DiscordSettings;

const PUBLISHED_FILE_NAME: &str = "card.png";

#[derive(Debug, Deserialize)]
struct MessageEnvelope {
    id: String,
}

/// REST gateway bound to one webhook and one feed channel.
pub struct DiscordGateway {
    client: Client,
    api_base: Url,
    bot_token: String,
    webhook_id: String,
    webhook_token: String,
    feed_channel_id: String,
}

impl DiscordGateway {
    pub fn new(settings: &DiscordSettings) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .user_agent(user_agent())
            .build()
            .map_err(|err| GatewayError::transport(err.to_string()))?;

        Ok(Self {
            client,
            api_base: settings.api_base.clone(),
            bot_token: settings.bot_token.clone(),
            webhook_id: settings.webhook_id.clone(),
            webhook_token: settings.webhook_token.clone(),
            feed_channel_id: settings.feed_channel_id.clone(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.api_base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| GatewayError::transport("api base URL cannot carry a path"))?;
            // `push` percent-encodes each segment, which the reaction
            // marker emoji depends on.
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn reject_on_error(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

fn user_agent() -> &'static str {
    concat!("cartolina/", env!("CARGO_PKG_VERSION"))
}

#[async_trait]
impl DeliveryGateway for DiscordGateway {
    async fn publish(&self, image: Bytes) -> Result<ArtifactHandle, GatewayError> {
        let mut url = self.url(&["webhooks", &self.webhook_id, &self.webhook_token])?;
        // wait=true makes the webhook return the created message.
        url.set_query(Some("wait=true"));

        let part = reqwest::multipart::Part::bytes(image.to_vec())
            .file_name(PUBLISHED_FILE_NAME)
            .mime_str("image/png")
            .map_err(|err| GatewayError::transport(err.to_string()))?;
        let form = reqwest::multipart::Form::new().part("files[0]", part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| GatewayError::transport(err.to_string()))?;
        let response = Self::reject_on_error(response).await?;

        let envelope: MessageEnvelope = response
            .json()
            .await
            .map_err(|_| GatewayError::MalformedResponse { field: "id" })?;

        info!(
            target = "infra::discord",
            op = "discord::publish",
            artifact = %envelope.id,
            "card published via webhook"
        );

        Ok(ArtifactHandle(envelope.id))
    }

    async fn resolve(&self, handle: &ArtifactHandle) -> Result<ResolvedArtifact, GatewayError> {
        let url = self.url(&["channels", &self.feed_channel_id, "messages", &handle.0])?;

        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .send()
            .await
            .map_err(|err| GatewayError::transport(err.to_string()))?;
        let response = Self::reject_on_error(response).await?;

        let envelope: MessageEnvelope = response
            .json()
            .await
            .map_err(|_| GatewayError::MalformedResponse { field: "id" })?;

        Ok(ResolvedArtifact {
            channel_id: self.feed_channel_id.clone(),
            message_id: envelope.id,
        })
    }

    async fn annotate(
        &self,
        artifact: &ResolvedArtifact,
        marker: &str,
    ) -> Result<(), GatewayError> {
        let url = self.url(&[
            "channels",
            &artifact.channel_id,
            "messages",
            &artifact.message_id,
            "reactions",
            marker,
            "@me",
        ])?;

        let response = self
            .client
            .put(url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .header("Content-Length", "0")
            .send()
            .await
            .map_err(|err| GatewayError::transport(err.to_string()))?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(()),
            _ => Self::reject_on_error(response).await.map(|_| ()),
        }
    }
}
