//! Template asset loading.
//!
//! The dark card template ships embedded in the binary; deployments may
//! point `render.template_path` at an alternate document. Either way the
//! asset is read and validated exactly once at startup.

use std::path::Path;

use tracing::info;

use crate::application::template::TemplateDocument;

use super::error::InfraError;

static DEFAULT_CARD_TEMPLATE: &str = include_str!("../../assets/card-dark.html");

/// Load and validate the card template.
pub async fn load_template(override_path: Option<&Path>) -> Result<TemplateDocument, InfraError> {
    let (source, origin) = match override_path {
        Some(path) => (
            tokio::fs::read_to_string(path).await?,
            path.display().to_string(),
        ),
        None => (DEFAULT_CARD_TEMPLATE.to_string(), "embedded".to_string()),
    };

    let template = TemplateDocument::parse(source)?;

    info!(
        target = "infra::assets",
        op = "assets::load_template",
        origin = %origin,
        "card template loaded"
    );

    Ok(template)
}
