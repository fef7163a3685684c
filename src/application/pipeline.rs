//! The submission pipeline: one validated submission in, one published and
//! annotated card out.
//!
//! Side effects are strictly ordered: no delivery before a successful
//! render, no annotation before a successful delivery. Any step's failure
//! ends the run; nothing is retried and no partial artifact is published.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono_tz::Tz;
use tracing::{info, warn};
use url::Url;

use crate::domain::card::CardData;
use crate::domain::counters::CounterSampler;

use super::clock::{Clock, TimeLabels};
use super::error::PipelineError;
use super::gateway::{ArtifactHandle, DeliveryGateway};
use super::raster::RasterService;
use super::template::TemplateDocument;

/// Lifecycle of one submission, from trigger to terminal state.
///
/// The session layer owns the first two states; [`SubmissionPipeline::run`]
/// reports the rest through its stage observer. `Failed` is reachable from
/// any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    FormRequested,
    SubmissionReceived,
    MetricsSynthesized,
    Rendering,
    Delivering,
    Annotating,
    Completed,
    Failed,
}

/// One captured form submission, tagged with requester identity.
#[derive(Debug, Clone)]
pub struct Submission {
    pub handle: String,
    pub avatar_url: Url,
    pub body: String,
}

/// Per-deployment card options collapsed from the observed variants.
#[derive(Debug, Clone)]
pub struct CardOptions {
    pub time_zone: Tz,
    pub verified_badge: bool,
    pub reaction_marker: String,
}

/// Outcome of a completed run, handed back to the activation layer for the
/// private confirmation.
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    pub artifact: ArtifactHandle,
    /// False when the reaction marker could not be applied; the published
    /// image is unaffected.
    pub annotated: bool,
}

impl SubmissionReceipt {
    pub fn confirmation_message(&self) -> &'static str {
        "✅ Your card is live!"
    }
}

/// Turns one submission into image bytes: counter synthesis, timestamp
/// labels, template substitution, rasterization. No remote delivery
/// collaborator is involved, so the local one-shot render command uses this
/// directly.
pub struct CardRenderer {
    template: Arc<TemplateDocument>,
    raster: RasterService,
    sampler: Arc<dyn CounterSampler>,
    clock: Arc<dyn Clock>,
    options: CardOptions,
}

impl CardRenderer {
    pub fn new(
        template: Arc<TemplateDocument>,
        raster: RasterService,
        sampler: Arc<dyn CounterSampler>,
        clock: Arc<dyn Clock>,
        options: CardOptions,
    ) -> Self {
        Self {
            template,
            raster,
            sampler,
            clock,
            options,
        }
    }

    /// Build the card record for one submission. Covers the
    /// MetricsSynthesized step.
    pub fn compose_card(&self, submission: &Submission) -> Result<CardData, PipelineError> {
        let counters = self.sampler.sample();
        let labels = TimeLabels::compute(self.clock.now_utc(), self.options.time_zone);

        let card = CardData::compose(
            submission.avatar_url.clone(),
            submission.handle.clone(),
            submission.body.clone(),
            labels.time,
            labels.date,
            counters,
            self.options.verified_badge,
        )?;

        Ok(card)
    }

    /// Render a submission to image bytes without publishing.
    pub async fn render_image(&self, submission: &Submission) -> Result<Bytes, PipelineError> {
        let card = self.compose_card(submission)?;
        let markup = self.template.render(&card);
        let image = self.raster.rasterize(&markup).await?;
        Ok(image)
    }
}

pub struct SubmissionPipeline {
    renderer: CardRenderer,
    gateway: Arc<dyn DeliveryGateway>,
}

impl SubmissionPipeline {
    pub fn new(renderer: CardRenderer, gateway: Arc<dyn DeliveryGateway>) -> Self {
        Self { renderer, gateway }
    }

    /// Run the full flow for one validated submission.
    pub async fn run(&self, submission: Submission) -> Result<SubmissionReceipt, PipelineError> {
        self.run_observed(submission, &mut |_| {}).await
    }

    /// Like [`run`](Self::run), reporting each stage transition to the
    /// observer as it is entered.
    pub async fn run_observed(
        &self,
        submission: Submission,
        observe: &mut (dyn FnMut(Stage) + Send),
    ) -> Result<SubmissionReceipt, PipelineError> {
        let started_at = Instant::now();

        let card = self.renderer.compose_card(&submission)?;
        observe(Stage::MetricsSynthesized);

        observe(Stage::Rendering);
        let markup = self.renderer.template.render(&card);
        let image = self.renderer.raster.rasterize(&markup).await?;

        observe(Stage::Delivering);
        let artifact = self
            .gateway
            .publish(image)
            .await
            .map_err(PipelineError::Delivery)?;
        metrics::counter!("cartolina_cards_published_total").increment(1);

        observe(Stage::Annotating);
        let annotated = self.annotate(&artifact).await;
        observe(Stage::Completed);

        info!(
            target = "application::pipeline",
            op = "pipeline::run",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            handle = %submission.handle,
            artifact = %artifact.0,
            annotated,
            "card published"
        );

        Ok(SubmissionReceipt {
            artifact,
            annotated,
        })
    }

    /// Resolve the published artifact in the feed channel and apply the
    /// canonical reaction marker. Non-fatal by policy: the image is already
    /// public, so failures degrade to a logged warning.
    async fn annotate(&self, artifact: &ArtifactHandle) -> bool {
        let resolved = match self.gateway.resolve(artifact).await {
            Ok(resolved) => resolved,
            Err(err) => {
                self.report_annotation_failure("resolve_artifact", &err);
                return false;
            }
        };

        match self
            .gateway
            .annotate(&resolved, &self.renderer.options.reaction_marker)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                self.report_annotation_failure("apply_marker", &err);
                false
            }
        }
    }

    fn report_annotation_failure(&self, op: &'static str, err: &dyn std::error::Error) {
        metrics::counter!("cartolina_annotation_failures_total").increment(1);
        warn!(
            target = "application::pipeline",
            op,
            result = "error",
            error = %err,
            "annotation failed after successful delivery"
        );
    }
}
