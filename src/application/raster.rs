//! Card rasterization: drives a rendering engine to capture one element of
//! the laid-out markup as a pixel buffer.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};

/// Everything the rendering engine needs to lay out and capture one card.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub device_scale_factor: f64,
    /// CSS selector contract: the template exposes exactly one matching
    /// element, and only its pixels are captured.
    pub selector: String,
    /// When false the capture keeps the page background (rounded corners
    /// stay filled); when true transparency is preserved.
    pub omit_background: bool,
}

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("rendering engine unavailable: {0}")]
    Unavailable(io::Error),
    #[error("failed to stage markup for capture: {0}")]
    Io(#[from] io::Error),
    #[error("rendering engine failed (exit {exit_code:?}): {stderr}")]
    Engine {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("no element matched capture selector `{selector}`")]
    MissingTarget { selector: String },
    #[error("render did not settle within {limit:?}")]
    Timeout { limit: Duration },
}

/// Rendering-engine boundary. One isolated context per call; the engine
/// must tear the context down on every exit path and never reuse it.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn capture(&self, markup: &str, request: &CaptureRequest) -> Result<Bytes, RasterError>;
}

/// Applies the configured capture parameters and the explicit render
/// timeout around the engine.
pub struct RasterService {
    engine: Arc<dyn RenderEngine>,
    request: CaptureRequest,
    timeout: Duration,
}

impl RasterService {
    pub fn new(engine: Arc<dyn RenderEngine>, request: CaptureRequest, timeout: Duration) -> Self {
        Self {
            engine,
            request,
            timeout,
        }
    }

    /// Rasterize the markup into the card's pixel buffer.
    ///
    /// Settle-wait stalls, selector misses, capture errors and timeout
    /// expiry all surface as [`RasterError`]; no partial buffer is ever
    /// returned.
    pub async fn rasterize(&self, markup: &str) -> Result<Bytes, RasterError> {
        let started_at = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.engine.capture(markup, &self.request))
            .await
            .unwrap_or(Err(RasterError::Timeout {
                limit: self.timeout,
            }));

        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        metrics::histogram!("cartolina_render_ms").record(elapsed_ms as f64);

        match &outcome {
            Ok(buffer) => {
                metrics::counter!("cartolina_cards_rendered_total").increment(1);
                info!(
                    target = "application::raster",
                    op = "raster::rasterize",
                    result = "ok",
                    elapsed_ms,
                    image_bytes = buffer.len(),
                    "card captured"
                );
            }
            Err(err) => {
                warn!(
                    target = "application::raster",
                    op = "raster::rasterize",
                    result = "error",
                    elapsed_ms,
                    error = %err,
                    "card capture failed"
                );
            }
        }

        outcome
    }
}
