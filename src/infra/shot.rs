//! Headless-browser capture engine driven as an external CLI.
//!
//! Each render spawns one fresh process of the configured capture tool,
//! which loads the staged markup, waits for embedded network resources to
//! settle, and screenshots the single element matching the selector:
//!
//! ```text
//! card-shot --input page.html --output card.png --selector .card \
//!     --viewport-width 600 --viewport-height 400 --scale 2 --quiet
//! ```
//!
//! One process per render keeps contexts fully isolated; `kill_on_drop`
//! guarantees teardown on every exit path, including timeout expiry in the
//! calling service. When no element matches the selector the tool reports
//! `no element matched` on stderr and exits non-zero.

use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{info, warn};

use crate::application::raster::{CaptureRequest, RasterError, RenderEngine};

const MISSING_TARGET_MARKER: &str = "no element matched";

/// [`RenderEngine`] implementation over the external capture CLI.
#[derive(Debug, Clone)]
pub struct SnapshotCli {
    cli_path: PathBuf,
}

impl SnapshotCli {
    pub fn new(cli_path: PathBuf) -> Self {
        Self { cli_path }
    }
}

#[async_trait]
impl RenderEngine for SnapshotCli {
    async fn capture(&self, markup: &str, request: &CaptureRequest) -> Result<Bytes, RasterError> {
        let started_at = Instant::now();

        let mut input_file = NamedTempFile::with_suffix(".html")?;
        input_file.write_all(markup.as_bytes())?;
        input_file.flush()?;

        let output_file = tempfile::Builder::new().suffix(".png").tempfile()?;
        let output_path = output_file.path().to_path_buf();

        let mut command = Command::new(&self.cli_path);
        command
            .arg("--input")
            .arg(input_file.path())
            .arg("--output")
            .arg(&output_path)
            .arg("--selector")
            .arg(&request.selector)
            .arg("--viewport-width")
            .arg(request.viewport_width.to_string())
            .arg("--viewport-height")
            .arg(request.viewport_height.to_string())
            .arg("--scale")
            .arg(request.device_scale_factor.to_string())
            .arg("--quiet")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if request.omit_background {
            command.arg("--omit-background");
        }

        let output = command.output().await.map_err(|err| {
            warn!(
                target = "infra::shot",
                op = "shot::capture",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                error_code = "spawn_cli",
                error = %err,
                "failed to spawn capture CLI"
            );
            if err.kind() == ErrorKind::NotFound {
                RasterError::Unavailable(err)
            } else {
                RasterError::Io(err)
            }
        })?;

        if !output.status.success() {
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            warn!(
                target = "infra::shot",
                op = "shot::capture",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                error_code = "capture_cli",
                stderr = %stderr,
                "capture CLI invocation failed"
            );
            if stderr.contains(MISSING_TARGET_MARKER) {
                return Err(RasterError::MissingTarget {
                    selector: request.selector.clone(),
                });
            }
            return Err(RasterError::Engine { exit_code, stderr });
        }

        let image = tokio::fs::read(&output_path).await?;

        info!(
            target = "infra::shot",
            op = "shot::capture",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            image_bytes = image.len(),
            "card captured via CLI"
        );

        Ok(Bytes::from(image))
    }
}
