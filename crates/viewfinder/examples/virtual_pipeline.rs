//! Drives the full pipeline against the in-process virtual provider.
//!
//! Run with `cargo run --example virtual_pipeline`.

use std::sync::Arc;

use viewfinder::prelude::*;
use viewfinder_core::prelude::{Rotation90, Size, ViewportGeometry};
use viewfinder_provider::prelude::*;

#[derive(Default)]
struct LogObserver {
    frames: usize,
}

impl PipelineObserver for LogObserver {
    fn on_opened(&mut self, device: &DeviceId) {
        tracing::info!(%device, "opened");
    }

    fn on_preview_size_chosen(&mut self, device: &DeviceId, size: Size) {
        tracing::info!(%device, %size, "preview size chosen");
    }

    fn on_session_active(&mut self, session: SessionId) {
        tracing::info!(%session, "session active");
    }

    fn on_frame(&mut self, frame: &[u8]) {
        self.frames += 1;
        tracing::info!(len = frame.len(), total = self.frames, "frame");
    }

    fn on_error(&mut self, error: &PipelineError) {
        tracing::error!(code = error.code(), %error, "pipeline error");
    }

    fn on_closed(&mut self, device: &DeviceId) {
        tracing::info!(%device, "closed");
    }
}

fn main() -> Result<(), PipelineError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .init();

    let provider = Arc::new(VirtualProvider::new().with_device(VirtualDevice::back_camera()));
    let pipeline = CameraPipeline::new(
        provider.clone(),
        PipelineConfig::default(),
        LogObserver::default(),
    );

    pipeline.open(&DeviceId::from("back"), Rotation90::Deg0)?;

    // Portrait layout pass; the update tells us which buffer to allocate.
    let update = pipeline.viewport_resized(1080, 1920, ViewportGeometry::new(1080, 1920))?;
    tracing::info!(size = %update.preview_size, "allocating preview buffer");
    pipeline.set_viewport_surface(Some(Surface::new()))?;
    pipeline.pump()?;

    // A few simulated frames.
    for n in 0..3u8 {
        provider.emit_frame(vec![n; 16]);
    }
    pipeline.pump()?;

    // Rotate the device a quarter turn and add a raw-frame consumer.
    if let Some(update) = pipeline.set_device_rotation(Rotation90::Deg90)? {
        tracing::info!(size = %update.preview_size, changed = update.size_changed, "rotated");
    }
    pipeline.set_frame_sink_enabled(true)?;
    pipeline.pump()?;

    let metrics = pipeline.metrics();
    tracing::info!(
        reconciles = metrics.reconciles.get(),
        reconfigures = metrics.reconfigure.total_samples(),
        "shutting down"
    );
    pipeline.close()?;
    Ok(())
}
