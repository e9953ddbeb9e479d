//! Single-threaded pipeline controller.
//!
//! All pipeline state lives behind one lifecycle lock and is only mutated by
//! the thread that calls into the controller. Hardware callbacks never touch
//! state directly; providers post events into a bounded mailbox that
//! [`CameraPipeline::pump`] drains on the controller thread.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, info, warn};
use viewfinder_core::prelude::{
    mailbox, LatestSlot, MailboxReceiver, Rotation90, RotationState, Size, ViewportGeometry,
};
use viewfinder_provider::prelude::{
    CameraProvider, DeviceHandle, DeviceId, ProviderEvent, SessionId, Surface,
};

use crate::{
    config::PipelineConfig,
    error::PipelineError,
    metrics::PipelineMetrics,
    reconcile::{SessionReconciler, SurfaceRole},
    selector::choose_preview_size,
    viewport::{compute, ViewportTransform},
};

/// Upper bound on undrained provider events; hardware callbacks never block.
const EVENT_MAILBOX_CAPACITY: usize = 32;

/// How long lifecycle operations wait for the state lock before giving up.
/// Exceeding this means a callback deadlocked or a pump call is wedged.
const LIFECYCLE_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Pipeline status callbacks.
///
/// All methods run on the thread currently driving the pipeline and must not
/// call back into it. Every method has a no-op default.
#[allow(unused_variables)]
pub trait PipelineObserver: Send {
    /// The device was opened and capabilities were queried.
    fn on_opened(&mut self, device: &DeviceId) {}

    /// A (new) output size was chosen for the current viewport. The embedder
    /// allocates a matching buffer and calls
    /// [`CameraPipeline::set_viewport_surface`].
    fn on_preview_size_chosen(&mut self, device: &DeviceId, size: Size) {}

    /// The render transform was recomputed after a layout or rotation change.
    fn on_viewport_transform(&mut self, transform: &ViewportTransform) {}

    /// The capture session is configured and streaming.
    fn on_session_active(&mut self, session: SessionId) {}

    /// A decoded frame arrived on the frame-sink target.
    fn on_frame(&mut self, frame: &[u8]) {}

    /// An asynchronous failure was observed. Nothing is retried
    /// automatically; the pipeline stays usable unless the error is fatal.
    fn on_error(&mut self, error: &PipelineError) {}

    /// The device was closed and every surface released.
    fn on_closed(&mut self, device: &DeviceId) {}
}

/// Outcome of a layout or rotation change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportUpdate {
    /// Output size the hardware should produce for the current viewport.
    pub preview_size: Size,
    /// Whether `preview_size` differs from the previous choice.
    pub size_changed: bool,
    /// Transform the viewport widget applies when rendering the buffer.
    pub transform: ViewportTransform,
}

struct OpenState {
    handle: DeviceHandle,
    events: MailboxReceiver<ProviderEvent>,
    reconciler: SessionReconciler,
    sizes: Vec<Size>,
    rotation: RotationState,
    viewport: Option<(u32, u32)>,
    geometry: ViewportGeometry,
    preview_size: Option<Size>,
    configure_started: Option<Instant>,
    last_frame_at: Option<Instant>,
}

/// Camera preview pipeline over a [`CameraProvider`].
///
/// Owns the open device, the output-size choice, the viewport transform, and
/// the capture-session reconciliation. One instance drives one device.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use viewfinder::prelude::*;
/// use viewfinder_core::prelude::Rotation90;
/// use viewfinder_provider::prelude::*;
///
/// struct Quiet;
/// impl PipelineObserver for Quiet {}
///
/// let provider = Arc::new(VirtualProvider::new().with_device(VirtualDevice::back_camera()));
/// let pipeline = CameraPipeline::new(provider, PipelineConfig::default(), Quiet);
/// pipeline.open(&DeviceId::from("back"), Rotation90::Deg0).unwrap();
/// assert!(pipeline.is_open());
/// ```
pub struct CameraPipeline<P: CameraProvider> {
    provider: Arc<P>,
    config: PipelineConfig,
    state: parking_lot::Mutex<Option<OpenState>>,
    observer: parking_lot::Mutex<Box<dyn PipelineObserver>>,
    /// Liveness generation. Bumped on every open and close; provider events
    /// stamped with an older ticket are dropped.
    generation: AtomicU64,
    metrics: PipelineMetrics,
    latest_frame: LatestSlot<Vec<u8>>,
}

impl<P: CameraProvider> CameraPipeline<P> {
    pub fn new<O>(provider: Arc<P>, config: PipelineConfig, observer: O) -> Self
    where
        O: PipelineObserver + 'static,
    {
        Self {
            provider,
            config,
            state: parking_lot::Mutex::new(None),
            observer: parking_lot::Mutex::new(Box::new(observer)),
            generation: AtomicU64::new(0),
            metrics: PipelineMetrics::default(),
            latest_frame: LatestSlot::new(),
        }
    }

    /// Query capabilities and open the device. An already open device is
    /// closed first.
    pub fn open(&self, device: &DeviceId, rotation: Rotation90) -> Result<(), PipelineError> {
        let mut guard = self.lock_lifecycle()?;
        if let Some(state) = guard.take() {
            self.teardown(state);
        }

        let sizes = self.provider.list_output_sizes(device)?;
        let sensor = self.provider.sensor_orientation(device)?;
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = mailbox(EVENT_MAILBOX_CAPACITY);
        let handle = self.provider.open_device(device, tx)?;
        info!(%device, ticket, sensor = %sensor, "camera device opened");

        *guard = Some(OpenState {
            handle,
            events: rx,
            reconciler: SessionReconciler::new(),
            sizes,
            rotation: RotationState {
                device: rotation,
                extra: self.config.extra_rotation,
                sensor,
            },
            viewport: None,
            geometry: ViewportGeometry::new(0, 0),
            preview_size: None,
            configure_started: None,
            last_frame_at: None,
        });
        self.observer.lock().on_opened(device);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Output size currently requested from the hardware, if one was chosen.
    pub fn preview_size(&self) -> Option<Size> {
        self.state.lock().as_ref().and_then(|s| s.preview_size)
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Newest decoded frame, leaving the slot empty.
    pub fn latest_frame(&self) -> Option<Vec<u8>> {
        self.latest_frame.take()
    }

    /// Record the viewport's final measured dimensions and layout geometry.
    ///
    /// Re-chooses the output size and recomputes the render transform.
    /// Called after every layout pass; cheap and idempotent for unchanged
    /// inputs.
    pub fn viewport_resized(
        &self,
        width: u32,
        height: u32,
        geometry: ViewportGeometry,
    ) -> Result<ViewportUpdate, PipelineError> {
        let mut guard = self.lock_lifecycle()?;
        let state = guard.as_mut().ok_or(PipelineError::NotOpen)?;
        state.viewport = Some((width, height));
        state.geometry = geometry;
        self.layout_update(state, width, height)
    }

    /// Record a physical device rotation change.
    ///
    /// Returns the refreshed layout outcome when viewport dimensions are
    /// already known.
    pub fn set_device_rotation(
        &self,
        rotation: Rotation90,
    ) -> Result<Option<ViewportUpdate>, PipelineError> {
        let mut guard = self.lock_lifecycle()?;
        let state = guard.as_mut().ok_or(PipelineError::NotOpen)?;
        state.rotation.device = rotation;
        match state.viewport {
            Some((width, height)) => Ok(Some(self.layout_update(state, width, height)?)),
            None => Ok(None),
        }
    }

    /// Attach or detach the on-screen preview surface.
    pub fn set_viewport_surface(&self, surface: Option<Surface>) -> Result<(), PipelineError> {
        self.update_surface(SurfaceRole::Viewport, surface)
    }

    /// Enable or disable the raw-frame consumer target. Idempotent: repeat
    /// calls in the same direction keep the existing sink surface.
    pub fn set_frame_sink_enabled(&self, enabled: bool) -> Result<(), PipelineError> {
        let mut guard = self.lock_lifecycle()?;
        let state = guard.as_mut().ok_or(PipelineError::NotOpen)?;
        if enabled == state.reconciler.has_surface(SurfaceRole::FrameSink) {
            return Ok(());
        }
        let surface = enabled.then(Surface::new);
        if state.reconciler.set_surface(SurfaceRole::FrameSink, surface) {
            self.reconcile_now(state)?;
        }
        Ok(())
    }

    /// Drain queued provider events on the controller thread.
    ///
    /// Returns the number of events handled. Asynchronous failures go to the
    /// observer rather than the return value; only a missing pipeline or a
    /// wedged lifecycle lock error out.
    pub fn pump(&self) -> Result<usize, PipelineError> {
        let mut guard = self.lock_lifecycle()?;
        let state = guard.as_mut().ok_or(PipelineError::NotOpen)?;
        let generation = self.generation.load(Ordering::SeqCst);

        let mut handled = 0;
        while let Some(event) = state.events.poll() {
            handled += 1;
            match event {
                ProviderEvent::SessionConfigured { ticket, session } => {
                    if ticket != generation {
                        // Superseded by a close or reopen. The session is
                        // real hardware state, so stop its captures.
                        debug!(%session, ticket, generation, "dropping stale configure");
                        let _ = self.provider.abort_captures(session);
                        self.metrics.stale_events.incr();
                        continue;
                    }
                    if let Some(started) = state.configure_started.take() {
                        self.metrics.reconfigure.record(started.elapsed());
                    }
                    match state.reconciler.on_configured(
                        self.provider.as_ref(),
                        &state.handle,
                        session,
                        generation,
                    ) {
                        Ok(()) => {
                            if state.reconciler.is_in_flight() {
                                // The completion immediately launched a
                                // rebuild against newer requirements.
                                state.configure_started = Some(Instant::now());
                            } else {
                                self.observer.lock().on_session_active(session);
                            }
                        }
                        Err(err) => {
                            warn!(%session, %err, "activating configured session failed");
                            self.observer.lock().on_error(&err);
                        }
                    }
                }
                ProviderEvent::SessionConfigureFailed { ticket, reason } => {
                    if ticket != generation {
                        self.metrics.stale_events.incr();
                        continue;
                    }
                    state.configure_started = None;
                    let err = state.reconciler.on_configure_failed(reason);
                    warn!(%err, "capture session configuration failed");
                    self.observer.lock().on_error(&err);
                }
                ProviderEvent::FrameAvailable { bytes } => {
                    let now = Instant::now();
                    if let Some(previous) = state.last_frame_at.replace(now) {
                        self.metrics.frames.record(now - previous);
                    }
                    self.observer.lock().on_frame(&bytes);
                    self.latest_frame.store(bytes);
                }
                ProviderEvent::DeviceError { reason } => {
                    let err = PipelineError::HardwareAccess(reason);
                    warn!(%err, "device reported asynchronous error");
                    self.observer.lock().on_error(&err);
                }
            }
        }
        Ok(handled)
    }

    /// Close the device and release every surface.
    ///
    /// Supersedes any in-flight configure: its completion will carry a stale
    /// ticket and be dropped by `pump` after a reopen.
    pub fn close(&self) -> Result<(), PipelineError> {
        let mut guard = self.lock_lifecycle()?;
        if let Some(state) = guard.take() {
            let device = state.handle.device_id().clone();
            self.teardown(state);
            self.observer.lock().on_closed(&device);
        }
        Ok(())
    }

    fn teardown(&self, mut state: OpenState) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        state.reconciler.close(self.provider.as_ref());
        if let Err(err) = self.provider.close_device(state.handle) {
            warn!(%err, "closing device failed");
        }
        self.latest_frame.take();
        info!("camera device closed");
    }

    fn lock_lifecycle(
        &self,
    ) -> Result<parking_lot::MutexGuard<'_, Option<OpenState>>, PipelineError> {
        self.state
            .try_lock_for(LIFECYCLE_LOCK_TIMEOUT)
            .ok_or(PipelineError::LifecycleLockTimeout)
    }

    fn update_surface(
        &self,
        role: SurfaceRole,
        surface: Option<Surface>,
    ) -> Result<(), PipelineError> {
        let mut guard = self.lock_lifecycle()?;
        let state = guard.as_mut().ok_or(PipelineError::NotOpen)?;
        if state.reconciler.set_surface(role, surface) {
            self.reconcile_now(state)?;
        }
        Ok(())
    }

    fn reconcile_now(&self, state: &mut OpenState) -> Result<(), PipelineError> {
        self.metrics.reconciles.incr();
        let ticket = self.generation.load(Ordering::SeqCst);
        let was_in_flight = state.reconciler.is_in_flight();
        state
            .reconciler
            .reconcile(self.provider.as_ref(), &state.handle, ticket)?;
        if !was_in_flight && state.reconciler.is_in_flight() {
            state.configure_started = Some(Instant::now());
        }
        debug!(state = ?state.reconciler.state(), "reconcile pass complete");
        Ok(())
    }

    fn layout_update(
        &self,
        state: &mut OpenState,
        width: u32,
        height: u32,
    ) -> Result<ViewportUpdate, PipelineError> {
        let preview_size = choose_preview_size(
            &state.sizes,
            width,
            height,
            &state.rotation,
            self.config.preferred_size,
            self.config.lower_area_ratio,
            self.config.upper_area_ratio,
        )?;
        let size_changed = state.preview_size != Some(preview_size);
        state.preview_size = Some(preview_size);

        let mut transform = compute(
            width,
            height,
            &state.rotation,
            self.config.never_distorted,
            &state.geometry,
        );
        if self.config.mirror {
            transform
                .matrix
                .post_scale(-1.0, 1.0, width as f32 / 2.0, height as f32 / 2.0);
        }
        debug!(%preview_size, size_changed, width, height, "viewport layout updated");

        let mut observer = self.observer.lock();
        if size_changed {
            observer.on_preview_size_chosen(state.handle.device_id(), preview_size);
        }
        observer.on_viewport_transform(&transform);
        Ok(ViewportUpdate {
            preview_size,
            size_changed,
            transform,
        })
    }
}

impl<P: CameraProvider> Drop for CameraPipeline<P> {
    fn drop(&mut self) {
        if let Some(state) = self.state.get_mut().take() {
            self.teardown(state);
        }
    }
}

/// Spawn a named controller-side worker thread.
///
/// Embedders typically run one worker that pumps the pipeline at their frame
/// cadence.
pub fn spawn_worker<F>(name: &str, body: F) -> std::io::Result<thread::JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(format!("viewfinder-{name}"))
        .spawn(body)
}
