//! In-process provider with a scripted device table, used by tests and demos.

use std::collections::HashMap;

use tracing::debug;
use viewfinder_core::prelude::{Rotation90, Size};

use crate::{
    CameraProvider, DeviceHandle, DeviceId, ProviderError, ProviderEvent, ProviderEventSender,
    SessionId, Surface,
};

/// Scripted device entry for the virtual provider.
#[derive(Debug, Clone)]
pub struct VirtualDevice {
    pub id: DeviceId,
    pub sizes: Vec<Size>,
    pub orientation: Rotation90,
}

impl VirtualDevice {
    pub fn new(id: impl Into<DeviceId>, sizes: Vec<Size>, orientation: Rotation90) -> Self {
        Self {
            id: id.into(),
            sizes,
            orientation,
        }
    }

    /// A typical rear module: landscape sensor mounted at 90 degrees.
    pub fn back_camera() -> Self {
        let sizes = [
            (1920, 1080),
            (1280, 720),
            (640, 480),
            (320, 240),
        ]
        .iter()
        .filter_map(|&(w, h)| Size::new(w, h))
        .collect();
        Self::new("back", sizes, Rotation90::Deg90)
    }
}

#[derive(Debug)]
struct PendingConfigure {
    ticket: u64,
    targets: Vec<Surface>,
}

#[derive(Default)]
struct State {
    devices: Vec<VirtualDevice>,
    events: Option<ProviderEventSender>,
    open_serial: Option<u64>,
    next_serial: u64,
    auto_configure: bool,
    deny_permission: bool,
    pending: Option<PendingConfigure>,
    sessions: HashMap<u64, Vec<Surface>>,
    next_session: u64,
    created_sessions: u64,
    repeating_log: Vec<Vec<u64>>,
    aborted: Vec<SessionId>,
}

/// Virtual hardware resource provider.
///
/// Configuration outcomes can be delivered immediately (`auto_configure`,
/// the default) or held until the test calls `complete_configure` /
/// `fail_configure`, which makes in-flight coalescing observable.
///
/// # Example
/// ```rust
/// use viewfinder_core::prelude::mailbox;
/// use viewfinder_provider::prelude::*;
///
/// let provider = VirtualProvider::new().with_device(VirtualDevice::back_camera());
/// let (tx, rx) = mailbox(16);
/// let handle = provider.open_device(&DeviceId::from("back"), tx).unwrap();
/// let surface = Surface::new();
/// provider.create_capture_session(&handle, &[surface], 1).unwrap();
/// assert!(matches!(rx.poll(), Some(ProviderEvent::SessionConfigured { .. })));
/// ```
pub struct VirtualProvider {
    state: parking_lot::Mutex<State>,
}

impl Default for VirtualProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualProvider {
    pub fn new() -> Self {
        Self {
            state: parking_lot::Mutex::new(State {
                auto_configure: true,
                next_serial: 1,
                next_session: 1,
                ..State::default()
            }),
        }
    }

    pub fn with_device(self, device: VirtualDevice) -> Self {
        self.state.lock().devices.push(device);
        self
    }

    pub fn add_device(&self, device: VirtualDevice) {
        self.state.lock().devices.push(device);
    }

    /// When disabled, configure requests stay pending until completed manually.
    pub fn set_auto_configure(&self, enabled: bool) {
        self.state.lock().auto_configure = enabled;
    }

    /// Make subsequent opens fail with `PermissionDenied`.
    pub fn deny_permission(&self, deny: bool) {
        self.state.lock().deny_permission = deny;
    }

    /// Deliver success for the pending configure request, if any.
    ///
    /// Returns the new session id, or `None` when nothing was pending.
    pub fn complete_configure(&self) -> Option<SessionId> {
        let mut state = self.state.lock();
        let pending = state.pending.take()?;
        Some(Self::finish_configure(&mut state, pending))
    }

    /// Deliver failure for the pending configure request, if any.
    pub fn fail_configure(&self, reason: &str) -> bool {
        let mut state = self.state.lock();
        let Some(pending) = state.pending.take() else {
            return false;
        };
        if let Some(events) = &state.events {
            events.post_control(ProviderEvent::SessionConfigureFailed {
                ticket: pending.ticket,
                reason: reason.to_string(),
            });
        }
        true
    }

    /// Post a decoded frame to the registered mailbox.
    pub fn emit_frame(&self, bytes: Vec<u8>) {
        let state = self.state.lock();
        if let Some(events) = &state.events {
            events.post(ProviderEvent::FrameAvailable { bytes });
        }
    }

    /// Post an asynchronous device error.
    pub fn emit_device_error(&self, reason: &str) {
        let state = self.state.lock();
        if let Some(events) = &state.events {
            events.post_control(ProviderEvent::DeviceError {
                reason: reason.to_string(),
            });
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open_serial.is_some()
    }

    /// Total sessions ever configured.
    pub fn created_sessions(&self) -> u64 {
        self.state.lock().created_sessions
    }

    /// Surface ids of the configure request currently awaiting completion.
    pub fn pending_configure_targets(&self) -> Option<Vec<u64>> {
        self.state
            .lock()
            .pending
            .as_ref()
            .map(|p| p.targets.iter().map(Surface::id).collect())
    }

    /// Surface ids of every repeating request submitted, oldest first.
    pub fn repeating_log(&self) -> Vec<Vec<u64>> {
        self.state.lock().repeating_log.clone()
    }

    /// Sessions whose captures were aborted.
    pub fn aborted_sessions(&self) -> Vec<SessionId> {
        self.state.lock().aborted.clone()
    }

    /// Surface ids the given session was built with.
    pub fn session_targets(&self, session: SessionId) -> Option<Vec<u64>> {
        self.state
            .lock()
            .sessions
            .get(&session.0)
            .map(|targets| targets.iter().map(Surface::id).collect())
    }

    fn finish_configure(state: &mut State, pending: PendingConfigure) -> SessionId {
        let session = SessionId(state.next_session);
        state.next_session += 1;
        state.created_sessions += 1;
        state.sessions.insert(session.0, pending.targets);
        debug!(session = session.0, ticket = pending.ticket, "virtual session configured");
        if let Some(events) = &state.events {
            events.post_control(ProviderEvent::SessionConfigured {
                ticket: pending.ticket,
                session,
            });
        }
        session
    }

    fn find_device<'a>(
        state: &'a State,
        device: &DeviceId,
    ) -> Result<&'a VirtualDevice, ProviderError> {
        state
            .devices
            .iter()
            .find(|d| &d.id == device)
            .ok_or_else(|| ProviderError::DeviceNotFound(device.clone()))
    }
}

impl CameraProvider for VirtualProvider {
    fn list_output_sizes(&self, device: &DeviceId) -> Result<Vec<Size>, ProviderError> {
        let state = self.state.lock();
        Ok(Self::find_device(&state, device)?.sizes.clone())
    }

    fn sensor_orientation(&self, device: &DeviceId) -> Result<Rotation90, ProviderError> {
        let state = self.state.lock();
        Ok(Self::find_device(&state, device)?.orientation)
    }

    fn open_device(
        &self,
        device: &DeviceId,
        events: ProviderEventSender,
    ) -> Result<DeviceHandle, ProviderError> {
        let mut state = self.state.lock();
        if state.deny_permission {
            return Err(ProviderError::PermissionDenied);
        }
        Self::find_device(&state, device)?;
        let serial = state.next_serial;
        state.next_serial += 1;
        state.open_serial = Some(serial);
        state.events = Some(events);
        debug!(device = %device, serial, "virtual device opened");
        Ok(DeviceHandle::new(device.clone(), serial))
    }

    fn create_capture_session(
        &self,
        handle: &DeviceHandle,
        targets: &[Surface],
        ticket: u64,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        if state.open_serial != Some(handle.serial()) {
            return Err(ProviderError::HardwareAccess("device is not open".into()));
        }
        if targets.is_empty() {
            return Err(ProviderError::HardwareAccess(
                "session needs at least one target".into(),
            ));
        }
        if let Some(released) = targets.iter().find(|s| s.is_released()) {
            return Err(ProviderError::HardwareAccess(format!(
                "surface {} already released",
                released.id()
            )));
        }
        if state.pending.is_some() {
            // The pipeline coalesces; a second outstanding configure is a bug.
            return Err(ProviderError::HardwareAccess(
                "configure already in flight".into(),
            ));
        }
        let pending = PendingConfigure {
            ticket,
            targets: targets.to_vec(),
        };
        if state.auto_configure {
            Self::finish_configure(&mut state, pending);
        } else {
            state.pending = Some(pending);
        }
        Ok(())
    }

    fn submit_repeating_request(
        &self,
        session: SessionId,
        targets: &[Surface],
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        let built_with = state
            .sessions
            .get(&session.0)
            .ok_or(ProviderError::UnknownSession(session))?;
        for target in targets {
            if target.is_released() {
                return Err(ProviderError::HardwareAccess(format!(
                    "surface {} already released",
                    target.id()
                )));
            }
            if !built_with.contains(target) {
                return Err(ProviderError::HardwareAccess(format!(
                    "surface {} is not a target of {session}",
                    target.id()
                )));
            }
        }
        let ids = targets.iter().map(Surface::id).collect();
        state.repeating_log.push(ids);
        Ok(())
    }

    fn abort_captures(&self, session: SessionId) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        if !state.sessions.contains_key(&session.0) {
            return Err(ProviderError::UnknownSession(session));
        }
        state.aborted.push(session);
        Ok(())
    }

    fn close_device(&self, handle: DeviceHandle) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        // A configure request already accepted can still complete after the
        // close; `pending` survives so tests can deliver that late outcome.
        if state.open_serial == Some(handle.serial()) {
            state.open_serial = None;
            debug!(device = %handle.device_id(), "virtual device closed");
        }
        Ok(())
    }
}
