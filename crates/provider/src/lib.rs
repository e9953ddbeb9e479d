#![doc = include_str!("../README.md")]

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use viewfinder_core::prelude::{MailboxSender, Rotation90, Size};

pub mod virtual_backend;

/// Stable identifier for a camera device.
///
/// # Example
/// ```rust
/// use viewfinder_provider::prelude::DeviceId;
///
/// let id = DeviceId::from("back");
/// assert_eq!(id.as_str(), "back");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceId(String);

impl DeviceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Native output target lent to a capture session.
///
/// A surface is owned by its originating consumer; the handle is reference
/// counted so the pipeline can retire it through a release queue without
/// invalidating the consumer's copy. `release` is observable, which lets the
/// virtual provider reject requests that target an already-released surface.
///
/// # Example
/// ```rust
/// use viewfinder_provider::prelude::Surface;
///
/// let surface = Surface::new();
/// assert!(!surface.is_released());
/// surface.release();
/// assert!(surface.is_released());
/// ```
#[derive(Debug, Clone)]
pub struct Surface {
    id: u64,
    released: Arc<AtomicBool>,
}

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

impl Surface {
    /// Allocate a fresh native handle.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            id: NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Mark the native resource as freed.
    pub fn release(&self) {
        self.released.store(true, Ordering::Release);
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl PartialEq for Surface {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Surface {}

/// Opaque handle for an open device. Owned exclusively by the controller.
#[derive(Debug)]
pub struct DeviceHandle {
    device: DeviceId,
    serial: u64,
}

impl DeviceHandle {
    pub fn new(device: DeviceId, serial: u64) -> Self {
        Self { device, serial }
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }
}

/// Identifier of a configured capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Asynchronous notifications posted by a provider into the controller
/// mailbox.
///
/// `ticket` stamps configure outcomes with the liveness generation the
/// request was issued under; the controller drops stale completions after a
/// close or reopen.
///
/// Configure outcomes and device errors are lifecycle events and must be
/// posted with `post_control`, so a frame backlog filling the mailbox can
/// never swallow them. Frames use plain `post` and may be dropped under
/// backlog.
#[derive(Debug)]
pub enum ProviderEvent {
    /// The requested session is configured and ready for requests.
    SessionConfigured { ticket: u64, session: SessionId },
    /// Session configuration failed.
    SessionConfigureFailed { ticket: u64, reason: String },
    /// A decoded frame arrived on the frame-sink target.
    FrameAvailable { bytes: Vec<u8> },
    /// The device reported an asynchronous error.
    DeviceError { reason: String },
}

/// Sender half handed to a provider when opening a device.
pub type ProviderEventSender = MailboxSender<ProviderEvent>;

/// Errors returned by provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("device {0} not found")]
    DeviceNotFound(DeviceId),
    #[error("no capability map available for device {0}")]
    CapabilityQueryFailed(DeviceId),
    #[error("hardware access failed: {0}")]
    HardwareAccess(String),
    #[error("capture API unsupported on this platform")]
    ApiUnsupported,
    #[error("unknown capture session {0}")]
    UnknownSession(SessionId),
}

/// Hardware capability and resource provider.
///
/// Session configuration is asynchronous: `create_capture_session` returns as
/// soon as the request is accepted, and the outcome arrives later as a
/// `ProviderEvent` on the mailbox registered at `open_device`.
///
/// # Example
/// ```rust
/// use viewfinder_provider::prelude::*;
/// use viewfinder_core::prelude::*;
///
/// let provider = VirtualProvider::new().with_device(VirtualDevice::back_camera());
/// let sizes = provider.list_output_sizes(&DeviceId::from("back")).unwrap();
/// assert!(!sizes.is_empty());
/// ```
pub trait CameraProvider: Send + Sync {
    /// Supported output sizes, sorted by resolution descending.
    fn list_output_sizes(&self, device: &DeviceId) -> Result<Vec<Size>, ProviderError>;

    /// Mounting orientation of the sensor.
    fn sensor_orientation(&self, device: &DeviceId) -> Result<Rotation90, ProviderError>;

    /// Open a device; asynchronous notifications go to `events`.
    fn open_device(
        &self,
        device: &DeviceId,
        events: ProviderEventSender,
    ) -> Result<DeviceHandle, ProviderError>;

    /// Request a capture session over the given targets.
    ///
    /// Completion is delivered as `SessionConfigured` / `SessionConfigureFailed`
    /// stamped with `ticket`, posted on the mailbox control lane.
    fn create_capture_session(
        &self,
        handle: &DeviceHandle,
        targets: &[Surface],
        ticket: u64,
    ) -> Result<(), ProviderError>;

    /// Replace the standing repeating request for a configured session.
    fn submit_repeating_request(
        &self,
        session: SessionId,
        targets: &[Surface],
    ) -> Result<(), ProviderError>;

    /// Abort in-flight captures for a session.
    fn abort_captures(&self, session: SessionId) -> Result<(), ProviderError>;

    /// Close the device, invalidating its handle.
    fn close_device(&self, handle: DeviceHandle) -> Result<(), ProviderError>;
}

pub mod prelude {
    pub use crate::{
        virtual_backend::{VirtualDevice, VirtualProvider},
        CameraProvider, DeviceHandle, DeviceId, ProviderError, ProviderEvent,
        ProviderEventSender, SessionId, Surface,
    };
}
