use viewfinder_provider::ProviderError;

/// Errors surfaced by the preview pipeline.
///
/// Nothing here is retried automatically. Permission, capability, and access
/// failures need external intervention; `SessionConfigurationFailed` leaves
/// the pipeline recoverable so a later surface change can reconcile again.
///
/// # Example
/// ```rust
/// use viewfinder::PipelineError;
///
/// let err = PipelineError::NoSupportedSize;
/// assert_eq!(err.code(), "no_supported_size");
/// assert!(!err.is_fatal());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("camera device {0} not found")]
    DeviceNotFound(String),
    #[error("no capability map available for device {0}")]
    CapabilityQueryFailed(String),
    #[error("hardware access error: {0}")]
    HardwareAccess(String),
    #[error("capture API unsupported on this platform")]
    ApiUnsupported,
    #[error("capture session configuration failed: {0}")]
    SessionConfigurationFailed(String),
    #[error("no supported output size for device")]
    NoSupportedSize,
    #[error("pipeline is not open")]
    NotOpen,
    #[error("timed out acquiring the pipeline lifecycle lock")]
    LifecycleLockTimeout,
}

impl PipelineError {
    /// Stable string code for error classification.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::PermissionDenied => "permission_denied",
            PipelineError::DeviceNotFound(_) => "device_not_found",
            PipelineError::CapabilityQueryFailed(_) => "capability_query_failed",
            PipelineError::HardwareAccess(_) => "hardware_access",
            PipelineError::ApiUnsupported => "api_unsupported",
            PipelineError::SessionConfigurationFailed(_) => "session_configuration_failed",
            PipelineError::NoSupportedSize => "no_supported_size",
            PipelineError::NotOpen => "not_open",
            PipelineError::LifecycleLockTimeout => "lifecycle_lock_timeout",
        }
    }

    /// Whether a later, client-triggered attempt can succeed without
    /// external intervention.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::HardwareAccess(_) | PipelineError::SessionConfigurationFailed(_)
        )
    }

    /// Whether the pipeline instance must be torn down.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::LifecycleLockTimeout)
    }
}

impl From<ProviderError> for PipelineError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::PermissionDenied => PipelineError::PermissionDenied,
            ProviderError::DeviceNotFound(id) => PipelineError::DeviceNotFound(id.to_string()),
            ProviderError::CapabilityQueryFailed(id) => {
                PipelineError::CapabilityQueryFailed(id.to_string())
            }
            ProviderError::HardwareAccess(reason) => PipelineError::HardwareAccess(reason),
            ProviderError::ApiUnsupported => PipelineError::ApiUnsupported,
            ProviderError::UnknownSession(session) => {
                PipelineError::HardwareAccess(format!("unknown capture session {session}"))
            }
        }
    }
}
