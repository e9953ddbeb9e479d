//! Reconciliation of required output targets against the capture session.

use smallvec::SmallVec;
use tracing::{debug, warn};
use viewfinder_provider::{CameraProvider, DeviceHandle, SessionId, Surface};

use crate::error::PipelineError;

/// Logical role of an output target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceRole {
    /// On-screen preview surface.
    Viewport,
    /// Raw-frame consumer surface.
    FrameSink,
}

/// Capture session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uncreated,
    Configuring,
    Active,
    Closed,
}

type SurfaceSet = SmallVec<[Surface; 2]>;

/// Owns the role→surface mapping and decides between re-issuing the standing
/// request on the active session and tearing the session down for a rebuild.
///
/// Session creation is asynchronous and expensive, and some hardware rejects
/// resubmission against a stale surface set, so reuse is only allowed when
/// the active session still contains every required surface. Retired
/// surfaces wait in a release queue until no request references them.
pub(crate) struct SessionReconciler {
    required: SmallVec<[(SurfaceRole, Surface); 2]>,
    /// Surfaces the currently active session was built with. Resubmission is
    /// legal exactly while this is a superset of the required set.
    active: SurfaceSet,
    /// Targets of the standing repeating request. A retired surface stays in
    /// the release queue while a request still points at it.
    streaming: SurfaceSet,
    /// Targets of the configure request in flight, if any. Doubles as the
    /// single in-flight flag: concurrent triggers coalesce on it.
    in_flight: Option<SurfaceSet>,
    session: Option<SessionId>,
    state: SessionState,
    pending_release: SurfaceSet,
}

impl SessionReconciler {
    pub(crate) fn new() -> Self {
        Self {
            required: SmallVec::new(),
            active: SurfaceSet::new(),
            streaming: SurfaceSet::new(),
            in_flight: None,
            session: None,
            state: SessionState::Uncreated,
            pending_release: SurfaceSet::new(),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether a surface is currently required for the given role.
    pub(crate) fn has_surface(&self, role: SurfaceRole) -> bool {
        self.required.iter().any(|(r, _)| *r == role)
    }

    /// Update the required set. A replaced or removed surface is queued for
    /// release, never freed while a request may still reference it.
    ///
    /// Returns whether the set changed.
    pub(crate) fn set_surface(&mut self, role: SurfaceRole, surface: Option<Surface>) -> bool {
        let existing = self.required.iter().position(|(r, _)| *r == role);
        match (existing, surface) {
            (Some(index), Some(new)) => {
                if self.required[index].1 == new {
                    return false;
                }
                let (_, old) = std::mem::replace(&mut self.required[index], (role, new));
                self.pending_release.push(old);
                true
            }
            (Some(index), None) => {
                let (_, old) = self.required.remove(index);
                self.pending_release.push(old);
                true
            }
            (None, Some(new)) => {
                self.required.push((role, new));
                true
            }
            (None, None) => false,
        }
    }

    fn required_surfaces(&self) -> SurfaceSet {
        self.required.iter().map(|(_, s)| s.clone()).collect()
    }

    fn covers(held: &SurfaceSet, wanted: &SurfaceSet) -> bool {
        wanted.iter().all(|surface| held.contains(surface))
    }

    /// Drive the session towards the required set.
    pub(crate) fn reconcile(
        &mut self,
        provider: &dyn CameraProvider,
        handle: &DeviceHandle,
        ticket: u64,
    ) -> Result<(), PipelineError> {
        let required = self.required_surfaces();

        // No consumers: stop streaming and let retired surfaces go.
        if required.is_empty() {
            if let Some(session) = self.session {
                if let Err(err) = provider.abort_captures(session) {
                    warn!(%session, %err, "abort on empty target set failed");
                }
                // Nothing streams until a surface returns; the next
                // reconcile rebuilds from scratch.
                self.active.clear();
                self.streaming.clear();
            }
            self.flush_pending_release();
            return Ok(());
        }

        // The active session still contains every required surface: re-issue
        // the standing request instead of rebuilding.
        if let Some(session) = self.session {
            if self.state == SessionState::Active && Self::covers(&self.active, &required) {
                provider.submit_repeating_request(session, &required)?;
                self.streaming = required.clone();
                // Only now is it safe to free retired surfaces; no request
                // points at them anymore.
                self.flush_pending_release();
                debug!(%session, targets = required.len(), "repeating request reissued");
                return Ok(());
            }
        }

        // Full rebuild. A configure already in flight absorbs this trigger:
        // its completion re-reads the required set.
        if self.in_flight.is_some() {
            debug!("reconcile coalesced into in-flight configure");
            return Ok(());
        }
        self.in_flight = Some(required.clone());
        self.state = SessionState::Configuring;
        if let Err(err) = provider.create_capture_session(handle, &required, ticket) {
            self.in_flight = None;
            self.state = if self.session.is_some() {
                SessionState::Active
            } else {
                SessionState::Uncreated
            };
            return Err(err.into());
        }
        debug!(targets = required.len(), ticket, "capture session requested");
        Ok(())
    }

    /// Handle a successful configure notification.
    ///
    /// Reads the required set as it is *now*; if it moved on while the
    /// configure was in flight, a fresh rebuild is started immediately (still
    /// at most one outstanding).
    pub(crate) fn on_configured(
        &mut self,
        provider: &dyn CameraProvider,
        handle: &DeviceHandle,
        session: SessionId,
        ticket: u64,
    ) -> Result<(), PipelineError> {
        let built = self.in_flight.take().unwrap_or_default();
        self.session = Some(session);
        let required = self.required_surfaces();

        if required.is_empty() {
            // Every consumer detached while configuring.
            self.active.clear();
            self.streaming.clear();
            self.state = SessionState::Active;
            if let Err(err) = provider.abort_captures(session) {
                warn!(%session, %err, "abort after late configure failed");
            }
            self.flush_pending_release();
            return Ok(());
        }

        if Self::covers(&built, &required) {
            self.active = built;
            self.state = SessionState::Active;
            provider.submit_repeating_request(session, &required)?;
            self.streaming = required;
            self.flush_pending_release();
            debug!(%session, ticket, "capture session active");
            return Ok(());
        }

        // The required set changed under the configure; this session is
        // already stale. Rebuild against current state.
        debug!(%session, "required surfaces changed in flight; rebuilding");
        self.active.clear();
        self.streaming.clear();
        self.state = SessionState::Active;
        self.reconcile(provider, handle, ticket)
    }

    /// Handle a failed configure notification.
    ///
    /// Leaves the pipeline recoverable: the active set is untouched and no
    /// automatic retry is attempted.
    pub(crate) fn on_configure_failed(&mut self, reason: String) -> PipelineError {
        self.in_flight = None;
        self.state = if self.session.is_some() {
            SessionState::Active
        } else {
            SessionState::Uncreated
        };
        PipelineError::SessionConfigurationFailed(reason)
    }

    /// Tear everything down. Supersedes any in-flight configure; the caller
    /// invalidates its ticket so late completions become no-ops.
    pub(crate) fn close(&mut self, provider: &dyn CameraProvider) {
        if let Some(session) = self.session.take() {
            if let Err(err) = provider.abort_captures(session) {
                warn!(%session, %err, "abort during close failed");
            }
        }
        for (_, surface) in self.required.drain(..) {
            surface.release();
        }
        for surface in self.active.drain(..) {
            surface.release();
        }
        for surface in self.streaming.drain(..) {
            surface.release();
        }
        if let Some(targets) = self.in_flight.take() {
            for surface in targets {
                surface.release();
            }
        }
        for surface in self.pending_release.drain(..) {
            surface.release();
        }
        self.state = SessionState::Closed;
    }

    /// Release retired surfaces that no request references anymore.
    fn flush_pending_release(&mut self) {
        let streaming = &self.streaming;
        let in_flight = &self.in_flight;
        self.pending_release.retain(|surface| {
            let referenced = streaming.contains(surface)
                || in_flight
                    .as_ref()
                    .map_or(false, |targets| targets.contains(surface));
            if !referenced {
                surface.release();
            }
            referenced
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use viewfinder_core::prelude::mailbox;
    use viewfinder_core::mailbox::MailboxReceiver;
    use viewfinder_provider::prelude::*;

    fn setup(auto: bool) -> (VirtualProvider, DeviceHandle, MailboxReceiver<ProviderEvent>) {
        let provider = VirtualProvider::new().with_device(VirtualDevice::back_camera());
        provider.set_auto_configure(auto);
        let (tx, rx) = mailbox(16);
        let handle = provider.open_device(&DeviceId::from("back"), tx).unwrap();
        (provider, handle, rx)
    }

    fn configured_session(rx: &MailboxReceiver<ProviderEvent>) -> SessionId {
        match rx.poll() {
            Some(ProviderEvent::SessionConfigured { session, .. }) => session,
            other => panic!("expected configured event, got {other:?}"),
        }
    }

    #[test]
    fn empty_required_set_creates_nothing_and_flushes() {
        let (provider, handle, _rx) = setup(true);
        let mut reconciler = SessionReconciler::new();
        let surface = Surface::new();
        reconciler.set_surface(SurfaceRole::Viewport, Some(surface.clone()));
        reconciler.set_surface(SurfaceRole::Viewport, None);

        reconciler.reconcile(&provider, &handle, 1).unwrap();

        assert_eq!(provider.created_sessions(), 0);
        assert!(surface.is_released());
    }

    #[test]
    fn first_surface_triggers_session_creation() {
        let (provider, handle, rx) = setup(true);
        let mut reconciler = SessionReconciler::new();
        let surface = Surface::new();
        reconciler.set_surface(SurfaceRole::Viewport, Some(surface.clone()));

        reconciler.reconcile(&provider, &handle, 1).unwrap();
        assert_eq!(reconciler.state(), SessionState::Configuring);

        let session = configured_session(&rx);
        reconciler
            .on_configured(&provider, &handle, session, 1)
            .unwrap();

        assert_eq!(reconciler.state(), SessionState::Active);
        assert_eq!(provider.created_sessions(), 1);
        assert_eq!(provider.repeating_log(), vec![vec![surface.id()]]);
    }

    #[test]
    fn role_removal_reuses_superset_session() {
        let (provider, handle, rx) = setup(true);
        let mut reconciler = SessionReconciler::new();
        let viewport = Surface::new();
        let sink = Surface::new();
        reconciler.set_surface(SurfaceRole::Viewport, Some(viewport.clone()));
        reconciler.set_surface(SurfaceRole::FrameSink, Some(sink.clone()));
        reconciler.reconcile(&provider, &handle, 1).unwrap();
        let session = configured_session(&rx);
        reconciler
            .on_configured(&provider, &handle, session, 1)
            .unwrap();
        assert_eq!(provider.created_sessions(), 1);

        // Dropping a role leaves the active session a superset: resubmit,
        // never recreate.
        reconciler.set_surface(SurfaceRole::FrameSink, None);
        assert!(!sink.is_released());
        reconciler.reconcile(&provider, &handle, 1).unwrap();

        assert_eq!(provider.created_sessions(), 1);
        let log = provider.repeating_log();
        assert_eq!(log.last(), Some(&vec![viewport.id()]));
        // The retired sink was only released after the resubmission call
        // succeeded.
        assert!(sink.is_released());
        assert!(!viewport.is_released());
    }

    #[test]
    fn growing_surface_set_recreates_session() {
        let (provider, handle, rx) = setup(true);
        let mut reconciler = SessionReconciler::new();
        let viewport = Surface::new();
        reconciler.set_surface(SurfaceRole::Viewport, Some(viewport.clone()));
        reconciler.reconcile(&provider, &handle, 1).unwrap();
        let session = configured_session(&rx);
        reconciler
            .on_configured(&provider, &handle, session, 1)
            .unwrap();

        let sink = Surface::new();
        reconciler.set_surface(SurfaceRole::FrameSink, Some(sink.clone()));
        reconciler.reconcile(&provider, &handle, 1).unwrap();
        let session = configured_session(&rx);
        reconciler
            .on_configured(&provider, &handle, session, 1)
            .unwrap();

        assert_eq!(provider.created_sessions(), 2);
        let last = provider.repeating_log().last().cloned().unwrap();
        assert!(last.contains(&viewport.id()) && last.contains(&sink.id()));
    }

    #[test]
    fn rapid_changes_coalesce_into_one_outstanding_configure() {
        let (provider, handle, rx) = setup(false);
        let mut reconciler = SessionReconciler::new();
        let first = Surface::new();
        reconciler.set_surface(SurfaceRole::Viewport, Some(first.clone()));
        reconciler.reconcile(&provider, &handle, 1).unwrap();
        assert!(reconciler.is_in_flight());

        // Two rapid changes while the configure is pending. The virtual
        // provider rejects a second outstanding configure, so reaching the
        // completion proves these coalesced.
        let second = Surface::new();
        reconciler.set_surface(SurfaceRole::Viewport, Some(second.clone()));
        reconciler.reconcile(&provider, &handle, 1).unwrap();
        let sink = Surface::new();
        reconciler.set_surface(SurfaceRole::FrameSink, Some(sink.clone()));
        reconciler.reconcile(&provider, &handle, 1).unwrap();
        assert_eq!(provider.pending_configure_targets(), Some(vec![first.id()]));

        // First completion notices the stale target set and rebuilds against
        // the latest required surfaces.
        provider.complete_configure().unwrap();
        let session = configured_session(&rx);
        reconciler
            .on_configured(&provider, &handle, session, 1)
            .unwrap();
        assert!(reconciler.is_in_flight());
        let pending = provider.pending_configure_targets().unwrap();
        assert!(pending.contains(&second.id()) && pending.contains(&sink.id()));

        provider.complete_configure().unwrap();
        let session = configured_session(&rx);
        reconciler
            .on_configured(&provider, &handle, session, 1)
            .unwrap();

        assert_eq!(provider.created_sessions(), 2);
        let last = provider.repeating_log().last().cloned().unwrap();
        assert!(last.contains(&second.id()) && last.contains(&sink.id()));
        // The replaced surface is gone once nothing references it.
        assert!(first.is_released());
        assert!(!second.is_released());
    }

    #[test]
    fn configure_failure_is_surfaced_and_recoverable() {
        let (provider, handle, _rx) = setup(false);
        let mut reconciler = SessionReconciler::new();
        reconciler.set_surface(SurfaceRole::Viewport, Some(Surface::new()));
        reconciler.reconcile(&provider, &handle, 1).unwrap();
        provider.fail_configure("resource busy");

        let err = reconciler.on_configure_failed("resource busy".into());
        assert_eq!(err.code(), "session_configuration_failed");
        assert!(!reconciler.is_in_flight());
        assert_eq!(reconciler.state(), SessionState::Uncreated);

        // A later client-triggered reconcile can try again.
        reconciler.reconcile(&provider, &handle, 2).unwrap();
        assert!(reconciler.is_in_flight());
    }

    #[test]
    fn close_releases_every_surface() {
        let (provider, handle, rx) = setup(false);
        let mut reconciler = SessionReconciler::new();
        let old = Surface::new();
        let new = Surface::new();
        reconciler.set_surface(SurfaceRole::Viewport, Some(old.clone()));
        reconciler.reconcile(&provider, &handle, 1).unwrap();
        provider.complete_configure().unwrap();
        let session = configured_session(&rx);
        reconciler
            .on_configured(&provider, &handle, session, 1)
            .unwrap();
        reconciler.set_surface(SurfaceRole::Viewport, Some(new.clone()));
        reconciler.reconcile(&provider, &handle, 1).unwrap();
        assert!(reconciler.is_in_flight());

        // Close while the rebuild is still pending.
        reconciler.close(&provider);

        assert_eq!(reconciler.state(), SessionState::Closed);
        assert!(old.is_released());
        assert!(new.is_released());
        assert_eq!(provider.aborted_sessions().len(), 1);
    }
}
