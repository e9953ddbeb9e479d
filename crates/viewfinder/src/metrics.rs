//! Pipeline-level observability.

use viewfinder_core::prelude::{Counter, StageTimer};

/// Counters and timers exposed by a running pipeline.
///
/// Cheap to clone; every clone observes the same underlying values, so a
/// monitoring thread can hold its own handle.
///
/// # Example
/// ```rust
/// use viewfinder::PipelineMetrics;
///
/// let metrics = PipelineMetrics::default();
/// assert_eq!(metrics.reconciles.get(), 0);
/// assert!(metrics.frames.rate().is_none());
/// ```
#[derive(Clone, Default)]
pub struct PipelineMetrics {
    /// Wall time from a configure request leaving the pipeline to the
    /// session becoming active.
    pub reconfigure: StageTimer,
    /// Inter-arrival time of decoded frames; `rate()` approximates fps.
    pub frames: StageTimer,
    /// Reconcile passes triggered by surface or rotation changes.
    pub reconciles: Counter,
    /// Provider events dropped because their liveness ticket was stale.
    pub stale_events: Counter,
}
