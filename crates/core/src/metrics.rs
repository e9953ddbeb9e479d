use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

const DEFAULT_WINDOW: usize = 120;

/// Shared monotonically increasing counter.
///
/// # Example
/// ```rust
/// use viewfinder_core::prelude::Counter;
///
/// let counter = Counter::default();
/// counter.incr();
/// assert_eq!(counter.get(), 1);
/// ```
#[derive(Debug, Default, Clone)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    pub fn incr(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Rolling timing metrics for one pipeline stage.
///
/// Keeps a bounded window of samples for averages and rate estimation.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use viewfinder_core::prelude::StageTimer;
///
/// let timer = StageTimer::default();
/// timer.record(Duration::from_millis(12));
/// assert_eq!(timer.total_samples(), 1);
/// ```
#[derive(Clone, Default)]
pub struct StageTimer {
    inner: Arc<TimerState>,
}

#[derive(Default)]
struct TimerState {
    count: AtomicU64,
    last_nanos: AtomicU64,
    window: parking_lot::Mutex<VecDeque<(Instant, u64)>>,
}

impl StageTimer {
    /// Record one duration sample.
    pub fn record(&self, duration: Duration) {
        let nanos = duration.as_nanos().min(u64::MAX as u128) as u64;
        self.inner.count.fetch_add(1, Ordering::Relaxed);
        self.inner.last_nanos.store(nanos, Ordering::Relaxed);
        let mut window = self.inner.window.lock();
        window.push_back((Instant::now(), nanos));
        while window.len() > DEFAULT_WINDOW {
            window.pop_front();
        }
    }

    /// Total samples recorded over the lifetime.
    pub fn total_samples(&self) -> u64 {
        self.inner.count.load(Ordering::Relaxed)
    }

    /// Rolling average in milliseconds.
    pub fn avg_millis(&self) -> Option<f64> {
        let window = self.inner.window.lock();
        if window.is_empty() {
            return None;
        }
        let total: u128 = window.iter().map(|(_, n)| *n as u128).sum();
        Some(total as f64 / 1_000_000.0 / window.len() as f64)
    }

    /// Most recent sample in milliseconds.
    pub fn last_millis(&self) -> Option<f64> {
        let last = self.inner.last_nanos.load(Ordering::Relaxed);
        if last == 0 {
            None
        } else {
            Some(last as f64 / 1_000_000.0)
        }
    }

    /// Samples per second over the rolling window.
    pub fn rate(&self) -> Option<f64> {
        let window = self.inner.window.lock();
        if window.len() < 2 {
            return None;
        }
        let first = window.front()?.0;
        let last = window.back()?.0;
        let span = last.saturating_duration_since(first).as_secs_f64();
        if span > 0.0 {
            Some(window.len() as f64 / span)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_counts() {
        let counter = Counter::default();
        let clone = counter.clone();
        counter.incr();
        clone.incr();
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn timer_tracks_last_and_average() {
        let timer = StageTimer::default();
        assert!(timer.avg_millis().is_none());
        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(20));
        assert_eq!(timer.total_samples(), 2);
        assert_eq!(timer.last_millis(), Some(20.0));
        let avg = timer.avg_millis().unwrap();
        assert!((avg - 15.0).abs() < 1e-6);
    }

    #[test]
    fn timer_window_is_bounded() {
        let timer = StageTimer::default();
        for _ in 0..(DEFAULT_WINDOW + 10) {
            timer.record(Duration::from_micros(1));
        }
        assert_eq!(timer.total_samples(), (DEFAULT_WINDOW + 10) as u64);
        assert_eq!(timer.inner.window.lock().len(), DEFAULT_WINDOW);
    }
}
