use crossbeam_queue::ArrayQueue;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Result of posting a message into a mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    /// Message enqueued.
    Posted,
    /// Mailbox was full; the message was dropped.
    Dropped,
    /// Mailbox is closed.
    Closed,
}

/// Capacity of the control lane. Control traffic is at most a handful of
/// outstanding lifecycle outcomes, never a data stream.
const CONTROL_CAPACITY: usize = 4;

struct MailboxInner<T> {
    queue: ArrayQueue<T>,
    control: ArrayQueue<T>,
    closed: AtomicBool,
}

/// Producer half of a bounded mailbox.
///
/// Hardware callback contexts post completion and frame events here; the
/// controller drains them on its own thread, which keeps all pipeline state
/// mutation serialized.
///
/// Two lanes: `post` for data that may be dropped under backlog (frames),
/// `post_control` for lifecycle outcomes that must not be lost behind that
/// backlog. The receiver drains control messages first.
///
/// # Example
/// ```rust
/// use viewfinder_core::prelude::{mailbox, PostOutcome};
///
/// let (tx, rx) = mailbox::<u32>(8);
/// assert_eq!(tx.post(7), PostOutcome::Posted);
/// assert_eq!(rx.poll(), Some(7));
/// ```
pub struct MailboxSender<T> {
    inner: Arc<MailboxInner<T>>,
}

impl<T> Clone for MailboxSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> MailboxSender<T> {
    /// Post without blocking; a full mailbox drops the message.
    pub fn post(&self, message: T) -> PostOutcome {
        if self.inner.closed.load(Ordering::Acquire) {
            return PostOutcome::Closed;
        }
        match self.inner.queue.push(message) {
            Ok(()) => PostOutcome::Posted,
            Err(_) => PostOutcome::Dropped,
        }
    }

    /// Post on the control lane.
    ///
    /// Control messages are never lost to a data backlog: they sit in their
    /// own small queue and are drained before data messages. A full control
    /// lane displaces its oldest entry rather than dropping the new one.
    pub fn post_control(&self, message: T) -> PostOutcome {
        if self.inner.closed.load(Ordering::Acquire) {
            return PostOutcome::Closed;
        }
        self.inner.control.force_push(message);
        PostOutcome::Posted
    }

    /// Close the mailbox; subsequent posts return `Closed`.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }
}

/// Consumer half of a bounded mailbox.
pub struct MailboxReceiver<T> {
    inner: Arc<MailboxInner<T>>,
}

impl<T> MailboxReceiver<T> {
    /// Take the next message, if any. Control messages come first.
    pub fn poll(&self) -> Option<T> {
        self.inner
            .control
            .pop()
            .or_else(|| self.inner.queue.pop())
    }

    /// Whether the producer side has closed the mailbox.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Drain everything currently queued.
    pub fn drain(&self) -> Vec<T> {
        let mut out = Vec::new();
        while let Some(message) = self.poll() {
            out.push(message);
        }
        out
    }
}

/// Create a bounded mailbox with the given capacity.
pub fn mailbox<T>(capacity: usize) -> (MailboxSender<T>, MailboxReceiver<T>) {
    let inner = Arc::new(MailboxInner {
        queue: ArrayQueue::new(capacity.max(1)),
        control: ArrayQueue::new(CONTROL_CAPACITY),
        closed: AtomicBool::new(false),
    });
    (
        MailboxSender {
            inner: inner.clone(),
        },
        MailboxReceiver { inner },
    )
}

/// Single-value slot that keeps only the most recent entry.
///
/// Used for decoded frames, where a slow consumer should observe the newest
/// frame rather than build a backlog.
///
/// # Example
/// ```rust
/// use viewfinder_core::prelude::LatestSlot;
///
/// let slot = LatestSlot::new();
/// slot.store(1u8);
/// slot.store(2u8);
/// assert_eq!(slot.take(), Some(2));
/// assert_eq!(slot.take(), None);
/// ```
pub struct LatestSlot<T> {
    slot: Arc<parking_lot::Mutex<Option<T>>>,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for LatestSlot<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(parking_lot::Mutex::new(None)),
        }
    }

    /// Replace the stored value with a newer one.
    pub fn store(&self, value: T) {
        *self.slot.lock() = Some(value);
    }

    /// Take the stored value, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }
}

impl<T: Clone> LatestSlot<T> {
    /// Copy the stored value without clearing the slot.
    pub fn peek(&self) -> Option<T> {
        self.slot.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mailbox_orders_fifo() {
        let (tx, rx) = mailbox::<u32>(4);
        for n in 0..3 {
            assert_eq!(tx.post(n), PostOutcome::Posted);
        }
        assert_eq!(rx.drain(), vec![0, 1, 2]);
        assert_eq!(rx.poll(), None);
    }

    #[test]
    fn mailbox_drops_on_overflow() {
        let (tx, rx) = mailbox::<u32>(1);
        assert_eq!(tx.post(1), PostOutcome::Posted);
        assert_eq!(tx.post(2), PostOutcome::Dropped);
        assert_eq!(rx.poll(), Some(1));
    }

    #[test]
    fn mailbox_close_rejects_posts() {
        let (tx, rx) = mailbox::<u32>(4);
        tx.post(1);
        tx.close();
        assert_eq!(tx.post(2), PostOutcome::Closed);
        // Already-queued messages survive closure.
        assert_eq!(rx.poll(), Some(1));
        assert!(rx.is_closed());
    }

    #[test]
    fn control_lane_survives_full_queue() {
        let (tx, rx) = mailbox::<u32>(2);
        assert_eq!(tx.post(1), PostOutcome::Posted);
        assert_eq!(tx.post(2), PostOutcome::Posted);
        assert_eq!(tx.post(3), PostOutcome::Dropped);
        assert_eq!(tx.post_control(99), PostOutcome::Posted);
        // Control is delivered first, then the surviving data messages.
        assert_eq!(rx.drain(), vec![99, 1, 2]);
    }

    #[test]
    fn control_lane_respects_close() {
        let (tx, rx) = mailbox::<u32>(2);
        tx.post_control(7);
        tx.close();
        assert_eq!(tx.post_control(8), PostOutcome::Closed);
        assert_eq!(rx.poll(), Some(7));
    }

    #[test]
    fn latest_slot_keeps_newest() {
        let slot = LatestSlot::new();
        assert!(slot.is_empty());
        slot.store("a");
        slot.store("b");
        assert_eq!(slot.peek(), Some("b"));
        assert_eq!(slot.take(), Some("b"));
        assert!(slot.is_empty());
    }
}
