use parking_lot::Mutex;

/// Single-slot coalescing queue between a producer thread and one consumer.
///
/// * `push` always overwrites whatever is staged; older undelivered values
///   are dropped, never queued.
/// * At most one flush is outstanding. `push` returns `true` only when it
///   moved the mailbox from idle to scheduled, and the producer must then
///   arrange exactly one flush (wake the consumer once). Later pushes while a
///   flush is pending just replace the value.
/// * The consumer calls `take` when the flush runs. It returns the newest
///   value and clears the scheduled flag, so the next push schedules again.
///
/// The lock is held only to swap the slot; callers never run callbacks
/// under it.
pub struct Mailbox<T> {
    inner: Mutex<Slot<T>>,
}

struct Slot<T> {
    staged: Option<T>,
    scheduled: bool,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Slot { staged: None, scheduled: false }),
        }
    }

    #[must_use]
    pub fn push(&self, value: T) -> bool {
        let mut slot = self.inner.lock();
        slot.staged = Some(value);
        !std::mem::replace(&mut slot.scheduled, true)
    }

    pub fn take(&self) -> Option<T> {
        let mut slot = self.inner.lock();
        slot.scheduled = false;
        slot.staged.take()
    }

    /// Drops any staged value and forgets a pending flush.
    pub fn clear(&self) {
        let mut slot = self.inner.lock();
        slot.staged = None;
        slot.scheduled = false;
    }

    pub fn is_scheduled(&self) -> bool { self.inner.lock().scheduled }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self { Self::new() }
}
