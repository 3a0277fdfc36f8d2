//! Bounded FIFO of the most recent call outcomes.

use std::collections::VecDeque;
use std::time::Instant;

use parking_lot::Mutex;

/// A single classified outcome.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OutcomeRecord {
    /// When the outcome was classified.
    pub at: Instant,
    /// Whether the guarded call succeeded.
    pub succeeded: bool,
}

impl OutcomeRecord {
    pub(crate) fn failure() -> Self {
        Self {
            at: Instant::now(),
            succeeded: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn success() -> Self {
        Self {
            at: Instant::now(),
            succeeded: true,
        }
    }
}

/// Fixed-capacity sliding window of recent outcomes.
///
/// Oldest entries are evicted once capacity is exceeded. The window locks
/// internally so pushes stay safe under concurrent callers, even though the
/// execution gate already serializes access externally. There is no removal
/// other than capacity-driven eviction.
#[derive(Debug)]
pub(crate) struct OutcomeWindow {
    entries: Mutex<VecDeque<OutcomeRecord>>,
    capacity: usize,
}

impl OutcomeWindow {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append a record, evicting the oldest entries past capacity.
    pub(crate) fn push(&self, record: OutcomeRecord) {
        let mut entries = self.entries.lock();
        entries.push_back(record);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    pub(crate) fn is_full(&self) -> bool {
        self.entries.lock().len() == self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Evaluate `predicate` over the current contents in insertion order.
    pub(crate) fn all(&self, predicate: impl FnMut(&OutcomeRecord) -> bool) -> bool {
        self.entries.lock().iter().all(predicate)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn pushed_record_appears_in_window() {
        let window = OutcomeWindow::new(2);

        window.push(OutcomeRecord::failure());

        assert_eq!(window.len(), 1);
        assert!(!window.is_full());
        assert!(window.all(|r| !r.succeeded));
    }

    #[test]
    fn window_reports_full_at_capacity() {
        let window = OutcomeWindow::new(2);

        window.push(OutcomeRecord::failure());
        window.push(OutcomeRecord::failure());

        assert_eq!(window.len(), 2);
        assert!(window.is_full());
    }

    #[test]
    fn eviction_keeps_the_most_recent_entries() {
        let window = OutcomeWindow::new(2);

        window.push(OutcomeRecord::failure());
        window.push(OutcomeRecord::failure());
        window.push(OutcomeRecord::success());
        window.push(OutcomeRecord::success());

        // The two failures pushed first must have been evicted.
        assert_eq!(window.len(), 2);
        assert!(window.is_full());
        assert!(window.all(|r| r.succeeded));
    }

    #[test]
    fn eviction_is_oldest_first() {
        let window = OutcomeWindow::new(2);

        window.push(OutcomeRecord::success());
        window.push(OutcomeRecord::failure());
        window.push(OutcomeRecord::failure());

        // Only the oldest entry (the success) is gone.
        assert_eq!(window.len(), 2);
        assert!(window.all(|r| !r.succeeded));
    }
}
