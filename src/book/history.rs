//! Bounded snapshot history
//!
//! FIFO ring of the most recent snapshots. Eviction and insertion happen
//! under one write lock, so readers never see a buffer that has dropped the
//! oldest entry but not yet admitted the new one.

use parking_lot::RwLock;
use std::{collections::VecDeque, sync::Arc};
use tracing::trace;

use crate::{models::Snapshot, signal::WakeSignal};

/// Default number of retained snapshots
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

#[derive(Debug, Default)]
struct HistoryInner {
    points: VecDeque<Arc<Snapshot>>,
    total_appended: u64,
}

/// Thread-safe bounded history that wakes the coordinator on append
#[derive(Debug)]
pub struct HistoryBuffer {
    inner: RwLock<HistoryInner>,
    capacity: usize,
    signal: Arc<WakeSignal>,
}

impl HistoryBuffer {
    /// Capacity below 1 is raised to 1
    pub fn new(capacity: usize, signal: Arc<WakeSignal>) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: RwLock::new(HistoryInner {
                points: VecDeque::with_capacity(capacity),
                total_appended: 0,
            }),
            capacity,
            signal,
        }
    }

    /// Evict the oldest at capacity, insert, then signal new data
    pub fn append(&self, snapshot: Snapshot) {
        let snapshot = Arc::new(snapshot);
        let len = {
            let mut inner = self.inner.write();
            if inner.points.len() >= self.capacity {
                inner.points.pop_front();
            }
            inner.points.push_back(snapshot);
            inner.total_appended += 1;
            inner.points.len()
        };

        trace!(len, capacity = self.capacity, "snapshot_appended");
        self.signal.notify_data();
    }

    /// Most recently appended snapshot
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.inner.read().points.back().cloned()
    }

    /// Up to `n` most recent snapshots, oldest first
    pub fn recent(&self, n: usize) -> Vec<Arc<Snapshot>> {
        let inner = self.inner.read();
        let skip = inner.points.len().saturating_sub(n);
        inner.points.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends since creation, including evicted ones
    pub fn total_appended(&self) -> u64 {
        self.inner.read().total_appended
    }

    pub fn signal(&self) -> &Arc<WakeSignal> {
        &self.signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::PriceLevel, signal::WakeReason};
    use std::{thread, time::Duration};

    fn snapshot(n: usize) -> Snapshot {
        // Every field derives from n so a torn read is detectable
        let levels = (0..n % 7 + 1)
            .map(|i| PriceLevel::new(n as f64 + i as f64, n as f64))
            .collect::<Vec<_>>();
        Snapshot::new(format!("SYM-{}", n), levels.clone(), levels)
    }

    fn buffer(capacity: usize) -> HistoryBuffer {
        HistoryBuffer::new(capacity, Arc::new(WakeSignal::new()))
    }

    #[test]
    fn test_empty_buffer() {
        let history = buffer(4);
        assert!(history.latest().is_none());
        assert!(history.is_empty());
        assert_eq!(history.len(), 0);
    }

    #[test]
    fn test_fifo_eviction() {
        let capacity = 5;
        let extra = 3;
        let history = buffer(capacity);

        for n in 1..=capacity + extra {
            history.append(snapshot(n));
            assert!(history.len() <= capacity);
        }

        assert_eq!(history.len(), capacity);
        assert_eq!(history.latest().unwrap().symbol(), "SYM-8");
        assert_eq!(history.total_appended(), 8);

        let kept: Vec<String> = history
            .recent(capacity)
            .iter()
            .map(|s| s.symbol().to_string())
            .collect();
        assert_eq!(kept, vec!["SYM-4", "SYM-5", "SYM-6", "SYM-7", "SYM-8"]);
    }

    #[test]
    fn test_default_capacity_bound() {
        let history = buffer(DEFAULT_HISTORY_CAPACITY);
        for n in 0..DEFAULT_HISTORY_CAPACITY + 10 {
            history.append(snapshot(n));
        }
        assert_eq!(history.len(), DEFAULT_HISTORY_CAPACITY);
        assert_eq!(
            history.latest().unwrap().symbol(),
            format!("SYM-{}", DEFAULT_HISTORY_CAPACITY + 9)
        );
        assert_eq!(history.recent(1)[0].symbol(), "SYM-1009");
    }

    #[test]
    fn test_recent_shorter_than_buffer() {
        let history = buffer(10);
        history.append(snapshot(1));
        history.append(snapshot(2));
        assert_eq!(history.recent(5).len(), 2);
        assert_eq!(history.recent(1)[0].symbol(), "SYM-2");
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let history = buffer(0);
        history.append(snapshot(1));
        history.append(snapshot(2));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.latest().unwrap().symbol(), "SYM-2");
    }

    #[test]
    fn test_append_signals_waiter() {
        let history = buffer(2);
        history.append(snapshot(1));
        assert_eq!(
            history.signal().wait_timeout(Duration::from_millis(50)),
            Some(WakeReason::NewData)
        );
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let history = Arc::new(buffer(16));
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let history = history.clone();
                thread::spawn(move || {
                    for i in 0..500 {
                        history.append(snapshot(w * 1000 + i));
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let history = history.clone();
                thread::spawn(move || {
                    for _ in 0..2000 {
                        assert!(history.len() <= 16);
                        if let Some(s) = history.latest() {
                            let n: usize = s.symbol()[4..].parse().unwrap();
                            assert_eq!(s.bids().len(), n % 7 + 1);
                            assert_eq!(s.asks().len(), n % 7 + 1);
                            assert!(s.bids().iter().all(|l| l.size == n as f64));
                        }
                    }
                })
            })
            .collect();

        for h in writers.into_iter().chain(readers) {
            h.join().unwrap();
        }

        assert_eq!(history.len(), 16);
        assert_eq!(history.total_appended(), 2000);
    }
}
