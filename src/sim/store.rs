//! Single-slot holder for the latest simulation result (last write wins)

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::models::SimulationResult;

/// A result plus when and in which cycle it was published
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PublishedResult {
    pub result: SimulationResult,
    pub published_at: DateTime<Utc>,
    /// 1 for the first publish, then increasing
    pub version: u64,
}

#[derive(Debug, Default)]
struct Slot {
    current: Option<PublishedResult>,
    version: u64,
}

#[derive(Debug, Default)]
pub struct ResultStore {
    slot: Mutex<Slot>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored result; returns the new version
    pub fn publish(&self, result: SimulationResult) -> u64 {
        let mut slot = self.slot.lock();
        slot.version += 1;
        let version = slot.version;
        slot.current = Some(PublishedResult {
            result,
            published_at: Utc::now(),
            version,
        });
        version
    }

    /// Latest published entry, if any
    pub fn latest(&self) -> Option<PublishedResult> {
        self.slot.lock().current
    }

    /// Latest result, or the zero result before the first publish
    pub fn current(&self) -> SimulationResult {
        self.latest().map(|p| p.result).unwrap_or_default()
    }

    pub fn version(&self) -> u64 {
        self.slot.lock().version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn test_empty_store() {
        let store = ResultStore::new();
        assert!(store.latest().is_none());
        assert_eq!(store.current(), SimulationResult::empty());
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_last_write_wins() {
        let store = ResultStore::new();
        let first = SimulationResult {
            slippage: 1.0,
            ..Default::default()
        };
        let second = SimulationResult {
            slippage: 2.0,
            ..Default::default()
        };

        assert_eq!(store.publish(first), 1);
        assert_eq!(store.publish(second), 2);

        let latest = store.latest().unwrap();
        assert_eq!(latest.result.slippage, 2.0);
        assert_eq!(latest.version, 2);
    }

    #[test]
    fn test_concurrent_publish_and_read() {
        let store = Arc::new(ResultStore::new());
        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for i in 1..=1000 {
                    let v = i as f64;
                    store.publish(SimulationResult {
                        slippage: v,
                        fees: v,
                        net_cost: 2.0 * v,
                        ..Default::default()
                    });
                }
            })
        };

        for _ in 0..1000 {
            let r = store.current();
            assert_eq!(r.slippage, r.fees);
            assert_eq!(r.net_cost, r.slippage * 2.0);
        }

        writer.join().unwrap();
        assert_eq!(store.version(), 1000);
    }
}
