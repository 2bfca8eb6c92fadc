//! Shared state owned by the orchestrator and handed to each thread

use std::sync::Arc;

use crate::{book::HistoryBuffer, signal::WakeSignal, sim::ResultStore};

/// Everything the ingest, coordinator and presentation sides share
#[derive(Debug, Clone)]
pub struct SharedState {
    pub history: Arc<HistoryBuffer>,
    pub results: Arc<ResultStore>,
    pub signal: Arc<WakeSignal>,
}

impl SharedState {
    pub fn new(history_capacity: usize) -> Self {
        let signal = Arc::new(WakeSignal::new());
        Self {
            history: Arc::new(HistoryBuffer::new(history_capacity, signal.clone())),
            results: Arc::new(ResultStore::new()),
            signal,
        }
    }

    /// Raise stop for every activity holding this state
    pub fn request_stop(&self) {
        self.signal.request_stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.signal.is_stopped()
    }
}
