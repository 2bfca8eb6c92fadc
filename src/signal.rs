//! Wakeup signal between the ingest side and the coordinator
//!
//! New data and shutdown are separate flags under one mutex, so a waiter
//! always knows which one woke it. Shutdown wins when both are set.

use parking_lot::{Condvar, Mutex};
use std::time::Duration;
use tokio::sync::watch;

/// Why a waiter returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// At least one snapshot arrived since the last wake
    NewData,
    /// Shutdown requested
    Stop,
}

#[derive(Debug, Default)]
struct WakeState {
    data_pending: bool,
    stopped: bool,
}

/// Tagged wakeup for the coordinator plus a stop broadcast for async tasks
#[derive(Debug)]
pub struct WakeSignal {
    state: Mutex<WakeState>,
    cond: Condvar,
    stop_tx: watch::Sender<bool>,
}

impl Default for WakeSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeSignal {
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            state: Mutex::new(WakeState::default()),
            cond: Condvar::new(),
            stop_tx,
        }
    }

    /// Mark data pending and wake one waiter. Repeated calls coalesce.
    pub fn notify_data(&self) {
        let mut state = self.state.lock();
        state.data_pending = true;
        self.cond.notify_one();
    }

    /// Set the stop flag, wake every waiter and fire the async stop channel
    pub fn request_stop(&self) {
        {
            let mut state = self.state.lock();
            state.stopped = true;
            self.cond.notify_all();
        }
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    /// Receiver that flips to `true` on stop, for `tokio::select!`
    pub fn subscribe_stop(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    /// Block until new data or stop. Consumes the pending-data flag.
    pub fn wait(&self) -> WakeReason {
        let mut state = self.state.lock();
        loop {
            if let Some(reason) = Self::take_reason(&mut state) {
                return reason;
            }
            self.cond.wait(&mut state);
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`
    pub fn wait_timeout(&self, timeout: Duration) -> Option<WakeReason> {
        let mut state = self.state.lock();
        if let Some(reason) = Self::take_reason(&mut state) {
            return Some(reason);
        }
        let _ = self.cond.wait_for(&mut state, timeout);
        Self::take_reason(&mut state)
    }

    fn take_reason(state: &mut WakeState) -> Option<WakeReason> {
        if state.stopped {
            return Some(WakeReason::Stop);
        }
        if state.data_pending {
            state.data_pending = false;
            return Some(WakeReason::NewData);
        }
        None
    }
}
