//! Simulation coordinator
//!
//! Dedicated thread that sleeps on the shared [`WakeSignal`]. Each
//! `NewData` wake simulates the most recent snapshot with the configured
//! parameters and publishes the result; wakes that arrive during a cycle
//! coalesce into one. `Stop` exits without computing, even with data pending.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::Context;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::{
    engine::{SimulationEngine, SimulationParams},
    store::ResultStore,
};
use crate::{
    book::HistoryBuffer,
    signal::{WakeReason, WakeSignal},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Computing,
    Stopped,
}

impl std::fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Computing => write!(f, "COMPUTING"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

#[derive(Debug, Default)]
pub struct CoordinatorStats {
    pub cycles: AtomicU64,
    /// Cycles dropped because the parameters failed validation
    pub skipped_invalid: AtomicU64,
    /// Cycles slower than the latency warning threshold
    pub slow_cycles: AtomicU64,
}

impl CoordinatorStats {
    pub fn summary(&self) -> String {
        format!(
            "cycles={} skipped_invalid={} slow={}",
            self.cycles.load(Ordering::Relaxed),
            self.skipped_invalid.load(Ordering::Relaxed),
            self.slow_cycles.load(Ordering::Relaxed),
        )
    }
}

pub struct Coordinator {
    history: Arc<HistoryBuffer>,
    store: Arc<ResultStore>,
    signal: Arc<WakeSignal>,
    engine: SimulationEngine,
    params: SimulationParams,
    latency_warn: Duration,
    state: RwLock<CoordinatorState>,
    pub stats: CoordinatorStats,
}

impl Coordinator {
    pub fn new(
        history: Arc<HistoryBuffer>,
        store: Arc<ResultStore>,
        engine: SimulationEngine,
        params: SimulationParams,
        latency_warn: Duration,
    ) -> Arc<Self> {
        let signal = history.signal().clone();
        Arc::new(Self {
            history,
            store,
            signal,
            engine,
            params,
            latency_warn,
            state: RwLock::new(CoordinatorState::Idle),
            stats: CoordinatorStats::default(),
        })
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.read()
    }

    fn set_state(&self, state: CoordinatorState) {
        *self.state.write() = state;
    }

    pub fn spawn(self: &Arc<Self>) -> anyhow::Result<JoinHandle<()>> {
        let coordinator = self.clone();
        let handle = thread::Builder::new()
            .name("sim-coordinator".to_string())
            .spawn(move || coordinator.run())
            .context("Failed to spawn coordinator thread")?;

        info!(
            quantity = self.params.quantity,
            volatility = self.params.volatility,
            fee_tier = self.params.fee_tier,
            "coordinator_started"
        );
        Ok(handle)
    }

    /// Block until stop, running one cycle per `NewData` wake
    pub fn run(&self) {
        loop {
            match self.signal.wait() {
                WakeReason::NewData => self.run_cycle(),
                WakeReason::Stop => break,
            }
        }

        self.set_state(CoordinatorState::Stopped);
        info!(stats = %self.stats.summary(), "coordinator_stopped");
    }

    /// One Computing pass. No lock is held while simulating: `latest()`
    /// hands back a shared snapshot and releases the history lock.
    pub fn run_cycle(&self) {
        self.set_state(CoordinatorState::Computing);

        let snapshot = self.history.latest();
        match self.engine.simulate(&self.params, snapshot.as_deref()) {
            Ok(result) => {
                self.stats.cycles.fetch_add(1, Ordering::Relaxed);
                if result.latency > self.latency_warn {
                    self.stats.slow_cycles.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        latency_ms = result.latency_ms(),
                        threshold_ms = self.latency_warn.as_millis() as u64,
                        "high_latency"
                    );
                }
                let version = self.store.publish(result);
                debug!(version, net_cost = result.net_cost, "result_published");
            }
            Err(e) => {
                self.stats.skipped_invalid.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "simulation_skipped");
            }
        }

        self.set_state(CoordinatorState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PriceLevel, Snapshot};
    use crate::sim::engine::CostModelConfig;

    fn setup(params: SimulationParams) -> (Arc<HistoryBuffer>, Arc<ResultStore>, Arc<Coordinator>) {
        let history = Arc::new(HistoryBuffer::new(16, Arc::new(WakeSignal::new())));
        let store = Arc::new(ResultStore::new());
        let coordinator = Coordinator::new(
            history.clone(),
            store.clone(),
            SimulationEngine::new(CostModelConfig::default()),
            params,
            Duration::from_millis(100),
        );
        (history, store, coordinator)
    }

    fn book(best_bid: f64) -> Snapshot {
        Snapshot::new(
            "BTC-USDT-SWAP",
            vec![PriceLevel::new(best_bid, 10.0)],
            vec![PriceLevel::new(101.0, 5.0), PriceLevel::new(102.0, 10.0)],
        )
    }

    #[test]
    fn test_cycle_uses_latest_snapshot() {
        let (history, store, coordinator) = setup(SimulationParams::new(7.0, 0.02, 0.001));
        history.append(book(90.0));
        history.append(book(100.0));

        coordinator.run_cycle();

        let result = store.current();
        assert!((result.slippage - 9.0 / 7.0).abs() < 1e-9);
        assert_eq!(store.version(), 1);
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
    }

    #[test]
    fn test_cycle_without_data_publishes_zero_result() {
        let (_history, store, coordinator) = setup(SimulationParams::default());

        coordinator.run_cycle();

        assert_eq!(store.version(), 1);
        assert_eq!(store.current().net_cost, 0.0);
    }

    #[test]
    fn test_invalid_params_leave_store_untouched() {
        let (history, store, coordinator) = setup(SimulationParams::new(-1.0, 0.02, 0.001));
        history.append(book(100.0));

        coordinator.run_cycle();

        assert!(store.latest().is_none());
        assert_eq!(coordinator.stats.skipped_invalid.load(Ordering::Relaxed), 1);
        assert_eq!(coordinator.stats.cycles.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_stop_wins_over_pending_data() {
        let (history, store, coordinator) = setup(SimulationParams::default());
        history.append(book(100.0));
        history.signal().request_stop();

        coordinator.run();

        assert_eq!(coordinator.state(), CoordinatorState::Stopped);
        assert!(store.latest().is_none());
    }

    #[test]
    fn test_spawned_thread_publishes_and_stops() {
        let (history, store, coordinator) = setup(SimulationParams::default());
        let handle = coordinator.spawn().unwrap();

        history.append(book(100.0));
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while store.version() == 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(store.version() >= 1);

        history.signal().request_stop();
        handle.join().unwrap();
        assert_eq!(coordinator.state(), CoordinatorState::Stopped);
    }
}
