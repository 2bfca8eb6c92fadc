//! Process lifecycle: build shared state, start the ingest and coordinator
//! threads, and tear them down cooperatively.

use std::{sync::Arc, thread::JoinHandle};

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::{
    config::SimulatorConfig,
    feed::{IngestError, StreamIngestor},
    models::SimulationResult,
    sim::{Coordinator, PublishedResult, SimulationEngine},
    state::SharedState,
};

pub struct Simulator {
    config: SimulatorConfig,
    state: SharedState,
    ingestor: Arc<StreamIngestor>,
    coordinator: Arc<Coordinator>,
    ingest_handle: Option<JoinHandle<Result<(), IngestError>>>,
    coordinator_handle: Option<JoinHandle<()>>,
}

impl Simulator {
    /// Validate the configuration and build the pipeline without starting it
    pub fn new(config: SimulatorConfig) -> Result<Self> {
        config.validate().context("Invalid simulator configuration")?;

        let state = SharedState::new(config.history_capacity);
        let ingestor = StreamIngestor::new(
            config.feed.clone(),
            config.session.clone(),
            state.history.clone(),
        );
        let coordinator = Coordinator::new(
            state.history.clone(),
            state.results.clone(),
            SimulationEngine::new(config.model.clone()),
            config.simulation,
            config.latency_warn(),
        );

        Ok(Self {
            config,
            state,
            ingestor,
            coordinator,
            ingest_handle: None,
            coordinator_handle: None,
        })
    }

    /// Spawn the coordinator, then the ingest. Idempotent.
    pub fn start(&mut self) -> Result<()> {
        if self.coordinator_handle.is_some() {
            warn!("Simulator already running");
            return Ok(());
        }

        self.coordinator_handle = Some(self.coordinator.spawn()?);
        self.ingest_handle = Some(self.ingestor.spawn()?);

        info!(
            exchange = %self.config.labels.exchange,
            asset = %self.config.labels.asset,
            url = %self.config.feed.url(),
            history_capacity = self.config.history_capacity,
            "simulator_started"
        );
        Ok(())
    }

    /// Raise stop, wake everything, join both threads
    pub fn stop(&mut self) {
        self.state.request_stop();

        if let Some(handle) = self.ingest_handle.take() {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "ingest_ended_with_error"),
                Err(_) => error!("ingest thread panicked"),
            }
        }
        if let Some(handle) = self.coordinator_handle.take() {
            if handle.join().is_err() {
                error!("coordinator thread panicked");
            }
        }

        info!(
            session = %self.ingestor.session().metrics().summary(),
            ingest = %self.ingestor.stats.summary(),
            coordinator = %self.coordinator.stats.summary(),
            "simulator_stopped"
        );
    }

    /// True once the ingest thread has returned on its own (retry cap hit
    /// or remote close without reconnect)
    pub fn ingest_finished(&self) -> bool {
        self.ingest_handle
            .as_ref()
            .map_or(false, |handle| handle.is_finished())
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn ingestor(&self) -> &Arc<StreamIngestor> {
        &self.ingestor
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// What the presentation side polls
    pub fn current_result(&self) -> SimulationResult {
        self.state.results.current()
    }

    pub fn latest_published(&self) -> Option<PublishedResult> {
        self.state.results.latest()
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        if self.coordinator_handle.is_some() || self.ingest_handle.is_some() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = SimulatorConfig::default();
        config.simulation.quantity = 0.0;
        assert!(Simulator::new(config).is_err());
    }

    #[test]
    fn test_new_builds_idle_pipeline() {
        let sim = Simulator::new(SimulatorConfig::default()).unwrap();
        assert_eq!(sim.state().history.capacity(), 1000);
        assert!(sim.latest_published().is_none());
        assert!(!sim.ingest_finished());
    }
}
