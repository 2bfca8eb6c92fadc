//! Order-Book Stream Ingest
//!
//! Keeps one WebSocket subscription to the L2 feed alive and turns every
//! inbound frame into a [`Snapshot`] in the shared history:
//! - Connection lifecycle driven by [`SessionManager`]
//! - Bounded iterative retry with exponential backoff and jitter
//! - Outbound-idle keepalive pings
//! - Malformed frames are logged and dropped; the connection stays up
//! - Stop is observed through the shared [`WakeSignal`] and closes the
//!   socket from inside the event loop
//!
//! The reactor is a current-thread tokio runtime on a dedicated OS thread.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
};
use tracing::{debug, error, info, trace, warn};

use super::{
    parser::{parse_snapshot, MalformedMessage},
    session::{HeartbeatAction, SessionManager, SessionState, TransitionReason},
};
use crate::{
    book::HistoryBuffer,
    config::{FeedConfig, SessionConfig},
    signal::WakeSignal,
};

// =============================================================================
// ERRORS
// =============================================================================

/// Ingest failures that leave the receive loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// Transport-level failure; retried by the run loop
    ConnectionFailure {
        reason: TransitionReason,
        detail: String,
    },
    /// Consecutive failures reached `max_retries`
    RetriesExhausted { attempts: u32 },
}

impl IngestError {
    fn connection(reason: TransitionReason, detail: impl std::fmt::Display) -> Self {
        Self::ConnectionFailure {
            reason,
            detail: detail.to_string(),
        }
    }
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionFailure { reason, detail } => {
                write!(f, "connection failure ({}): {}", reason, detail)
            }
            Self::RetriesExhausted { attempts } => {
                write!(f, "gave up after {} consecutive failed attempts", attempts)
            }
        }
    }
}

impl std::error::Error for IngestError {}

/// How a connected stream ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    RemoteClosed,
    Shutdown,
}

// =============================================================================
// INGEST STATISTICS
// =============================================================================

#[derive(Debug, Default)]
pub struct IngestStats {
    pub messages_received: AtomicU64,
    pub snapshots_accepted: AtomicU64,
    pub malformed_messages: AtomicU64,
    pub bytes_received: AtomicU64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> String {
        format!(
            "messages={} accepted={} malformed={} bytes={}",
            self.messages_received.load(Ordering::Relaxed),
            self.snapshots_accepted.load(Ordering::Relaxed),
            self.malformed_messages.load(Ordering::Relaxed),
            self.bytes_received.load(Ordering::Relaxed),
        )
    }
}

// =============================================================================
// STREAM INGESTOR
// =============================================================================

pub struct StreamIngestor {
    feed: FeedConfig,
    session: SessionManager,
    history: Arc<HistoryBuffer>,
    signal: Arc<WakeSignal>,
    pub stats: IngestStats,
}

impl StreamIngestor {
    pub fn new(feed: FeedConfig, session: SessionConfig, history: Arc<HistoryBuffer>) -> Arc<Self> {
        let signal = history.signal().clone();
        Arc::new(Self {
            feed,
            session: SessionManager::new(session),
            history,
            signal,
            stats: IngestStats::new(),
        })
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Handle one inbound frame: parse, append, wake the coordinator.
    ///
    /// Malformed frames are counted, logged and returned; nothing is appended.
    pub fn on_message(&self, raw: &[u8]) -> Result<(), MalformedMessage> {
        self.stats.messages_received.fetch_add(1, Ordering::Relaxed);
        self.stats
            .bytes_received
            .fetch_add(raw.len() as u64, Ordering::Relaxed);

        match parse_snapshot(raw) {
            Ok(snapshot) => {
                trace!(
                    symbol = snapshot.symbol(),
                    bids = snapshot.bids().len(),
                    asks = snapshot.asks().len(),
                    "snapshot_parsed"
                );
                self.history.append(snapshot);
                self.stats.snapshots_accepted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.stats.malformed_messages.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, bytes = raw.len(), "malformed_message");
                Err(e)
            }
        }
    }

    /// Run the ingest on its own thread with a current-thread runtime
    pub fn spawn(self: &Arc<Self>) -> anyhow::Result<JoinHandle<Result<(), IngestError>>> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create ingest runtime")?;

        let ingestor = self.clone();
        let handle = thread::Builder::new()
            .name("feed-ingest".to_string())
            .spawn(move || rt.block_on(ingestor.run()))
            .context("Failed to spawn ingest thread")?;

        info!(url = %self.feed.url(), "feed_ingest_started");
        Ok(handle)
    }

    /// Connect, stream and reconnect until stop or the retry cap.
    ///
    /// Failures consume the backoff budget; a clean remote close does not,
    /// and reconnects only when `reconnect_on_close` is set.
    pub async fn run(&self) -> Result<(), IngestError> {
        let mut stop_rx = self.signal.subscribe_stop();

        let outcome = loop {
            if *stop_rx.borrow() {
                self.session
                    .transition(SessionState::Shutdown, TransitionReason::ShutdownRequested);
                break Ok(());
            }

            self.session
                .transition(SessionState::Connecting, TransitionReason::Started);

            let delay = match self.connect_and_stream(&mut stop_rx).await {
                Ok(StreamEnd::Shutdown) => {
                    self.session
                        .transition(SessionState::Shutdown, TransitionReason::ShutdownRequested);
                    break Ok(());
                }
                Ok(StreamEnd::RemoteClosed) => {
                    if !self.feed.reconnect_on_close {
                        self.session
                            .transition(SessionState::Shutdown, TransitionReason::ServerClose);
                        break Ok(());
                    }
                    self.session
                        .transition(SessionState::Reconnecting, TransitionReason::ServerClose);
                    Duration::from_millis(self.session.config().retry_base_ms)
                }
                Err(e) => {
                    let reason = match &e {
                        IngestError::ConnectionFailure { reason, .. } => *reason,
                        IngestError::RetriesExhausted { .. } => TransitionReason::RetriesExhausted,
                    };
                    error!(error = %e, "connection_error");
                    self.session.transition(SessionState::Reconnecting, reason);

                    match self.session.next_backoff() {
                        Some(d) => d,
                        None => {
                            let attempts = self.session.backoff_attempt();
                            self.session.transition(
                                SessionState::Exhausted,
                                TransitionReason::RetriesExhausted,
                            );
                            break Err(IngestError::RetriesExhausted { attempts });
                        }
                    }
                }
            };

            info!(
                backoff_ms = delay.as_millis() as u64,
                attempt = self.session.backoff_attempt(),
                url = %self.feed.url(),
                "reconnect_backoff"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stop_rx.changed() => {}
            }
        };

        info!(
            session = %self.session.metrics().summary(),
            ingest = %self.stats.summary(),
            "feed_ingest_stopped"
        );
        outcome
    }

    /// Single connection lifecycle
    async fn connect_and_stream(
        &self,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> Result<StreamEnd, IngestError> {
        let url = self.feed.url();
        debug!(url = %url, "connecting");

        let connect = tokio::select! {
            res = tokio::time::timeout(self.session.connect_timeout(), connect_async(url.as_str())) => res,
            _ = stop_rx.changed() => return Ok(StreamEnd::Shutdown),
        };

        let (ws_stream, _response) = match connect {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => return Err(IngestError::connection(TransitionReason::HandshakeFailed, e)),
            Err(_) => {
                return Err(IngestError::connection(
                    TransitionReason::ConnectTimeout,
                    "connect timeout",
                ))
            }
        };

        self.session
            .transition(SessionState::Streaming, TransitionReason::ConnectSuccess);

        let (mut write, mut read) = ws_stream.split();

        loop {
            let idle = self.session.heartbeat_check_interval();

            tokio::select! {
                _ = stop_rx.changed() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!(error = %e, "close_send_failed");
                    }
                    return Ok(StreamEnd::Shutdown);
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let _ = self.on_message(text.as_bytes());
                        }
                        Some(Ok(Message::Binary(data))) => {
                            let _ = self.on_message(&data);
                        }
                        Some(Ok(Message::Ping(_))) => {
                            // tungstenite queues the pong and flushes it on the next read
                            trace!("server_ping");
                            self.session.record_outbound();
                        }
                        Some(Ok(Message::Pong(_))) => {
                            self.session.record_pong_received();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!(?frame, "server_close");
                            return Ok(StreamEnd::RemoteClosed);
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Err(WsError::ConnectionClosed)) | None => {
                            info!("stream_ended");
                            return Ok(StreamEnd::RemoteClosed);
                        }
                        Some(Err(e)) => {
                            return Err(IngestError::connection(TransitionReason::ReadError, e));
                        }
                    }
                }

                _ = tokio::time::sleep(idle) => {
                    if self.session.check_heartbeat() == HeartbeatAction::SendPing {
                        match write.send(Message::Ping(b"heartbeat".to_vec())).await {
                            Ok(()) => {
                                trace!("heartbeat_sent");
                                self.session.record_ping(true);
                            }
                            Err(e) => {
                                warn!(error = %e, "ping_send_failed");
                                self.session.record_ping(false);
                            }
                        }
                    }
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
