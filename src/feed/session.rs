//! Feed Session Management
//!
//! Connection lifecycle for the order-book stream:
//! - State machine with well-defined transitions
//! - Exponential backoff with jitter and a consecutive-failure cap
//! - Outbound-idle heartbeat (keepalive ping)
//! - Lock-free session counters

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;

// =============================================================================
// STATE MACHINE
// =============================================================================

/// Connection state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Before the first connection attempt
    Init,
    /// TCP + TLS + WebSocket upgrade in progress
    Connecting,
    /// Receiving frames
    Streaming,
    /// Connection lost, waiting for backoff timer
    Reconnecting,
    /// Retry budget spent; no further attempts
    Exhausted,
    /// Graceful shutdown requested
    Shutdown,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "INIT"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Streaming => write!(f, "STREAMING"),
            Self::Reconnecting => write!(f, "RECONNECTING"),
            Self::Exhausted => write!(f, "EXHAUSTED"),
            Self::Shutdown => write!(f, "SHUTDOWN"),
        }
    }
}

/// Reason for state transition (for logging/metrics)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionReason {
    Started,
    ConnectSuccess,
    ConnectTimeout,
    HandshakeFailed,
    ReadError,
    ServerClose,
    RetriesExhausted,
    ShutdownRequested,
}

impl TransitionReason {
    /// Whether this reason counts against the retry budget
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout | Self::HandshakeFailed | Self::ReadError
        )
    }
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::ConnectSuccess => write!(f, "connect_ok"),
            Self::ConnectTimeout => write!(f, "connect_timeout"),
            Self::HandshakeFailed => write!(f, "handshake_failed"),
            Self::ReadError => write!(f, "read_error"),
            Self::ServerClose => write!(f, "server_close"),
            Self::RetriesExhausted => write!(f, "retries_exhausted"),
            Self::ShutdownRequested => write!(f, "shutdown"),
        }
    }
}

// =============================================================================
// EXPONENTIAL BACKOFF WITH JITTER
// =============================================================================

/// Backoff calculator with jitter and an attempt cap
#[derive(Debug)]
pub struct BackoffCalculator {
    config: SessionConfig,
    attempt: u32,
    rng_state: u64,
}

impl BackoffCalculator {
    pub fn new(config: SessionConfig) -> Self {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(12345);
        Self {
            config,
            attempt: 0,
            // xorshift must not start at zero
            rng_state: seed | 1,
        }
    }

    /// Fast PRNG for jitter (xorshift64)
    #[inline]
    fn next_random(&mut self) -> f64 {
        self.rng_state ^= self.rng_state << 13;
        self.rng_state ^= self.rng_state >> 7;
        self.rng_state ^= self.rng_state << 17;
        (self.rng_state as f64) / (u64::MAX as f64)
    }

    /// Next delay, or `None` once `max_retries` consecutive attempts are spent
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }

        let base = (self.config.retry_base_ms as f64)
            * self.config.backoff_multiplier.powi(self.attempt as i32);
        let capped = base.min(self.config.retry_max_ms as f64);

        let jitter_range = capped * self.config.jitter_factor;
        let jitter = (self.next_random() * 2.0 - 1.0) * jitter_range;
        let final_ms = (capped + jitter).max(0.0);

        self.attempt += 1;

        Some(Duration::from_millis(final_ms as u64))
    }

    pub fn is_exhausted(&self) -> bool {
        self.config.max_retries > 0 && self.attempt >= self.config.max_retries
    }

    /// Reset on successful connection
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

// =============================================================================
// HEARTBEAT MONITOR
// =============================================================================

/// Result of heartbeat check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    Ok,
    /// Outbound side has been idle for the full interval
    SendPing,
}

/// Tracks outbound activity and decides when to send a keepalive
#[derive(Debug)]
pub struct HeartbeatMonitor {
    interval: Duration,
    last_outbound: Instant,
    last_pong: Option<Instant>,
}

impl HeartbeatMonitor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_outbound: Instant::now(),
            last_pong: None,
        }
    }

    /// Reset state for new connection
    pub fn reset(&mut self) {
        self.last_outbound = Instant::now();
        self.last_pong = None;
    }

    /// Any frame written counts, including pings and pongs
    #[inline]
    pub fn record_outbound(&mut self) {
        self.last_outbound = Instant::now();
    }

    pub fn record_pong_received(&mut self) {
        self.last_pong = Some(Instant::now());
    }

    pub fn last_pong(&self) -> Option<Instant> {
        self.last_pong
    }

    pub fn check(&self) -> HeartbeatAction {
        if self.last_outbound.elapsed() >= self.interval {
            HeartbeatAction::SendPing
        } else {
            HeartbeatAction::Ok
        }
    }

    /// Time until the outbound side becomes idle
    pub fn time_until_next_check(&self) -> Duration {
        self.interval
            .saturating_sub(self.last_outbound.elapsed())
            .max(Duration::from_millis(10))
    }
}

// =============================================================================
// SESSION METRICS
// =============================================================================

/// Session metrics for monitoring
#[derive(Debug, Default)]
pub struct SessionMetrics {
    pub connections_attempted: AtomicU64,
    pub connections_succeeded: AtomicU64,
    pub connections_failed: AtomicU64,
    pub reconnections: AtomicU64,
    pub server_closes: AtomicU64,
    pub pings_sent: AtomicU64,
    pub ping_failures: AtomicU64,
    pub total_downtime_ms: AtomicU64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_ping(&self, ok: bool) {
        if ok {
            self.pings_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.ping_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn add_downtime(&self, duration: Duration) {
        self.total_downtime_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Summary string for logging
    pub fn summary(&self) -> String {
        format!(
            "connects={}/{} failures={} reconnects={} server_closes={} pings={} ping_failures={} downtime_ms={}",
            self.connections_succeeded.load(Ordering::Relaxed),
            self.connections_attempted.load(Ordering::Relaxed),
            self.connections_failed.load(Ordering::Relaxed),
            self.reconnections.load(Ordering::Relaxed),
            self.server_closes.load(Ordering::Relaxed),
            self.pings_sent.load(Ordering::Relaxed),
            self.ping_failures.load(Ordering::Relaxed),
            self.total_downtime_ms.load(Ordering::Relaxed),
        )
    }
}

// =============================================================================
// SESSION MANAGER
// =============================================================================

/// Session manager coordinating state, backoff, heartbeat and metrics
#[derive(Debug)]
pub struct SessionManager {
    config: SessionConfig,
    state: RwLock<SessionState>,
    backoff: RwLock<BackoffCalculator>,
    heartbeat: RwLock<HeartbeatMonitor>,
    metrics: SessionMetrics,
    disconnect_time: RwLock<Option<Instant>>,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        let backoff = BackoffCalculator::new(config.clone());
        let heartbeat = HeartbeatMonitor::new(config.heartbeat_interval());

        Self {
            config,
            state: RwLock::new(SessionState::Init),
            backoff: RwLock::new(backoff),
            heartbeat: RwLock::new(heartbeat),
            metrics: SessionMetrics::new(),
            disconnect_time: RwLock::new(None),
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Transition to new state with reason
    pub fn transition(&self, new_state: SessionState, reason: TransitionReason) {
        let old_state = {
            let mut state = self.state.write();
            let old = *state;
            *state = new_state;
            old
        };

        match new_state {
            SessionState::Connecting => {
                self.metrics
                    .connections_attempted
                    .fetch_add(1, Ordering::Relaxed);
            }
            SessionState::Streaming => {
                self.metrics
                    .connections_succeeded
                    .fetch_add(1, Ordering::Relaxed);
                self.backoff.write().reset();
                self.heartbeat.write().reset();
                if let Some(disc_time) = self.disconnect_time.write().take() {
                    self.metrics.add_downtime(disc_time.elapsed());
                }
            }
            SessionState::Reconnecting => {
                self.metrics.reconnections.fetch_add(1, Ordering::Relaxed);
                self.disconnect_time.write().get_or_insert_with(Instant::now);
                if reason.is_failure() {
                    self.metrics
                        .connections_failed
                        .fetch_add(1, Ordering::Relaxed);
                } else if reason == TransitionReason::ServerClose {
                    self.metrics.server_closes.fetch_add(1, Ordering::Relaxed);
                }
            }
            _ => {}
        }

        if reason.is_failure() || new_state == SessionState::Exhausted {
            warn!(
                from = %old_state,
                to = %new_state,
                reason = %reason,
                "session_transition"
            );
        } else {
            info!(
                from = %old_state,
                to = %new_state,
                reason = %reason,
                "session_transition"
            );
        }
    }

    /// Next backoff delay; `None` when the retry budget is spent
    pub fn next_backoff(&self) -> Option<Duration> {
        let next = self.backoff.write().next_backoff();
        if next.is_none() {
            debug!(
                max_retries = self.config.max_retries,
                "backoff_exhausted"
            );
        }
        next
    }

    pub fn backoff_attempt(&self) -> u32 {
        self.backoff.read().attempt()
    }

    pub fn record_outbound(&self) {
        self.heartbeat.write().record_outbound();
    }

    /// A failed ping still restarts the idle timer so it is retried one
    /// interval later rather than on every check
    pub fn record_ping(&self, ok: bool) {
        self.heartbeat.write().record_outbound();
        self.metrics.record_ping(ok);
    }

    pub fn record_pong_received(&self) {
        self.heartbeat.write().record_pong_received();
    }

    pub fn check_heartbeat(&self) -> HeartbeatAction {
        self.heartbeat.read().check()
    }

    pub fn heartbeat_check_interval(&self) -> Duration {
        self.heartbeat.read().time_until_next_check()
    }

    pub fn connect_timeout(&self) -> Duration {
        self.config.connect_timeout()
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

// =============================================================================
// TESTS
// =============================================================================
