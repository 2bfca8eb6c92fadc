use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One (price, size) level of a book side
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub size: f64,
}

impl PriceLevel {
    pub fn new(price: f64, size: f64) -> Self {
        Self { price, size }
    }
}

impl From<(f64, f64)> for PriceLevel {
    fn from((price, size): (f64, f64)) -> Self {
        Self { price, size }
    }
}

/// Immutable capture of the order book at ingestion time.
///
/// Fields are private so a snapshot can only be built whole; readers get
/// slices. Sides are kept in feed order, which the venue sends best-first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    symbol: String,
    timestamp: DateTime<Utc>,
    bids: Vec<PriceLevel>,
    asks: Vec<PriceLevel>,
}

impl Snapshot {
    /// Build a snapshot stamped with the local clock
    pub fn new(symbol: impl Into<String>, bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> Self {
        Self::with_timestamp(symbol, Utc::now(), bids, asks)
    }

    pub fn with_timestamp(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            bids,
            asks,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn bids(&self) -> &[PriceLevel] {
        &self.bids
    }

    pub fn asks(&self) -> &[PriceLevel] {
        &self.asks
    }

    #[inline]
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.first().copied()
    }

    #[inline]
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.first().copied()
    }

    /// True when both sides carry at least one level
    #[inline]
    pub fn is_two_sided(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }

    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) * 0.5),
            _ => None,
        }
    }
}

/// Output of one simulation cycle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Average fill price over the ask walk minus the best bid
    pub slippage: f64,
    pub fees: f64,
    pub market_impact: f64,
    pub net_cost: f64,
    /// Estimated probability that the order executes as maker
    pub maker_taker_ratio: f64,
    /// Units the ask walk actually filled (below the order size on thin books)
    pub filled_quantity: f64,
    /// Time spent inside the simulation itself, not feed latency
    pub latency: Duration,
}

impl SimulationResult {
    /// The "no data yet" result
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn latency_ms(&self) -> f64 {
        self.latency.as_secs_f64() * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_accessors() {
        let snapshot = Snapshot::new(
            "BTC-USDT-SWAP",
            vec![PriceLevel::new(100.0, 10.0)],
            vec![PriceLevel::new(101.0, 5.0), PriceLevel::new(102.0, 10.0)],
        );

        assert_eq!(snapshot.symbol(), "BTC-USDT-SWAP");
        assert_eq!(snapshot.best_bid(), Some(PriceLevel::new(100.0, 10.0)));
        assert_eq!(snapshot.best_ask(), Some(PriceLevel::new(101.0, 5.0)));
        assert_eq!(snapshot.asks().len(), 2);
        assert!(snapshot.is_two_sided());
        assert!((snapshot.mid_price().unwrap() - 100.5).abs() < 1e-9);
    }

    #[test]
    fn test_one_sided_snapshot() {
        let snapshot = Snapshot::new("X", vec![], vec![PriceLevel::new(1.0, 1.0)]);
        assert!(!snapshot.is_two_sided());
        assert!(snapshot.mid_price().is_none());
    }

    #[test]
    fn test_empty_result_is_zero() {
        let result = SimulationResult::empty();
        assert_eq!(result.net_cost, 0.0);
        assert_eq!(result.latency, Duration::ZERO);
        assert_eq!(result.latency_ms(), 0.0);
    }
}
