//! Market Order Cost Simulation
//!
//! Estimates what a hypothetical market buy of `quantity` units would cost
//! against one order-book snapshot:
//! - Slippage from walking the ask side (partial fills allowed)
//! - Flat linear fee
//! - Almgren-Chriss style market impact with fixed coefficients
//! - Logistic maker/taker probability
//!
//! The computation is pure. Coefficients live in [`CostModelConfig`] so the
//! model can be recalibrated from configuration.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::models::{PriceLevel, SimulationResult, Snapshot};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Cost model coefficients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostModelConfig {
    /// Temporary impact coefficient (linear in quantity)
    #[serde(default = "default_eta")]
    pub eta: f64,
    /// Permanent impact coefficient (quadratic in quantity)
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    /// Execution horizon in seconds
    #[serde(default = "default_time_horizon_secs")]
    pub time_horizon_secs: f64,
    #[serde(default)]
    pub maker_taker: MakerTakerCoefficients,
}

fn default_eta() -> f64 {
    0.01
}

fn default_gamma() -> f64 {
    0.0001
}

fn default_time_horizon_secs() -> f64 {
    1.0
}

impl Default for CostModelConfig {
    fn default() -> Self {
        Self {
            eta: default_eta(),
            gamma: default_gamma(),
            time_horizon_secs: default_time_horizon_secs(),
            maker_taker: MakerTakerCoefficients::default(),
        }
    }
}

/// Logistic model `1 / (1 + exp(-(q*quantity - v*volatility + intercept)))`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MakerTakerCoefficients {
    #[serde(default = "default_quantity_coef")]
    pub quantity_coef: f64,
    #[serde(default = "default_volatility_coef")]
    pub volatility_coef: f64,
    #[serde(default = "default_intercept")]
    pub intercept: f64,
}

fn default_quantity_coef() -> f64 {
    0.005
}

fn default_volatility_coef() -> f64 {
    0.1
}

fn default_intercept() -> f64 {
    2.0
}

impl Default for MakerTakerCoefficients {
    fn default() -> Self {
        Self {
            quantity_coef: default_quantity_coef(),
            volatility_coef: default_volatility_coef(),
            intercept: default_intercept(),
        }
    }
}

// =============================================================================
// INPUTS AND ERRORS
// =============================================================================

/// Order parameters for one simulation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default = "default_volatility")]
    pub volatility: f64,
    /// Fee rate in [0, 1]
    #[serde(default = "default_fee_tier")]
    pub fee_tier: f64,
}

fn default_quantity() -> f64 {
    100.0
}

fn default_volatility() -> f64 {
    0.02
}

fn default_fee_tier() -> f64 {
    0.001
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            quantity: default_quantity(),
            volatility: default_volatility(),
            fee_tier: default_fee_tier(),
        }
    }
}

impl SimulationParams {
    pub fn new(quantity: f64, volatility: f64, fee_tier: f64) -> Self {
        Self {
            quantity,
            volatility,
            fee_tier,
        }
    }

    /// Checks run in order; NaN fails every comparison and is rejected
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.quantity > 0.0) || !self.quantity.is_finite() {
            return Err(ValidationError::InvalidQuantity(self.quantity));
        }
        if !(self.volatility >= 0.0) || !self.volatility.is_finite() {
            return Err(ValidationError::InvalidVolatility(self.volatility));
        }
        if !(0.0..=1.0).contains(&self.fee_tier) {
            return Err(ValidationError::InvalidFeeTier(self.fee_tier));
        }
        Ok(())
    }
}

/// Caller error in simulation parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValidationError {
    InvalidQuantity(f64),
    InvalidVolatility(f64),
    InvalidFeeTier(f64),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQuantity(q) => write!(f, "quantity must be positive (got {})", q),
            Self::InvalidVolatility(v) => write!(f, "volatility cannot be negative (got {})", v),
            Self::InvalidFeeTier(t) => write!(f, "fee tier must be between 0 and 1 (got {})", t),
        }
    }
}

impl std::error::Error for ValidationError {}

// =============================================================================
// COST COMPONENTS
// =============================================================================

/// Outcome of sweeping one book side
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DepthWalk {
    pub filled: f64,
    pub cost: f64,
}

impl DepthWalk {
    /// Sweep `levels` best-to-worst until `quantity` is filled or depth runs out
    pub fn sweep(levels: &[PriceLevel], quantity: f64) -> Self {
        let mut walk = Self::default();

        for level in levels {
            let remaining = quantity - walk.filled;
            if remaining <= 0.0 {
                break;
            }
            let take = remaining.min(level.size.max(0.0));
            walk.cost += take * level.price;
            walk.filled += take;
        }

        walk
    }

    pub fn average_price(&self) -> Option<f64> {
        if self.filled > 0.0 {
            Some(self.cost / self.filled)
        } else {
            None
        }
    }
}

/// Average ask-walk price minus best bid, averaged over the filled quantity.
///
/// Returns the slippage and the filled quantity. A book with no ask size
/// fills nothing and reports zero slippage.
pub fn slippage(snapshot: &Snapshot, quantity: f64) -> (f64, f64) {
    let Some(best_bid) = snapshot.best_bid() else {
        return (0.0, 0.0);
    };

    let walk = DepthWalk::sweep(snapshot.asks(), quantity);
    match walk.average_price() {
        Some(avg) => (avg - best_bid.price, walk.filled),
        None => (0.0, 0.0),
    }
}

#[inline]
pub fn fees(quantity: f64, fee_tier: f64) -> f64 {
    quantity * fee_tier
}

/// Temporary + permanent + volatility terms
pub fn market_impact(model: &CostModelConfig, quantity: f64, volatility: f64) -> f64 {
    model.eta * quantity
        + model.gamma * quantity * quantity
        + volatility * quantity.sqrt() / model.time_horizon_secs.sqrt()
}

pub fn maker_taker_ratio(model: &CostModelConfig, quantity: f64, volatility: f64) -> f64 {
    let c = &model.maker_taker;
    let z = c.quantity_coef * quantity - c.volatility_coef * volatility + c.intercept;
    1.0 / (1.0 + (-z).exp())
}

// =============================================================================
// ENGINE
// =============================================================================

/// Stateless cost simulator bound to one set of model coefficients
#[derive(Debug, Clone, Default)]
pub struct SimulationEngine {
    model: CostModelConfig,
}

impl SimulationEngine {
    pub fn new(model: CostModelConfig) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &CostModelConfig {
        &self.model
    }

    /// Simulate a market buy against `snapshot`.
    ///
    /// Invalid parameters are an error even when no book is available. A
    /// missing or one-sided book yields [`SimulationResult::empty`].
    pub fn simulate(
        &self,
        params: &SimulationParams,
        snapshot: Option<&Snapshot>,
    ) -> Result<SimulationResult, ValidationError> {
        let start = Instant::now();

        params.validate()?;

        let book = match snapshot {
            Some(s) if s.is_two_sided() => s,
            _ => return Ok(SimulationResult::empty()),
        };

        let (slippage, filled_quantity) = slippage(book, params.quantity);
        let fees = fees(params.quantity, params.fee_tier);
        let market_impact = market_impact(&self.model, params.quantity, params.volatility);
        let maker_taker_ratio = maker_taker_ratio(&self.model, params.quantity, params.volatility);

        Ok(SimulationResult {
            slippage,
            fees,
            market_impact,
            net_cost: slippage + fees + market_impact,
            maker_taker_ratio,
            filled_quantity,
            latency: start.elapsed(),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_book() -> Snapshot {
        Snapshot::new(
            "BTC-USDT-SWAP",
            vec![PriceLevel::new(100.0, 10.0)],
            vec![PriceLevel::new(101.0, 5.0), PriceLevel::new(102.0, 10.0)],
        )
    }

    #[test]
    fn test_slippage_walks_ask_levels() {
        let engine = SimulationEngine::default();
        let params = SimulationParams::new(7.0, 0.01, 0.001);

        let result = engine.simulate(&params, Some(&sample_book())).unwrap();

        let expected = (5.0 * 101.0 + 2.0 * 102.0) / 7.0 - 100.0;
        assert!((result.slippage - expected).abs() < 1e-3);
        assert!((result.slippage - 9.0 / 7.0).abs() < 1e-9);
        assert_eq!(result.filled_quantity, 7.0);
    }

    #[test]
    fn test_slippage_single_level() {
        let (slip, filled) = slippage(&sample_book(), 3.0);
        assert!((slip - 1.0).abs() < 1e-9);
        assert_eq!(filled, 3.0);
    }

    #[test]
    fn test_partial_fill_divides_by_filled() {
        // 15 units of depth, 40 requested
        let (slip, filled) = slippage(&sample_book(), 40.0);
        let expected = (5.0 * 101.0 + 10.0 * 102.0) / 15.0 - 100.0;
        assert_eq!(filled, 15.0);
        assert!((slip - expected).abs() < 1e-9);
    }

    #[test]
    fn test_zero_size_asks_fill_nothing() {
        let book = Snapshot::new(
            "X",
            vec![PriceLevel::new(100.0, 1.0)],
            vec![PriceLevel::new(101.0, 0.0)],
        );
        assert_eq!(slippage(&book, 5.0), (0.0, 0.0));
    }

    #[test]
    fn test_validation_errors() {
        let engine = SimulationEngine::default();
        let book = sample_book();

        assert_eq!(
            engine.simulate(&SimulationParams::new(0.0, 0.01, 0.001), Some(&book)),
            Err(ValidationError::InvalidQuantity(0.0))
        );
        assert_eq!(
            engine.simulate(&SimulationParams::new(-1.0, 0.01, 0.001), Some(&book)),
            Err(ValidationError::InvalidQuantity(-1.0))
        );
        assert_eq!(
            engine.simulate(&SimulationParams::new(1.0, -0.5, 0.001), Some(&book)),
            Err(ValidationError::InvalidVolatility(-0.5))
        );
        assert_eq!(
            engine.simulate(&SimulationParams::new(1.0, 0.01, 1.5), Some(&book)),
            Err(ValidationError::InvalidFeeTier(1.5))
        );
        assert_eq!(
            engine.simulate(&SimulationParams::new(1.0, 0.01, -0.1), Some(&book)),
            Err(ValidationError::InvalidFeeTier(-0.1))
        );
        assert!(matches!(
            engine.simulate(&SimulationParams::new(f64::NAN, 0.01, 0.1), Some(&book)),
            Err(ValidationError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn test_validation_runs_without_book() {
        let engine = SimulationEngine::default();
        let result = engine.simulate(&SimulationParams::new(-1.0, 0.0, 0.0), None);
        assert!(matches!(result, Err(ValidationError::InvalidQuantity(_))));
    }

    #[test]
    fn test_fee_tier_bounds_inclusive() {
        assert!(SimulationParams::new(1.0, 0.0, 0.0).validate().is_ok());
        assert!(SimulationParams::new(1.0, 0.0, 1.0).validate().is_ok());
    }

    #[test]
    fn test_no_data_yields_zero_result() {
        let engine = SimulationEngine::default();
        let params = SimulationParams::default();

        assert_eq!(engine.simulate(&params, None), Ok(SimulationResult::empty()));

        let one_sided = Snapshot::new("X", vec![], vec![PriceLevel::new(101.0, 1.0)]);
        assert_eq!(
            engine.simulate(&params, Some(&one_sided)),
            Ok(SimulationResult::empty())
        );

        let no_asks = Snapshot::new("X", vec![PriceLevel::new(100.0, 1.0)], vec![]);
        assert_eq!(
            engine.simulate(&params, Some(&no_asks)),
            Ok(SimulationResult::empty())
        );
    }

    #[test]
    fn test_market_impact_positive() {
        let model = CostModelConfig::default();
        for &q in &[0.001, 1.0, 7.0, 100.0, 10_000.0] {
            for &v in &[0.0, 0.02, 1.0] {
                assert!(market_impact(&model, q, v) > 0.0, "q={} v={}", q, v);
            }
        }
    }

    #[test]
    fn test_market_impact_formula() {
        let model = CostModelConfig::default();
        let expected = 0.01 * 100.0 + 0.0001 * 100.0 * 100.0 + 0.02 * 10.0;
        assert!((market_impact(&model, 100.0, 0.02) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_maker_taker_ratio() {
        let model = CostModelConfig::default();
        let ratio = maker_taker_ratio(&model, 100.0, 0.02);
        let expected = 1.0 / (1.0 + (-(0.5 - 0.002 + 2.0_f64)).exp());
        assert!((ratio - expected).abs() < 1e-12);
        assert!(ratio > 0.0 && ratio < 1.0);
    }

    #[test]
    fn test_net_cost_is_sum() {
        let engine = SimulationEngine::default();
        let params = SimulationParams::new(7.0, 0.02, 0.001);
        let r = engine.simulate(&params, Some(&sample_book())).unwrap();

        assert!((r.fees - 0.007).abs() < 1e-12);
        assert!((r.net_cost - (r.slippage + r.fees + r.market_impact)).abs() < 1e-12);
    }

    #[test]
    fn test_custom_model_coefficients() {
        let mut model = CostModelConfig::default();
        model.eta = 0.0;
        model.gamma = 0.0;
        model.time_horizon_secs = 4.0;

        let engine = SimulationEngine::new(model);
        let r = engine
            .simulate(&SimulationParams::new(16.0, 1.0, 0.0), Some(&sample_book()))
            .unwrap();
        // 1.0 * sqrt(16) / sqrt(4)
        assert!((r.market_impact - 2.0).abs() < 1e-12);
    }
}
