//! Text presentation of the latest result

use std::fmt::Write;

use crate::{config::SimulatorConfig, models::SimulationResult};

/// ANSI clear-screen plus cursor home
pub const CLEAR_SCREEN: &str = "\x1B[2J\x1B[1;1H";

/// Render the status block shown on every refresh
pub fn render(config: &SimulatorConfig, result: &SimulationResult) -> String {
    let mut out = String::with_capacity(512);
    let params = &config.simulation;

    // Writing into a String cannot fail
    let _ = writeln!(out, "Trade Simulator");
    let _ = writeln!(out, "----------------------");
    let _ = writeln!(out, "Exchange: {}", config.labels.exchange);
    let _ = writeln!(out, "Asset: {}", config.labels.asset);

    let _ = writeln!(out, "\nInput Parameters:");
    let _ = writeln!(out, "Order Type: Market");
    let _ = writeln!(out, "Quantity: {} USD", params.quantity);
    let _ = writeln!(out, "Volatility: {}", params.volatility);
    let _ = writeln!(out, "Fee Tier: {}%", params.fee_tier * 100.0);

    let _ = writeln!(out, "\nOutput Parameters:");
    let _ = writeln!(out, "Expected Slippage: {:.6}", result.slippage);
    let _ = writeln!(out, "Expected Fees: {:.6}", result.fees);
    let _ = writeln!(out, "Market Impact: {:.6}", result.market_impact);
    let _ = writeln!(out, "Net Cost: {:.6}", result.net_cost);
    let _ = writeln!(out, "Maker/Taker Ratio: {:.6}", result.maker_taker_ratio);
    if result.filled_quantity > 0.0 && result.filled_quantity < params.quantity {
        let _ = writeln!(
            out,
            "Filled: {} of {} (book depth exhausted)",
            result.filled_quantity, params.quantity
        );
    }
    let _ = writeln!(out, "Latency: {:.3} ms", result.latency_ms());

    if result.latency > config.latency_warn() {
        let _ = writeln!(out, "\nWarning: High latency detected!");
    }

    let _ = writeln!(out, "\nPress Ctrl+C to exit...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_render_defaults() {
        let config = SimulatorConfig::default();
        let text = render(&config, &SimulationResult::empty());

        assert!(text.contains("Exchange: OKX"));
        assert!(text.contains("Asset: BTC-USDT-SWAP"));
        assert!(text.contains("Quantity: 100 USD"));
        assert!(text.contains("Fee Tier: 0.1%"));
        assert!(text.contains("Net Cost: 0.000000"));
        assert!(!text.contains("High latency"));
        assert!(!text.contains("Filled:"));
    }

    #[test]
    fn test_render_high_latency_and_partial_fill() {
        let config = SimulatorConfig::default();
        let result = SimulationResult {
            slippage: 1.25,
            filled_quantity: 15.0,
            latency: Duration::from_millis(150),
            ..Default::default()
        };
        let text = render(&config, &result);

        assert!(text.contains("Expected Slippage: 1.250000"));
        assert!(text.contains("Filled: 15 of 100"));
        assert!(text.contains("Latency: 150.000 ms"));
        assert!(text.contains("Warning: High latency detected!"));
    }
}
