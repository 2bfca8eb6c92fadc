//! Trade Simulator Backend Library
//!
//! Streams L2 order-book snapshots from an exchange feed into a bounded
//! history and continuously simulates the cost of a market order against
//! the latest book. The binary in `main.rs` wires these pieces together and
//! renders the result on a fixed refresh.

pub mod app;
pub mod book;
pub mod config;
pub mod feed;
pub mod models;
pub mod report;
pub mod signal;
pub mod sim;
pub mod state;

pub use app::Simulator;
pub use config::SimulatorConfig;
