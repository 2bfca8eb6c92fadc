//! Cost simulation: the engine, its coordinator thread and the result slot

pub mod coordinator;
pub mod engine;
pub mod store;

pub use coordinator::{Coordinator, CoordinatorState, CoordinatorStats};
pub use engine::{
    CostModelConfig, MakerTakerCoefficients, SimulationEngine, SimulationParams, ValidationError,
};
pub use store::{PublishedResult, ResultStore};
