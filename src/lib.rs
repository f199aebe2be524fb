pub mod engine;
pub mod error;
pub mod export;
pub mod grid;
pub mod particle;
pub mod rng;
pub mod scenario;
pub mod site;
pub mod web;
pub mod wind;

pub use engine::{ExecutionMode, GridSpec, ReleaseParams, RunOutcome, Simulation};
pub use error::{SimError, SimResult};
pub use grid::{BoundsPolicy, DensityGrid};
pub use particle::{Landing, Particle, Position};
pub use scenario::{Overrides, Scenario, ScenarioLoader};
pub use wind::{Direction, WindWeights};
