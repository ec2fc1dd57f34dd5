//! Engine: the async service over the repositories and the self-play loop.

pub mod service;
pub mod simulation;

pub use service::{ActionOutcome, AutomatedResponse, EconomyService, Movement, TradeResponse};
pub use simulation::{Simulation, SimulationReport};
