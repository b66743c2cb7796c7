//! Step-based co-simulation of CO2 dynamics and ventilation control.
//!
//! A plant (zones, dampers, fans, sensors, controllers and optional MPC
//! supervisors) is wired into an entity graph and stepped through a fixed
//! phase order on a DST-aware timeline.

pub mod error;
pub mod io;
pub mod sim;
pub mod uid;

// Prelude
pub use error::{SetupError, SolveFailure};
pub use sim::config::{MpcWeights, SimConfig};
pub use sim::model::{Model, Simulation, SimulationOutcome};
pub use uid::EntityId;
