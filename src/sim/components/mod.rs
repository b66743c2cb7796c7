//! Per-kind step logic of the plant and control entities.

pub mod controller;
pub mod damper;
pub mod fan;
pub mod occupancy;
pub mod outdoor;
pub mod sensor;
pub mod tiers;
pub mod zone;

pub use controller::{ControlLawConfig, Controller};
pub use damper::{Damper, OperationMode};
pub use fan::{Fan, FanCurve};
pub use occupancy::{Occupancy, OccupancyConfig, OccupancyRow};
pub use outdoor::OutdoorEnvironment;
pub use sensor::Sensor;
pub use tiers::TierTable;
pub use zone::{BuildingSpace, balance_coefficients, co2_after};
