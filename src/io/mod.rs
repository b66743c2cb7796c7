//! File I/O for scenarios and simulation results.

pub mod results;
pub mod scenario;

pub use results::{to_results_string, write_results};
pub use scenario::{Scenario, read_forecast, read_scenario, write_scenario};
