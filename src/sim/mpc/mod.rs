//! Receding-horizon (MPC) supervision of ventilation sub-systems.

pub mod forecast;
pub mod log;
pub mod problem;
pub mod solver;
pub mod supervisor;

pub use forecast::{ForecastRow, ForecastSource, ForecastWindow, TableForecast};
pub use log::{MpcLog, MpcLogRow, SolveStatus};
pub use problem::{MpcProblem, Rollout, Trajectory};
pub use solver::{OptimalControlSolver, ProjectedGradientSolver};
pub use supervisor::{Supervisor, fallback_signals};
