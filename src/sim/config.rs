use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::SetupError;
use crate::sim::components::controller::ControlLawConfig;
use crate::sim::time::{DstSwitch, default_dst_switches};

/// Objective weights of the MPC supervisor.
///
/// `w1` weighs energy cost, `w2` the CO2 comfort impact (ppm·s·occ above
/// threshold) and `w3` the emission caused by fan electricity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MpcWeights {
    pub w1: f64,
    pub w2: f64,
    pub w3: f64,
}

impl Default for MpcWeights {
    fn default() -> Self {
        Self {
            w1: 0.0,
            w2: 0.27 / (1000.0 * 3600.0),
            w3: 4.49079,
        }
    }
}

/// Simulation-wide settings.
///
/// Constructed once, validated, then passed by reference to every component
/// and to the scheduler. Nothing mutates it during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Local wall-clock start of the simulation.
    pub start: NaiveDateTime,
    /// Local wall-clock end of the simulation (inclusive).
    pub end: NaiveDateTime,
    /// Base step in seconds; every component executes once per base step.
    pub base_step_s: u32,
    /// MPC control period in seconds (integer multiple of `base_step_s`).
    pub control_step_s: u32,
    /// Number of control steps the MPC optimizes over.
    pub horizon_steps: usize,
    /// Outdoor CO2 concentration [ppm].
    pub outdoor_co2_ppm: f64,
    /// Infiltration air change rate [1/s].
    pub infiltration_rate_per_s: f64,
    /// CO2 generated per occupant [m³/s].
    pub co2_generation_m3_per_s_per_person: f64,
    /// Zone/sensor concentration reported on the first step [ppm].
    pub initial_co2_ppm: f64,
    /// Comfort threshold above which CO2 is penalized [ppm].
    pub co2_threshold_ppm: f64,
    /// Control law used by controllers that do not specify their own.
    pub control: ControlLawConfig,
    pub mpc_weights: MpcWeights,
    pub solver_max_iterations: usize,
    pub solver_time_limit_s: Option<f64>,
    /// Ordered DST switch instants (standard time).
    pub dst_switches: Vec<DstSwitch>,
    /// Leading window dropped from the results table [s].
    pub warmup_s: Option<u32>,
    /// Solve supervisors of independent systems concurrently.
    pub parallel_supervisors: bool,
    /// Log progress every N steps.
    pub progress_interval: Option<usize>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            start: naive(2020, 1, 3, 0),
            end: naive(2020, 1, 4, 0),
            base_step_s: 600,
            control_step_s: 1200,
            horizon_steps: 12,
            outdoor_co2_ppm: 400.0,
            infiltration_rate_per_s: 0.05 / 3600.0,
            co2_generation_m3_per_s_per_person: 15.0 / (3600.0 * 1000.0),
            initial_co2_ppm: 400.0,
            co2_threshold_ppm: 700.0,
            control: ControlLawConfig::default(),
            mpc_weights: MpcWeights::default(),
            solver_max_iterations: 5000,
            solver_time_limit_s: None,
            dst_switches: default_dst_switches(),
            warmup_s: None,
            parallel_supervisors: true,
            progress_interval: None,
        }
    }
}

impl SimConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base step in seconds as a float, for physics.
    pub fn dt(&self) -> f64 {
        f64::from(self.base_step_s)
    }

    /// Number of base steps per control step.
    pub fn control_ratio(&self) -> usize {
        (self.control_step_s / self.base_step_s.max(1)) as usize
    }

    /// Whether the MPC supervisor re-solves at `step_index`.
    pub fn is_control_step(&self, step_index: usize) -> bool {
        step_index % self.control_ratio().max(1) == 0
    }

    /// Number of leading result rows covered by the warm-up window.
    pub fn warmup_steps(&self) -> usize {
        match self.warmup_s {
            Some(w) => w.div_ceil(self.base_step_s.max(1)) as usize,
            None => 0,
        }
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        let invalid = |msg: String| Err(SetupError::InvalidConfiguration(msg));
        if self.base_step_s == 0 {
            return invalid("base_step_s must be positive".into());
        }
        if self.control_step_s == 0 || self.control_step_s % self.base_step_s != 0 {
            return invalid(format!(
                "control_step_s ({}) must be a positive multiple of base_step_s ({})",
                self.control_step_s, self.base_step_s
            ));
        }
        if self.horizon_steps == 0 {
            return invalid("horizon_steps must be at least 1".into());
        }
        if self.end < self.start {
            return invalid(format!("end {} precedes start {}", self.end, self.start));
        }
        if !(self.infiltration_rate_per_s >= 0.0) {
            return invalid("infiltration_rate_per_s must be non-negative".into());
        }
        if self
            .dst_switches
            .windows(2)
            .any(|pair| pair[1].at <= pair[0].at)
        {
            return invalid("dst_switches must be strictly chronological".into());
        }
        Ok(())
    }
}

fn naive(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .unwrap_or_default()
}
