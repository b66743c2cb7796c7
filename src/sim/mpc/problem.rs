//! The finite-horizon optimal control problem posed each control step.
//!
//! Decision `u[z, j]` is the supply damper position of zone `z` held over
//! horizon interval `j` (`j = 0..N`), flattened as `u[z * N + j]`. Interval
//! `j` ends at forecast node `j + 1`, whose occupancy, price and emission
//! factor apply to it. Zone CO2 follows the exact closed-form balance used by
//! the building spaces; both fans are driven by the total supply flow.

use std::time::Duration;

use ndarray::{Array1, Array2};

use super::ForecastWindow;
use crate::error::SolveFailure;
use crate::sim::components::fan::FanCurve;
use crate::sim::components::zone::{balance_coefficients, co2_after};
use crate::sim::config::MpcWeights;
use crate::sim::graph::wiring::MpcZone;
use crate::sim::scalar::Scalar;

/// Joules per MWh, converting `W·s · currency/MWh` into currency and
/// `W·s · g/kWh` into kg.
const J_PER_MWH: f64 = 3.6e9;

#[derive(Debug, Clone)]
pub struct MpcProblem {
    pub zones: Vec<MpcZone>,
    pub supply_fan: Option<FanCurve>,
    pub exhaust_fan: Option<FanCurve>,
    pub weights: MpcWeights,
    /// Measured CO2 per zone at the start of the horizon [ppm].
    pub initial_co2: Vec<f64>,
    /// Damper position per zone currently applied.
    pub current_position: Vec<f64>,
    pub forecast: ForecastWindow,
    pub horizon: usize,
    /// Length of one horizon interval [s].
    pub interval_s: f64,
    pub threshold_ppm: f64,
    pub outdoor_ppm: f64,
    pub infiltration_rate_per_s: f64,
    pub generation_per_person: f64,
    pub max_iterations: usize,
    pub time_limit: Option<Duration>,
}

/// Predicted evolution for one decision vector.
#[derive(Debug, Clone)]
pub struct Rollout<T> {
    /// `[zone][node]`.
    pub co2: Vec<Vec<T>>,
    /// Cumulative values per node.
    pub cost: Vec<T>,
    pub impact: Vec<T>,
    pub emission: Vec<T>,
}

impl<T: Scalar> Rollout<T> {
    pub fn objective(&self, weights: &MpcWeights) -> T {
        let last = self.cost.len() - 1;
        T::constant(weights.w1) * self.cost[last]
            + T::constant(weights.w2) * self.impact[last]
            + T::constant(weights.w3) * self.emission[last]
    }
}

/// Optimal horizon returned by a solver.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    /// `[zones, N + 1]`, column 0 is the currently applied position.
    pub positions: Array2<f64>,
    /// `[zones, N + 1]`, column 0 is the measured concentration.
    pub co2: Array2<f64>,
    pub cost: Array1<f64>,
    pub impact: Array1<f64>,
    pub emission: Array1<f64>,
    pub price: Array1<f64>,
    pub objective: f64,
    pub iterations: usize,
}

impl MpcProblem {
    pub fn num_zones(&self) -> usize {
        self.zones.len()
    }

    pub fn num_decisions(&self) -> usize {
        self.zones.len() * self.horizon
    }

    /// Rejects inconsistent dimensions before any solve.
    pub fn check(&self) -> Result<(), SolveFailure> {
        let nz = self.zones.len();
        let nodes = self.horizon + 1;
        let reject = |msg: String| Err(SolveFailure::Rejected(msg));
        if self.horizon == 0 {
            return reject("empty horizon".into());
        }
        if self.initial_co2.len() != nz || self.current_position.len() != nz {
            return reject(format!("expected {nz} zone states"));
        }
        if self.forecast.nodes() != nodes || self.forecast.occupancy.dim() != (nz, nodes) {
            return reject(format!("forecast does not span {nodes} nodes for {nz} zones"));
        }
        if self.zones.iter().any(|z| !(z.volume > 0.0)) {
            return reject("zone volume must be positive".into());
        }
        Ok(())
    }

    pub fn rollout<T: Scalar>(&self, u: &[T]) -> Rollout<T> {
        let n = self.horizon;
        let dt = self.interval_s;
        let zero = T::constant(0.0);

        let mut co2: Vec<Vec<T>> = self
            .initial_co2
            .iter()
            .map(|&c| {
                let mut v = Vec::with_capacity(n + 1);
                v.push(T::constant(c));
                v
            })
            .collect();
        let mut cost = vec![zero];
        let mut impact = vec![zero];
        let mut emission = vec![zero];

        for j in 0..n {
            let node = j + 1;
            let mut total_flow = zero;
            let mut step_impact = zero;
            for (z, zone) in self.zones.iter().enumerate() {
                let flow = u[z * n + j] * T::constant(zone.supply_flow_max);
                total_flow = total_flow + flow;

                let occupants = self.forecast.occupancy[[z, node]];
                let (a, b) = balance_coefficients(
                    flow,
                    occupants,
                    zone.volume,
                    self.infiltration_rate_per_s,
                    self.generation_per_person,
                    self.outdoor_ppm,
                );
                let next = co2_after(co2[z][j], a, b, dt);
                co2[z].push(next);

                let excess = (next - T::constant(self.threshold_ppm)).positive_part();
                step_impact = step_impact + excess * T::constant(occupants * dt);
            }

            let mut power = zero;
            for fan in self.supply_fan.iter().chain(self.exhaust_fan.iter()) {
                power = power + fan.power(total_flow);
            }
            let energy = power * T::constant(dt / J_PER_MWH);
            cost.push(cost[j] + energy * T::constant(self.forecast.price[node]));
            emission.push(emission[j] + energy * T::constant(self.forecast.emission_factor[node]));
            impact.push(impact[j] + step_impact);
        }

        Rollout {
            co2,
            cost,
            impact,
            emission,
        }
    }

    pub fn objective<T: Scalar>(&self, u: &[T]) -> T {
        self.rollout(u).objective(&self.weights)
    }

    /// Evaluates `u` and packs the horizon into diagnostic arrays.
    pub fn trajectory(&self, u: &[f64], iterations: usize) -> Trajectory {
        let nz = self.num_zones();
        let nodes = self.horizon + 1;
        let rollout = self.rollout(u);

        let mut positions = Array2::zeros((nz, nodes));
        let mut co2 = Array2::zeros((nz, nodes));
        for z in 0..nz {
            positions[[z, 0]] = self.current_position[z];
            for j in 0..self.horizon {
                positions[[z, j + 1]] = u[z * self.horizon + j];
            }
            for (j, c) in rollout.co2[z].iter().enumerate() {
                co2[[z, j]] = *c;
            }
        }

        Trajectory {
            positions,
            co2,
            objective: rollout.objective(&self.weights),
            cost: Array1::from(rollout.cost),
            impact: Array1::from(rollout.impact),
            emission: Array1::from(rollout.emission),
            price: self.forecast.price.clone(),
            iterations,
        }
    }
}
