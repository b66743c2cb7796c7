use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};

use super::forecast::{ForecastSource, window};
use super::{MpcLog, MpcProblem, OptimalControlSolver, Trajectory};
use crate::EntityId;
use crate::error::SolveFailure;
use crate::sim::components::fan::FanCurve;
use crate::sim::config::MpcWeights;
use crate::sim::framework::{Component, InputSpec, Inputs, PropertyMap, StepContext, Value};
use crate::sim::graph::wiring::MpcZone;

/// Output property carrying the decision for `zone`.
pub fn signal_property(zone: &EntityId) -> String {
    format!("outputSignal {zone}")
}

/// Input property carrying the measured CO2 of `zone`.
pub fn co2_property(zone: &EntityId) -> String {
    format!("CO2 {zone}")
}

/// Input property carrying the current occupancy of `zone`.
pub fn occupancy_property(zone: &EntityId) -> String {
    format!("occ {zone}")
}

/// Turns a trajectory whose arrays do not span `[zones, horizon + 1]` into a failure.
pub fn checked_shape(
    outcome: Result<Trajectory, SolveFailure>,
    zones: usize,
    horizon: usize,
) -> Result<Trajectory, SolveFailure> {
    let expected = (zones, horizon + 1);
    let trajectory = outcome?;
    if trajectory.positions.dim() != expected || trajectory.co2.dim() != expected {
        return Err(SolveFailure::Rejected(format!(
            "trajectory shape {:?} does not match {expected:?}",
            trajectory.positions.dim()
        )));
    }
    Ok(trajectory)
}

/// Damper signals to apply after a solve.
///
/// A solved horizon yields its first decision per zone. A failed solve closes
/// every damper on the first control step and otherwise holds the previous
/// signal. The result is always within `[0, 1]`.
pub fn fallback_signals(
    outcome: &Result<Trajectory, SolveFailure>,
    is_first_control_step: bool,
    previous: &[Value],
) -> Vec<f64> {
    let bounded = |v: f64| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
    match outcome {
        Ok(t) => (0..previous.len())
            .map(|z| t.positions.get([z, 1]).copied().map_or(0.0, bounded))
            .collect(),
        Err(_) if is_first_control_step => vec![0.0; previous.len()],
        Err(_) => previous
            .iter()
            .map(|v| v.as_f64().map_or(0.0, bounded))
            .collect(),
    }
}

/// Receding-horizon supervisor of one ventilation sub-system.
pub struct Supervisor {
    id: EntityId,
    zones: Vec<MpcZone>,
    supply_fan: Option<FanCurve>,
    exhaust_fan: Option<FanCurve>,
    weights: Option<MpcWeights>,
    forecast: Arc<dyn ForecastSource>,
    solver: Arc<dyn OptimalControlSolver>,
    log: MpcLog,
}

impl Supervisor {
    pub fn new(
        id: EntityId,
        zones: Vec<MpcZone>,
        forecast: Arc<dyn ForecastSource>,
        solver: Arc<dyn OptimalControlSolver>,
    ) -> Self {
        let log = MpcLog::new(zones.iter().map(|z| z.zone.to_string()).collect());
        Self {
            id,
            zones,
            supply_fan: None,
            exhaust_fan: None,
            weights: None,
            forecast,
            solver,
            log,
        }
    }

    pub fn with_fans(mut self, supply: Option<FanCurve>, exhaust: Option<FanCurve>) -> Self {
        self.supply_fan = supply;
        self.exhaust_fan = exhaust;
        self
    }

    /// Overrides the run-wide objective weights.
    pub fn with_weights(mut self, weights: Option<MpcWeights>) -> Self {
        self.weights = weights;
        self
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn zone_ids(&self) -> Vec<EntityId> {
        self.zones.iter().map(|z| z.zone.clone()).collect()
    }

    pub fn forecast(&self) -> &dyn ForecastSource {
        self.forecast.as_ref()
    }

    pub fn log(&self) -> &MpcLog {
        &self.log
    }

    fn problem(&self, ctx: &StepContext, input: &Inputs, previous: &[Value]) -> Result<MpcProblem> {
        let config = ctx.config;
        let zone_ids = self.zone_ids();
        let forecast = window(
            self.forecast.as_ref(),
            ctx.time.standard,
            config.control_step_s,
            config.horizon_steps,
            &zone_ids,
        )?;
        let initial_co2 = zone_ids
            .iter()
            .map(|z| input.scalar(&co2_property(z)).unwrap_or(config.initial_co2_ppm))
            .collect();
        let current_position = previous.iter().map(|v| v.as_f64().unwrap_or(0.0)).collect();

        Ok(MpcProblem {
            zones: self.zones.clone(),
            supply_fan: self.supply_fan,
            exhaust_fan: self.exhaust_fan,
            weights: self.weights.unwrap_or(config.mpc_weights),
            initial_co2,
            current_position,
            forecast,
            horizon: config.horizon_steps,
            interval_s: f64::from(config.control_step_s),
            threshold_ppm: config.co2_threshold_ppm,
            outdoor_ppm: config.outdoor_co2_ppm,
            infiltration_rate_per_s: config.infiltration_rate_per_s,
            generation_per_person: config.co2_generation_m3_per_s_per_person,
            max_iterations: config.solver_max_iterations,
            time_limit: config.solver_time_limit_s.map(Duration::from_secs_f64),
        })
    }
}

impl Component for Supervisor {
    fn name(&self) -> &'static str {
        "systemMPC"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        self.zones
            .iter()
            .flat_map(|z| {
                [
                    InputSpec::one(co2_property(&z.zone)),
                    InputSpec::one(occupancy_property(&z.zone)),
                ]
            })
            .collect()
    }

    fn init(&mut self, output: &mut PropertyMap) -> Result<()> {
        for z in &self.zones {
            output.declare(&signal_property(&z.zone));
        }
        Ok(())
    }

    fn step(&mut self, ctx: &StepContext, input: &Inputs, output: &mut PropertyMap) -> Result<()> {
        let zone_ids = self.zone_ids();
        let previous: Vec<Value> = zone_ids
            .iter()
            .map(|z| output.get(&signal_property(z)).unwrap_or_default())
            .collect();

        let problem = self.problem(ctx, input, &previous)?;
        let outcome = checked_shape(self.solver.solve(&problem), zone_ids.len(), problem.horizon);
        let control_index = ctx.control_index();

        match &outcome {
            Ok(t) => debug!(
                supervisor = %self.id,
                control_index,
                iterations = t.iterations,
                objective = t.objective,
                "horizon solved"
            ),
            Err(e) => warn!(
                supervisor = %self.id,
                control_index,
                error = %e,
                "no solution for damper control, applying fail-safe signals"
            ),
        }

        let signals = fallback_signals(&outcome, control_index == 0, &previous);
        for (zone, signal) in zone_ids.iter().zip(signals) {
            output.set(&signal_property(zone), signal);
        }
        self.log.record(
            control_index,
            ctx.time.local,
            &problem.forecast.price,
            &outcome,
        );
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
