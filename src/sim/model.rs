//! Model assembly and the simulation run loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::EntityId;
use crate::error::SetupError;
use crate::sim::components::{
    BuildingSpace, Controller, Damper, Fan, Occupancy, OutdoorEnvironment, Sensor,
};
use crate::sim::config::SimConfig;
use crate::sim::framework::{Pipeline, StepContext};
use crate::sim::graph::wiring::occupancy_id;
use crate::sim::graph::{
    Entity, EntityKind, EntityParams, EntitySpec, PlantDescription, normalize, resolve,
};
use crate::sim::kpi::{BuildingTotals, Tariff, air_quality_kpi, building_totals};
use crate::sim::mpc::forecast::window;
use crate::sim::mpc::{
    ForecastSource, MpcLog, OptimalControlSolver, ProjectedGradientSolver, Supervisor,
};
use crate::sim::recorder::{Recorder, ResultsTable};
use crate::sim::time::Timeline;

/// Everything a finished run produces.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationOutcome {
    pub results: ResultsTable,
    /// Diagnostic log of each MPC supervisor.
    pub mpc_logs: Vec<(EntityId, MpcLog)>,
    pub totals: BuildingTotals,
    /// [ppm·s·occ]
    pub air_quality_kpi: f64,
}

/// A plant description with its run-wide settings and collaborators.
pub struct Model {
    config: SimConfig,
    plant: PlantDescription,
    forecast: Option<Arc<dyn ForecastSource>>,
    solver: Arc<dyn OptimalControlSolver>,
}

impl Model {
    pub fn new(config: SimConfig, plant: PlantDescription) -> Self {
        Self {
            config,
            plant,
            forecast: None,
            solver: Arc::new(ProjectedGradientSolver::default()),
        }
    }

    pub fn with_forecast(mut self, forecast: Arc<dyn ForecastSource>) -> Self {
        self.forecast = Some(forecast);
        self
    }

    pub fn with_solver(mut self, solver: Arc<dyn OptimalControlSolver>) -> Self {
        self.solver = solver;
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Validates and wires the model.
    ///
    /// Every setup error surfaces here, before any step is simulated.
    pub fn build(self) -> Result<Simulation> {
        let Model {
            config,
            plant,
            forecast,
            solver,
        } = self;
        config.validate()?;
        let timeline = Timeline::build(
            config.start,
            config.end,
            config.base_step_s,
            &config.dst_switches,
        )?;

        let normalized = normalize(&plant, &config.control);
        let entities = normalized
            .entities
            .into_iter()
            .map(|spec| build_entity(spec, &config, forecast.as_ref(), &solver))
            .collect::<Result<Vec<_>>>()?;

        check_data_coverage(&entities, &config, &timeline)?;

        let graph = resolve(entities, &normalized.connections)
            .context("Failed to resolve entity inputs")?;
        info!(
            entities = graph.entities.len(),
            connections = normalized.connections.len(),
            steps = timeline.len(),
            "model built"
        );
        let pipeline = Pipeline::new(graph).with_parallelism(config.parallel_supervisors);

        Ok(Simulation {
            config,
            timeline,
            pipeline,
            forecast,
        })
    }

    /// Builds and runs the model to completion.
    pub fn run(self) -> Result<SimulationOutcome> {
        self.build()?.run()
    }
}

fn build_entity(
    spec: EntitySpec,
    config: &SimConfig,
    forecast: Option<&Arc<dyn ForecastSource>>,
    solver: &Arc<dyn OptimalControlSolver>,
) -> Result<Entity> {
    let EntitySpec {
        id,
        kind,
        contained_in,
        super_system,
        params,
    } = spec;
    let mut entity = match params {
        EntityParams::OutdoorEnvironment => Entity::new(id, kind, OutdoorEnvironment),
        EntityParams::Occupancy(source) => Entity::new(id, kind, Occupancy::new(source)),
        EntityParams::Sensor => Entity::new(id, kind, Sensor::new()),
        EntityParams::Controller(law) => {
            let controller = Controller::new(id.clone(), law, config);
            Entity::new(id, kind, controller)
        }
        EntityParams::Damper { flow_max, .. } => Entity::new(id, kind, Damper::new(flow_max)),
        EntityParams::Fan { curve, .. } => Entity::new(id, kind, Fan::new(curve)),
        EntityParams::BuildingSpace { volume } => Entity::new(id, kind, BuildingSpace::new(volume)),
        EntityParams::System => Entity::passive(id, kind),
        EntityParams::SystemMpc {
            zones,
            supply_fan,
            exhaust_fan,
            weights,
        } => {
            let Some(forecast) = forecast else {
                return Err(SetupError::InvalidConfiguration(format!(
                    "supervisor `{id}` needs a forecast source"
                ))
                .into());
            };
            let supervisor =
                Supervisor::new(id.clone(), zones, Arc::clone(forecast), Arc::clone(solver))
                    .with_fans(supply_fan, exhaust_fan)
                    .with_weights(weights);
            Entity::new(id, kind, supervisor)
        }
    };
    entity.contained_in = contained_in;
    entity.super_system = super_system;
    Ok(entity)
}

/// Fails if occupancy data or a supervisor's forecast misses a step of the run.
fn check_data_coverage(entities: &[Entity], config: &SimConfig, timeline: &Timeline) -> Result<()> {
    for entity in entities {
        if let Some(occupancy) = entity.component_as::<Occupancy>() {
            occupancy.validate(entity.id.as_str(), timeline)?;
        }
        if let Some(supervisor) = entity.component_as::<Supervisor>() {
            let zones = supervisor.zone_ids();
            let forecast = supervisor.forecast();
            for time in timeline.iter().filter(|t| config.is_control_step(t.index)) {
                window(
                    forecast,
                    time.standard,
                    config.control_step_s,
                    config.horizon_steps,
                    &zones,
                )?;
            }
        }
    }
    Ok(())
}

/// A wired model ready to run.
pub struct Simulation {
    config: SimConfig,
    timeline: Timeline,
    pipeline: Pipeline,
    forecast: Option<Arc<dyn ForecastSource>>,
}

impl Simulation {
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Steps every base step of the timeline, then derives the building totals.
    pub fn run(mut self) -> Result<SimulationOutcome> {
        let config = &self.config;
        let mut recorder = Recorder::new(self.pipeline.entities());
        let total = self.timeline.len();
        let progress = config.progress_interval.filter(|&n| n > 0);

        info!(steps = total, start = %config.start, end = %config.end, "simulation started");
        for time in self.timeline.iter() {
            let ctx = StepContext::new(config, time);
            self.pipeline.step(&ctx)?;
            recorder.push_step(time, self.pipeline.entities())?;
            if progress.is_some_and(|n| (time.index + 1) % n == 0) {
                info!(step = time.index + 1, total, local = %time.local, "simulation progress");
            }
        }

        let warmup = config.warmup_steps().min(total);
        let mut results = recorder.finalize();
        results.discard_warmup(warmup);
        let tariffs = self.tariffs();

        let entities = self.pipeline.entities();
        let fans: Vec<&str> = entities
            .iter()
            .filter(|e| e.kind == EntityKind::Fan)
            .map(|e| e.id.as_str())
            .collect();
        let totals = building_totals(&results, &fans, &tariffs[warmup..], config.dt())?;

        let zone_pairs: Vec<(EntityId, EntityId)> = entities
            .iter()
            .filter(|e| e.kind == EntityKind::BuildingSpace)
            .map(|e| (e.id.clone(), occupancy_id(&e.id)))
            .collect();
        let zones: Vec<(&str, &str)> = zone_pairs
            .iter()
            .map(|(z, o)| (z.as_str(), o.as_str()))
            .collect();
        let air_quality = air_quality_kpi(&results, &zones, config.co2_threshold_ppm, config.dt())?;

        let mpc_logs = entities
            .iter()
            .filter_map(|e| {
                e.component_as::<Supervisor>()
                    .map(|s| (e.id.clone(), s.log().clone()))
            })
            .collect();

        info!(
            energy_kwh = totals.energy_kwh(),
            cost = totals.cost(),
            emission_kg = totals.emission_kg(),
            air_quality_kpi = air_quality,
            "simulation finished"
        );
        Ok(SimulationOutcome {
            results,
            mpc_logs,
            totals,
            air_quality_kpi: air_quality,
        })
    }

    /// Tariff of every base step.
    ///
    /// A step without its own forecast row uses the row of its control step.
    /// Without a forecast all tariffs are zero.
    fn tariffs(&self) -> Vec<Tariff> {
        let Some(forecast) = &self.forecast else {
            return vec![Tariff::default(); self.timeline.len()];
        };
        let ratio = self.config.control_ratio().max(1);
        self.timeline
            .iter()
            .map(|time| {
                let control_start = self.timeline.get(time.index - time.index % ratio);
                forecast
                    .row(time.standard)
                    .or_else(|| control_start.and_then(|t| forecast.row(t.standard)))
                    .map_or_else(Tariff::default, |row| Tariff {
                        price: row.price,
                        emission_factor: row.emission_factor,
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::components::{ControlLawConfig, OccupancyConfig, OperationMode};
    use crate::sim::graph::wiring::{ControllerSpec, DamperSpec, SystemSpec, ZoneSpec};

    fn lone_zone(with_damper: bool) -> PlantDescription {
        let mut plant = PlantDescription {
            systems: vec![SystemSpec {
                id: "AHU".into(),
                mpc: None,
            }],
            zones: vec![ZoneSpec {
                id: "Z1".into(),
                volume: 100.0,
                system: Some("AHU".into()),
                occupancy: OccupancyConfig::default(),
            }],
            ..PlantDescription::default()
        };
        if with_damper {
            plant.dampers.push(DamperSpec {
                id: "D1".into(),
                zone: "Z1".into(),
                system: "AHU".into(),
                operation_mode: OperationMode::Supply,
                flow_max: 0.1,
            });
            plant.controllers.push(ControllerSpec {
                id: "C1".into(),
                zone: "Z1".into(),
                system: None,
                law: Some(ControlLawConfig::Constant { opening: 0.5 }),
            });
        }
        plant
    }

    #[test]
    fn test_constant_opening_runs_full_duration() {
        let config = SimConfig {
            warmup_s: Some(1200),
            ..SimConfig::new()
        };
        let outcome = Model::new(config, lone_zone(true)).run().unwrap();
        // 24 h at 600 s is 145 steps, two of them warm-up.
        assert_eq!(outcome.results.len(), 143);
        assert!(outcome.mpc_logs.is_empty());
        assert_eq!(outcome.totals.energy_kwh(), 0.0);
        assert_eq!(outcome.results.value(0, "D1: flow"), Some(0.05));
        assert!(outcome
            .results
            .column("Z1: ppmCO2")
            .unwrap()
            .iter()
            .all(|c| c.is_some()));
    }

    #[test]
    fn test_zone_without_supply_is_config_resolution_error() {
        let err = Model::new(SimConfig::new(), lone_zone(false)).build().err().unwrap();
        assert_eq!(
            err.downcast_ref::<SetupError>(),
            Some(&SetupError::ConfigResolution {
                entity: "Z1".into(),
                property: "flowVenIn".into(),
            })
        );
    }

    #[test]
    fn test_invalid_config_fails_before_running() {
        let config = SimConfig {
            horizon_steps: 0,
            ..SimConfig::new()
        };
        let err = Model::new(config, lone_zone(true)).build().err().unwrap();
        assert!(matches!(
            err.downcast_ref::<SetupError>(),
            Some(SetupError::InvalidConfiguration(_))
        ));
    }
}
