use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use ndarray::Array2;
use ventsim::sim::components::{
    ControlLawConfig, FanCurve, OccupancyConfig, OperationMode, TierTable, balance_coefficients,
    co2_after,
};
use ventsim::sim::graph::wiring::{
    ControllerSpec, DamperSpec, FanSpec, MeasuredProperty, MpcSpec, SensorSpec, SystemSpec,
    ZoneSpec,
};
use ventsim::sim::graph::PlantDescription;
use ventsim::sim::mpc::{MpcProblem, OptimalControlSolver, TableForecast, Trajectory};
use ventsim::{EntityId, Model, MpcWeights, SetupError, SimConfig, SolveFailure};

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, mi, 0)
        .unwrap()
}

fn config(start: NaiveDateTime, end: NaiveDateTime) -> SimConfig {
    SimConfig {
        start,
        end,
        horizon_steps: 3,
        ..SimConfig::new()
    }
}

/// One ventilated zone per id in `zones`, all in system `AHU`, with a supply
/// and an exhaust damper, a CO2 sensor and a controller each.
fn plant(
    zones: &[&str],
    law: Option<ControlLawConfig>,
    occupancy: OccupancyConfig,
    mpc: bool,
) -> PlantDescription {
    let linear = FanCurve {
        coefficients: [0.0, 1.0, 0.0, 0.0, 0.0],
        flow_max: 1.0,
        power_max: 100.0,
    };
    let mut plant = PlantDescription {
        systems: vec![SystemSpec {
            id: "AHU".into(),
            mpc: mpc.then(MpcSpec::default),
        }],
        fans: [OperationMode::Supply, OperationMode::Exhaust]
            .into_iter()
            .map(|mode| FanSpec {
                id: format!("Fan {mode:?}").into(),
                system: "AHU".into(),
                operation_mode: mode,
                curve: linear,
            })
            .collect(),
        ..PlantDescription::default()
    };
    for z in zones {
        plant.zones.push(ZoneSpec {
            id: (*z).into(),
            volume: 400.0,
            system: Some("AHU".into()),
            occupancy: occupancy.clone(),
        });
        for mode in [OperationMode::Supply, OperationMode::Exhaust] {
            plant.dampers.push(DamperSpec {
                id: format!("{z} {mode:?}").into(),
                zone: (*z).into(),
                system: "AHU".into(),
                operation_mode: mode,
                flow_max: 0.1,
            });
        }
        plant.controllers.push(ControllerSpec {
            id: format!("C {z}").into(),
            zone: (*z).into(),
            system: None,
            law: law.clone(),
        });
        plant.sensors.push(SensorSpec {
            id: format!("S {z}").into(),
            zone: (*z).into(),
            measures: MeasuredProperty::Co2,
        });
    }
    plant
}

fn forecast(config: &SimConfig, zones: &[&str], occupants: f64) -> Arc<TableForecast> {
    let horizon = Duration::seconds(i64::from(config.control_step_s) * config.horizon_steps as i64);
    let occupancy: Vec<(EntityId, f64)> = zones.iter().map(|z| ((*z).into(), occupants)).collect();
    // Generous margins cover the standard-time shift of DST runs.
    Arc::new(TableForecast::constant(
        config.start - Duration::hours(2),
        config.end + horizon + Duration::hours(2),
        config.control_step_s,
        40.0,
        150.0,
        &occupancy,
    ))
}

#[test]
fn test_unventilated_zone_follows_closed_form() {
    let config = config(at(2020, 1, 3, 0, 0), at(2020, 1, 3, 2, 0));
    let occupancy = OccupancyConfig::Profile {
        values: vec![10.0; 13],
    };
    let law = ControlLawConfig::Constant { opening: 0.0 };
    let outcome = Model::new(config.clone(), plant(&["Z1"], Some(law), occupancy, false))
        .run()
        .unwrap();

    let c0 = outcome.results.value(0, "Z1: ppmCO2").unwrap();
    assert_eq!(c0, 400.0);
    let (a, b) = balance_coefficients(
        0.0,
        10.0,
        400.0,
        0.05 / 3600.0,
        15.0 / (3600.0 * 1000.0),
        400.0,
    );
    assert!((a - 0.05 / 3600.0).abs() < 1e-18);
    let expected = co2_after(400.0, a, b, 600.0);
    let c1 = outcome.results.value(1, "Z1: ppmCO2").unwrap();
    assert!((c1 - expected).abs() < 1e-9, "C1 = {c1}, expected {expected}");
    assert!(c1 > 400.0);

    // The sensor reports the zone value of the previous step.
    assert_eq!(outcome.results.value(1, "S Z1: value"), Some(c0));
    assert_eq!(outcome.results.value(2, "S Z1: value"), Some(c1));
    assert_eq!(outcome.totals.energy_kwh(), 0.0);
}

#[test]
fn test_rule_set_picks_largest_threshold_not_above_value() {
    let table = TierTable::new(vec![(0.0, 0.0), (600.0, 0.45), (750.0, 0.7), (900.0, 1.0)]);
    assert_eq!(table.lookup(725.0), Some(0.45));

    let config = SimConfig {
        initial_co2_ppm: 725.0,
        ..config(at(2020, 1, 3, 0, 0), at(2020, 1, 3, 1, 0))
    };
    let law = ControlLawConfig::RuleSet { table };
    let outcome = Model::new(config, plant(&["Z1"], Some(law), OccupancyConfig::default(), false))
        .run()
        .unwrap();
    assert_eq!(outcome.results.value(0, "C Z1: outputSignal"), Some(0.45));
    let flow = outcome.results.value(0, "Z1 Supply: flow").unwrap();
    assert!((flow - 0.045).abs() < 1e-12);
    let fan = outcome.results.value(0, "Fan Supply: flow").unwrap();
    assert!((fan - 0.045).abs() < 1e-12);
}

#[test]
fn test_schedule_weekend_opening_is_a_third() {
    // Friday through Saturday.
    let config = config(at(2020, 1, 3, 0, 0), at(2020, 1, 5, 0, 0));
    let law = ControlLawConfig::Schedule {
        table: TierTable::daily(&[(0, 0.0), (7 * 3600, 0.33), (18 * 3600, 0.0)]),
        weekend_divisor: 3.0,
    };
    let outcome = Model::new(config, plant(&["Z1"], Some(law), OccupancyConfig::default(), false))
        .run()
        .unwrap();
    let row = |t: NaiveDateTime| outcome.results.times.iter().position(|x| *x == t).unwrap();
    let friday = outcome
        .results
        .value(row(at(2020, 1, 3, 10, 0)), "C Z1: outputSignal")
        .unwrap();
    let saturday = outcome
        .results
        .value(row(at(2020, 1, 4, 10, 0)), "C Z1: outputSignal")
        .unwrap();
    assert!((friday - 0.33).abs() < 1e-12);
    assert!((saturday - friday / 3.0).abs() < 1e-12);
}

/// Solves once with a fixed decision, then fails on every later call.
struct SucceedOnce {
    calls: AtomicUsize,
    decision: f64,
}

impl OptimalControlSolver for SucceedOnce {
    fn solve(&self, problem: &MpcProblem) -> Result<Trajectory, SolveFailure> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            let u = vec![self.decision; problem.num_decisions()];
            Ok(problem.trajectory(&u, 1))
        } else {
            Err(SolveFailure::Rejected("injected".into()))
        }
    }
}

struct AlwaysFail;

impl OptimalControlSolver for AlwaysFail {
    fn solve(&self, _problem: &MpcProblem) -> Result<Trajectory, SolveFailure> {
        Err(SolveFailure::IterationLimit { iterations: 0 })
    }
}

/// Returns a trajectory that covers no zones.
struct ZoneLessTrajectory;

impl OptimalControlSolver for ZoneLessTrajectory {
    fn solve(&self, problem: &MpcProblem) -> Result<Trajectory, SolveFailure> {
        let u = vec![1.0; problem.num_decisions()];
        let mut trajectory = problem.trajectory(&u, 1);
        trajectory.positions = Array2::zeros((0, problem.horizon + 1));
        Ok(trajectory)
    }
}

#[test]
fn test_solver_failure_holds_last_decision() {
    let config = config(at(2020, 1, 3, 8, 0), at(2020, 1, 3, 10, 0));
    let forecast = forecast(&config, &["Z1"], 5.0);
    let solver = Arc::new(SucceedOnce {
        calls: AtomicUsize::new(0),
        decision: 0.6,
    });
    let outcome = Model::new(
        config,
        plant(&["Z1"], Some(ControlLawConfig::Mpc), OccupancyConfig::default(), true),
    )
    .with_forecast(forecast)
    .with_solver(solver)
    .run()
    .unwrap();

    let signal = outcome.results.column("AHU MPC: outputSignal Z1").unwrap();
    assert_eq!(signal.len(), 13);
    assert!(signal.iter().all(|s| *s == Some(0.6)));
    let controller = outcome.results.column("C Z1: outputSignal").unwrap();
    assert!(controller.iter().all(|s| *s == Some(0.6)));

    let (id, log) = &outcome.mpc_logs[0];
    assert_eq!(id.as_str(), "AHU MPC");
    assert_eq!(log.len(), 7);
    assert_eq!(log.failures(), 6);
    assert!(log.rows[0].status.is_solved());
    assert_eq!(log.rows[1].positions.sum(), 0.0);
}

#[test]
fn test_failure_on_first_control_step_closes_dampers() {
    let config = config(at(2020, 1, 3, 8, 0), at(2020, 1, 3, 9, 0));
    let forecast = forecast(&config, &["Z1", "Z2"], 5.0);
    let outcome = Model::new(
        config,
        plant(&["Z1", "Z2"], Some(ControlLawConfig::Mpc), OccupancyConfig::default(), true),
    )
    .with_forecast(forecast)
    .with_solver(Arc::new(AlwaysFail))
    .run()
    .unwrap();

    for zone in ["Z1", "Z2"] {
        let signal = outcome
            .results
            .column(&format!("AHU MPC: outputSignal {zone}"))
            .unwrap();
        assert!(signal.iter().all(|s| *s == Some(0.0)));
        let flow = outcome.results.column(&format!("{zone} Supply: flow")).unwrap();
        assert!(flow.iter().all(|f| *f == Some(0.0)));
    }
    let (_, log) = &outcome.mpc_logs[0];
    assert_eq!(log.failures(), log.len());
}

#[test]
fn test_malformed_solution_is_logged_as_failure() {
    let config = config(at(2020, 1, 3, 8, 0), at(2020, 1, 3, 9, 0));
    let forecast = forecast(&config, &["Z1"], 5.0);
    let outcome = Model::new(
        config,
        plant(&["Z1"], Some(ControlLawConfig::Mpc), OccupancyConfig::default(), true),
    )
    .with_forecast(forecast)
    .with_solver(Arc::new(ZoneLessTrajectory))
    .run()
    .unwrap();

    let signal = outcome.results.column("AHU MPC: outputSignal Z1").unwrap();
    assert!(signal.iter().all(|s| *s == Some(0.0)));
    let (_, log) = &outcome.mpc_logs[0];
    assert_eq!(log.failures(), log.len());
    let row = &log.rows[0];
    assert_eq!(row.positions.dim(), (1, 4));
    assert!(row.price.iter().all(|p| *p == 40.0));
}

#[test]
fn test_non_co2_sensor_is_ignored() {
    let config = config(at(2020, 1, 3, 0, 0), at(2020, 1, 3, 1, 0));
    let table = TierTable::new(vec![(0.0, 0.2), (800.0, 1.0)]);
    let mut plant = plant(
        &["Z1"],
        Some(ControlLawConfig::RuleSet { table }),
        OccupancyConfig::default(),
        false,
    );
    plant.sensors.insert(
        0,
        SensorSpec {
            id: "T Z1".into(),
            zone: "Z1".into(),
            measures: MeasuredProperty::Other,
        },
    );
    let outcome = Model::new(config, plant).run().unwrap();
    assert!(outcome.results.column("T Z1: value").is_none());
    assert_eq!(outcome.results.value(0, "C Z1: outputSignal"), Some(0.2));
}

#[test]
fn test_fixed_profile_gap_is_time_alignment_error() {
    let config = config(at(2020, 1, 3, 0, 0), at(2020, 1, 3, 2, 0));
    let occupancy = OccupancyConfig::Fixed {
        weekday: TierTable::daily(&[(3600, 5.0)]),
        weekend: TierTable::daily(&[(0, 0.0)]),
    };
    let err = Model::new(config, plant(&["Z1"], None, occupancy, false))
        .build()
        .err()
        .unwrap();
    assert_eq!(
        err.downcast_ref::<SetupError>(),
        Some(&SetupError::TimeAlignment {
            source_name: "Z1 occupancy".into(),
            at: at(2020, 1, 3, 0, 0),
        })
    );
}

#[test]
fn test_empty_rooms_keep_dampers_closed() {
    let config = SimConfig {
        mpc_weights: MpcWeights {
            w1: 0.0,
            w2: 1e-4,
            w3: 0.0,
        },
        parallel_supervisors: false,
        ..config(at(2020, 1, 3, 0, 0), at(2020, 1, 3, 2, 0))
    };
    let forecast = forecast(&config, &["Z1", "Z2"], 0.0);
    let occupancy = OccupancyConfig::Profile {
        values: vec![0.0; 13],
    };
    let outcome = Model::new(
        config,
        plant(&["Z1", "Z2"], Some(ControlLawConfig::Mpc), occupancy, true),
    )
    .with_forecast(forecast)
    .run()
    .unwrap();

    let (_, log) = &outcome.mpc_logs[0];
    assert_eq!(log.failures(), 0);
    for zone in ["Z1", "Z2"] {
        let signal = outcome
            .results
            .column(&format!("AHU MPC: outputSignal {zone}"))
            .unwrap();
        assert!(signal.iter().all(|s| s.unwrap() < 1e-6), "{zone}: {signal:?}");
    }
    assert_eq!(outcome.air_quality_kpi, 0.0);
}

#[test]
fn test_damper_without_controller_is_config_resolution_error() {
    let mut plant = plant(&["Z1"], None, OccupancyConfig::default(), false);
    plant.controllers.clear();
    let err = Model::new(config(at(2020, 1, 3, 0, 0), at(2020, 1, 3, 1, 0)), plant)
        .build()
        .err()
        .unwrap();
    assert!(matches!(
        err.downcast_ref::<SetupError>(),
        Some(SetupError::ConfigResolution { entity, property })
            if entity.as_str() == "Z1 Supply" && property == "posSignal"
    ));
}

#[test]
fn test_short_forecast_is_time_alignment_error() {
    let config = config(at(2020, 1, 3, 0, 0), at(2020, 1, 3, 2, 0));
    let short = TableForecast::constant(
        config.start,
        config.end,
        config.control_step_s,
        40.0,
        150.0,
        &[("Z1".into(), 1.0)],
    );
    let err = Model::new(
        config,
        plant(&["Z1"], Some(ControlLawConfig::Mpc), OccupancyConfig::default(), true),
    )
    .with_forecast(Arc::new(short))
    .build()
    .err()
    .unwrap();
    assert!(matches!(
        err.downcast_ref::<SetupError>(),
        Some(SetupError::TimeAlignment { .. })
    ));
}

#[test]
fn test_short_occupancy_profile_is_time_alignment_error() {
    let config = config(at(2020, 1, 3, 0, 0), at(2020, 1, 3, 2, 0));
    let occupancy = OccupancyConfig::Profile {
        values: vec![1.0; 5],
    };
    let err = Model::new(config, plant(&["Z1"], None, occupancy, false))
        .build()
        .err()
        .unwrap();
    assert_eq!(
        err.downcast_ref::<SetupError>(),
        Some(&SetupError::TimeAlignment {
            source_name: "Z1 occupancy".into(),
            at: at(2020, 1, 3, 0, 50),
        })
    );
}

#[test]
fn test_supervised_run_across_fall_back() {
    // 01:00 local is still summer time (00:00 standard); 04:00 is winter time.
    let config = config(at(2020, 10, 25, 1, 0), at(2020, 10, 25, 4, 0));
    let forecast = forecast(&config, &["Z1"], 2.0);
    let outcome = Model::new(
        config,
        plant(&["Z1"], Some(ControlLawConfig::Mpc), OccupancyConfig::default(), true),
    )
    .with_forecast(forecast)
    .run()
    .unwrap();

    let results = &outcome.results;
    assert_eq!(results.len(), 25);
    assert!(results.standard_times.windows(2).all(|w| w[1] > w[0]));
    let repeated = results.times.iter().filter(|t| t.hour() == 2).count();
    assert_eq!(repeated, 12);
    assert_eq!(results.times[0], at(2020, 10, 25, 1, 0));
    assert_eq!(results.times[24], at(2020, 10, 25, 4, 0));

    let (_, log) = &outcome.mpc_logs[0];
    assert_eq!(log.len(), 13);
    assert_eq!(log.failures(), 0);
    let signal = results.column("AHU MPC: outputSignal Z1").unwrap();
    assert!(signal.iter().all(|s| matches!(s, Some(v) if (0.0..=1.0).contains(v))));
    assert!(outcome.totals.cost() >= 0.0);
}
