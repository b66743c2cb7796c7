use std::any::Any;

use anyhow::Result;
use chrono::{Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::tiers::TierTable;
use crate::EntityId;
use crate::sim::config::SimConfig;
use crate::sim::framework::{Component, InputSpec, Inputs, PropertyMap, StepContext};
use crate::sim::time::is_weekend;

/// Control law of a damper controller, chosen once at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlLawConfig {
    /// Pass through the supervisor's decision for this zone.
    #[serde(rename = "MPC", alias = "mpc")]
    Mpc,
    /// CO2 threshold tiers `(ppm, opening)`.
    #[serde(rename = "ruleSet")]
    RuleSet {
        #[serde(default = "default_ruleset")]
        table: TierTable,
    },
    #[serde(rename = "PD", alias = "pd")]
    Pd {
        #[serde(default = "default_p")]
        p: f64,
        #[serde(default)]
        d: f64,
        #[serde(default = "default_setpoint")]
        setpoint: f64,
    },
    /// Daily opening profile keyed by seconds since midnight.
    #[serde(rename = "schedule")]
    Schedule {
        #[serde(default = "default_schedule")]
        table: TierTable,
        #[serde(default = "default_weekend_divisor")]
        weekend_divisor: f64,
    },
    #[serde(rename = "constant")]
    Constant {
        #[serde(default = "default_opening")]
        opening: f64,
    },
    /// Any law this build does not know about.
    #[serde(other)]
    Unknown,
}

impl Default for ControlLawConfig {
    fn default() -> Self {
        Self::RuleSet {
            table: default_ruleset(),
        }
    }
}

impl ControlLawConfig {
    pub fn is_mpc(&self) -> bool {
        matches!(self, Self::Mpc)
    }

    /// Whether the law reads a measured value (sensor or supervisor).
    pub fn reads_input(&self) -> bool {
        matches!(self, Self::Mpc | Self::RuleSet { .. } | Self::Pd { .. })
    }
}

pub fn default_ruleset() -> TierTable {
    TierTable::new(vec![(0.0, 0.0), (600.0, 0.45), (750.0, 0.7), (900.0, 1.0)])
}

pub fn default_schedule() -> TierTable {
    TierTable::daily(&[(0, 0.0), (7 * 3600, 0.33), (18 * 3600, 0.0)])
}

fn default_p() -> f64 {
    0.0026
}

fn default_setpoint() -> f64 {
    573.0
}

fn default_weekend_divisor() -> f64 {
    3.0
}

fn default_opening() -> f64 {
    0.33
}

/// Damper controller producing `outputSignal` in `[0, 1]`.
pub struct Controller {
    id: EntityId,
    law: ControlLawConfig,
    /// Measured value of the previous step (PD only).
    prev_measured: f64,
    /// Reference instant of the schedule law.
    start: NaiveDateTime,
    schedule_step_s: i64,
    warned: bool,
}

impl Controller {
    pub fn new(id: EntityId, law: ControlLawConfig, config: &SimConfig) -> Self {
        Self {
            id,
            law,
            prev_measured: config.outdoor_co2_ppm,
            start: config.start,
            schedule_step_s: i64::from(config.base_step_s),
            warned: false,
        }
    }

    pub fn law(&self) -> &ControlLawConfig {
        &self.law
    }
}

/// `clamp(p·(measured − setpoint) + d·(measured − previous)/dt, 0, 1)`.
///
/// A non-finite command maps to a closed damper.
pub fn pd_opening(p: f64, d: f64, setpoint: f64, measured: f64, previous: f64, dt: f64) -> f64 {
    let command = p * (measured - setpoint) + d * (measured - previous) / dt;
    if command.is_finite() {
        command.clamp(0.0, 1.0)
    } else if command == f64::INFINITY {
        1.0
    } else {
        0.0
    }
}

/// Opening of the daily schedule at `time`, reduced on weekends.
pub fn scheduled_opening(table: &TierTable, weekend_divisor: f64, time: &NaiveDateTime) -> f64 {
    let opening = table
        .lookup(f64::from(time.num_seconds_from_midnight()))
        .unwrap_or(0.0);
    if is_weekend(time) {
        opening / weekend_divisor
    } else {
        opening
    }
}

impl Component for Controller {
    fn name(&self) -> &'static str {
        "controller"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        let spec = InputSpec::one("inputValue");
        if self.law.reads_input() {
            vec![spec]
        } else {
            vec![spec.optional()]
        }
    }

    fn init(&mut self, output: &mut PropertyMap) -> Result<()> {
        output.declare("outputSignal");
        Ok(())
    }

    fn step(&mut self, ctx: &StepContext, input: &Inputs, output: &mut PropertyMap) -> Result<()> {
        let measured = input.scalar("inputValue");
        match &self.law {
            ControlLawConfig::Mpc => {
                output.set("outputSignal", input.value("inputValue"));
            }
            ControlLawConfig::RuleSet { table } => {
                if let Some(opening) = measured.and_then(|m| table.lookup(m)) {
                    output.set("outputSignal", opening);
                }
            }
            ControlLawConfig::Pd { p, d, setpoint } => {
                if let Some(m) = measured {
                    let opening = pd_opening(*p, *d, *setpoint, m, self.prev_measured, ctx.dt());
                    output.set("outputSignal", opening);
                    self.prev_measured = m;
                }
            }
            ControlLawConfig::Schedule {
                table,
                weekend_divisor,
            } => {
                let time =
                    self.start + Duration::seconds(self.schedule_step_s * ctx.step_index as i64);
                output.set(
                    "outputSignal",
                    scheduled_opening(table, *weekend_divisor, &time),
                );
            }
            ControlLawConfig::Constant { opening } => {
                output.set("outputSignal", *opening);
            }
            ControlLawConfig::Unknown => {
                if !self.warned {
                    warn!(controller = %self.id, "unknown control law, output left unchanged");
                    self.warned = true;
                }
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
