use std::any::Any;
use std::collections::HashMap;

use anyhow::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::tiers::TierTable;
use crate::error::SetupError;
use crate::sim::framework::{Component, Inputs, PropertyMap, StepContext};
use crate::sim::time::Timeline;

/// One row of measured/predicted occupancy, keyed by local time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OccupancyRow {
    pub at: NaiveDateTime,
    pub occupants: f64,
}

/// Where a zone's occupant count comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OccupancyConfig {
    /// Weekday/weekend daily profile keyed by seconds since local midnight.
    Fixed {
        #[serde(default = "default_weekday")]
        weekday: TierTable,
        #[serde(default = "default_weekend")]
        weekend: TierTable,
    },
    /// Precomputed value per base step.
    Profile { values: Vec<f64> },
    /// External rows joined on the local timestamp of each step.
    Data { rows: Vec<OccupancyRow> },
}

impl Default for OccupancyConfig {
    fn default() -> Self {
        Self::Fixed {
            weekday: default_weekday(),
            weekend: default_weekend(),
        }
    }
}

/// Office weekday profile.
pub fn default_weekday() -> TierTable {
    TierTable::daily(&[
        (0, 0.0),
        (7 * 3600, 5.0),
        (8 * 3600, 15.0),
        (8 * 3600 + 1800, 20.0),
        (12 * 3600, 13.0),
        (14 * 3600, 10.0),
        (16 * 3600, 5.0),
        (18 * 3600, 0.0),
    ])
}

pub fn default_weekend() -> TierTable {
    TierTable::daily(&[(0, 0.0), (8 * 3600, 5.0), (16 * 3600, 0.0)])
}

/// Occupant count source of one zone.
pub struct Occupancy {
    config: OccupancyConfig,
    by_time: HashMap<NaiveDateTime, f64>,
}

impl Occupancy {
    pub fn new(config: OccupancyConfig) -> Self {
        let by_time = match &config {
            OccupancyConfig::Data { rows } => rows.iter().map(|r| (r.at, r.occupants)).collect(),
            _ => HashMap::new(),
        };
        Self { config, by_time }
    }

    /// Checks that the source covers every step of `timeline`.
    pub fn validate(&self, source_name: &str, timeline: &Timeline) -> Result<(), SetupError> {
        let uncovered = match &self.config {
            OccupancyConfig::Fixed { weekday, weekend } => {
                if !weekday.is_ascending() || !weekend.is_ascending() {
                    return Err(SetupError::InvalidConfiguration(format!(
                        "{source_name}: daily profile breakpoints must be ascending"
                    )));
                }
                timeline.iter().find(|t| {
                    let table = if t.is_weekend() { weekend } else { weekday };
                    table.lookup(f64::from(t.seconds_of_day())).is_none()
                })
            }
            OccupancyConfig::Profile { values } => timeline.get(values.len()),
            OccupancyConfig::Data { .. } => timeline
                .iter()
                .find(|t| !self.by_time.contains_key(&t.local)),
        };
        match uncovered {
            Some(t) => Err(SetupError::TimeAlignment {
                source_name: source_name.to_string(),
                at: t.local,
            }),
            None => Ok(()),
        }
    }

    fn occupants_at(&self, ctx: &StepContext) -> Option<f64> {
        match &self.config {
            OccupancyConfig::Fixed { weekday, weekend } => {
                let table = if ctx.time.is_weekend() { weekend } else { weekday };
                table.lookup(f64::from(ctx.time.seconds_of_day()))
            }
            OccupancyConfig::Profile { values } => values.get(ctx.step_index).copied(),
            OccupancyConfig::Data { .. } => self.by_time.get(&ctx.time.local).copied(),
        }
    }
}

impl Component for Occupancy {
    fn name(&self) -> &'static str {
        "occupancy"
    }

    fn init(&mut self, output: &mut PropertyMap) -> Result<()> {
        output.set("occupants", 0.0);
        Ok(())
    }

    fn step(&mut self, ctx: &StepContext, _input: &Inputs, output: &mut PropertyMap) -> Result<()> {
        let Some(occupants) = self.occupants_at(ctx) else {
            anyhow::bail!("no occupancy value for {}", ctx.time.local);
        };
        output.set("occupants", occupants);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
