//! Forecast collaborator of the MPC supervisor.
//!
//! Rows are keyed by *standard* (no-DST) time so that the repeated local hour
//! of a fall-back switch never produces two rows with the same key.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDateTime};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::EntityId;
use crate::error::SetupError;

/// Predicted conditions at one control-step instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    /// Standard-time instant.
    pub at: NaiveDateTime,
    /// Electricity price [currency/MWh].
    pub price: f64,
    /// Grid emission factor [gCO2/kWh].
    pub emission_factor: f64,
    /// Predicted occupants per zone id.
    #[serde(default)]
    pub occupancy: BTreeMap<EntityId, f64>,
}

/// Supplies forecast rows by timestamp.
pub trait ForecastSource: Send + Sync {
    fn name(&self) -> &str {
        "forecast"
    }

    fn row(&self, at: NaiveDateTime) -> Option<&ForecastRow>;
}

/// In-memory forecast table.
#[derive(Debug, Clone, Default)]
pub struct TableForecast {
    rows: HashMap<NaiveDateTime, ForecastRow>,
}

impl TableForecast {
    pub fn new(rows: Vec<ForecastRow>) -> Self {
        Self {
            rows: rows.into_iter().map(|r| (r.at, r)).collect(),
        }
    }

    /// Same price, emission factor and occupancy at every `step_s` from
    /// `start` through `end`.
    pub fn constant(
        start: NaiveDateTime,
        end: NaiveDateTime,
        step_s: u32,
        price: f64,
        emission_factor: f64,
        occupancy: &[(EntityId, f64)],
    ) -> Self {
        let occupancy: BTreeMap<EntityId, f64> = occupancy.iter().cloned().collect();
        let step = Duration::seconds(i64::from(step_s.max(1)));
        let mut rows = Vec::new();
        let mut at = start;
        while at <= end {
            rows.push(ForecastRow {
                at,
                price,
                emission_factor,
                occupancy: occupancy.clone(),
            });
            at += step;
        }
        Self::new(rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl ForecastSource for TableForecast {
    fn row(&self, at: NaiveDateTime) -> Option<&ForecastRow> {
        self.rows.get(&at)
    }
}

/// Forecast sampled at the `horizon + 1` nodes of one MPC horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastWindow {
    pub price: Array1<f64>,
    pub emission_factor: Array1<f64>,
    /// `[zones, horizon + 1]`.
    pub occupancy: Array2<f64>,
}

impl ForecastWindow {
    pub fn nodes(&self) -> usize {
        self.price.len()
    }
}

/// Samples `source` at `start + j·control_step` for `j = 0..=horizon`.
pub fn window(
    source: &dyn ForecastSource,
    start: NaiveDateTime,
    control_step_s: u32,
    horizon: usize,
    zones: &[EntityId],
) -> Result<ForecastWindow, SetupError> {
    let nodes = horizon + 1;
    let mut price = Array1::zeros(nodes);
    let mut emission_factor = Array1::zeros(nodes);
    let mut occupancy = Array2::zeros((zones.len(), nodes));

    for j in 0..nodes {
        let at = start + Duration::seconds(i64::from(control_step_s) * j as i64);
        let missing = || SetupError::TimeAlignment {
            source_name: source.name().to_string(),
            at,
        };
        let row = source.row(at).ok_or_else(missing)?;
        price[j] = row.price;
        emission_factor[j] = row.emission_factor;
        for (z, zone) in zones.iter().enumerate() {
            occupancy[[z, j]] = *row.occupancy.get(zone).ok_or_else(missing)?;
        }
    }

    Ok(ForecastWindow {
        price,
        emission_factor,
        occupancy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 3)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_window_shape() {
        let zones = vec![EntityId::from("Z1"), EntityId::from("Z2")];
        let source = TableForecast::constant(
            at(0, 0),
            at(2, 0),
            1200,
            300.0,
            150.0,
            &[(zones[0].clone(), 3.0), (zones[1].clone(), 0.0)],
        );
        let w = window(&source, at(0, 20), 1200, 4, &zones).unwrap();
        assert_eq!(w.nodes(), 5);
        assert_eq!(w.occupancy.dim(), (2, 5));
        assert_eq!(w.occupancy[[0, 4]], 3.0);
        assert_eq!(w.price[2], 300.0);
    }

    #[test]
    fn test_uncovered_horizon_is_time_alignment_error() {
        let zones = vec![EntityId::from("Z1")];
        let occupants = [(zones[0].clone(), 1.0)];
        let source = TableForecast::constant(at(0, 0), at(1, 0), 1200, 300.0, 150.0, &occupants);
        let err = window(&source, at(0, 0), 1200, 4, &zones).unwrap_err();
        assert_eq!(
            err,
            SetupError::TimeAlignment {
                source_name: "forecast".into(),
                at: at(1, 20),
            }
        );
    }

    #[test]
    fn test_missing_zone_column_is_time_alignment_error() {
        let source = TableForecast::constant(at(0, 0), at(1, 0), 1200, 1.0, 1.0, &[]);
        let err = window(&source, at(0, 0), 1200, 1, &[EntityId::from("Z9")]).unwrap_err();
        assert!(matches!(err, SetupError::TimeAlignment { .. }));
    }
}
