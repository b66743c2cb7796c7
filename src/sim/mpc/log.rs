use chrono::NaiveDateTime;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::Trajectory;
use crate::error::SolveFailure;

/// Outcome of one control step's solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SolveStatus {
    Solved { iterations: usize, objective: f64 },
    Failed { reason: String },
}

impl SolveStatus {
    pub fn is_solved(&self) -> bool {
        matches!(self, SolveStatus::Solved { .. })
    }
}

/// Horizon arrays recorded for one control step.
///
/// Node 0 is the state at the start of the horizon, node `N` the terminal
/// prediction. A failed solve records the forecast price and zeros elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpcLogRow {
    pub control_index: usize,
    /// Local time of the control step.
    pub time: NaiveDateTime,
    pub status: SolveStatus,
    pub cost: Array1<f64>,
    pub impact: Array1<f64>,
    pub emission: Array1<f64>,
    pub price: Array1<f64>,
    /// `[zones, N + 1]`.
    pub positions: Array2<f64>,
    /// `[zones, N + 1]`.
    pub co2: Array2<f64>,
}

/// Append-only diagnostic log of one supervisor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MpcLog {
    pub zones: Vec<String>,
    pub rows: Vec<MpcLogRow>,
}

impl MpcLog {
    pub fn new(zones: Vec<String>) -> Self {
        Self {
            zones,
            rows: Vec::new(),
        }
    }

    /// Appends the row of one control step; `price` is the forecast window's.
    pub fn record(
        &mut self,
        control_index: usize,
        time: NaiveDateTime,
        price: &Array1<f64>,
        outcome: &Result<Trajectory, SolveFailure>,
    ) {
        let nodes = price.len();
        let row = match outcome {
            Ok(t) => MpcLogRow {
                control_index,
                time,
                status: SolveStatus::Solved {
                    iterations: t.iterations,
                    objective: t.objective,
                },
                cost: t.cost.clone(),
                impact: t.impact.clone(),
                emission: t.emission.clone(),
                price: t.price.clone(),
                positions: t.positions.clone(),
                co2: t.co2.clone(),
            },
            Err(e) => MpcLogRow {
                control_index,
                time,
                status: SolveStatus::Failed {
                    reason: e.to_string(),
                },
                cost: Array1::zeros(nodes),
                impact: Array1::zeros(nodes),
                emission: Array1::zeros(nodes),
                price: price.clone(),
                positions: Array2::zeros((self.zones.len(), nodes)),
                co2: Array2::zeros((self.zones.len(), nodes)),
            },
        };
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.rows.iter().filter(|r| !r.status.is_solved()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_row_keeps_forecast_price() {
        let mut log = MpcLog::new(vec!["Z1".into(), "Z2".into()]);
        let price = Array1::from(vec![30.0, 40.0, 50.0]);
        log.record(
            4,
            NaiveDateTime::default(),
            &price,
            &Err(SolveFailure::NonFinite),
        );
        assert_eq!(log.failures(), 1);
        let row = &log.rows[0];
        assert_eq!(row.control_index, 4);
        assert_eq!(row.price, price);
        assert_eq!(row.positions.dim(), (2, 3));
        assert_eq!(row.cost.sum(), 0.0);
        assert_eq!(
            row.status,
            SolveStatus::Failed {
                reason: "objective is not finite".into()
            }
        );
    }
}
