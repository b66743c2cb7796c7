//! JSON scenario format.
//!
//! A scenario bundles the run-wide settings, the plant description and an
//! optional forecast table in one document.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::sim::config::SimConfig;
use crate::sim::graph::PlantDescription;
use crate::sim::model::Model;
use crate::sim::mpc::{ForecastRow, TableForecast};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: SimConfig,
    pub plant: PlantDescription,
    /// Rows keyed by standard time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<Vec<ForecastRow>>,
}

impl Scenario {
    /// Builds the model, using `forecast` in place of the embedded table if given.
    pub fn into_model(self, forecast: Option<Vec<ForecastRow>>) -> Model {
        let model = Model::new(self.config, self.plant);
        match forecast.or(self.forecast) {
            Some(rows) => model.with_forecast(Arc::new(TableForecast::new(rows))),
            None => model,
        }
    }
}

/// Reads a scenario from a JSON file.
pub fn read_scenario(path: &Path) -> Result<Scenario> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);

    let scenario: Scenario = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to deserialize scenario from: {}", path.display()))?;

    Ok(scenario)
}

pub fn write_scenario(path: &Path, scenario: &Scenario) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, scenario)
        .with_context(|| format!("Failed to serialize scenario to: {}", path.display()))?;

    Ok(())
}

/// Reads a standalone forecast table (a JSON array of rows).
pub fn read_forecast(path: &Path) -> Result<Vec<ForecastRow>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to deserialize forecast from: {}", path.display()))
}

pub fn from_scenario_string(json: &str) -> Result<Scenario> {
    serde_json::from_str(json).context("Failed to deserialize scenario from string")
}
