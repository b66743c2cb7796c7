//! JSON results sink.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};

use crate::sim::model::SimulationOutcome;

/// Writes the results table, building totals and MPC logs as one JSON document.
pub fn write_results(path: &Path, outcome: &SimulationOutcome) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, outcome)
        .with_context(|| format!("Failed to serialize results to: {}", path.display()))?;

    Ok(())
}

pub fn to_results_string(outcome: &SimulationOutcome) -> Result<String> {
    serde_json::to_string_pretty(outcome).context("Failed to serialize results to string")
}
