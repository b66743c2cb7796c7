use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ventsim::io::{read_forecast, read_scenario, write_results};

#[derive(Parser)]
#[command(name = "ventsim", version, about = "CO2 and ventilation co-simulation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a JSON scenario to completion.
    Run {
        scenario: PathBuf,
        /// Write results, totals and MPC logs to this JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Forecast table replacing the one embedded in the scenario.
        #[arg(short, long)]
        forecast: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Run {
            scenario,
            output,
            forecast,
        } => {
            let forecast = forecast.as_deref().map(read_forecast).transpose()?;
            let outcome = read_scenario(&scenario)?.into_model(forecast).run()?;

            info!(
                cost = outcome.totals.cost(),
                air_quality_kpi = outcome.air_quality_kpi,
                emission_kg = outcome.totals.emission_kg(),
                energy_kwh = outcome.totals.energy_kwh(),
                "objectives"
            );
            for (id, log) in &outcome.mpc_logs {
                info!(
                    supervisor = %id,
                    solves = log.len(),
                    failures = log.failures(),
                    "MPC summary"
                );
            }
            if let Some(path) = output {
                write_results(&path, &outcome)?;
                info!(path = %path.display(), "results written");
            }
        }
    }
    Ok(())
}
