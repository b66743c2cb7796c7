//! Post-run building indicators.

use serde::{Deserialize, Serialize};

use crate::sim::recorder::{ResultsTable, column_name};

/// Electricity tariff applying to one result row.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Tariff {
    /// [currency/MWh]
    pub price: f64,
    /// [gCO2/kWh]
    pub emission_factor: f64,
}

/// Fan electricity totals per step and cumulatively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildingTotals {
    /// Summed fan power per step [W].
    pub power_w: Vec<f64>,
    /// Cumulative electricity [kWh].
    pub energy_kwh: Vec<f64>,
    pub step_cost: Vec<f64>,
    pub total_cost: Vec<f64>,
    /// Emission per step [kg].
    pub step_emission_kg: Vec<f64>,
    pub total_emission_kg: Vec<f64>,
}

impl BuildingTotals {
    pub fn cost(&self) -> f64 {
        self.total_cost.last().copied().unwrap_or(0.0)
    }

    pub fn emission_kg(&self) -> f64 {
        self.total_emission_kg.last().copied().unwrap_or(0.0)
    }

    pub fn energy_kwh(&self) -> f64 {
        self.energy_kwh.last().copied().unwrap_or(0.0)
    }
}

/// Sums the `W` columns of `fans` and prices them with one tariff per row.
pub fn building_totals(
    results: &ResultsTable,
    fans: &[&str],
    tariffs: &[Tariff],
    dt: f64,
) -> anyhow::Result<BuildingTotals> {
    anyhow::ensure!(
        tariffs.len() == results.len(),
        "building_totals: {} tariffs for {} result rows",
        tariffs.len(),
        results.len()
    );
    let columns = fans
        .iter()
        .map(|fan| {
            let name = column_name(fan, "W");
            results
                .column_index(&name)
                .ok_or_else(|| anyhow::anyhow!("building_totals: no column `{name}`"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut totals = BuildingTotals::default();
    let (mut energy, mut cost, mut emission) = (0.0, 0.0, 0.0);
    for (row, tariff) in results.rows.iter().zip(tariffs) {
        let power: f64 = columns.iter().filter_map(|&c| row[c]).sum();
        let step_cost = power * tariff.price * dt / 3.6e9;
        let step_emission = power * tariff.emission_factor * dt / 3.6e9;
        energy += power * dt / 3.6e6;
        cost += step_cost;
        emission += step_emission;

        totals.power_w.push(power);
        totals.energy_kwh.push(energy);
        totals.step_cost.push(step_cost);
        totals.total_cost.push(cost);
        totals.step_emission_kg.push(step_emission);
        totals.total_emission_kg.push(emission);
    }
    Ok(totals)
}

/// `Σ max(C − threshold, 0) · dt · occupants` over zones and rows [ppm·s·occ].
///
/// Each zone's occupancy is read from its `"<zone> occupancy"` entity.
pub fn air_quality_kpi(
    results: &ResultsTable,
    zones: &[(&str, &str)],
    threshold_ppm: f64,
    dt: f64,
) -> anyhow::Result<f64> {
    let mut kpi = 0.0;
    for &(zone, occupancy) in zones {
        let co2 = results
            .column(&column_name(zone, "ppmCO2"))
            .ok_or_else(|| anyhow::anyhow!("air_quality_kpi: no CO2 column for `{zone}`"))?;
        let occ = results
            .column(&column_name(occupancy, "occupants"))
            .ok_or_else(|| anyhow::anyhow!("air_quality_kpi: no occupancy column `{occupancy}`"))?;
        for (c, o) in co2.iter().zip(&occ) {
            if let (Some(c), Some(o)) = (c, o) {
                if *c > threshold_ppm {
                    kpi += (c - threshold_ppm) * dt * o;
                }
            }
        }
    }
    Ok(kpi)
}
