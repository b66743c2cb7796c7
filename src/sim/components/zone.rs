use std::any::Any;

use anyhow::Result;

use crate::sim::framework::{Component, InputSpec, Inputs, PropertyMap, StepContext};
use crate::sim::scalar::Scalar;

/// Coefficients `(a, b)` of the zone balance `dC/dt = b − a·C`.
///
/// `a = flowIn/vol + infiltration`,
/// `b = occupants·generation·1e6/vol + a·outdoor`.
pub fn balance_coefficients<T: Scalar>(
    flow_in: T,
    occupants: f64,
    volume: f64,
    infiltration: f64,
    generation: f64,
    outdoor_ppm: f64,
) -> (T, T) {
    let a = flow_in / T::constant(volume) + T::constant(infiltration);
    let b = T::constant(occupants * generation * 1e6 / volume) + a * T::constant(outdoor_ppm);
    (a, b)
}

/// Exact solution of `dC/dt = b − a·C` after `dt` seconds from `c0`.
pub fn co2_after<T: Scalar>(c0: T, a: T, b: T, dt: f64) -> T {
    if a.value().abs() < 1e-15 {
        return c0 + b * T::constant(dt);
    }
    let c = c0 * a - b;
    (b + c * (-(a * T::constant(dt))).exp()) / a
}

/// A ventilated room with a well-mixed CO2 concentration.
#[derive(Debug, Clone)]
pub struct BuildingSpace {
    /// Air volume [m³].
    pub volume: f64,
}

impl BuildingSpace {
    pub fn new(volume: f64) -> Self {
        Self { volume }
    }
}

impl Component for BuildingSpace {
    fn name(&self) -> &'static str {
        "buildingSpace"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::one("occupants"),
            InputSpec::many("flowVenIn"),
            InputSpec::many("flowVenOut").optional(),
            InputSpec::one("ppmCO2Out"),
        ]
    }

    fn init(&mut self, output: &mut PropertyMap) -> Result<()> {
        output.declare("ppmCO2");
        Ok(())
    }

    fn step(&mut self, ctx: &StepContext, input: &Inputs, output: &mut PropertyMap) -> Result<()> {
        let config = ctx.config;
        if ctx.is_first_step() {
            output.set("ppmCO2", config.initial_co2_ppm);
            return Ok(());
        }

        let c0 = output.number("ppmCO2").unwrap_or(config.initial_co2_ppm);
        let flow_in: f64 = input
            .all("flowVenIn")
            .iter()
            .filter_map(|v| v.as_f64())
            .sum();
        let occupants = input.scalar("occupants").unwrap_or(0.0);
        let outdoor = input
            .scalar("ppmCO2Out")
            .unwrap_or(config.outdoor_co2_ppm);

        let (a, b) = balance_coefficients(
            flow_in,
            occupants,
            self.volume,
            config.infiltration_rate_per_s,
            config.co2_generation_m3_per_s_per_person,
            outdoor,
        );
        output.set("ppmCO2", co2_after(c0, a, b, ctx.dt()));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
