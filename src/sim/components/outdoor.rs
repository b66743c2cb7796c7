use std::any::Any;

use anyhow::Result;

use crate::sim::framework::{Component, Inputs, PropertyMap, StepContext};

/// Constant outdoor CO2 source.
#[derive(Debug, Default)]
pub struct OutdoorEnvironment;

impl Component for OutdoorEnvironment {
    fn name(&self) -> &'static str {
        "outdoorEnvironment"
    }

    fn init(&mut self, output: &mut PropertyMap) -> Result<()> {
        output.declare("ppmCO2");
        Ok(())
    }

    fn step(&mut self, ctx: &StepContext, _input: &Inputs, output: &mut PropertyMap) -> Result<()> {
        output.set("ppmCO2", ctx.config.outdoor_co2_ppm);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
