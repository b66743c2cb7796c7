use std::any::Any;

use anyhow::Result;

use crate::sim::framework::{Component, InputSpec, Inputs, PropertyMap, StepContext, Value};

/// CO2 sensor passing its zone's concentration through.
///
/// On the first step the zone has not produced a value yet, so the configured
/// initial concentration is reported instead.
#[derive(Debug, Default)]
pub struct Sensor;

impl Sensor {
    pub fn new() -> Self {
        Self
    }
}

impl Component for Sensor {
    fn name(&self) -> &'static str {
        "sensor"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![InputSpec::one("value")]
    }

    fn init(&mut self, output: &mut PropertyMap) -> Result<()> {
        output.declare("value");
        Ok(())
    }

    fn step(&mut self, ctx: &StepContext, input: &Inputs, output: &mut PropertyMap) -> Result<()> {
        let value = if ctx.is_first_step() {
            Value::Number(ctx.config.initial_co2_ppm)
        } else {
            input.value("value")
        };
        output.set("value", value);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::config::SimConfig;
    use crate::sim::time::Timeline;

    #[test]
    fn test_first_step_reports_initial_value() {
        let config = SimConfig {
            initial_co2_ppm: 450.0,
            ..SimConfig::new()
        };
        let timeline = Timeline::build(config.start, config.end, 600, &[]).unwrap();
        let mut sensor = Sensor::new();
        let mut out = PropertyMap::new();
        sensor.init(&mut out).unwrap();

        let input = Inputs::new().with("value", 812.0);
        let ctx = StepContext::new(&config, timeline.get(0).unwrap());
        sensor.step(&ctx, &input, &mut out).unwrap();
        assert_eq!(out.number("value"), Some(450.0));

        let ctx = StepContext::new(&config, timeline.get(1).unwrap());
        sensor.step(&ctx, &input, &mut out).unwrap();
        assert_eq!(out.number("value"), Some(812.0));
    }
}
