use std::any::Any;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::sim::framework::{Component, InputSpec, Inputs, PropertyMap, StepContext};
use crate::sim::scalar::Scalar;

/// Part-load power curve of a fan.
///
/// `W = (c1 + c2·f + c3·f² + c4·f³ + c5·f⁴) · WMax` with `f = flow / flowMax`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FanCurve {
    pub coefficients: [f64; 5],
    /// Nominal flow [m³/s].
    pub flow_max: f64,
    /// Nominal electric power [W].
    pub power_max: f64,
}

impl FanCurve {
    pub fn power<T: Scalar>(&self, flow: T) -> T {
        let f = flow / T::constant(self.flow_max);
        // Horner form of the quartic.
        let mut fpl = T::constant(self.coefficients[4]);
        for &c in self.coefficients[..4].iter().rev() {
            fpl = fpl * f + T::constant(c);
        }
        fpl * T::constant(self.power_max)
    }
}

/// Fan summing the flows of its dampers and integrating its energy use.
#[derive(Debug, Clone)]
pub struct Fan {
    pub curve: FanCurve,
}

impl Fan {
    pub fn new(curve: FanCurve) -> Self {
        Self { curve }
    }
}

impl Component for Fan {
    fn name(&self) -> &'static str {
        "fan"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![InputSpec::many("partialFlow")]
    }

    fn init(&mut self, output: &mut PropertyMap) -> Result<()> {
        output.declare("flow");
        output.declare("W");
        output.set("Energy", 0.0);
        Ok(())
    }

    fn step(&mut self, ctx: &StepContext, input: &Inputs, output: &mut PropertyMap) -> Result<()> {
        // Dampers without a position yet contribute no flow.
        let flow: f64 = input
            .all("partialFlow")
            .iter()
            .filter_map(|v| v.as_f64())
            .sum();
        let power = self.curve.power(flow);
        let energy = output.number("Energy").unwrap_or(0.0) + power * ctx.dt();
        output.set("flow", flow);
        output.set("W", power);
        output.set("Energy", energy);
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

    fn curve() -> FanCurve {
        FanCurve {
            coefficients: [0.1, 0.2, 0.3, 0.2, 0.2],
            flow_max: 2.0,
            power_max: 1000.0,
        }
    }

    #[test]
    fn test_power_curve() {
        let c = curve();
        // f = 0.5
        let fpl = 0.1 + 0.2 * 0.5 + 0.3 * 0.25 + 0.2 * 0.125 + 0.2 * 0.0625;
        assert!((c.power(1.0_f64) - fpl * 1000.0).abs() < 1e-9);
        assert!((c.power(2.0_f64) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_energy_accumulates() {
        let config = SimConfig::new();
        let timeline = Timeline::build(config.start, config.end, 600, &[]).unwrap();
        let ctx = StepContext::new(&config, timeline.get(0).unwrap());
        let mut fan = Fan::new(curve());
        let mut out = PropertyMap::new();
        fan.init(&mut out).unwrap();

        let input = Inputs::new()
            .with("partialFlow", 0.6)
            .with("partialFlow", 0.4);
        fan.step(&ctx, &input, &mut out).unwrap();
        let w = out.number("W").unwrap();
        assert!((out.number("flow").unwrap() - 1.0).abs() < 1e-12);
        fan.step(&ctx, &input, &mut out).unwrap();
        assert!((out.number("Energy").unwrap() - 2.0 * w * 600.0).abs() < 1e-6);
    }
}
