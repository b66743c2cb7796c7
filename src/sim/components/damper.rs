use std::any::Any;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::sim::framework::{Component, InputSpec, Inputs, PropertyMap, StepContext, Value};

/// Air path a damper or fan belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationMode {
    Supply,
    Exhaust,
}

/// Linear damper: `flow = posSignal · flowMax`.
#[derive(Debug, Clone)]
pub struct Damper {
    /// Nominal flow at full opening [m³/s].
    pub flow_max: f64,
}

impl Damper {
    pub fn new(flow_max: f64) -> Self {
        Self { flow_max }
    }
}

impl Component for Damper {
    fn name(&self) -> &'static str {
        "damper"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![InputSpec::one("posSignal")]
    }

    fn init(&mut self, output: &mut PropertyMap) -> Result<()> {
        output.declare("flow");
        Ok(())
    }

    fn step(&mut self, _ctx: &StepContext, input: &Inputs, output: &mut PropertyMap) -> Result<()> {
        let flow: Value = input
            .scalar("posSignal")
            .map(|pos| pos * self.flow_max)
            .into();
        output.set("flow", flow);
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
    fn test_flow_is_linear_in_position() {
        let config = SimConfig::new();
        let timeline = Timeline::build(config.start, config.end, 600, &[]).unwrap();
        let ctx = StepContext::new(&config, timeline.get(1).unwrap());
        let mut damper = Damper::new(0.8);
        let mut out = PropertyMap::new();
        damper.init(&mut out).unwrap();

        damper
            .step(&ctx, &Inputs::new().with("posSignal", 0.25), &mut out)
            .unwrap();
        assert!((out.number("flow").unwrap() - 0.2).abs() < 1e-12);

        damper
            .step(&ctx, &Inputs::new().with("posSignal", Value::Uninitialized), &mut out)
            .unwrap();
        assert_eq!(out.get("flow"), Some(Value::Uninitialized));
    }
}
