use std::any::Any;

use anyhow::Result;

use super::{Inputs, PropertyMap, StepContext};

/// How many senders an input property binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    One,
    Many,
}

/// Declaration of one input property read by a component's step logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    pub property: String,
    pub arity: Arity,
    /// Setup fails if a required input has no sender.
    pub required: bool,
}

impl InputSpec {
    pub fn one(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            arity: Arity::One,
            required: true,
        }
    }

    pub fn many(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            arity: Arity::Many,
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Step logic of one entity kind.
///
/// A component reads the values gathered for its inputs and writes only to
/// its own output map. Internal state (previous measurement, cumulative energy)
/// lives either in the component itself or in its previous-step outputs.
pub trait Component: Send {
    /// Human-readable identifier for debugging / telemetry.
    fn name(&self) -> &'static str;

    /// Input properties this component reads.
    fn inputs(&self) -> Vec<InputSpec> {
        Vec::new()
    }

    /// One-time initialization hook, typically declaring outputs.
    fn init(&mut self, _output: &mut PropertyMap) -> Result<()> {
        Ok(())
    }

    /// Advances the component by one base step.
    fn step(&mut self, ctx: &StepContext, input: &Inputs, output: &mut PropertyMap) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}
