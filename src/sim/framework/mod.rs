//! Generic co-simulation runtime.
//!
//! Entities exchange [`Value`]s through named outputs. Each entity's step
//! logic is a [`Component`]; the [`Pipeline`] steps all entities in the fixed
//! phase order of [`PHASES`].

pub mod component;
pub mod context;
pub mod phase;
pub mod pipeline;
pub mod value;

pub use component::{Arity, Component, InputSpec};
pub use context::StepContext;
pub use phase::{Lag, PHASES, Phase, PhaseSpec, lag_between};
pub use pipeline::Pipeline;
pub use value::{Inputs, OutputSource, PropertyMap, Value};
