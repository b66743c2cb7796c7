use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::EntityId;
use crate::sim::framework::{
    Component, Inputs, OutputSource, Phase, PropertyMap, StepContext, Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Sensor,
    Controller,
    Damper,
    Fan,
    BuildingSpace,
    Occupancy,
    OutdoorEnvironment,
    /// Ventilation sub-system grouping; never stepped.
    System,
    SystemMpc,
}

impl EntityKind {
    /// Phase the kind executes in, `None` for passive groupings.
    pub fn phase(self) -> Option<Phase> {
        match self {
            EntityKind::OutdoorEnvironment => Some(Phase::OutdoorEnvironment),
            EntityKind::Occupancy => Some(Phase::Occupancy),
            EntityKind::Sensor => Some(Phase::Sensor),
            EntityKind::SystemMpc => Some(Phase::Supervisor),
            EntityKind::Controller => Some(Phase::Controller),
            EntityKind::Damper => Some(Phase::Damper),
            EntityKind::BuildingSpace => Some(Phase::BuildingSpace),
            EntityKind::Fan => Some(Phase::Fan),
            EntityKind::System => None,
        }
    }
}

/// A simulation entity: identity, placement and its component state.
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub contained_in: Option<EntityId>,
    pub super_system: Option<EntityId>,
    /// Inputs gathered for the most recent step.
    pub input: Inputs,
    pub output: PropertyMap,
    component: Option<Box<dyn Component>>,
}

impl Entity {
    pub fn new<C: Component + 'static>(
        id: impl Into<EntityId>,
        kind: EntityKind,
        component: C,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            contained_in: None,
            super_system: None,
            input: Inputs::new(),
            output: PropertyMap::new(),
            component: Some(Box::new(component)),
        }
    }

    /// An entity without step logic (e.g. a `System`).
    pub fn passive(id: impl Into<EntityId>, kind: EntityKind) -> Self {
        Self {
            id: id.into(),
            kind,
            contained_in: None,
            super_system: None,
            input: Inputs::new(),
            output: PropertyMap::new(),
            component: None,
        }
    }

    pub fn contained_in(mut self, space: impl Into<EntityId>) -> Self {
        self.contained_in = Some(space.into());
        self
    }

    pub fn super_system(mut self, system: impl Into<EntityId>) -> Self {
        self.super_system = Some(system.into());
        self
    }

    pub fn phase(&self) -> Option<Phase> {
        self.kind.phase()
    }

    pub fn component(&self) -> Option<&dyn Component> {
        self.component.as_deref()
    }

    /// Downcasts the component to its concrete type.
    pub fn component_as<T: 'static>(&self) -> Option<&T> {
        self.component.as_ref()?.as_any().downcast_ref::<T>()
    }

    pub(crate) fn init(&mut self) -> Result<()> {
        if let Some(component) = self.component.as_mut() {
            component
                .init(&mut self.output)
                .with_context(|| format!("Failed to initialize `{}`", self.id))?;
        }
        Ok(())
    }

    /// Stores the gathered inputs and advances the component one step.
    pub(crate) fn step(&mut self, ctx: &StepContext, input: Inputs) -> Result<()> {
        self.input = input;
        if let Some(component) = self.component.as_mut() {
            component
                .step(ctx, &self.input, &mut self.output)
                .with_context(|| format!("Step {} failed for `{}`", ctx.step_index, self.id))?;
        }
        Ok(())
    }
}

impl OutputSource for Entity {
    fn get_output(&self, property: &str) -> Option<Value> {
        self.output.get(property)
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("contained_in", &self.contained_in)
            .field("super_system", &self.super_system)
            .field("output", &self.output)
            .finish()
    }
}
