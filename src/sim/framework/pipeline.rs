use anyhow::Result;
use rayon::prelude::*;
use tracing::debug;

use super::{Inputs, PHASES, PhaseSpec, StepContext, Value};
use crate::EntityId;
use crate::sim::graph::{Binding, BoundGraph, Entity};

/// Executes the entities of a bound graph in phase order.
///
/// Within a phase, inputs of all members are gathered first and the members
/// are stepped afterwards, so no member can observe another member's
/// current-step output.
pub struct Pipeline {
    entities: Vec<Entity>,
    bindings: Vec<Vec<Binding>>,
    /// Member indices per phase, parallel to [`PHASES`].
    members: Vec<Vec<usize>>,
    parallel: bool,
}

impl Pipeline {
    pub fn new(graph: BoundGraph) -> Self {
        let BoundGraph { entities, bindings } = graph;
        let members = PHASES
            .iter()
            .map(|spec| {
                entities
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.phase() == Some(spec.phase))
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect();
        Self {
            entities,
            bindings,
            members,
            parallel: true,
        }
    }

    /// Enables or disables concurrent stepping of parallel phases.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| &e.id == id)
    }

    pub fn into_entities(self) -> Vec<Entity> {
        self.entities
    }

    /// Runs every phase once for the step described by `ctx`.
    pub fn step(&mut self, ctx: &StepContext) -> Result<()> {
        for (spec, members) in PHASES.iter().zip(&self.members) {
            if members.is_empty() {
                continue;
            }
            if spec.gated_by_control_step && !ctx.is_control_step() {
                debug!(
                    step = ctx.step_index,
                    phase = ?spec.phase,
                    "phase skipped between control steps"
                );
                continue;
            }
            let gathered: Vec<Inputs> = members.iter().map(|&i| self.gather(i)).collect();
            Self::run_phase(&mut self.entities, spec, members, gathered, ctx, self.parallel)?;
        }
        Ok(())
    }

    fn gather(&self, receiver: usize) -> Inputs {
        let mut inputs = Inputs::new();
        for b in &self.bindings[receiver] {
            let value = self.entities[b.sender]
                .output
                .get(&b.sender_property)
                .unwrap_or(Value::Uninitialized);
            inputs.push(&b.receiver_property, value);
        }
        inputs
    }

    fn run_phase(
        entities: &mut [Entity],
        spec: &PhaseSpec,
        members: &[usize],
        gathered: Vec<Inputs>,
        ctx: &StepContext,
        parallel: bool,
    ) -> Result<()> {
        // Members are in ascending index order, so a single pass pairs each
        // one with its gathered inputs.
        let targets: Vec<&mut Entity> = entities
            .iter_mut()
            .enumerate()
            .filter(|(i, _)| members.binary_search(i).is_ok())
            .map(|(_, e)| e)
            .collect();

        if spec.parallel && parallel && targets.len() > 1 {
            targets
                .into_par_iter()
                .zip(gathered.into_par_iter())
                .try_for_each(|(entity, input)| entity.step(ctx, input))
        } else {
            for (entity, input) in targets.into_iter().zip(gathered) {
                entity.step(ctx, input)?;
            }
            Ok(())
        }
    }
}
