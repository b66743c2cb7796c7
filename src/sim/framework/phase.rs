//! Fixed causal evaluation order.
//!
//! The phase list is data: the scheduler walks [`PHASES`] in order, and the
//! resolver derives the lag of every binding from the relative position of
//! sender and receiver phases.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    OutdoorEnvironment,
    Occupancy,
    Sensor,
    Supervisor,
    Controller,
    Damper,
    BuildingSpace,
    Fan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSpec {
    pub phase: Phase,
    /// Runs only on base steps that start a control step.
    pub gated_by_control_step: bool,
    /// Members may be stepped concurrently.
    pub parallel: bool,
}

pub const PHASES: [PhaseSpec; 8] = [
    PhaseSpec {
        phase: Phase::OutdoorEnvironment,
        gated_by_control_step: false,
        parallel: false,
    },
    PhaseSpec {
        phase: Phase::Occupancy,
        gated_by_control_step: false,
        parallel: false,
    },
    PhaseSpec {
        phase: Phase::Sensor,
        gated_by_control_step: false,
        parallel: false,
    },
    PhaseSpec {
        phase: Phase::Supervisor,
        gated_by_control_step: true,
        parallel: true,
    },
    PhaseSpec {
        phase: Phase::Controller,
        gated_by_control_step: false,
        parallel: false,
    },
    PhaseSpec {
        phase: Phase::Damper,
        gated_by_control_step: false,
        parallel: false,
    },
    PhaseSpec {
        phase: Phase::BuildingSpace,
        gated_by_control_step: false,
        parallel: false,
    },
    PhaseSpec {
        phase: Phase::Fan,
        gated_by_control_step: false,
        parallel: false,
    },
];

impl Phase {
    /// Position in [`PHASES`].
    pub fn order(self) -> usize {
        PHASES
            .iter()
            .position(|spec| spec.phase == self)
            .unwrap_or(PHASES.len())
    }

    pub fn spec(self) -> PhaseSpec {
        PHASES[self.order()]
    }
}

/// Which step's output a receiver observes when it reads a sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lag {
    /// Sender already ran this step.
    SameStep,
    /// Sender has not run yet this step; its previous-step output is read.
    PreviousStep,
}

/// Lag of a binding, `None` if both phases coincide (read order undefined).
pub fn lag_between(receiver: Phase, sender: Phase) -> Option<Lag> {
    let (r, s) = (receiver.order(), sender.order());
    if s < r {
        Some(Lag::SameStep)
    } else if s > r {
        Some(Lag::PreviousStep)
    } else {
        None
    }
}
