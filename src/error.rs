//! Error taxonomy.
//!
//! Setup errors are fatal and abort before the first simulation step.
//! Solver failures are recovered by the MPC supervisor's fallback policy and
//! never leave the simulation loop.

use std::time::Duration;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::EntityId;

/// Fatal configuration/setup error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SetupError {
    /// A required input property has no producing entity.
    #[error("no sender bound to input `{property}` of `{entity}`")]
    ConfigResolution { entity: EntityId, property: String },
    /// Forecast or occupancy data does not cover the simulation window.
    #[error("{source_name} has no row for {at}")]
    TimeAlignment {
        source_name: String,
        at: NaiveDateTime,
    },
    /// Two entities share one id.
    #[error("duplicate entity id `{0}`")]
    DuplicateEntity(EntityId),
    /// A connection references an entity that does not exist.
    #[error("connection references unknown entity `{0}`")]
    UnknownEntity(EntityId),
    /// Sender and receiver execute in the same phase, so the read order is undefined.
    #[error("`{receiver}.{property}` reads `{sender}` which runs in the same phase")]
    SamePhaseBinding {
        receiver: EntityId,
        sender: EntityId,
        property: String,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Reason an MPC solve did not produce a usable trajectory.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveFailure {
    #[error("iteration budget of {iterations} exhausted")]
    IterationLimit { iterations: usize },
    #[error("time budget exhausted after {elapsed:?}")]
    TimeLimit { elapsed: Duration },
    #[error("objective is not finite")]
    NonFinite,
    /// The problem was rejected before solving (e.g. inconsistent dimensions).
    #[error("problem rejected: {0}")]
    Rejected(String),
}
