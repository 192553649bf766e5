//! Planner error types.

use thiserror::Error;

/// Fatal errors raised by [`crate::Planner::initialize`].
///
/// Anything that can be recovered from locally (an unreachable goal, a
/// deadline cutting LNS short) is not represented here — see
/// [`crate::Diagnostic`] for those.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlannerError {
    #[error("num_agents must be non-zero")]
    NoAgents,

    #[error("obstacle_mask length {got} does not match rows*cols {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("agent {agent} start location {location} is an obstacle")]
    AgentStartBlocked { agent: usize, location: u32 },

    #[error("agent {agent} start location {location} is out of bounds")]
    AgentStartOutOfBounds { agent: usize, location: u32 },
}
