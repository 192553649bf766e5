//! Non-fatal conditions surfaced alongside a successful `plan()` call.

/// A condition worth reporting that didn't stop planning from producing a
/// well-formed action vector. Collected fresh on every [`crate::Planner::plan`]
/// call; read via [`crate::Planner::diagnostics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    /// C4 could not find any path from the agent's current cell to its
    /// goal. The agent's trajectory is left empty; it waits at its current
    /// cell under the Manhattan-distance fallback until its goal changes
    /// or the grid does.
    UnreachableGoal { agent: usize },
}
