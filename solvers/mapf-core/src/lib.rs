//! Shared MAPF types and MovingAI format parser.
//!
//! Provides the grid-agnostic primitives (`Cell`, `Orientation`, `Action`,
//! `AgentState`) used across the workspace, plus parsers for the MovingAI
//! `.map` and `.scen` formats. Parsing is test-fixture tooling: the planner
//! itself is handed an already-decoded obstacle mask (see `mapf-planner`)
//! and never reads a map file directly.

mod map;
mod scenario;
mod types;

pub use map::{GridMap, MapError, Tile};
pub use scenario::{Scenario, ScenarioEntry, ScenarioError};
pub use types::{Action, AgentState, Cell, Orientation};
