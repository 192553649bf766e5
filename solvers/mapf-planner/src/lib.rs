//! Congestion-aware guide paths and one-step PIBT planning for grid MAPF.
//!
//! Components, leaf to root: [`grid`] (adjacency), [`heuristic`] (lazy BFS
//! distance cache), [`flow`] (per-cell directional congestion counters),
//! [`guide_path`] (congestion-weighted A*), [`dist_to_path`] (per-agent
//! distance-to-guide-path index), [`lns`] (neighborhood reroute search),
//! [`pibt`] (one-step joint action solver), and [`action`] (target-cell to
//! rotate/forward/wait translation). [`Planner`] wires all of it together.

pub mod action;
pub mod config;
pub mod diagnostics;
pub mod dist_to_path;
pub mod error;
pub mod flow;
pub mod grid;
pub mod guide_path;
pub mod heuristic;
pub mod lns;
pub mod pibt;
mod planner;

pub use config::{LnsMode, PlannerConfig};
pub use diagnostics::Diagnostic;
pub use error::PlannerError;
pub use grid::{Direction, Grid};
pub use planner::Planner;
