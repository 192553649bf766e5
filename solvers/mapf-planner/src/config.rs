//! Tunables for the planner. Not read from the environment — there is no
//! process boundary at this layer, just a library embedded in a harness —
//! but shaped after the teacher's `backend::config::Config` (named fields
//! with sane defaults) all the same.

/// Adaptive LNS neighborhood-selection mode, chosen per round based on past
/// improvement yield (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LnsMode {
    Random,
    Congestion,
    Deviation,
}

impl LnsMode {
    pub const COUNT: usize = 3;

    pub fn from_index(idx: usize) -> LnsMode {
        match idx % Self::COUNT {
            0 => LnsMode::Random,
            1 => LnsMode::Congestion,
            _ => LnsMode::Deviation,
        }
    }

    pub fn index(self) -> usize {
        match self {
            LnsMode::Random => 0,
            LnsMode::Congestion => 1,
            LnsMode::Deviation => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Rule-of-thumb PIBT runtime estimate used before any history exists,
    /// and as the fallback when the deadline clamp kicks in.
    pub pibt_runtime_per_100_agents_ms: u64,
    /// Length of the rolling window of past PIBT runtimes.
    pub pibt_time_history_len: usize,
    /// Slack left after the PIBT budget estimate and before the hard
    /// deadline, to account for scheduling jitter.
    pub deadline_tolerance_ms: u64,
    /// Number of agents touched per LNS neighborhood.
    pub lns_neighborhood_size: usize,
    /// Initial selection-mode weights (RANDOM, CONGESTION, DEVIATION);
    /// re-normalized adaptively as rounds report their improvement yield.
    pub lns_mode_weights: [f64; LnsMode::COUNT],
    /// Congestion-weighted edge cost coefficient for entering against
    /// opposing flow (spec.md §4.3).
    pub flow_cost_alpha: f64,
    /// Congestion-weighted edge cost coefficient for the remaining
    /// (non-entry-direction) flow through a cell.
    pub flow_cost_beta: f64,
    /// Seed for every RNG the planner owns (priority shuffle, PIBT
    /// tie-break, LNS random neighborhood selection).
    pub random_seed: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            pibt_runtime_per_100_agents_ms: 100,
            pibt_time_history_len: 10,
            deadline_tolerance_ms: 20,
            lns_neighborhood_size: 16,
            lns_mode_weights: [1.0, 1.0, 1.0],
            flow_cost_alpha: 4.0,
            flow_cost_beta: 1.0,
            random_seed: 0,
        }
    }
}
