//! C6: Large Neighborhood Search orchestrator.
//!
//! Repeatedly destroys and rebuilds a small subset of agents' guide paths
//! against the current congestion field. Each single-agent rebuild is a
//! genuine shortest path under the flow left behind by every other
//! currently-installed trajectory, so the step can never raise that agent's
//! own cost; run enough of them and the aggregate sum-of-costs trends down.
//! This is the Frank-Wolfe-style descent spec.md §4.5 describes: each
//! rebuild is a linearized (single-agent) re-solve against a fixed
//! congestion field, not a full joint replan.

use std::time::Instant;

use mapf_core::Cell;
use rand::Rng;

use crate::config::{LnsMode, PlannerConfig};
use crate::diagnostics::Diagnostic;
use crate::dist_to_path::DistToPathIndex;
use crate::flow::FlowCounters;
use crate::grid::Grid;
use crate::guide_path::{BuildResult, GoalNode, GuidePathBuilder};
use crate::heuristic::HeuristicCache;

/// Per-agent ranking metric for neighborhood selection (spec.md §3's "FW
/// metric"). `rand` breaks ties and gives every selection mode a stable
/// ordering even when two agents score identically.
#[derive(Clone, Copy)]
pub struct FwMetric {
    pub agent: usize,
    pub deviation: u32,
    pub last_replan_t: u64,
    pub rand: f64,
}

/// Everything the orchestrator needs to read and mutate, borrowed from the
/// planner for the duration of one `run` call.
pub struct LnsContext<'a> {
    pub grid: &'a Grid,
    pub flow: &'a mut FlowCounters,
    pub heuristics: &'a mut HeuristicCache,
    pub trajectories: &'a mut [Vec<Cell>],
    pub dist_to_path: &'a mut [DistToPathIndex],
    pub goal_nodes: &'a mut [Option<GoalNode>],
    pub current_locations: &'a [Cell],
    pub goals: &'a [Cell],
    pub last_replan_t: &'a mut [u64],
    pub curr_timestep: u64,
    pub diagnostics: &'a mut Vec<Diagnostic>,
}

impl LnsContext<'_> {
    fn num_agents(&self) -> usize {
        self.trajectories.len()
    }

    /// Rebuild agent `i`'s guide path under the current flow, updating flow,
    /// the distance-to-path index and the goal node in lockstep. Returns
    /// `true` if a path was found.
    fn rebuild(&mut self, builder: &mut GuidePathBuilder, i: usize, config: &PlannerConfig) -> bool {
        let start = self.current_locations[i];
        let goal = self.goals[i];

        if !self.trajectories[i].is_empty() {
            self.flow.remove(self.grid, &self.trajectories[i]);
        }

        match builder.build(
            self.grid,
            self.flow,
            self.heuristics,
            start,
            goal,
            config.flow_cost_alpha,
            config.flow_cost_beta,
        ) {
            BuildResult::Found { trajectory, goal_node } => {
                self.flow.add(self.grid, &trajectory);
                self.dist_to_path[i].install(&trajectory);
                self.trajectories[i] = trajectory;
                self.goal_nodes[i] = Some(goal_node);
                self.last_replan_t[i] = self.curr_timestep;
                true
            }
            BuildResult::Unreachable => {
                tracing::warn!(agent = i, "guide path unreachable, waiting in place");
                self.trajectories[i].clear();
                self.goal_nodes[i] = None;
                self.diagnostics.push(Diagnostic::UnreachableGoal { agent: i });
                false
            }
        }
    }

    fn soc(&self) -> u64 {
        self.goal_nodes.iter().filter_map(|g| g.map(|g| g.g as u64)).sum()
    }

    fn needs_initial_path(&self, i: usize) -> bool {
        match self.trajectories[i].last() {
            None => true,
            Some(&last) => last != self.goals[i],
        }
    }
}

/// Owns the reusable A* arena and the adaptive mode weights. Persists across
/// planning calls on the planner so the weights keep learning.
pub struct LnsOrchestrator {
    builder: GuidePathBuilder,
    mode_weights: [f64; LnsMode::COUNT],
    stable_rounds: u32,
}

impl LnsOrchestrator {
    pub fn new(grid_size: usize, initial_weights: [f64; LnsMode::COUNT]) -> Self {
        Self {
            builder: GuidePathBuilder::new(grid_size),
            mode_weights: initial_weights,
            stable_rounds: 0,
        }
    }

    /// Step 1 of spec.md §4.5: build a path for every agent that doesn't
    /// have one, or whose trajectory no longer ends at its current goal
    /// (the agent finished a task, or was assigned a new one).
    pub fn ensure_initial_paths(&mut self, ctx: &mut LnsContext, config: &PlannerConfig) {
        for i in 0..ctx.num_agents() {
            if ctx.needs_initial_path(i) {
                ctx.rebuild(&mut self.builder, i, config);
            }
        }
    }

    /// Step 2: repeatedly select a neighborhood and reroute it until the
    /// deadline or a run of stable (no-op) rounds.
    pub fn run(
        &mut self,
        ctx: &mut LnsContext,
        config: &PlannerConfig,
        rng: &mut impl Rng,
        deadline: Instant,
    ) {
        const STABLE_ROUND_LIMIT: u32 = 3;
        let mut soc = ctx.soc();

        loop {
            if Instant::now() >= deadline {
                tracing::debug!("LNS deadline reached, truncating");
                return;
            }
            if ctx.num_agents() == 0 {
                return;
            }

            let mode = self.pick_mode(rng);
            let neighborhood = self.select_neighborhood(ctx, mode, config.lns_neighborhood_size, rng);

            let mut any_changed = false;
            for agent in neighborhood {
                let before = ctx.goal_nodes[agent].map(|g| g.g);
                if ctx.rebuild(&mut self.builder, agent, config) {
                    let after = ctx.goal_nodes[agent].map(|g| g.g);
                    if before != after {
                        any_changed = true;
                    }
                }
            }

            let new_soc = ctx.soc();
            let improvement = soc.saturating_sub(new_soc) as f64;
            self.record_yield(mode, improvement);
            soc = new_soc;

            if any_changed {
                self.stable_rounds = 0;
            } else {
                self.stable_rounds += 1;
                if self.stable_rounds >= STABLE_ROUND_LIMIT {
                    self.stable_rounds = 0;
                    // Force a different mode next round by zeroing this
                    // one's weight momentarily; record_yield will let it
                    // recover once it earns improvement again.
                    self.mode_weights[mode.index()] *= 0.1;
                }
            }
        }
    }

    fn pick_mode(&self, rng: &mut impl Rng) -> LnsMode {
        let total: f64 = self.mode_weights.iter().sum();
        if total <= 0.0 {
            return LnsMode::from_index(rng.gen_range(0..LnsMode::COUNT));
        }
        let mut pick = rng.gen_range(0.0..total);
        for idx in 0..LnsMode::COUNT {
            if pick < self.mode_weights[idx] {
                return LnsMode::from_index(idx);
            }
            pick -= self.mode_weights[idx];
        }
        LnsMode::from_index(LnsMode::COUNT - 1)
    }

    fn record_yield(&mut self, mode: LnsMode, improvement: f64) {
        let slot = &mut self.mode_weights[mode.index()];
        // EWMA toward observed improvement, floored so a mode that's gone
        // cold can still be sampled occasionally and recover.
        *slot = (*slot * 0.8 + improvement * 0.2).max(0.05);
    }

    fn select_neighborhood(
        &self,
        ctx: &LnsContext,
        mode: LnsMode,
        size: usize,
        rng: &mut impl Rng,
    ) -> Vec<usize> {
        let n = ctx.num_agents();
        let size = size.min(n);
        match mode {
            LnsMode::Random => {
                let mut agents: Vec<usize> = (0..n).collect();
                for i in 0..size {
                    let j = rng.gen_range(i..n);
                    agents.swap(i, j);
                }
                agents.truncate(size);
                agents
            }
            LnsMode::Congestion => {
                let mut scored: Vec<(u32, usize)> = (0..n)
                    .map(|i| (Self::trajectory_congestion(ctx, i), i))
                    .collect();
                scored.sort_unstable_by(|a, b| b.0.cmp(&a.0));
                scored.into_iter().take(size).map(|(_, i)| i).collect()
            }
            LnsMode::Deviation => {
                let mut metrics: Vec<FwMetric> = (0..n)
                    .map(|i| FwMetric {
                        agent: i,
                        deviation: Self::deviation_score(ctx, i),
                        last_replan_t: ctx.last_replan_t[i],
                        rand: rng.gen(),
                    })
                    .collect();
                metrics.sort_unstable_by(|a, b| {
                    b.deviation
                        .cmp(&a.deviation)
                        .then_with(|| a.last_replan_t.cmp(&b.last_replan_t))
                        .then_with(|| a.rand.partial_cmp(&b.rand).unwrap_or(std::cmp::Ordering::Equal))
                });
                metrics.into_iter().take(size).map(|m| m.agent).collect()
            }
        }
    }

    fn trajectory_congestion(ctx: &LnsContext, agent: usize) -> u32 {
        ctx.trajectories[agent]
            .iter()
            .map(|&c| ctx.flow.get(c).total())
            .max()
            .unwrap_or(0)
    }

    fn deviation_score(ctx: &LnsContext, agent: usize) -> u32 {
        // Querying mutates the lazy index's internal queue; deviation
        // scoring is read-mostly here so a cheap clone stands in for a
        // read-only view rather than disturbing the agent's real index.
        let mut idx = ctx.dist_to_path[agent].clone();
        idx.get(ctx.grid, ctx.current_locations[agent]).unwrap_or(0)
    }
}
