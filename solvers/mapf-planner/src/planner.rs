//! The `Planner` facade: owns every per-run structure and implements the
//! `initialize` / `plan` lifecycle from spec.md §6.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use mapf_core::{Action, AgentState, Cell, Orientation};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::action::{project_action, resolve_follow_safety};
use crate::config::PlannerConfig;
use crate::diagnostics::Diagnostic;
use crate::dist_to_path::DistToPathIndex;
use crate::error::PlannerError;
use crate::flow::FlowCounters;
use crate::grid::Grid;
use crate::guide_path::GoalNode;
use crate::heuristic::HeuristicCache;
use crate::lns::{LnsContext, LnsOrchestrator};
use crate::pibt::{plan_step, PibtContext, Priority};

/// Assign each agent a base priority by Fisher-Yates shuffling the agent
/// indices and ranking by shuffled position: the agent at shuffled position
/// `i` (0-indexed) gets `(n-i)/(n+1)`, so the first-shuffled agent gets the
/// highest base priority and they're otherwise evenly spread below 1.0.
/// Mirrors `original_source/default_planner/planner.cpp`'s
/// `std::shuffle(ids...)` followed by `p[ids[i]] = (ids.size()-i)/(ids.size()+1)`.
fn initial_priorities(num_agents: usize, rng: &mut StdRng) -> Vec<Priority> {
    let mut shuffled: Vec<usize> = (0..num_agents).collect();
    for i in 0..shuffled.len() {
        let j = rng.gen_range(i..shuffled.len());
        shuffled.swap(i, j);
    }

    let mut bases = vec![0.0_f64; num_agents];
    for (rank, &agent) in shuffled.iter().enumerate() {
        bases[agent] = (num_agents - rank) as f64 / (num_agents + 1) as f64;
    }
    bases.into_iter().map(Priority::new).collect()
}

/// Owns the full planning state for one run: the grid, the congestion and
/// heuristic caches, and every per-agent structure. Built once via
/// [`Planner::initialize`]; re-used across repeated [`Planner::plan`] calls.
pub struct Planner {
    config: PlannerConfig,
    grid: Grid,
    heuristics: HeuristicCache,
    flow: FlowCounters,
    orchestrator: LnsOrchestrator,
    trajectories: Vec<Vec<Cell>>,
    dist_to_path: Vec<DistToPathIndex>,
    goal_nodes: Vec<Option<GoalNode>>,
    last_replan_t: Vec<u64>,
    priorities: Vec<Priority>,
    /// Whether agent `i` had a non-empty `goal_locations` list as of the
    /// most recent `plan` call (as opposed to falling back to its dummy
    /// goal). Drives both the priority-reset condition and the dead-end
    /// bonus gate, mirroring `planner.cpp`'s `!env->goal_locations[i].empty()`
    /// guards.
    has_goal: Vec<bool>,
    dummy_goals: Vec<Cell>,
    rng: StdRng,
    pibt_time_history: VecDeque<Duration>,
    diagnostics: Vec<Diagnostic>,
}

impl Planner {
    /// Validate inputs, build the grid, and seed every per-agent structure.
    /// `start_locations[i]` is agent `i`'s spawn cell, recorded as its
    /// dummy goal (spec.md §3's fallback for an agent with no pending
    /// tasks).
    ///
    /// `preprocess_time_limit_ms` bounds how much of initialization's
    /// optional warm-up (priming the heuristic cache for each agent's
    /// first goal) is allowed to run; exceeding it simply stops the
    /// warm-up early; it is not a correctness requirement since the same
    /// queries are resumed lazily on the first `plan` call regardless.
    pub fn initialize(
        config: PlannerConfig,
        preprocess_time_limit_ms: u64,
        rows: u32,
        cols: u32,
        obstacle_mask: Vec<bool>,
        start_locations: Vec<Cell>,
    ) -> Result<Self, PlannerError> {
        let num_agents = start_locations.len();
        if num_agents == 0 {
            return Err(PlannerError::NoAgents);
        }

        let expected = rows as usize * cols as usize;
        if obstacle_mask.len() != expected {
            return Err(PlannerError::DimensionMismatch { expected, got: obstacle_mask.len() });
        }

        let grid = Grid::from_obstacle_mask(rows, cols, &obstacle_mask);

        for (agent, &loc) in start_locations.iter().enumerate() {
            if loc as usize >= grid.size() {
                return Err(PlannerError::AgentStartOutOfBounds { agent, location: loc });
            }
            if !grid.is_passable(loc) {
                return Err(PlannerError::AgentStartBlocked { agent, location: loc });
            }
        }

        let mut rng = StdRng::seed_from_u64(config.random_seed);
        let priorities = initial_priorities(num_agents, &mut rng);

        let mut planner = Self {
            orchestrator: LnsOrchestrator::new(grid.size(), config.lns_mode_weights),
            trajectories: vec![Vec::new(); num_agents],
            dist_to_path: (0..num_agents).map(|_| DistToPathIndex::new()).collect(),
            goal_nodes: vec![None; num_agents],
            last_replan_t: vec![0; num_agents],
            priorities,
            has_goal: vec![false; num_agents],
            dummy_goals: start_locations.clone(),
            heuristics: HeuristicCache::new(),
            flow: FlowCounters::new(grid.size()),
            grid,
            config,
            rng,
            pibt_time_history: VecDeque::new(),
            diagnostics: Vec::new(),
        };

        let deadline = Instant::now() + Duration::from_millis(preprocess_time_limit_ms);
        for (agent, &start) in start_locations.iter().enumerate() {
            if Instant::now() >= deadline {
                break;
            }
            let goal = planner.dummy_goals[agent];
            planner.heuristics.query(&planner.grid, start, goal);
        }

        Ok(planner)
    }

    pub fn num_agents(&self) -> usize {
        self.trajectories.len()
    }

    /// Diagnostics collected during the most recent `plan` call. Cleared at
    /// the start of every call, so this always reflects only the latest run.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Run one planning tick: install/refresh guide paths, improve them
    /// with LNS under the time budget, then run PIBT and project its
    /// output into actions. Always returns a well-formed, full-length
    /// action vector; a truncated deadline only degrades path quality, it
    /// never produces a missing or invalid action.
    pub fn plan(
        &mut self,
        curr_states: &[AgentState],
        goal_locations: &[Vec<Cell>],
        curr_timestep: u64,
        time_limit_ms: u64,
    ) -> Vec<Action> {
        let start = Instant::now();
        let n = self.num_agents();
        debug_assert_eq!(curr_states.len(), n);
        debug_assert_eq!(goal_locations.len(), n);
        self.diagnostics.clear();

        let current_locations: Vec<Cell> = curr_states.iter().map(|s| s.location).collect();
        let goals: Vec<Cell> = (0..n)
            .map(|i| goal_locations[i].first().copied().unwrap_or(self.dummy_goals[i]))
            .collect();
        self.has_goal = goal_locations.iter().map(|g| !g.is_empty()).collect();

        self.update_priorities(&goals);

        let pibt_budget = self.estimate_pibt_budget(n);
        let tolerance = Duration::from_millis(self.config.deadline_tolerance_ms);
        let total_budget = Duration::from_millis(time_limit_ms);
        let lns_budget = total_budget.checked_sub(pibt_budget + tolerance);

        {
            let mut ctx = LnsContext {
                grid: &self.grid,
                flow: &mut self.flow,
                heuristics: &mut self.heuristics,
                trajectories: &mut self.trajectories,
                dist_to_path: &mut self.dist_to_path,
                goal_nodes: &mut self.goal_nodes,
                current_locations: &current_locations,
                goals: &goals,
                last_replan_t: &mut self.last_replan_t,
                curr_timestep,
                diagnostics: &mut self.diagnostics,
            };
            self.orchestrator.ensure_initial_paths(&mut ctx, &self.config);

            match lns_budget {
                Some(budget) if !budget.is_zero() => {
                    let deadline = start + pibt_budget + tolerance + budget;
                    self.orchestrator.run(&mut ctx, &self.config, &mut self.rng, deadline);
                }
                _ => {
                    tracing::debug!(
                        time_limit_ms,
                        pibt_budget_ms = pibt_budget.as_millis() as u64,
                        "no time budget left for LNS this tick"
                    );
                }
            }
        }

        let pibt_start = Instant::now();
        let order = self.priority_order(&current_locations);
        let next_targets = {
            let mut ctx = PibtContext::new(
                &self.grid,
                &mut self.dist_to_path,
                &self.trajectories,
                &goals,
                &current_locations,
            );
            plan_step(&mut ctx, &order, &mut self.rng)
        };
        self.record_pibt_time(pibt_start.elapsed());

        let mut actions: Vec<Action> = (0..n)
            .map(|i| project_action(&self.grid, curr_states[i].location, curr_states[i].orientation, next_targets[i]))
            .collect();
        resolve_follow_safety(&mut actions, &current_locations, &next_targets);

        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            time_limit_ms,
            "plan() complete"
        );
        actions
    }

    /// Reset an agent's priority to its shuffled base whenever it has no
    /// pending goal (sitting on its dummy goal) or its guide path needs
    /// rebuilding (no trajectory yet, or the trajectory no longer ends at
    /// the current goal); otherwise let it age by one. Mirrors
    /// `planner.cpp`'s `require_guide_path[i]` / `p_copy` reset logic: an
    /// idle dummy-goal agent is pinned at its base priority every tick
    /// rather than aging, and only an agent that both has a live task and
    /// an up-to-date guide path accumulates priority.
    fn update_priorities(&mut self, goals: &[Cell]) {
        for i in 0..self.num_agents() {
            let needs_new_path = self.needs_new_path(i, goals[i]);
            if !self.has_goal[i] || needs_new_path {
                self.priorities[i].reset_to_base();
            } else {
                self.priorities[i].age();
            }
        }
    }

    fn needs_new_path(&self, agent: usize, goal: Cell) -> bool {
        match self.trajectories[agent].last() {
            None => true,
            Some(&last) => last != goal,
        }
    }

    fn priority_order(&self, current_locations: &[Cell]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.num_agents()).collect();
        order.sort_unstable_by(|&a, &b| {
            let score_a = self.effective_priority(a, current_locations[a]);
            let score_b = self.effective_priority(b, current_locations[b]);
            score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal)
        });
        order
    }

    /// Dead-end (single-neighbor) bonus, gated on the agent actually having
    /// a pending goal — matching `planner.cpp`'s
    /// `!env->goal_locations[i].empty() && ...size() == 1` guard, so an idle
    /// dummy-goal agent parked in a corridor doesn't out-rank a working one.
    fn effective_priority(&self, agent: usize, current: Cell) -> f64 {
        let dead_end_bonus =
            if self.has_goal[agent] && self.grid.neighbors(current).len() == 1 { 10.0 } else { 0.0 };
        self.priorities[agent].score + dead_end_bonus
    }

    fn estimate_pibt_budget(&self, num_agents: usize) -> Duration {
        if let Some(max) = self.pibt_time_history.iter().max() {
            *max
        } else {
            Duration::from_millis(
                self.config.pibt_runtime_per_100_agents_ms * num_agents as u64 / 100,
            )
        }
    }

    fn record_pibt_time(&mut self, elapsed: Duration) {
        self.pibt_time_history.push_back(elapsed);
        while self.pibt_time_history.len() > self.config.pibt_time_history_len {
            self.pibt_time_history.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(loc: Cell, o: Orientation) -> AgentState {
        AgentState::new(loc, o)
    }

    #[test]
    fn rejects_zero_agents() {
        let err = Planner::initialize(PlannerConfig::default(), 0, 3, 3, vec![false; 9], vec![]);
        assert_eq!(err.unwrap_err(), PlannerError::NoAgents);
    }

    #[test]
    fn rejects_dimension_mismatch() {
        let err = Planner::initialize(PlannerConfig::default(), 0, 3, 3, vec![false; 5], vec![0]);
        assert_eq!(err.unwrap_err(), PlannerError::DimensionMismatch { expected: 9, got: 5 });
    }

    #[test]
    fn rejects_blocked_start() {
        let mut mask = vec![false; 9];
        mask[0] = true;
        let err = Planner::initialize(PlannerConfig::default(), 0, 3, 3, mask, vec![0]);
        assert_eq!(err.unwrap_err(), PlannerError::AgentStartBlocked { agent: 0, location: 0 });
    }

    #[test]
    fn s1_wait_at_goal() {
        let mut planner =
            Planner::initialize(PlannerConfig::default(), 10, 3, 3, vec![false; 9], vec![0]).unwrap();
        let actions = planner.plan(&[state(0, Orientation::East)], &[vec![0]], 0, 50);
        assert_eq!(actions, vec![Action::Wait]);
    }

    #[test]
    fn s2_straight_forward() {
        let mut planner =
            Planner::initialize(PlannerConfig::default(), 10, 1, 5, vec![false; 5], vec![0]).unwrap();
        assert_eq!(planner.heuristics.query(&planner.grid, 0, 4), Some(4));
        let actions = planner.plan(&[state(0, Orientation::East)], &[vec![4]], 0, 50);
        assert_eq!(actions, vec![Action::Forward]);
    }

    #[test]
    fn s3_rotate_then_forward() {
        let mut planner =
            Planner::initialize(PlannerConfig::default(), 10, 3, 3, vec![false; 9], vec![4]).unwrap();
        let first = planner.plan(&[state(4, Orientation::East)], &[vec![1]], 0, 50);
        assert_eq!(first, vec![Action::CounterClockwiseRotate]);
        let second = planner.plan(&[state(4, Orientation::North)], &[vec![1]], 1, 50);
        assert_eq!(second, vec![Action::Forward]);
    }

    #[test]
    fn s4_head_on_one_moves_one_waits() {
        let mut planner = Planner::initialize(
            PlannerConfig::default(),
            10,
            1,
            3,
            vec![false; 3],
            vec![0, 2],
        )
        .unwrap();
        let actions = planner.plan(
            &[state(0, Orientation::East), state(2, Orientation::West)],
            &[vec![2], vec![0]],
            0,
            50,
        );
        let waits = actions.iter().filter(|&&a| a == Action::Wait).count();
        let forwards = actions.iter().filter(|&&a| a == Action::Forward).count();
        assert_eq!(waits, 1);
        assert_eq!(forwards, 1);
    }

    #[test]
    fn plan_output_length_matches_agent_count() {
        let mut planner = Planner::initialize(
            PlannerConfig::default(),
            5,
            5,
            5,
            vec![false; 25],
            vec![0, 1, 2, 3],
        )
        .unwrap();
        let states: Vec<AgentState> = [0u32, 1, 2, 3]
            .iter()
            .map(|&l| state(l, Orientation::East))
            .collect();
        let goals = vec![vec![24], vec![23], vec![22], vec![21]];
        let actions = planner.plan(&states, &goals, 0, 20);
        assert_eq!(actions.len(), 4);
    }

    #[test]
    fn deterministic_under_fixed_seed() {
        let mk = || {
            Planner::initialize(
                PlannerConfig::default(),
                5,
                10,
                10,
                vec![false; 100],
                vec![0, 9, 90, 99, 45, 54],
            )
            .unwrap()
        };
        let states: Vec<AgentState> = [0u32, 9, 90, 99, 45, 54]
            .iter()
            .map(|&l| state(l, Orientation::East))
            .collect();
        let goals = vec![vec![99], vec![90], vec![9], vec![0], vec![54], vec![45]];

        let mut a = mk();
        let mut b = mk();
        let out_a = a.plan(&states, &goals, 0, 30);
        let out_b = b.plan(&states, &goals, 0, 30);
        assert_eq!(out_a, out_b);
    }
}
