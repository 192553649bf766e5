//! C7: priority-inheritance-with-backtracking one-step joint planner.
//!
//! Explicit recursion, capped by agent count per spec.md §9's
//! re-architecture hint (a cycle through `higher` chains can't exceed
//! `num_agents` frames since every agent is visited at most once per call).

use std::cmp::Ordering;

use mapf_core::Cell;
use rand::Rng;

use crate::dist_to_path::DistToPathIndex;
use crate::grid::Grid;

/// Per-agent priority score for the outer iteration order (spec.md §4.6).
#[derive(Clone, Copy)]
pub struct Priority {
    pub base: f64,
    pub score: f64,
}

impl Priority {
    pub fn new(base: f64) -> Self {
        Self { base, score: base }
    }

    /// Call once per tick for an agent that has not finished its task.
    pub fn age(&mut self) {
        self.score += 1.0;
    }

    /// Call when an agent completes its current task.
    pub fn reset_to_base(&mut self) {
        self.score = self.base;
    }
}

/// One PIBT run's mutable bookkeeping, borrowed fresh from the planner each
/// timestep: current locations, guide-path distance indices, goals, and the
/// per-agent outputs this call produces.
pub struct PibtContext<'a> {
    pub grid: &'a Grid,
    pub dist_to_path: &'a mut [DistToPathIndex],
    pub trajectories: &'a [Vec<Cell>],
    pub goals: &'a [Cell],
    pub current_locations: &'a [Cell],
    /// `None` until the agent is assigned a next cell this call.
    pub next: Vec<Option<Cell>>,
    /// Which agent (if any) currently holds each cell as its assigned next
    /// target, used to detect the agent occupying a candidate cell and to
    /// enforce the non-collision invariant.
    occupied_by: Vec<Option<usize>>,
    /// Agents that are mid-recursion in the current call stack; guards
    /// against infinite mutual recursion in pathological priority cycles.
    in_progress: Vec<bool>,
}

impl<'a> PibtContext<'a> {
    pub fn new(
        grid: &'a Grid,
        dist_to_path: &'a mut [DistToPathIndex],
        trajectories: &'a [Vec<Cell>],
        goals: &'a [Cell],
        current_locations: &'a [Cell],
    ) -> Self {
        let n = current_locations.len();
        Self {
            grid,
            dist_to_path,
            trajectories,
            goals,
            current_locations,
            next: vec![None; n],
            occupied_by: vec![None; grid.size()],
            in_progress: vec![false; n],
        }
    }

    fn cost_to_goal(&mut self, agent: usize, cell: Cell) -> u32 {
        if !self.trajectories[agent].is_empty() {
            if let Some(d) = self.dist_to_path[agent].get(self.grid, cell) {
                return d;
            }
        }
        self.grid.manhattan(cell, self.goals[agent])
    }

    /// The agent (if any) whose *current* location is `cell` and who has
    /// not yet been assigned a next cell this call.
    fn agent_currently_at(&self, cell: Cell, exclude: usize) -> Option<usize> {
        self.current_locations.iter().position(|&loc| {
            loc == cell
        }).filter(|&i| i != exclude && self.next[i].is_none())
    }
}

/// Run PIBT for one agent, attempting to secure it (and transitively,
/// whoever it displaces) a next cell. `higher` is the agent that invoked
/// this call via priority inheritance, if any — its current cell is
/// off-limits (swap prevention).
pub fn pibt(ctx: &mut PibtContext, agent: usize, higher: Option<usize>, rng: &mut impl Rng) -> bool {
    if ctx.next[agent].is_some() {
        return true;
    }
    if ctx.in_progress[agent] {
        return false;
    }
    ctx.in_progress[agent] = true;

    let current = ctx.current_locations[agent];
    let higher_loc = higher.map(|h| ctx.current_locations[h]);

    let mut candidates: Vec<Cell> = Vec::with_capacity(5);
    candidates.push(current);
    for &(next_cell, _dir) in ctx.grid.neighbors(current) {
        candidates.push(next_cell);
    }

    candidates.retain(|&c| {
        if let Some(holder) = ctx.occupied_by[c as usize] {
            if holder != agent {
                return false;
            }
        }
        Some(c) != higher_loc
    });

    let mut scored: Vec<(u32, Cell, f64)> = candidates
        .into_iter()
        .map(|c| {
            let cost = ctx.cost_to_goal(agent, c);
            (cost, c, rng.gen::<f64>())
        })
        .collect();
    scored.sort_unstable_by(|a, b| {
        a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)).then_with(|| {
            a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal)
        })
    });

    for (_, candidate, _) in scored {
        ctx.occupied_by[candidate as usize] = Some(agent);

        if let Some(occupant) = ctx.agent_currently_at(candidate, agent) {
            if pibt(ctx, occupant, Some(agent), rng) {
                ctx.next[agent] = Some(candidate);
                ctx.in_progress[agent] = false;
                return true;
            }
            ctx.occupied_by[candidate as usize] = None;
            continue;
        }

        ctx.next[agent] = Some(candidate);
        ctx.in_progress[agent] = false;
        return true;
    }

    ctx.in_progress[agent] = false;
    tracing::debug!(agent, "PIBT exhausted candidates, waiting in place");
    false
}

/// Run PIBT for every agent, in descending priority order, and return each
/// agent's chosen next cell (falling back to its current cell if no
/// candidate could be secured).
pub fn plan_step(ctx: &mut PibtContext, order: &[usize], rng: &mut impl Rng) -> Vec<Cell> {
    for &agent in order {
        if ctx.next[agent].is_none() {
            pibt(ctx, agent, None, rng);
        }
    }
    (0..ctx.current_locations.len())
        .map(|i| ctx.next[i].unwrap_or(ctx.current_locations[i]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn open_grid(rows: u32, cols: u32) -> Grid {
        Grid::from_obstacle_mask(rows, cols, &vec![false; (rows * cols) as usize])
    }

    #[test]
    fn single_agent_moves_toward_goal() {
        let grid = open_grid(1, 5);
        let mut dist_to_path = vec![DistToPathIndex::new()];
        let trajectories = vec![Vec::new()];
        let goals = vec![4];
        let current_locations = vec![0];
        let mut ctx = PibtContext::new(&grid, &mut dist_to_path, &trajectories, &goals, &current_locations);
        let mut rng = StdRng::seed_from_u64(0);
        let result = plan_step(&mut ctx, &[0], &mut rng);
        assert_eq!(result[0], 1);
    }

    #[test]
    fn agent_at_goal_waits() {
        let grid = open_grid(3, 3);
        let mut dist_to_path = vec![DistToPathIndex::new()];
        let trajectories = vec![Vec::new()];
        let goals = vec![0];
        let current_locations = vec![0];
        let mut ctx = PibtContext::new(&grid, &mut dist_to_path, &trajectories, &goals, &current_locations);
        let mut rng = StdRng::seed_from_u64(0);
        let result = plan_step(&mut ctx, &[0], &mut rng);
        assert_eq!(result[0], 0);
    }

    #[test]
    fn no_two_agents_target_same_cell() {
        // Two agents converging on the same middle cell from either side.
        let grid = open_grid(1, 3);
        let mut dist_to_path = vec![DistToPathIndex::new(), DistToPathIndex::new()];
        let trajectories = vec![Vec::new(), Vec::new()];
        let goals = vec![2, 0];
        let current_locations = vec![0, 2];
        let mut ctx = PibtContext::new(&grid, &mut dist_to_path, &trajectories, &goals, &current_locations);
        let mut rng = StdRng::seed_from_u64(1);
        let result = plan_step(&mut ctx, &[0, 1], &mut rng);
        assert_ne!(result[0], result[1]);
    }

    #[test]
    fn no_swap_between_adjacent_agents() {
        let grid = open_grid(1, 3);
        let mut dist_to_path = vec![DistToPathIndex::new(), DistToPathIndex::new()];
        let trajectories = vec![Vec::new(), Vec::new()];
        let goals = vec![1, 0];
        let current_locations = vec![0, 1];
        let mut ctx = PibtContext::new(&grid, &mut dist_to_path, &trajectories, &goals, &current_locations);
        let mut rng = StdRng::seed_from_u64(2);
        let result = plan_step(&mut ctx, &[0, 1], &mut rng);
        // Agent 0 wants cell 1 (agent 1's current); agent 1 wants cell 0
        // (agent 0's current). A straight swap is forbidden: at most one
        // of them actually advances onto the other's cell.
        let swapped = result[0] == current_locations[1] && result[1] == current_locations[0];
        assert!(!swapped);
    }

    #[test]
    fn lower_priority_agent_can_be_bumped_and_backtrack() {
        // Three agents in a row; the leader wants to move into the middle
        // agent's cell, which should recursively push the middle agent
        // forward rather than fail outright.
        let grid = open_grid(1, 4);
        let mut dist_to_path = vec![
            DistToPathIndex::new(),
            DistToPathIndex::new(),
            DistToPathIndex::new(),
        ];
        let trajectories = vec![Vec::new(), Vec::new(), Vec::new()];
        let goals = vec![2, 3, 3];
        let current_locations = vec![0, 1, 2];
        let mut ctx = PibtContext::new(&grid, &mut dist_to_path, &trajectories, &goals, &current_locations);
        let mut rng = StdRng::seed_from_u64(3);
        // Highest priority first: agent 0.
        let result = plan_step(&mut ctx, &[0, 1, 2], &mut rng);
        let mut targets = result.clone();
        targets.sort_unstable();
        targets.dedup();
        assert_eq!(targets.len(), 3, "no two agents should collide on a cell: {result:?}");
    }
}
