//! C4: single-agent A* under a congestion-weighted edge cost.
//!
//! Re-architected per spec.md §9's hint: nodes live in a flat arena
//! (`Vec<SearchNode>`) addressed by `u32` index instead of owning pointers,
//! and the arena is a pool reset on every build rather than freed and
//! reallocated.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use mapf_core::Cell;

use crate::flow::FlowCounters;
use crate::grid::Grid;
use crate::heuristic::HeuristicCache;

#[derive(Clone, Copy)]
struct SearchNode {
    cell: Cell,
    g: u32,
    depth: u32,
    parent: Option<u32>,
}

/// The terminal node of an agent's most recent A* search: enough to
/// reconstruct the trajectory and to report its cost under current flow.
#[derive(Clone, Copy, Debug)]
pub struct GoalNode {
    pub g: u32,
    pub f: u32,
    pub depth: u32,
}

struct OpenEntry {
    f: u32,
    g: u32,
    idx: u32,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.g == other.g
    }
}
impl Eq for OpenEntry {}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; we want the smallest f popped first,
        // breaking ties toward the larger g (deeper nodes explored first,
        // per spec.md §4.3).
        other.f.cmp(&self.f).then_with(|| self.g.cmp(&other.g))
    }
}
impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Result of a single guide-path build.
pub enum BuildResult {
    Found { trajectory: Vec<Cell>, goal_node: GoalNode },
    Unreachable,
}

/// Builds congestion-weighted shortest paths. Owns a reusable node arena so
/// repeated builds (one per LNS reroute) don't reallocate.
pub struct GuidePathBuilder {
    nodes: Vec<SearchNode>,
    best_g: Vec<u32>,
    best_gen: Vec<u32>,
    gen: u32,
}

impl GuidePathBuilder {
    pub fn new(grid_size: usize) -> Self {
        Self {
            nodes: Vec::new(),
            best_g: vec![u32::MAX; grid_size],
            best_gen: vec![0; grid_size],
            gen: 0,
        }
    }

    fn best_g(&self, cell: Cell) -> u32 {
        if self.best_gen[cell as usize] == self.gen {
            self.best_g[cell as usize]
        } else {
            u32::MAX
        }
    }

    fn set_best_g(&mut self, cell: Cell, g: u32) {
        self.best_g[cell as usize] = g;
        self.best_gen[cell as usize] = self.gen;
    }

    /// Build a congestion-weighted shortest path from `start` to `goal`.
    pub fn build(
        &mut self,
        grid: &Grid,
        flow: &FlowCounters,
        heuristics: &mut HeuristicCache,
        start: Cell,
        goal: Cell,
        alpha: f64,
        beta: f64,
    ) -> BuildResult {
        self.nodes.clear();
        self.gen += 1;
        let mut open: BinaryHeap<OpenEntry> = BinaryHeap::new();

        let Some(h_start) = heuristics.query(grid, start, goal) else {
            return BuildResult::Unreachable;
        };

        let root_idx = self.nodes.len() as u32;
        self.nodes.push(SearchNode { cell: start, g: 0, depth: 0, parent: None });
        self.set_best_g(start, 0);
        open.push(OpenEntry { f: h_start, g: 0, idx: root_idx });

        while let Some(entry) = open.pop() {
            let node = self.nodes[entry.idx as usize];
            if node.g > self.best_g(node.cell) {
                continue; // stale open entry, superseded by a cheaper path
            }
            if node.cell == goal {
                let goal_node = GoalNode { g: node.g, f: entry.f, depth: node.depth };
                return BuildResult::Found {
                    trajectory: self.reconstruct(entry.idx),
                    goal_node,
                };
            }

            for &(next, dir) in grid.neighbors(node.cell) {
                let counts = flow.get(next);
                let opposing = counts.get(dir.opposite()) as f64;
                let cross = counts.sum_except(dir.opposite()) as f64;
                let edge_cost = 1.0 + alpha * opposing + beta * cross;
                let next_g = node.g + edge_cost.round() as u32;

                if next_g >= self.best_g(next) {
                    continue;
                }
                self.set_best_g(next, next_g);
                let Some(h) = heuristics.query(grid, next, goal) else {
                    continue; // neighbor can't reach goal either; skip
                };
                let idx = self.nodes.len() as u32;
                self.nodes.push(SearchNode {
                    cell: next,
                    g: next_g,
                    depth: node.depth + 1,
                    parent: Some(entry.idx),
                });
                open.push(OpenEntry { f: next_g + h, g: next_g, idx });
            }
        }

        BuildResult::Unreachable
    }

    fn reconstruct(&self, mut idx: u32) -> Vec<Cell> {
        let mut path = Vec::new();
        loop {
            let node = self.nodes[idx as usize];
            path.push(node.cell);
            match node.parent {
                Some(p) => idx = p,
                None => break,
            }
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_grid(rows: u32, cols: u32) -> Grid {
        Grid::from_obstacle_mask(rows, cols, &vec![false; (rows * cols) as usize])
    }

    #[test]
    fn zero_flow_reproduces_shortest_path() {
        let grid = open_grid(1, 5);
        let flow = FlowCounters::new(grid.size());
        let mut heuristics = HeuristicCache::new();
        let mut builder = GuidePathBuilder::new(grid.size());
        match builder.build(&grid, &flow, &mut heuristics, 0, 4, 4.0, 1.0) {
            BuildResult::Found { trajectory, goal_node } => {
                assert_eq!(trajectory, vec![0, 1, 2, 3, 4]);
                assert_eq!(goal_node.g, 4);
            }
            BuildResult::Unreachable => panic!("expected a path"),
        }
    }

    #[test]
    fn unreachable_goal_is_reported() {
        let grid = Grid::from_obstacle_mask(1, 3, &[false, true, false]);
        let flow = FlowCounters::new(grid.size());
        let mut heuristics = HeuristicCache::new();
        let mut builder = GuidePathBuilder::new(grid.size());
        assert!(matches!(
            builder.build(&grid, &flow, &mut heuristics, 0, 2, 4.0, 1.0),
            BuildResult::Unreachable
        ));
    }

    #[test]
    fn congestion_detours_around_opposing_flow() {
        // 3x3 grid; load up heavy opposing flow entering cell 1 from the
        // east (i.e. westbound traffic), which should make the direct
        // westbound route into cell 1 expensive relative to detouring.
        let grid = open_grid(3, 3);
        let mut flow = FlowCounters::new(grid.size());
        for _ in 0..20 {
            flow.add(&grid, &[2, 1]); // westbound into cell 1
        }
        let mut heuristics = HeuristicCache::new();
        let mut builder = GuidePathBuilder::new(grid.size());
        // Direct path 0->1->2 enters cell 1 eastbound, which is *opposite*
        // the loaded westbound flow, so it should be penalized heavily.
        let direct_cost = match builder.build(&grid, &flow, &mut heuristics, 0, 2, 4.0, 1.0) {
            BuildResult::Found { goal_node, .. } => goal_node.g,
            BuildResult::Unreachable => panic!("expected a path"),
        };
        assert!(direct_cost > 2, "congested direct path should cost more than unit-cost 2");
    }
}
