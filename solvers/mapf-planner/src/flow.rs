//! C3: per-cell directional edge-usage counters.

use mapf_core::Cell;

use crate::grid::{Direction, Grid};

/// The four directional counters for a single cell, tallying trajectories
/// whose edge enters the cell by moving in that direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionCounts {
    pub east: u32,
    pub south: u32,
    pub west: u32,
    pub north: u32,
}

impl DirectionCounts {
    pub fn get(&self, dir: Direction) -> u32 {
        match dir {
            Direction::East => self.east,
            Direction::South => self.south,
            Direction::West => self.west,
            Direction::North => self.north,
        }
    }

    fn get_mut(&mut self, dir: Direction) -> &mut u32 {
        match dir {
            Direction::East => &mut self.east,
            Direction::South => &mut self.south,
            Direction::West => &mut self.west,
            Direction::North => &mut self.north,
        }
    }

    pub fn total(&self) -> u32 {
        self.east + self.south + self.west + self.north
    }

    /// Sum of all counters except `dir`.
    pub fn sum_except(&self, dir: Direction) -> u32 {
        self.total() - self.get(dir)
    }
}

/// Process-wide per-cell flow counters, incremented on trajectory install
/// and decremented on removal. Must always balance: the sum of a cell's
/// counters equals the number of currently-installed trajectories whose
/// edge enters it.
pub struct FlowCounters {
    counts: Vec<DirectionCounts>,
}

impl FlowCounters {
    pub fn new(size: usize) -> Self {
        Self { counts: vec![DirectionCounts::default(); size] }
    }

    pub fn get(&self, cell: Cell) -> DirectionCounts {
        self.counts[cell as usize]
    }

    /// Add every edge of `trajectory` to the flow field.
    pub fn add(&mut self, grid: &Grid, trajectory: &[Cell]) {
        for pair in trajectory.windows(2) {
            let (u, v) = (pair[0], pair[1]);
            if let Some(dir) = grid.direction_between(u, v) {
                *self.counts[v as usize].get_mut(dir) += 1;
            }
        }
    }

    /// Remove every edge of `trajectory` from the flow field.
    pub fn remove(&mut self, grid: &Grid, trajectory: &[Cell]) {
        for pair in trajectory.windows(2) {
            let (u, v) = (pair[0], pair[1]);
            if let Some(dir) = grid.direction_between(u, v) {
                let slot = self.counts[v as usize].get_mut(dir);
                debug_assert!(*slot > 0, "flow underflow removing trajectory edge into {v}");
                *slot = slot.saturating_sub(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_grid(rows: u32, cols: u32) -> Grid {
        Grid::from_obstacle_mask(rows, cols, &vec![false; (rows * cols) as usize])
    }

    #[test]
    fn add_then_remove_balances_to_zero() {
        let grid = open_grid(1, 5);
        let mut flow = FlowCounters::new(grid.size());
        let traj = vec![0, 1, 2, 3, 4];
        flow.add(&grid, &traj);
        assert_eq!(flow.get(4).total(), 1);
        flow.remove(&grid, &traj);
        assert_eq!(flow.get(4).total(), 0);
        assert_eq!(flow.get(2).total(), 0);
    }

    #[test]
    fn multiple_trajectories_sum_correctly() {
        let grid = open_grid(3, 3);
        let mut flow = FlowCounters::new(grid.size());
        flow.add(&grid, &[0, 1, 4]); // 1 -> 4 travels south into cell 4
        flow.add(&grid, &[7, 4]); // 7 -> 4 travels north into cell 4
        let counts = flow.get(4);
        assert_eq!(counts.total(), 2);
        assert_eq!(counts.south, 1);
        assert_eq!(counts.north, 1);
    }
}
