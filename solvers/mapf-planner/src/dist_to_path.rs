//! C5: per-agent "distance to my guide path + remaining" lookup.
//!
//! Lazy BFS seeded by the agent's trajectory. Mirrors the heuristic cache's
//! incremental-resume shape (spec.md §4.1/§4.4) but reseeds from scratch
//! whenever a new trajectory is installed, tracked with a monotone `label`
//! so stale entries from the previous trajectory are treated as absent
//! without needing to clear the table.

use std::collections::{HashMap, VecDeque};

use mapf_core::Cell;

use crate::grid::Grid;

#[derive(Clone, Copy)]
struct Entry {
    label: u32,
    dist: u32,
    remaining: u32,
}

/// Lazily-expanded "distance to nearest path cell, plus remaining path
/// length from there to the goal" index for a single agent.
#[derive(Clone)]
pub struct DistToPathIndex {
    label: u32,
    table: HashMap<Cell, Entry>,
    open: VecDeque<Cell>,
}

impl Default for DistToPathIndex {
    fn default() -> Self {
        Self { label: 0, table: HashMap::new(), open: VecDeque::new() }
    }
}

impl DistToPathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-seed the index from a freshly-installed trajectory. Every path
    /// cell starts at distance 0, with `remaining` counting backward from
    /// the goal (the trajectory's last cell).
    pub fn install(&mut self, trajectory: &[Cell]) {
        self.label += 1;
        self.open.clear();
        let len = trajectory.len();
        for (i, &cell) in trajectory.iter().enumerate() {
            let remaining = (len - 1 - i) as u32;
            let entry = Entry { label: self.label, dist: 0, remaining };
            self.table.insert(cell, entry);
            self.open.push_back(cell);
        }
    }

    /// `distance_to_nearest_path_cell + remaining_path_from_there_to_goal`,
    /// or `None` if the agent can't reach the path at all (queue exhausted).
    pub fn get(&mut self, grid: &Grid, source: Cell) -> Option<u32> {
        self.get_parts(grid, source).map(|(d, r)| d + r)
    }

    /// Same as [`Self::get`] but returns the `(distance, remaining)` pair,
    /// which PIBT's tie-break needs separately in principle even though the
    /// spec only ever consumes the sum.
    pub fn get_parts(&mut self, grid: &Grid, source: Cell) -> Option<(u32, u32)> {
        if let Some(entry) = self.table.get(&source) {
            if entry.label == self.label {
                return Some((entry.dist, entry.remaining));
            }
        }

        while let Some(curr) = self.open.pop_front() {
            let curr_entry = *self.table.get(&curr)?;
            if curr_entry.label != self.label {
                continue;
            }
            for &(next, _dir) in grid.neighbors(curr) {
                let cand = curr_entry.dist + 1;
                let up_to_date = self
                    .table
                    .get(&next)
                    .filter(|e| e.label == self.label)
                    .map(|e| e.dist);
                if up_to_date.is_some_and(|d| cand >= d) {
                    continue;
                }
                self.table.insert(
                    next,
                    Entry { label: self.label, dist: cand, remaining: curr_entry.remaining },
                );
                self.open.push_back(next);
            }
            if curr == source {
                return Some((curr_entry.dist, curr_entry.remaining));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_grid(rows: u32, cols: u32) -> Grid {
        Grid::from_obstacle_mask(rows, cols, &vec![false; (rows * cols) as usize])
    }

    #[test]
    fn on_path_cell_is_zero_plus_remaining() {
        let grid = open_grid(1, 5);
        let mut idx = DistToPathIndex::new();
        idx.install(&[0, 1, 2, 3, 4]);
        assert_eq!(idx.get(&grid, 0), Some(4));
        assert_eq!(idx.get(&grid, 4), Some(0));
    }

    #[test]
    fn off_path_cell_adds_detour_distance() {
        // 3x1 column path down the left edge of a 3x3 grid; cell 5 is one
        // step east of path cell 4 (row1,col1 is off-path; path is col 0).
        let grid = open_grid(3, 3);
        let mut idx = DistToPathIndex::new();
        idx.install(&[0, 3, 6]); // straight down column 0
        // Cell 4 (row1,col1) is adjacent to path cell 3, which has 1 cell
        // remaining (3 -> 6).
        assert_eq!(idx.get(&grid, 4), Some(1 + 1));
    }

    #[test]
    fn relabeling_discards_stale_entries() {
        let grid = open_grid(1, 5);
        let mut idx = DistToPathIndex::new();
        idx.install(&[0, 1, 2, 3, 4]);
        assert_eq!(idx.get(&grid, 0), Some(4));
        idx.install(&[4, 3, 2, 1, 0]); // reversed trajectory
        assert_eq!(idx.get(&grid, 4), Some(4));
        assert_eq!(idx.get(&grid, 0), Some(0));
    }

    #[test]
    fn unreachable_source_is_none() {
        // Path lives in the left island; source is isolated on the right.
        let grid = Grid::from_obstacle_mask(1, 3, &[false, true, false]);
        let mut idx = DistToPathIndex::new();
        idx.install(&[0]);
        assert_eq!(idx.get(&grid, 2), None);
    }
}
