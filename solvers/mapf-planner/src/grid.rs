//! C1: immutable adjacency of passable cells.

use mapf_core::{Cell, Orientation};

/// Direction of travel between two cardinally-adjacent cells, used both for
/// neighbor iteration and as the index into [`crate::flow::FlowCounts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    East = 0,
    South = 1,
    West = 2,
    North = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::East,
        Direction::South,
        Direction::West,
        Direction::North,
    ];

    pub fn opposite(self) -> Direction {
        match self {
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::North => Direction::South,
        }
    }

    pub fn clockwise(self) -> Direction {
        match self {
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
            Direction::North => Direction::East,
        }
    }

    pub fn counter_clockwise(self) -> Direction {
        match self {
            Direction::East => Direction::North,
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
        }
    }

    /// Orientation and direction share the same east/south/west/north
    /// numbering by convention; this is just the type-level bridge.
    pub fn from_orientation(o: Orientation) -> Direction {
        match o {
            Orientation::East => Direction::East,
            Orientation::South => Direction::South,
            Orientation::West => Direction::West,
            Orientation::North => Direction::North,
        }
    }
}

/// A rectangular grid of passable/obstacle cells with precomputed
/// 4-connected adjacency. Built once at `initialize` and never mutated.
#[derive(Debug, Clone)]
pub struct Grid {
    rows: u32,
    cols: u32,
    passable: Vec<bool>,
    /// Neighbor list per cell, paired with the direction of travel to reach
    /// it. Passable cells only; obstacles have an empty neighbor list.
    neighbors: Vec<Vec<(Cell, Direction)>>,
}

impl Grid {
    /// Build a grid from an obstacle mask in `row * cols + col` order,
    /// where `true` marks an obstacle.
    pub fn from_obstacle_mask(rows: u32, cols: u32, obstacle_mask: &[bool]) -> Self {
        assert_eq!(
            obstacle_mask.len(),
            (rows as usize) * (cols as usize),
            "obstacle_mask length must equal rows*cols"
        );
        let passable: Vec<bool> = obstacle_mask.iter().map(|&o| !o).collect();
        let size = passable.len();
        let mut neighbors = vec![Vec::new(); size];

        for row in 0..rows {
            for col in 0..cols {
                let loc = (row * cols + col) as usize;
                if !passable[loc] {
                    continue;
                }
                let mut edges = Vec::with_capacity(4);
                if row > 0 {
                    let n = loc - cols as usize;
                    if passable[n] {
                        edges.push((n as Cell, Direction::North));
                    }
                }
                if row + 1 < rows {
                    let n = loc + cols as usize;
                    if passable[n] {
                        edges.push((n as Cell, Direction::South));
                    }
                }
                if col > 0 {
                    let n = loc - 1;
                    if passable[n] {
                        edges.push((n as Cell, Direction::West));
                    }
                }
                if col + 1 < cols {
                    let n = loc + 1;
                    if passable[n] {
                        edges.push((n as Cell, Direction::East));
                    }
                }
                neighbors[loc] = edges;
            }
        }

        Self { rows, cols, passable, neighbors }
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn size(&self) -> usize {
        self.passable.len()
    }

    pub fn is_passable(&self, cell: Cell) -> bool {
        self.passable.get(cell as usize).copied().unwrap_or(false)
    }

    /// Neighbors of `cell`, each tagged with the direction of travel to
    /// reach it from `cell`. Empty for obstacles or out-of-bounds cells.
    pub fn neighbors(&self, cell: Cell) -> &[(Cell, Direction)] {
        self.neighbors
            .get(cell as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Direction of travel from `to`'s perspective, i.e. "direction d such
    /// that moving d from `from` reaches `to`". `None` if not adjacent.
    pub fn direction_between(&self, from: Cell, to: Cell) -> Option<Direction> {
        self.neighbors(from).iter().find(|(c, _)| *c == to).map(|(_, d)| *d)
    }

    /// Manhattan distance between two cells, used as a fallback heuristic
    /// before a goal's incremental BFS table has any entries and as the
    /// debug/degraded mode noted in spec.md §4.1.
    pub fn manhattan(&self, a: Cell, b: Cell) -> u32 {
        let (ar, ac) = self.row_col(a);
        let (br, bc) = self.row_col(b);
        ar.abs_diff(br) + ac.abs_diff(bc)
    }

    fn row_col(&self, cell: Cell) -> (u32, u32) {
        (cell / self.cols, cell % self.cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_grid(rows: u32, cols: u32) -> Grid {
        Grid::from_obstacle_mask(rows, cols, &vec![false; (rows * cols) as usize])
    }

    #[test]
    fn open_3x3_center_has_four_neighbors() {
        let grid = open_grid(3, 3);
        assert_eq!(grid.neighbors(4).len(), 4);
        assert_eq!(grid.neighbors(0).len(), 2);
    }

    #[test]
    fn obstacle_has_no_neighbors_and_is_not_passable() {
        let mut mask = vec![false; 9];
        mask[4] = true;
        let grid = Grid::from_obstacle_mask(3, 3, &mask);
        assert!(!grid.is_passable(4));
        assert!(grid.neighbors(4).is_empty());
        // Neighbors of (1,0)=loc 3 should not include blocked center.
        assert!(!grid.neighbors(3).iter().any(|(c, _)| *c == 4));
    }

    #[test]
    fn direction_between_matches_move() {
        let grid = open_grid(3, 3);
        // loc 4 is center; loc 1 is north of it.
        assert_eq!(grid.direction_between(4, 1), Some(Direction::North));
        assert_eq!(grid.direction_between(4, 5), Some(Direction::East));
    }

    #[test]
    fn manhattan_matches_straight_line() {
        let grid = open_grid(1, 5);
        assert_eq!(grid.manhattan(0, 4), 4);
    }
}
