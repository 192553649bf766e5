//! Shared primitives for grid-based multi-agent pathfinding.

/// A cell location, flattened as `row * cols + col`.
pub type Cell = u32;

/// Facing direction of an agent. Numeric values match the convention used
/// by the action model: 0 east, 1 south, 2 west, 3 north.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    East = 0,
    South = 1,
    West = 2,
    North = 3,
}

impl Orientation {
    /// All four orientations, in their numeric order.
    pub const ALL: [Orientation; 4] = [
        Orientation::East,
        Orientation::South,
        Orientation::West,
        Orientation::North,
    ];

    /// Rotate 90 degrees clockwise (east -> south -> west -> north -> east).
    pub fn clockwise(self) -> Orientation {
        Orientation::from_index((self as u8 + 1) % 4)
    }

    /// Rotate 90 degrees counter-clockwise.
    pub fn counter_clockwise(self) -> Orientation {
        Orientation::from_index((self as u8 + 3) % 4)
    }

    /// The opposite orientation (180 degrees).
    pub fn opposite(self) -> Orientation {
        Orientation::from_index((self as u8 + 2) % 4)
    }

    pub fn from_index(idx: u8) -> Orientation {
        match idx % 4 {
            0 => Orientation::East,
            1 => Orientation::South,
            2 => Orientation::West,
            _ => Orientation::North,
        }
    }

    /// Row/column delta for moving one cell in this direction.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Orientation::East => (0, 1),
            Orientation::South => (1, 0),
            Orientation::West => (0, -1),
            Orientation::North => (-1, 0),
        }
    }
}

/// One action an agent can take in a single planning timestep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Forward,
    ClockwiseRotate,
    CounterClockwiseRotate,
    Wait,
}

/// An agent's pose at the start (or end) of a timestep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentState {
    pub location: Cell,
    pub orientation: Orientation,
}

impl AgentState {
    pub fn new(location: Cell, orientation: Orientation) -> Self {
        Self { location, orientation }
    }
}
