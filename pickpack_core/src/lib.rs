use serde::{Deserialize, Serialize};

pub mod action;
pub mod config;
pub mod entity;
pub mod level;
pub mod map;
pub mod pathfinding;
pub mod planner;
pub mod world;

pub use action::{Action, ActionBehavior};
pub use config::{ConfigError, DispenserConfig, PlannerConfig, SimConfig};
pub use entity::{Entity, EntityClass, Kind, RobotMode};
pub use level::{LevelError, parse_level, random_world};
pub use map::{Grid, StaticMap, Tile};
pub use planner::{Planner, ScoredAction};
pub use world::{World, WorldError};

/// Unique identifier for entities (agents, items, etc.).
///
/// Allocated by the owning [`World`], so ids are only unique within one world
/// and the simulations cloned from it.
pub type EntityId = usize;

/// Represents a 2D coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Returns manhattan distance between two positions
    pub fn manhattan(self, other: Position) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// The neighbouring cell in `direction`, or `None` when it would leave the
    /// non-negative quadrant. Upper bounds are the caller's business.
    pub fn offset(self, direction: Direction) -> Option<Position> {
        let (dx, dy) = direction.delta();
        Some(Position {
            x: self.x.checked_add_signed(dx)?,
            y: self.y.checked_add_signed(dy)?,
        })
    }
}

impl From<(usize, usize)> for Position {
    fn from((x, y): (usize, usize)) -> Self {
        Position { x, y }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One of the four axis-aligned unit steps. Diagonals cannot be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Up,
        Direction::Right,
        Direction::Down,
    ];

    pub const fn delta(self) -> (isize, isize) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// Converts a unit vector into a direction. Zero and diagonal vectors
    /// yield `None`.
    pub fn from_delta(dx: isize, dy: isize) -> Option<Direction> {
        match (dx, dy) {
            (0, -1) => Some(Direction::Up),
            (0, 1) => Some(Direction::Down),
            (-1, 0) => Some(Direction::Left),
            (1, 0) => Some(Direction::Right),
            _ => None,
        }
    }

    /// Integer heading from `from` towards `to`. The x axis wins when both
    /// differ; `None` when the positions are equal.
    pub fn towards(from: Position, to: Position) -> Option<Direction> {
        if to.x > from.x {
            Some(Direction::Right)
        } else if to.x < from.x {
            Some(Direction::Left)
        } else if to.y > from.y {
            Some(Direction::Down)
        } else if to.y < from.y {
            Some(Direction::Up)
        } else {
            None
        }
    }
}
