//! Multi-tick commands that drive one entity towards a goal.
//!
//! An action holds its parameters plus a little progress state. Each
//! [`ActionBehavior::execute`] call performs at most one world mutation, so the
//! same action can be stepped on the live world or run to completion on a
//! cloned one.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Direction, EntityId, Position, pathfinding::find_path, world::World};

/// Trait defining the behavior of an action.
pub trait ActionBehavior {
    /// Whether the goal is reached. Has no side effects.
    fn is_finished(&self, world: &World, agent: EntityId) -> bool;

    /// Makes one step of progress. Returns `true` if the action is already
    /// finished or the step succeeded, `false` if it is blocked.
    fn execute(&mut self, world: &mut World, agent: EntityId) -> bool;

    /// Rough number of steps left, for ranking only.
    fn estimated_cost(&self, world: &World, agent: EntityId) -> usize;
}

/// Walk onto `target`, pushing packages where needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveTo {
    pub target: Position,
    path: Option<Vec<Position>>,
}

/// Walk next to `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveBefore {
    pub target: Position,
    path: Option<Vec<Position>>,
}

/// Pick once from the neighbouring cell in `direction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickDirection {
    pub direction: Direction,
    has_picked: bool,
}

/// Put the carried item `item` into the neighbouring cell in `direction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutDirection {
    pub direction: Direction,
    pub item: EntityId,
    has_put: bool,
}

impl MoveTo {
    pub fn new(target: Position) -> Self {
        Self { target, path: None }
    }
}

impl MoveBefore {
    pub fn new(target: Position) -> Self {
        Self { target, path: None }
    }
}

impl PickDirection {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            has_picked: false,
        }
    }
}

impl PutDirection {
    pub fn new(direction: Direction, item: EntityId) -> Self {
        Self {
            direction,
            item,
            has_put: false,
        }
    }
}

fn position_of(world: &World, agent: EntityId) -> Option<Position> {
    world.entity(agent).map(|e| e.position)
}

/// Searches a path to `goal` and takes its first step. The path is kept in
/// `cache` for display.
fn step_towards(
    world: &mut World,
    agent: EntityId,
    goal: Position,
    cache: &mut Option<Vec<Position>>,
) -> bool {
    let Some(start) = position_of(world, agent) else {
        return false;
    };
    let path = find_path(start, goal, |pos| world.adjacent_nodes(pos, Some(agent)));
    let next = path
        .as_ref()
        .and_then(|path| path.get(1).copied())
        .and_then(|next| Direction::towards(start, next));
    *cache = path;
    match next {
        Some(direction) => world.agent_move(agent, direction, None),
        None => false,
    }
}

impl ActionBehavior for MoveTo {
    fn is_finished(&self, world: &World, agent: EntityId) -> bool {
        position_of(world, agent) == Some(self.target)
    }

    fn execute(&mut self, world: &mut World, agent: EntityId) -> bool {
        if self.is_finished(world, agent) {
            return true;
        }
        step_towards(world, agent, self.target, &mut self.path)
    }

    fn estimated_cost(&self, world: &World, agent: EntityId) -> usize {
        position_of(world, agent).map_or(0, |p| p.manhattan(self.target).saturating_sub(1))
    }
}

impl ActionBehavior for MoveBefore {
    fn is_finished(&self, world: &World, agent: EntityId) -> bool {
        position_of(world, agent).is_some_and(|p| p.manhattan(self.target) == 1)
    }

    fn execute(&mut self, world: &mut World, agent: EntityId) -> bool {
        if self.is_finished(world, agent) {
            return true;
        }
        let close_to = position_of(world, agent);
        let Some(goal) = world.get_empty_neighbour(self.target, close_to) else {
            return false;
        };
        step_towards(world, agent, goal, &mut self.path)
    }

    fn estimated_cost(&self, world: &World, agent: EntityId) -> usize {
        position_of(world, agent).map_or(0, |p| p.manhattan(self.target).saturating_sub(1))
    }
}

impl ActionBehavior for PickDirection {
    fn is_finished(&self, _world: &World, _agent: EntityId) -> bool {
        self.has_picked
    }

    fn execute(&mut self, world: &mut World, agent: EntityId) -> bool {
        if !self.has_picked {
            self.has_picked = world.agent_pick(agent, self.direction);
        }
        self.has_picked
    }

    fn estimated_cost(&self, _world: &World, _agent: EntityId) -> usize {
        1
    }
}

impl ActionBehavior for PutDirection {
    fn is_finished(&self, _world: &World, _agent: EntityId) -> bool {
        self.has_put
    }

    fn execute(&mut self, world: &mut World, agent: EntityId) -> bool {
        if self.has_put {
            return true;
        }
        // resolved now: the item may have left the inventory since creation
        let carried = world
            .entity(agent)
            .is_some_and(|e| e.item_by_id(self.item).is_some());
        if !carried {
            return false;
        }
        self.has_put = world.agent_put(agent, self.direction, self.item);
        self.has_put
    }

    fn estimated_cost(&self, _world: &World, _agent: EntityId) -> usize {
        1
    }
}

/// The actions an autonomous entity can choose from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    MoveTo(MoveTo),
    MoveBefore(MoveBefore),
    PickDirection(PickDirection),
    PutDirection(PutDirection),
}

impl Action {
    pub fn move_to(target: Position) -> Self {
        Action::MoveTo(MoveTo::new(target))
    }

    pub fn move_before(target: Position) -> Self {
        Action::MoveBefore(MoveBefore::new(target))
    }

    pub fn pick(direction: Direction) -> Self {
        Action::PickDirection(PickDirection::new(direction))
    }

    pub fn put(direction: Direction, item: EntityId) -> Self {
        Action::PutDirection(PutDirection::new(direction, item))
    }

    /// Same parameters, no progress.
    pub fn fresh(&self) -> Self {
        match self {
            Action::MoveTo(a) => Action::move_to(a.target),
            Action::MoveBefore(a) => Action::move_before(a.target),
            Action::PickDirection(a) => Action::pick(a.direction),
            Action::PutDirection(a) => Action::put(a.direction, a.item),
        }
    }

    /// The path found by the last movement step, if any.
    pub fn path(&self) -> Option<&[Position]> {
        match self {
            Action::MoveTo(a) => a.path.as_deref(),
            Action::MoveBefore(a) => a.path.as_deref(),
            Action::PickDirection(_) | Action::PutDirection(_) => None,
        }
    }
}

impl ActionBehavior for Action {
    fn is_finished(&self, world: &World, agent: EntityId) -> bool {
        match self {
            Action::MoveTo(a) => a.is_finished(world, agent),
            Action::MoveBefore(a) => a.is_finished(world, agent),
            Action::PickDirection(a) => a.is_finished(world, agent),
            Action::PutDirection(a) => a.is_finished(world, agent),
        }
    }

    fn execute(&mut self, world: &mut World, agent: EntityId) -> bool {
        match self {
            Action::MoveTo(a) => a.execute(world, agent),
            Action::MoveBefore(a) => a.execute(world, agent),
            Action::PickDirection(a) => a.execute(world, agent),
            Action::PutDirection(a) => a.execute(world, agent),
        }
    }

    fn estimated_cost(&self, world: &World, agent: EntityId) -> usize {
        match self {
            Action::MoveTo(a) => a.estimated_cost(world, agent),
            Action::MoveBefore(a) => a.estimated_cost(world, agent),
            Action::PickDirection(a) => a.estimated_cost(world, agent),
            Action::PutDirection(a) => a.estimated_cost(world, agent),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::MoveTo(a) => write!(f, "MoveTo({})", a.target),
            Action::MoveBefore(a) => write!(f, "MoveBefore({})", a.target),
            Action::PickDirection(a) => write!(f, "PickDirection({:?})", a.direction),
            Action::PutDirection(a) => write!(f, "PutDirection({:?}, {})", a.direction, a.item),
        }
    }
}
