use rand::Rng;

use super::{Capabilities, EntityClass, RobotMode};
use crate::{
    Direction, EntityId, Position,
    action::{Action, ActionBehavior},
    planner::Planner,
    world::World,
};

/// One in this many wander steps changes heading without being blocked.
const WANDER_TURN_CHANCE: u32 = 10;

pub(crate) struct RobotHooks;

impl Capabilities for RobotHooks {
    fn on_has_put(
        &self,
        world: &mut World,
        this: EntityId,
        item: EntityClass,
        target: Option<EntityId>,
    ) {
        if item != EntityClass::Article {
            return;
        }
        let into_package = target
            .and_then(|t| world.entity(t))
            .is_some_and(|t| t.is_a(EntityClass::Package));
        if !into_package {
            return;
        }
        if let Some(state) = world.entity_mut(this).and_then(|e| e.robot_state_mut()) {
            state.delivered += 1;
        }
    }

    fn process(&self, world: &mut World, this: EntityId, _dt: f64) {
        let Some(mode) = world
            .entity(this)
            .and_then(|e| e.robot_state())
            .map(|s| s.mode)
        else {
            return;
        };
        match mode {
            RobotMode::Planning => {
                Planner::new(world.config().planner.clone()).step(world, this);
            }
            RobotMode::FollowPlayer => follow_player(world, this),
            RobotMode::Wander => wander(world, this),
        }
    }
}

fn follow_player(world: &mut World, this: EntityId) {
    let Some(player) = world.player().map(|p| p.position) else {
        return;
    };
    let mut action = Action::move_before(player);
    action.execute(world, this);
    remember_path(world, this, action.path());
}

fn wander(world: &mut World, this: EntityId) {
    let Some(mut heading) = world.entity(this).map(|e| e.direction) else {
        return;
    };
    if world.rng_mut().random_range(0..WANDER_TURN_CHANCE) == 0 {
        heading = random_direction(world);
    }
    if !world.agent_move(this, heading, None) {
        let turn = random_direction(world);
        if let Some(entity) = world.entity_mut(this) {
            entity.direction = turn;
        }
    }
}

fn random_direction(world: &mut World) -> Direction {
    Direction::ALL[world.rng_mut().random_range(0..Direction::ALL.len())]
}

/// Cancels one delivery when `robot` takes an article back out of a package.
pub(super) fn take_back_delivery(world: &mut World, robot: EntityId) {
    if let Some(state) = world.entity_mut(robot).and_then(|e| e.robot_state_mut()) {
        state.delivered = state.delivered.saturating_sub(1);
    }
}

/// Stores the path of the last movement step for display.
pub(crate) fn remember_path(world: &mut World, this: EntityId, path: Option<&[Position]>) {
    if let Some(state) = world.entity_mut(this).and_then(|e| e.robot_state_mut()) {
        state.last_path = path.map(<[Position]>::to_vec).unwrap_or_default();
    }
}
