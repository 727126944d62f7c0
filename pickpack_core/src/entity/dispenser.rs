use rand::Rng;
use tracing::debug;

use super::{Capabilities, Entity, EntityClass, Kind};
use crate::{Direction, EntityId, world::World};

/// Side of the dispenser things come out of.
const OUTPUT_SIDE: Direction = Direction::Down;

/// The order computer. Hands out pick orders on request and now and then
/// pushes out a pick order or an empty package by itself.
pub(crate) struct DispenserHooks;

impl Capabilities for DispenserHooks {
    fn on_picked(&self, world: &mut World, _this: EntityId, picker: EntityId) -> bool {
        let Some(order) = create_pick_order(world) else {
            return false;
        };
        match world.entity_mut(picker).map(|p| p.add_item(order)) {
            Some(Ok(())) => true,
            _ => false,
        }
    }

    fn process(&self, world: &mut World, this: EntityId, _dt: f64) {
        let chances = world.config().dispenser.clone();
        if world.rng_mut().random_range(0..chances.pick_order_chance) == 0 {
            if let Some(order) = create_pick_order(world) {
                emit(world, this, order);
            }
        } else if world.rng_mut().random_range(0..chances.package_chance) == 0 {
            let id = world.reserve_entity_id();
            emit(world, this, Entity::package(id, format!("PK{id}")));
        }
    }
}

/// A pick order for one to three random shelves, or `None` without shelves.
fn create_pick_order(world: &mut World) -> Option<Entity> {
    let shelves: Vec<String> = world
        .entities_of(EntityClass::Shelf)
        .filter_map(|shelf| match &shelf.kind {
            Kind::Shelf { shelf_id } => Some(shelf_id.clone()),
            _ => None,
        })
        .collect();
    if shelves.is_empty() {
        return None;
    }
    let rng = world.rng_mut();
    let count = rng.random_range(1..=3);
    let lines = (0..count)
        .map(|_| shelves[rng.random_range(0..shelves.len())].clone())
        .collect();
    let id = world.reserve_entity_id();
    Some(Entity::pick_order(id, lines))
}

/// Places `entity` on the output side, pushing an occupant away first. Gives
/// up silently if the cell stays blocked.
fn emit(world: &mut World, this: EntityId, entity: Entity) {
    let Some(source) = world.entity(this).map(|e| e.position) else {
        return;
    };
    let Some(target) = world.neighbour(source, OUTPUT_SIDE) else {
        return;
    };
    if !world.is_static_map_empty(target) {
        return;
    }
    if let Some(occupant) = world.entity_at(target).map(|e| e.id) {
        world.agent_move(occupant, OUTPUT_SIDE, Some(this));
    }
    if world.is_empty(target) {
        let label = entity.to_string();
        if world.add_agent(entity, Some(target)).is_ok() {
            debug!("dispenser {this} emitted {label} at {target}");
        }
    }
}
