use super::Capabilities;
use crate::{EntityId, world::World};

/// Articles and pick orders lying on the floor are picked up whole.
pub(crate) struct ItemHooks;

impl Capabilities for ItemHooks {
    fn on_picked(&self, world: &mut World, this: EntityId, picker: EntityId) -> bool {
        world.take_into_inventory(this, picker)
    }
}
