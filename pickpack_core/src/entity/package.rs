use super::{Capabilities, EntityClass, robot::take_back_delivery};
use crate::{EntityId, world::World};

/// Pushable container. Picking hands out the last stowed item; an empty
/// package is picked up itself.
pub(crate) struct PackageHooks;

impl Capabilities for PackageHooks {
    fn on_picked(&self, world: &mut World, this: EntityId, picker: EntityId) -> bool {
        let is_empty = world.entity(this).is_some_and(|e| e.items().is_empty());
        if is_empty {
            world.take_into_inventory(this, picker)
        } else {
            let article_on_top = world
                .entity(this)
                .and_then(|e| e.items().last())
                .is_some_and(|item| item.is_a(EntityClass::Article));
            let handed_over = world.hand_over_last(this, picker);
            if handed_over && article_on_top {
                take_back_delivery(world, picker);
            }
            handed_over
        }
    }

    fn on_put(&self, world: &mut World, this: EntityId, putter: EntityId, item: EntityId) -> bool {
        world.stow_from(this, putter, item)
    }
}
