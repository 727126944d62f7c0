use super::Capabilities;
use crate::{EntityId, world::World};

/// Immovable stock of articles.
pub(crate) struct ShelfHooks;

impl Capabilities for ShelfHooks {
    fn on_picked(&self, world: &mut World, this: EntityId, picker: EntityId) -> bool {
        world.hand_over_last(this, picker)
    }

    fn on_put(&self, world: &mut World, this: EntityId, putter: EntityId, item: EntityId) -> bool {
        world.stow_from(this, putter, item)
    }
}
