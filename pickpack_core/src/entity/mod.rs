//! Everything that can stand on the grid or sit in an inventory.
//!
//! Entities are plain data owned by the [`World`]. Per-kind behaviour lives in
//! the [`Capabilities`] implementations of the sub-modules and is looked up
//! through [`EntityClass::capabilities`]. Hooks receive entity ids instead of
//! references so they can freely mutate the world they are called from.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Direction, EntityId, Position, world::World};

mod dispenser;
mod item;
mod package;
mod player;
mod robot;
mod shelf;

pub(crate) use robot::remember_path;

/// Default inventory size of movable agents.
pub const DEFAULT_MAX_ITEMS: usize = 9;
pub const PACKAGE_MAX_ITEMS: usize = 5;
pub const SHELF_MAX_ITEMS: usize = 20;
/// Number of articles a freshly built shelf holds.
pub const SHELF_INITIAL_STOCK: usize = 10;

pub const ROBOT_FPS: f64 = 3.0;
pub const DISPENSER_FPS: f64 = 1.0;

/// Interaction hooks the world invokes on entities.
///
/// Every hook has a do-nothing default; kinds override what they support.
pub trait Capabilities {
    /// `picker` tries to pick from `this`. The picker has at least one free
    /// inventory slot. Returns whether anything changed hands.
    fn on_picked(&self, _world: &mut World, _this: EntityId, _picker: EntityId) -> bool {
        false
    }

    /// `putter` offers its inventory item `item` to `this`. On acceptance the
    /// hook moves the item out of the putter's inventory and returns `true`.
    fn on_put(
        &self,
        _world: &mut World,
        _this: EntityId,
        _putter: EntityId,
        _item: EntityId,
    ) -> bool {
        false
    }

    /// `this` was moved by `pusher`. The pusher may not be in the world.
    fn on_pushed(&self, _world: &mut World, _this: EntityId, _pusher: EntityId) {}

    /// `this` successfully put an item of class `item` into `target`, or onto
    /// the floor when `target` is `None`.
    fn on_has_put(
        &self,
        _world: &mut World,
        _this: EntityId,
        _item: EntityClass,
        _target: Option<EntityId>,
    ) {
    }

    /// Autonomous behaviour. Performs at most one position-changing world
    /// operation per call.
    fn process(&self, _world: &mut World, _this: EntityId, _dt: f64) {}
}

/// The closed set of entity kinds, without their data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityClass {
    Player,
    Robot,
    Package,
    Dispenser,
    Shelf,
    Article,
    PickOrder,
}

impl EntityClass {
    pub const ALL: [EntityClass; 7] = [
        EntityClass::Player,
        EntityClass::Robot,
        EntityClass::Package,
        EntityClass::Dispenser,
        EntityClass::Shelf,
        EntityClass::Article,
        EntityClass::PickOrder,
    ];

    pub fn capabilities(self) -> &'static dyn Capabilities {
        match self {
            EntityClass::Player => &player::PlayerHooks,
            EntityClass::Robot => &robot::RobotHooks,
            EntityClass::Package => &package::PackageHooks,
            EntityClass::Dispenser => &dispenser::DispenserHooks,
            EntityClass::Shelf => &shelf::ShelfHooks,
            EntityClass::Article | EntityClass::PickOrder => &item::ItemHooks,
        }
    }

    /// Articles and pick orders only exist to be carried around.
    pub fn is_item(self) -> bool {
        matches!(self, EntityClass::Article | EntityClass::PickOrder)
    }
}

/// How a robot decides what to do each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RobotMode {
    /// Lookahead planning over candidate actions.
    #[default]
    Planning,
    /// Walks towards the player.
    FollowPlayer,
    /// Keeps its heading and turns randomly.
    Wander,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RobotState {
    pub mode: RobotMode,
    /// Articles this robot has put into packages, less the ones it took
    /// back out.
    pub delivered: u32,
    /// Path of the last movement step, for display.
    pub last_path: Vec<Position>,
}

/// Kind-specific data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Kind {
    Player { selected_item: usize },
    Robot(RobotState),
    Package,
    Dispenser,
    Shelf { shelf_id: String },
    Article { code: String },
    PickOrder { lines: Vec<String> },
}

impl Kind {
    pub fn class(&self) -> EntityClass {
        match self {
            Kind::Player { .. } => EntityClass::Player,
            Kind::Robot(_) => EntityClass::Robot,
            Kind::Package => EntityClass::Package,
            Kind::Dispenser => EntityClass::Dispenser,
            Kind::Shelf { .. } => EntityClass::Shelf,
            Kind::Article { .. } => EntityClass::Article,
            Kind::PickOrder { .. } => EntityClass::PickOrder,
        }
    }
}

/// A placeable, possibly movable thing. Also the type of inventory items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub position: Position,
    pub direction: Direction,
    pub pushable: bool,
    pub max_items: usize,
    /// Calls to `process` per second of simulated time; 0 disables them.
    pub processing_fps: f64,
    pub last_processed: Option<f64>,
    pub last_move_time: f64,
    pub kind: Kind,
    items: Vec<Entity>,
}

impl Entity {
    pub fn new(id: EntityId, name: impl Into<String>, kind: Kind) -> Self {
        Entity {
            id,
            name: name.into(),
            position: Position::default(),
            direction: Direction::Up,
            pushable: true,
            max_items: DEFAULT_MAX_ITEMS,
            processing_fps: 0.0,
            last_processed: None,
            last_move_time: 0.0,
            kind,
            items: Vec::new(),
        }
    }

    pub fn player(id: EntityId) -> Self {
        Entity::new(id, "Player", Kind::Player { selected_item: 0 })
    }

    pub fn robot(id: EntityId, name: impl Into<String>, mode: RobotMode) -> Self {
        let mut robot = Entity::new(
            id,
            name,
            Kind::Robot(RobotState {
                mode,
                ..RobotState::default()
            }),
        );
        robot.processing_fps = ROBOT_FPS;
        robot
    }

    pub fn package(id: EntityId, name: impl Into<String>) -> Self {
        let mut package = Entity::new(id, name, Kind::Package);
        package.max_items = PACKAGE_MAX_ITEMS;
        package
    }

    pub fn dispenser(id: EntityId, name: impl Into<String>) -> Self {
        let mut dispenser = Entity::new(id, name, Kind::Dispenser);
        dispenser.processing_fps = DISPENSER_FPS;
        dispenser
    }

    /// An immovable shelf holding `stock`. Stock beyond the shelf's capacity
    /// is dropped.
    pub fn shelf(id: EntityId, shelf_id: impl Into<String>, stock: Vec<Entity>) -> Self {
        let shelf_id = shelf_id.into();
        let mut shelf = Entity::new(id, format!("shelf-{shelf_id}"), Kind::Shelf { shelf_id });
        shelf.pushable = false;
        shelf.max_items = SHELF_MAX_ITEMS;
        shelf.items = stock;
        shelf.items.truncate(SHELF_MAX_ITEMS);
        shelf
    }

    pub fn article(id: EntityId, code: impl Into<String>) -> Self {
        let code = code.into();
        Entity::new(id, format!("{code}-{id}"), Kind::Article { code })
    }

    pub fn pick_order(id: EntityId, lines: Vec<String>) -> Self {
        Entity::new(id, format!("po-{id}"), Kind::PickOrder { lines })
    }

    pub fn class(&self) -> EntityClass {
        self.kind.class()
    }

    pub fn is_a(&self, class: EntityClass) -> bool {
        self.class() == class
    }

    pub fn items(&self) -> &[Entity] {
        &self.items
    }

    pub fn is_inventory_full(&self) -> bool {
        self.items.len() >= self.max_items
    }

    /// Puts `item` at the front of the inventory. A full inventory hands the
    /// item back unchanged.
    pub fn add_item(&mut self, item: Entity) -> Result<(), Entity> {
        if self.is_inventory_full() {
            return Err(item);
        }
        self.items.insert(0, item);
        Ok(())
    }

    /// Appends `item` at the back of the inventory, the end containers pick
    /// from.
    pub fn stow_item(&mut self, item: Entity) -> Result<(), Entity> {
        if self.is_inventory_full() {
            return Err(item);
        }
        self.items.push(item);
        Ok(())
    }

    /// Removes the item with `item_id`, or returns `None` if it isn't carried.
    pub fn remove_item(&mut self, item_id: EntityId) -> Option<Entity> {
        let index = self.items.iter().position(|item| item.id == item_id)?;
        let item = self.items.remove(index);
        self.clamp_selection();
        Some(item)
    }

    /// Removes the most recently stowed item.
    pub fn pop_item(&mut self) -> Option<Entity> {
        let item = self.items.pop();
        self.clamp_selection();
        item
    }

    pub fn item_by_id(&self, item_id: EntityId) -> Option<&Entity> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn count_items(&self, class: EntityClass) -> usize {
        self.items.iter().filter(|item| item.is_a(class)).count()
    }

    /// The item in the player's selected inventory slot.
    pub fn selected_item(&self) -> Option<&Entity> {
        match self.kind {
            Kind::Player { selected_item } => self.items.get(selected_item),
            _ => None,
        }
    }

    /// Selects a player inventory slot. Slots may point past the end of the
    /// inventory until something is removed.
    pub fn select_item(&mut self, slot: usize) {
        if let Kind::Player { selected_item } = &mut self.kind {
            *selected_item = slot;
        }
    }

    fn clamp_selection(&mut self) {
        let last = self.items.len().saturating_sub(1);
        if let Kind::Player { selected_item } = &mut self.kind {
            *selected_item = (*selected_item).min(last);
        }
    }

    pub fn robot_state(&self) -> Option<&RobotState> {
        match &self.kind {
            Kind::Robot(state) => Some(state),
            _ => None,
        }
    }

    pub fn robot_state_mut(&mut self) -> Option<&mut RobotState> {
        match &mut self.kind {
            Kind::Robot(state) => Some(state),
            _ => None,
        }
    }

    /// Whether `process` is due at simulated time `now`.
    pub fn is_due(&self, now: f64) -> bool {
        if self.processing_fps <= 0.0 {
            return false;
        }
        match self.last_processed {
            None => true,
            Some(last) => (now - last) * self.processing_fps >= 1.0,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::PickOrder { lines } => write!(f, "PickOrder({})", lines.join(", ")),
            kind => write!(f, "{:?}({:?})", kind.class(), self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_item_on_full_inventory_hands_item_back() {
        let mut package = Entity::package(1, "PK0");
        for id in 0..PACKAGE_MAX_ITEMS {
            package.add_item(Entity::article(10 + id, "B0A1")).unwrap();
        }
        let before = package.items().to_vec();

        let rejected = package.add_item(Entity::article(99, "B0A1"));

        assert_eq!(rejected.map_err(|item| item.id), Err(99));
        assert_eq!(package.items(), &before[..]);
        assert!(package.stow_item(Entity::article(98, "B0A1")).is_err());
    }

    #[test]
    fn add_inserts_front_and_stow_appends_back() {
        let mut robot = Entity::robot(1, "R0", RobotMode::Planning);
        robot.add_item(Entity::article(2, "B0A1")).unwrap();
        robot.add_item(Entity::article(3, "B0A2")).unwrap();
        robot.stow_item(Entity::pick_order(4, vec!["A1".into()])).unwrap();

        let ids: Vec<_> = robot.items().iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![3, 2, 4]);
        assert_eq!(robot.pop_item().map(|item| item.id), Some(4));
        assert_eq!(robot.count_items(EntityClass::Article), 2);
    }

    #[test]
    fn remove_missing_item_fails() {
        let mut robot = Entity::robot(1, "R0", RobotMode::Planning);
        robot.add_item(Entity::article(2, "B0A1")).unwrap();
        assert!(robot.remove_item(7).is_none());
        assert_eq!(robot.items().len(), 1);
    }

    #[test]
    fn player_selection_is_clamped_after_removal() {
        let mut player = Entity::player(1);
        for id in 2..5 {
            player.add_item(Entity::article(id, "B0A1")).unwrap();
        }
        player.select_item(2);
        assert_eq!(player.selected_item().map(|item| item.id), Some(2));

        player.remove_item(2).unwrap();
        assert_eq!(player.kind, Kind::Player { selected_item: 1 });

        player.remove_item(3).unwrap();
        player.remove_item(4).unwrap();
        assert_eq!(player.kind, Kind::Player { selected_item: 0 });
        assert!(player.selected_item().is_none());
    }

    #[test]
    fn shelves_are_immovable_and_named_after_their_id() {
        let shelf = Entity::shelf(5, "B3", vec![Entity::article(6, "B0B3")]);
        assert!(!shelf.pushable);
        assert_eq!(shelf.name, "shelf-B3");
        assert_eq!(shelf.max_items, SHELF_MAX_ITEMS);
        assert_eq!(shelf.items()[0].name, "B0B3-6");
        assert_eq!(shelf.to_string(), "Shelf(\"shelf-B3\")");
    }

    #[test]
    fn processing_cadence() {
        let mut robot = Entity::robot(1, "R0", RobotMode::Wander);
        assert!(robot.is_due(0.0));
        robot.last_processed = Some(1.0);
        assert!(!robot.is_due(1.2));
        assert!(robot.is_due(1.5));
        assert!(!Entity::package(2, "PK0").is_due(100.0));
    }
}
