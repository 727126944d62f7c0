use std::{cell::OnceCell, sync::Arc};

use indexmap::IndexMap;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::debug;

use crate::{
    Direction, EntityId, Position,
    config::SimConfig,
    entity::{Entity, EntityClass},
    map::{Grid, StaticMap, Tile},
    pathfinding::Cost,
};

/// Errors raised while setting up a world.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    #[error("Position {0} is out of bounds.")]
    OutOfBounds(Position),
    #[error("Cannot place {name} inside a wall at {position}.")]
    Wall { name: String, position: Position },
    #[error("Position {position} is already occupied by {occupant}.")]
    Occupied { position: Position, occupant: String },
    #[error("Entity id {0} is already in use.")]
    DuplicateId(EntityId),
}

/// Current state of the warehouse: terrain, entities and simulated time.
///
/// Cloning yields a fully independent world that shares only the immutable
/// terrain. The planner relies on this to simulate actions speculatively.
#[derive(Debug, Clone)]
pub struct World {
    map: Arc<StaticMap>,
    entities: IndexMap<EntityId, Entity>,
    player: Option<EntityId>,
    time: f64,
    next_entity_id: EntityId,
    rng: StdRng,
    config: SimConfig,
    /// Position -> entity lookup, rebuilt on first read after a mutation.
    occupancy: OnceCell<Grid<Option<EntityId>>>,
}

impl World {
    /// Creates a new, empty world with the default configuration.
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_config(width, height, SimConfig::default())
    }

    pub fn with_config(width: usize, height: usize, config: SimConfig) -> Self {
        World {
            map: Arc::new(StaticMap::new(width, height)),
            entities: IndexMap::new(),
            player: None,
            time: 0.0,
            next_entity_id: 0,
            rng: StdRng::seed_from_u64(config.seed),
            config,
            occupancy: OnceCell::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.map.width()
    }

    pub fn height(&self) -> usize {
        self.map.height()
    }

    pub fn map(&self) -> &StaticMap {
        &self.map
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Simulated seconds since the world was created.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Generates a unique entity ID.
    pub fn reserve_entity_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    /// Changes terrain during world setup. Walls cannot be built on top of
    /// entities.
    pub fn set_tile(&mut self, position: Position, tile: Tile) -> Result<(), WorldError> {
        if tile == Tile::Wall {
            if let Some(occupant) = self.entity_at(position) {
                return Err(WorldError::Occupied {
                    position,
                    occupant: occupant.name.clone(),
                });
            }
        }
        Arc::make_mut(&mut self.map)
            .set_tile(position, tile)
            .map_err(|_| WorldError::OutOfBounds(position))
    }

    /// Adds an entity at `position`, or at its own stored position.
    ///
    /// The first player added becomes the designated player.
    pub fn add_agent(
        &mut self,
        mut entity: Entity,
        position: Option<Position>,
    ) -> Result<EntityId, WorldError> {
        let position = position.unwrap_or(entity.position);
        match self.map.tile_at(position) {
            None => return Err(WorldError::OutOfBounds(position)),
            Some(Tile::Wall) => {
                return Err(WorldError::Wall {
                    name: entity.name,
                    position,
                });
            }
            Some(Tile::Empty) => {}
        }
        if let Some(occupant) = self.entity_at(position) {
            return Err(WorldError::Occupied {
                position,
                occupant: occupant.name.clone(),
            });
        }
        if self.entities.contains_key(&entity.id) {
            return Err(WorldError::DuplicateId(entity.id));
        }

        entity.position = position;
        let id = entity.id;
        if entity.is_a(EntityClass::Player) && self.player.is_none() {
            self.player = Some(id);
        }
        self.next_entity_id = self.next_entity_id.max(id + 1);
        self.entities.insert(id, entity);
        self.invalidate();
        Ok(id)
    }

    /// Removes an entity from the grid, handing it back to the caller.
    pub fn remove_agent(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.shift_remove(&id)?;
        if self.player == Some(id) {
            self.player = None;
        }
        self.invalidate();
        Some(entity)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub(crate) fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Entities on the grid, in insertion order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entities_of(&self, class: EntityClass) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(move |e| e.is_a(class))
    }

    pub fn player(&self) -> Option<&Entity> {
        self.player.and_then(|id| self.entities.get(&id))
    }

    pub fn player_id(&self) -> Option<EntityId> {
        self.player
    }

    /// Selects the inventory slot of a player.
    pub fn select_item(&mut self, id: EntityId, slot: usize) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.select_item(slot);
        }
    }

    fn invalidate(&mut self) {
        self.occupancy.take();
    }

    /// The occupancy index, rebuilt if stale.
    pub fn occupancy(&self) -> &Grid<Option<EntityId>> {
        self.occupancy.get_or_init(|| {
            let mut grid: Grid<Option<EntityId>> = Grid::new(self.width(), self.height());
            for entity in self.entities.values() {
                if let Some(cell) = grid.get_mut(entity.position) {
                    debug_assert!(cell.is_none(), "two entities at {}", entity.position);
                    *cell = Some(entity.id);
                }
            }
            grid
        })
    }

    fn occupant_id(&self, position: Position) -> Option<EntityId> {
        self.occupancy().get(position).copied().flatten()
    }

    pub fn entity_at(&self, position: Position) -> Option<&Entity> {
        self.occupant_id(position)
            .and_then(|id| self.entities.get(&id))
    }

    pub fn tile_at(&self, position: Position) -> Option<Tile> {
        self.map.tile_at(position)
    }

    /// In bounds and not a wall.
    pub fn is_static_map_empty(&self, position: Position) -> bool {
        self.map.is_open(position)
    }

    /// In bounds, not a wall and not occupied.
    pub fn is_empty(&self, position: Position) -> bool {
        self.map.is_open(position) && self.occupant_id(position).is_none()
    }

    /// The in-bounds neighbour of `position` in `direction`.
    pub fn neighbour(&self, position: Position, direction: Direction) -> Option<Position> {
        position
            .offset(direction)
            .filter(|next| self.map.contains(*next))
    }

    /// The cell an entity faces when acting in `direction`.
    fn target_cell(&self, id: EntityId, direction: Direction) -> Option<Position> {
        let entity = self.entities.get(&id)?;
        self.neighbour(entity.position, direction)
    }

    /// Samples random cells until an empty one turns up. `None` when the
    /// world has no empty cell at all.
    pub fn get_empty_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Position> {
        let any_empty = (0..self.height())
            .any(|y| (0..self.width()).any(|x| self.is_empty(Position { x, y })));
        if !any_empty {
            return None;
        }
        loop {
            let position = Position {
                x: rng.random_range(0..self.width()),
                y: rng.random_range(0..self.height()),
            };
            if self.is_empty(position) {
                return Some(position);
            }
        }
    }

    /// [`World::get_empty_position`] using the world's own random source.
    pub fn random_empty_position(&mut self) -> Option<Position> {
        let mut rng = self.rng.clone();
        let position = self.get_empty_position(&mut rng);
        self.rng = rng;
        position
    }

    /// An empty cell next to `position`, optionally the one closest to
    /// `close_to`.
    pub fn get_empty_neighbour(
        &self,
        position: Position,
        close_to: Option<Position>,
    ) -> Option<Position> {
        let mut candidates: Vec<Position> =
            [Direction::Left, Direction::Right, Direction::Up, Direction::Down]
                .into_iter()
                .filter_map(|dir| self.neighbour(position, dir))
                .collect();
        if let Some(target) = close_to {
            candidates.sort_by_key(|p| p.manhattan(target));
        }
        candidates.into_iter().find(|p| self.is_empty(*p))
    }

    /// The entity nearest to `position` by manhattan distance among the given
    /// classes (all classes when empty). Ties go to the earlier entity.
    pub fn get_closest_agent(
        &self,
        position: Position,
        classes: &[EntityClass],
        exclude: &[EntityId],
    ) -> Option<&Entity> {
        let mut closest = None;
        let mut closest_dist = self.width() * self.height();
        for entity in self.entities.values() {
            if exclude.contains(&entity.id) {
                continue;
            }
            if !classes.is_empty() && !classes.contains(&entity.class()) {
                continue;
            }
            let dist = position.manhattan(entity.position);
            if dist < closest_dist {
                closest_dist = dist;
                closest = Some(entity);
            }
        }
        closest
    }

    /// Number of entities that would move when pushing from `p1` into `p2`,
    /// counting the final step into free space; 0 if the push is impossible.
    ///
    /// Pushing into an empty cell returns 1, pushing a row of k packages with
    /// space behind returns k + 1.
    pub fn can_push_from_to(&self, p1: Position, p2: Position) -> usize {
        if !self.map.contains(p1) || !self.map.contains(p2) {
            return 0;
        }
        let dx = p2.x as isize - p1.x as isize;
        let dy = p2.y as isize - p1.y as isize;
        let Some(direction) = Direction::from_delta(dx, dy) else {
            return 0;
        };
        let budget = self.width().max(self.height()) + 1;
        self.push_chain_len(p1, p2, direction, budget)
    }

    fn push_chain_len(&self, p1: Position, p2: Position, direction: Direction, budget: usize) -> usize {
        if budget == 0 || !self.map.is_open(p1) || !self.map.is_open(p2) {
            return 0;
        }
        let Some(occupant) = self.entity_at(p2) else {
            return 1;
        };
        if !occupant.pushable {
            return 0;
        }
        let Some(p3) = self.neighbour(p2, direction) else {
            return 0;
        };
        match self.push_chain_len(p2, p3, direction, budget - 1) {
            0 => 0,
            further => 1 + further,
        }
    }

    /// `true` for cells blocked by a wall or by an entity not in `exclude`.
    pub fn get_way_map(&self, exclude: &[EntityId]) -> Grid<bool> {
        let mut way_map = Grid::from_generator(self.width(), self.height(), |pos| {
            !self.map.is_open(pos)
        });
        for entity in self.entities.values() {
            if !exclude.contains(&entity.id) {
                if let Some(cell) = way_map.get_mut(entity.position) {
                    *cell = true;
                }
            }
        }
        way_map
    }

    /// Cells reachable in one move from `position` with their step cost.
    ///
    /// Free cells cost 1. Cells with a pushable chain in front of free space
    /// cost `2 + chain length`. `exclude` (the mover itself) never blocks.
    pub fn adjacent_nodes(&self, position: Position, exclude: Option<EntityId>) -> Vec<(Position, Cost)> {
        let mut nodes = Vec::with_capacity(4);
        for direction in Direction::ALL {
            let Some(next) = self.neighbour(position, direction) else {
                continue;
            };
            if !self.map.is_open(next) {
                continue;
            }
            let mut cost = 1;
            if let Some(occupant) = self.entity_at(next) {
                if Some(occupant.id) != exclude {
                    if !occupant.pushable {
                        continue;
                    }
                    let Some(behind) = next.offset(direction) else {
                        continue;
                    };
                    let chain = self.can_push_from_to(next, behind);
                    if chain == 0 {
                        continue;
                    }
                    cost = 2 + chain as Cost;
                }
            }
            nodes.push((next, cost));
        }
        nodes
    }

    /// Moves an entity one cell, pushing any pushable chain in front of it.
    ///
    /// Either the whole chain moves or nothing does. Moves not caused by a
    /// push turn the mover towards `direction` even if they fail; pushed
    /// movers must themselves be pushable.
    pub fn agent_move(&mut self, id: EntityId, direction: Direction, pushed_by: Option<EntityId>) -> bool {
        let budget = match direction {
            Direction::Left | Direction::Right => self.width(),
            Direction::Up | Direction::Down => self.height(),
        };
        self.move_chain(id, direction, pushed_by, budget)
    }

    fn move_chain(
        &mut self,
        id: EntityId,
        direction: Direction,
        pushed_by: Option<EntityId>,
        budget: usize,
    ) -> bool {
        if budget == 0 {
            return false;
        }
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        match pushed_by {
            None => entity.direction = direction,
            Some(_) if !entity.pushable => return false,
            Some(_) => {}
        }
        let from = entity.position;

        let Some(to) = self.neighbour(from, direction) else {
            return false;
        };
        if !self.map.is_open(to) {
            return false;
        }
        if let Some(occupant) = self.entity_at(to) {
            if !occupant.pushable {
                return false;
            }
            let occupant = occupant.id;
            if !self.move_chain(occupant, direction, Some(id), budget - 1) {
                return false;
            }
        }

        let now = self.time;
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        entity.position = to;
        if pushed_by.is_none() {
            entity.last_move_time = now;
        }
        let class = entity.class();
        self.invalidate();

        if let Some(pusher) = pushed_by {
            class.capabilities().on_pushed(self, id, pusher);
        }
        true
    }

    /// Lets `id` pick from whatever stands in `direction`.
    pub fn agent_pick(&mut self, id: EntityId, direction: Direction) -> bool {
        let Some(picker) = self.entities.get(&id) else {
            return false;
        };
        if picker.is_inventory_full() {
            return false;
        }
        let Some(target) = self.target_cell(id, direction).and_then(|p| self.entity_at(p)) else {
            return false;
        };
        let (target_id, class) = (target.id, target.class());
        let label = (picker.to_string(), target.to_string());

        let picked = class.capabilities().on_picked(self, target_id, id);
        if picked {
            debug!("{} picked {}", label.0, label.1);
        }
        picked
    }

    /// Lets `id` put its inventory item `item` in `direction`: into the entity
    /// there if it accepts, otherwise onto the floor after pushing the entity
    /// out of the way.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not carry `item`.
    pub fn agent_put(&mut self, id: EntityId, direction: Direction, item: EntityId) -> bool {
        let Some(putter) = self.entities.get(&id) else {
            return false;
        };
        let Some(carried) = putter.item_by_id(item) else {
            panic!("{putter} does not carry item {item}");
        };
        let item_class = carried.class();
        let item_label = carried.to_string();
        let putter_class = putter.class();
        let putter_label = putter.to_string();

        let Some(position) = self.target_cell(id, direction) else {
            return false;
        };

        if let Some(target) = self.entity_at(position) {
            let (target_id, target_class) = (target.id, target.class());
            let target_label = target.to_string();
            if target_class.capabilities().on_put(self, target_id, id, item) {
                debug!("{putter_label} put {item_label} into {target_label}");
                putter_class
                    .capabilities()
                    .on_has_put(self, id, item_class, Some(target_id));
                return true;
            }
            if !self.agent_move(target_id, direction, Some(id)) {
                return false;
            }
        }

        if !self.is_empty(position) {
            return false;
        }
        let Some(mut dropped) = self.entities.get_mut(&id).and_then(|p| p.remove_item(item)) else {
            return false;
        };
        dropped.position = position;
        self.next_entity_id = self.next_entity_id.max(dropped.id + 1);
        self.entities.insert(dropped.id, dropped);
        self.invalidate();
        debug!("{putter_label} put {item_label} at {position}");
        putter_class
            .capabilities()
            .on_has_put(self, id, item_class, None);
        true
    }

    /// Moves the grid entity `id` into `picker`'s inventory.
    pub(crate) fn take_into_inventory(&mut self, id: EntityId, picker: EntityId) -> bool {
        if self
            .entities
            .get(&picker)
            .is_none_or(|p| p.is_inventory_full())
        {
            return false;
        }
        let Some(entity) = self.remove_agent(id) else {
            return false;
        };
        match self.entities.get_mut(&picker).map(|p| p.add_item(entity)) {
            Some(Ok(())) => true,
            Some(Err(entity)) => {
                // capacity was checked above, put it back regardless
                let position = entity.position;
                let restored = self.add_agent(entity, Some(position));
                debug_assert!(restored.is_ok(), "lost entity while undoing a pick");
                false
            }
            None => false,
        }
    }

    /// Moves the most recently stowed item of `from` into `to`'s inventory.
    pub(crate) fn hand_over_last(&mut self, from: EntityId, to: EntityId) -> bool {
        if self.entities.get(&to).is_none_or(|e| e.is_inventory_full()) {
            return false;
        }
        let Some(item) = self.entities.get_mut(&from).and_then(Entity::pop_item) else {
            return false;
        };
        match self.entities.get_mut(&to).map(|e| e.add_item(item)) {
            Some(Ok(())) => true,
            Some(Err(item)) => {
                if let Some(source) = self.entities.get_mut(&from) {
                    let restored = source.stow_item(item);
                    debug_assert!(restored.is_ok(), "lost item while undoing a hand-over");
                }
                false
            }
            None => false,
        }
    }

    /// Moves `putter`'s item into the back of `target`'s inventory.
    pub(crate) fn stow_from(&mut self, target: EntityId, putter: EntityId, item: EntityId) -> bool {
        if self.entities.get(&target).is_none_or(|e| e.is_inventory_full()) {
            return false;
        }
        let Some(moved) = self.entities.get_mut(&putter).and_then(|p| p.remove_item(item)) else {
            return false;
        };
        match self.entities.get_mut(&target).map(|e| e.stow_item(moved)) {
            Some(Ok(())) => true,
            Some(Err(moved)) => {
                if let Some(source) = self.entities.get_mut(&putter) {
                    let restored = source.add_item(moved);
                    debug_assert!(restored.is_ok(), "lost item while undoing a stow");
                }
                false
            }
            None => false,
        }
    }

    /// Advances simulated time by `dt` (clamped to the configured maximum),
    /// running every due entity's behaviour once in insertion order.
    pub fn tick(&mut self, dt: f64) {
        let dt = dt.clamp(0.0, self.config.max_time_delta);
        let now = self.time;
        let ids: Vec<EntityId> = self.entities.keys().copied().collect();

        for id in ids {
            let Some(entity) = self.entities.get(&id) else {
                continue;
            };
            if !entity.is_due(now) {
                continue;
            }
            let class = entity.class();
            class.capabilities().process(self, id, dt);
            if let Some(entity) = self.entities.get_mut(&id) {
                entity.last_processed = Some(now);
            }
        }

        self.time += dt;
    }
}
