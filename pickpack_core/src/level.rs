//! Building worlds from text maps or at random.
//!
//! A map has one character per cell:
//!
//! | symbol | meaning                     |
//! |--------|-----------------------------|
//! | ` `    | empty floor                 |
//! | `W`    | wall                        |
//! | `P`    | the player (exactly one)    |
//! | `R`    | planning robot              |
//! | `C`    | dispenser                   |
//! | `S`    | shelf                       |

use rand::Rng;
use tracing::debug;

use crate::{
    Position,
    config::SimConfig,
    entity::{Entity, RobotMode, SHELF_INITIAL_STOCK},
    map::Tile,
    world::{World, WorldError},
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LevelError {
    #[error("Map string is empty.")]
    Empty,
    #[error("Unknown map symbol {symbol:?} at {position}.")]
    UnknownSymbol { symbol: char, position: Position },
    #[error("Map has no player ('P').")]
    MissingPlayer,
    #[error("Multiple players ('P') found, second at {0}.")]
    MultiplePlayers(Position),
    #[error("A world must be at least 3x3 cells, got {width}x{height}.")]
    TooSmall { width: usize, height: usize },
    #[error(transparent)]
    World(#[from] WorldError),
}

/// Shelf labels in placement order: `A1`..`A9`, `B1`..`B9` and so on.
pub fn shelf_label(index: usize) -> String {
    let row = char::from(b'A' + (index / 9 % 26) as u8);
    let column = char::from(b'1' + (index % 9) as u8);
    format!("{row}{column}")
}

/// A shelf stocked with its initial articles.
pub fn stocked_shelf(world: &mut World, shelf_id: &str) -> Entity {
    let code = format!("B0{shelf_id}");
    let stock = (0..SHELF_INITIAL_STOCK)
        .map(|_| Entity::article(world.reserve_entity_id(), code.as_str()))
        .collect();
    let id = world.reserve_entity_id();
    Entity::shelf(id, shelf_id, stock)
}

/// Loads a world from a text map.
///
/// Trailing whitespace is ignored, shorter rows are padded with floor and
/// blank lines are skipped.
pub fn parse_level(map_string: &str, config: SimConfig) -> Result<World, LevelError> {
    let rows: Vec<&str> = map_string
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect();
    if rows.is_empty() {
        return Err(LevelError::Empty);
    }

    let height = rows.len();
    let width = rows.iter().map(|row| row.chars().count()).max().unwrap_or(0);
    let mut world = World::with_config(width, height, config);
    let mut player: Option<Position> = None;
    let mut shelves = 0;

    for (y, row) in rows.iter().enumerate() {
        for (x, symbol) in row.chars().enumerate() {
            let position = Position { x, y };
            let entity = match symbol {
                ' ' => None,
                'W' => {
                    world.set_tile(position, Tile::Wall)?;
                    None
                }
                'P' => {
                    if player.is_some() {
                        return Err(LevelError::MultiplePlayers(position));
                    }
                    player = Some(position);
                    Some(Entity::player(world.reserve_entity_id()))
                }
                'R' => {
                    let name = format!("R{}", world.entities().count());
                    Some(Entity::robot(world.reserve_entity_id(), name, RobotMode::Planning))
                }
                'C' => {
                    let name = format!("CO{}", world.entities().count());
                    Some(Entity::dispenser(world.reserve_entity_id(), name))
                }
                'S' => {
                    let label = shelf_label(shelves);
                    shelves += 1;
                    Some(stocked_shelf(&mut world, &label))
                }
                other => {
                    return Err(LevelError::UnknownSymbol {
                        symbol: other,
                        position,
                    });
                }
            };
            if let Some(entity) = entity {
                world.add_agent(entity, Some(position))?;
            }
        }
    }

    if player.is_none() {
        return Err(LevelError::MissingPlayer);
    }
    debug!(
        "loaded {width}x{height} level with {} entities",
        world.entities().count()
    );
    Ok(world)
}

/// A walled-in world with scattered walls, packages, one planning robot and
/// the player, all drawn from the world's own random source.
pub fn random_world(width: usize, height: usize, config: SimConfig) -> Result<World, LevelError> {
    if width < 3 || height < 3 {
        return Err(LevelError::TooSmall { width, height });
    }
    let mut world = World::with_config(width, height, config);

    for x in 0..width {
        world.set_tile(Position::new(x, 0), Tile::Wall)?;
        world.set_tile(Position::new(x, height - 1), Tile::Wall)?;
    }
    for y in 0..height {
        world.set_tile(Position::new(0, y), Tile::Wall)?;
        world.set_tile(Position::new(width - 1, y), Tile::Wall)?;
    }

    for _ in 0..width * height / 50 {
        let rng = world.rng_mut();
        let position = Position::new(rng.random_range(0..width), rng.random_range(0..height));
        world.set_tile(position, Tile::Wall)?;
    }

    for i in 0..width * height / 5 {
        let Some(position) = world.random_empty_position() else {
            break;
        };
        let id = world.reserve_entity_id();
        world.add_agent(Entity::package(id, format!("PK{i}")), Some(position))?;
    }

    if let Some(position) = world.random_empty_position() {
        let id = world.reserve_entity_id();
        world.add_agent(Entity::robot(id, "R0", RobotMode::Planning), Some(position))?;
    }
    if let Some(position) = world.random_empty_position() {
        let id = world.reserve_entity_id();
        world.add_agent(Entity::player(id), Some(position))?;
    }

    Ok(world)
}
