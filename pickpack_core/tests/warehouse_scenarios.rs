use std::collections::HashSet;

use pickpack_core::{
    Direction, Entity, EntityClass, Kind, Position, SimConfig, World, parse_level,
};

const WAREHOUSE: &str = include_str!("../../maps/warehouse.txt");

fn assert_consistent(world: &World) {
    let mut seen = HashSet::new();
    for entity in world.entities() {
        assert!(
            world.is_static_map_empty(entity.position),
            "{entity} stands on {}",
            entity.position
        );
        assert!(seen.insert(entity.position), "two entities at {}", entity.position);
        assert_eq!(world.entity_at(entity.position).map(|e| e.id), Some(entity.id));
    }
}

#[test]
fn warehouse_map_loads() {
    let world = parse_level(WAREHOUSE, SimConfig::default()).unwrap();

    assert_eq!((world.width(), world.height()), (30, 38));
    assert_eq!(world.entities_of(EntityClass::Robot).count(), 2);
    assert_eq!(world.entities_of(EntityClass::Dispenser).count(), 1);
    assert_eq!(world.entities_of(EntityClass::Shelf).count(), 132);
    assert_eq!(world.player().map(|p| p.position), Some(Position::new(4, 2)));

    let dispenser = world.entity_at(Position::new(21, 1)).unwrap();
    assert!(dispenser.is_a(EntityClass::Dispenser));
    assert!(world.is_empty(Position::new(21, 2)));
    assert_consistent(&world);
}

#[test]
fn player_fetches_an_order_and_an_article() {
    let map = "
WWWWWWW
W C   W
W P  SW
W     W
WWWWWWW
";
    let mut world = parse_level(map, SimConfig::with_seed(9)).unwrap();
    let player = world.player_id().unwrap();

    assert!(world.agent_pick(player, Direction::Up));
    let order = &world.player().unwrap().items()[0];
    assert!(matches!(&order.kind, Kind::PickOrder { lines } if lines.iter().all(|l| l == "A1")));

    assert!(world.agent_move(player, Direction::Right, None));
    assert!(world.agent_move(player, Direction::Right, None));
    // walking into the shelf only turns the player towards it
    assert!(!world.agent_move(player, Direction::Right, None));
    assert_eq!(world.player().unwrap().position, Position::new(4, 2));
    assert!(world.agent_pick(player, Direction::Right));

    let player_entity = world.player().unwrap();
    assert_eq!(player_entity.items().len(), 2);
    let article = player_entity.selected_item().unwrap();
    assert!(article.is_a(EntityClass::Article));
    assert!(article.name.starts_with("B0A1-"));
    let article_id = article.id;

    assert!(world.agent_put(player, Direction::Down, article_id));
    assert_eq!(world.entity(article_id).unwrap().position, Position::new(4, 3));
    assert!(world.agent_pick(player, Direction::Down));
    assert_eq!(world.player().unwrap().items()[0].id, article_id);
    assert_consistent(&world);
}

#[test]
fn planning_robot_delivers_into_a_package() {
    let map = "
WWWWWWW
WSR   W
W    PW
WWWWWWW
";
    let mut world = parse_level(map, SimConfig::with_seed(1)).unwrap();
    let id = world.reserve_entity_id();
    let package = world
        .add_agent(Entity::package(id, "PK0"), Some(Position::new(3, 1)))
        .unwrap();
    let robot = world
        .entities_of(EntityClass::Robot)
        .map(|r| r.id)
        .next()
        .unwrap();

    for _ in 0..30 {
        world.tick(0.5);
        assert_consistent(&world);
    }

    let state = world.entity(robot).unwrap().robot_state().unwrap().clone();
    assert!(state.delivered >= 1, "robot delivered nothing");
    assert!(world.entity(package).is_some());
}

#[test]
fn busy_small_warehouse_stays_consistent() {
    let map = "
WWWWWWWWWW
W   C    W
W        W
W S S  R W
W        W
W P    R W
WWWWWWWWWW
";
    let mut config = SimConfig::with_seed(42);
    config.dispenser.pick_order_chance = 3;
    config.dispenser.package_chance = 2;
    let mut world = parse_level(map, config).unwrap();
    let robots = world.entities_of(EntityClass::Robot).count();

    for _ in 0..40 {
        world.tick(0.25);
        assert_consistent(&world);
    }

    assert!((world.time() - 10.0).abs() < 1e-9);
    assert_eq!(world.entities_of(EntityClass::Robot).count(), robots);
    assert!(world.player().is_some());
}

#[test]
fn cloned_warehouse_is_equal_and_independent() {
    let world = parse_level(WAREHOUSE, SimConfig::default()).unwrap();
    let mut copy = world.clone();

    let originals: Vec<&Entity> = world.entities().collect();
    let copies: Vec<&Entity> = copy.entities().collect();
    assert_eq!(originals, copies);

    let player = copy.player_id().unwrap();
    assert!(copy.agent_move(player, Direction::Down, None));
    let id = copy.reserve_entity_id();
    copy.add_agent(Entity::package(id, "PK"), Some(Position::new(5, 2)))
        .unwrap();

    assert_eq!(world.player().unwrap().position, Position::new(4, 2));
    assert!(world.entity(id).is_none());
    assert!(world.entity_at(Position::new(4, 3)).is_none());
}
