//! Lookahead planning for autonomous entities.
//!
//! Every candidate action is run to completion on its own clone of the world,
//! the outcome is scored, and the best follow-up found within the configured
//! depth lifts a candidate's score. Only one step of the winner touches the
//! live world; the next call plans again from scratch.

use tracing::{debug, trace};

use crate::{
    Direction, EntityId,
    action::{Action, ActionBehavior},
    config::PlannerConfig,
    entity::{EntityClass, remember_path},
    world::World,
};

/// Entity classes a planning agent considers walking up to.
const POINTS_OF_INTEREST: [EntityClass; 7] = [
    EntityClass::Dispenser,
    EntityClass::PickOrder,
    EntityClass::Player,
    EntityClass::Robot,
    EntityClass::Package,
    EntityClass::Shelf,
    EntityClass::Article,
];

/// A candidate action with its projected value.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredAction {
    pub action: Action,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Planner {
    config: PlannerConfig,
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Candidate actions for `agent` in enumeration order.
    pub fn candidates(&self, world: &World, agent: EntityId) -> Vec<Action> {
        let Some(entity) = world.entity(agent) else {
            return Vec::new();
        };
        let mut actions: Vec<Action> = Direction::ALL.into_iter().map(Action::pick).collect();
        for item in entity.items() {
            actions.extend(Direction::ALL.into_iter().map(|dir| Action::put(dir, item.id)));
        }
        for class in POINTS_OF_INTEREST {
            if let Some(target) = world.get_closest_agent(entity.position, &[class], &[agent]) {
                actions.push(Action::move_before(target.position));
            }
        }
        actions
    }

    /// Runs a fresh copy of `action` to completion on a clone of `world`.
    ///
    /// Returns the resulting world, or `None` if the action got blocked or
    /// did not finish within the iteration cap.
    pub fn simulate(&self, world: &World, agent: EntityId, action: &Action) -> Option<World> {
        let mut simulated = world.clone();
        let mut action = action.fresh();
        for _ in 0..self.config.iteration_cap {
            if action.is_finished(&simulated, agent) {
                return Some(simulated);
            }
            if !action.execute(&mut simulated, agent) {
                return None;
            }
        }
        action.is_finished(&simulated, agent).then_some(simulated)
    }

    /// Scores the state of `agent` in `world`. Higher is better.
    pub fn heuristic_value(&self, world: &World, agent: EntityId) -> f64 {
        let Some(entity) = world.entity(agent) else {
            return f64::NEG_INFINITY;
        };
        let articles = entity.count_items(EntityClass::Article) as f64;
        let orders = entity.count_items(EntityClass::PickOrder) as f64;
        let delivered = entity.robot_state().map_or(0, |s| s.delivered) as f64;
        let fullness = if entity.max_items == 0 {
            1.0
        } else {
            entity.items().len() as f64 / entity.max_items as f64
        };

        self.config.article_weight * articles
            + self.config.pick_order_weight * orders
            + self.config.delivery_weight * delivered
            - self.config.inventory_full_penalty * fullness
    }

    /// Every candidate that finishes, best first. Equal scores keep
    /// enumeration order.
    pub fn rank(&self, world: &World, agent: EntityId) -> Vec<ScoredAction> {
        self.rank_to_depth(world, agent, self.config.lookahead_depth)
    }

    fn rank_to_depth(&self, world: &World, agent: EntityId, depth: usize) -> Vec<ScoredAction> {
        let mut ranked: Vec<ScoredAction> = self
            .candidates(world, agent)
            .into_iter()
            .filter_map(|action| {
                let score = self.evaluate(world, agent, &action, depth)?;
                trace!("{action} scores {score:.3} at depth {depth}");
                Some(ScoredAction { action, score })
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }

    fn evaluate(&self, world: &World, agent: EntityId, action: &Action, depth: usize) -> Option<f64> {
        let after = self.simulate(world, agent, action)?;
        let immediate = self.heuristic_value(&after, agent);
        if depth == 0 {
            return Some(immediate);
        }
        let best_followup = self
            .rank_to_depth(&after, agent, depth - 1)
            .first()
            .map(|best| best.score);
        Some(best_followup.map_or(immediate, |followup| followup.max(immediate)))
    }

    /// Picks the best action for `agent` and executes one step of it on the
    /// live world. Returns the chosen action, or `None` when no candidate
    /// finishes.
    pub fn step(&self, world: &mut World, agent: EntityId) -> Option<Action> {
        let best = self.rank(world, agent).into_iter().next()?;
        let mut action = best.action.fresh();
        let progressed = action.execute(world, agent);
        debug!(
            "agent {agent} chose {action} (score {:.3}, progressed: {progressed})",
            best.score
        );
        remember_path(world, agent, action.path());
        Some(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Position,
        entity::{Entity, RobotMode},
    };

    fn pos(x: usize, y: usize) -> Position {
        Position::new(x, y)
    }

    fn robot_at(world: &mut World, at: Position) -> EntityId {
        let id = world.reserve_entity_id();
        world
            .add_agent(Entity::robot(id, "R0", RobotMode::Planning), Some(at))
            .unwrap()
    }

    fn shelf_at(world: &mut World, at: Position, articles: usize) -> EntityId {
        let stock = (0..articles)
            .map(|_| Entity::article(world.reserve_entity_id(), "B0A1"))
            .collect();
        let id = world.reserve_entity_id();
        world.add_agent(Entity::shelf(id, "A1", stock), Some(at)).unwrap()
    }

    fn give_article(world: &mut World, agent: EntityId) -> EntityId {
        let article = Entity::article(world.reserve_entity_id(), "B0A1");
        let id = article.id;
        world.entity_mut(agent).unwrap().add_item(article).unwrap();
        id
    }

    #[test]
    fn candidates_cover_picks_puts_and_points_of_interest() {
        let mut world = World::new(5, 5);
        let robot = robot_at(&mut world, pos(2, 2));
        shelf_at(&mut world, pos(0, 0), 1);
        shelf_at(&mut world, pos(4, 4), 1);
        let item = give_article(&mut world, robot);

        let actions = Planner::default().candidates(&world, robot);

        assert_eq!(actions.len(), 4 + 4 + 1);
        assert_eq!(actions[0], Action::pick(Direction::Left));
        assert_eq!(actions[4], Action::put(Direction::Left, item));
        // closest shelf, first inserted on ties
        assert_eq!(actions[8], Action::move_before(pos(0, 0)));
    }

    #[test]
    fn heuristic_rewards_items_and_deliveries() {
        let mut world = World::new(2, 1);
        let robot = robot_at(&mut world, pos(0, 0));
        let planner = Planner::default();
        assert_eq!(planner.heuristic_value(&world, robot), 0.0);

        give_article(&mut world, robot);
        let one = planner.heuristic_value(&world, robot);
        assert!((one - (1.0 - 5.0 / 9.0)).abs() < 1e-9);

        world
            .entity_mut(robot)
            .unwrap()
            .robot_state_mut()
            .unwrap()
            .delivered = 2;
        assert!((planner.heuristic_value(&world, robot) - (one + 20.0)).abs() < 1e-9);
    }

    #[test]
    fn simulation_leaves_the_live_world_alone() {
        let mut world = World::new(3, 1);
        let robot = robot_at(&mut world, pos(0, 0));
        let shelf = shelf_at(&mut world, pos(2, 0), 3);
        let planner = Planner::default();

        let after = planner
            .simulate(&world, robot, &Action::move_before(pos(2, 0)))
            .unwrap();
        assert_eq!(after.entity(robot).unwrap().position, pos(1, 0));
        assert_eq!(world.entity(robot).unwrap().position, pos(0, 0));

        assert!(planner.simulate(&world, robot, &Action::pick(Direction::Right)).is_none());
        assert_eq!(world.entity(shelf).unwrap().items().len(), 3);
    }

    #[test]
    fn iteration_cap_discards_long_actions() {
        let mut world = World::new(8, 1);
        let robot = robot_at(&mut world, pos(0, 0));
        let planner = Planner::new(PlannerConfig {
            iteration_cap: 3,
            ..PlannerConfig::default()
        });
        assert!(planner.simulate(&world, robot, &Action::move_to(pos(7, 0))).is_none());
        assert!(planner.simulate(&world, robot, &Action::move_to(pos(3, 0))).is_some());
    }

    #[test]
    fn picks_from_an_adjacent_shelf() {
        let mut world = World::new(3, 1);
        let robot = robot_at(&mut world, pos(0, 0));
        let shelf = shelf_at(&mut world, pos(1, 0), 2);

        let chosen = Planner::default().step(&mut world, robot);

        assert_eq!(chosen.map(|a| a.fresh()), Some(Action::pick(Direction::Right)));
        assert_eq!(world.entity(robot).unwrap().items().len(), 1);
        assert_eq!(world.entity(shelf).unwrap().items().len(), 1);
    }

    #[test]
    fn delivers_an_article_into_a_neighbouring_package() {
        let mut world = World::new(3, 1);
        let robot = robot_at(&mut world, pos(0, 0));
        let id = world.reserve_entity_id();
        let package = world
            .add_agent(Entity::package(id, "PK"), Some(pos(1, 0)))
            .unwrap();
        let article = give_article(&mut world, robot);

        let ranked = Planner::default().rank(&world, robot);
        assert_eq!(ranked[0].action, Action::put(Direction::Right, article));

        Planner::default().step(&mut world, robot);
        let state = world.entity(robot).unwrap().robot_state().unwrap();
        assert_eq!(state.delivered, 1);
        assert_eq!(world.entity(package).unwrap().items()[0].id, article);
    }

    #[test]
    fn shuffling_one_article_never_inflates_deliveries() {
        let mut world = World::new(3, 1);
        let robot = robot_at(&mut world, pos(0, 0));
        let id = world.reserve_entity_id();
        let package = world
            .add_agent(Entity::package(id, "PK"), Some(pos(1, 0)))
            .unwrap();
        give_article(&mut world, robot);
        let planner = Planner::default();

        for _ in 0..8 {
            planner.step(&mut world, robot);
            let robot_entity = world.entity(robot).unwrap();
            let packed = world
                .entity(package)
                .or_else(|| robot_entity.item_by_id(package))
                .map_or(0, |p| p.count_items(EntityClass::Article));
            let delivered = robot_entity.robot_state().unwrap().delivered;
            assert!(delivered <= 1);
            assert_eq!(delivered as usize, packed);
        }
    }

    #[test]
    fn ranking_is_deterministic() {
        let mut world = World::new(6, 4);
        let robot = robot_at(&mut world, pos(0, 0));
        shelf_at(&mut world, pos(3, 0), 4);
        let id = world.reserve_entity_id();
        world
            .add_agent(Entity::package(id, "PK"), Some(pos(2, 3)))
            .unwrap();
        let id = world.reserve_entity_id();
        world
            .add_agent(Entity::dispenser(id, "CO0"), Some(pos(5, 1)))
            .unwrap();
        give_article(&mut world, robot);

        let planner = Planner::default();
        let first = planner.rank(&world, robot);
        let second = planner.rank(&world, robot);
        assert!(!first.is_empty());
        assert_eq!(first, second);
        for pair in first.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }

        let mut a = world.clone();
        let mut b = world.clone();
        assert_eq!(planner.step(&mut a, robot), planner.step(&mut b, robot));
        assert_eq!(a.entity(robot), b.entity(robot));
    }

    #[test]
    fn nothing_to_do_means_no_action() {
        let mut world = World::new(1, 1);
        let robot = robot_at(&mut world, pos(0, 0));
        assert!(Planner::default().rank(&world, robot).is_empty());
        assert_eq!(Planner::default().step(&mut world, robot), None);
    }
}
