//! Generic A* search.
//!
//! The search knows nothing about worlds or entities: callers hand in an
//! adjacency function yielding `(neighbour, step_cost)` pairs and, optionally,
//! a heuristic. Step costs must be non-negative and the heuristic consistent
//! for the returned path to be optimal.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap, HashSet},
    hash::Hash,
};

use crate::Position;

/// Cost of moving between nodes.
pub type Cost = u32;

/// Open-set entry. Lower `f` pops first; among equal `f` the entry pushed
/// first wins, which keeps the search deterministic.
#[derive(Clone, Eq, PartialEq)]
struct PrioritizedNode<N> {
    f_score: Cost,
    sequence: u64,
    node: N,
}

impl<N: Eq> Ord for PrioritizedNode<N> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl<N: Eq> PartialOrd for PrioritizedNode<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Finds a cheapest path from `start` to `goal`.
///
/// Returns the path including both endpoints, or `None` when the goal cannot
/// be reached.
pub fn astar_search<N, F, I, H>(start: N, goal: N, mut adjacent: F, mut heuristic: H) -> Option<Vec<N>>
where
    N: Copy + Eq + Hash,
    F: FnMut(N) -> I,
    I: IntoIterator<Item = (N, Cost)>,
    H: FnMut(N, N) -> Cost,
{
    let mut open = BinaryHeap::new();
    let mut closed: HashSet<N> = HashSet::new();
    let mut g_score: HashMap<N, Cost> = HashMap::new();
    let mut came_from: HashMap<N, N> = HashMap::new();
    let mut sequence = 0u64;

    g_score.insert(start, 0);
    open.push(PrioritizedNode {
        f_score: heuristic(start, goal),
        sequence,
        node: start,
    });

    while let Some(PrioritizedNode { node: current, .. }) = open.pop() {
        // stale heap entry of an already finalized node
        if !closed.insert(current) {
            continue;
        }

        if current == goal {
            let mut path = vec![current];
            let mut node = current;
            while let Some(&previous) = came_from.get(&node) {
                path.push(previous);
                node = previous;
            }
            path.reverse();
            return Some(path);
        }

        let current_g = g_score[&current];
        for (neighbor, step_cost) in adjacent(current) {
            if closed.contains(&neighbor) {
                continue;
            }
            let tentative = current_g.saturating_add(step_cost);
            if g_score
                .get(&neighbor)
                .is_some_and(|&known| tentative >= known)
            {
                continue;
            }
            came_from.insert(neighbor, current);
            g_score.insert(neighbor, tentative);
            sequence += 1;
            open.push(PrioritizedNode {
                f_score: tentative.saturating_add(heuristic(neighbor, goal)),
                sequence,
                node: neighbor,
            });
        }
    }

    None
}

/// A* over grid positions with the manhattan distance as heuristic.
pub fn find_path<F, I>(start: Position, goal: Position, adjacent: F) -> Option<Vec<Position>>
where
    F: FnMut(Position) -> I,
    I: IntoIterator<Item = (Position, Cost)>,
{
    astar_search(start, goal, adjacent, |a, b| a.manhattan(b) as Cost)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::Direction;

    /// 4-neighbourhood over a boolean wall grid, each step costing 1.
    fn open_neighbours<'a>(walls: &'a [&'a [u8]]) -> impl Fn(Position) -> Vec<(Position, Cost)> + 'a {
        move |pos| {
            Direction::ALL
                .iter()
                .filter_map(|dir| pos.offset(*dir))
                .filter(|p| p.y < walls.len() && p.x < walls[0].len())
                .filter(|p| walls[p.y][p.x] == 0)
                .map(|p| (p, 1))
                .collect()
        }
    }

    fn path_of(points: &[(usize, usize)]) -> Vec<Position> {
        points.iter().copied().map(Position::from).collect()
    }

    #[test]
    fn finds_the_only_shortest_path_around_walls() {
        let map: [&[u8]; 4] = [&[1, 0, 1, 0], &[0, 0, 0, 0], &[0, 1, 0, 1], &[0, 1, 0, 0]];
        let path = find_path(Position::new(0, 3), Position::new(3, 0), open_neighbours(&map));
        assert_eq!(
            path,
            Some(path_of(&[(0, 3), (0, 2), (0, 1), (1, 1), (2, 1), (3, 1), (3, 0)]))
        );
    }

    #[test]
    fn routes_down_the_left_edge() {
        let map: [&[u8]; 4] = [&[0, 0, 0, 0], &[0, 0, 1, 0], &[0, 1, 1, 0], &[0, 0, 0, 0]];
        let path = find_path(Position::new(0, 0), Position::new(2, 3), open_neighbours(&map));
        assert_eq!(
            path,
            Some(path_of(&[(0, 0), (0, 1), (0, 2), (0, 3), (1, 3), (2, 3)]))
        );
    }

    #[test]
    fn start_equal_to_goal_is_a_single_node_path() {
        let map: [&[u8]; 1] = [&[0, 0]];
        let start = Position::new(1, 0);
        assert_eq!(find_path(start, start, open_neighbours(&map)), Some(vec![start]));
    }

    #[test]
    fn walled_off_goal_is_unreachable() {
        let map: [&[u8]; 3] = [&[0, 1, 0], &[0, 1, 0], &[0, 1, 0]];
        assert_eq!(
            find_path(Position::new(0, 0), Position::new(2, 2), open_neighbours(&map)),
            None
        );
    }

    #[test]
    fn prefers_cheaper_detour_over_expensive_edge() {
        // a -> b directly costs 10, a -> c -> b costs 2
        let edges = |n: char| -> Vec<(char, Cost)> {
            match n {
                'a' => vec![('b', 10), ('c', 1)],
                'c' => vec![('b', 1)],
                _ => vec![],
            }
        };
        assert_eq!(astar_search('a', 'b', edges, |_, _| 0), Some(vec!['a', 'c', 'b']));
    }

    /// Plain Dijkstra over every cell; reference for optimality checks.
    fn brute_force_cost(
        width: usize,
        height: usize,
        start: Position,
        goal: Position,
        adjacent: &dyn Fn(Position) -> Vec<(Position, Cost)>,
    ) -> Option<Cost> {
        let mut dist: HashMap<Position, Cost> = HashMap::new();
        let mut done: HashSet<Position> = HashSet::new();
        dist.insert(start, 0);
        for _ in 0..width * height {
            let next = dist
                .iter()
                .filter(|(p, _)| !done.contains(*p))
                .min_by_key(|(p, d)| (**d, p.y, p.x))
                .map(|(p, d)| (*p, *d));
            let Some((pos, d)) = next else { break };
            done.insert(pos);
            for (n, c) in adjacent(pos) {
                let candidate = d + c;
                if dist.get(&n).is_none_or(|&old| candidate < old) {
                    dist.insert(n, candidate);
                }
            }
        }
        dist.get(&goal).copied()
    }

    proptest! {
        #[test]
        fn paths_are_connected_and_optimal(
            cells in proptest::collection::vec(0u8..4, 25),
            start in (0usize..5, 0usize..5),
            goal in (0usize..5, 0usize..5),
        ) {
            // 0 = wall, otherwise the cost of entering the cell
            let (width, height) = (5usize, 5usize);
            let cost_at = |p: Position| cells[p.y * width + p.x];
            let adjacent = |pos: Position| -> Vec<(Position, Cost)> {
                Direction::ALL
                    .iter()
                    .filter_map(|dir| pos.offset(*dir))
                    .filter(|p| p.x < width && p.y < height && cost_at(*p) != 0)
                    .map(|p| (p, Cost::from(cost_at(p))))
                    .collect()
            };
            let start = Position::from(start);
            let goal = Position::from(goal);

            let expected = brute_force_cost(width, height, start, goal, &adjacent);
            let path = find_path(start, goal, adjacent);

            match (path, expected) {
                (None, None) => {}
                (Some(path), Some(expected)) => {
                    prop_assert_eq!(path.first(), Some(&start));
                    prop_assert_eq!(path.last(), Some(&goal));
                    let mut total = 0;
                    for pair in path.windows(2) {
                        let step = adjacent(pair[0])
                            .into_iter()
                            .find(|(n, _)| *n == pair[1])
                            .map(|(_, c)| c);
                        prop_assert!(step.is_some(), "{:?} -> {:?} is not an edge", pair[0], pair[1]);
                        total += step.unwrap_or_default();
                    }
                    prop_assert_eq!(total, expected);
                }
                (path, expected) => prop_assert!(false, "search {:?} vs brute force {:?}", path, expected),
            }
        }
    }
}
