//! Passable-cell graph and shortest-route search
//!
//! Every non-wall cell is a node. Each node's outgoing edges are inserted in
//! [`Direction::ALL`] order, and `DiGraphMap` yields neighbours in insertion
//! order. That makes breadth-first expansion follow Up, Down, Left, Right,
//! which decides between equally short routes.

use petgraph::graphmap::DiGraphMap;
use std::collections::{HashMap, HashSet, VecDeque};

use super::grid::Grid;
use super::types::{Coordinate, Direction};

/// Unit-cost road graph built from a grid's static cell types
#[derive(Debug, Clone, Default)]
pub struct RoadNetwork {
    graph: DiGraphMap<Coordinate, ()>,
}

impl RoadNetwork {
    /// Build the network from every passable cell of `grid`
    pub fn from_grid(grid: &Grid) -> Self {
        let mut graph = DiGraphMap::new();

        let passable: Vec<Coordinate> = grid
            .cells()
            .filter(|cell| cell.cell_type.is_passable())
            .map(|cell| cell.coord)
            .collect();

        for coord in &passable {
            graph.add_node(*coord);
        }

        for coord in passable {
            for direction in Direction::ALL {
                let neighbor = coord.step(direction);
                if grid.is_passable(neighbor) {
                    graph.add_edge(coord, neighbor, ());
                }
            }
        }

        Self { graph }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, coord: Coordinate) -> bool {
        self.graph.contains_node(coord)
    }

    /// Neighbours of a cell in expansion order
    pub fn neighbors(&self, coord: Coordinate) -> impl Iterator<Item = Coordinate> + '_ {
        self.graph.neighbors(coord)
    }

    /// Breadth-first search from `start` to the nearest member of `finishes`.
    ///
    /// Returns the route including both endpoints, or an empty vector when
    /// no finish is reachable. The first finish dequeued wins.
    pub fn find_route(&self, start: Coordinate, finishes: &[Coordinate]) -> Vec<Coordinate> {
        if !self.contains(start) {
            return Vec::new();
        }

        let targets: HashSet<Coordinate> = finishes.iter().copied().collect();
        let mut parents: HashMap<Coordinate, Option<Coordinate>> = HashMap::new();
        let mut queue = VecDeque::new();

        parents.insert(start, None);
        queue.push_back(start);

        let mut reached = None;
        while let Some(current) = queue.pop_front() {
            if targets.contains(&current) {
                reached = Some(current);
                break;
            }

            for neighbor in self.graph.neighbors(current) {
                if parents.contains_key(&neighbor) {
                    continue;
                }
                parents.insert(neighbor, Some(current));
                queue.push_back(neighbor);
            }
        }

        let Some(finish) = reached else {
            return Vec::new();
        };

        let mut route = vec![finish];
        let mut current = finish;
        while let Some(Some(parent)) = parents.get(&current) {
            route.push(*parent);
            current = *parent;
        }
        route.reverse();
        route
    }
}

/// One-off route search against a grid
pub fn find_route(grid: &Grid, start: Coordinate, finishes: &[Coordinate]) -> Vec<Coordinate> {
    RoadNetwork::from_grid(grid).find_route(start, finishes)
}
