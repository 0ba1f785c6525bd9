//! Range-bounded A* over a level's occupancy grid.

use crate::grid::Grid;
use crate::utils::{chebyshev, Tile};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

// 8-directional movement; this order is the tie-break between equal nodes.
const DIRECTIONS: [(i32, i32); 8] = [
    (0, -1),
    (1, 0),
    (0, 1),
    (-1, 0),
    (1, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Node {
    f_cost: u32,
    h_cost: u32,
    index: usize,
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: lowest f first, then lowest h, then lowest index.
        other
            .f_cost
            .cmp(&self.f_cost)
            .then_with(|| other.h_cost.cmp(&self.h_cost))
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Search window of radius `search_limit + 1` centred on the start tile. Its
/// outermost ring is never walkable, which caps the work per search.
struct Window {
    origin_x: i32,
    origin_y: i32,
    size: i32,
}

impl Window {
    fn around(start: Tile, search_limit: i32) -> Self {
        let radius = search_limit.max(0) + 1;
        Self {
            origin_x: start.0 - radius,
            origin_y: start.1 - radius,
            size: radius * 2 + 1,
        }
    }

    fn index(&self, tile: Tile) -> Option<usize> {
        let lx = tile.0 - self.origin_x;
        let ly = tile.1 - self.origin_y;
        let inside = lx > 0 && ly > 0 && lx < self.size - 1 && ly < self.size - 1;
        inside.then(|| (ly * self.size + lx) as usize)
    }

    fn tile(&self, index: usize) -> Tile {
        let index = index as i32;
        (
            self.origin_x + index % self.size,
            self.origin_y + index / self.size,
        )
    }

    fn cells(&self) -> usize {
        (self.size * self.size) as usize
    }
}

/// Shortest 8-directional path from `start` to `end`.
///
/// The result excludes `start` and ends with `end`. Start and end are walkable
/// whatever the grid says about them; every other step avoids blocked tiles.
/// An empty path means `end` is unreachable within `search_limit` tiles of
/// `start` (or already reached), never "arrived".
pub fn find_path(grid: &Grid, start: Tile, end: Tile, search_limit: i32) -> VecDeque<Tile> {
    if start == end || chebyshev(start, end) > search_limit {
        return VecDeque::new();
    }

    let window = Window::around(start, search_limit);
    let (Some(start_index), Some(end_index)) = (window.index(start), window.index(end)) else {
        return VecDeque::new();
    };

    let mut g_costs = vec![u32::MAX; window.cells()];
    let mut came_from: Vec<Option<usize>> = vec![None; window.cells()];
    let mut closed = vec![false; window.cells()];
    let mut open_set = BinaryHeap::new();

    let heuristic = |tile: Tile| chebyshev(tile, end) as u32;

    g_costs[start_index] = 0;
    open_set.push(Node {
        f_cost: heuristic(start),
        h_cost: heuristic(start),
        index: start_index,
    });

    while let Some(current) = open_set.pop() {
        if current.index == end_index {
            return reconstruct(&window, &came_from, start_index, end_index);
        }
        if closed[current.index] {
            continue;
        }
        closed[current.index] = true;

        let (cx, cy) = window.tile(current.index);
        let g_next = g_costs[current.index] + 1;

        for (dx, dy) in DIRECTIONS {
            let next = (cx + dx, cy + dy);
            let Some(next_index) = window.index(next) else {
                continue;
            };
            if closed[next_index] {
                continue;
            }
            if next_index != end_index && grid.tile_blocked(next.0, next.1) {
                continue;
            }
            if g_next < g_costs[next_index] {
                g_costs[next_index] = g_next;
                came_from[next_index] = Some(current.index);
                let h_cost = heuristic(next);
                open_set.push(Node {
                    f_cost: g_next + h_cost,
                    h_cost,
                    index: next_index,
                });
            }
        }
    }

    VecDeque::new()
}

fn reconstruct(
    window: &Window,
    came_from: &[Option<usize>],
    start_index: usize,
    end_index: usize,
) -> VecDeque<Tile> {
    let mut path = VecDeque::new();
    let mut current = end_index;
    while current != start_index {
        path.push_front(window.tile(current));
        match came_from[current] {
            Some(previous) => current = previous,
            None => return VecDeque::new(),
        }
    }
    path
}
