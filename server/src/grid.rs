//! Wall and occupancy layers of a level, plus line-of-sight.
//!
//! Tile `(x, y)` covers the square `[x, x + 1] × [y, y + 1]`. Anything outside
//! the grid counts as wall.

use crate::utils::Tile;

/// Amount every tile edge is pulled inwards before sightline tests, so a line
/// running exactly along a 45° diagonal does not graze the neighbouring walls.
pub const SIGHT_EPSILON: f64 = 0.01;

/// Slack for float error when a sightline exactly touches a square's edge.
const CLIP_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cell {
    Empty = 0,
    Wall = 1,
    Occupied = 2,
}

#[derive(Debug, Clone)]
pub struct Grid {
    width: i32,
    height: i32,
    walls: Vec<bool>,
    occupancy: Vec<Cell>,
}

impl Grid {
    /// Creates an open grid with no walls.
    pub fn new(width: i32, height: i32) -> Self {
        let size = (width.max(0) * height.max(0)) as usize;
        Self {
            width,
            height,
            walls: vec![false; size],
            occupancy: vec![Cell::Empty; size],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        self.in_bounds(x, y)
            .then(|| (y * self.width + x) as usize)
    }

    /// Sets the static wall layer. Only used while a level is being built.
    pub fn set_wall(&mut self, x: i32, y: i32, wall: bool) {
        if let Some(i) = self.index(x, y) {
            self.walls[i] = wall;
            self.occupancy[i] = if wall { Cell::Wall } else { Cell::Empty };
        }
    }

    pub fn is_wall(&self, x: i32, y: i32) -> bool {
        self.index(x, y).map_or(true, |i| self.walls[i])
    }

    pub fn cell(&self, x: i32, y: i32) -> Cell {
        self.index(x, y).map_or(Cell::Wall, |i| self.occupancy[i])
    }

    pub fn tile_blocked(&self, x: i32, y: i32) -> bool {
        self.cell(x, y) != Cell::Empty
    }

    /// Resets the occupancy layer to the wall layer.
    pub fn clear_occupants(&mut self) {
        for (cell, wall) in self.occupancy.iter_mut().zip(&self.walls) {
            *cell = if *wall { Cell::Wall } else { Cell::Empty };
        }
    }

    /// Marks a blocking entity. Walls are never overwritten.
    pub fn mark_occupied(&mut self, x: i32, y: i32) {
        if let Some(i) = self.index(x, y) {
            if !self.walls[i] {
                self.occupancy[i] = Cell::Occupied;
            }
        }
    }

    /// Removes an entity mark, restoring whatever the wall layer says.
    pub fn vacate(&mut self, x: i32, y: i32) {
        if let Some(i) = self.index(x, y) {
            self.occupancy[i] = if self.walls[i] { Cell::Wall } else { Cell::Empty };
        }
    }

    /// True when some wall tile between the two cells cuts all four
    /// corner-to-corner sightlines joining them.
    ///
    /// Only tiles inside the bounding box of the two cells are tested and the
    /// endpoints themselves never block. The result does not depend on which
    /// end is the viewer.
    pub fn sight_blocked(&self, start_x: i32, start_y: i32, end_x: i32, end_y: i32) -> bool {
        let from = Square::shrunk(start_x, start_y).corners();
        let to = Square::shrunk(end_x, end_y).corners();
        let lines = [
            (from[0], to[0]),
            (from[1], to[1]),
            (from[2], to[2]),
            (from[3], to[3]),
        ];

        for y in start_y.min(end_y)..=start_y.max(end_y) {
            for x in start_x.min(end_x)..=start_x.max(end_x) {
                if (x, y) == (start_x, start_y) || (x, y) == (end_x, end_y) {
                    continue;
                }
                if !self.is_wall(x, y) {
                    continue;
                }
                let wall = Square::shrunk(x, y);
                if lines.iter().all(|(a, b)| segment_hits_square(*a, *b, &wall)) {
                    return true;
                }
            }
        }
        false
    }

    pub fn has_line_of_sight(&self, from: Tile, to: Tile) -> bool {
        !self.sight_blocked(from.0, from.1, to.0, to.1)
    }
}

type Point = (f64, f64);

#[derive(Debug, Clone, Copy)]
struct Square {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Square {
    fn shrunk(x: i32, y: i32) -> Self {
        Self {
            min_x: x as f64 + SIGHT_EPSILON,
            min_y: y as f64 + SIGHT_EPSILON,
            max_x: (x + 1) as f64 - SIGHT_EPSILON,
            max_y: (y + 1) as f64 - SIGHT_EPSILON,
        }
    }

    fn corners(&self) -> [Point; 4] {
        [
            (self.min_x, self.min_y),
            (self.max_x, self.min_y),
            (self.max_x, self.max_y),
            (self.min_x, self.max_y),
        ]
    }
}

/// Liang-Barsky clip of segment `a`-`b` against `square`, boundary inclusive.
fn segment_hits_square(a: Point, b: Point, square: &Square) -> bool {
    // Fixed endpoint order keeps the float arithmetic identical both ways round.
    let (a, b) = if a <= b { (a, b) } else { (b, a) };
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let mut t_enter = 0.0_f64;
    let mut t_exit = 1.0_f64;

    let edges = [
        (-dx, a.0 - square.min_x),
        (dx, square.max_x - a.0),
        (-dy, a.1 - square.min_y),
        (dy, square.max_y - a.1),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < -CLIP_TOLERANCE {
                return false;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t_exit + CLIP_TOLERANCE {
                return false;
            }
            t_enter = t_enter.max(r);
        } else {
            if r < t_enter - CLIP_TOLERANCE {
                return false;
            }
            t_exit = t_exit.min(r);
        }
    }
    t_enter <= t_exit + CLIP_TOLERANCE
}
