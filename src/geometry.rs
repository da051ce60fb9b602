//! Cardinal directions, orientations, and the oriented-dimension math used
//! throughout the grid model.

use serde::{Deserialize, Serialize};

/// A cardinal direction on the grid. `+x` is East, `+y` is South (screen-space
/// grid convention, matching row/column indexing).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::North, Direction::East, Direction::South, Direction::West];

    pub fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }

    pub fn rotate_cw(self) -> Self {
        match self {
            Self::North => Self::East,
            Self::East => Self::South,
            Self::South => Self::West,
            Self::West => Self::North,
        }
    }

    /// Integer grid-space unit offset: (dx, dy).
    pub fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }

    /// Axis this direction moves along: true = horizontal (East/West), false = vertical.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::East | Self::West)
    }

    /// The direction pointing from `delta` toward the origin, when `delta` is
    /// axis-aligned. Used to derive a move direction from a (dx, dy) step.
    pub fn from_offset(dx: i32, dy: i32) -> Option<Self> {
        match (dx, dy) {
            (0, -1) => Some(Self::North),
            (1, 0) => Some(Self::East),
            (0, 1) => Some(Self::South),
            (-1, 0) => Some(Self::West),
            _ => None,
        }
    }
}

/// Orientation a machine is placed with. Identical variant set to
/// [`Direction`] but kept distinct: a machine's orientation determines which
/// face is its input face, not a direction of travel.
pub type Orientation = Direction;

/// Oriented footprint: given a base (w, h) defined for NORTH/SOUTH facing,
/// return the actual (w, h) after applying `orientation`. EAST/WEST swap the
/// axes (a machine rotated 90° occupies a transposed rectangle).
pub fn oriented_dimensions(base: (i32, i32), orientation: Orientation) -> (i32, i32) {
    match orientation {
        Orientation::North | Orientation::South => base,
        Orientation::East | Orientation::West => (base.1, base.0),
    }
}

/// An axis-aligned rectangle in grid coordinates, `[x, x+w) x [y, y+h)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn contains_point(&self, px: i32, py: i32) -> bool {
        px >= self.x && py >= self.y && px < self.x + self.w && py < self.y + self.h
    }

    pub fn within_bounds(&self, grid_w: i32, grid_h: i32) -> bool {
        self.x >= 0 && self.y >= 0 && self.x + self.w <= grid_w && self.y + self.h <= grid_h
    }

    /// All grid cells occupied by this rectangle, row-major.
    pub fn cells(&self) -> Vec<(i32, i32)> {
        let mut cells = Vec::with_capacity((self.w * self.h).max(0) as usize);
        for dy in 0..self.h {
            for dx in 0..self.w {
                cells.push((self.x + dx, self.y + dy));
            }
        }
        cells
    }
}

/// Manhattan distance between two grid points.
pub fn manhattan((ax, ay): (i32, i32), (bx, by): (i32, i32)) -> i32 {
    (ax - bx).abs() + (ay - by).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_is_involution() {
        for d in Direction::ALL {
            assert_eq!(d.opposite().opposite(), d);
        }
    }

    #[test]
    fn rotate_cw_cycles_through_all_four() {
        let mut d = Direction::North;
        for _ in 0..4 {
            d = d.rotate_cw();
        }
        assert_eq!(d, Direction::North);
    }

    #[test]
    fn oriented_dimensions_swap_on_east_west() {
        assert_eq!(oriented_dimensions((3, 5), Orientation::North), (3, 5));
        assert_eq!(oriented_dimensions((3, 5), Orientation::South), (3, 5));
        assert_eq!(oriented_dimensions((3, 5), Orientation::East), (5, 3));
        assert_eq!(oriented_dimensions((3, 5), Orientation::West), (5, 3));
    }

    #[test]
    fn rect_cells_row_major() {
        let r = Rect::new(1, 1, 2, 2);
        assert_eq!(r.cells(), vec![(1, 1), (2, 1), (1, 2), (2, 2)]);
    }

    #[test]
    fn rect_within_bounds() {
        assert!(Rect::new(0, 0, 3, 3).within_bounds(10, 10));
        assert!(!Rect::new(8, 0, 3, 3).within_bounds(10, 10));
        assert!(!Rect::new(-1, 0, 3, 3).within_bounds(10, 10));
    }

    #[test]
    fn manhattan_distance() {
        assert_eq!(manhattan((0, 0), (3, 4)), 7);
        assert_eq!(manhattan((3, 4), (0, 0)), 7);
    }

    #[test]
    fn from_offset_matches_direction_offset() {
        for d in Direction::ALL {
            let (dx, dy) = d.offset();
            assert_eq!(Direction::from_offset(dx, dy), Some(d));
        }
        assert_eq!(Direction::from_offset(1, 1), None);
    }
}
