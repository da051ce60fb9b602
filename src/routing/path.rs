//! Belt segments and paths (§3).

use serde::{Deserialize, Serialize};

use crate::geometry::Direction;
use crate::ids::ConnectionId;

/// One tile of a belt path. `from` is null only at the path's first segment,
/// `to` is null only at its last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeltSegment {
    pub x: i32,
    pub y: i32,
    pub from: Option<Direction>,
    pub to: Option<Direction>,
    pub connection: ConnectionId,
}

impl BeltSegment {
    /// A segment is a corner iff both directions are set and lie on
    /// different axes.
    pub fn is_corner(&self) -> bool {
        matches!(self.axis_contribution(), Some((_, true)))
    }

    /// `Some((is_horizontal, is_corner))` describing this segment's usage
    /// contribution, or `None` for a degenerate single-tile path with
    /// neither direction set.
    pub fn axis_contribution(&self) -> Option<(bool, bool)> {
        match (self.from, self.to) {
            (None, None) => None,
            (Some(d), None) | (None, Some(d)) => Some((d.is_horizontal(), false)),
            (Some(f), Some(t)) => {
                let corner = f.is_horizontal() != t.is_horizontal();
                Some((f.is_horizontal(), corner))
            }
        }
    }
}

/// An ordered belt path for one connection, from just outside the source
/// port to just outside the target port.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeltPath {
    pub connection: ConnectionId,
    pub segments: Vec<BeltSegment>,
}

impl BeltPath {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn corner_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_corner()).count()
    }
}

/// Build segments from an ordered list of tile positions, deriving
/// `from`/`to` from consecutive movement deltas.
pub fn segments_from_positions(connection: ConnectionId, positions: &[(i32, i32)]) -> Vec<BeltSegment> {
    let n = positions.len();
    (0..n)
        .map(|i| {
            let (x, y) = positions[i];
            let from = if i == 0 {
                None
            } else {
                let (px, py) = positions[i - 1];
                Direction::from_offset(x - px, y - py)
            };
            let to = if i + 1 == n {
                None
            } else {
                let (nx, ny) = positions[i + 1];
                Direction::from_offset(nx - x, ny - y)
            };
            BeltSegment { x, y, from, to, connection }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_two_segment_path_has_no_corners() {
        let segs = segments_from_positions(ConnectionId(0), &[(0, 0), (0, 1)]);
        assert_eq!(segs.len(), 2);
        assert!(segs[0].from.is_none());
        assert_eq!(segs[0].to, Some(Direction::South));
        assert_eq!(segs[1].from, Some(Direction::South));
        assert!(segs[1].to.is_none());
        assert_eq!(segs.iter().filter(|s| s.is_corner()).count(), 0);
    }

    #[test]
    fn l_shaped_path_has_one_corner() {
        let segs = segments_from_positions(ConnectionId(0), &[(0, 0), (0, 1), (1, 1)]);
        assert!(segs[1].is_corner());
        assert!(!segs[0].is_corner());
        assert!(!segs[2].is_corner());
    }

    #[test]
    fn single_tile_path_has_no_directions() {
        let segs = segments_from_positions(ConnectionId(0), &[(3, 3)]);
        assert_eq!(segs.len(), 1);
        assert!(segs[0].from.is_none());
        assert!(segs[0].to.is_none());
        assert_eq!(segs[0].axis_contribution(), None);
    }

    #[test]
    fn path_corner_count_matches_segment_corners() {
        let segs = segments_from_positions(ConnectionId(0), &[(0, 0), (0, 1), (1, 1), (1, 2)]);
        let path = BeltPath { connection: ConnectionId(0), segments: segs };
        assert_eq!(path.corner_count(), 2);
        assert_eq!(path.len(), 4);
    }
}
