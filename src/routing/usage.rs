//! Per-tile belt usage bookkeeping (§3, §4.2).
//!
//! Two belts may share a tile only if neither segment on that tile is a
//! corner and they run on orthogonal axes. Counts never go negative and a
//! tile with all-zero counts is removed from the map entirely.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::path::BeltSegment;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileUsage {
    pub horizontal: u16,
    pub vertical: u16,
    pub corner: u16,
}

impl TileUsage {
    pub fn is_empty(&self) -> bool {
        self.horizontal == 0 && self.vertical == 0 && self.corner == 0
    }

    /// Whether this tile already carries a belt running along the given axis.
    pub fn has_axis(&self, horizontal: bool) -> bool {
        if horizontal {
            self.horizontal > 0
        } else {
            self.vertical > 0
        }
    }

    fn add(&mut self, horizontal: bool, corner: bool) {
        if corner {
            self.corner += 1;
        } else if horizontal {
            self.horizontal += 1;
        } else {
            self.vertical += 1;
        }
    }

    fn sub(&mut self, horizontal: bool, corner: bool) {
        if corner {
            self.corner = self.corner.saturating_sub(1);
        } else if horizontal {
            self.horizontal = self.horizontal.saturating_sub(1);
        } else {
            self.vertical = self.vertical.saturating_sub(1);
        }
    }
}

/// Apply a single segment's contribution to the usage map, inserting an
/// entry if the tile had none.
pub fn apply_segment(usage: &mut HashMap<(i32, i32), TileUsage>, seg: &BeltSegment) {
    if let Some((horizontal, corner)) = seg.axis_contribution() {
        usage.entry((seg.x, seg.y)).or_default().add(horizontal, corner);
    }
}

/// Reverse a single segment's contribution, dropping the tile entry if it's
/// now all-zero.
pub fn remove_segment(usage: &mut HashMap<(i32, i32), TileUsage>, seg: &BeltSegment) {
    if let Some((horizontal, corner)) = seg.axis_contribution() {
        if let Some(u) = usage.get_mut(&(seg.x, seg.y)) {
            u.sub(horizontal, corner);
            if u.is_empty() {
                usage.remove(&(seg.x, seg.y));
            }
        }
    }
}
