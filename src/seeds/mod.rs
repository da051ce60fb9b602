//! Deterministic seed generators (§4.4, Phase 0). Each produces a complete
//! candidate grid from scratch, or abstains (`None`) if its preconditions
//! aren't met or it can't place every machine.

pub mod exhaustive;
pub mod greedy;
pub mod pattern;
pub mod topology;

use std::collections::{HashMap, HashSet};

use crate::connection::Connection;
use crate::geometry::{manhattan, oriented_dimensions, Direction, Orientation, Rect};
use crate::grid::GridState;
use crate::ids::MachineId;
use crate::machine::{machine_ports, Machine, MachineType};

/// One machine awaiting placement by a seed generator. Anchors carry a
/// `fixed` pose that every generator must stamp verbatim.
#[derive(Clone, Copy, Debug)]
pub struct MachineSpec {
    pub id: MachineId,
    pub machine_type: MachineType,
    pub fixed: Option<(i32, i32, Orientation)>,
}

/// Run every seed generator and return whichever candidates were produced,
/// in a fixed order (greedy, topology, pattern, exhaustive) so downstream
/// selection-by-score stays deterministic on ties.
pub fn generate_all(width: i32, height: i32, machines: &[MachineSpec], connections: &[Connection]) -> Vec<GridState> {
    [
        greedy::generate(width, height, machines, connections),
        topology::generate(width, height, machines, connections),
        pattern::generate(width, height, machines, connections),
        exhaustive::generate(width, height, machines, connections),
    ]
    .into_iter()
    .flatten()
    .collect()
}

pub(crate) fn degree_map(machines: &[MachineSpec], connections: &[Connection]) -> HashMap<MachineId, usize> {
    let mut deg: HashMap<MachineId, usize> = machines.iter().map(|m| (m.id, 0)).collect();
    for c in connections {
        *deg.entry(c.source_machine).or_insert(0) += 1;
        *deg.entry(c.target_machine).or_insert(0) += 1;
    }
    deg
}

pub(crate) fn neighbors_of(id: MachineId, connections: &[Connection]) -> Vec<MachineId> {
    connections
        .iter()
        .filter_map(|c| {
            if c.source_machine == id {
                Some(c.target_machine)
            } else if c.target_machine == id {
                Some(c.source_machine)
            } else {
                None
            }
        })
        .collect()
}

/// Sum of Manhattan belt cost for every connection `spec_id` has to an
/// already-placed machine, if it were placed at `(x, y, orientation)`.
pub(crate) fn connection_cost(
    placed: &HashMap<MachineId, Machine>,
    spec_id: MachineId,
    machine_type: MachineType,
    x: i32,
    y: i32,
    orientation: Orientation,
    connections: &[Connection],
) -> i32 {
    let probe = Machine::new(spec_id, machine_type, x, y, orientation);
    let (inputs, outputs) = machine_ports(&probe);
    let mut total = 0;
    for c in connections {
        if c.source_machine == spec_id {
            if let Some(other) = placed.get(&c.target_machine) {
                let (other_inputs, _) = machine_ports(other);
                if let (Some(src), Some(tgt)) = (outputs.get(c.source_port), other_inputs.get(c.target_port)) {
                    total += manhattan(src.external_tile(), tgt.external_tile());
                }
            }
        } else if c.target_machine == spec_id {
            if let Some(other) = placed.get(&c.source_machine) {
                let (_, other_outputs) = machine_ports(other);
                if let (Some(src), Some(tgt)) = (other_outputs.get(c.source_port), inputs.get(c.target_port)) {
                    total += manhattan(src.external_tile(), tgt.external_tile());
                }
            }
        }
    }
    total
}

/// Positions one tile off each of `neighbor_rect`'s four sides, in both a
/// corner-flush and a centered variant, for a machine with footprint `dims`.
fn side_positions(neighbor_rect: Rect, dims: (i32, i32), side: Direction) -> Vec<(i32, i32)> {
    let (w, h) = dims;
    match side {
        Direction::North => {
            let y = neighbor_rect.y - h;
            vec![(neighbor_rect.x, y), (neighbor_rect.x + (neighbor_rect.w - w) / 2, y)]
        }
        Direction::South => {
            let y = neighbor_rect.y + neighbor_rect.h;
            vec![(neighbor_rect.x, y), (neighbor_rect.x + (neighbor_rect.w - w) / 2, y)]
        }
        Direction::West => {
            let x = neighbor_rect.x - w;
            vec![(x, neighbor_rect.y), (x, neighbor_rect.y + (neighbor_rect.h - h) / 2)]
        }
        Direction::East => {
            let x = neighbor_rect.x + neighbor_rect.w;
            vec![(x, neighbor_rect.y), (x, neighbor_rect.y + (neighbor_rect.h - h) / 2)]
        }
    }
}

/// All (x, y, orientation) candidates one tile off any side of
/// `neighbor_rect`, across all four orientations of the machine being placed.
pub(crate) fn candidate_poses(neighbor_rect: Rect, machine_type: MachineType) -> Vec<(i32, i32, Orientation)> {
    let mut out = Vec::new();
    for o in Direction::ALL {
        let dims = oriented_dimensions(machine_type.base_footprint(), o);
        for side in Direction::ALL {
            for (x, y) in side_positions(neighbor_rect, dims, side) {
                out.push((x, y, o));
            }
        }
    }
    out
}

/// Square-spiral offsets around the origin, nearest ring first.
pub(crate) fn spiral_offsets(max_radius: i32) -> Vec<(i32, i32)> {
    let mut out = vec![(0, 0)];
    for r in 1..=max_radius.max(0) {
        for x in -r..=r {
            out.push((x, -r));
            out.push((x, r));
        }
        for y in -(r - 1)..=(r - 1) {
            out.push((-r, y));
            out.push((r, y));
        }
    }
    out
}

pub(crate) fn centroid(grid: &GridState) -> (i32, i32) {
    if grid.machines.is_empty() {
        return (0, 0);
    }
    let (mut sx, mut sy, mut n) = (0i64, 0i64, 0i64);
    for m in grid.machines.values() {
        let r = m.rect();
        sx += (r.x + r.w / 2) as i64;
        sy += (r.y + r.h / 2) as i64;
        n += 1;
    }
    ((sx / n) as i32, (sy / n) as i32)
}

/// Pick the in-bounds, non-overlapping candidate with lowest cost, breaking
/// ties by the candidate's (x, y, orientation) to stay deterministic.
pub(crate) fn best_pose_by_cost(
    grid: &GridState,
    machine_type: MachineType,
    candidates: impl IntoIterator<Item = (i32, i32, Orientation)>,
    cost: impl Fn(i32, i32, Orientation) -> i32,
) -> Option<(i32, i32, Orientation)> {
    let mut best: Option<((i32, i32, Orientation), i32)> = None;
    let mut seen: HashSet<(i32, i32, Orientation)> = HashSet::new();
    for pose @ (x, y, o) in candidates {
        if !seen.insert(pose) {
            continue;
        }
        if !grid.would_fit(machine_type, x, y, o) {
            continue;
        }
        let c = cost(x, y, o);
        let better = match &best {
            None => true,
            Some((bp, bc)) => c < *bc || (c == *bc && pose_key(pose) < pose_key(*bp)),
        };
        if better {
            best = Some((pose, c));
        }
    }
    best.map(|(p, _)| p)
}

fn pose_key((x, y, o): (i32, i32, Orientation)) -> (i32, i32, u8) {
    let tag = match o {
        Direction::North => 0,
        Direction::East => 1,
        Direction::South => 2,
        Direction::West => 3,
    };
    (x, y, tag)
}

/// Spiral-search fallback: try every orientation at every ring offset from
/// `center`, out to `max_radius`.
pub(crate) fn spiral_candidates(center: (i32, i32), max_radius: i32) -> impl Iterator<Item = (i32, i32, Orientation)> {
    spiral_offsets(max_radius)
        .into_iter()
        .flat_map(move |(dx, dy)| Direction::ALL.into_iter().map(move |o| (center.0 + dx, center.1 + dy, o)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spiral_offsets_cover_expected_ring_counts() {
        let offsets = spiral_offsets(2);
        // center (1) + ring1 (8) + ring2 (16)
        assert_eq!(offsets.len(), 1 + 8 + 16);
    }

    #[test]
    fn side_positions_north_places_above_with_both_variants() {
        let rect = Rect::new(4, 4, 3, 3);
        let positions = side_positions(rect, (3, 3), Direction::North);
        assert!(positions.contains(&(4, 1)));
    }
}
