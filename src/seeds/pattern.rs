//! Pattern-aware seed (§4.4.3): specialized row/ring placement for two
//! recognizable topologies, abstaining otherwise.

use std::collections::{HashMap, HashSet};

use crate::connection::Connection;
use crate::geometry::Orientation;
use crate::grid::GridState;
use crate::ids::MachineId;
use crate::machine::Machine;

use super::{best_pose_by_cost, spiral_candidates, MachineSpec};

const ROW_GAP: i32 = 3;
const MACHINE_GAP: i32 = 2;
const MIN_RING_SIZE: usize = 8;

pub fn generate(width: i32, height: i32, machines: &[MachineSpec], connections: &[Connection]) -> Option<GridState> {
    if machines.is_empty() {
        return Some(GridState::new(width, height));
    }
    three_layer_bipartite(width, height, machines, connections).or_else(|| ring_with_chords(width, height, machines, connections))
}

/// Source nodes (no incoming edges), mid nodes (receive from sources, feed
/// sinks only), sink nodes (no outgoing edges) — and nothing else.
fn three_layer_bipartite(width: i32, height: i32, machines: &[MachineSpec], connections: &[Connection]) -> Option<GridState> {
    let mut has_incoming: HashSet<MachineId> = HashSet::new();
    let mut has_outgoing: HashSet<MachineId> = HashSet::new();
    for c in connections {
        has_outgoing.insert(c.source_machine);
        has_incoming.insert(c.target_machine);
    }

    let mut sources = Vec::new();
    let mut mids = Vec::new();
    let mut sinks = Vec::new();
    for m in machines {
        let incoming = has_incoming.contains(&m.id);
        let outgoing = has_outgoing.contains(&m.id);
        match (incoming, outgoing) {
            (false, true) => sources.push(m.id),
            (true, true) => mids.push(m.id),
            (true, false) => sinks.push(m.id),
            (false, false) => return None, // isolated node, not a clean 3-layer graph
        }
    }
    if sources.is_empty() || mids.is_empty() || sinks.is_empty() {
        return None;
    }
    // Every edge must go source->mid or mid->sink (strictly one hop).
    let source_set: HashSet<_> = sources.iter().copied().collect();
    let mid_set: HashSet<_> = mids.iter().copied().collect();
    let sink_set: HashSet<_> = sinks.iter().copied().collect();
    for c in connections {
        let ok = (source_set.contains(&c.source_machine) && mid_set.contains(&c.target_machine))
            || (mid_set.contains(&c.source_machine) && sink_set.contains(&c.target_machine));
        if !ok {
            return None;
        }
    }

    sources.sort_by_key(|id| id.0);
    mids.sort_by_key(|id| id.0);
    sinks.sort_by_key(|id| id.0);

    place_rows(width, height, machines, &[sources, mids, sinks])
}

fn place_rows(width: i32, height: i32, machines: &[MachineSpec], rows: &[Vec<MachineId>]) -> Option<GridState> {
    let mut grid = GridState::new(width, height);
    let specs: HashMap<MachineId, &MachineSpec> = machines.iter().map(|m| (m.id, m)).collect();

    for m in machines {
        if let Some((x, y, o)) = m.fixed {
            if !grid.place(Machine::new(m.id, m.machine_type, x, y, o)) {
                return None;
            }
        }
    }

    let mut y = 0;
    for row in rows {
        let mut row_height = 0;
        let mut x = 0;
        for id in row {
            let spec = specs[id];
            if spec.fixed.is_some() {
                continue;
            }
            let (w, h) = crate::geometry::oriented_dimensions(spec.machine_type.base_footprint(), Orientation::South);
            row_height = row_height.max(h);
            if grid.would_fit(spec.machine_type, x, y, Orientation::South) {
                grid.place(Machine::new(spec.id, spec.machine_type, x, y, Orientation::South));
            } else {
                let max_radius = width.max(height) + 2;
                let pose = best_pose_by_cost(&grid, spec.machine_type, spiral_candidates((x, y), max_radius), |_, _, _| 0)?;
                grid.place(Machine::new(spec.id, spec.machine_type, pose.0, pose.1, pose.2));
            }
            x += w + MACHINE_GAP;
        }
        y += row_height + ROW_GAP;
    }
    Some(grid)
}

/// A ring of at least [`MIN_RING_SIZE`] nodes (every node degree >= 2,
/// undirected), possibly with extra chord edges. Detected via a greedy walk
/// that must cover every node and return to the start.
fn ring_with_chords(width: i32, height: i32, machines: &[MachineSpec], connections: &[Connection]) -> Option<GridState> {
    if machines.len() < MIN_RING_SIZE {
        return None;
    }
    let mut adjacency: HashMap<MachineId, Vec<MachineId>> = machines.iter().map(|m| (m.id, Vec::new())).collect();
    for c in connections {
        adjacency.get_mut(&c.source_machine)?.push(c.target_machine);
        adjacency.get_mut(&c.target_machine)?.push(c.source_machine);
    }
    if adjacency.values().any(|n| n.len() < 2) {
        return None;
    }

    let start = machines.iter().map(|m| m.id).min_by_key(|id| id.0)?;
    let mut order = vec![start];
    let mut visited: HashSet<MachineId> = HashSet::from([start]);
    let mut current = start;
    while order.len() < machines.len() {
        let mut neighbors: Vec<MachineId> = adjacency[&current].iter().copied().filter(|n| !visited.contains(n)).collect();
        neighbors.sort_by_key(|id| id.0);
        let next = *neighbors.first()?;
        order.push(next);
        visited.insert(next);
        current = next;
    }
    if !adjacency[&current].contains(&start) {
        return None;
    }

    // Lay the ring out as a rounded rectangle perimeter: two rows (top,
    // bottom) joined by two columns, which keeps every pose axis-aligned.
    let n = order.len();
    let mut grid = GridState::new(width, height);
    for m in machines {
        if let Some((x, y, o)) = m.fixed {
            if !grid.place(Machine::new(m.id, m.machine_type, x, y, o)) {
                return None;
            }
        }
    }
    let specs: HashMap<MachineId, &MachineSpec> = machines.iter().map(|m| (m.id, m)).collect();
    let per_side = n.div_ceil(4).max(1);
    for (i, id) in order.iter().enumerate() {
        let spec = specs[id];
        if spec.fixed.is_some() {
            continue;
        }
        let side = i / per_side;
        let slot = (i % per_side) as i32;
        let (x, y) = match side {
            0 => (slot * (3 + MACHINE_GAP), 0),
            1 => ((per_side as i32) * (3 + MACHINE_GAP), slot * (3 + MACHINE_GAP)),
            2 => ((per_side as i32 - slot) * (3 + MACHINE_GAP), (per_side as i32) * (3 + MACHINE_GAP)),
            _ => (0, (per_side as i32 - slot) * (3 + MACHINE_GAP)),
        };
        if grid.would_fit(spec.machine_type, x, y, Orientation::North) {
            grid.place(Machine::new(spec.id, spec.machine_type, x, y, Orientation::North));
        } else {
            let max_radius = width.max(height) + 2;
            let pose = best_pose_by_cost(&grid, spec.machine_type, spiral_candidates((x, y), max_radius), |_, _, _| 0)?;
            grid.place(Machine::new(spec.id, spec.machine_type, pose.0, pose.1, pose.2));
        }
    }
    Some(grid)
}
