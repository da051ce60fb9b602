//! Topology-layered seed (§4.4.2): longest-path layering from source nodes,
//! barycentric sweeps to order each layer, then a vertical packing pass.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::connection::Connection;
use crate::geometry::Orientation;
use crate::grid::GridState;
use crate::ids::MachineId;
use crate::machine::Machine;

use super::{best_pose_by_cost, spiral_candidates, MachineSpec};

const BARYCENTRIC_SWEEPS: usize = 4;
const LAYER_GAP: i32 = 2;
const MACHINE_GAP: i32 = 2;

/// Longest-path layer index for every node, or `None` if the connection
/// graph has a cycle (this generator only applies to DAGs).
pub(crate) fn layer_indices(machines: &[MachineSpec], connections: &[Connection]) -> Option<HashMap<MachineId, i32>> {
    let mut in_degree: HashMap<MachineId, usize> = machines.iter().map(|m| (m.id, 0)).collect();
    let mut successors: HashMap<MachineId, Vec<MachineId>> = machines.iter().map(|m| (m.id, Vec::new())).collect();
    for c in connections {
        *in_degree.entry(c.target_machine).or_insert(0) += 1;
        successors.entry(c.source_machine).or_default().push(c.target_machine);
    }

    let mut layer: HashMap<MachineId, i32> = HashMap::new();
    let mut queue: VecDeque<MachineId> = machines.iter().filter(|m| in_degree[&m.id] == 0).map(|m| m.id).collect();
    for id in &queue {
        layer.insert(*id, 0);
    }
    let mut remaining = in_degree.clone();
    let mut visited = 0usize;

    while let Some(id) = queue.pop_front() {
        visited += 1;
        let base = layer[&id];
        for &succ in successors.get(&id).into_iter().flatten() {
            let entry = layer.entry(succ).or_insert(0);
            *entry = (*entry).max(base + 1);
            let d = remaining.get_mut(&succ).expect("tracked");
            *d -= 1;
            if *d == 0 {
                queue.push_back(succ);
            }
        }
    }

    if visited != machines.len() {
        return None; // cycle
    }
    Some(layer)
}

/// Average layer-local index of a node's connected neighbors already placed
/// in an adjacent layer, used to order nodes within a layer.
fn barycenter(id: MachineId, connections: &[Connection], position: &HashMap<MachineId, f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0.0;
    for c in connections {
        let other = if c.source_machine == id {
            Some(c.target_machine)
        } else if c.target_machine == id {
            Some(c.source_machine)
        } else {
            None
        };
        if let Some(other) = other {
            if let Some(&p) = position.get(&other) {
                sum += p;
                count += 1.0;
            }
        }
    }
    if count > 0.0 {
        sum / count
    } else {
        position.get(&id).copied().unwrap_or(0.0)
    }
}

pub fn generate(width: i32, height: i32, machines: &[MachineSpec], connections: &[Connection]) -> Option<GridState> {
    let mut grid = GridState::new(width, height);
    if machines.is_empty() {
        return Some(grid);
    }

    let layer = layer_indices(machines, connections)?;
    let max_layer = *layer.values().max().unwrap_or(&0);
    let mut layers: Vec<Vec<MachineId>> = vec![Vec::new(); (max_layer + 1) as usize];
    for m in machines {
        layers[layer[&m.id] as usize].push(m.id);
    }
    for row in &mut layers {
        row.sort_by_key(|id| id.0);
    }

    let mut position: HashMap<MachineId, f64> = HashMap::new();
    for row in &layers {
        for (i, id) in row.iter().enumerate() {
            position.insert(*id, i as f64);
        }
    }

    for sweep in 0..BARYCENTRIC_SWEEPS {
        let layer_order: Box<dyn Iterator<Item = usize>> =
            if sweep % 2 == 0 { Box::new(1..layers.len()) } else { Box::new((0..layers.len().saturating_sub(1)).rev()) };
        for li in layer_order {
            let mut row = std::mem::take(&mut layers[li]);
            row.sort_by(|&a, &b| {
                barycenter(a, connections, &position)
                    .partial_cmp(&barycenter(b, connections, &position))
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });
            for (i, id) in row.iter().enumerate() {
                position.insert(*id, i as f64);
            }
            layers[li] = row;
        }
    }

    let specs: HashMap<MachineId, &MachineSpec> = machines.iter().map(|m| (m.id, m)).collect();
    let mut fixed_ids = HashSet::new();
    for m in machines {
        if let Some((x, y, o)) = m.fixed {
            if !grid.place(Machine::new(m.id, m.machine_type, x, y, o)) {
                return None;
            }
            fixed_ids.insert(m.id);
        }
    }

    let mut y = 0;
    for row in &layers {
        let mut row_height = 0;
        let mut x = 0;
        for id in row {
            if fixed_ids.contains(id) {
                continue;
            }
            let spec = specs[id];
            let (w, h) = crate::geometry::oriented_dimensions(spec.machine_type.base_footprint(), Orientation::South);
            row_height = row_height.max(h);
            if grid.would_fit(spec.machine_type, x, y, Orientation::South) {
                grid.place(Machine::new(spec.id, spec.machine_type, x, y, Orientation::South));
            } else {
                let center = (x, y);
                let max_radius = width.max(height) + 2;
                let pose = best_pose_by_cost(&grid, spec.machine_type, spiral_candidates(center, max_radius), |_, _, _| 0)?;
                grid.place(Machine::new(spec.id, spec.machine_type, pose.0, pose.1, pose.2));
            }
            x += w + MACHINE_GAP;
        }
        y += row_height + LAYER_GAP;
    }

    Some(grid)
}
