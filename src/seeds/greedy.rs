//! Greedy placement seed (§4.4.1): place the most-connected machine first,
//! then repeatedly place whichever remaining machine has the most
//! connections to the already-placed set.

use std::cmp::Reverse;
use std::collections::HashSet;

use crate::connection::Connection;
use crate::geometry::Orientation;
use crate::grid::GridState;
use crate::ids::MachineId;
use crate::machine::Machine;

use super::{best_pose_by_cost, candidate_poses, centroid, connection_cost, degree_map, neighbors_of, spiral_candidates, MachineSpec};

pub fn generate(width: i32, height: i32, machines: &[MachineSpec], connections: &[Connection]) -> Option<GridState> {
    let mut grid = GridState::new(width, height);
    if machines.is_empty() {
        return Some(grid);
    }

    let mut fixed: Vec<&MachineSpec> = machines.iter().filter(|m| m.fixed.is_some()).collect();
    fixed.sort_by_key(|m| m.id.0);
    for spec in fixed {
        let (x, y, o) = spec.fixed.expect("filtered");
        if !grid.place(Machine::new(spec.id, spec.machine_type, x, y, o)) {
            return None;
        }
    }

    let mut unplaced: Vec<&MachineSpec> = machines.iter().filter(|m| m.fixed.is_none()).collect();
    if unplaced.is_empty() {
        return Some(grid);
    }

    let degree = degree_map(machines, connections);
    unplaced.sort_by_key(|m| (Reverse(degree.get(&m.id).copied().unwrap_or(0)), m.id.0));

    if grid.machines.is_empty() {
        let anchor = unplaced.remove(0);
        if !grid.would_fit(anchor.machine_type, 0, 0, Orientation::North) {
            return None;
        }
        grid.place(Machine::new(anchor.id, anchor.machine_type, 0, 0, Orientation::North));
    }

    while !unplaced.is_empty() {
        let placed_ids: HashSet<MachineId> = grid.machines.keys().copied().collect();
        let pick = unplaced
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let count = neighbors_of(m.id, connections).iter().filter(|n| placed_ids.contains(n)).count();
                (i, count)
            })
            .max_by_key(|&(i, count)| (count, Reverse(unplaced[i].id.0)))
            .map(|(i, _)| i)?;
        let spec = unplaced.remove(pick);

        let mut candidates = Vec::new();
        for neighbor_id in neighbors_of(spec.id, connections) {
            if let Some(neighbor) = grid.machine(neighbor_id) {
                candidates.extend(candidate_poses(neighbor.rect(), spec.machine_type));
            }
        }
        let placed_snapshot = grid.machines.clone();
        let cost = |x: i32, y: i32, o: Orientation| connection_cost(&placed_snapshot, spec.id, spec.machine_type, x, y, o, connections);

        let pose = best_pose_by_cost(&grid, spec.machine_type, candidates, cost).or_else(|| {
            let center = centroid(&grid);
            let max_radius = width.max(height) + 2;
            best_pose_by_cost(&grid, spec.machine_type, spiral_candidates(center, max_radius), cost)
        })?;

        grid.place(Machine::new(spec.id, spec.machine_type, pose.0, pose.1, pose.2));
    }

    Some(grid)
}
