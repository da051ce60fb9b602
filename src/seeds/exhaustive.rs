//! Two-layer exhaustive seed (§4.4.4): when the graph's topological depth is
//! exactly two and the permutation budget is small, enumerate every row
//! ordering, route each, and keep the cheapest that fully routes.

use std::collections::HashMap;

use crate::connection::Connection;
use crate::geometry::Orientation;
use crate::grid::GridState;
use crate::ids::MachineId;
use crate::machine::{machine_ports, Machine};
use crate::routing::{apply_belt_path, find_belt_path};
use crate::scoring::evaluate_grid;

use super::topology::layer_indices;
use super::MachineSpec;

const MAX_PERMUTATION_BUDGET: u64 = 4000;
const ROW_GAP: i32 = 3;
const MACHINE_GAP: i32 = 2;

fn factorial(n: usize) -> u64 {
    (1..=n as u64).product::<u64>().max(1)
}

/// All permutations of `items`, via Heap's algorithm (iterative).
fn permutations<T: Clone>(items: Vec<T>) -> Vec<Vec<T>> {
    let n = items.len();
    if n == 0 {
        return vec![Vec::new()];
    }
    let mut out = Vec::new();
    let mut a = items;
    let mut c = vec![0usize; n];
    out.push(a.clone());
    let mut i = 0;
    while i < n {
        if c[i] < i {
            if i % 2 == 0 {
                a.swap(0, i);
            } else {
                a.swap(c[i], i);
            }
            out.push(a.clone());
            c[i] += 1;
            i = 0;
        } else {
            c[i] = 0;
            i += 1;
        }
    }
    out
}

fn build_rows(width: i32, height: i32, machines: &[MachineSpec], top: &[MachineId], bottom: &[MachineId]) -> Option<GridState> {
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
    for row in [top, bottom] {
        let mut x = 0;
        let mut row_height = 0;
        for id in row {
            let spec = specs[id];
            if spec.fixed.is_some() {
                continue;
            }
            let (w, h) = crate::geometry::oriented_dimensions(spec.machine_type.base_footprint(), Orientation::South);
            row_height = row_height.max(h);
            if !grid.would_fit(spec.machine_type, x, y, Orientation::South) {
                return None;
            }
            grid.place(Machine::new(spec.id, spec.machine_type, x, y, Orientation::South));
            x += w + MACHINE_GAP;
        }
        y += row_height + ROW_GAP;
    }
    Some(grid)
}

fn route_all(grid: &mut GridState, connections: &[Connection]) -> bool {
    for c in connections {
        let Some(source_machine) = grid.machine(c.source_machine).cloned() else { return false };
        let Some(target_machine) = grid.machine(c.target_machine).cloned() else { return false };
        let (_, outputs) = machine_ports(&source_machine);
        let (inputs, _) = machine_ports(&target_machine);
        let (Some(&source), Some(&target)) = (outputs.get(c.source_port), inputs.get(c.target_port)) else { return false };
        match find_belt_path(grid, c.id, &source, &target, None) {
            Some(path) => apply_belt_path(grid, path),
            None => return false,
        }
    }
    true
}

pub fn generate(width: i32, height: i32, machines: &[MachineSpec], connections: &[Connection]) -> Option<GridState> {
    if machines.is_empty() {
        return Some(GridState::new(width, height));
    }
    let layer = layer_indices(machines, connections)?;
    let max_layer = *layer.values().max().unwrap_or(&0);
    if max_layer != 1 {
        return None;
    }

    let mut top: Vec<MachineId> = machines.iter().filter(|m| layer[&m.id] == 0).map(|m| m.id).collect();
    let mut bottom: Vec<MachineId> = machines.iter().filter(|m| layer[&m.id] == 1).map(|m| m.id).collect();
    top.sort_by_key(|id| id.0);
    bottom.sort_by_key(|id| id.0);

    let budget = factorial(top.len()).saturating_mul(factorial(bottom.len()));
    if budget > MAX_PERMUTATION_BUDGET {
        return None;
    }

    let mut best: Option<(GridState, crate::scoring::Score)> = None;
    for top_perm in permutations(top) {
        for bottom_perm in permutations(bottom.clone()) {
            let Some(mut candidate) = build_rows(width, height, machines, &top_perm, &bottom_perm) else { continue };
            if !route_all(&mut candidate, connections) {
                continue;
            }
            let score = evaluate_grid(&candidate);
            let is_better = match &best {
                None => true,
                Some((_, best_score)) => score.total < best_score.total,
            };
            if is_better {
                best = Some((candidate, score));
            }
        }
    }
    best.map(|(grid, _)| grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ConnectionId;
    use crate::machine::MachineType;

    fn spec(id: u32) -> MachineSpec {
        MachineSpec { id: MachineId(id), machine_type: MachineType::Composer, fixed: None }
    }

    #[test]
    fn two_layer_graph_finds_a_routed_layout() {
        let machines = vec![spec(0), spec(1), spec(2)];
        let connections = vec![
            Connection { id: ConnectionId(0), source_machine: MachineId(0), source_port: 0, target_machine: MachineId(2), target_port: 0 },
            Connection { id: ConnectionId(1), source_machine: MachineId(1), source_port: 0, target_machine: MachineId(2), target_port: 1 },
        ];
        let grid = generate(30, 30, &machines, &connections);
        assert!(grid.is_some());
    }

    #[test]
    fn three_layer_graph_is_out_of_scope() {
        let machines = vec![spec(0), spec(1), spec(2)];
        let connections = vec![
            Connection { id: ConnectionId(0), source_machine: MachineId(0), source_port: 0, target_machine: MachineId(1), target_port: 0 },
            Connection { id: ConnectionId(1), source_machine: MachineId(1), source_port: 1, target_machine: MachineId(2), target_port: 0 },
        ];
        assert!(generate(30, 30, &machines, &connections).is_none());
    }

    #[test]
    fn permutations_of_three_yields_six() {
        assert_eq!(permutations(vec![1, 2, 3]).len(), 6);
    }
}
