//! Belt routing: occupancy bookkeeping, path/segment types, and the
//! turn-penalized A* search (§4.2).

pub mod astar;
pub mod path;
pub mod usage;

pub use astar::{apply_belt_path, find_belt_path, remove_belt_path};
pub use path::{BeltPath, BeltSegment};
pub use usage::TileUsage;

use crate::connection::Connection;
use crate::grid::GridState;
use crate::machine::machine_ports;

/// Clear and re-route every connection in `connections` against `grid`, in
/// connection-id order. On the first connection that can't route, the grid
/// is left with whichever earlier connections already applied — callers
/// that need an all-or-nothing result should operate on a throwaway clone
/// and discard it on failure (this is how every Phase 2+ caller uses it).
pub fn reroute_all(grid: &mut GridState, connections: &[Connection]) -> bool {
    for c in connections {
        remove_belt_path(grid, c.id);
    }
    let mut ordered = connections.to_vec();
    ordered.sort_by_key(|c| c.id.0);
    for c in &ordered {
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
