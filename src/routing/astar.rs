//! Turn-penalized A* belt routing (§4.2).
//!
//! Costs are scaled by [`SCALE`] so the base step, turn penalty, and crossing
//! bonus all stay exact `i64` arithmetic — no float `Ord` headaches in the
//! open-set ordering.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::geometry::{manhattan, Direction};
use crate::grid::{Cell, GridState};
use crate::ids::ConnectionId;
use crate::machine::Port;
use crate::routing::path::{segments_from_positions, BeltPath};
use crate::routing::usage::{apply_segment, remove_segment, TileUsage};

const SCALE: i64 = 2;
const STEP_COST: i64 = SCALE;
const TURN_PENALTY: i64 = 4;
const CROSSING_BONUS: i64 = 1;
/// Lower bound on a single step's cost, used to keep the Manhattan heuristic
/// admissible. The crossing bonus is additive (a crossing is costlier than a
/// clear straight tile, just cheaper than a detour around it), so the plain
/// step cost is already the floor.
const MIN_STEP_COST: i64 = STEP_COST;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct SearchState {
    x: i32,
    y: i32,
    incoming: Option<Direction>,
}

#[derive(Clone, Debug)]
struct OpenEntry {
    f: i64,
    g: i64,
    seq: u64,
    state: SearchState,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.seq == other.seq
    }
}
impl Eq for OpenEntry {}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the lowest f (then earliest
        // insertion, for determinism) pops first.
        other.f.cmp(&self.f).then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Usage a candidate path must route around: the grid's real tile usage,
/// minus the path currently assigned to `exclude` (when re-routing an
/// existing connection in place).
fn effective_usage(grid: &GridState, exclude: Option<ConnectionId>) -> HashMap<(i32, i32), TileUsage> {
    let mut usage = grid.tile_usage.clone();
    if let Some(conn) = exclude {
        if let Some(path) = grid.belt_paths.get(&conn) {
            for seg in &path.segments {
                remove_segment(&mut usage, seg);
            }
        }
    }
    usage
}

fn usage_at(usage: &HashMap<(i32, i32), TileUsage>, pos: (i32, i32)) -> TileUsage {
    usage.get(&pos).copied().unwrap_or_default()
}

/// Find the cheapest legal belt path from `source`'s external tile to
/// `target`'s, for `connection`. `exclude` should be `Some(connection)` (or
/// the connection's own prior id) when re-routing a path already on the grid,
/// so its own tiles don't block itself.
pub fn find_belt_path(
    grid: &GridState,
    connection: ConnectionId,
    source: &Port,
    target: &Port,
    exclude: Option<ConnectionId>,
) -> Option<BeltPath> {
    let start = source.external_tile();
    let goal = target.external_tile();
    if !grid.in_bounds(start.0, start.1) || !grid.in_bounds(goal.0, goal.1) {
        return None;
    }
    if matches!(grid.cell(start.0, start.1), Some(Cell::Machine(_)) | None) {
        return None;
    }
    if matches!(grid.cell(goal.0, goal.1), Some(Cell::Machine(_)) | None) {
        return None;
    }

    let usage = effective_usage(grid, exclude);

    let start_state = SearchState { x: start.0, y: start.1, incoming: Some(source.approach) };
    let mut open = BinaryHeap::new();
    let mut seq = 0u64;
    let mut best_g: HashMap<SearchState, i64> = HashMap::new();
    let mut came_from: HashMap<SearchState, SearchState> = HashMap::new();

    best_g.insert(start_state, 0);
    open.push(OpenEntry { f: manhattan(start, goal) * MIN_STEP_COST, g: 0, seq, state: start_state });

    while let Some(entry) = open.pop() {
        let state = entry.state;
        if let Some(&known) = best_g.get(&state) {
            if entry.g > known {
                continue;
            }
        }
        if (state.x, state.y) == goal {
            return Some(reconstruct(connection, &came_from, state, start));
        }

        for d in Direction::ALL {
            let (dx, dy) = d.offset();
            let nx = state.x + dx;
            let ny = state.y + dy;
            if !grid.in_bounds(nx, ny) {
                continue;
            }
            if matches!(grid.cell(nx, ny), Some(Cell::Machine(_))) {
                continue;
            }
            let neighbor_usage = usage_at(&usage, (nx, ny));
            if neighbor_usage.corner > 0 {
                continue;
            }
            if neighbor_usage.has_axis(d.is_horizontal()) {
                continue;
            }

            let is_turn = state.incoming.is_some_and(|inc| inc != d);
            if is_turn {
                let current_usage = usage_at(&usage, (state.x, state.y));
                if !current_usage.is_empty() {
                    continue;
                }
            }

            let crossing = neighbor_usage.has_axis(!d.is_horizontal());
            let mut step_cost = STEP_COST;
            if is_turn {
                step_cost += TURN_PENALTY;
            }
            if crossing {
                step_cost += CROSSING_BONUS;
            }

            let next_state = SearchState { x: nx, y: ny, incoming: Some(d) };
            let next_g = entry.g + step_cost;
            if best_g.get(&next_state).is_some_and(|&g| next_g >= g) {
                continue;
            }
            best_g.insert(next_state, next_g);
            came_from.insert(next_state, state);
            seq += 1;
            let h = manhattan((nx, ny), goal) * MIN_STEP_COST;
            open.push(OpenEntry { f: next_g + h, g: next_g, seq, state: next_state });
        }
    }

    None
}

fn reconstruct(
    connection: ConnectionId,
    came_from: &HashMap<SearchState, SearchState>,
    goal_state: SearchState,
    start: (i32, i32),
) -> BeltPath {
    let mut states = vec![goal_state];
    let mut cur = goal_state;
    while (cur.x, cur.y) != start {
        let Some(&prev) = came_from.get(&cur) else { break };
        states.push(prev);
        cur = prev;
    }
    states.reverse();
    let positions: Vec<(i32, i32)> = states.iter().map(|s| (s.x, s.y)).collect();
    BeltPath { connection, segments: segments_from_positions(connection, &positions) }
}

/// Commit a found path to the grid: marks belt cells and records tile usage.
pub fn apply_belt_path(grid: &mut GridState, path: BeltPath) {
    for seg in &path.segments {
        apply_segment(&mut grid.tile_usage, seg);
        grid.mark_belt(seg.x, seg.y, seg.connection);
    }
    grid.belt_paths.insert(path.connection, path);
}

/// Remove a previously-applied path, freeing its tiles and usage. Returns
/// `false` if no path was recorded for `connection`.
pub fn remove_belt_path(grid: &mut GridState, connection: ConnectionId) -> bool {
    let Some(path) = grid.belt_paths.remove(&connection) else {
        return false;
    };
    for seg in &path.segments {
        remove_segment(&mut grid.tile_usage, seg);
        grid.unmark_belt(seg.x, seg.y, seg.connection);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Orientation;
    use crate::machine::MachineType;

    #[test]
    fn straight_clear_corridor_costs_length_steps() {
        let mut grid = GridState::new(10, 10);
        // Orientation North => output face South (opposite), facing toward B.
        let a = grid.place_machine(MachineType::Beacon, 0, 0, Orientation::North).unwrap();
        let b = grid.place_machine(MachineType::Composer, 0, 5, Orientation::North).unwrap();
        let (_, outputs) = grid.ports(a).unwrap();
        let (inputs, _) = grid.ports(b).unwrap();
        let source = outputs[0];
        let target = inputs[1]; // centered input on north face lines up with beacon's output column
        let path = find_belt_path(&grid, ConnectionId(0), &source, &target, None);
        assert!(path.is_some());
    }

    #[test]
    fn unreachable_target_returns_none() {
        let mut grid = GridState::new(4, 4);
        let a = grid.place_machine(MachineType::Beacon, 0, 0, Orientation::North).unwrap();
        let (_, outputs) = grid.ports(a).unwrap();
        let source = outputs[0];
        // A fabricated, unreachable target far outside the grid.
        let fake_target = Port {
            machine_id: crate::ids::MachineId(999),
            role: crate::machine::PortRole::Input,
            index: 0,
            x: 100,
            y: 100,
            approach: Direction::North,
        };
        assert!(find_belt_path(&grid, ConnectionId(0), &source, &fake_target, None).is_none());
    }

    #[test]
    fn apply_then_remove_restores_tile_usage() {
        let mut grid = GridState::new(10, 10);
        let a = grid.place_machine(MachineType::Beacon, 0, 0, Orientation::North).unwrap();
        let b = grid.place_machine(MachineType::Composer, 0, 5, Orientation::North).unwrap();
        let (_, outputs) = grid.ports(a).unwrap();
        let (inputs, _) = grid.ports(b).unwrap();
        let path = find_belt_path(&grid, ConnectionId(0), &outputs[0], &inputs[1], None).unwrap();
        apply_belt_path(&mut grid, path);
        assert!(!grid.tile_usage.is_empty());
        assert!(remove_belt_path(&mut grid, ConnectionId(0)));
        assert!(grid.tile_usage.is_empty());
        assert!(grid.belt_paths.is_empty());
    }

    #[test]
    fn crossing_belts_on_orthogonal_axes_both_succeed() {
        let mut grid = GridState::new(12, 12);
        // A: 1x3 footprint (East/West swap), output face East, belt runs
        // east along row 5.
        let a = grid.place_machine(MachineType::Beacon, 0, 4, Orientation::West).unwrap();
        // B: 3x1 footprint, output face South, belt runs south along column 5.
        let b = grid.place_machine(MachineType::Beacon, 4, 0, Orientation::North).unwrap();
        let (_, out_a) = grid.ports(a).unwrap();
        let (_, out_b) = grid.ports(b).unwrap();

        let target_a = Port {
            machine_id: crate::ids::MachineId(0),
            role: crate::machine::PortRole::Input,
            index: 0,
            x: 10,
            y: 5,
            approach: Direction::West,
        };
        let target_b = Port {
            machine_id: crate::ids::MachineId(0),
            role: crate::machine::PortRole::Input,
            index: 0,
            x: 5,
            y: 10,
            approach: Direction::North,
        };

        let path_a = find_belt_path(&grid, ConnectionId(0), &out_a[0], &target_a, None).unwrap();
        apply_belt_path(&mut grid, path_a);
        let path_b = find_belt_path(&grid, ConnectionId(1), &out_b[0], &target_b, None);
        assert!(path_b.is_some(), "orthogonal crossing must remain legal");
    }
}
