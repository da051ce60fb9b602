//! Deterministic post-SA cleanup (§4.6, §4.7): Phase 3 reassigns each
//! connection's ports by greedy shortest-Manhattan-pairing, Phase 4
//! compacts the layout toward the origin and polishes orientations.
//! Both phases only ever keep a change that routes no worse than what
//! came before — they never regress a layout SA already improved.

use crate::connection::{Connection, PortUsage};
use crate::geometry::{manhattan, Direction, Orientation};
use crate::grid::GridState;
use crate::ids::MachineId;
use crate::machine::{machine_ports, Machine};
use crate::scoring::evaluate_grid;

/// Re-route `grid` and return its routed score, or `None` if any connection
/// fails to route.
fn route_and_score(grid: &mut GridState) -> Option<crate::scoring::Score> {
    let connections: Vec<Connection> = grid.connections.values().copied().collect();
    if crate::routing::reroute_all(grid, &connections) {
        Some(evaluate_grid(grid))
    } else {
        None
    }
}

/// Phase 3 (§4.6): for each connection, try every legal (unused-at-time-of-
/// consideration) output/input port pair between its two endpoints and keep
/// whichever minimizes external-tile Manhattan distance. Connections are
/// processed in id order so the greedy re-pairing is deterministic.
pub fn optimize_port_assignment(grid: &mut GridState) {
    let mut connections: Vec<Connection> = grid.connections.values().copied().collect();
    connections.sort_by_key(|c| c.id.0);

    let mut usage = PortUsage::new();
    for c in &connections {
        let _ = usage.try_add(*c);
    }

    let mut updated = Vec::with_capacity(connections.len());
    for c in connections {
        let Some(src_m) = grid.machine(c.source_machine).cloned() else {
            updated.push(c);
            continue;
        };
        let Some(tgt_m) = grid.machine(c.target_machine).cloned() else {
            updated.push(c);
            continue;
        };
        let (_, outputs) = machine_ports(&src_m);
        let (inputs, _) = machine_ports(&tgt_m);

        usage.remove(&c);
        let mut best = (c.source_port, c.target_port, manhattan_for(&outputs, c.source_port, &inputs, c.target_port));
        for o in &outputs {
            if usage.is_used(src_m.id, o.index, crate::machine::PortRole::Output) {
                continue;
            }
            for i in &inputs {
                if usage.is_used(tgt_m.id, i.index, crate::machine::PortRole::Input) {
                    continue;
                }
                let d = manhattan(o.external_tile(), i.external_tile());
                if d < best.2 {
                    best = (o.index, i.index, d);
                }
            }
        }
        let reassigned = Connection { source_port: best.0, target_port: best.1, ..c };
        let _ = usage.try_add(reassigned);
        updated.push(reassigned);
    }

    for c in updated {
        grid.connections.insert(c.id, c);
    }
}

fn manhattan_for(outputs: &[crate::machine::Port], source_port: usize, inputs: &[crate::machine::Port], target_port: usize) -> i32 {
    match (outputs.get(source_port), inputs.get(target_port)) {
        (Some(o), Some(i)) => manhattan(o.external_tile(), i.external_tile()),
        _ => i32::MAX,
    }
}

/// Build-and-commit-cheaper: run [`optimize_port_assignment`] against a
/// clone, route both, and keep whichever scores lower.
pub fn run_port_assignment(grid: &GridState) -> GridState {
    let mut baseline = grid.clone();
    let Some(baseline_score) = route_and_score(&mut baseline) else {
        return grid.clone();
    };

    let mut candidate = grid.clone();
    optimize_port_assignment(&mut candidate);
    match route_and_score(&mut candidate) {
        Some(candidate_score) if candidate_score.total <= baseline_score.total => candidate,
        _ => baseline,
    }
}

/// Slide every machine toward the origin by the minimum occupied coordinate,
/// preserving relative layout exactly.
pub fn translate_to_origin(grid: &GridState) -> GridState {
    let Some((min_x, min_y, _, _)) = grid.bounding_box() else {
        return grid.clone();
    };
    if min_x == 0 && min_y == 0 {
        return grid.clone();
    }
    let mut out = GridState::new(grid.width, grid.height);
    out.ids = grid.ids;
    for m in grid.machines.values() {
        out.place(Machine::new(m.id, m.machine_type, m.x - min_x, m.y - min_y, m.orientation));
    }
    out.connections = grid.connections.clone();
    out
}

/// Try to move `id` by `(dx, dy)` on a throwaway clone of `grid`, keeping the
/// move only if every connection still routes and the routed score doesn't
/// regress. Returns the updated grid (or the original, unmoved, if the move
/// doesn't help).
fn try_move(grid: GridState, id: MachineId, dx: i32, dy: i32, current_score: f64) -> (GridState, f64) {
    let Some(m) = grid.machine(id).cloned() else { return (grid, current_score) };
    let (nx, ny) = (m.x + dx, m.y + dy);
    if !grid.would_fit_excluding(id, m.machine_type, nx, ny, m.orientation) {
        return (grid, current_score);
    }
    let mut candidate = grid.clone();
    candidate.remove_machine(id);
    candidate.place(Machine::new(id, m.machine_type, nx, ny, m.orientation));
    match route_and_score(&mut candidate) {
        Some(score) if score.total <= current_score => (candidate, score.total),
        _ => (grid, current_score),
    }
}

/// Phase 4a (§4.7): repeatedly try to decrement each movable machine's x
/// then y by one tile, in machine-id order, accepting only moves that keep
/// every connection routed without a worse score. Runs until a full pass
/// makes no change or `max_passes` is reached.
pub fn compact(grid: &GridState, max_passes: u32) -> GridState {
    let Some(mut score) = route_and_score(&mut grid.clone()) else { return grid.clone() };
    let mut current = grid.clone();

    let mut ids: Vec<MachineId> = current.machines.values().filter(|m| !m.machine_type.is_anchor()).map(|m| m.id).collect();
    ids.sort_by_key(|id| id.0);

    for _ in 0..max_passes.max(1).min(30) {
        let mut changed = false;
        for &id in &ids {
            let (next, next_score) = try_move(current.clone(), id, -1, 0, score);
            if next_score < score {
                current = next;
                score = next_score;
                changed = true;
            }
            let (next, next_score) = try_move(current.clone(), id, 0, -1, score);
            if next_score < score {
                current = next;
                score = next_score;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    translate_to_origin(&current)
}

/// Phase 4b: for each movable machine, try every orientation in place and
/// keep whichever routes with the lowest score, breaking ties in favor of
/// the machine's current orientation.
pub fn run_orientation_polish(grid: &GridState) -> GridState {
    let Some(mut score) = route_and_score(&mut grid.clone()) else { return grid.clone() };
    let mut current = grid.clone();

    let mut ids: Vec<MachineId> = current.machines.values().filter(|m| !m.machine_type.is_anchor()).map(|m| m.id).collect();
    ids.sort_by_key(|id| id.0);

    for id in ids {
        let Some(m) = current.machine(id).cloned() else { continue };
        for o in Direction::ALL {
            if o == m.orientation {
                continue;
            }
            if !current.would_fit_excluding(id, m.machine_type, m.x, m.y, o) {
                continue;
            }
            let mut candidate = current.clone();
            candidate.remove_machine(id);
            candidate.place(Machine::new(id, m.machine_type, m.x, m.y, o));
            if let Some(candidate_score) = route_and_score(&mut candidate) {
                if candidate_score.total < score {
                    current = candidate;
                    score = candidate_score.total;
                }
            }
        }
    }
    current
}

/// Run Phase 3 then Phase 4 in sequence, `passes` times through the
/// compaction/polish pair (§4.7 allows iterating the pair to convergence on
/// a budget).
pub fn run_phase3_and_4(grid: &GridState, passes: u32) -> GridState {
    let mut current = run_port_assignment(grid);
    for _ in 0..passes.max(1) {
        current = compact(&current, 30);
        current = run_orientation_polish(&current);
    }
    current
}
