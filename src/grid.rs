//! The grid model: cell storage, machine placement/removal, port geometry
//! (§3, §4.1).

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;

use crate::geometry::Orientation;
use crate::ids::{ConnectionId, IdCounter, MachineId};
use crate::machine::{machine_ports, Machine, MachineType, Port};
use crate::routing::path::BeltPath;
use crate::routing::usage::TileUsage;

/// A single grid cell (§3). `Belt` holds every connection currently routed
/// through the tile — more than one only when two belts legally cross.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    Empty,
    Machine(MachineId),
    Belt(SmallVec<[ConnectionId; 2]>),
}

impl Default for Cell {
    fn default() -> Self {
        Cell::Empty
    }
}

/// The full mutable state of one layout: machines, connections, routed
/// belts, and per-tile occupancy bookkeeping (§3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridState {
    pub width: i32,
    pub height: i32,
    cells: Vec<Cell>,
    pub machines: HashMap<MachineId, Machine>,
    pub connections: HashMap<ConnectionId, crate::connection::Connection>,
    pub belt_paths: HashMap<ConnectionId, BeltPath>,
    pub tile_usage: HashMap<(i32, i32), TileUsage>,
    pub ids: IdCounter,
}

impl GridState {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::Empty; (width.max(0) * height.max(0)) as usize],
            machines: HashMap::new(),
            connections: HashMap::new(),
            belt_paths: HashMap::new(),
            tile_usage: HashMap::new(),
            ids: IdCounter::new(),
        }
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    fn index(&self, x: i32, y: i32) -> usize {
        (y * self.width + x) as usize
    }

    pub fn cell(&self, x: i32, y: i32) -> Option<&Cell> {
        if self.in_bounds(x, y) {
            Some(&self.cells[self.index(x, y)])
        } else {
            None
        }
    }

    fn cell_mut(&mut self, x: i32, y: i32) -> &mut Cell {
        let idx = self.index(x, y);
        &mut self.cells[idx]
    }

    /// Allocate a fresh machine id and place it. Returns `None` (fails) if
    /// any footprint tile is out of bounds or owned by a different machine.
    pub fn place_machine(&mut self, machine_type: MachineType, x: i32, y: i32, orientation: Orientation) -> Option<MachineId> {
        let id = self.ids.next_machine();
        let machine = Machine::new(id, machine_type, x, y, orientation);
        if self.place(machine.clone()) {
            Some(id)
        } else {
            None
        }
    }

    /// Dry-run check: would a machine of this type/pose fit without
    /// mutating the grid? Used by seed generators and repair placement to
    /// score candidate poses before committing to one.
    pub fn would_fit(&self, machine_type: MachineType, x: i32, y: i32, orientation: Orientation) -> bool {
        let (w, h) = crate::geometry::oriented_dimensions(machine_type.base_footprint(), orientation);
        let rect = crate::geometry::Rect::new(x, y, w, h);
        if !rect.within_bounds(self.width, self.height) {
            return false;
        }
        rect.cells().into_iter().all(|(cx, cy)| matches!(self.cell(cx, cy), Some(Cell::Empty)))
    }

    /// Like [`Self::would_fit`], but a footprint tile already owned by
    /// `exclude` counts as free — used to check whether a machine can move
    /// to a new pose without first removing it from the grid (§4.5, §4.7).
    pub fn would_fit_excluding(&self, exclude: MachineId, machine_type: MachineType, x: i32, y: i32, orientation: Orientation) -> bool {
        let (w, h) = crate::geometry::oriented_dimensions(machine_type.base_footprint(), orientation);
        let rect = crate::geometry::Rect::new(x, y, w, h);
        if !rect.within_bounds(self.width, self.height) {
            return false;
        }
        rect.cells().into_iter().all(|(cx, cy)| match self.cell(cx, cy) {
            Some(Cell::Empty) => true,
            Some(Cell::Machine(owner)) => *owner == exclude,
            _ => false,
        })
    }

    /// Place an already-constructed machine (used when importing layouts
    /// whose ids are fixed). Returns `false` on overlap/out-of-bounds.
    pub fn place(&mut self, machine: Machine) -> bool {
        let rect = machine.rect();
        if !rect.within_bounds(self.width, self.height) {
            return false;
        }
        for (cx, cy) in rect.cells() {
            if !matches!(self.cell(cx, cy), Some(Cell::Empty)) {
                return false;
            }
        }
        for (cx, cy) in rect.cells() {
            *self.cell_mut(cx, cy) = Cell::Machine(machine.id);
        }
        self.machines.insert(machine.id, machine);
        true
    }

    /// Remove a machine by id. Clears ownership only — belts through its
    /// former footprint are untouched (caller's responsibility, §4.1).
    pub fn remove_machine(&mut self, id: MachineId) -> bool {
        let Some(machine) = self.machines.remove(&id) else {
            return false;
        };
        for (cx, cy) in machine.rect().cells() {
            if matches!(self.cell(cx, cy), Some(Cell::Machine(owner)) if *owner == id) {
                *self.cell_mut(cx, cy) = Cell::Empty;
            }
        }
        true
    }

    /// Remove a machine and cascade-remove (and un-route) every connection
    /// attached to it.
    pub fn remove_machine_cascade(&mut self, id: MachineId) -> bool {
        if !self.machines.contains_key(&id) {
            return false;
        }
        let attached: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| c.source_machine == id || c.target_machine == id)
            .map(|c| c.id)
            .collect();
        for conn_id in attached {
            crate::routing::astar::remove_belt_path(self, conn_id);
            self.connections.remove(&conn_id);
        }
        self.remove_machine(id)
    }

    pub fn machine(&self, id: MachineId) -> Option<&Machine> {
        self.machines.get(&id)
    }

    /// Derive the input/output ports for a placed machine (§4.1 `ports`).
    pub fn ports(&self, id: MachineId) -> Option<(Vec<Port>, Vec<Port>)> {
        self.machine(id).map(machine_ports)
    }

    /// The tile one step outside a port along its approach direction (§4.1
    /// `external_tile`) — a thin, grid-level pass-through.
    pub fn external_tile(&self, port: &Port) -> (i32, i32) {
        port.external_tile()
    }

    /// Every non-empty cell's bounding rectangle, or `None` if the grid is empty.
    pub fn bounding_box(&self) -> Option<(i32, i32, i32, i32)> {
        let mut min_x = i32::MAX;
        let mut min_y = i32::MAX;
        let mut max_x = i32::MIN;
        let mut max_y = i32::MIN;
        let mut any = false;
        for y in 0..self.height {
            for x in 0..self.width {
                if !matches!(self.cell(x, y), Some(Cell::Empty)) {
                    any = true;
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }
        if any {
            Some((min_x, min_y, max_x, max_y))
        } else {
            None
        }
    }

    pub(crate) fn set_cell(&mut self, x: i32, y: i32, cell: Cell) {
        if self.in_bounds(x, y) {
            *self.cell_mut(x, y) = cell;
        }
    }

    /// Record a belt tile for `conn`, upgrading an `Empty` cell to `Belt` or
    /// joining an existing crossing.
    pub(crate) fn mark_belt(&mut self, x: i32, y: i32, conn: ConnectionId) {
        if !self.in_bounds(x, y) {
            return;
        }
        match self.cell_mut(x, y) {
            Cell::Belt(list) => {
                if !list.contains(&conn) {
                    list.push(conn);
                }
            }
            cell @ Cell::Empty => {
                let mut list = SmallVec::new();
                list.push(conn);
                *cell = Cell::Belt(list);
            }
            Cell::Machine(_) => {}
        }
    }

    /// Drop `conn` from a belt tile, reverting to `Empty` once no connection
    /// remains.
    pub(crate) fn unmark_belt(&mut self, x: i32, y: i32, conn: ConnectionId) {
        if !self.in_bounds(x, y) {
            return;
        }
        let empty = if let Cell::Belt(list) = self.cell_mut(x, y) {
            list.retain(|&c| c != conn);
            list.is_empty()
        } else {
            false
        };
        if empty {
            *self.cell_mut(x, y) = Cell::Empty;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Orientation;

    #[test]
    fn place_stamps_every_footprint_cell() {
        let mut g = GridState::new(10, 10);
        let id = g.place_machine(MachineType::Composer, 2, 2, Orientation::North).unwrap();
        for (x, y) in [(2, 2), (3, 2), (4, 2), (2, 3), (2, 4), (4, 4)] {
            assert_eq!(g.cell(x, y), Some(&Cell::Machine(id)));
        }
    }

    #[test]
    fn place_rejects_out_of_bounds() {
        let mut g = GridState::new(5, 5);
        assert!(g.place_machine(MachineType::Composer, 4, 4, Orientation::North).is_none());
    }

    #[test]
    fn place_rejects_overlap() {
        let mut g = GridState::new(10, 10);
        g.place_machine(MachineType::Composer, 0, 0, Orientation::North).unwrap();
        assert!(g.place_machine(MachineType::Composer, 1, 1, Orientation::North).is_none());
    }

    #[test]
    fn remove_clears_all_cells_and_deregisters() {
        let mut g = GridState::new(10, 10);
        let id = g.place_machine(MachineType::Composer, 0, 0, Orientation::North).unwrap();
        assert!(g.remove_machine(id));
        for (x, y) in [(0, 0), (1, 0), (2, 2)] {
            assert_eq!(g.cell(x, y), Some(&Cell::Empty));
        }
        assert!(g.machine(id).is_none());
    }

    #[test]
    fn remove_nonexistent_returns_false() {
        let mut g = GridState::new(5, 5);
        assert!(!g.remove_machine(MachineId(99)));
    }

    #[test]
    fn bounding_box_of_empty_grid_is_none() {
        let g = GridState::new(5, 5);
        assert_eq!(g.bounding_box(), None);
    }

    #[test]
    fn bounding_box_encloses_placed_machine() {
        let mut g = GridState::new(10, 10);
        g.place_machine(MachineType::Composer, 2, 3, Orientation::North).unwrap();
        assert_eq!(g.bounding_box(), Some((2, 3, 4, 5)));
    }

    #[test]
    fn clone_is_independent() {
        let mut g = GridState::new(10, 10);
        let id = g.place_machine(MachineType::Composer, 0, 0, Orientation::North).unwrap();
        let mut g2 = g.clone();
        g2.remove_machine(id);
        assert!(g.machine(id).is_some());
        assert!(g2.machine(id).is_none());
    }

    #[test]
    fn cascade_remove_clears_attached_connections() {
        use crate::connection::Connection;
        use crate::ids::ConnectionId;

        let mut g = GridState::new(10, 10);
        let a = g.place_machine(MachineType::Composer, 0, 0, Orientation::North).unwrap();
        let b = g.place_machine(MachineType::Composer, 0, 5, Orientation::South).unwrap();
        let conn = Connection {
            id: ConnectionId(0),
            source_machine: a,
            source_port: 0,
            target_machine: b,
            target_port: 0,
        };
        g.connections.insert(conn.id, conn);
        assert!(g.remove_machine_cascade(a));
        assert!(g.connections.is_empty());
        assert!(g.machine(a).is_none());
    }
}
