//! Machine types, placed machines, and port derivation (§3, §4.1).

use serde::{Deserialize, Serialize};

use crate::geometry::{manhattan, oriented_dimensions, Direction, Orientation, Rect};
use crate::ids::MachineId;

/// A fixed-footprint machine variant. Named in the teacher's abstract,
/// geometric register rather than spelled out as raw dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MachineType {
    /// 3x3 general-purpose machine.
    Composer,
    /// 5x5 machine.
    Lattice,
    /// 6x4 machine.
    Manifold,
    /// 3x1 immovable anchor: single output, no inputs.
    Beacon,
}

impl MachineType {
    pub const ALL: [MachineType; 4] = [
        MachineType::Composer,
        MachineType::Lattice,
        MachineType::Manifold,
        MachineType::Beacon,
    ];

    /// Base footprint (w, h), defined facing North.
    pub fn base_footprint(self) -> (i32, i32) {
        match self {
            Self::Composer => (3, 3),
            Self::Lattice => (5, 5),
            Self::Manifold => (6, 4),
            Self::Beacon => (3, 1),
        }
    }

    /// Anchors are pinned: position and orientation never change.
    pub fn is_anchor(self) -> bool {
        matches!(self, Self::Beacon)
    }

    /// Number of output ports on the output face.
    pub fn output_port_count(self) -> usize {
        match self {
            Self::Beacon => 1,
            other => oriented_dimensions(other.base_footprint(), Orientation::North).0 as usize,
        }
    }

    /// Number of input ports on the input face. Anchors have none.
    pub fn input_port_count(self) -> usize {
        match self {
            Self::Beacon => 0,
            other => oriented_dimensions(other.base_footprint(), Orientation::North).0 as usize,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Composer => "Composer",
            Self::Lattice => "Lattice",
            Self::Manifold => "Manifold",
            Self::Beacon => "Beacon",
        }
    }
}

/// A placed machine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    pub machine_type: MachineType,
    /// Top-left grid position of the oriented footprint.
    pub x: i32,
    pub y: i32,
    pub orientation: Orientation,
}

impl Machine {
    pub fn new(id: MachineId, machine_type: MachineType, x: i32, y: i32, orientation: Orientation) -> Self {
        Self { id, machine_type, x, y, orientation }
    }

    /// The oriented footprint rectangle this machine occupies.
    pub fn rect(&self) -> Rect {
        let (w, h) = oriented_dimensions(self.machine_type.base_footprint(), self.orientation);
        Rect::new(self.x, self.y, w, h)
    }

    /// The face a machine's orientation points at — its input face (the face
    /// belts feed items into). Output is the opposite face.
    pub fn input_face(&self) -> Direction {
        self.orientation
    }

    pub fn output_face(&self) -> Direction {
        self.orientation.opposite()
    }
}

/// Whether a port accepts (Input) or produces (Output) items.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortRole {
    Input,
    Output,
}

/// A derived port on a placed machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Port {
    pub machine_id: MachineId,
    pub role: PortRole,
    pub index: usize,
    /// Absolute grid position of the port's cell (on the machine's boundary).
    pub x: i32,
    pub y: i32,
    /// Direction a belt must arrive from (inputs) or leave in (outputs).
    pub approach: Direction,
}

impl Port {
    /// The tile one step outside this port along its approach direction —
    /// the belt start/end tile (§4.1 `external_tile`).
    pub fn external_tile(&self) -> (i32, i32) {
        let (dx, dy) = self.approach.offset();
        match self.role {
            // Inputs: the belt arrives FROM `approach`, so the external tile
            // is one step further along `approach` away from the port.
            PortRole::Input => (self.x + dx, self.y + dy),
            // Outputs: the belt leaves traveling `approach`, so the external
            // tile is one step along `approach` out from the port.
            PortRole::Output => (self.x + dx, self.y + dy),
        }
    }
}

/// Evenly distribute `n` port positions along a span of length `span`, using
/// `round(i * (span - 1) / (n - 1))` for n >= 2, centered for n == 1.
fn port_offsets(n: usize, span: i32) -> Vec<i32> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![span / 2];
    }
    (0..n)
        .map(|i| {
            let numer = (i as i64) * (span as i64 - 1);
            let denom = (n - 1) as i64;
            // round-half-up on a nonnegative ratio
            ((numer * 2 + denom) / (denom * 2)) as i32
        })
        .collect()
}

/// Derive every input and output port for a placed machine (§4.1 `ports`).
pub fn machine_ports(m: &Machine) -> (Vec<Port>, Vec<Port>) {
    let rect = m.rect();

    if m.machine_type.is_anchor() {
        let face = m.output_face();
        let (px, py) = face_center(&rect, face);
        let output = Port {
            machine_id: m.id,
            role: PortRole::Output,
            index: 0,
            x: px,
            y: py,
            approach: face,
        };
        return (Vec::new(), vec![output]);
    }

    let input_face = m.input_face();
    let output_face = m.output_face();
    let inputs = face_ports(&rect, input_face, m.id, PortRole::Input, m.machine_type.input_port_count());
    let outputs = face_ports(&rect, output_face, m.id, PortRole::Output, m.machine_type.output_port_count());
    (inputs, outputs)
}

/// Positions for `count` ports evenly spread along `face` of `rect`.
fn face_ports(rect: &Rect, face: Direction, machine_id: MachineId, role: PortRole, count: usize) -> Vec<Port> {
    let span = match face {
        Direction::North | Direction::South => rect.w,
        Direction::East | Direction::West => rect.h,
    };
    let offsets = port_offsets(count, span);
    offsets
        .into_iter()
        .enumerate()
        .map(|(index, offset)| {
            let (x, y) = match face {
                Direction::North => (rect.x + offset, rect.y),
                Direction::South => (rect.x + offset, rect.y + rect.h - 1),
                Direction::West => (rect.x, rect.y + offset),
                Direction::East => (rect.x + rect.w - 1, rect.y + offset),
            };
            Port { machine_id, role, index, x, y, approach: face }
        })
        .collect()
}

/// The single centered cell on `face` of `rect` (used for anchor machines).
fn face_center(rect: &Rect, face: Direction) -> (i32, i32) {
    match face {
        Direction::North => (rect.x + rect.w / 2, rect.y),
        Direction::South => (rect.x + rect.w / 2, rect.y + rect.h - 1),
        Direction::West => (rect.x, rect.y + rect.h / 2),
        Direction::East => (rect.x + rect.w - 1, rect.y + rect.h / 2),
    }
}

/// Sum of Manhattan belt cost (external-tile to external-tile) for a port
/// against a fixed set of opposing port positions — used by several move
/// operators to score a candidate placement without routing.
pub fn manhattan_cost_to(port: &Port, targets: &[(i32, i32)]) -> i32 {
    let from = port.external_tile();
    targets.iter().map(|&t| manhattan(from, t)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(mt: MachineType, x: i32, y: i32, o: Orientation) -> Machine {
        Machine::new(MachineId(0), mt, x, y, o)
    }

    #[test]
    fn base_footprints_match_spec() {
        assert_eq!(MachineType::Composer.base_footprint(), (3, 3));
        assert_eq!(MachineType::Lattice.base_footprint(), (5, 5));
        assert_eq!(MachineType::Manifold.base_footprint(), (6, 4));
        assert_eq!(MachineType::Beacon.base_footprint(), (3, 1));
    }

    #[test]
    fn east_west_orientation_swaps_rect_dims() {
        let m = make(MachineType::Manifold, 0, 0, Orientation::East);
        let r = m.rect();
        assert_eq!((r.w, r.h), (4, 6));
    }

    #[test]
    fn anchor_has_single_output_no_inputs() {
        let m = make(MachineType::Beacon, 2, 2, Orientation::North);
        let (inputs, outputs) = machine_ports(&m);
        assert_eq!(inputs.len(), 0);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].role, PortRole::Output);
    }

    #[test]
    fn anchor_output_faces_orientation_opposite() {
        let m = make(MachineType::Beacon, 0, 0, Orientation::North);
        let (_, outputs) = machine_ports(&m);
        // orientation North means output_face = South
        assert_eq!(outputs[0].approach, Direction::South);
    }

    #[test]
    fn regular_machine_one_port_per_face_tile() {
        let m = make(MachineType::Composer, 0, 0, Orientation::North);
        let (inputs, outputs) = machine_ports(&m);
        assert_eq!(inputs.len(), 3);
        assert_eq!(outputs.len(), 3);
    }

    #[test]
    fn input_face_matches_orientation() {
        let m = make(MachineType::Composer, 0, 0, Orientation::East);
        let (inputs, _) = machine_ports(&m);
        for p in &inputs {
            assert_eq!(p.approach, Direction::East);
        }
    }

    #[test]
    fn port_offsets_single_port_centered() {
        assert_eq!(port_offsets(1, 5), vec![2]);
    }

    #[test]
    fn port_offsets_evenly_distributed() {
        // n=3, span=5: round(i*(5-1)/(3-1)) = round(i*2) = 0, 2, 4
        assert_eq!(port_offsets(3, 5), vec![0, 2, 4]);
    }

    #[test]
    fn port_offsets_two_ports_at_ends() {
        assert_eq!(port_offsets(2, 4), vec![0, 3]);
    }

    #[test]
    fn external_tile_one_step_along_approach() {
        let m = make(MachineType::Composer, 0, 0, Orientation::North);
        let (inputs, _) = machine_ports(&m);
        // input face is North; approach North means belt arrives from the
        // tile one step further north.
        let p = &inputs[0];
        assert_eq!(p.external_tile(), (p.x, p.y - 1));
    }

    #[test]
    fn rect_within_grid_invariant_holds_for_all_orientations() {
        for o in Direction::ALL {
            let m = make(MachineType::Manifold, 0, 0, o);
            assert!(m.rect().within_bounds(100, 100));
        }
    }
}
