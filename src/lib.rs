//! Turn-penalized A* belt routing plus a multi-phase simulated-annealing
//! layout optimizer for fixed-footprint machines on a grid (§1, §2).
//!
//! The crate is organized the way the spec's modules are named: [`grid`] and
//! [`machine`] hold the data model, [`routing`] the pathfinder, [`sa`] and
//! [`polish`] the optimizer's phases, [`optimizer`] and [`deep`] the
//! orchestration layer, and [`io`] the layout exchange codec.

pub mod config;
pub mod connection;
pub mod deep;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod ids;
pub mod io;
pub mod machine;
pub mod optimizer;
pub mod polish;
pub mod rng;
pub mod routing;
pub mod sa;
pub mod scoring;
pub mod seeds;

pub use config::{OptimizerConfig, OptimizerMode};
pub use connection::Connection;
pub use deep::{DeepSearchLoop, DeepSearchState};
pub use error::{ConnectError, ImportError, PlacementError};
pub use geometry::Orientation;
pub use grid::GridState;
pub use ids::{ConnectionId, MachineId};
pub use machine::{machine_ports, Machine, MachineType, Port, PortRole};
pub use optimizer::{run_optimizer, run_optimizer_with_stop, OptimizerResult};
pub use routing::{apply_belt_path, find_belt_path, remove_belt_path};
pub use scoring::{evaluate_grid, Score};

/// Construct an empty `width`×`height` grid (§6 `create_grid`).
pub fn create_grid(width: i32, height: i32) -> GridState {
    GridState::new(width, height)
}

/// Place an already-constructed machine onto `grid` (§6 `place_machine`).
/// Returns `false` on overlap or out-of-bounds; the caller decides what to
/// do next (§7 — placement failure is a boolean, not an error type).
pub fn place_machine(grid: &mut GridState, machine: Machine) -> bool {
    grid.place(machine)
}

/// Remove a machine and un-route every connection attached to it (§6
/// `remove_machine`).
pub fn remove_machine(grid: &mut GridState, id: MachineId) -> bool {
    grid.remove_machine_cascade(id)
}

/// Derive a placed machine's input and output ports (§6 `get_machine_ports`).
pub fn get_machine_ports(machine: &Machine) -> (Vec<Port>, Vec<Port>) {
    machine_ports(machine)
}
