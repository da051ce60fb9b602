//! Stable identifiers for machines and connections.
//!
//! Per §9, id generation is scoped to a single [`crate::grid::GridState`]
//! instance rather than a process-global counter, so two grids built the same
//! way produce the same ids and tests stay reproducible.

use serde::{Deserialize, Serialize};

/// Identifies a placed machine within one grid. Stable across clone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MachineId(pub u32);

/// Identifies a connection within one grid. Stable across clone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u32);

/// Monotonic id counter, scoped to one grid instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdCounter(u32);

impl IdCounter {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn next_machine(&mut self) -> MachineId {
        let id = MachineId(self.0);
        self.0 += 1;
        id
    }

    pub fn next_connection(&mut self) -> ConnectionId {
        let id = ConnectionId(self.0);
        self.0 += 1;
        id
    }

    /// A counter that will not reissue any id `<= max_id` — used when
    /// importing a layout document whose ids are already fixed (§6).
    pub fn starting_after(max_id: u32) -> Self {
        Self(max_id.wrapping_add(1))
    }
}
