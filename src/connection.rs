//! Connections between machine ports (§3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ConnectError;
use crate::ids::{ConnectionId, MachineId};
use crate::machine::PortRole;

/// A directed connection from one machine's output port to another's input port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub source_machine: MachineId,
    pub source_port: usize,
    pub target_machine: MachineId,
    pub target_port: usize,
}

/// Tracks which (machine, port-index, role) pairs are already in use, so a
/// given port appears in at most one connection (§3 invariant).
#[derive(Clone, Debug, Default)]
pub struct PortUsage {
    used: HashMap<(MachineId, usize, PortRoleKey), ConnectionId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum PortRoleKey {
    Input,
    Output,
}

impl From<PortRole> for PortRoleKey {
    fn from(r: PortRole) -> Self {
        match r {
            PortRole::Input => PortRoleKey::Input,
            PortRole::Output => PortRoleKey::Output,
        }
    }
}

impl PortUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_used(&self, machine: MachineId, port: usize, role: PortRole) -> bool {
        self.used.contains_key(&(machine, port, role.into()))
    }

    pub fn owner(&self, machine: MachineId, port: usize, role: PortRole) -> Option<ConnectionId> {
        self.used.get(&(machine, port, role.into())).copied()
    }

    fn mark(&mut self, machine: MachineId, port: usize, role: PortRole, conn: ConnectionId) {
        self.used.insert((machine, port, role.into()), conn);
    }

    fn unmark(&mut self, machine: MachineId, port: usize, role: PortRole) {
        self.used.remove(&(machine, port, role.into()));
    }

    /// Validate and register a connection's ports, rejecting reuse or self-loops.
    pub fn try_add(&mut self, conn: Connection) -> Result<(), ConnectError> {
        if conn.source_machine == conn.target_machine {
            return Err(ConnectError::SelfConnection(conn.source_machine));
        }
        if let Some(owner) = self.owner(conn.source_machine, conn.source_port, PortRole::Output) {
            return Err(ConnectError::OutputPortTaken(conn.source_machine, conn.source_port, owner));
        }
        if let Some(owner) = self.owner(conn.target_machine, conn.target_port, PortRole::Input) {
            return Err(ConnectError::InputPortTaken(conn.target_machine, conn.target_port, owner));
        }
        self.mark(conn.source_machine, conn.source_port, PortRole::Output, conn.id);
        self.mark(conn.target_machine, conn.target_port, PortRole::Input, conn.id);
        Ok(())
    }

    pub fn remove(&mut self, conn: &Connection) {
        self.unmark(conn.source_machine, conn.source_port, PortRole::Output);
        self.unmark(conn.target_machine, conn.target_port, PortRole::Input);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(id: u32, src: u32, sp: usize, tgt: u32, tp: usize) -> Connection {
        Connection {
            id: ConnectionId(id),
            source_machine: MachineId(src),
            source_port: sp,
            target_machine: MachineId(tgt),
            target_port: tp,
        }
    }

    #[test]
    fn rejects_self_connection() {
        let mut usage = PortUsage::new();
        let err = usage.try_add(conn(0, 5, 0, 5, 0)).unwrap_err();
        assert_eq!(err, ConnectError::SelfConnection(MachineId(5)));
    }

    #[test]
    fn rejects_reused_output_port() {
        let mut usage = PortUsage::new();
        usage.try_add(conn(0, 1, 0, 2, 0)).unwrap();
        let err = usage.try_add(conn(1, 1, 0, 3, 0)).unwrap_err();
        assert_eq!(err, ConnectError::OutputPortTaken(MachineId(1), 0, ConnectionId(0)));
    }

    #[test]
    fn rejects_reused_input_port() {
        let mut usage = PortUsage::new();
        usage.try_add(conn(0, 1, 0, 2, 0)).unwrap();
        let err = usage.try_add(conn(1, 3, 0, 2, 0)).unwrap_err();
        assert_eq!(err, ConnectError::InputPortTaken(MachineId(2), 0, ConnectionId(0)));
    }

    #[test]
    fn remove_frees_ports_for_reuse() {
        let mut usage = PortUsage::new();
        let c = conn(0, 1, 0, 2, 0);
        usage.try_add(c).unwrap();
        usage.remove(&c);
        assert!(usage.try_add(conn(1, 1, 0, 2, 0)).is_ok());
    }

    #[test]
    fn distinct_ports_on_same_machine_are_independent() {
        let mut usage = PortUsage::new();
        usage.try_add(conn(0, 1, 0, 2, 0)).unwrap();
        assert!(usage.try_add(conn(1, 1, 1, 2, 1)).is_ok());
    }
}
