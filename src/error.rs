//! Per-domain error types (§4.9, §7). Kept off the optimizer's hot path —
//! internal placement attempts return `bool`/`Option`, these are only
//! raised when building a grid from external input.

use thiserror::Error;

use crate::ids::{ConnectionId, MachineId};

/// Failure constructing machine placements from external input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlacementError {
    #[error("machine {0:?} footprint does not fit within the {1}x{2} grid")]
    OutOfBounds(MachineId, i32, i32),
    #[error("machine {0:?} overlaps machine {1:?}")]
    Overlap(MachineId, MachineId),
}

/// Failure building a connection set from external input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectError {
    #[error("machine {0:?} output port {1} is already used by connection {2:?}")]
    OutputPortTaken(MachineId, usize, ConnectionId),
    #[error("machine {0:?} input port {1} is already used by connection {2:?}")]
    InputPortTaken(MachineId, usize, ConnectionId),
    #[error("machine {0:?} port index {1} out of range for its footprint")]
    PortOutOfRange(MachineId, usize),
    #[error("connection from machine {0:?} to itself is not permitted")]
    SelfConnection(MachineId),
    #[error("unknown machine id {0:?}")]
    UnknownMachine(MachineId),
}

/// Failure decoding a layout exchange document (§6).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImportError {
    #[error("unsupported layout format version {0}")]
    UnsupportedVersion(u32),
    #[error("unknown machine type tag {0:?}")]
    UnknownMachineType(String),
    #[error("malformed entry: {0}")]
    Malformed(String),
    #[error("placement rejected: {0}")]
    Placement(#[from] PlacementError),
    #[error("connection rejected: {0}")]
    Connect(#[from] ConnectError),
}
