// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connections carry data from an outport to an inport.

use crate::port::PortId;
use crate::processor::ProcessorId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a connection within its network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Fresh random ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Data flow from one processor's outport into another processor's inport.
///
/// Each inport accepts at most one connection unless it is a multi-port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    /// Processor owning the outport
    pub from_processor: ProcessorId,
    /// Outport the data leaves through
    pub from_port: PortId,
    /// Processor owning the inport
    pub to_processor: ProcessorId,
    /// Inport the data arrives at
    pub to_port: PortId,
}

impl Connection {
    /// Connection with a fresh ID; port compatibility is checked by the network
    pub fn new(
        from_processor: ProcessorId,
        from_port: PortId,
        to_processor: ProcessorId,
        to_port: PortId,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            from_processor,
            from_port,
            to_processor,
            to_port,
        }
    }

    /// Whether the processor owns either the outport or the inport
    pub fn involves_processor(&self, processor_id: ProcessorId) -> bool {
        self.from_processor == processor_id || self.to_processor == processor_id
    }

    /// Whether `port_id` is the outport or the inport
    pub fn involves_port(&self, port_id: PortId) -> bool {
        self.from_port == port_id || self.to_port == port_id
    }

    /// Whether this connection runs from `outport` into `inport`
    pub fn joins(&self, outport: PortId, inport: PortId) -> bool {
        self.from_port == outport && self.to_port == inport
    }
}
