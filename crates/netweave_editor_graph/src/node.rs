// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor nodes: leaves wrapping one processor and aggregates grouping nodes.

use crate::handle::{NodeHandle, PortArrowHandle, PortRef, PropertyArrowHandle};
use netweave_network::{Port, PortDirection, PortId, ProcessorId};

/// A port handle on a node, with the ports it is drawn connected to
#[derive(Debug, Clone, PartialEq)]
pub struct PortHandle {
    /// Underlying port
    pub port: PortId,
    /// Processor owning the port
    pub processor: ProcessorId,
    /// Port direction
    pub direction: PortDirection,
    /// Co-processor port
    pub co_processor: bool,
    /// Counterpart ports in insertion order
    pub connections: Vec<PortRef>,
}

impl PortHandle {
    /// Create an unconnected handle for a processor port
    pub fn new(processor: ProcessorId, port: &Port) -> Self {
        Self {
            port: port.id,
            processor,
            direction: port.direction,
            co_processor: port.co_processor,
            connections: Vec::new(),
        }
    }

    /// Copy of this handle without connections
    pub fn detached(&self) -> Self {
        Self {
            connections: Vec::new(),
            ..self.clone()
        }
    }

    /// Whether this is an outport handle
    pub fn is_outport(&self) -> bool {
        self.direction == PortDirection::Output
    }
}

/// State specific to aggregates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateData {
    /// Direct children in aggregation order
    pub children: Vec<NodeHandle>,
    /// Child offsets from the aggregate position at aggregation time
    pub offsets: Vec<[f32; 2]>,
    /// Port arrows between children, hidden while aggregated
    pub internal_port_arrows: Vec<PortArrowHandle>,
    /// Property arrows between children, hidden while aggregated
    pub internal_property_arrows: Vec<PropertyArrowHandle>,
}

/// Node variant
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Wraps exactly one processor
    Leaf {
        /// Wrapped processor
        processor: ProcessorId,
    },
    /// Groups other nodes
    Aggregate(AggregateData),
}

/// A node in the editor scene
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Handle of this node
    pub handle: NodeHandle,
    /// Display name
    pub name: String,
    /// Scene position
    pub position: [f32; 2],
    /// Enclosing aggregate
    pub parent: Option<NodeHandle>,
    /// Variant data
    pub kind: NodeKind,
    /// Port handles
    pub(crate) ports: Vec<PortHandle>,
}

impl Node {
    /// Whether this node is an aggregate
    pub fn is_aggregate(&self) -> bool {
        matches!(self.kind, NodeKind::Aggregate(_))
    }

    /// Wrapped processor for leaves
    pub fn processor(&self) -> Option<ProcessorId> {
        match self.kind {
            NodeKind::Leaf { processor } => Some(processor),
            NodeKind::Aggregate(_) => None,
        }
    }

    /// Aggregate data for aggregates
    pub fn aggregate(&self) -> Option<&AggregateData> {
        match &self.kind {
            NodeKind::Aggregate(data) => Some(data),
            NodeKind::Leaf { .. } => None,
        }
    }

    pub(crate) fn aggregate_mut(&mut self) -> Option<&mut AggregateData> {
        match &mut self.kind {
            NodeKind::Aggregate(data) => Some(data),
            NodeKind::Leaf { .. } => None,
        }
    }

    /// Direct children; empty for leaves
    pub fn children(&self) -> &[NodeHandle] {
        self.aggregate().map_or(&[], |a| a.children.as_slice())
    }

    /// All port handles
    pub fn ports(&self) -> &[PortHandle] {
        &self.ports
    }

    /// Get a port handle
    pub fn port(&self, port: PortId) -> Option<&PortHandle> {
        self.ports.iter().find(|p| p.port == port)
    }

    pub(crate) fn port_mut(&mut self, port: PortId) -> Option<&mut PortHandle> {
        self.ports.iter_mut().find(|p| p.port == port)
    }

    /// Whether the node shows this port
    pub fn has_port(&self, port: PortId) -> bool {
        self.port(port).is_some()
    }

    /// Regular data inports
    pub fn inports(&self) -> impl Iterator<Item = &PortHandle> {
        self.ports.iter().filter(|p| !p.is_outport() && !p.co_processor)
    }

    /// Regular data outports
    pub fn outports(&self) -> impl Iterator<Item = &PortHandle> {
        self.ports.iter().filter(|p| p.is_outport() && !p.co_processor)
    }

    /// Co-processor inports
    pub fn co_processor_inports(&self) -> impl Iterator<Item = &PortHandle> {
        self.ports.iter().filter(|p| !p.is_outport() && p.co_processor)
    }

    /// Co-processor outports
    pub fn co_processor_outports(&self) -> impl Iterator<Item = &PortHandle> {
        self.ports.iter().filter(|p| p.is_outport() && p.co_processor)
    }
}
