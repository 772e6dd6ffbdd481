// SPDX-License-Identifier: MIT OR Apache-2.0
//! Arrow variants drawn between nodes.

use crate::handle::{NodeHandle, PortArrowHandle, PortRef, PropertyArrowHandle, PropertyEndpoint};
use netweave_network::{LinkEvaluator, PropertyLinkId};

/// Visual representation of one committed port connection
#[derive(Debug, Clone, PartialEq)]
pub struct PortArrow {
    /// Handle of this arrow
    pub handle: PortArrowHandle,
    /// Outport end
    pub source: PortRef,
    /// Inport end
    pub destination: PortRef,
    /// Aggregate hiding this arrow, if any
    pub hidden_in: Option<NodeHandle>,
}

impl PortArrow {
    /// Whether the arrow is shown at top level
    pub fn is_visible(&self) -> bool {
        self.hidden_in.is_none()
    }

    /// Whether either end sits on `node`
    pub fn touches(&self, node: NodeHandle) -> bool {
        self.source.node == node || self.destination.node == node
    }
}

/// Visual representation of one or two property links between the same properties
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyArrow {
    /// Handle of this arrow
    pub handle: PropertyArrowHandle,
    /// Source of the primary link
    pub source: PropertyEndpoint,
    /// Destination of the primary link
    pub destination: PropertyEndpoint,
    /// Primary link
    pub forward: PropertyLinkId,
    /// Evaluator of the primary link
    pub evaluator: LinkEvaluator,
    /// Link in the opposite direction and its evaluator, if any
    pub reverse: Option<(PropertyLinkId, LinkEvaluator)>,
    /// Arrowhead at the source end, set while a reverse link is attached
    pub source_arrowhead: bool,
    /// Aggregate hiding this arrow, if any
    pub hidden_in: Option<NodeHandle>,
}

impl PropertyArrow {
    /// Whether the arrow carries links in both directions
    pub fn is_bidirectional(&self) -> bool {
        self.reverse.is_some()
    }

    /// Underlying links, primary first
    pub fn links(&self) -> impl Iterator<Item = PropertyLinkId> {
        std::iter::once(self.forward).chain(self.reverse.map(|(id, _)| id))
    }

    /// Whether the arrow is shown at top level
    pub fn is_visible(&self) -> bool {
        self.hidden_in.is_none()
    }
}

/// Where a provisional arrow starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StubOrigin {
    /// Dragging a new port connection
    Port(PortRef),
    /// Dragging a new property link between nodes
    Node(NodeHandle),
}

/// Provisional arrow following the pointer during a drag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkStub {
    /// Start of the drag
    pub origin: StubOrigin,
    /// Current free end
    pub tip: [f32; 2],
}

/// Arrow as handed to a renderer
#[derive(Debug, Clone, Copy)]
pub enum ArrowKind<'a> {
    /// Port connection
    PortArrow(&'a PortArrow),
    /// Property link(s)
    PropertyArrow(&'a PropertyArrow),
    /// Uncommitted drag arrow
    LinkStub(&'a LinkStub),
}
