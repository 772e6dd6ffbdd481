// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node arena and port arrows of the editor scene.

use crate::aggregation::AggregationRecord;
use crate::arrow::PortArrow;
use crate::bundle::ArrowGeometry;
use crate::handle::{HandleAllocator, NodeHandle, PortArrowHandle, PortRef, PropertyArrowHandle};
use crate::link_registry::{ArrowEnd, PropertyLinkRegistry, RegistryError, Unregistered};
use crate::node::{Node, NodeKind, PortHandle};
use indexmap::{IndexMap, IndexSet};
use netweave_network::{Connection, PortId, Processor, ProcessorId, PropertyLink, PropertyLinkId};
use std::collections::HashMap;

/// Where a new arrow between two leaves is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Placement {
    pub(crate) source: NodeHandle,
    pub(crate) destination: NodeHandle,
    pub(crate) hidden_in: Option<NodeHandle>,
}

/// Visual graph mirroring a processor network
#[derive(Debug, Default)]
pub struct EditorGraph {
    /// All live nodes, nested ones included
    pub(crate) nodes: IndexMap<NodeHandle, Node>,
    /// Nodes shown at top level
    pub(crate) top_level: IndexSet<NodeHandle>,
    /// Leaf of each processor
    pub(crate) leaves: HashMap<ProcessorId, NodeHandle>,
    pub(crate) port_arrows: IndexMap<PortArrowHandle, PortArrow>,
    pub(crate) links: PropertyLinkRegistry,
    /// Top-level aggregation records
    pub(crate) records: Vec<AggregationRecord>,
    pub(crate) node_ids: HandleAllocator,
    arrow_ids: HandleAllocator,
}

impl EditorGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // nodes
    // ------------------------------------------------------------------

    /// Add a top-level leaf for a processor, placed at its stored position
    pub fn add_leaf(&mut self, processor: &Processor) -> Result<NodeHandle, GraphError> {
        if self.leaves.contains_key(&processor.id) {
            return Err(GraphError::InvalidOperation(format!(
                "processor '{}' already has a node",
                processor.name
            )));
        }
        let position = match processor.position() {
            Ok(Some(p)) => p.to_point(),
            Ok(None) => [0.0, 0.0],
            Err(e) => {
                tracing::warn!("Ignoring position of '{}': {e}", processor.name);
                [0.0, 0.0]
            }
        };

        let handle = NodeHandle(self.node_ids.next());
        let node = Node {
            handle,
            name: processor.name.clone(),
            position,
            parent: None,
            kind: NodeKind::Leaf {
                processor: processor.id,
            },
            ports: processor
                .ports
                .iter()
                .map(|p| PortHandle::new(processor.id, p))
                .collect(),
        };
        self.nodes.insert(handle, node);
        self.top_level.insert(handle);
        self.leaves.insert(processor.id, handle);
        Ok(handle)
    }

    /// Remove the leaf of a processor.
    ///
    /// The processor's ports disappear from every enclosing aggregate, and
    /// aggregates left without children are removed as well. Returns every
    /// removed node, the leaf first.
    pub fn remove_leaf(&mut self, processor: ProcessorId) -> Result<Vec<NodeHandle>, GraphError> {
        let leaf = self.leaf(processor).ok_or(GraphError::ProcessorNotFound(processor))?;

        // Arrows normally go away with the network's own removal events
        let stale: Vec<PortArrowHandle> = self
            .port_arrows
            .values()
            .filter(|a| self.port_owner(a.source) == Some(processor) || self.port_owner(a.destination) == Some(processor))
            .map(|a| a.handle)
            .collect();
        for handle in stale {
            self.remove_port_arrow(handle)?;
        }
        let stale_links: Vec<PropertyLinkId> = self
            .links
            .arrows()
            .filter(|a| {
                a.source.property.processor == processor || a.destination.property.processor == processor
            })
            .flat_map(|a| a.links())
            .collect();
        for link in stale_links {
            self.remove_property_arrow_link(link);
        }

        for ancestor in self.ancestors(leaf) {
            if let Some(node) = self.nodes.get_mut(&ancestor) {
                node.ports.retain(|p| p.processor != processor);
            }
        }

        let mut removed = Vec::new();
        let mut current = leaf;
        while let Some(node) = self.nodes.shift_remove(&current) {
            self.top_level.shift_remove(&current);
            removed.push(current);
            let Some(parent) = node.parent else {
                break;
            };
            let Some(data) = self.nodes.get_mut(&parent).and_then(Node::aggregate_mut) else {
                break;
            };
            if let Some(i) = data.children.iter().position(|c| *c == current) {
                data.children.remove(i);
                if i < data.offsets.len() {
                    data.offsets.remove(i);
                }
            }
            if !data.children.is_empty() {
                break;
            }
            current = parent;
        }

        self.leaves.remove(&processor);
        AggregationRecord::strip(&mut self.records, processor);
        Ok(removed)
    }

    /// Set a node's display name; aggregates also update their record
    pub fn rename_node(&mut self, handle: NodeHandle, name: &str) -> Result<(), GraphError> {
        let processors = self.processors(handle);
        let node = self.nodes.get_mut(&handle).ok_or(GraphError::NodeNotFound(handle))?;
        node.name = name.to_string();
        if node.is_aggregate() {
            if let Some(record) = AggregationRecord::find_mut(&mut self.records, &processors) {
                record.name = name.to_string();
            }
        }
        Ok(())
    }

    /// Move a node; aggregates also update their record
    pub fn set_node_position(&mut self, handle: NodeHandle, position: [f32; 2]) -> Result<(), GraphError> {
        let processors = self.processors(handle);
        let node = self.nodes.get_mut(&handle).ok_or(GraphError::NodeNotFound(handle))?;
        node.position = position;
        if node.is_aggregate() {
            if let Some(record) = AggregationRecord::find_mut(&mut self.records, &processors) {
                record.position = [position[0].round() as i32, position[1].round() as i32];
            }
        }
        Ok(())
    }

    /// Get a node
    pub fn node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(&handle)
    }

    /// All live nodes, nested ones included
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Nodes shown at top level
    pub fn top_level_nodes(&self) -> impl Iterator<Item = &Node> {
        self.top_level.iter().filter_map(|h| self.nodes.get(h))
    }

    /// Handles of the top-level nodes
    pub fn top_level_handles(&self) -> Vec<NodeHandle> {
        self.top_level.iter().copied().collect()
    }

    /// Whether a node is shown at top level
    pub fn is_top_level(&self, handle: NodeHandle) -> bool {
        self.top_level.contains(&handle)
    }

    /// Number of live nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Leaf wrapping a processor
    pub fn leaf(&self, processor: ProcessorId) -> Option<NodeHandle> {
        self.leaves.get(&processor).copied()
    }

    /// Top-level node containing a processor
    pub fn outermost(&self, processor: ProcessorId) -> Option<NodeHandle> {
        self.leaf(processor).and_then(|leaf| self.chain(leaf).last().copied())
    }

    /// Enclosing aggregates, innermost first
    pub fn ancestors(&self, handle: NodeHandle) -> Vec<NodeHandle> {
        let mut chain = self.chain(handle);
        chain.remove(0);
        chain
    }

    /// Processors of a node in child order, flattened recursively
    pub fn processors(&self, handle: NodeHandle) -> Vec<ProcessorId> {
        let mut out = Vec::new();
        self.collect_processors(handle, &mut out);
        out
    }

    fn collect_processors(&self, handle: NodeHandle, out: &mut Vec<ProcessorId>) {
        let Some(node) = self.nodes.get(&handle) else {
            return;
        };
        match &node.kind {
            NodeKind::Leaf { processor } => out.push(*processor),
            NodeKind::Aggregate(data) => {
                for child in &data.children {
                    self.collect_processors(*child, out);
                }
            }
        }
    }

    /// Whether `processor` is inside `handle` (or is wrapped by it)
    pub fn contains_processor(&self, handle: NodeHandle, processor: ProcessorId) -> bool {
        self.leaf(processor)
            .is_some_and(|leaf| self.chain(leaf).contains(&handle))
    }

    pub(crate) fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(&handle)
    }

    /// `handle` followed by its ancestors
    fn chain(&self, handle: NodeHandle) -> Vec<NodeHandle> {
        let mut chain = vec![handle];
        let mut current = handle;
        while let Some(parent) = self.nodes.get(&current).and_then(|n| n.parent) {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Lowest common aggregate of two leaves decides where their arrow lives
    pub(crate) fn place(&self, a: NodeHandle, b: NodeHandle) -> Placement {
        if a == b {
            return Placement {
                source: a,
                destination: a,
                hidden_in: self.nodes.get(&a).and_then(|n| n.parent),
            };
        }
        let chain_a = self.chain(a);
        let chain_b = self.chain(b);
        for (i, x) in chain_a.iter().enumerate() {
            if let Some(j) = chain_b.iter().position(|y| y == x) {
                return Placement {
                    source: chain_a[i.saturating_sub(1)],
                    destination: chain_b[j.saturating_sub(1)],
                    hidden_in: Some(*x),
                };
            }
        }
        Placement {
            source: chain_a.last().copied().unwrap_or(a),
            destination: chain_b.last().copied().unwrap_or(b),
            hidden_in: None,
        }
    }

    fn port_owner(&self, port: PortRef) -> Option<ProcessorId> {
        self.nodes.get(&port.node)?.port(port.port).map(|p| p.processor)
    }

    // ------------------------------------------------------------------
    // port arrows
    // ------------------------------------------------------------------

    /// Add the arrow for a new network connection
    pub fn add_port_arrow(&mut self, connection: &Connection) -> Result<PortArrowHandle, GraphError> {
        let from = self
            .leaf(connection.from_processor)
            .ok_or(GraphError::ProcessorNotFound(connection.from_processor))?;
        let to = self
            .leaf(connection.to_processor)
            .ok_or(GraphError::ProcessorNotFound(connection.to_processor))?;
        if let Some(existing) = self.find_port_arrow(connection.from_port, connection.to_port) {
            return Err(GraphError::InvalidOperation(format!(
                "connection already shown by {existing}"
            )));
        }

        let placement = self.place(from, to);
        let handle = PortArrowHandle(self.arrow_ids.next());
        let source = PortRef::new(placement.source, connection.from_port);
        let destination = PortRef::new(placement.destination, connection.to_port);
        self.push_connection(source, destination);
        self.push_connection(destination, source);
        if let Some(data) = placement
            .hidden_in
            .and_then(|h| self.nodes.get_mut(&h))
            .and_then(Node::aggregate_mut)
        {
            data.internal_port_arrows.push(handle);
        }
        self.port_arrows.insert(
            handle,
            PortArrow {
                handle,
                source,
                destination,
                hidden_in: placement.hidden_in,
            },
        );
        Ok(handle)
    }

    /// Remove a port arrow and its connection-list entries
    pub fn remove_port_arrow(&mut self, handle: PortArrowHandle) -> Result<PortArrow, GraphError> {
        let arrow = self
            .port_arrows
            .shift_remove(&handle)
            .ok_or(GraphError::PortArrowNotFound(handle))?;
        self.drop_connection(arrow.source, arrow.destination);
        self.drop_connection(arrow.destination, arrow.source);
        if let Some(data) = arrow
            .hidden_in
            .and_then(|h| self.nodes.get_mut(&h))
            .and_then(Node::aggregate_mut)
        {
            data.internal_port_arrows.retain(|h| *h != handle);
        }
        Ok(arrow)
    }

    /// Arrow showing the connection from `outport` to `inport`
    pub fn find_port_arrow(&self, outport: PortId, inport: PortId) -> Option<PortArrowHandle> {
        self.port_arrows
            .values()
            .find(|a| a.source.port == outport && a.destination.port == inport)
            .map(|a| a.handle)
    }

    /// Get a port arrow
    pub fn port_arrow(&self, handle: PortArrowHandle) -> Option<&PortArrow> {
        self.port_arrows.get(&handle)
    }

    /// All port arrows
    pub fn port_arrows(&self) -> impl Iterator<Item = &PortArrow> {
        self.port_arrows.values()
    }

    /// Port arrows shown at top level
    pub fn visible_port_arrows(&self) -> impl Iterator<Item = &PortArrow> {
        self.port_arrows.values().filter(|a| a.is_visible())
    }

    /// Move one end of a port arrow to another node showing the same port.
    ///
    /// The counterpart's connection list is rewritten in place, so its order
    /// is preserved. The old and new port handles get a remove and an add.
    pub(crate) fn exchange_ports_in_connection(
        &mut self,
        handle: PortArrowHandle,
        end: ArrowEnd,
        node: NodeHandle,
    ) {
        let Some(arrow) = self.port_arrows.get(&handle) else {
            return;
        };
        let (old, counter) = match end {
            ArrowEnd::Source => (arrow.source, arrow.destination),
            ArrowEnd::Destination => (arrow.destination, arrow.source),
        };
        let new = PortRef::new(node, old.port);

        if let Some(port) = self
            .nodes
            .get_mut(&counter.node)
            .and_then(|n| n.port_mut(counter.port))
        {
            for entry in port.connections.iter_mut().filter(|c| **c == old) {
                *entry = new;
            }
        }
        self.drop_connection(old, counter);
        self.push_connection(new, counter);

        if let Some(arrow) = self.port_arrows.get_mut(&handle) {
            match end {
                ArrowEnd::Source => arrow.source = new,
                ArrowEnd::Destination => arrow.destination = new,
            }
        }
    }

    pub(crate) fn set_port_arrow_hidden(&mut self, handle: PortArrowHandle, hidden_in: Option<NodeHandle>) {
        if let Some(arrow) = self.port_arrows.get_mut(&handle) {
            arrow.hidden_in = hidden_in;
        }
    }

    fn push_connection(&mut self, at: PortRef, counterpart: PortRef) {
        if let Some(port) = self.nodes.get_mut(&at.node).and_then(|n| n.port_mut(at.port)) {
            port.connections.push(counterpart);
        }
    }

    fn drop_connection(&mut self, at: PortRef, counterpart: PortRef) {
        if let Some(port) = self.nodes.get_mut(&at.node).and_then(|n| n.port_mut(at.port)) {
            if let Some(i) = port.connections.iter().position(|c| *c == counterpart) {
                port.connections.remove(i);
            }
        }
    }

    // ------------------------------------------------------------------
    // property arrows
    // ------------------------------------------------------------------

    /// Show a new property link, attaching it to an existing reverse arrow if possible
    pub fn add_property_arrow(&mut self, link: &PropertyLink) -> Result<PropertyArrowHandle, GraphError> {
        let from = self
            .leaf(link.source.processor)
            .ok_or(GraphError::ProcessorNotFound(link.source.processor))?;
        let to = self
            .leaf(link.destination.processor)
            .ok_or(GraphError::ProcessorNotFound(link.destination.processor))?;
        let placement = self.place(from, to);

        let before = self.links.arrow_count();
        let handle = self
            .links
            .register(link, placement.source, placement.destination, placement.hidden_in)?;
        if self.links.arrow_count() > before {
            if let Some(data) = placement
                .hidden_in
                .and_then(|h| self.nodes.get_mut(&h))
                .and_then(Node::aggregate_mut)
            {
                data.internal_property_arrows.push(handle);
            }
        }
        Ok(handle)
    }

    /// Stop showing a property link
    pub fn remove_property_arrow_link(&mut self, link: PropertyLinkId) -> Option<Unregistered> {
        let result = self.links.unregister(link)?;
        if let Unregistered::Removed(arrow) = &result {
            if let Some(data) = arrow
                .hidden_in
                .and_then(|h| self.nodes.get_mut(&h))
                .and_then(Node::aggregate_mut)
            {
                data.internal_property_arrows.retain(|h| *h != arrow.handle);
            }
        }
        Some(result)
    }

    /// Property-link arrows
    pub fn links(&self) -> &PropertyLinkRegistry {
        &self.links
    }

    /// Top-level aggregation records
    pub fn records(&self) -> &[AggregationRecord] {
        &self.records
    }
}

impl ArrowGeometry for EditorGraph {
    fn endpoints(&self, arrow: PortArrowHandle) -> Option<([f32; 2], [f32; 2])> {
        let arrow = self.port_arrows.get(&arrow)?;
        let source = self.nodes.get(&arrow.source.node)?.position;
        let destination = self.nodes.get(&arrow.destination.node)?.position;
        Some((source, destination))
    }
}

/// Error when changing the editor graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeHandle),

    /// No leaf wraps the processor
    #[error("No node shows processor {0:?}")]
    ProcessorNotFound(ProcessorId),

    /// Port arrow not found
    #[error("Port arrow not found: {0}")]
    PortArrowNotFound(PortArrowHandle),

    /// Arrow registry rejected a link
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Structural precondition violated; nothing was changed
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use netweave_network::{Port, PortType, ProcessorNetwork};

    fn source(name: &str, x: i32, y: i32) -> Processor {
        Processor::new("Source", name)
            .with_port(Port::outport("out", PortType::Volume))
            .with_position(x, y)
            .unwrap()
    }

    fn sink(name: &str, x: i32, y: i32) -> Processor {
        Processor::new("Sink", name)
            .with_port(Port::inport("in", PortType::Volume).multi())
            .with_position(x, y)
            .unwrap()
    }

    fn port(p: &Processor) -> PortId {
        p.ports[0].id
    }

    #[test]
    fn test_leaf_takes_stored_position() {
        let mut graph = EditorGraph::new();
        let a = source("A", 30, -10);
        let handle = graph.add_leaf(&a).unwrap();

        let node = graph.node(handle).unwrap();
        assert_eq!(node.position, [30.0, -10.0]);
        assert_eq!(node.name, "A");
        assert_eq!(node.outports().count(), 1);
        assert!(graph.is_top_level(handle));
        assert!(matches!(graph.add_leaf(&a), Err(GraphError::InvalidOperation(_))));
    }

    #[test]
    fn test_port_arrow_updates_connection_lists() {
        let mut network = ProcessorNetwork::new("test");
        let a = source("A", 0, 0);
        let b = sink("B", 0, 100);
        let mut graph = EditorGraph::new();
        let ha = graph.add_leaf(&a).unwrap();
        let hb = graph.add_leaf(&b).unwrap();
        let (pa, pb) = (port(&a), port(&b));
        network.add_processor(a).unwrap();
        network.add_processor(b).unwrap();
        network.connect_ports(pa, pb).unwrap();

        let connection = network.connection_between(pa, pb).unwrap().clone();
        let arrow = graph.add_port_arrow(&connection).unwrap();
        assert_eq!(graph.find_port_arrow(pa, pb), Some(arrow));
        assert_eq!(graph.node(ha).unwrap().port(pa).unwrap().connections, vec![PortRef::new(hb, pb)]);
        assert_eq!(graph.node(hb).unwrap().port(pb).unwrap().connections, vec![PortRef::new(ha, pa)]);
        assert_eq!(graph.endpoints(arrow), Some(([0.0, 0.0], [0.0, 100.0])));
        assert!(graph.add_port_arrow(&connection).is_err());

        graph.remove_port_arrow(arrow).unwrap();
        assert!(graph.node(ha).unwrap().port(pa).unwrap().connections.is_empty());
        assert!(graph.node(hb).unwrap().port(pb).unwrap().connections.is_empty());
        assert_eq!(graph.visible_port_arrows().count(), 0);
    }

    #[test]
    fn test_remove_leaf() {
        let mut graph = EditorGraph::new();
        let a = source("A", 0, 0);
        let handle = graph.add_leaf(&a).unwrap();

        assert_eq!(graph.remove_leaf(a.id).unwrap(), vec![handle]);
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.leaf(a.id), None);
        assert_eq!(graph.remove_leaf(a.id), Err(GraphError::ProcessorNotFound(a.id)));
    }

    #[test]
    fn test_property_link_on_one_processor_stays_on_leaf() {
        use netweave_network::{LinkEvaluator, Property, PropertyRef, PropertyValue};

        let a = Processor::new("Raycaster", "A")
            .with_property(Property::new("min", "Min", PropertyValue::Float(0.0)))
            .with_property(Property::new("max", "Max", PropertyValue::Float(1.0)));
        let mut graph = EditorGraph::new();
        let ha = graph.add_leaf(&a).unwrap();
        let link = PropertyLink::new(
            PropertyRef::new(a.id, a.properties[0].id),
            PropertyRef::new(a.id, a.properties[1].id),
            LinkEvaluator::Id,
        );

        let arrow = graph.add_property_arrow(&link).unwrap();
        let arrow = graph.links().arrow(arrow).unwrap();
        assert_eq!(arrow.source.node, ha);
        assert_eq!(arrow.destination.node, ha);
        assert!(arrow.is_visible());
    }
}
