// SPDX-License-Identifier: MIT OR Apache-2.0
//! Folding nodes into aggregates and unfolding them again.
//!
//! Both directions work one level at a time. An aggregate may contain other
//! aggregates, and arrows between its children stay attached to those children
//! while hidden.

use crate::graph::{EditorGraph, GraphError};
use crate::handle::{NodeHandle, PortArrowHandle, PropertyArrowHandle};
use crate::link_registry::ArrowEnd;
use crate::node::{AggregateData, Node, NodeKind, PortHandle};
use netweave_network::{PortId, ProcessorId};
use serde::{Deserialize, Serialize};

/// Persisted form of an aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationRecord {
    /// Display name
    pub name: String,
    /// Scene position
    pub position: [i32; 2],
    /// All contained processors, flattened
    pub processors: Vec<ProcessorId>,
    /// Records of directly nested aggregates
    pub aggregations: Vec<AggregationRecord>,
}

impl AggregationRecord {
    /// Whether this record describes exactly `processors`
    pub fn matches(&self, processors: &[ProcessorId]) -> bool {
        self.processors.len() == processors.len() && processors.iter().all(|p| self.processors.contains(p))
    }

    pub(crate) fn find_mut<'a>(
        records: &'a mut [AggregationRecord],
        processors: &[ProcessorId],
    ) -> Option<&'a mut AggregationRecord> {
        for record in records.iter_mut() {
            if record.matches(processors) {
                return Some(record);
            }
            if let Some(found) = Self::find_mut(&mut record.aggregations, processors) {
                return Some(found);
            }
        }
        None
    }

    /// Remove and return the top-level record for `processors`
    fn take(records: &mut Vec<AggregationRecord>, processors: &[ProcessorId]) -> Option<AggregationRecord> {
        let index = records.iter().position(|r| r.matches(processors))?;
        Some(records.remove(index))
    }

    /// Drop a processor from every record; records left empty are dropped
    pub(crate) fn strip(records: &mut Vec<AggregationRecord>, processor: ProcessorId) {
        for record in records.iter_mut() {
            record.processors.retain(|p| *p != processor);
            Self::strip(&mut record.aggregations, processor);
        }
        records.retain(|r| !r.processors.is_empty());
    }
}

impl EditorGraph {
    /// Fold top-level nodes into a new aggregate.
    ///
    /// All preconditions are checked before anything changes.
    pub fn aggregate(&mut self, nodes: &[NodeHandle], name: &str) -> Result<NodeHandle, GraphError> {
        if nodes.is_empty() {
            return Err(GraphError::InvalidOperation("cannot aggregate an empty selection".into()));
        }
        for (i, handle) in nodes.iter().enumerate() {
            if nodes[..i].contains(handle) {
                return Err(GraphError::InvalidOperation(format!("{handle} selected twice")));
            }
            if !self.nodes.contains_key(handle) {
                return Err(GraphError::NodeNotFound(*handle));
            }
            if !self.top_level.contains(handle) {
                return Err(GraphError::InvalidOperation(format!("{handle} is not a top-level node")));
            }
        }

        let handle = NodeHandle(self.node_ids.next());
        let children: Vec<&Node> = nodes.iter().filter_map(|h| self.nodes.get(h)).collect();
        let count = children.len() as f32;
        let center = [
            children.iter().map(|n| n.position[0]).sum::<f32>() / count,
            children.iter().map(|n| n.position[1]).sum::<f32>() / count,
        ];
        let offsets: Vec<[f32; 2]> = children
            .iter()
            .map(|n| [n.position[0] - center[0], n.position[1] - center[1]])
            .collect();
        let ports: Vec<PortHandle> = children
            .iter()
            .flat_map(|n| n.ports.iter().map(PortHandle::detached))
            .collect();

        for child in nodes {
            if let Some(node) = self.nodes.get_mut(child) {
                node.parent = Some(handle);
            }
        }
        self.nodes.insert(
            handle,
            Node {
                handle,
                name: name.to_string(),
                position: center,
                parent: None,
                kind: NodeKind::Aggregate(AggregateData {
                    children: nodes.to_vec(),
                    offsets,
                    internal_port_arrows: Vec::new(),
                    internal_property_arrows: Vec::new(),
                }),
                ports,
            },
        );

        let inside = |h: NodeHandle| nodes.contains(&h);

        // Property arrows between children become internal, half-external ones move to the aggregate
        let mut internal_links: Vec<PropertyArrowHandle> = Vec::new();
        let mut link_redirects = Vec::new();
        for arrow in self.links.visible_arrows() {
            match (inside(arrow.source.node), inside(arrow.destination.node)) {
                (true, true) => internal_links.push(arrow.handle),
                (true, false) => link_redirects.push((arrow.handle, ArrowEnd::Source)),
                (false, true) => link_redirects.push((arrow.handle, ArrowEnd::Destination)),
                (false, false) => {}
            }
        }
        for arrow in &internal_links {
            self.links.set_hidden(*arrow, Some(handle));
        }
        for (arrow, end) in link_redirects {
            self.links.redirect(arrow, end, handle);
        }

        // Same for port arrows
        let mut internal_ports: Vec<PortArrowHandle> = Vec::new();
        let mut port_redirects = Vec::new();
        for arrow in self.visible_port_arrows() {
            match (inside(arrow.source.node), inside(arrow.destination.node)) {
                (true, true) => internal_ports.push(arrow.handle),
                (true, false) => port_redirects.push((arrow.handle, ArrowEnd::Source)),
                (false, true) => port_redirects.push((arrow.handle, ArrowEnd::Destination)),
                (false, false) => {}
            }
        }
        for arrow in &internal_ports {
            self.set_port_arrow_hidden(*arrow, Some(handle));
        }
        for (arrow, end) in port_redirects {
            self.exchange_ports_in_connection(arrow, end, handle);
        }

        if let Some(data) = self.nodes.get_mut(&handle).and_then(Node::aggregate_mut) {
            data.internal_port_arrows = internal_ports;
            data.internal_property_arrows = internal_links;
        }

        for child in nodes {
            self.top_level.shift_remove(child);
        }
        self.top_level.insert(handle);

        let mut nested = Vec::new();
        for child in nodes {
            if self.nodes.get(child).is_some_and(Node::is_aggregate) {
                let processors = self.processors(*child);
                if let Some(record) = AggregationRecord::take(&mut self.records, &processors) {
                    nested.push(record);
                }
            }
        }
        self.records.push(AggregationRecord {
            name: name.to_string(),
            position: [center[0].round() as i32, center[1].round() as i32],
            processors: self.processors(handle),
            aggregations: nested,
        });

        tracing::info!("Aggregated {} nodes into {handle} '{name}'", nodes.len());
        Ok(handle)
    }

    /// Unfold a top-level aggregate; returns its children, now top-level
    pub fn deaggregate(&mut self, handle: NodeHandle) -> Result<Vec<NodeHandle>, GraphError> {
        let node = self.nodes.get(&handle).ok_or(GraphError::NodeNotFound(handle))?;
        let data = node
            .aggregate()
            .ok_or_else(|| GraphError::InvalidOperation(format!("{handle} is not an aggregate")))?
            .clone();
        if !self.top_level.contains(&handle) {
            return Err(GraphError::InvalidOperation(format!(
                "{handle} is nested inside another aggregate"
            )));
        }
        let position = node.position;
        let processors = self.processors(handle);

        for arrow in &data.internal_port_arrows {
            self.set_port_arrow_hidden(*arrow, None);
        }
        for arrow in &data.internal_property_arrows {
            self.links.set_hidden(*arrow, None);
        }

        let mut port_redirects: Vec<(PortArrowHandle, ArrowEnd, PortId)> = Vec::new();
        for arrow in self.port_arrows() {
            if arrow.source.node == handle {
                port_redirects.push((arrow.handle, ArrowEnd::Source, arrow.source.port));
            }
            if arrow.destination.node == handle {
                port_redirects.push((arrow.handle, ArrowEnd::Destination, arrow.destination.port));
            }
        }
        for (arrow, end, port) in port_redirects {
            let owner = data
                .children
                .iter()
                .copied()
                .find(|c| self.node(*c).is_some_and(|n| n.has_port(port)));
            match owner {
                Some(child) => self.exchange_ports_in_connection(arrow, end, child),
                None => tracing::warn!("No child of {handle} shows the port of {arrow}"),
            }
        }

        let mut link_redirects: Vec<(PropertyArrowHandle, ArrowEnd, ProcessorId)> = Vec::new();
        for arrow in self.links.arrows() {
            if arrow.source.node == handle {
                link_redirects.push((arrow.handle, ArrowEnd::Source, arrow.source.property.processor));
            }
            if arrow.destination.node == handle {
                link_redirects.push((arrow.handle, ArrowEnd::Destination, arrow.destination.property.processor));
            }
        }
        for (arrow, end, processor) in link_redirects {
            let owner = data
                .children
                .iter()
                .copied()
                .find(|c| self.contains_processor(*c, processor));
            if let Some(child) = owner {
                self.links.redirect(arrow, end, child);
            }
        }

        self.top_level.shift_remove(&handle);
        self.nodes.shift_remove(&handle);
        if let Some(record) = AggregationRecord::take(&mut self.records, &processors) {
            self.records.extend(record.aggregations);
        }

        for (i, child) in data.children.iter().enumerate() {
            let offset = data.offsets.get(i).copied().unwrap_or_default();
            if let Some(node) = self.nodes.get_mut(child) {
                node.parent = None;
            }
            self.set_node_position(*child, [position[0] + offset[0], position[1] + offset[1]])?;
            self.top_level.insert(*child);
        }

        tracing::info!("Deaggregated {handle} into {} nodes", data.children.len());
        Ok(data.children)
    }

    /// Rebuild aggregates from persisted records, nested records first.
    ///
    /// Records whose processors are missing or already grouped differently
    /// are skipped. Returns the number of restored top-level records.
    pub fn restore_aggregations(&mut self, records: &[AggregationRecord]) -> usize {
        let mut restored = 0;
        for record in records {
            if self.restore_record(record).is_some() {
                restored += 1;
            }
        }
        restored
    }

    fn restore_record(&mut self, record: &AggregationRecord) -> Option<NodeHandle> {
        for nested in &record.aggregations {
            self.restore_record(nested);
        }
        if let Some(missing) = record.processors.iter().find(|p| self.leaf(**p).is_none()) {
            tracing::warn!("Skipping aggregation '{}': processor {missing:?} not found", record.name);
            return None;
        }

        let mut nodes = Vec::new();
        for processor in &record.processors {
            let outer = self.outermost(*processor)?;
            if !nodes.contains(&outer) {
                nodes.push(outer);
            }
        }
        let covered: Vec<ProcessorId> = nodes.iter().flat_map(|n| self.processors(*n)).collect();
        if !record.matches(&covered) {
            tracing::warn!("Skipping aggregation '{}': processors are grouped differently", record.name);
            return None;
        }

        match self.aggregate(&nodes, &record.name) {
            Ok(handle) => {
                let position = [record.position[0] as f32, record.position[1] as f32];
                self.set_node_position(handle, position).ok()?;
                Some(handle)
            }
            Err(e) => {
                tracing::warn!("Skipping aggregation '{}': {e}", record.name);
                None
            }
        }
    }
}
