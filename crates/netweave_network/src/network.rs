// SPDX-License-Identifier: MIT OR Apache-2.0
//! Processor network containing processors, port connections and property links.

use crate::connection::{Connection, ConnectionId};
use crate::event::{NetworkEvent, NetworkObserver};
use crate::link::{LinkError, LinkEvaluator, PropertyLink, PropertyLinkId};
use crate::metadata::{MetaDataContainer, MetaDataError, PositionMetaData};
use crate::port::{Port, PortId};
use crate::processor::{Processor, ProcessorId};
use crate::property::{Property, PropertyRef, PropertyValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// A network of processors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorNetwork {
    /// Network name
    pub name: String,
    /// Processors in the network
    processors: IndexMap<ProcessorId, Processor>,
    /// Connections between ports
    connections: IndexMap<ConnectionId, Connection>,
    /// Links between properties
    links: IndexMap<PropertyLinkId, PropertyLink>,
    /// Network-wide meta-data
    pub meta: MetaDataContainer,
    /// Events not yet delivered to observers
    #[serde(skip)]
    events: Vec<NetworkEvent>,
}

impl ProcessorNetwork {
    /// Create a new empty network
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            processors: IndexMap::new(),
            connections: IndexMap::new(),
            links: IndexMap::new(),
            meta: MetaDataContainer::new(),
            events: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // processors
    // ------------------------------------------------------------------

    /// Add a processor; its name is made unique within the network
    pub fn add_processor(&mut self, mut processor: Processor) -> Result<ProcessorId, NetworkError> {
        if self.processors.contains_key(&processor.id) {
            return Err(NetworkError::DuplicateProcessor(processor.id));
        }
        processor.name = self.unique_name(&processor.name, None);
        let id = processor.id;
        self.processors.insert(id, processor);
        self.events.push(NetworkEvent::ProcessorAdded(id));
        Ok(id)
    }

    /// Remove a processor together with its connections and property links
    pub fn remove_processor(&mut self, processor_id: ProcessorId) -> Result<Processor, NetworkError> {
        if !self.processors.contains_key(&processor_id) {
            return Err(NetworkError::ProcessorNotFound(processor_id));
        }

        let connections: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| c.involves_processor(processor_id))
            .map(|c| c.id)
            .collect();
        for id in connections {
            if let Some(connection) = self.connections.shift_remove(&id) {
                self.events.push(NetworkEvent::ConnectionRemoved(connection));
            }
        }

        let links: Vec<PropertyLinkId> = self
            .links
            .values()
            .filter(|l| l.source.processor == processor_id || l.destination.processor == processor_id)
            .map(|l| l.id)
            .collect();
        for id in links {
            if let Some(link) = self.links.shift_remove(&id) {
                self.events.push(NetworkEvent::PropertyLinkRemoved(link));
            }
        }

        let processor = self
            .processors
            .shift_remove(&processor_id)
            .ok_or(NetworkError::ProcessorNotFound(processor_id))?;
        self.events.push(NetworkEvent::ProcessorRemoved(processor_id));
        Ok(processor)
    }

    /// Replace a processor by another one.
    ///
    /// Connections are carried over to ports with the same name and direction
    /// where the port types allow it, property links to properties with the same
    /// identifier. The position record of the old processor is copied.
    pub fn replace_processor(
        &mut self,
        old_id: ProcessorId,
        mut replacement: Processor,
    ) -> Result<ProcessorId, NetworkError> {
        let old = self
            .processors
            .get(&old_id)
            .ok_or(NetworkError::ProcessorNotFound(old_id))?;
        if self.processors.contains_key(&replacement.id) {
            return Err(NetworkError::DuplicateProcessor(replacement.id));
        }
        if let Some(position) = old.position()? {
            replacement.set_position(position)?;
        }

        // Map each old port to the replacement's port of the same name
        let port_map: HashMap<PortId, PortId> = old
            .ports
            .iter()
            .filter_map(|p| {
                replacement
                    .port_named(&p.name, p.direction)
                    .map(|q| (p.id, q.id))
            })
            .collect();
        let property_map: HashMap<_, _> = old
            .properties
            .iter()
            .filter_map(|p| replacement.property_by_ident(&p.ident).map(|q| (p.id, q.id)))
            .collect();

        let connections: Vec<Connection> = self
            .connections
            .values()
            .filter(|c| c.involves_processor(old_id))
            .cloned()
            .collect();
        let links: Vec<PropertyLink> = self
            .links
            .values()
            .filter(|l| l.source.processor == old_id || l.destination.processor == old_id)
            .cloned()
            .collect();

        let new_id = self.add_processor(replacement)?;

        for c in &connections {
            let from = if c.from_processor == old_id { port_map.get(&c.from_port).copied() } else { Some(c.from_port) };
            let to = if c.to_processor == old_id { port_map.get(&c.to_port).copied() } else { Some(c.to_port) };
            if let (Some(from), Some(to)) = (from, to) {
                // The old connection still occupies single-connect inports, so drop it first
                self.disconnect_ports(c.from_port, c.to_port)?;
                if let Err(e) = self.connect_ports(from, to) {
                    tracing::debug!("Connection not carried over to replacement: {e}");
                }
            }
        }

        let remap = |r: PropertyRef| -> Option<PropertyRef> {
            if r.processor == old_id {
                property_map.get(&r.property).map(|p| PropertyRef::new(new_id, *p))
            } else {
                Some(r)
            }
        };
        for l in &links {
            if let (Some(source), Some(destination)) = (remap(l.source), remap(l.destination)) {
                if let Err(e) = self.create_property_link(source, destination, l.evaluator) {
                    tracing::debug!("Property link not carried over to replacement: {e}");
                }
            }
        }

        self.remove_processor(old_id)?;
        Ok(new_id)
    }

    /// Rename a processor; returns the unique name actually assigned
    pub fn rename_processor(
        &mut self,
        processor_id: ProcessorId,
        name: &str,
    ) -> Result<String, NetworkError> {
        if !self.processors.contains_key(&processor_id) {
            return Err(NetworkError::ProcessorNotFound(processor_id));
        }
        let unique = self.unique_name(name, Some(processor_id));
        let processor = self
            .processors
            .get_mut(&processor_id)
            .ok_or(NetworkError::ProcessorNotFound(processor_id))?;
        if processor.name == unique {
            return Ok(unique);
        }
        let previous = std::mem::replace(&mut processor.name, unique.clone());
        self.events.push(NetworkEvent::ProcessorRenamed {
            processor: processor_id,
            previous,
        });
        Ok(unique)
    }

    /// Make `base` unique among processor names, ignoring `exclude`
    pub fn unique_name(&self, base: &str, exclude: Option<ProcessorId>) -> String {
        let taken = |name: &str| {
            self.processors
                .values()
                .any(|p| Some(p.id) != exclude && p.name == name)
        };
        if !taken(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base} {n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Get a processor by ID
    pub fn processor(&self, processor_id: ProcessorId) -> Option<&Processor> {
        self.processors.get(&processor_id)
    }

    /// Get a processor by name
    pub fn processor_by_name(&self, name: &str) -> Option<&Processor> {
        self.processors.values().find(|p| p.name == name)
    }

    /// Get all processors
    pub fn processors(&self) -> impl Iterator<Item = &Processor> {
        self.processors.values()
    }

    /// Get all processor IDs
    pub fn processor_ids(&self) -> impl Iterator<Item = ProcessorId> + '_ {
        self.processors.keys().copied()
    }

    /// Get the number of processors
    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    /// Mutable access to a processor's meta-data
    pub fn processor_meta_mut(&mut self, processor_id: ProcessorId) -> Option<&mut MetaDataContainer> {
        self.processors.get_mut(&processor_id).map(|p| &mut p.meta)
    }

    /// Store a processor's editor position
    pub fn set_processor_position(
        &mut self,
        processor_id: ProcessorId,
        position: PositionMetaData,
    ) -> Result<(), NetworkError> {
        let processor = self
            .processors
            .get_mut(&processor_id)
            .ok_or(NetworkError::ProcessorNotFound(processor_id))?;
        processor.set_position(position)?;
        Ok(())
    }

    /// Find a port and its owning processor
    pub fn find_port(&self, port_id: PortId) -> Option<(&Processor, &Port)> {
        self.processors
            .values()
            .find_map(|proc| proc.port(port_id).map(|port| (proc, port)))
    }

    // ------------------------------------------------------------------
    // port connections
    // ------------------------------------------------------------------

    /// Connect an outport to an inport
    pub fn connect_ports(&mut self, outport: PortId, inport: PortId) -> Result<ConnectionId, NetworkError> {
        let (source_proc, source_port) = self
            .find_port(outport)
            .ok_or(NetworkError::PortNotFound(outport))?;
        let (target_proc, target_port) = self
            .find_port(inport)
            .ok_or(NetworkError::PortNotFound(inport))?;

        if !source_port.can_connect(target_port) {
            return Err(NetworkError::IncompatiblePorts);
        }
        if source_proc.id == target_proc.id {
            return Err(NetworkError::SelfLoop);
        }
        if self.connection_between(outport, inport).is_some() {
            return Err(NetworkError::AlreadyConnected);
        }
        if !target_port.multi_connect && self.is_port_connected(inport) {
            return Err(NetworkError::PortAlreadyConnected(inport));
        }

        let connection = Connection::new(source_proc.id, outport, target_proc.id, inport);
        let id = connection.id;
        self.connections.insert(id, connection.clone());
        self.events.push(NetworkEvent::ConnectionAdded(connection));
        Ok(id)
    }

    /// Disconnect an outport from an inport
    pub fn disconnect_ports(&mut self, outport: PortId, inport: PortId) -> Result<Connection, NetworkError> {
        let id = self
            .connection_between(outport, inport)
            .map(|c| c.id)
            .ok_or(NetworkError::ConnectionNotFound { outport, inport })?;
        let connection = self
            .connections
            .shift_remove(&id)
            .ok_or(NetworkError::ConnectionNotFound { outport, inport })?;
        self.events.push(NetworkEvent::ConnectionRemoved(connection.clone()));
        Ok(connection)
    }

    /// Get the connection joining two ports
    pub fn connection_between(&self, outport: PortId, inport: PortId) -> Option<&Connection> {
        self.connections.values().find(|c| c.joins(outport, inport))
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get connections attached to a port
    pub fn connections_of_port(&self, port_id: PortId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.involves_port(port_id))
    }

    /// Whether a port has at least one connection
    pub fn is_port_connected(&self, port_id: PortId) -> bool {
        self.connections_of_port(port_id).next().is_some()
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    // ------------------------------------------------------------------
    // properties and links
    // ------------------------------------------------------------------

    /// Get a property
    pub fn property(&self, property: PropertyRef) -> Option<&Property> {
        self.processors.get(&property.processor)?.property(property.property)
    }

    /// Create a directed link between two properties
    pub fn create_property_link(
        &mut self,
        source: PropertyRef,
        destination: PropertyRef,
        evaluator: LinkEvaluator,
    ) -> Result<PropertyLinkId, NetworkError> {
        let src = self
            .property(source)
            .ok_or(NetworkError::PropertyNotFound(source))?;
        let dst = self
            .property(destination)
            .ok_or(NetworkError::PropertyNotFound(destination))?;
        if source == destination {
            return Err(NetworkError::SelfLink);
        }
        if self
            .links
            .values()
            .any(|l| l.source == source && l.destination == destination)
        {
            return Err(NetworkError::LinkExists);
        }
        if !evaluator.is_compatible(&src.value, &dst.value) {
            return Err(NetworkError::Link(LinkError::Incompatible {
                evaluator: evaluator.name(),
                from: src.value.type_name(),
                to: dst.value.type_name(),
            }));
        }

        let link = PropertyLink::new(source, destination, evaluator);
        let id = link.id;
        self.links.insert(id, link.clone());
        self.events.push(NetworkEvent::PropertyLinkAdded(link));
        Ok(id)
    }

    /// Remove a property link
    pub fn remove_property_link(&mut self, link_id: PropertyLinkId) -> Result<PropertyLink, NetworkError> {
        let link = self
            .links
            .shift_remove(&link_id)
            .ok_or(NetworkError::LinkNotFound(link_id))?;
        self.events.push(NetworkEvent::PropertyLinkRemoved(link.clone()));
        Ok(link)
    }

    /// Get a property link
    pub fn property_link(&self, link_id: PropertyLinkId) -> Option<&PropertyLink> {
        self.links.get(&link_id)
    }

    /// Get the link from `source` to `destination`
    pub fn property_link_between(
        &self,
        source: PropertyRef,
        destination: PropertyRef,
    ) -> Option<&PropertyLink> {
        self.links
            .values()
            .find(|l| l.source == source && l.destination == destination)
    }

    /// Get all property links
    pub fn property_links(&self) -> impl Iterator<Item = &PropertyLink> {
        self.links.values()
    }

    /// Set a property value and propagate it along outgoing links.
    ///
    /// Every property is updated at most once per call. Returns the number of
    /// properties that received a new value, including `property` itself.
    pub fn set_property_value(
        &mut self,
        property: PropertyRef,
        value: PropertyValue,
    ) -> Result<usize, NetworkError> {
        let current = self
            .property(property)
            .ok_or(NetworkError::PropertyNotFound(property))?;
        if !current.value.same_kind(&value) {
            return Err(NetworkError::ValueMismatch(property));
        }

        let mut visited = HashSet::from([property]);
        let mut queue = VecDeque::from([(property, value)]);
        let mut updated = 0;

        while let Some((target, value)) = queue.pop_front() {
            if let Some(p) = self
                .processors
                .get_mut(&target.processor)
                .and_then(|proc| proc.property_mut(target.property))
            {
                p.value = value.clone();
                updated += 1;
            }

            for link in self.links.values().filter(|l| l.source == target) {
                if !visited.insert(link.destination) {
                    continue;
                }
                let Some(dst) = self.property(link.destination) else {
                    continue;
                };
                let next = link.evaluator.eval(&value, &dst.value)?;
                queue.push_back((link.destination, next));
            }
        }
        Ok(updated)
    }

    /// Link every pair of camera properties among `processors` in both directions.
    ///
    /// Existing links are kept. Returns the number of links created.
    pub fn create_camera_links(&mut self, processors: &[ProcessorId]) -> usize {
        let cameras = self.camera_properties(processors);
        let mut pairs = Vec::new();
        for (i, a) in cameras.iter().enumerate() {
            for b in &cameras[i + 1..] {
                if a.processor != b.processor {
                    pairs.push((*a, *b));
                }
            }
        }
        self.link_camera_pairs(&pairs)
    }

    /// Link the camera properties of one processor with those of all others
    pub fn link_cameras_of(&mut self, processor_id: ProcessorId) -> usize {
        let own = self.camera_properties(&[processor_id]);
        let others: Vec<ProcessorId> = self.processor_ids().filter(|id| *id != processor_id).collect();
        let others = self.camera_properties(&others);
        let pairs: Vec<_> = own
            .iter()
            .flat_map(|a| others.iter().map(move |b| (*a, *b)))
            .collect();
        self.link_camera_pairs(&pairs)
    }

    fn camera_properties(&self, processors: &[ProcessorId]) -> Vec<PropertyRef> {
        processors
            .iter()
            .filter_map(|id| self.processors.get(id))
            .flat_map(|proc| {
                proc.properties
                    .iter()
                    .filter(|p| p.value.is_camera())
                    .map(move |p| PropertyRef::new(proc.id, p.id))
            })
            .collect()
    }

    fn link_camera_pairs(&mut self, pairs: &[(PropertyRef, PropertyRef)]) -> usize {
        let mut created = 0;
        for (a, b) in pairs {
            for (source, destination) in [(*a, *b), (*b, *a)] {
                if self.property_link_between(source, destination).is_none()
                    && self
                        .create_property_link(source, destination, LinkEvaluator::CameraId)
                        .is_ok()
                {
                    created += 1;
                }
            }
        }
        created
    }

    // ------------------------------------------------------------------
    // sub-networks
    // ------------------------------------------------------------------

    /// Copy the given processors with the connections and links among them.
    ///
    /// IDs are kept; use [`merge_sub_network`](Self::merge_sub_network) to
    /// insert the copy with fresh IDs.
    pub fn clone_sub_network(&self, processor_ids: &[ProcessorId]) -> Result<ProcessorNetwork, NetworkError> {
        let mut sub = ProcessorNetwork::new(self.name.clone());
        for id in processor_ids {
            let processor = self
                .processors
                .get(id)
                .ok_or(NetworkError::ProcessorNotFound(*id))?;
            sub.processors.insert(*id, processor.clone());
        }
        for c in self.connections.values() {
            if sub.processors.contains_key(&c.from_processor) && sub.processors.contains_key(&c.to_processor) {
                sub.connections.insert(c.id, c.clone());
            }
        }
        for l in self.links.values() {
            if sub.processors.contains_key(&l.source.processor)
                && sub.processors.contains_key(&l.destination.processor)
            {
                sub.links.insert(l.id, l.clone());
            }
        }
        Ok(sub)
    }

    /// Insert all processors, connections and links of `sub` with fresh IDs.
    ///
    /// Returns the IDs of the inserted processors in `sub`'s order.
    pub fn merge_sub_network(&mut self, sub: ProcessorNetwork) -> Vec<ProcessorId> {
        let mut processor_map = HashMap::new();
        let mut port_map = HashMap::new();
        let mut property_map = HashMap::new();
        let mut added = Vec::new();

        for processor in sub.processors.values() {
            let (mut copy, ports, properties) = processor.rekeyed();
            copy.name = self.unique_name(&copy.name, None);
            processor_map.insert(processor.id, copy.id);
            port_map.extend(ports);
            property_map.extend(properties);
            added.push(copy.id);
            self.events.push(NetworkEvent::ProcessorAdded(copy.id));
            self.processors.insert(copy.id, copy);
        }

        for c in sub.connections.values() {
            if let (Some(from), Some(to)) = (port_map.get(&c.from_port), port_map.get(&c.to_port)) {
                if let Err(e) = self.connect_ports(*from, *to) {
                    tracing::warn!("Skipping connection while merging sub-network: {e}");
                }
            }
        }

        let remap = |r: PropertyRef| -> Option<PropertyRef> {
            Some(PropertyRef::new(
                *processor_map.get(&r.processor)?,
                *property_map.get(&r.property)?,
            ))
        };
        for l in sub.links.values() {
            if let (Some(source), Some(destination)) = (remap(l.source), remap(l.destination)) {
                if let Err(e) = self.create_property_link(source, destination, l.evaluator) {
                    tracing::warn!("Skipping property link while merging sub-network: {e}");
                }
            }
        }
        added
    }

    // ------------------------------------------------------------------
    // events
    // ------------------------------------------------------------------

    /// Whether events are waiting to be dispatched
    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Take all pending events without dispatching them
    pub fn take_events(&mut self) -> Vec<NetworkEvent> {
        std::mem::take(&mut self.events)
    }

    /// Deliver all pending events to `observer`, in order.
    ///
    /// Returns the number of delivered events.
    pub fn dispatch_events(&mut self, observer: &mut dyn NetworkObserver) -> usize {
        let events = self.take_events();
        for event in &events {
            tracing::debug!(?event, "network event");
            observer.network_changed(self, event);
        }
        events.len()
    }

    // ------------------------------------------------------------------
    // serialization
    // ------------------------------------------------------------------

    /// Serialize the network to RON text
    pub fn to_ron(&self) -> Result<String, NetworkError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Deserialize a network from RON text
    pub fn from_ron(s: &str) -> Result<Self, NetworkError> {
        Ok(ron::from_str(s)?)
    }
}

impl Default for ProcessorNetwork {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Error when changing the network
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Processor not found
    #[error("Processor not found: {0:?}")]
    ProcessorNotFound(ProcessorId),

    /// Processor already part of the network
    #[error("Processor already in network: {0:?}")]
    DuplicateProcessor(ProcessorId),

    /// Port not found
    #[error("Port not found: {0:?}")]
    PortNotFound(PortId),

    /// Incompatible ports
    #[error("Incompatible ports")]
    IncompatiblePorts,

    /// Single-connection inport is occupied
    #[error("Port already connected: {0:?}")]
    PortAlreadyConnected(PortId),

    /// Ports are already connected to each other
    #[error("Ports are already connected")]
    AlreadyConnected,

    /// Self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,

    /// No connection between the ports
    #[error("No connection from {outport:?} to {inport:?}")]
    ConnectionNotFound {
        /// Outport
        outport: PortId,
        /// Inport
        inport: PortId,
    },

    /// Property not found
    #[error("Property not found: {0:?}")]
    PropertyNotFound(PropertyRef),

    /// A property cannot be linked to itself
    #[error("A property cannot be linked to itself")]
    SelfLink,

    /// Link in this direction exists already
    #[error("Property link exists already")]
    LinkExists,

    /// Link not found
    #[error("Property link not found: {0:?}")]
    LinkNotFound(PropertyLinkId),

    /// New value has a different type than the property
    #[error("Value type does not match property {0:?}")]
    ValueMismatch(PropertyRef),

    /// Link evaluation failed
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Meta-data error
    #[error(transparent)]
    MetaData(#[from] MetaDataError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] ron::Error),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] ron::error::SpannedError),
}
