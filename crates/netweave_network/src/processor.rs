// SPDX-License-Identifier: MIT OR Apache-2.0
//! Processor definitions for the network.

use crate::metadata::{MetaDataContainer, MetaDataError, PositionMetaData, POSITION_KEY};
use crate::port::{Port, PortDirection, PortId};
use crate::property::{Property, PropertyId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique identifier for a processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessorId(pub Uuid);

impl ProcessorId {
    /// Create a new random processor ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProcessorId {
    fn default() -> Self {
        Self::new()
    }
}

/// Processor category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessorCategory {
    /// Data sources (volume readers, geometry sources)
    DataSource,
    /// Volume processing
    Volume,
    /// Rendering (raycasters, proxy geometry)
    Render,
    /// Image processing
    Image,
    /// Output (canvases, writers)
    Output,
    /// Utility processors
    Utility,
}

/// Processor type definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorType {
    /// Class name
    pub class_name: String,
    /// Category
    pub category: ProcessorCategory,
    /// Description
    pub description: String,
    /// Default ports
    pub ports: Vec<Port>,
    /// Default properties
    pub properties: Vec<Property>,
}

/// A processor instance in the network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Processor {
    /// Unique instance ID
    pub id: ProcessorId,
    /// Class name
    pub class_name: String,
    /// Display name, unique within a network
    pub name: String,
    /// Ports
    pub ports: Vec<Port>,
    /// Properties
    pub properties: Vec<Property>,
    /// Attached meta-data
    pub meta: MetaDataContainer,
}

impl Processor {
    /// Create an empty processor
    pub fn new(class_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ProcessorId::new(),
            class_name: class_name.into(),
            name: name.into(),
            ports: Vec::new(),
            properties: Vec::new(),
            meta: MetaDataContainer::new(),
        }
    }

    /// Create a processor from a type definition; ports and properties get fresh IDs
    pub fn from_type(processor_type: &ProcessorType, name: impl Into<String>) -> Self {
        Self {
            ports: processor_type.ports.iter().map(Port::rekeyed).collect(),
            properties: processor_type.properties.iter().map(Property::rekeyed).collect(),
            ..Self::new(processor_type.class_name.clone(), name)
        }
    }

    /// Add a port
    pub fn with_port(mut self, port: Port) -> Self {
        self.ports.push(port);
        self
    }

    /// Add a property
    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Set the editor position record
    pub fn with_position(mut self, x: i32, y: i32) -> Result<Self, MetaDataError> {
        self.set_position(PositionMetaData { x, y })?;
        Ok(self)
    }

    /// Get a port by ID
    pub fn port(&self, port_id: PortId) -> Option<&Port> {
        self.ports.iter().find(|p| p.id == port_id)
    }

    /// Get a port by name and direction
    pub fn port_named(&self, name: &str, direction: PortDirection) -> Option<&Port> {
        self.ports
            .iter()
            .find(|p| p.name == name && p.direction == direction)
    }

    /// Get a property by ID
    pub fn property(&self, property_id: PropertyId) -> Option<&Property> {
        self.properties.iter().find(|p| p.id == property_id)
    }

    /// Get a mutable property by ID
    pub fn property_mut(&mut self, property_id: PropertyId) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.id == property_id)
    }

    /// Get a property by identifier
    pub fn property_by_ident(&self, ident: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.ident == ident)
    }

    /// Input ports
    pub fn inports(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| p.is_inport())
    }

    /// Output ports
    pub fn outports(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| p.is_outport())
    }

    /// Stored editor position, if any
    pub fn position(&self) -> Result<Option<PositionMetaData>, MetaDataError> {
        self.meta.get(POSITION_KEY)
    }

    /// Store the editor position
    pub fn set_position(&mut self, position: PositionMetaData) -> Result<(), MetaDataError> {
        self.meta.set(POSITION_KEY, &position)
    }

    /// Copy of this processor with fresh processor, port and property IDs.
    ///
    /// Returns the copy together with the old-to-new port and property mappings.
    pub fn rekeyed(&self) -> (Self, HashMap<PortId, PortId>, HashMap<PropertyId, PropertyId>) {
        let ports: Vec<Port> = self.ports.iter().map(Port::rekeyed).collect();
        let properties: Vec<Property> = self.properties.iter().map(Property::rekeyed).collect();
        let port_map = self.ports.iter().zip(&ports).map(|(a, b)| (a.id, b.id)).collect();
        let property_map = self
            .properties
            .iter()
            .zip(&properties)
            .map(|(a, b)| (a.id, b.id))
            .collect();

        let copy = Self {
            id: ProcessorId::new(),
            class_name: self.class_name.clone(),
            name: self.name.clone(),
            ports,
            properties,
            meta: self.meta.clone(),
        };
        (copy, port_map, property_map)
    }
}

/// Registry of available processor types
pub struct ProcessorRegistry {
    /// Registered types by class name
    types: indexmap::IndexMap<String, ProcessorType>,
}

impl ProcessorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: indexmap::IndexMap::new(),
        }
    }

    /// Register a processor type
    pub fn register(&mut self, processor_type: ProcessorType) {
        self.types.insert(processor_type.class_name.clone(), processor_type);
    }

    /// Get a processor type by class name
    pub fn get(&self, class_name: &str) -> Option<&ProcessorType> {
        self.types.get(class_name)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &ProcessorType> {
        self.types.values()
    }

    /// Get types by category
    pub fn types_in_category(&self, category: ProcessorCategory) -> impl Iterator<Item = &ProcessorType> {
        self.types.values().filter(move |t| t.category == category)
    }

    /// Create a processor from a class name, named after the class
    pub fn create(&self, class_name: &str) -> Option<Processor> {
        self.get(class_name).map(|t| Processor::from_type(t, class_name))
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
