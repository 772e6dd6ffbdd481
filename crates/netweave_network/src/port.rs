// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for processor inputs/outputs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId(pub Uuid);

impl PortId {
    /// Create a new random port ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PortId {
    fn default() -> Self {
        Self::new()
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// Data type that flows through a port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    /// Volume data set
    Volume,
    /// Rendered image (render target)
    Image,
    /// Geometry (meshes, point lists)
    Geometry,
    /// Plain text
    Text,
    /// Accepts any type
    Generic,
    /// Custom type
    Custom(String),
}

impl PortType {
    /// Check if data of this type can flow into a port of another type
    pub fn can_connect_to(&self, other: &PortType) -> bool {
        if matches!(self, Self::Generic) || matches!(other, Self::Generic) {
            return true;
        }
        self == other
    }
}

/// A port on a processor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    /// Unique port ID
    pub id: PortId,
    /// Port name, unique per processor and direction
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Data type
    pub port_type: PortType,
    /// Co-processor (control) port rather than a data port
    pub co_processor: bool,
    /// Whether multiple connections are allowed
    pub multi_connect: bool,
}

impl Port {
    /// Create a new data inport
    pub fn inport(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            id: PortId::new(),
            name: name.into(),
            direction: PortDirection::Input,
            port_type,
            co_processor: false,
            multi_connect: false,
        }
    }

    /// Create a new data outport
    pub fn outport(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            id: PortId::new(),
            name: name.into(),
            direction: PortDirection::Output,
            port_type,
            co_processor: false,
            multi_connect: true, // Outports feed any number of consumers
        }
    }

    /// Create a co-processor inport
    pub fn co_inport(name: impl Into<String>) -> Self {
        Self {
            co_processor: true,
            multi_connect: true,
            ..Self::inport(name, PortType::Generic)
        }
    }

    /// Create a co-processor outport
    pub fn co_outport(name: impl Into<String>) -> Self {
        Self {
            co_processor: true,
            ..Self::outport(name, PortType::Generic)
        }
    }

    /// Allow multiple connections
    pub fn multi(mut self) -> Self {
        self.multi_connect = true;
        self
    }

    /// Whether this is an outport
    pub fn is_outport(&self) -> bool {
        self.direction == PortDirection::Output
    }

    /// Whether this is an inport
    pub fn is_inport(&self) -> bool {
        self.direction == PortDirection::Input
    }

    /// Check whether a connection from this port (as source) to `other` is valid
    pub fn can_connect(&self, other: &Port) -> bool {
        if !self.is_outport() || !other.is_inport() {
            return false;
        }
        if self.co_processor != other.co_processor {
            return false;
        }
        self.port_type.can_connect_to(&other.port_type)
    }

    /// Copy of this port with a fresh ID
    pub fn rekeyed(&self) -> Self {
        Self {
            id: PortId::new(),
            ..self.clone()
        }
    }
}
