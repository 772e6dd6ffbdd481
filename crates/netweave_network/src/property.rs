// SPDX-License-Identifier: MIT OR Apache-2.0
//! Linkable processor parameters.

use crate::processor::ProcessorId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyId(pub Uuid);

impl PropertyId {
    /// Create a new random property ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PropertyId {
    fn default() -> Self {
        Self::new()
    }
}

/// Address of a property inside a network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyRef {
    /// Owning processor
    pub processor: ProcessorId,
    /// Property within the processor
    pub property: PropertyId,
}

impl PropertyRef {
    /// Create a new property reference
    pub fn new(processor: ProcessorId, property: PropertyId) -> Self {
        Self { processor, property }
    }
}

/// Camera parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Eye position
    pub position: [f32; 3],
    /// Look-at point
    pub focus: [f32; 3],
    /// Up vector
    pub up: [f32; 3],
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 3.5],
            focus: [0.0, 0.0, 0.0],
            up: [0.0, 1.0, 0.0],
        }
    }
}

/// Value held by a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// Floating point
    Float(f32),
    /// 2D vector
    Vec2([f32; 2]),
    /// 3D vector
    Vec3([f32; 3]),
    /// Text
    Text(String),
    /// Camera
    Camera(Camera),
}

impl PropertyValue {
    /// Short type name, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Vec2(_) => "vec2",
            Self::Vec3(_) => "vec3",
            Self::Text(_) => "text",
            Self::Camera(_) => "camera",
        }
    }

    /// Whether this is a camera value
    pub fn is_camera(&self) -> bool {
        matches!(self, Self::Camera(_))
    }

    /// Whether both values have the same variant
    pub fn same_kind(&self, other: &PropertyValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// A processor property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    /// Unique property ID
    pub id: PropertyId,
    /// Identifier, unique per processor
    pub ident: String,
    /// Display name
    pub gui_name: String,
    /// Current value
    pub value: PropertyValue,
}

impl Property {
    /// Create a new property
    pub fn new(ident: impl Into<String>, gui_name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            id: PropertyId::new(),
            ident: ident.into(),
            gui_name: gui_name.into(),
            value,
        }
    }

    /// Create a camera property with default parameters
    pub fn camera(ident: impl Into<String>) -> Self {
        Self::new(ident, "Camera", PropertyValue::Camera(Camera::default()))
    }

    /// Copy of this property with a fresh ID
    pub fn rekeyed(&self) -> Self {
        Self {
            id: PropertyId::new(),
            ..self.clone()
        }
    }
}
