// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property links and the evaluators that propagate values along them.

use crate::property::{PropertyRef, PropertyValue};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a property link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyLinkId(pub Uuid);

impl PropertyLinkId {
    /// Create a new random link ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PropertyLinkId {
    fn default() -> Self {
        Self::new()
    }
}

/// Function used to derive the destination value from the source value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LinkEvaluator {
    /// Copy the value; integers and floats convert into each other
    Id,
    /// Negate a boolean
    Invert,
    /// Multiply a number by a constant factor
    Scale(f32),
    /// Copy camera parameters
    CameraId,
}

impl LinkEvaluator {
    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Invert => "invert",
            Self::Scale(_) => "scale",
            Self::CameraId => "cameraId",
        }
    }

    /// Whether this evaluator links cameras
    pub fn is_camera(&self) -> bool {
        matches!(self, Self::CameraId)
    }

    /// Check whether values of these kinds can be linked with this evaluator
    pub fn is_compatible(&self, source: &PropertyValue, destination: &PropertyValue) -> bool {
        use PropertyValue::{Bool, Camera, Float, Int};
        match self {
            Self::Id => {
                source.same_kind(destination)
                    || matches!((source, destination), (Int(_), Float(_)) | (Float(_), Int(_)))
            }
            Self::Invert => matches!((source, destination), (Bool(_), Bool(_))),
            Self::Scale(_) => {
                matches!(source, Int(_) | Float(_)) && matches!(destination, Int(_) | Float(_))
            }
            Self::CameraId => matches!((source, destination), (Camera(_), Camera(_))),
        }
    }

    /// Compute the new destination value
    pub fn eval(
        &self,
        source: &PropertyValue,
        destination: &PropertyValue,
    ) -> Result<PropertyValue, LinkError> {
        use PropertyValue::{Bool, Float, Int};
        if !self.is_compatible(source, destination) {
            return Err(LinkError::Incompatible {
                evaluator: self.name(),
                from: source.type_name(),
                to: destination.type_name(),
            });
        }

        let value = match (self, source, destination) {
            (Self::Invert, Bool(b), _) => Bool(!b),
            (Self::Scale(factor), Int(v), Int(_)) => Int((*v as f32 * factor).round() as i32),
            (Self::Scale(factor), Int(v), _) => Float(*v as f32 * factor),
            (Self::Scale(factor), Float(v), Int(_)) => Int((v * factor).round() as i32),
            (Self::Scale(factor), Float(v), _) => Float(v * factor),
            (Self::Id, Int(v), Float(_)) => Float(*v as f32),
            (Self::Id, Float(v), Int(_)) => Int(v.round() as i32),
            _ => source.clone(),
        };
        Ok(value)
    }
}

/// A directed link between two properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyLink {
    /// Unique link ID
    pub id: PropertyLinkId,
    /// Source property
    pub source: PropertyRef,
    /// Destination property
    pub destination: PropertyRef,
    /// Value propagation function
    pub evaluator: LinkEvaluator,
}

impl PropertyLink {
    /// Create a new link
    pub fn new(source: PropertyRef, destination: PropertyRef, evaluator: LinkEvaluator) -> Self {
        Self {
            id: PropertyLinkId::new(),
            source,
            destination,
            evaluator,
        }
    }

    /// Whether this link joins the two properties in either direction
    pub fn connects(&self, a: PropertyRef, b: PropertyRef) -> bool {
        (self.source == a && self.destination == b) || (self.source == b && self.destination == a)
    }
}

/// Error during link evaluation
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Evaluator cannot map between the value types
    #[error("Evaluator '{evaluator}' cannot link {from} to {to}")]
    Incompatible {
        /// Evaluator name
        evaluator: &'static str,
        /// Source value type
        from: &'static str,
        /// Destination value type
        to: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Camera;

    #[test]
    fn test_id_converts_numbers() {
        let v = LinkEvaluator::Id
            .eval(&PropertyValue::Float(2.6), &PropertyValue::Int(0))
            .unwrap();
        assert_eq!(v, PropertyValue::Int(3));
    }

    #[test]
    fn test_invert() {
        let v = LinkEvaluator::Invert
            .eval(&PropertyValue::Bool(true), &PropertyValue::Bool(true))
            .unwrap();
        assert_eq!(v, PropertyValue::Bool(false));
    }

    #[test]
    fn test_scale() {
        let v = LinkEvaluator::Scale(0.5)
            .eval(&PropertyValue::Float(3.0), &PropertyValue::Float(0.0))
            .unwrap();
        assert_eq!(v, PropertyValue::Float(1.5));
    }

    #[test]
    fn test_incompatible_values() {
        assert!(LinkEvaluator::CameraId
            .eval(&PropertyValue::Bool(true), &PropertyValue::Camera(Camera::default()))
            .is_err());
        assert!(!LinkEvaluator::Id.is_compatible(&PropertyValue::Text("a".into()), &PropertyValue::Int(1)));
    }
}
