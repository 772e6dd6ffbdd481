// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stable integer handles into the editor arenas.
//!
//! Handles are allocated monotonically and never reused, so a stale handle
//! simply fails to resolve instead of aliasing a newer item.

use netweave_network::{PortId, PropertyRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of a node (leaf or aggregate)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeHandle(pub u32);

/// Handle of a port arrow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortArrowHandle(pub u32);

/// Handle of a property-link arrow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyArrowHandle(pub u32);

/// Handle of a connection bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BundleHandle(pub u32);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

impl fmt::Display for PortArrowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port-arrow#{}", self.0)
    }
}

impl fmt::Display for BundleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bundle#{}", self.0)
    }
}

/// Monotonic handle counter
#[derive(Debug, Default)]
pub(crate) struct HandleAllocator {
    next: u32,
}

impl HandleAllocator {
    pub(crate) fn next(&mut self) -> u32 {
        self.next += 1;
        self.next
    }
}

/// A port as shown on a specific node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    /// Node showing the port
    pub node: NodeHandle,
    /// Underlying port
    pub port: PortId,
}

impl PortRef {
    /// Create a new port reference
    pub fn new(node: NodeHandle, port: PortId) -> Self {
        Self { node, port }
    }
}

/// A property as shown on a specific node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyEndpoint {
    /// Node showing the property handle
    pub node: NodeHandle,
    /// Underlying property
    pub property: PropertyRef,
}

impl PropertyEndpoint {
    /// Create a new property endpoint
    pub fn new(node: NodeHandle, property: PropertyRef) -> Self {
        Self { node, property }
    }
}
