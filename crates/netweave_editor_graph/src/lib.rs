// SPDX-License-Identifier: MIT OR Apache-2.0
//! Network editor model for `netweave`.
//!
//! Mirrors a [`netweave_network::ProcessorNetwork`] as a graph of nodes and
//! arrows that can be regrouped without touching the network itself.
//!
//! ## Architecture
//!
//! - [`EditorScene`] follows the network through its events
//! - Aggregates fold several nodes into one and redirect their arrows
//! - Property links between the same two properties share one arrow
//! - Connection bundles route several port arrows through common handles
//! - Auto layout stacks nodes in layers along the data flow
//! - [`NetworkEditor`] runs user actions and stores editor state as network meta-data

pub mod handle;
pub mod node;
pub mod arrow;
pub mod link_registry;
pub mod graph;
pub mod aggregation;
pub mod bundle;
pub mod scene;
pub mod view;
pub mod settings;
pub mod layout;
pub mod editor;

pub use handle::{BundleHandle, NodeHandle, PortArrowHandle, PortRef, PropertyArrowHandle, PropertyEndpoint};
pub use node::{AggregateData, Node, NodeKind, PortHandle};
pub use arrow::{ArrowKind, LinkStub, PortArrow, PropertyArrow, StubOrigin};
pub use link_registry::{ArrowEnd, PropertyLinkRegistry, RegistryError, Unregistered};
pub use graph::{EditorGraph, GraphError};
pub use aggregation::AggregationRecord;
pub use bundle::{
    ArrowGeometry, BundleChange, BundleError, BundleManager, BundleRecord, BundleStyle, ConnectionBundle,
};
pub use scene::EditorScene;
pub use view::{render, EditorViewState, Layer, SceneVisitor, ZoomTransform};
pub use settings::{EditorSettings, SettingsError, SETTINGS_FILE_NAME, SETTINGS_FORMAT_VERSION};
pub use editor::{EditorError, NetworkEditor};
