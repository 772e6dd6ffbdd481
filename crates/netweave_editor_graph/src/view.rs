// SPDX-License-Identifier: MIT OR Apache-2.0
//! View state and the renderer-independent scene walk.

use crate::arrow::{ArrowKind, LinkStub};
use crate::bundle::ConnectionBundle;
use crate::handle::{NodeHandle, PortArrowHandle, PropertyArrowHandle};
use crate::node::Node;
use crate::scene::EditorScene;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Editor-wide view mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Layer {
    /// Port connections are editable
    #[default]
    DataFlow,
    /// Property links are editable
    GeneralLinking,
    /// Only camera links are shown
    CameraLinking,
}

impl Layer {
    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Layer::DataFlow => "Data Flow",
            Layer::GeneralLinking => "Linking",
            Layer::CameraLinking => "Camera Linking",
        }
    }
}

/// 2D affine view transform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomTransform {
    /// Row 1, column 1
    pub m11: f32,
    /// Row 1, column 2
    pub m12: f32,
    /// Row 2, column 1
    pub m21: f32,
    /// Row 2, column 2
    pub m22: f32,
    /// Horizontal translation
    pub dx: f32,
    /// Vertical translation
    pub dy: f32,
}

impl Default for ZoomTransform {
    fn default() -> Self {
        Self::scale(1.0)
    }
}

impl ZoomTransform {
    /// Uniform scaling without translation
    pub fn scale(factor: f32) -> Self {
        Self {
            m11: factor,
            m12: 0.0,
            m21: 0.0,
            m22: factor,
            dx: 0.0,
            dy: 0.0,
        }
    }

    /// Map a scene point into view coordinates
    pub fn map(&self, point: [f32; 2]) -> [f32; 2] {
        [
            self.m11 * point[0] + self.m21 * point[1] + self.dx,
            self.m12 * point[0] + self.m22 * point[1] + self.dy,
        ]
    }
}

/// Explicit view state passed to queries and actions
#[derive(Debug, Clone, Default)]
pub struct EditorViewState {
    /// Current layer
    pub layer: Layer,
    /// Selected top-level nodes
    pub selected_nodes: IndexSet<NodeHandle>,
    /// Selected port arrows
    pub selected_port_arrows: IndexSet<PortArrowHandle>,
    /// Selected property arrows
    pub selected_property_arrows: IndexSet<PropertyArrowHandle>,
    /// View transform
    pub zoom: ZoomTransform,
    /// Scene position of the last context-menu request; paste target
    pub right_click_position: [f32; 2],
    /// Hide camera links on the general linking layer
    pub hide_camera_links: bool,
    /// Provisional arrow of a drag in progress
    pub drag: Option<LinkStub>,
}

impl EditorViewState {
    /// Deselect everything
    pub fn clear_selection(&mut self) {
        self.selected_nodes.clear();
        self.selected_port_arrows.clear();
        self.selected_property_arrows.clear();
    }

    /// Select one node and nothing else
    pub fn select_only(&mut self, node: NodeHandle) {
        self.clear_selection();
        self.selected_nodes.insert(node);
    }

    /// Whether nothing is selected
    pub fn selection_is_empty(&self) -> bool {
        self.selected_nodes.is_empty()
            && self.selected_port_arrows.is_empty()
            && self.selected_property_arrows.is_empty()
    }
}

/// Receives the visible items of a scene, e.g. a painter
pub trait SceneVisitor {
    /// A top-level node
    fn node(&mut self, node: &Node, selected: bool);
    /// An arrow; `interactive` is false for arrows shown only for context
    fn arrow(&mut self, arrow: ArrowKind<'_>, interactive: bool, selected: bool);
    /// A bundle with at least one visible member
    fn bundle(&mut self, _bundle: &ConnectionBundle) {}
}

/// Walk the items visible on the current layer
pub fn render(scene: &EditorScene, view: &EditorViewState, visitor: &mut dyn SceneVisitor) {
    for node in scene.graph.top_level_nodes() {
        visitor.node(node, view.selected_nodes.contains(&node.handle));
    }

    let port_arrows_interactive = view.layer == Layer::DataFlow;
    if view.layer != Layer::CameraLinking {
        for arrow in scene.graph.visible_port_arrows() {
            let selected = view.selected_port_arrows.contains(&arrow.handle);
            visitor.arrow(ArrowKind::PortArrow(arrow), port_arrows_interactive, selected);
        }
    }

    if view.layer == Layer::DataFlow {
        for bundle in scene.bundles.bundles() {
            let visible = bundle
                .links()
                .iter()
                .any(|l| scene.graph.port_arrow(*l).is_some_and(|a| a.is_visible()));
            if visible {
                visitor.bundle(bundle);
            }
        }
    }

    if view.layer != Layer::DataFlow {
        for arrow in scene.graph.links().visible_arrows() {
            let shown = match view.layer {
                Layer::CameraLinking => arrow.evaluator.is_camera(),
                _ => !(view.hide_camera_links && arrow.evaluator.is_camera()),
            };
            if shown {
                let selected = view.selected_property_arrows.contains(&arrow.handle);
                visitor.arrow(ArrowKind::PropertyArrow(arrow), true, selected);
            }
        }
    }

    if let Some(stub) = &view.drag {
        visitor.arrow(ArrowKind::LinkStub(stub), true, false);
    }
}
