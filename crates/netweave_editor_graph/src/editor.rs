// SPDX-License-Identifier: MIT OR Apache-2.0
//! Network editor: user actions on a processor network and its scene.
//!
//! Every action mutates the network first and then replays the network's
//! events into the scene, so the scene never diverges from the network.
//! Editor-only state (aggregations, bundles, selection, zoom) is written back
//! to the network's meta-data.

use crate::aggregation::AggregationRecord;
use crate::arrow::{LinkStub, StubOrigin};
use crate::bundle::{BundleError, BundleRecord};
use crate::graph::{EditorGraph, GraphError};
use crate::handle::{BundleHandle, NodeHandle, PortArrowHandle, PortRef, PropertyArrowHandle};
use crate::layout;
use crate::scene::EditorScene;
use crate::settings::EditorSettings;
use crate::view::{EditorViewState, Layer, ZoomTransform};
use netweave_network::{
    LinkEvaluator, MetaDataError, NetworkError, PositionMetaData, Processor, ProcessorId, ProcessorNetwork,
    PortId, PropertyLink, PropertyLinkId, PropertyRef,
};

/// Network meta-data key of the aggregation records
pub const AGGREGATION_KEY: &str = "Aggregation";
/// Network meta-data key of the bundle records
pub const BUNDLES_KEY: &str = "Bundles";
/// Network meta-data key of the selected processors
pub const SELECTION_KEY: &str = "ProcessorSelection";
/// Network meta-data key of the view transform
pub const ZOOM_KEY: &str = "Zoom";
/// Network meta-data key of the camera auto-linking flag
pub const AUTO_LINK_CAMERAS_KEY: &str = "autoLinkCameras";

/// Editor for one processor network
#[derive(Debug)]
pub struct NetworkEditor {
    network: ProcessorNetwork,
    scene: EditorScene,
    view: EditorViewState,
    settings: EditorSettings,
    network_locked: bool,
    auto_link_cameras: bool,
    clipboard: Option<String>,
    notices: Vec<String>,
}

impl NetworkEditor {
    /// Create an editor for a new, empty network
    pub fn new(settings: EditorSettings) -> Self {
        Self {
            network: ProcessorNetwork::default(),
            scene: EditorScene::new(settings.bundle_style()),
            view: EditorViewState::default(),
            auto_link_cameras: settings.auto_link_cameras,
            settings,
            network_locked: false,
            clipboard: None,
            notices: Vec::new(),
        }
    }

    /// Open a network and restore the editor state stored in its meta-data.
    ///
    /// Unreadable meta-data entries are skipped with a warning.
    pub fn open(mut network: ProcessorNetwork, settings: EditorSettings) -> Result<Self, EditorError> {
        network.take_events();
        let scene = EditorScene::from_network(&network, settings.bundle_style());
        let mut editor = Self {
            network,
            scene,
            ..Self::new(settings)
        };
        editor.remove_rejected_links();

        if let Some(records) = editor.read_meta::<Vec<AggregationRecord>>(AGGREGATION_KEY) {
            let restored = editor.scene.graph.restore_aggregations(&records);
            tracing::debug!("Restored {restored} of {} aggregations", records.len());
        }
        if let Some(records) = editor.read_meta::<Vec<BundleRecord>>(BUNDLES_KEY) {
            let scene = &mut editor.scene;
            let restored = scene
                .bundles
                .restore(&records, |outport, inport| scene.graph.find_port_arrow(outport, inport));
            tracing::debug!("Restored {restored} of {} bundles", records.len());
        }
        if let Some(selection) = editor.read_meta::<Vec<ProcessorId>>(SELECTION_KEY) {
            for processor in selection {
                if let Some(node) = editor.scene.graph.outermost(processor) {
                    editor.view.selected_nodes.insert(node);
                }
            }
        }
        if let Some(zoom) = editor.read_meta::<ZoomTransform>(ZOOM_KEY) {
            editor.view.zoom = zoom;
        }
        if let Some(auto) = editor.read_meta::<bool>(AUTO_LINK_CAMERAS_KEY) {
            editor.auto_link_cameras = auto;
        }

        if editor.auto_link_cameras {
            let processors: Vec<ProcessorId> = editor.network.processor_ids().collect();
            let created = editor.network.create_camera_links(&processors);
            if created > 0 {
                tracing::info!("Linked cameras with {created} new links");
            }
        }
        editor.sync()?;

        tracing::info!(
            "Opened network '{}' with {} processors",
            editor.network.name,
            editor.network.processor_count()
        );
        Ok(editor)
    }

    // ------------------------------------------------------------------
    // state access
    // ------------------------------------------------------------------

    /// The edited network
    pub fn network(&self) -> &ProcessorNetwork {
        &self.network
    }

    /// Mutable access to the network; call [`sync`](Self::sync) afterwards
    pub fn network_mut(&mut self) -> &mut ProcessorNetwork {
        &mut self.network
    }

    /// Give up the editor and keep the network
    pub fn into_network(self) -> ProcessorNetwork {
        self.network
    }

    /// Scene mirroring the network
    pub fn scene(&self) -> &EditorScene {
        &self.scene
    }

    /// Node graph of the scene
    pub fn graph(&self) -> &EditorGraph {
        &self.scene.graph
    }

    /// View state
    pub fn view(&self) -> &EditorViewState {
        &self.view
    }

    /// Settings the editor was created with
    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    /// Text of the last copy
    pub fn clipboard(&self) -> Option<&str> {
        self.clipboard.as_deref()
    }

    /// Messages for the user collected since the last call
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    // ------------------------------------------------------------------
    // synchronization
    // ------------------------------------------------------------------

    /// Replay pending network events into the scene and persist what changed.
    ///
    /// Returns the links that were rejected as duplicates and removed again.
    pub fn sync(&mut self) -> Result<Vec<PropertyLinkId>, EditorError> {
        let mut rejected = Vec::new();
        while self.network.has_pending_events() {
            self.network.dispatch_events(&mut self.scene);
            rejected.extend(self.remove_rejected_links());

            let added = self.scene.take_added();
            if self.auto_link_cameras {
                for processor in added {
                    self.network.link_cameras_of(processor);
                }
            }
            for node in self.scene.take_removed() {
                self.view.selected_nodes.shift_remove(&node);
            }
        }

        let graph = &self.scene.graph;
        self.view
            .selected_port_arrows
            .retain(|h| graph.port_arrow(*h).is_some());
        self.view
            .selected_property_arrows
            .retain(|h| graph.links().arrow(*h).is_some());

        if self.scene.take_records_changed() {
            self.persist_records()?;
        }
        if self.scene.take_bundles_changed() {
            self.persist_bundles()?;
        }
        Ok(rejected)
    }

    fn remove_rejected_links(&mut self) -> Vec<PropertyLinkId> {
        let mut removed = Vec::new();
        for link in self.scene.take_rejected() {
            if let Err(e) = self.network.remove_property_link(link.id) {
                tracing::debug!("Rejected link already gone: {e}");
            }
            self.notices
                .push("A link between these properties already exists; the new link was removed".to_string());
            removed.push(link.id);
        }
        removed
    }

    /// Set the advisory flag telling that the network is being evaluated
    pub fn set_network_locked(&mut self, locked: bool) {
        self.network_locked = locked;
    }

    /// Whether the network is being evaluated
    pub fn is_network_locked(&self) -> bool {
        self.network_locked
    }

    fn guard(&mut self, action: &str) -> Result<(), EditorError> {
        if self.network_locked {
            let err = EditorError::NetworkLocked {
                action: action.to_string(),
            };
            self.notices.push(err.to_string());
            return Err(err);
        }
        Ok(())
    }

    fn notify<T>(&mut self, result: Result<T, EditorError>) -> Result<T, EditorError> {
        if let Err(e) = &result {
            self.notices.push(e.to_string());
        }
        result
    }

    // ------------------------------------------------------------------
    // processors and nodes
    // ------------------------------------------------------------------

    /// Add a processor; returns its node
    pub fn add_processor(&mut self, processor: Processor) -> Result<NodeHandle, EditorError> {
        let id = self.network.add_processor(processor)?;
        self.sync()?;
        self.scene
            .graph
            .leaf(id)
            .ok_or(EditorError::Graph(GraphError::ProcessorNotFound(id)))
    }

    /// Remove a top-level node together with all processors it contains
    pub fn remove_node(&mut self, handle: NodeHandle) -> Result<(), EditorError> {
        self.guard("delete")?;
        self.top_level_node(handle)?;
        for processor in self.scene.graph.processors(handle) {
            self.network.remove_processor(processor)?;
        }
        self.sync()?;
        Ok(())
    }

    /// Rename a node; leaves rename their processor, which may adjust the name
    pub fn rename_node(&mut self, handle: NodeHandle, name: &str) -> Result<String, EditorError> {
        let node = self.top_level_node(handle)?;
        match node.processor() {
            Some(processor) => {
                let name = self.network.rename_processor(processor, name)?;
                self.sync()?;
                Ok(name)
            }
            None => {
                self.scene.graph.rename_node(handle, name)?;
                self.persist_records()?;
                Ok(name.to_string())
            }
        }
    }

    /// Move a top-level node
    pub fn move_node(&mut self, handle: NodeHandle, position: [f32; 2]) -> Result<(), EditorError> {
        let node = self.top_level_node(handle)?;
        let processor = node.processor();
        self.scene.graph.set_node_position(handle, position)?;
        match processor {
            Some(processor) => self
                .network
                .set_processor_position(processor, PositionMetaData::from_point(position))?,
            None => self.persist_records()?,
        }

        let touching: Vec<PortArrowHandle> = self
            .scene
            .graph
            .port_arrows()
            .filter(|a| a.touches(handle))
            .map(|a| a.handle)
            .collect();
        if touching.iter().any(|a| self.scene.bundles.is_bundled(*a)) {
            let scene = &mut self.scene;
            scene.bundles.refresh(&touching, &scene.graph);
            self.persist_bundles()?;
        }
        Ok(())
    }

    /// Replace the processor of a top-level leaf; connections and links are carried over
    pub fn replace_processor(
        &mut self,
        handle: NodeHandle,
        replacement: Processor,
    ) -> Result<NodeHandle, EditorError> {
        self.guard("replace")?;
        let result = self.replace_leaf(handle, replacement);
        self.notify(result)
    }

    fn replace_leaf(&mut self, handle: NodeHandle, replacement: Processor) -> Result<NodeHandle, EditorError> {
        let old = self.top_level_node(handle)?.processor().ok_or_else(|| {
            GraphError::InvalidOperation(format!("{handle} is an aggregate and cannot be replaced"))
        })?;
        let id = self.network.replace_processor(old, replacement)?;
        self.sync()?;
        let node = self
            .scene
            .graph
            .leaf(id)
            .ok_or(EditorError::Graph(GraphError::ProcessorNotFound(id)))?;
        tracing::info!("Replaced processor of {handle} by {node}");
        Ok(node)
    }

    fn top_level_node(&self, handle: NodeHandle) -> Result<&crate::node::Node, EditorError> {
        let node = self
            .scene
            .graph
            .node(handle)
            .ok_or(GraphError::NodeNotFound(handle))?;
        if !self.scene.graph.is_top_level(handle) {
            return Err(GraphError::InvalidOperation(format!("{handle} is inside an aggregate")).into());
        }
        Ok(node)
    }

    // ------------------------------------------------------------------
    // connections and links
    // ------------------------------------------------------------------

    /// Connect two ports; returns the new arrow
    pub fn connect(
        &mut self,
        outport: PortId,
        inport: PortId,
    ) -> Result<PortArrowHandle, EditorError> {
        self.network.connect_ports(outport, inport)?;
        self.sync()?;
        self.scene
            .graph
            .find_port_arrow(outport, inport)
            .ok_or_else(|| GraphError::InvalidOperation("connection has no arrow".into()).into())
    }

    /// Disconnect the connection shown by an arrow
    pub fn disconnect(&mut self, arrow: PortArrowHandle) -> Result<(), EditorError> {
        let arrow = self
            .scene
            .graph
            .port_arrow(arrow)
            .ok_or(GraphError::PortArrowNotFound(arrow))?;
        let (outport, inport) = (arrow.source.port, arrow.destination.port);
        self.network.disconnect_ports(outport, inport)?;
        self.sync()?;
        Ok(())
    }

    /// Link two properties.
    ///
    /// A link opposite to an existing one joins that arrow. A link the arrow
    /// registry refuses is removed from the network again.
    pub fn link_properties(
        &mut self,
        source: PropertyRef,
        destination: PropertyRef,
        evaluator: LinkEvaluator,
    ) -> Result<PropertyArrowHandle, EditorError> {
        self.guard("link creation")?;
        let id = self.network.create_property_link(source, destination, evaluator)?;
        let rejected = self.sync()?;
        if rejected.contains(&id) {
            return Err(EditorError::DuplicateLink(id));
        }
        self.scene
            .graph
            .links()
            .arrow_for_link(id)
            .map(|a| a.handle)
            .ok_or_else(|| GraphError::InvalidOperation("property link has no arrow".into()).into())
    }

    /// Remove every link shown by a property arrow
    pub fn unlink_properties(&mut self, arrow: PropertyArrowHandle) -> Result<(), EditorError> {
        let links: Vec<PropertyLinkId> = self
            .scene
            .graph
            .links()
            .arrow(arrow)
            .ok_or_else(|| GraphError::InvalidOperation(format!("property arrow {} not found", arrow.0)))?
            .links()
            .collect();
        for link in links {
            self.network.remove_property_link(link)?;
        }
        self.sync()?;
        Ok(())
    }

    /// Remove property links of the selected processors, or every link when nothing is selected.
    ///
    /// A single selected processor loses all links touching it; several
    /// selected processors lose the links among them. Returns the number of
    /// removed links.
    pub fn delete_links(&mut self) -> Result<usize, EditorError> {
        self.guard("link removal")?;
        let links = self.links_in_scope(|_| true);
        self.remove_links(&links, "property")
    }

    /// Like [`delete_links`](Self::delete_links), restricted to links between camera properties
    pub fn delete_camera_links(&mut self) -> Result<usize, EditorError> {
        self.guard("link removal")?;
        let links = self.links_in_scope(|link| self.is_camera_link(link));
        self.remove_links(&links, "camera")
    }

    /// Remove every property link of the network
    pub fn remove_all_property_links(&mut self) -> Result<usize, EditorError> {
        self.guard("link removal")?;
        let links: Vec<PropertyLinkId> = self.network.property_links().map(|l| l.id).collect();
        self.remove_links(&links, "property")
    }

    /// Link the cameras of the selected processors, or of all processors when nothing is selected.
    ///
    /// A single selected processor is linked with every other camera in the
    /// network. Returns the number of created links.
    pub fn link_cameras(&mut self) -> Result<usize, EditorError> {
        self.guard("link creation")?;
        let scope = self.link_scope();
        let created = match scope.as_slice() {
            [single] => self.network.link_cameras_of(*single),
            _ => self.network.create_camera_links(&scope),
        };
        self.sync()?;
        if created > 0 {
            tracing::info!("Created {created} camera links");
        }
        Ok(created)
    }

    fn link_scope(&self) -> Vec<ProcessorId> {
        let selected = self.selected_processors();
        if selected.is_empty() {
            self.network.processor_ids().collect()
        } else {
            selected
        }
    }

    fn links_in_scope(&self, keep: impl Fn(&PropertyLink) -> bool) -> Vec<PropertyLinkId> {
        let scope = self.link_scope();
        let single = scope.len() == 1;
        self.network
            .property_links()
            .filter(|l| {
                let from = scope.contains(&l.source.processor);
                let to = scope.contains(&l.destination.processor);
                if single { from || to } else { from && to }
            })
            .filter(|l| keep(l))
            .map(|l| l.id)
            .collect()
    }

    fn is_camera_link(&self, link: &PropertyLink) -> bool {
        [link.source, link.destination]
            .into_iter()
            .all(|p| self.network.property(p).is_some_and(|p| p.value.is_camera()))
    }

    fn remove_links(&mut self, links: &[PropertyLinkId], kind: &str) -> Result<usize, EditorError> {
        for link in links {
            self.network.remove_property_link(*link)?;
        }
        self.sync()?;
        if !links.is_empty() {
            tracing::info!("Removed {} {kind} links", links.len());
        }
        Ok(links.len())
    }

    // ------------------------------------------------------------------
    // layout
    // ------------------------------------------------------------------

    /// Arrange all top-level nodes in layers following the data flow
    pub fn sort_network(&mut self) -> Result<(), EditorError> {
        self.guard("sorting")?;
        let nodes = self.scene.graph.top_level_handles();
        self.arrange(&nodes)
    }

    /// Arrange the selected nodes in layers, starting at their top-left corner
    pub fn sort_selection(&mut self) -> Result<(), EditorError> {
        self.guard("sorting")?;
        let nodes: Vec<NodeHandle> = self.view.selected_nodes.iter().copied().collect();
        if nodes.len() < 2 {
            let err = GraphError::InvalidOperation("sorting needs at least two selected nodes".into());
            return self.notify(Err(err.into()));
        }
        self.arrange(&nodes)
    }

    fn arrange(&mut self, nodes: &[NodeHandle]) -> Result<(), EditorError> {
        let graph = &self.scene.graph;
        let index = |h: NodeHandle| nodes.iter().position(|n| *n == h);
        let positions: Vec<[f32; 2]> = nodes
            .iter()
            .map(|n| graph.node(*n).map(|node| node.position).ok_or(GraphError::NodeNotFound(*n)))
            .collect::<Result<_, _>>()?;
        let edges: Vec<(usize, usize)> = graph
            .visible_port_arrows()
            .filter_map(|a| Some((index(a.source.node)?, index(a.destination.node)?)))
            .collect();

        let arranged = layout::layered_positions(&positions, &edges);
        for ((node, old), new) in nodes.iter().zip(&positions).zip(arranged) {
            if *old != new {
                self.move_node(*node, new)?;
            }
        }
        tracing::info!("Arranged {} nodes", nodes.len());
        Ok(())
    }

    // ------------------------------------------------------------------
    // aggregation
    // ------------------------------------------------------------------

    /// Fold top-level nodes into an aggregate, which becomes the only selected node
    pub fn aggregate(&mut self, nodes: &[NodeHandle], name: Option<&str>) -> Result<NodeHandle, EditorError> {
        self.guard("aggregate")?;
        let name = name.unwrap_or(&self.settings.default_aggregate_name).to_string();
        let handle = self.scene.graph.aggregate(nodes, &name)?;
        self.view.select_only(handle);
        self.after_regrouping()?;
        Ok(handle)
    }

    /// Aggregate the selected nodes
    pub fn aggregate_selection(&mut self) -> Result<NodeHandle, EditorError> {
        let nodes: Vec<NodeHandle> = self.view.selected_nodes.iter().copied().collect();
        self.aggregate(&nodes, None)
    }

    /// Unfold an aggregate; its children become selected
    pub fn deaggregate(&mut self, handle: NodeHandle) -> Result<Vec<NodeHandle>, EditorError> {
        self.guard("deaggregate")?;
        let children = self.scene.graph.deaggregate(handle)?;
        for child in &children {
            let Some(node) = self.scene.graph.node(*child) else {
                continue;
            };
            if let Some(processor) = node.processor() {
                let position = PositionMetaData::from_point(node.position);
                self.network.set_processor_position(processor, position)?;
            }
        }
        self.view.clear_selection();
        self.view.selected_nodes.extend(children.iter().copied());
        self.after_regrouping()?;
        Ok(children)
    }

    fn after_regrouping(&mut self) -> Result<(), EditorError> {
        let all: Vec<PortArrowHandle> = self.scene.graph.port_arrows().map(|a| a.handle).collect();
        let scene = &mut self.scene;
        scene.bundles.refresh(&all, &scene.graph);
        self.persist_records()?;
        self.persist_bundles()?;
        self.persist_selection()
    }

    // ------------------------------------------------------------------
    // bundles
    // ------------------------------------------------------------------

    /// Bundle port arrows
    pub fn bundle(&mut self, arrows: &[PortArrowHandle]) -> Result<BundleHandle, EditorError> {
        self.guard("bundle")?;
        let scene = &mut self.scene;
        let handle = scene.bundles.bundle(arrows, &scene.graph)?;
        self.persist_bundles()?;
        Ok(handle)
    }

    /// Bundle the selected port arrows
    pub fn bundle_selection(&mut self) -> Result<BundleHandle, EditorError> {
        let arrows: Vec<PortArrowHandle> = self.view.selected_port_arrows.iter().copied().collect();
        self.bundle(&arrows)
    }

    /// Dissolve a bundle
    pub fn unbundle(&mut self, bundle: BundleHandle) -> Result<(), EditorError> {
        self.guard("unbundle")?;
        self.scene.bundles.unbundle(bundle)?;
        self.persist_bundles()
    }

    /// Add a routing handle to a bundle; returns its index
    pub fn add_bundle_handle(&mut self, bundle: BundleHandle, point: [f32; 2]) -> Result<usize, EditorError> {
        self.guard("adding a bundle handle")?;
        let index = self.scene.bundles.add_handle(bundle, point)?;
        self.persist_bundles()?;
        Ok(index)
    }

    /// Drag a routing handle of a bundle
    pub fn move_bundle_handle(
        &mut self,
        bundle: BundleHandle,
        index: usize,
        point: [f32; 2],
    ) -> Result<(), EditorError> {
        self.scene.bundles.move_handle(bundle, index, point)?;
        self.persist_bundles()
    }

    // ------------------------------------------------------------------
    // view state
    // ------------------------------------------------------------------

    /// Select top-level nodes, replacing the selection
    pub fn select_nodes(&mut self, nodes: &[NodeHandle]) -> Result<(), EditorError> {
        if let Some(node) = nodes.iter().find(|n| !self.scene.graph.is_top_level(**n)) {
            return Err(GraphError::InvalidOperation(format!("{node} is not a top-level node")).into());
        }
        self.view.clear_selection();
        self.view.selected_nodes.extend(nodes.iter().copied());
        self.persist_selection()
    }

    /// Select port arrows in addition to the current selection
    pub fn select_port_arrows(&mut self, arrows: &[PortArrowHandle]) {
        let graph = &self.scene.graph;
        self.view
            .selected_port_arrows
            .extend(arrows.iter().copied().filter(|a| graph.port_arrow(*a).is_some()));
    }

    /// Select property arrows in addition to the current selection
    pub fn select_property_arrows(&mut self, arrows: &[PropertyArrowHandle]) {
        let graph = &self.scene.graph;
        self.view
            .selected_property_arrows
            .extend(arrows.iter().copied().filter(|a| graph.links().arrow(*a).is_some()));
    }

    /// Deselect everything
    pub fn clear_selection(&mut self) -> Result<(), EditorError> {
        self.view.clear_selection();
        self.persist_selection()
    }

    /// Switch layers; a drag in progress is cancelled
    pub fn set_layer(&mut self, layer: Layer) {
        if self.view.drag.take().is_some() {
            tracing::debug!("Drag cancelled by layer switch");
        }
        self.view.layer = layer;
    }

    /// Set the view transform
    pub fn set_zoom(&mut self, zoom: ZoomTransform) -> Result<(), EditorError> {
        self.view.zoom = zoom;
        self.network.meta.set(ZOOM_KEY, &zoom)?;
        Ok(())
    }

    /// Remember where the context menu was opened
    pub fn set_right_click_position(&mut self, point: [f32; 2]) {
        self.view.right_click_position = point;
    }

    /// Hide or show camera links on the general linking layer
    pub fn set_hide_camera_links(&mut self, hide: bool) {
        self.view.hide_camera_links = hide;
    }

    /// Turn camera auto-linking on or off; turning it on links all cameras
    pub fn set_auto_link_cameras(&mut self, enabled: bool) -> Result<(), EditorError> {
        self.auto_link_cameras = enabled;
        self.network.meta.set(AUTO_LINK_CAMERAS_KEY, &enabled)?;
        if enabled {
            let processors: Vec<ProcessorId> = self.network.processor_ids().collect();
            self.network.create_camera_links(&processors);
            self.sync()?;
        }
        Ok(())
    }

    /// Whether new processors get their cameras linked
    pub fn auto_link_cameras(&self) -> bool {
        self.auto_link_cameras
    }

    // ------------------------------------------------------------------
    // arrow drags
    // ------------------------------------------------------------------

    /// Start dragging a new connection from a port of a top-level node
    pub fn begin_port_drag(&mut self, port: PortRef, point: [f32; 2]) -> Result<(), EditorError> {
        if self.view.layer != Layer::DataFlow {
            return Err(GraphError::InvalidOperation("ports are only editable on the data flow layer".into()).into());
        }
        if !self.top_level_node(port.node)?.has_port(port.port) {
            return Err(GraphError::InvalidOperation(format!("{} does not show this port", port.node)).into());
        }
        self.view.drag = Some(LinkStub {
            origin: StubOrigin::Port(port),
            tip: point,
        });
        Ok(())
    }

    /// Start dragging a new property link from a top-level node
    pub fn begin_link_drag(&mut self, node: NodeHandle, point: [f32; 2]) -> Result<(), EditorError> {
        if self.view.layer == Layer::DataFlow {
            return Err(GraphError::InvalidOperation("links are only editable on the linking layers".into()).into());
        }
        self.top_level_node(node)?;
        self.view.drag = Some(LinkStub {
            origin: StubOrigin::Node(node),
            tip: point,
        });
        Ok(())
    }

    /// Follow the pointer with the free end of the drag arrow
    pub fn update_drag(&mut self, point: [f32; 2]) {
        if let Some(stub) = &mut self.view.drag {
            stub.tip = point;
        }
    }

    /// Finish a port drag over `target`.
    ///
    /// Only a compatible outport/inport pair is connected; anything else
    /// discards the drag without side effects and returns `None`.
    pub fn end_port_drag(&mut self, target: Option<PortRef>) -> Result<Option<PortArrowHandle>, EditorError> {
        let Some(LinkStub {
            origin: StubOrigin::Port(origin),
            ..
        }) = self.view.drag.take()
        else {
            return Ok(None);
        };
        let Some(target) = target else {
            return Ok(None);
        };
        let (Some((_, a)), Some((_, b))) = (self.network.find_port(origin.port), self.network.find_port(target.port))
        else {
            return Ok(None);
        };
        let (outport, inport) = if a.is_outport() { (a, b) } else { (b, a) };
        if !outport.can_connect(inport) || self.network.connection_between(outport.id, inport.id).is_some() {
            return Ok(None);
        }
        let (outport, inport) = (outport.id, inport.id);
        match self.connect(outport, inport) {
            Ok(arrow) => Ok(Some(arrow)),
            Err(EditorError::Network(e)) => {
                self.notices.push(e.to_string());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Finish a link drag over `target`; returns the node pair to link
    pub fn end_link_drag(&mut self, target: Option<NodeHandle>) -> Option<(NodeHandle, NodeHandle)> {
        let Some(LinkStub {
            origin: StubOrigin::Node(origin),
            ..
        }) = self.view.drag.take()
        else {
            return None;
        };
        target
            .filter(|t| self.scene.graph.is_top_level(*t))
            .map(|t| (origin, t))
    }

    // ------------------------------------------------------------------
    // clipboard and deletion
    // ------------------------------------------------------------------

    /// Copy the processors of the selected nodes with the connections and links among them
    pub fn copy_selection(&mut self) -> Result<String, EditorError> {
        self.guard("copy")?;
        let processors = self.selected_processors();
        if processors.is_empty() {
            return Err(GraphError::InvalidOperation("nothing selected to copy".into()).into());
        }
        let text = self
            .network
            .clone_sub_network(&processors)
            .map_err(EditorError::from)
            .and_then(|sub| sub.to_ron().map_err(EditorError::Serialization));
        let text = self.notify(text)?;
        self.clipboard = Some(text.clone());
        tracing::info!("Copied {} processors", processors.len());
        Ok(text)
    }

    /// Whether `text` holds a pastable network
    pub fn can_paste(text: &str) -> bool {
        ProcessorNetwork::from_ron(text).is_ok_and(|n| n.processor_count() > 0)
    }

    /// Paste a copied network centred on the last right-click position.
    ///
    /// Every processor needs a position. Returns the new nodes, which become
    /// the selection.
    pub fn paste(&mut self, text: &str) -> Result<Vec<NodeHandle>, EditorError> {
        self.guard("paste")?;
        let result = self.paste_network(text);
        self.notify(result)
    }

    fn paste_network(&mut self, text: &str) -> Result<Vec<NodeHandle>, EditorError> {
        let mut sub = ProcessorNetwork::from_ron(text).map_err(EditorError::Serialization)?;
        if sub.processor_count() == 0 {
            return Err(EditorError::EmptyClipboard);
        }

        let mut positions = Vec::with_capacity(sub.processor_count());
        for processor in sub.processors() {
            let position = processor
                .position()?
                .ok_or_else(|| EditorError::MissingPositionMetaData(processor.name.clone()))?;
            positions.push((processor.id, position));
        }
        let min_x = positions.iter().map(|(_, p)| p.x).min().unwrap_or(0);
        let max_x = positions.iter().map(|(_, p)| p.x).max().unwrap_or(0);
        let min_y = positions.iter().map(|(_, p)| p.y).min().unwrap_or(0);
        let max_y = positions.iter().map(|(_, p)| p.y).max().unwrap_or(0);
        let center = PositionMetaData {
            x: (min_x + max_x) / 2,
            y: (min_y + max_y) / 2,
        };
        let target = PositionMetaData::from_point(self.view.right_click_position);
        for (id, p) in positions {
            let moved = PositionMetaData {
                x: p.x + target.x - center.x,
                y: p.y + target.y - center.y,
            };
            sub.set_processor_position(id, moved)?;
        }

        let added = self.network.merge_sub_network(sub);
        self.sync()?;
        let nodes: Vec<NodeHandle> = added.iter().filter_map(|p| self.scene.graph.leaf(*p)).collect();
        self.view.clear_selection();
        self.view.selected_nodes.extend(nodes.iter().copied());
        self.persist_selection()?;
        tracing::info!("Pasted {} processors", nodes.len());
        Ok(nodes)
    }

    /// Paste the editor's own clipboard
    pub fn paste_clipboard(&mut self) -> Result<Vec<NodeHandle>, EditorError> {
        let Some(text) = self.clipboard.clone() else {
            return self.notify(Err(EditorError::EmptyClipboard));
        };
        self.paste(&text)
    }

    /// Delete selected arrows and the processors of selected nodes
    pub fn delete_selection(&mut self) -> Result<(), EditorError> {
        self.guard("delete")?;
        let graph = &self.scene.graph;
        let connections: Vec<_> = self
            .view
            .selected_port_arrows
            .iter()
            .filter_map(|h| graph.port_arrow(*h))
            .map(|a| (a.source.port, a.destination.port))
            .collect();
        let links: Vec<PropertyLinkId> = self
            .view
            .selected_property_arrows
            .iter()
            .filter_map(|h| graph.links().arrow(*h))
            .flat_map(|a| a.links())
            .collect();
        let processors = self.selected_processors();

        for (outport, inport) in connections {
            self.network.disconnect_ports(outport, inport)?;
        }
        for link in links {
            self.network.remove_property_link(link)?;
        }
        for processor in processors {
            self.network.remove_processor(processor)?;
        }
        self.view.clear_selection();
        self.sync()?;
        self.persist_selection()
    }

    fn selected_processors(&self) -> Vec<ProcessorId> {
        self.view
            .selected_nodes
            .iter()
            .flat_map(|n| self.scene.graph.processors(*n))
            .collect()
    }

    // ------------------------------------------------------------------
    // meta-data
    // ------------------------------------------------------------------

    /// Write all editor state to the network's meta-data
    pub fn save_metadata(&mut self) -> Result<(), EditorError> {
        self.persist_records()?;
        self.persist_bundles()?;
        self.persist_selection()?;
        self.network.meta.set(ZOOM_KEY, &self.view.zoom)?;
        self.network.meta.set(AUTO_LINK_CAMERAS_KEY, &self.auto_link_cameras)?;
        Ok(())
    }

    fn persist_records(&mut self) -> Result<(), EditorError> {
        let records = self.scene.graph.records();
        if records.is_empty() {
            self.network.meta.remove(AGGREGATION_KEY);
        } else {
            self.network.meta.set(AGGREGATION_KEY, &records)?;
        }
        Ok(())
    }

    fn persist_bundles(&mut self) -> Result<(), EditorError> {
        let graph = &self.scene.graph;
        let records = self.scene.bundles.records(|h| {
            graph
                .port_arrow(h)
                .map(|a| (a.source.port, a.destination.port))
        });
        if records.is_empty() {
            self.network.meta.remove(BUNDLES_KEY);
        } else {
            self.network.meta.set(BUNDLES_KEY, &records)?;
        }
        Ok(())
    }

    fn persist_selection(&mut self) -> Result<(), EditorError> {
        let processors = self.selected_processors();
        self.network.meta.set(SELECTION_KEY, &processors)?;
        Ok(())
    }

    fn read_meta<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.network.meta.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Ignoring unreadable meta-data: {e}");
                None
            }
        }
    }
}

/// Error from an editor action; the network and scene are left consistent
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// Structural edits are refused while the network is evaluated
    #[error("The network is being evaluated, so {action} is not allowed")]
    NetworkLocked {
        /// Refused action
        action: String,
    },

    /// The property pair already has links in both directions
    #[error("A link between these properties already exists")]
    DuplicateLink(PropertyLinkId),

    /// A pasted processor has no position
    #[error("Processor '{0}' has no position meta-data")]
    MissingPositionMetaData(String),

    /// Nothing to paste
    #[error("The clipboard does not contain any processors")]
    EmptyClipboard,

    /// Clipboard text could not be written or parsed
    #[error("Clipboard serialization failed: {0}")]
    Serialization(#[source] NetworkError),

    /// The network refused the change
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// The editor graph refused the change
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The bundle manager refused the change
    #[error(transparent)]
    Bundle(#[from] BundleError),

    /// Editor state could not be stored
    #[error(transparent)]
    MetaData(#[from] MetaDataError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use netweave_network::{Port, PortType, Property, PropertyValue};

    fn settings() -> EditorSettings {
        EditorSettings {
            auto_link_cameras: false,
            ..Default::default()
        }
    }

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

    fn camera(name: &str) -> Processor {
        Processor::new("Raycaster", name)
            .with_property(Property::camera("camera"))
            .with_position(0, 0)
            .unwrap()
    }

    fn out(p: &Processor) -> PortId {
        p.ports[0].id
    }

    /// Three sources fanning into one sink
    fn fan_in(editor: &mut NetworkEditor) -> (Vec<Processor>, Processor, Vec<PortArrowHandle>) {
        let sources: Vec<Processor> = (0..3).map(|i| source(&format!("S{i}"), i * 100, 0)).collect();
        let d = sink("D", 100, 300);
        for p in sources.iter().chain([&d]) {
            editor.add_processor(p.clone()).unwrap();
        }
        let arrows = sources.iter().map(|s| editor.connect(out(s), out(&d)).unwrap()).collect();
        (sources, d, arrows)
    }

    #[test]
    fn test_aggregate_and_deaggregate_connected_pair() {
        let mut editor = NetworkEditor::new(settings());
        let (a, b) = (source("A", 0, 0), sink("B", 200, 100));
        let ha = editor.add_processor(a.clone()).unwrap();
        let hb = editor.add_processor(b.clone()).unwrap();
        let arrow = editor.connect(out(&a), out(&b)).unwrap();

        let g = editor.aggregate(&[ha, hb], None).unwrap();
        assert_eq!(editor.graph().node(g).unwrap().name, "Aggregation");
        assert_eq!(editor.view().selected_nodes.iter().copied().collect::<Vec<_>>(), vec![g]);
        assert!(!editor.graph().visible_port_arrows().any(|x| x.touches(ha) || x.touches(hb)));
        assert_eq!(
            editor.graph().node(g).unwrap().aggregate().unwrap().internal_port_arrows,
            vec![arrow]
        );
        assert!(editor.network().meta.contains(AGGREGATION_KEY));

        editor.move_node(g, [300.0, 300.0]).unwrap();
        editor.deaggregate(g).unwrap();
        let visible: Vec<_> = editor.graph().visible_port_arrows().collect();
        assert_eq!(visible.len(), 1);
        assert_eq!((visible[0].source.node, visible[0].destination.node), (ha, hb));
        assert!(editor.graph().nodes().all(|n| n.aggregate().is_none()));
        assert!(!editor.network().meta.contains(AGGREGATION_KEY));
        // Children keep their offsets around the moved aggregate
        let a_pos = editor.network().processor(a.id).unwrap().position().unwrap().unwrap();
        assert_eq!(a_pos, PositionMetaData { x: 200, y: 250 });
    }

    #[test]
    fn test_network_lock_refuses_structural_edits() {
        let mut editor = NetworkEditor::new(settings());
        let ha = editor.add_processor(source("A", 0, 0)).unwrap();
        editor.select_nodes(&[ha]).unwrap();
        editor.set_network_locked(true);

        let err = editor.aggregate(&[ha], None).unwrap_err();
        assert_eq!(err.to_string(), "The network is being evaluated, so aggregate is not allowed");
        assert!(matches!(editor.delete_selection(), Err(EditorError::NetworkLocked { .. })));
        assert!(matches!(editor.copy_selection(), Err(EditorError::NetworkLocked { .. })));
        assert_eq!(editor.take_notices().len(), 3);
        assert_eq!(editor.graph().node_count(), 1);
        assert_eq!(editor.network().processor_count(), 1);

        editor.set_network_locked(false);
        assert!(editor.aggregate(&[ha], None).is_ok());
    }

    #[test]
    fn test_disconnect_dissolves_bundle_and_persists() {
        let mut editor = NetworkEditor::new(settings());
        let (sources, d, arrows) = fan_in(&mut editor);
        let bundle = editor.bundle(&arrows).unwrap();
        assert!(editor.network().meta.contains(BUNDLES_KEY));

        editor.disconnect(arrows[1]).unwrap();
        assert_eq!(editor.scene().bundles.get(bundle).unwrap().links(), &[arrows[0], arrows[2]]);
        let stored: Vec<BundleRecord> = editor.network().meta.get(BUNDLES_KEY).unwrap().unwrap();
        assert_eq!(
            stored[0].connections,
            vec![(out(&sources[0]), out(&d)), (out(&sources[2]), out(&d))]
        );

        editor.disconnect(arrows[2]).unwrap();
        assert!(editor.scene().bundles.is_empty());
        assert!(!editor.scene().bundles.is_bundled(arrows[0]));
        assert!(!editor.network().meta.contains(BUNDLES_KEY));
    }

    #[test]
    fn test_reopen_restores_editor_state() {
        let mut editor = NetworkEditor::new(settings());
        let (sources, d, arrows) = fan_in(&mut editor);
        let leaves: Vec<NodeHandle> = sources
            .iter()
            .map(|s| editor.graph().leaf(s.id).unwrap())
            .collect();
        let bundle = editor.bundle(&arrows).unwrap();
        editor.move_bundle_handle(bundle, 1, [100.0, 250.0]).unwrap();
        let inner = editor.aggregate(&leaves[..2], Some("Inner")).unwrap();
        let handles = editor.scene().bundles.get(bundle).unwrap().handles().to_vec();
        assert_eq!(handles[1], [100.0, 250.0]);
        editor.set_zoom(ZoomTransform::scale(2.0)).unwrap();
        editor.select_nodes(&[inner]).unwrap();
        let network = editor.into_network();

        let text = network.to_ron().unwrap();
        let reopened = NetworkEditor::open(ProcessorNetwork::from_ron(&text).unwrap(), settings()).unwrap();
        let graph = reopened.graph();
        let aggregate = graph.outermost(sources[0].id).unwrap();
        assert_eq!(graph.node(aggregate).unwrap().name, "Inner");
        assert_eq!(graph.outermost(sources[1].id), Some(aggregate));
        assert_eq!(graph.top_level_nodes().count(), 3);

        let restored = reopened.scene().bundles.bundles().next().unwrap();
        assert_eq!(restored.links().len(), 3);
        assert_eq!(restored.handles(), &handles[..]);
        assert!(restored.end_detached());
        assert!(graph.port_arrow(restored.links()[0]).unwrap().destination.node == graph.leaf(d.id).unwrap());

        assert_eq!(reopened.view().zoom, ZoomTransform::scale(2.0));
        assert_eq!(
            reopened.view().selected_nodes.iter().copied().collect::<Vec<_>>(),
            vec![aggregate]
        );
    }

    #[test]
    fn test_corrupt_bundle_record_does_not_block_loading() {
        let mut editor = NetworkEditor::new(settings());
        let (_, _, arrows) = fan_in(&mut editor);
        editor.bundle(&arrows).unwrap();
        let mut network = editor.into_network();
        let mut records: Vec<BundleRecord> = network.meta.get(BUNDLES_KEY).unwrap().unwrap();
        records.push(BundleRecord {
            connections: records[0].connections.clone(),
            points: vec![[0.0, 0.0]],
            start_detached: false,
            end_detached: false,
        });
        records.insert(
            0,
            BundleRecord {
                connections: vec![(PortId::new(), PortId::new()), (PortId::new(), PortId::new())],
                points: vec![[0.0, 0.0], [1.0, 1.0]],
                start_detached: false,
                end_detached: false,
            },
        );
        network.meta.set(BUNDLES_KEY, &records).unwrap();

        let reopened = NetworkEditor::open(network, settings()).unwrap();
        assert_eq!(reopened.scene().bundles.len(), 1);
        assert_eq!(reopened.graph().node_count(), 4);
    }

    #[test]
    fn test_paste_centres_on_right_click() {
        let mut editor = NetworkEditor::new(settings());
        let (a, b) = (source("A", 0, 0), sink("B", 101, 51));
        let ha = editor.add_processor(a.clone()).unwrap();
        let hb = editor.add_processor(b.clone()).unwrap();
        editor.connect(out(&a), out(&b)).unwrap();
        editor.select_nodes(&[ha, hb]).unwrap();
        let text = editor.copy_selection().unwrap();
        assert!(NetworkEditor::can_paste(&text));

        editor.set_right_click_position([500.0, 500.0]);
        let nodes = editor.paste(&text).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(editor.network().processor_count(), 4);
        assert_eq!(editor.network().connection_count(), 2);
        let positions: Vec<[f32; 2]> = nodes
            .iter()
            .map(|n| editor.graph().node(*n).unwrap().position)
            .collect();
        // Bounding box centre is (50, 25)
        assert_eq!(positions, vec![[450.0, 475.0], [551.0, 526.0]]);
        let names: Vec<&str> = nodes
            .iter()
            .map(|n| editor.graph().node(*n).unwrap().name.as_str())
            .collect();
        assert_eq!(names, vec!["A 2", "B 2"]);
        assert_eq!(editor.view().selected_nodes.len(), 2);
    }

    #[test]
    fn test_invalid_paste_changes_nothing() {
        let mut editor = NetworkEditor::new(settings());
        assert!(!NetworkEditor::can_paste("not a network"));
        assert!(matches!(editor.paste("not a network"), Err(EditorError::Serialization(_))));
        assert!(matches!(editor.paste_clipboard(), Err(EditorError::EmptyClipboard)));

        let mut sub = ProcessorNetwork::new("clip");
        sub.add_processor(source("A", 0, 0)).unwrap();
        sub.add_processor(Processor::new("Sink", "Unplaced")).unwrap();
        let text = sub.to_ron().unwrap();
        assert!(NetworkEditor::can_paste(&text));
        match editor.paste(&text) {
            Err(EditorError::MissingPositionMetaData(name)) => assert_eq!(name, "Unplaced"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(editor.network().processor_count(), 0);
        assert_eq!(editor.graph().node_count(), 0);

        let notices = editor.take_notices();
        assert_eq!(notices.len(), 3);
        assert!(notices[0].starts_with("Clipboard serialization failed"));
        assert_eq!(notices[1], "The clipboard does not contain any processors");
        assert_eq!(notices[2], "Processor 'Unplaced' has no position meta-data");
    }

    #[test]
    fn test_port_drag_commit_and_abort() {
        let mut editor = NetworkEditor::new(settings());
        let (a, b) = (source("A", 0, 0), sink("B", 0, 100));
        let ha = editor.add_processor(a.clone()).unwrap();
        let hb = editor.add_processor(b.clone()).unwrap();
        let from = PortRef::new(ha, out(&a));
        let to = PortRef::new(hb, out(&b));

        editor.begin_port_drag(from, [0.0, 0.0]).unwrap();
        editor.update_drag([5.0, 50.0]);
        assert_eq!(editor.view().drag.map(|s| s.tip), Some([5.0, 50.0]));
        assert_eq!(editor.end_port_drag(None).unwrap(), None);
        assert!(editor.view().drag.is_none());

        editor.begin_port_drag(from, [0.0, 0.0]).unwrap();
        assert_eq!(editor.end_port_drag(Some(from)).unwrap(), None);
        assert_eq!(editor.network().connection_count(), 0);

        // Dragging backwards from the inport works as well
        editor.begin_port_drag(to, [0.0, 100.0]).unwrap();
        let arrow = editor.end_port_drag(Some(from)).unwrap().unwrap();
        assert_eq!(editor.graph().port_arrow(arrow).unwrap().source, from);
        assert_eq!(editor.network().connection_count(), 1);

        editor.begin_port_drag(from, [0.0, 0.0]).unwrap();
        editor.set_layer(Layer::GeneralLinking);
        assert!(editor.view().drag.is_none());
        assert!(editor.begin_port_drag(from, [0.0, 0.0]).is_err());
    }

    #[test]
    fn test_link_drag_returns_node_pair() {
        let mut editor = NetworkEditor::new(settings());
        let ha = editor.add_processor(camera("A")).unwrap();
        let hb = editor.add_processor(camera("B")).unwrap();
        assert!(editor.begin_link_drag(ha, [0.0, 0.0]).is_err());

        editor.set_layer(Layer::GeneralLinking);
        editor.begin_link_drag(ha, [0.0, 0.0]).unwrap();
        assert_eq!(editor.end_link_drag(Some(hb)), Some((ha, hb)));
        editor.begin_link_drag(ha, [0.0, 0.0]).unwrap();
        assert_eq!(editor.end_link_drag(None), None);
    }

    #[test]
    fn test_property_links_share_one_arrow() {
        let mut editor = NetworkEditor::new(settings());
        let a = Processor::new("Raycaster", "A").with_property(Property::new("s", "S", PropertyValue::Int(1)));
        let b = Processor::new("Raycaster", "B").with_property(Property::new("s", "S", PropertyValue::Int(1)));
        let (pa, pb) = (
            PropertyRef::new(a.id, a.properties[0].id),
            PropertyRef::new(b.id, b.properties[0].id),
        );
        editor.add_processor(a).unwrap();
        editor.add_processor(b).unwrap();

        let forward = editor.link_properties(pa, pb, LinkEvaluator::Id).unwrap();
        let reverse = editor.link_properties(pb, pa, LinkEvaluator::Id).unwrap();
        assert_eq!(forward, reverse);
        assert!(matches!(
            editor.link_properties(pa, pb, LinkEvaluator::Scale(2.0)),
            Err(EditorError::Network(NetworkError::LinkExists))
        ));
        assert_eq!(editor.network().property_links().count(), 2);

        editor.unlink_properties(forward).unwrap();
        assert_eq!(editor.network().property_links().count(), 0);
        assert_eq!(editor.graph().links().arrow_count(), 0);
    }

    #[test]
    fn test_camera_auto_linking() {
        let mut network = ProcessorNetwork::new("cams");
        network.add_processor(camera("A")).unwrap();
        network.add_processor(camera("B")).unwrap();

        let mut editor = NetworkEditor::open(network, EditorSettings::default()).unwrap();
        assert!(editor.auto_link_cameras());
        assert_eq!(editor.network().property_links().count(), 2);
        assert_eq!(editor.graph().links().arrow_count(), 1);

        editor.add_processor(camera("C")).unwrap();
        assert_eq!(editor.network().property_links().count(), 6);

        editor.set_auto_link_cameras(false).unwrap();
        editor.add_processor(camera("D")).unwrap();
        assert_eq!(editor.network().property_links().count(), 6);
        assert_eq!(editor.network().meta.get::<bool>(AUTO_LINK_CAMERAS_KEY).unwrap(), Some(false));

        // The network's own flag wins over the settings
        let reopened = NetworkEditor::open(editor.into_network(), EditorSettings::default()).unwrap();
        assert!(!reopened.auto_link_cameras());
        assert_eq!(reopened.network().property_links().count(), 6);
    }

    #[test]
    fn test_delete_selection() {
        let mut editor = NetworkEditor::new(settings());
        let (sources, d, arrows) = fan_in(&mut editor);
        let leaves: Vec<NodeHandle> = sources
            .iter()
            .map(|s| editor.graph().leaf(s.id).unwrap())
            .collect();
        let group = editor.aggregate(&leaves[..2], None).unwrap();
        editor.select_nodes(&[group]).unwrap();
        editor.select_port_arrows(&[arrows[2]]);

        editor.delete_selection().unwrap();
        assert_eq!(editor.network().processor_count(), 2);
        assert_eq!(editor.network().connection_count(), 0);
        assert!(editor.graph().node(group).is_none());
        assert!(editor.view().selection_is_empty());
        assert!(!editor.network().meta.contains(AGGREGATION_KEY));
        assert!(editor.graph().leaf(d.id).is_some());
    }

    #[test]
    fn test_rename_and_move() {
        let mut editor = NetworkEditor::new(settings());
        let ha = editor.add_processor(source("A", 0, 0)).unwrap();
        let hb = editor.add_processor(source("B", 0, 0)).unwrap();

        assert_eq!(editor.rename_node(hb, "A").unwrap(), "A 2");
        assert_eq!(editor.graph().node(hb).unwrap().name, "A 2");

        editor.move_node(ha, [12.4, -7.6]).unwrap();
        let id = editor.graph().node(ha).unwrap().processor().unwrap();
        let stored = editor.network().processor(id).unwrap().position().unwrap();
        assert_eq!(stored, Some(PositionMetaData { x: 12, y: -8 }));

        let g = editor.aggregate(&[ha, hb], None).unwrap();
        editor.rename_node(g, "Group").unwrap();
        let records: Vec<AggregationRecord> = editor.network().meta.get(AGGREGATION_KEY).unwrap().unwrap();
        assert_eq!(records[0].name, "Group");
        assert!(editor.rename_node(ha, "nested").is_err());
    }

    #[test]
    fn test_replace_processor_keeps_connections() {
        let mut editor = NetworkEditor::new(settings());
        let (a, b) = (source("A", 10, 20), sink("B", 0, 100));
        let ha = editor.add_processor(a.clone()).unwrap();
        editor.add_processor(b.clone()).unwrap();
        editor.connect(out(&a), out(&b)).unwrap();

        let replacement = source("A2", 0, 0);
        let node = editor.replace_processor(ha, replacement.clone()).unwrap();
        assert!(editor.graph().node(ha).is_none());
        assert_eq!(editor.graph().node(node).unwrap().position, [10.0, 20.0]);
        assert!(editor.graph().find_port_arrow(out(&replacement), out(&b)).is_some());

        let g = editor.aggregate(&[node], None).unwrap();
        assert!(matches!(
            editor.replace_processor(g, source("A3", 0, 0)),
            Err(EditorError::Graph(GraphError::InvalidOperation(_)))
        ));
        assert_eq!(editor.take_notices().len(), 1);
    }

    #[test]
    fn test_open_drops_duplicate_link_from_edited_file() {
        let a = Processor::new("Raycaster", "A").with_property(Property::new("s", "S", PropertyValue::Int(1)));
        let b = Processor::new("Raycaster", "B")
            .with_property(Property::new("s", "S", PropertyValue::Int(1)))
            .with_property(Property::new("t", "T", PropertyValue::Int(1)));
        let pa = PropertyRef::new(a.id, a.properties[0].id);
        let (s, t) = (
            PropertyRef::new(b.id, b.properties[0].id),
            PropertyRef::new(b.id, b.properties[1].id),
        );
        let mut network = ProcessorNetwork::new("dup");
        network.add_processor(a).unwrap();
        network.add_processor(b).unwrap();
        network.create_property_link(pa, s, LinkEvaluator::Id).unwrap();
        network.create_property_link(pa, t, LinkEvaluator::Id).unwrap();

        // Point the second link at the first link's destination
        let text = network.to_ron().unwrap();
        let at = text.find("links:").unwrap();
        let edited = format!(
            "{}{}",
            &text[..at],
            text[at..].replace(&t.property.0.to_string(), &s.property.0.to_string())
        );
        let network = ProcessorNetwork::from_ron(&edited).unwrap();
        assert_eq!(network.property_links().filter(|l| l.destination == s).count(), 2);

        let mut editor = NetworkEditor::open(network, settings()).unwrap();
        assert_eq!(editor.network().property_links().count(), 1);
        assert_eq!(editor.take_notices().len(), 1);
        assert_eq!(editor.graph().links().arrow_count(), 1);
    }

    fn rig(name: &str) -> Processor {
        camera(name).with_property(Property::new("s", "S", PropertyValue::Int(1)))
    }

    fn prop(p: &Processor, index: usize) -> PropertyRef {
        PropertyRef::new(p.id, p.properties[index].id)
    }

    #[test]
    fn test_delete_links_follows_selection() {
        let mut editor = NetworkEditor::new(settings());
        let (a, b, c) = (rig("A"), rig("B"), rig("C"));
        let ha = editor.add_processor(a.clone()).unwrap();
        let hb = editor.add_processor(b.clone()).unwrap();
        let hc = editor.add_processor(c.clone()).unwrap();
        editor.link_properties(prop(&a, 1), prop(&b, 1), LinkEvaluator::Id).unwrap();
        editor.link_properties(prop(&b, 1), prop(&c, 1), LinkEvaluator::Id).unwrap();
        editor.link_properties(prop(&a, 1), prop(&c, 1), LinkEvaluator::Id).unwrap();

        // Several processors lose only the links among them
        editor.select_nodes(&[ha, hb]).unwrap();
        assert_eq!(editor.delete_links().unwrap(), 1);
        assert_eq!(editor.network().property_links().count(), 2);

        // One processor loses every link touching it
        editor.select_nodes(&[hc]).unwrap();
        assert_eq!(editor.delete_links().unwrap(), 2);
        assert_eq!(editor.graph().links().arrow_count(), 0);

        editor.link_properties(prop(&a, 1), prop(&b, 1), LinkEvaluator::Id).unwrap();
        editor.clear_selection().unwrap();
        editor.set_network_locked(true);
        assert!(matches!(editor.delete_links(), Err(EditorError::NetworkLocked { .. })));
        editor.set_network_locked(false);
        assert_eq!(editor.delete_links().unwrap(), 1);
        assert_eq!(editor.network().property_links().count(), 0);
    }

    #[test]
    fn test_camera_links_follow_selection() {
        let mut editor = NetworkEditor::new(settings());
        let (a, b, c) = (rig("A"), rig("B"), rig("C"));
        let ha = editor.add_processor(a.clone()).unwrap();
        let hb = editor.add_processor(b.clone()).unwrap();
        let hc = editor.add_processor(c.clone()).unwrap();

        editor.select_nodes(&[ha, hb]).unwrap();
        assert_eq!(editor.link_cameras().unwrap(), 2);
        editor.select_nodes(&[hc]).unwrap();
        assert_eq!(editor.link_cameras().unwrap(), 4);
        assert_eq!(editor.link_cameras().unwrap(), 0);
        editor.link_properties(prop(&a, 1), prop(&b, 1), LinkEvaluator::Id).unwrap();
        assert_eq!(editor.network().property_links().count(), 7);

        editor.select_nodes(&[ha, hb]).unwrap();
        assert_eq!(editor.delete_camera_links().unwrap(), 2);
        assert!(editor.network().property_link_between(prop(&a, 1), prop(&b, 1)).is_some());

        editor.clear_selection().unwrap();
        assert_eq!(editor.delete_camera_links().unwrap(), 4);
        assert_eq!(editor.network().property_links().count(), 1);

        assert_eq!(editor.remove_all_property_links().unwrap(), 1);
        assert_eq!(editor.graph().links().arrow_count(), 0);
    }

    #[test]
    fn test_sort_network_stacks_layers() {
        let mut editor = NetworkEditor::new(settings());
        let (sources, d, arrows) = fan_in(&mut editor);
        editor.bundle(&arrows).unwrap();
        editor.sort_network().unwrap();

        let position = |id: ProcessorId| editor.network().processor(id).unwrap().position().unwrap().unwrap();
        let xs: Vec<i32> = sources.iter().map(|s| position(s.id).x).collect();
        assert_eq!(xs, vec![0, 200, 400]);
        assert!(sources.iter().all(|s| position(s.id).y == 0));
        assert_eq!(position(d.id), PositionMetaData { x: 200, y: 150 });
        let leaf = editor.graph().leaf(d.id).unwrap();
        assert_eq!(editor.graph().node(leaf).unwrap().position, [200.0, 150.0]);
    }

    #[test]
    fn test_sort_selection_keeps_other_nodes() {
        let mut editor = NetworkEditor::new(settings());
        let (sources, d, _) = fan_in(&mut editor);
        let first = editor.graph().leaf(sources[0].id).unwrap();
        let sink = editor.graph().leaf(d.id).unwrap();

        editor.select_nodes(&[first]).unwrap();
        assert!(editor.sort_selection().is_err());
        assert_eq!(editor.take_notices().len(), 1);

        editor.select_nodes(&[first, sink]).unwrap();
        editor.sort_selection().unwrap();
        assert_eq!(editor.graph().node(sink).unwrap().position, [0.0, 150.0]);
        let second = editor.graph().leaf(sources[1].id).unwrap();
        assert_eq!(editor.graph().node(second).unwrap().position, [100.0, 0.0]);
    }
}
