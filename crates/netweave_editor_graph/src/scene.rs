// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor scene kept in sync with a processor network through its events.

use crate::bundle::{BundleManager, BundleStyle};
use crate::graph::{EditorGraph, GraphError};
use crate::handle::NodeHandle;
use crate::link_registry::RegistryError;
use netweave_network::{NetworkEvent, NetworkObserver, ProcessorId, ProcessorNetwork, PropertyLink};

/// Visual graph plus bundles, updated from network events
#[derive(Debug, Default)]
pub struct EditorScene {
    /// Nodes and arrows
    pub graph: EditorGraph,
    /// Connection bundles
    pub bundles: BundleManager,
    added: Vec<ProcessorId>,
    removed: Vec<NodeHandle>,
    rejected: Vec<PropertyLink>,
    bundles_changed: bool,
    records_changed: bool,
}

impl EditorScene {
    /// Create an empty scene
    pub fn new(style: BundleStyle) -> Self {
        Self {
            bundles: BundleManager::new(style),
            ..Self::default()
        }
    }

    /// Mirror every processor, connection and link of `network`
    pub fn from_network(network: &ProcessorNetwork, style: BundleStyle) -> Self {
        let mut scene = Self::new(style);
        for processor in network.processors() {
            scene.processor_added(network, processor.id);
        }
        for connection in network.connections() {
            if let Err(e) = scene.graph.add_port_arrow(connection) {
                tracing::warn!("Connection not shown: {e}");
            }
        }
        for link in network.property_links() {
            scene.property_link_added(link);
        }
        scene.added.clear();
        scene
    }

    /// Processors added since the last call
    pub fn take_added(&mut self) -> Vec<ProcessorId> {
        std::mem::take(&mut self.added)
    }

    /// Nodes removed since the last call
    pub fn take_removed(&mut self) -> Vec<NodeHandle> {
        std::mem::take(&mut self.removed)
    }

    /// Links the network accepted but the arrow registry rejected
    pub fn take_rejected(&mut self) -> Vec<PropertyLink> {
        std::mem::take(&mut self.rejected)
    }

    /// Whether bundles changed since the last call
    pub fn take_bundles_changed(&mut self) -> bool {
        std::mem::take(&mut self.bundles_changed)
    }

    /// Whether aggregation records changed since the last call
    pub fn take_records_changed(&mut self) -> bool {
        std::mem::take(&mut self.records_changed)
    }

    fn processor_added(&mut self, network: &ProcessorNetwork, id: ProcessorId) {
        let Some(processor) = network.processor(id) else {
            tracing::debug!("Processor {id:?} is gone before its node was created");
            return;
        };
        match self.graph.add_leaf(processor) {
            Ok(_) => self.added.push(id),
            Err(e) => tracing::warn!("Processor '{}' not shown: {e}", processor.name),
        }
    }

    fn property_link_added(&mut self, link: &PropertyLink) {
        match self.graph.add_property_arrow(link) {
            Ok(_) => {}
            Err(GraphError::Registry(RegistryError::DuplicateLink(id))) => {
                tracing::warn!("Duplicate property link {id:?} rejected");
                self.rejected.push(link.clone());
            }
            Err(e) => tracing::warn!("Property link not shown: {e}"),
        }
    }
}

impl NetworkObserver for EditorScene {
    fn network_changed(&mut self, network: &ProcessorNetwork, event: &NetworkEvent) {
        match event {
            NetworkEvent::ProcessorAdded(id) => self.processor_added(network, *id),
            NetworkEvent::ProcessorRemoved(id) => match self.graph.remove_leaf(*id) {
                Ok(removed) => {
                    self.removed.extend(removed);
                    self.records_changed = true;
                }
                Err(e) => tracing::debug!("Removed processor had no node: {e}"),
            },
            NetworkEvent::ProcessorRenamed { processor, .. } => {
                let name = network.processor(*processor).map(|p| p.name.clone());
                if let (Some(leaf), Some(name)) = (self.graph.leaf(*processor), name) {
                    if let Err(e) = self.graph.rename_node(leaf, &name) {
                        tracing::warn!("Rename not shown: {e}");
                    }
                }
            }
            NetworkEvent::ConnectionAdded(connection) => {
                if let Err(e) = self.graph.add_port_arrow(connection) {
                    tracing::warn!("Connection not shown: {e}");
                }
            }
            NetworkEvent::ConnectionRemoved(connection) => {
                let Some(arrow) = self.graph.find_port_arrow(connection.from_port, connection.to_port) else {
                    return;
                };
                if self.bundles.remove_link_from_bundle(arrow, &self.graph).is_some() {
                    self.bundles_changed = true;
                }
                if let Err(e) = self.graph.remove_port_arrow(arrow) {
                    tracing::warn!("Connection arrow not removed: {e}");
                }
            }
            NetworkEvent::PropertyLinkAdded(link) => self.property_link_added(link),
            NetworkEvent::PropertyLinkRemoved(link) => {
                self.graph.remove_property_arrow_link(link.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BundleChange;
    use netweave_network::{LinkEvaluator, Port, PortType, Processor, Property, PropertyRef, PropertyValue};

    fn sources_and_sink(network: &mut ProcessorNetwork) -> (Vec<Processor>, Processor) {
        let sources: Vec<Processor> = (0..3)
            .map(|i| {
                Processor::new("Source", format!("S{i}"))
                    .with_port(Port::outport("out", PortType::Geometry))
                    .with_position(i * 100, 0)
                    .unwrap()
            })
            .collect();
        let sink = Processor::new("Sink", "D")
            .with_port(Port::inport("in", PortType::Geometry).multi())
            .with_position(100, 300)
            .unwrap();
        for p in sources.iter().chain([&sink]) {
            network.add_processor(p.clone()).unwrap();
        }
        (sources, sink)
    }

    #[test]
    fn test_events_build_scene() {
        let mut network = ProcessorNetwork::new("test");
        let mut scene = EditorScene::new(BundleStyle::default());
        let (sources, sink) = sources_and_sink(&mut network);
        network.connect_ports(sources[0].ports[0].id, sink.ports[0].id).unwrap();
        network.dispatch_events(&mut scene);

        assert_eq!(scene.graph.top_level_nodes().count(), 4);
        assert_eq!(scene.graph.visible_port_arrows().count(), 1);
        assert_eq!(scene.take_added().len(), 4);

        network.rename_processor(sink.id, "Renderer").unwrap();
        network.remove_processor(sources[0].id).unwrap();
        network.dispatch_events(&mut scene);
        let leaf = scene.graph.leaf(sink.id).unwrap();
        assert_eq!(scene.graph.node(leaf).unwrap().name, "Renderer");
        assert_eq!(scene.graph.visible_port_arrows().count(), 0);
        assert_eq!(scene.take_removed().len(), 1);
    }

    #[test]
    fn test_disconnect_shrinks_then_dissolves_bundle() {
        let mut network = ProcessorNetwork::new("test");
        let mut scene = EditorScene::new(BundleStyle::default());
        let (sources, sink) = sources_and_sink(&mut network);
        for s in &sources {
            network.connect_ports(s.ports[0].id, sink.ports[0].id).unwrap();
        }
        network.dispatch_events(&mut scene);

        let inport = sink.ports[0].id;
        let arrows: Vec<_> = sources
            .iter()
            .map(|s| scene.graph.find_port_arrow(s.ports[0].id, inport).unwrap())
            .collect();
        let bundle = scene.bundles.bundle(&arrows, &scene.graph).unwrap();

        network.disconnect_ports(sources[1].ports[0].id, inport).unwrap();
        network.dispatch_events(&mut scene);
        assert!(scene.take_bundles_changed());
        assert_eq!(scene.bundles.get(bundle).unwrap().links(), &[arrows[0], arrows[2]]);

        network.disconnect_ports(sources[2].ports[0].id, inport).unwrap();
        network.dispatch_events(&mut scene);
        assert!(scene.bundles.get(bundle).is_none());
        assert!(!scene.bundles.is_bundled(arrows[0]));
        assert_eq!(
            scene.bundles.remove_link_from_bundle(arrows[0], &scene.graph),
            None::<BundleChange>
        );
    }

    #[test]
    fn test_reverse_link_shares_arrow_and_third_is_rejected() {
        let mut network = ProcessorNetwork::new("test");
        let mut scene = EditorScene::new(BundleStyle::default());
        let a = Processor::new("Raycaster", "A").with_property(Property::new("s", "S", PropertyValue::Int(1)));
        let b = Processor::new("Raycaster", "B").with_property(Property::new("s", "S", PropertyValue::Int(1)));
        let (pa, pb) = (
            PropertyRef::new(a.id, a.properties[0].id),
            PropertyRef::new(b.id, b.properties[0].id),
        );
        network.add_processor(a).unwrap();
        network.add_processor(b).unwrap();
        network.create_property_link(pa, pb, LinkEvaluator::Id).unwrap();
        network.create_property_link(pb, pa, LinkEvaluator::Scale(2.0)).unwrap();
        network.dispatch_events(&mut scene);

        assert_eq!(scene.graph.links().arrow_count(), 1);
        assert!(scene.graph.links().arrows().all(|a| a.is_bidirectional()));
        assert!(scene.take_rejected().is_empty());

        // A network never produces this, but a hand-edited file can
        let third = PropertyLink::new(pa, pb, LinkEvaluator::Scale(3.0));
        scene.network_changed(&network, &NetworkEvent::PropertyLinkAdded(third.clone()));
        assert_eq!(scene.take_rejected(), vec![third]);
        assert_eq!(scene.graph.links().arrow_count(), 1);
    }

    #[test]
    fn test_from_network_mirrors_everything() {
        let mut network = ProcessorNetwork::new("test");
        let (sources, sink) = sources_and_sink(&mut network);
        network.connect_ports(sources[0].ports[0].id, sink.ports[0].id).unwrap();
        network.take_events();

        let mut scene = EditorScene::from_network(&network, BundleStyle::default());
        assert_eq!(scene.graph.node_count(), 4);
        assert_eq!(scene.graph.port_arrows().count(), 1);
        assert!(scene.take_added().is_empty());
        let leaf = scene.graph.leaf(sink.id).unwrap();
        assert_eq!(scene.graph.node(leaf).unwrap().position, [100.0, 300.0]);
    }
}
