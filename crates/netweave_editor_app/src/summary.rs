// SPDX-License-Identifier: MIT OR Apache-2.0
//! Text summary of what each editor layer shows.

use netweave_editor_graph::{
    render, ArrowKind, ConnectionBundle, EditorViewState, Layer, NetworkEditor, Node, SceneVisitor,
};
use std::fmt::Write;

#[derive(Default)]
struct LayerTally {
    nodes: Vec<String>,
    port_arrows: usize,
    property_arrows: usize,
    bundles: usize,
    selected: usize,
}

impl SceneVisitor for LayerTally {
    fn node(&mut self, node: &Node, selected: bool) {
        let kind = if node.is_aggregate() { " (aggregate)" } else { "" };
        self.nodes.push(format!("{}{kind}", node.name));
        if selected {
            self.selected += 1;
        }
    }

    fn arrow(&mut self, arrow: ArrowKind<'_>, _interactive: bool, selected: bool) {
        match arrow {
            ArrowKind::PortArrow(_) => self.port_arrows += 1,
            ArrowKind::PropertyArrow(_) => self.property_arrows += 1,
            ArrowKind::LinkStub(_) => {}
        }
        if selected {
            self.selected += 1;
        }
    }

    fn bundle(&mut self, _bundle: &ConnectionBundle) {
        self.bundles += 1;
    }
}

/// Describe the network and every layer of the editor
pub fn describe(editor: &NetworkEditor) -> String {
    let network = editor.network();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Network '{}': {} processors, {} connections, {} property links",
        network.name,
        network.processor_count(),
        network.connection_count(),
        network.property_links().count()
    );

    for layer in [Layer::DataFlow, Layer::GeneralLinking, Layer::CameraLinking] {
        let view = EditorViewState {
            layer,
            ..editor.view().clone()
        };
        let mut tally = LayerTally::default();
        render(editor.scene(), &view, &mut tally);
        let _ = writeln!(
            out,
            "[{}] {} nodes, {} port arrows, {} property arrows, {} bundles, {} selected",
            layer.name(),
            tally.nodes.len(),
            tally.port_arrows,
            tally.property_arrows,
            tally.bundles,
            tally.selected
        );
        if layer == Layer::DataFlow {
            for name in &tally.nodes {
                let _ = writeln!(out, "  {name}");
            }
        }
    }
    out
}
