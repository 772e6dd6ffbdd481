// SPDX-License-Identifier: MIT OR Apache-2.0
//! Demo network used when no file is opened.

use netweave_editor_graph::{EditorError, EditorSettings, NetworkEditor};
use netweave_network::{LinkEvaluator, Port, PortType, Processor, Property, PropertyRef, PropertyValue};

/// Volume source feeding two raycasters that are composited onto a canvas.
///
/// The raycasters are folded into an aggregate and the two volume
/// connections entering it are bundled.
pub fn build(settings: EditorSettings) -> Result<NetworkEditor, EditorError> {
    let mut editor = NetworkEditor::new(settings);

    let source = Processor::new("VolumeSource", "Volume Source")
        .with_port(Port::outport("volume", PortType::Volume))
        .with_property(Property::new("file", "File", PropertyValue::Text("head.dat".into())))
        .with_position(200, 0)?;
    let raycaster = |name: &str, x: i32| {
        Processor::new("Raycaster", name)
            .with_port(Port::inport("volume", PortType::Volume))
            .with_port(Port::outport("image", PortType::Image))
            .with_property(Property::camera("camera"))
            .with_property(Property::new("samplingRate", "Sampling Rate", PropertyValue::Float(2.0)))
            .with_position(x, 150)
    };
    let left = raycaster("Raycaster", 100)?;
    let right = raycaster("Raycaster", 300)?;
    let compositor = Processor::new("Compositor", "Compositor")
        .with_port(Port::inport("image", PortType::Image).multi())
        .with_port(Port::outport("image", PortType::Image))
        .with_position(200, 300)?;
    let canvas = Processor::new("Canvas", "Canvas")
        .with_port(Port::inport("image", PortType::Image))
        .with_property(Property::camera("camera"))
        .with_position(200, 450)?;

    let volume = source.ports[0].id;
    let ports = |p: &Processor| (p.ports[0].id, p.ports[1].id);
    let (left_in, left_out) = ports(&left);
    let (right_in, right_out) = ports(&right);
    let (compositor_in, compositor_out) = ports(&compositor);
    let canvas_in = canvas.ports[0].id;
    let sampling = |p: &Processor| PropertyRef::new(p.id, p.properties[1].id);
    let (left_rate, right_rate) = (sampling(&left), sampling(&right));

    editor.add_processor(source)?;
    let left = editor.add_processor(left)?;
    let right = editor.add_processor(right)?;
    editor.add_processor(compositor)?;
    editor.add_processor(canvas)?;

    let into_left = editor.connect(volume, left_in)?;
    let into_right = editor.connect(volume, right_in)?;
    editor.connect(left_out, compositor_in)?;
    editor.connect(right_out, compositor_in)?;
    editor.connect(compositor_out, canvas_in)?;
    editor.link_properties(left_rate, right_rate, LinkEvaluator::Id)?;

    editor.aggregate(&[left, right], Some("Renderers"))?;
    editor.bundle(&[into_left, into_right])?;
    Ok(editor)
}
