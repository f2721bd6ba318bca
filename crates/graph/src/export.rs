use crate::error::Result;
use crate::graph::Digraph;
use crate::types::{ElementKind, Phase};
use petgraph::graph::NodeIndex;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

const GRAPHML_NS: &str = "http://graphml.graphdrawing.org/xmlns";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const YED_SCHEMA_LOCATION: &str =
    "http://graphml.graphdrawing.org/xmlns http://www.yworks.com/xml/schema/graphml/1.1/ygraphml.xsd";

/// Namespaces yEd expects on the `<graphml>` element
const YED_NAMESPACES: [(&str, &str); 5] = [
    ("xmlns:y", "http://www.yworks.com/xml/graphml"),
    ("xmlns:yed", "http://www.yworks.com/xml/yed/3"),
    ("xmlns:java", "http://www.yworks.com/xml/yfiles-common/1.0/java"),
    ("xmlns:x", "http://www.yworks.com/xml/yfiles-common/markup/2.0"),
    ("xmlns:sys", "http://www.yworks.com/xml/yfiles-common/markup/primitives/2.0"),
];

/// yFiles graphics keys: (id, for, yfiles.type)
const YED_KEYS: [(&str, &str, &str); 5] = [
    ("d8", "node", "nodegraphics"),
    ("d12", "edge", "edgegraphics"),
    ("d13", "port", "portgraphics"),
    ("d14", "port", "portgeometry"),
    ("d15", "port", "portuserdata"),
];

/// Label carried by every edge
pub const EDGE_LABEL: &str = "maps-to";

/// GraphML `<key>` declarations: (id, for, attr.name, attr.type)
const KEYS: [(&str, &str, &str, &str); 9] = [
    ("d0", "graph", "description", "string"),
    ("d1", "graph", "level", "int"),
    ("d2", "node", "url", "string"),
    ("d3", "node", "description", "string"),
    ("d4", "node", "lifecycleStage", "string"),
    ("d5", "node", "name", "string"),
    ("d11", "edge", "description", "string"),
    ("d16", "node", "elementType", "string"),
    ("d17", "node", "detailedDesc", "string"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    /// Render id, `n{i}`
    pub id: String,
    pub oid: String,
    /// `{zero-padded index} {oid}`
    pub label: String,
    pub qualified_name: String,
    pub element_type: ElementKind,
    pub phase: Option<Phase>,
    pub name: String,
    pub description: String,
    pub origin: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeRecord {
    /// Render id, `e{i}`
    pub id: String,
    pub source: String,
    pub target: String,
    pub source_oid: String,
    pub target_oid: String,
    pub label: &'static str,
}

/// Serializable snapshot of the graph without root
///
/// Nodes follow vertex insertion order; edges are grouped by target in the
/// same order, sources in edge insertion order. Edges leaving root are left
/// out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphExport {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

impl GraphExport {
    pub fn from_graph(graph: &Digraph) -> Self {
        let width = graph.vertex_count().to_string().len();
        let mut ids: HashMap<NodeIndex, String> = HashMap::new();
        let mut nodes = Vec::new();

        for (idx, v) in graph.vertices().filter(|(_, v)| !v.is_root()) {
            let n = nodes.len();
            let id = format!("n{n}");
            ids.insert(idx, id.clone());
            nodes.push(NodeRecord {
                id,
                oid: v.oid.clone(),
                label: format!("{n:0width$} {}", v.oid),
                qualified_name: v.qualified_name.clone(),
                element_type: v.kind,
                phase: v.phase,
                name: v.name.clone(),
                description: v.description.clone(),
                origin: v.origin_tag().to_string(),
            });
        }

        let mut edges = Vec::new();
        for (target, target_v) in graph.vertices() {
            let Some(target_id) = ids.get(&target) else {
                continue;
            };
            for source in graph.sources(target) {
                let (Some(source_id), Some(source_v)) = (ids.get(&source), graph.vertex(source)) else {
                    continue;
                };
                edges.push(EdgeRecord {
                    id: format!("e{}", edges.len()),
                    source: source_id.clone(),
                    target: target_id.clone(),
                    source_oid: source_v.oid.clone(),
                    target_oid: target_v.oid.clone(),
                    label: EDGE_LABEL,
                });
            }
        }

        Self { nodes, edges }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_graphml(&self) -> Result<String> {
        self.render_graphml(false)
    }

    /// GraphML with yEd shape and edge graphics, so the file opens laid out
    pub fn to_yed_graphml(&self) -> Result<String> {
        self.render_graphml(true)
    }

    fn render_graphml(&self, yed: bool) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut root = BytesStart::new("graphml")
            .with_attributes([("xmlns", GRAPHML_NS), ("xmlns:xsi", XSI_NS)]);
        if yed {
            root.extend_attributes(YED_NAMESPACES);
            root.push_attribute(("xsi:schemaLocation", YED_SCHEMA_LOCATION));
        }
        writer.write_event(Event::Start(root))?;

        for (id, domain, name, kind) in KEYS {
            let key = BytesStart::new("key").with_attributes([
                ("attr.name", name),
                ("attr.type", kind),
                ("for", domain),
                ("id", id),
            ]);
            writer.write_event(Event::Empty(key))?;
        }
        if yed {
            for (id, domain, yfiles) in YED_KEYS {
                let key = BytesStart::new("key").with_attributes([("for", domain), ("id", id), ("yfiles.type", yfiles)]);
                writer.write_event(Event::Empty(key))?;
            }
        }

        let graph = BytesStart::new("graph").with_attributes([("edgedefault", "directed"), ("id", "G")]);
        writer.write_event(Event::Start(graph))?;

        for (n, node) in self.nodes.iter().enumerate() {
            writer.write_event(Event::Start(
                BytesStart::new("node").with_attributes([("id", node.id.as_str())]),
            ))?;
            write_data(&mut writer, "d3", &node.label)?;
            write_data(&mut writer, "d16", node.element_type.element_name())?;
            write_data(&mut writer, "d4", node.phase.map_or("", Phase::as_str))?;
            write_data(&mut writer, "d5", &node.name)?;
            write_data(&mut writer, "d2", &node.oid)?;
            if yed {
                write_shape_node(&mut writer, &n.to_string(), node_color(node.element_type))?;
            }
            write_data(&mut writer, "d17", &node.description)?;
            writer.write_event(Event::End(BytesEnd::new("node")))?;
        }

        for (n, edge) in self.edges.iter().enumerate() {
            writer.write_event(Event::Start(BytesStart::new("edge").with_attributes([
                ("id", edge.id.as_str()),
                ("source", edge.source.as_str()),
                ("target", edge.target.as_str()),
            ])))?;
            write_data(&mut writer, "d11", edge.label)?;
            if yed {
                write_poly_line_edge(&mut writer, &n.to_string())?;
            }
            writer.write_event(Event::End(BytesEnd::new("edge")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("graph")))?;
        writer.write_event(Event::End(BytesEnd::new("graphml")))?;

        String::from_utf8(writer.into_inner())
            .map_err(|e| crate::GraphError::Export(format!("GraphML is not UTF-8: {e}")))
    }

    pub fn write_graphml(&self, path: &Path, yed: bool) -> Result<()> {
        std::fs::write(path, self.render_graphml(yed)?)?;
        log::info!(
            "Graph written to {} ({} nodes, {} edges)",
            path.display(),
            self.nodes.len(),
            self.edges.len()
        );
        Ok(())
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

fn write_data(writer: &mut Writer<Vec<u8>>, key: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("data").with_attributes([("key", key)])))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new("data")))?;
    Ok(())
}

/// yEd fill color per element kind
fn node_color(kind: ElementKind) -> &'static str {
    match kind {
        ElementKind::FormGroup => "#c0c0c0",
        ElementKind::ItemGroup => "#44aa00",
        ElementKind::Item => "#ffcc00",
        ElementKind::Method => "#00ccff",
        ElementKind::Root => "#00ffff",
    }
}

fn write_empty<'a>(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    attrs: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<()> {
    writer.write_event(Event::Empty(BytesStart::new(name).with_attributes(attrs)))?;
    Ok(())
}

fn write_shape_node(writer: &mut Writer<Vec<u8>>, label: &str, color: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("data").with_attributes([("key", "d8")])))?;
    writer.write_event(Event::Start(BytesStart::new("y:ShapeNode")))?;
    write_empty(
        writer,
        "y:Geometry",
        [("height", "30.0"), ("width", "30.0"), ("x", "32.0"), ("y", "32.0")],
    )?;
    write_empty(writer, "y:Fill", [("color", color), ("transparent", "false")])?;
    write_empty(writer, "y:BorderStyle", [("color", "#000000"), ("type", "line"), ("width", "1.0")])?;

    writer.write_event(Event::Start(BytesStart::new("y:NodeLabel").with_attributes([
        ("alignment", "center"),
        ("autoSizePolicy", "content"),
        ("fontFamily", "Dialog"),
        ("fontSize", "10"),
        ("fontStyle", "plain"),
        ("modelName", "custom"),
        ("textColor", "#000000"),
        ("visible", "true"),
    ])))?;
    writer.write_event(Event::Text(BytesText::new(label)))?;
    writer.write_event(Event::Start(BytesStart::new("y:LabelModel")))?;
    write_empty(writer, "y:SmartNodeLabelModel", [("distance", "4.0")])?;
    writer.write_event(Event::End(BytesEnd::new("y:LabelModel")))?;
    writer.write_event(Event::Start(BytesStart::new("y:ModelParameter")))?;
    write_empty(
        writer,
        "y:SmartNodeLabelModelParameter",
        [
            ("labelRatioX", "0.0"),
            ("labelRatioY", "0.0"),
            ("nodeRatioX", "0.0"),
            ("nodeRatioY", "0.0"),
            ("offsetX", "0.0"),
            ("offsetY", "0.0"),
            ("upX", "0.0"),
            ("upY", "-1.0"),
        ],
    )?;
    writer.write_event(Event::End(BytesEnd::new("y:ModelParameter")))?;
    writer.write_event(Event::End(BytesEnd::new("y:NodeLabel")))?;

    write_empty(writer, "y:Shape", [("type", "rectangle")])?;
    writer.write_event(Event::End(BytesEnd::new("y:ShapeNode")))?;
    writer.write_event(Event::End(BytesEnd::new("data")))?;
    Ok(())
}

fn write_poly_line_edge(writer: &mut Writer<Vec<u8>>, label: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("data").with_attributes([("key", "d12")])))?;
    writer.write_event(Event::Start(BytesStart::new("y:PolyLineEdge")))?;
    write_empty(writer, "y:Path", [("sx", "0.0"), ("sy", "0.0"), ("tx", "0.0"), ("ty", "0.0")])?;
    write_empty(writer, "y:LineStyle", [("color", "#000000"), ("type", "line"), ("width", "1.0")])?;
    write_empty(writer, "y:Arrows", [("source", "none"), ("target", "standard")])?;

    writer.write_event(Event::Start(BytesStart::new("y:EdgeLabel").with_attributes([
        ("alignment", "center"),
        ("configuration", "AutoFlippingLabel"),
        ("distance", "2.0"),
        ("fontFamily", "Dialog"),
        ("fontSize", "10"),
        ("modelName", "custom"),
        ("preferredPlacement", "anywhere"),
        ("ratio", "0.5"),
        ("textColor", "#000000"),
        ("visible", "true"),
    ])))?;
    writer.write_event(Event::Text(BytesText::new(label)))?;
    writer.write_event(Event::Start(BytesStart::new("y:LabelModel")))?;
    write_empty(
        writer,
        "y:SmartEdgeLabelModel",
        [("autoRotationEnabled", "false"), ("defaultAngle", "0.0"), ("defaultDistance", "10.0")],
    )?;
    writer.write_event(Event::End(BytesEnd::new("y:LabelModel")))?;
    writer.write_event(Event::Start(BytesStart::new("y:ModelParameter")))?;
    write_empty(
        writer,
        "y:SmartEdgeLabelModelParameter",
        [
            ("angle", "0.0"),
            ("distance", "30.0"),
            ("distanceToCenter", "true"),
            ("position", "right"),
            ("ratio", "0.5"),
            ("segment", "0"),
        ],
    )?;
    writer.write_event(Event::End(BytesEnd::new("y:ModelParameter")))?;
    writer.write_event(Event::End(BytesEnd::new("y:EdgeLabel")))?;

    write_empty(writer, "y:BendStyle", [("smooth", "false")])?;
    writer.write_event(Event::End(BytesEnd::new("y:PolyLineEdge")))?;
    writer.write_event(Event::End(BytesEnd::new("data")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::Origin;
    use crate::types::Vertex;
    use pretty_assertions::assert_eq;

    fn sample() -> Digraph {
        let mut g = Digraph::new();
        let form = g
            .add_vertex(Vertex::new("F.AE", ElementKind::FormGroup, Phase::DataCollection).with_name("Adverse Events"))
            .unwrap();
        let group = g
            .add_vertex(Vertex::new("IG.AE", ElementKind::ItemGroup, Phase::DataCollection))
            .unwrap();
        let item = g
            .add_vertex(
                Vertex::new("IT.AETERM", ElementKind::Item, Phase::DataCollection)
                    .with_origin(Origin::Crf)
                    .with_description("Reported term <verbatim> & text"),
            )
            .unwrap();
        g.connect(form, group);
        g.connect(group, item);
        g.connect_root_node();
        g
    }

    #[test]
    fn test_records_skip_root() {
        let export = GraphExport::from_graph(&sample());

        let labels: Vec<_> = export.nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["0 F.AE", "1 IG.AE", "2 IT.AETERM"]);

        let edges: Vec<_> = export
            .edges
            .iter()
            .map(|e| (e.id.as_str(), e.source_oid.as_str(), e.target_oid.as_str()))
            .collect();
        assert_eq!(edges, vec![("e0", "F.AE", "IG.AE"), ("e1", "IG.AE", "IT.AETERM")]);
    }

    #[test]
    fn test_label_padding_tracks_vertex_count() {
        let mut g = Digraph::new();
        for i in 0..10 {
            g.add_vertex(Vertex::new(format!("IT.{i}"), ElementKind::Item, Phase::Tabulation));
        }
        let export = GraphExport::from_graph(&g);
        assert_eq!(export.nodes[0].label, "00 IT.0");
        assert_eq!(export.nodes[9].label, "09 IT.9");
    }

    #[test]
    fn test_graphml_output() {
        let xml = GraphExport::from_graph(&sample()).to_graphml().unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(r#"<key attr.name="detailedDesc" attr.type="string" for="node" id="d17"/>"#));
        assert!(xml.contains(r#"<node id="n2">"#));
        assert!(xml.contains(r#"<data key="d4">DATA_COLLECTION</data>"#));
        assert!(xml.contains(r#"<data key="d16">ItemDef</data>"#));
        assert!(xml.contains("Reported term &lt;verbatim&gt; &amp; text"));
        assert!(xml.contains(r#"<edge id="e1" source="n1" target="n2">"#));
        assert!(xml.contains(r#"<data key="d11">maps-to</data>"#));
        assert!(!xml.contains("root"));
    }

    #[test]
    fn test_plain_graphml_has_no_yed_markup() {
        let xml = GraphExport::from_graph(&sample()).to_graphml().unwrap();
        assert!(!xml.contains("xmlns:y="));
        assert!(!xml.contains("schemaLocation"));
        assert!(!xml.contains("y:ShapeNode"));
    }

    #[test]
    fn test_yed_graphml_adds_graphics() {
        let xml = GraphExport::from_graph(&sample()).to_yed_graphml().unwrap();

        assert!(xml.contains(r#"xmlns:y="http://www.yworks.com/xml/graphml""#));
        assert!(xml.contains(r#"xmlns:yed="http://www.yworks.com/xml/yed/3""#));
        assert!(xml.contains(
            r#"xsi:schemaLocation="http://graphml.graphdrawing.org/xmlns http://www.yworks.com/xml/schema/graphml/1.1/ygraphml.xsd""#
        ));
        assert!(xml.contains(r#"<key for="node" id="d8" yfiles.type="nodegraphics"/>"#));
        assert!(xml.contains(r#"<key for="edge" id="d12" yfiles.type="edgegraphics"/>"#));

        assert_eq!(xml.matches("<y:ShapeNode>").count(), 3);
        assert_eq!(xml.matches("<y:PolyLineEdge>").count(), 2);
        assert!(xml.contains(r##"<y:Fill color="#c0c0c0" transparent="false"/>"##));
        assert!(xml.contains(r##"<y:Fill color="#44aa00" transparent="false"/>"##));
        assert!(xml.contains(r##"<y:Fill color="#ffcc00" transparent="false"/>"##));
        assert!(xml.contains(r#"<y:Arrows source="none" target="standard"/>"#));

        // plain data keys are untouched
        assert!(xml.contains(r#"<data key="d11">maps-to</data>"#));
        assert!(xml.contains(r#"<data key="d16">ItemDef</data>"#));
    }

    #[test]
    fn test_export_is_deterministic() {
        let a = GraphExport::from_graph(&sample()).to_graphml().unwrap();
        let b = GraphExport::from_graph(&sample()).to_graphml().unwrap();
        assert_eq!(a, b);
    }
}
