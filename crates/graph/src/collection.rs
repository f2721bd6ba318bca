use crate::builder::{find_or_add, BuildStats, PhaseBuilder};
use crate::error::Result;
use crate::graph::Digraph;
use crate::types::{ElementKind, Phase, Vertex};
use petgraph::graph::NodeIndex;
use trace_metadata::{MetadataDocument, MetadataElement};

/// Builds the data collection graph from ODM-XML
///
/// Walks `FormDef -> ItemGroupRef -> ItemGroupDef -> ItemRef -> ItemDef` and
/// wires Form -> ItemGroup -> Item. Only definitions that are referenced
/// from a form are materialized.
pub struct CollectionBuilder {
    phase: Phase,
}

impl CollectionBuilder {
    pub fn new() -> Self {
        Self {
            phase: Phase::DataCollection,
        }
    }

    fn add_form(
        &self,
        graph: &mut Digraph,
        stats: &mut BuildStats,
        ns: &str,
        mdv: &MetadataElement,
        form: &MetadataElement,
    ) {
        let Some(oid) = form.non_empty_attr("OID") else {
            log::warn!("FormDef without OID ignored");
            return;
        };

        let phase = self.phase;
        let form_idx = find_or_add(graph, stats, phase, ElementKind::FormGroup, oid, || {
            Vertex::new(oid, ElementKind::FormGroup, phase)
                .with_name(form.attr("Name").unwrap_or_default())
                .with_description(form.translated_text(ns).unwrap_or_default())
        });
        let Some(form_idx) = form_idx else {
            return;
        };

        for group_ref in form.children(ns, "ItemGroupRef") {
            let group_oid = group_ref.attr("ItemGroupOID").unwrap_or_default();
            match find_def(mdv, ns, "ItemGroupDef", group_oid) {
                Some(group) => self.add_group(graph, stats, ns, mdv, form_idx, group),
                None => {
                    log::warn!("ItemGroupRef {group_oid} in form {oid} has no ItemGroupDef");
                    stats.skipped += 1;
                }
            }
        }
    }

    fn add_group(
        &self,
        graph: &mut Digraph,
        stats: &mut BuildStats,
        ns: &str,
        mdv: &MetadataElement,
        form_idx: NodeIndex,
        group: &MetadataElement,
    ) {
        let Some(oid) = group.non_empty_attr("OID") else {
            return;
        };

        let phase = self.phase;
        let parent = qualified_name(graph, form_idx);
        let group_idx = find_or_add(graph, stats, phase, ElementKind::ItemGroup, oid, || {
            Vertex::new(oid, ElementKind::ItemGroup, phase)
                .with_qualified_name(format!("{parent}:{oid}"))
                .with_name(group.attr("Name").unwrap_or_default())
                .with_description(group.translated_text(ns).unwrap_or_default())
        });
        let Some(group_idx) = group_idx else {
            return;
        };
        graph.connect(form_idx, group_idx);

        for item_ref in group.children(ns, "ItemRef") {
            let item_oid = item_ref.attr("ItemOID").unwrap_or_default();
            match find_def(mdv, ns, "ItemDef", item_oid) {
                Some(item) => self.add_item(graph, stats, ns, group_idx, item),
                None => {
                    log::warn!("ItemRef {item_oid} in item group {oid} has no ItemDef");
                    stats.skipped += 1;
                }
            }
        }
    }

    fn add_item(
        &self,
        graph: &mut Digraph,
        stats: &mut BuildStats,
        ns: &str,
        group_idx: NodeIndex,
        item: &MetadataElement,
    ) {
        let Some(oid) = item.non_empty_attr("OID") else {
            return;
        };

        let phase = self.phase;
        let parent = qualified_name(graph, group_idx);
        let item_idx = find_or_add(graph, stats, phase, ElementKind::Item, oid, || {
            Vertex::new(oid, ElementKind::Item, phase)
                .with_qualified_name(format!("{parent}:{oid}"))
                .with_name(item.attr("Name").unwrap_or_default())
                .with_description(item.translated_text(ns).unwrap_or_default())
        });
        if let Some(item_idx) = item_idx {
            graph.connect(group_idx, item_idx);
        }
    }
}

impl Default for CollectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseBuilder for CollectionBuilder {
    fn phase(&self) -> Phase {
        self.phase
    }

    fn build(&mut self, graph: &mut Digraph, document: &MetadataDocument) -> Result<BuildStats> {
        log::info!("Building graph from {} metadata", self.phase);
        let (mut stats, edges_before) = BuildStats::start(self.phase, graph);

        let ns = document.namespaces().odm.as_str();
        let mdv = document.metadata_version()?;
        for form in mdv.children(ns, "FormDef") {
            self.add_form(graph, &mut stats, ns, mdv, form);
        }

        Ok(stats.finish(graph, edges_before))
    }
}

/// Definition element of the given kind with this OID
pub(crate) fn find_def<'a>(
    mdv: &'a MetadataElement,
    ns: &str,
    element: &str,
    oid: &str,
) -> Option<&'a MetadataElement> {
    if oid.is_empty() {
        return None;
    }
    mdv.children(ns, element).find(|def| def.attr("OID") == Some(oid))
}

pub(crate) fn qualified_name(graph: &Digraph, idx: NodeIndex) -> String {
    graph
        .vertex(idx)
        .map(|v| v.qualified_name.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ODM: &str = r#"<ODM xmlns="http://www.cdisc.org/ns/odm/v1.3">
  <Study OID="S1">
    <MetaDataVersion OID="MDV.1">
      <FormDef OID="F.DM" Name="Demographics">
        <ItemGroupRef ItemGroupOID="IG.DM" Mandatory="Yes"/>
        <ItemGroupRef ItemGroupOID="IG.MISSING" Mandatory="No"/>
      </FormDef>
      <FormDef OID="F.DM2" Name="Demographics follow-up">
        <ItemGroupRef ItemGroupOID="IG.DM" Mandatory="Yes"/>
      </FormDef>
      <ItemGroupDef OID="IG.DM" Name="Demog">
        <Description><TranslatedText>Demographic  data</TranslatedText></Description>
        <ItemRef ItemOID="IT.AGE" Mandatory="Yes"/>
        <ItemRef ItemOID="IT.SEX" Mandatory="Yes"/>
      </ItemGroupDef>
      <ItemGroupDef OID="IG.UNUSED" Name="Unused">
        <ItemRef ItemOID="IT.UNUSED" Mandatory="No"/>
      </ItemGroupDef>
      <ItemDef OID="IT.AGE" Name="AGE" DataType="integer"/>
      <ItemDef OID="IT.SEX" Name="SEX" DataType="text"/>
      <ItemDef OID="IT.UNUSED" Name="UNUSED" DataType="text"/>
    </MetaDataVersion>
  </Study>
</ODM>"#;

    fn build() -> (Digraph, BuildStats) {
        let doc = MetadataDocument::parse(ODM).unwrap();
        let mut graph = Digraph::new();
        let stats = CollectionBuilder::new().build(&mut graph, &doc).unwrap();
        (graph, stats)
    }

    #[test]
    fn test_builds_form_group_item_chain() {
        let (graph, stats) = build();

        let form = graph.find("F.DM").unwrap();
        let group = graph.find("IG.DM").unwrap();
        let age = graph.find("IT.AGE").unwrap();
        let sex = graph.find("IT.SEX").unwrap();

        assert_eq!(graph.targets(form), vec![group]);
        assert_eq!(graph.targets(group), vec![age, sex]);

        let group_v = graph.vertex(group).unwrap();
        assert_eq!(group_v.qualified_name, "F.DM:IG.DM");
        assert_eq!(group_v.description, "Demographic data");
        assert_eq!(graph.vertex(age).unwrap().qualified_name, "F.DM:IG.DM:IT.AGE");
        assert_eq!(graph.vertex(age).unwrap().phase, Some(Phase::DataCollection));

        assert_eq!(stats.skipped, 1);
        assert_eq!(graph.phase_count(Phase::DataCollection), 5);
    }

    #[test]
    fn test_shared_group_keeps_first_qualified_name() {
        let (graph, _) = build();
        let group = graph.find("IG.DM").unwrap();
        let f1 = graph.find("F.DM").unwrap();
        let f2 = graph.find("F.DM2").unwrap();

        assert_eq!(graph.sources(group), vec![f1, f2]);
        assert_eq!(graph.vertex(group).unwrap().qualified_name, "F.DM:IG.DM");
    }

    #[test]
    fn test_unreferenced_definitions_are_skipped() {
        let (graph, _) = build();
        assert!(!graph.vertex_exists("IG.UNUSED"));
        assert!(!graph.vertex_exists("IT.UNUSED"));
    }

    #[test]
    fn test_collection_items_have_no_origin() {
        let (graph, _) = build();
        let age = graph.get_vertex("IT.AGE").unwrap();
        assert!(age.origin.is_none());
    }
}
