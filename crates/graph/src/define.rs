use crate::builder::{find_or_add, BuildStats, PhaseBuilder};
use crate::collection::{find_def, qualified_name};
use crate::error::Result;
use crate::graph::Digraph;
use crate::origin::Origin;
use crate::resolver::{PendingReferences, SourceRef};
use crate::types::{ElementKind, Phase, Vertex};
use petgraph::graph::NodeIndex;
use trace_metadata::{MetadataDocument, MetadataElement, Namespaces};

/// Builds tabulation (SDTM) and analysis (ADaM) graphs from Define-XML
///
/// Each `ItemGroupDef` becomes an ItemGroup vertex with origin `Collection`
/// and each referenced `ItemDef` an Item vertex under it. An item is then
/// fed either by a derivation method, by the items of its value list, or
/// directly by the sources listed in `def:Origin/trc:Trace`.
pub struct DefineBuilder {
    phase: Phase,
    pending: PendingReferences,
}

/// Borrowed view of the document being built
struct Scope<'a> {
    ns: &'a Namespaces,
    mdv: &'a MetadataElement,
}

impl DefineBuilder {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            pending: PendingReferences::new(),
        }
    }

    pub fn tabulation() -> Self {
        Self::new(Phase::Tabulation)
    }

    pub fn analysis() -> Self {
        Self::new(Phase::Analysis)
    }

    fn add_group(&mut self, graph: &mut Digraph, stats: &mut BuildStats, scope: &Scope, group: &MetadataElement) {
        let Some(oid) = group.non_empty_attr("OID") else {
            log::warn!("ItemGroupDef without OID ignored");
            return;
        };

        let phase = self.phase;
        let odm = scope.ns.odm.as_str();
        let group_idx = find_or_add(graph, stats, phase, ElementKind::ItemGroup, oid, || {
            Vertex::new(oid, ElementKind::ItemGroup, phase)
                .with_origin(Origin::Collection)
                .with_name(group.attr("Name").unwrap_or_default())
                .with_description(group.translated_text(odm).unwrap_or_default())
        });
        let Some(group_idx) = group_idx else {
            return;
        };

        let mut expanding = Vec::new();
        for item_ref in group.children(odm, "ItemRef") {
            self.add_item_ref(graph, stats, scope, group_idx, item_ref, &mut expanding);
        }
    }

    /// Materialize the item an `ItemRef` names under `parent_idx`
    ///
    /// `expanding` holds the value lists currently being recursed into.
    fn add_item_ref(
        &mut self,
        graph: &mut Digraph,
        stats: &mut BuildStats,
        scope: &Scope,
        parent_idx: NodeIndex,
        item_ref: &MetadataElement,
        expanding: &mut Vec<String>,
    ) {
        let odm = scope.ns.odm.as_str();
        let item_oid = item_ref.attr("ItemOID").unwrap_or_default();
        let Some(item) = find_def(scope.mdv, odm, "ItemDef", item_oid) else {
            log::warn!(
                "ItemRef {item_oid} under {} has no ItemDef",
                qualified_name(graph, parent_idx)
            );
            stats.skipped += 1;
            return;
        };

        let phase = self.phase;
        let parent = qualified_name(graph, parent_idx);
        let item_idx = find_or_add(graph, stats, phase, ElementKind::Item, item_oid, || {
            let mut vertex = Vertex::new(item_oid, ElementKind::Item, phase)
                .with_qualified_name(format!("{parent}:{item_oid}"))
                .with_name(item.attr("Name").unwrap_or_default())
                .with_description(item.translated_text(odm).unwrap_or_default());
            vertex.origin = item_origin(item, scope.ns);
            vertex
        });
        let Some(item_idx) = item_idx else {
            return;
        };
        graph.connect(parent_idx, item_idx);

        if let Some(method_oid) = method_oid(item_ref) {
            self.add_method(graph, stats, scope, method_oid, item_idx, item);
        } else if let Some(value_list_oid) = value_list_oid(item, scope.ns) {
            self.add_value_list(graph, stats, scope, value_list_oid, item_idx, expanding);
        } else {
            self.add_source_items(graph, scope.ns, item, item_idx);
        }
    }

    /// Wire `Method -> item`, feeding the method with the item's sources
    fn add_method(
        &mut self,
        graph: &mut Digraph,
        stats: &mut BuildStats,
        scope: &Scope,
        method_oid: &str,
        item_idx: NodeIndex,
        item: &MetadataElement,
    ) {
        let odm = scope.ns.odm.as_str();
        let method_idx = match graph.find_in_phase(self.phase, method_oid) {
            Some(idx) => {
                stats.vertices_reused += 1;
                Some(idx)
            }
            None => {
                let Some(method) = find_def(scope.mdv, odm, "MethodDef", method_oid) else {
                    log::warn!("Unable to find method {method_oid}");
                    stats.skipped += 1;
                    return;
                };
                let phase = self.phase;
                find_or_add(graph, stats, phase, ElementKind::Method, method_oid, || {
                    let mut vertex = Vertex::new(method_oid, ElementKind::Method, phase)
                        .with_origin(Origin::Method)
                        .with_name(method.attr("Name").unwrap_or_default())
                        .with_description(method.translated_text(odm).unwrap_or_default());
                    vertex.method_type = method.non_empty_attr("Type").map(str::to_string);
                    vertex
                })
            }
        };
        let Some(method_idx) = method_idx else {
            return;
        };

        self.add_source_items(graph, scope.ns, item, method_idx);
        graph.connect(method_idx, item_idx);
    }

    /// Recurse into the items of a value list, parented by the item using it
    fn add_value_list(
        &mut self,
        graph: &mut Digraph,
        stats: &mut BuildStats,
        scope: &Scope,
        value_list_oid: &str,
        item_idx: NodeIndex,
        expanding: &mut Vec<String>,
    ) {
        if expanding.iter().any(|oid| oid == value_list_oid) {
            log::warn!("Value list {value_list_oid} refers back to itself, not expanded again");
            return;
        }

        let Some(value_list) = find_def(scope.mdv, &scope.ns.def, "ValueListDef", value_list_oid) else {
            log::warn!("Unable to find value list {value_list_oid}");
            stats.skipped += 1;
            return;
        };

        expanding.push(value_list_oid.to_string());
        for item_ref in value_list.children(&scope.ns.odm, "ItemRef") {
            self.add_item_ref(graph, stats, scope, item_idx, item_ref, expanding);
        }
        expanding.pop();
    }

    /// Wire the `trc:TraceItem` sources of an item's origin into `target`
    fn add_source_items(&mut self, graph: &mut Digraph, ns: &Namespaces, item: &MetadataElement, target: NodeIndex) {
        let Some(origin) = item.child(&ns.def, "Origin") else {
            return;
        };
        let Some(origin_type) = origin.attr("Type") else {
            return;
        };
        if !Origin::parse(origin_type).implies_source_items() {
            return;
        }
        let Some(trace) = origin.child(&ns.trace, "Trace") else {
            return;
        };

        for trace_item in trace.children(&ns.trace, "TraceItem") {
            match SourceRef::from_element(trace_item) {
                Some(source) => {
                    self.pending.link(graph, source, target);
                }
                None => log::warn!("TraceItem without ItemOID ignored"),
            }
        }
    }
}

impl PhaseBuilder for DefineBuilder {
    fn phase(&self) -> Phase {
        self.phase
    }

    fn build(&mut self, graph: &mut Digraph, document: &MetadataDocument) -> Result<BuildStats> {
        log::info!("Building graph from {} metadata", self.phase);
        let (mut stats, edges_before) = BuildStats::start(self.phase, graph);

        let scope = Scope {
            ns: document.namespaces(),
            mdv: document.metadata_version()?,
        };
        for group in scope.mdv.children(&scope.ns.odm, "ItemGroupDef") {
            self.add_group(graph, &mut stats, &scope, group);
        }

        if !self.pending.is_empty() {
            log::debug!("Re-checking {} source references", self.pending.len());
        }
        stats.deferred_resolved = self.pending.reconcile(graph)?;

        Ok(stats.finish(graph, edges_before))
    }
}

/// Origin declared by an item's `def:Origin`, if any
fn item_origin(item: &MetadataElement, ns: &Namespaces) -> Option<Origin> {
    let origin = item.child(&ns.def, "Origin")?;

    let origin_type = match origin.non_empty_attr("Type") {
        Some(tag) => Origin::parse(tag),
        None => {
            log::error!(
                "Origin of {} is missing the Type attribute; using None",
                item.attr("OID").unwrap_or_default()
            );
            Origin::NotCollected
        }
    };

    if origin.attr_ns(&ns.trace, "NoTraceItems") == Some("Yes") {
        return Some(Origin::DerivedNoSource);
    }
    Some(origin_type)
}

fn method_oid(item_ref: &MetadataElement) -> Option<&str> {
    item_ref
        .attributes
        .iter()
        .find(|a| a.namespace.is_none() && a.name.eq_ignore_ascii_case("MethodOID"))
        .map(|a| a.value.as_str())
        .filter(|v| !v.is_empty())
}

fn value_list_oid<'a>(item: &'a MetadataElement, ns: &Namespaces) -> Option<&'a str> {
    item.child(&ns.def, "ValueListRef")
        .and_then(|r| r.non_empty_attr("ValueListOID"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SDTM: &str = r#"<ODM xmlns="http://www.cdisc.org/ns/odm/v1.3"
     xmlns:def="http://www.cdisc.org/ns/def/v2.0"
     xmlns:trc="http://www.cdisc.org/ns/trace/v1.0">
  <Study OID="S1">
    <MetaDataVersion OID="MDV.SDTM">
      <ItemGroupDef OID="IG.VS" Name="VS">
        <ItemRef ItemOID="IT.VS.VSORRES" Mandatory="Yes"/>
        <ItemRef ItemOID="IT.VS.VSSTRESN" Mandatory="No" MethodOID="MT.STRESN"/>
        <ItemRef ItemOID="IT.VS.VSTESTCD" Mandatory="Yes"/>
        <ItemRef ItemOID="IT.VS.STUDYID" Mandatory="Yes"/>
        <ItemRef ItemOID="IT.VS.VSSEQ" Mandatory="Yes"/>
      </ItemGroupDef>
      <ItemDef OID="IT.VS.VSORRES" Name="VSORRES">
        <def:ValueListRef ValueListOID="VL.VSORRES"/>
      </ItemDef>
      <ItemDef OID="IT.VS.VSORRES.SYSBP" Name="VSORRES">
        <def:Origin Type="CRF">
          <trc:Trace>
            <trc:TraceItem FormOID="F.VS" ItemGroupOID="IG.VS" ItemOID="IT.SYSBP"/>
          </trc:Trace>
        </def:Origin>
      </ItemDef>
      <ItemDef OID="IT.VS.VSSTRESN" Name="VSSTRESN">
        <def:Origin Type="Derived">
          <trc:Trace>
            <trc:TraceItem ItemGroupOID="IG.VS" ItemOID="IT.VS.VSORRES"/>
          </trc:Trace>
        </def:Origin>
      </ItemDef>
      <ItemDef OID="IT.VS.VSTESTCD" Name="VSTESTCD">
        <def:Origin Type="Assigned"/>
      </ItemDef>
      <ItemDef OID="IT.VS.STUDYID" Name="STUDYID">
        <def:Origin Type="Protocol" trc:NoTraceItems="Yes"/>
      </ItemDef>
      <ItemDef OID="IT.VS.VSSEQ" Name="VSSEQ">
        <def:Origin/>
      </ItemDef>
      <def:ValueListDef OID="VL.VSORRES">
        <ItemRef ItemOID="IT.VS.VSORRES.SYSBP" Mandatory="No"/>
      </def:ValueListDef>
      <MethodDef OID="MT.STRESN" Name="Standardize" Type="Computation">
        <Description><TranslatedText>Numeric version of VSORRES</TranslatedText></Description>
      </MethodDef>
    </MetaDataVersion>
  </Study>
</ODM>"#;

    fn graph_with_collection() -> Digraph {
        let mut graph = Digraph::new();
        let form = graph
            .add_vertex(Vertex::new("F.VS", ElementKind::FormGroup, Phase::DataCollection))
            .unwrap();
        let group = graph
            .add_vertex(
                Vertex::new("IG.VS", ElementKind::ItemGroup, Phase::DataCollection)
                    .with_qualified_name("F.VS:IG.VS"),
            )
            .unwrap();
        let sysbp = graph
            .add_vertex(
                Vertex::new("IT.SYSBP", ElementKind::Item, Phase::DataCollection)
                    .with_qualified_name("F.VS:IG.VS:IT.SYSBP"),
            )
            .unwrap();
        graph.connect(form, group);
        graph.connect(group, sysbp);
        graph
    }

    fn build(graph: &mut Digraph) -> BuildStats {
        let doc = MetadataDocument::parse(SDTM).unwrap();
        DefineBuilder::tabulation().build(graph, &doc).unwrap()
    }

    #[test]
    fn test_group_gets_collection_origin() {
        let mut graph = graph_with_collection();
        build(&mut graph);

        let group = graph.find_in_phase(Phase::Tabulation, "IG.VS").unwrap();
        let v = graph.vertex(group).unwrap();
        assert_eq!(v.origin, Some(Origin::Collection));
        assert_eq!(v.qualified_name, "IG.VS");
    }

    #[test]
    fn test_value_list_items_hang_off_parent_item() {
        let mut graph = graph_with_collection();
        build(&mut graph);

        let orres = graph.find("IT.VS.VSORRES").unwrap();
        let sysbp_vl = graph.find("IT.VS.VSORRES.SYSBP").unwrap();
        let collected = graph.find("IT.SYSBP").unwrap();

        assert_eq!(graph.sources(sysbp_vl), vec![orres, collected]);
        assert_eq!(
            graph.vertex(sysbp_vl).unwrap().qualified_name,
            "IG.VS:IT.VS.VSORRES:IT.VS.VSORRES.SYSBP"
        );
    }

    #[test]
    fn test_method_sits_between_sources_and_item() {
        let mut graph = graph_with_collection();
        build(&mut graph);

        let method = graph.find("MT.STRESN").unwrap();
        let stresn = graph.find("IT.VS.VSSTRESN").unwrap();
        let orres = graph.find("IT.VS.VSORRES").unwrap();

        let m = graph.vertex(method).unwrap();
        assert_eq!(m.origin, Some(Origin::Method));
        assert_eq!(m.method_type.as_deref(), Some("Computation"));
        assert_eq!(m.description, "Numeric version of VSORRES");

        assert_eq!(graph.sources(method), vec![orres]);
        assert!(graph.sources(stresn).contains(&method));
        assert!(!graph.sources(stresn).contains(&orres));
    }

    #[test]
    fn test_origin_flags() {
        let mut graph = graph_with_collection();
        build(&mut graph);

        let origin = |oid: &str| graph.get_vertex(oid).unwrap().origin.clone();
        assert_eq!(origin("IT.VS.VSTESTCD"), Some(Origin::Assigned));
        assert_eq!(origin("IT.VS.STUDYID"), Some(Origin::DerivedNoSource));
        assert_eq!(origin("IT.VS.VSSEQ"), Some(Origin::NotCollected));
        assert_eq!(origin("IT.VS.VSORRES"), None);
    }

    #[test]
    fn test_cross_phase_group_oid_is_split() {
        let mut graph = graph_with_collection();
        build(&mut graph);

        let collected = graph.find_in_phase(Phase::DataCollection, "IG.VS").unwrap();
        let tabulated = graph.find_in_phase(Phase::Tabulation, "IG.VS").unwrap();
        assert_ne!(collected, tabulated);
        assert_eq!(
            graph.non_unique_oids(),
            vec![("IG.VS".to_string(), Phase::DataCollection, Phase::Tabulation)]
        );
    }

    #[test]
    fn test_unresolved_source_aborts_build() {
        let doc = MetadataDocument::parse(SDTM).unwrap();
        let mut graph = Digraph::new();
        let err = DefineBuilder::tabulation().build(&mut graph, &doc).unwrap_err();
        assert!(matches!(
            err,
            crate::GraphError::UnresolvedReference { ref oid, .. } if oid == "IT.SYSBP"
        ));
    }
}
