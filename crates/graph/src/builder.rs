use crate::error::Result;
use crate::graph::Digraph;
use crate::types::{ElementKind, Phase, Vertex};
use petgraph::graph::NodeIndex;
use serde::Serialize;
use trace_metadata::MetadataDocument;

/// Populates the shared graph from one lifecycle phase's metadata document
pub trait PhaseBuilder {
    /// Phase every vertex created by this builder belongs to
    fn phase(&self) -> Phase;

    /// Add the document's elements to `graph`
    ///
    /// References that cannot be resolved even after the document has been
    /// fully processed abort the build.
    fn build(&mut self, graph: &mut Digraph, document: &MetadataDocument) -> Result<BuildStats>;
}

/// Summary of one builder run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub phase: Option<Phase>,
    pub vertices_added: usize,
    pub vertices_reused: usize,
    pub edges_added: usize,
    /// Source references resolved only by the reconciliation pass
    pub deferred_resolved: usize,
    /// Dangling element references skipped with a warning
    pub skipped: usize,
}

impl BuildStats {
    pub(crate) fn start(phase: Phase, graph: &Digraph) -> (Self, usize) {
        (
            Self {
                phase: Some(phase),
                ..Self::default()
            },
            graph.edge_count(),
        )
    }

    pub(crate) fn finish(mut self, graph: &Digraph, edges_before: usize) -> Self {
        self.edges_added = graph.edge_count() - edges_before;
        if let Some(phase) = self.phase {
            log::info!(
                "Built {} graph: {} vertices added, {} reused, {} edges, {} deferred references resolved",
                phase,
                self.vertices_added,
                self.vertices_reused,
                self.edges_added,
                self.deferred_resolved
            );
        }
        self
    }
}

/// Reuse the vertex with this OID in `phase`, or create it with `make`
///
/// When the OID is only known from another phase, a non-unique warning is
/// recorded and a separate phase-local vertex is created. Returns `None`
/// when the graph refuses the vertex.
pub(crate) fn find_or_add(
    graph: &mut Digraph,
    stats: &mut BuildStats,
    phase: Phase,
    kind: ElementKind,
    oid: &str,
    make: impl FnOnce() -> Vertex,
) -> Option<NodeIndex> {
    if let Some(idx) = graph.find_in_phase(phase, oid) {
        stats.vertices_reused += 1;
        return Some(idx);
    }

    let first_phase = graph
        .find(oid)
        .and_then(|idx| graph.vertex(idx))
        .and_then(|v| v.phase);
    if let Some(first_phase) = first_phase {
        graph.note_non_unique(kind, oid, first_phase, phase);
    }

    let idx = graph.add_vertex(make())?;
    stats.vertices_added += 1;
    Some(idx)
}
