use crate::error::{GraphError, Result};
use crate::graph::Digraph;
use crate::types::ElementKind;
use petgraph::graph::NodeIndex;
use std::collections::HashSet;

/// Terminal vertex of a provenance fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminal {
    pub index: NodeIndex,
    pub oid: String,
    /// Origin tag, empty when unset
    pub origin: String,
}

/// Resolves a vertex's provenance to its terminal nodes
///
/// Terminals are identified by vertex index, so an OID defined in several
/// phases never stands in for the wrong vertex. A failure aborts the run.
pub trait DeepTrace {
    fn trace(&self, graph: &Digraph, start: NodeIndex) -> Result<Vec<Terminal>>;
}

/// In-memory provenance walk along source edges
///
/// Only item and method sources are followed; root and the structural
/// form/group containers are not provenance. Terminals are vertices with no
/// such sources, so the start vertex is its own terminal when nothing feeds
/// it. Terminals come back in vertex insertion order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProvenanceWalk;

impl DeepTrace for ProvenanceWalk {
    fn trace(&self, graph: &Digraph, start: NodeIndex) -> Result<Vec<Terminal>> {
        let Some(start_v) = graph.vertex(start) else {
            return Err(GraphError::TraceFailed {
                oid: format!("#{}", start.index()),
                reason: "no vertex at this index".to_string(),
            });
        };

        let mut terminals = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![start];

        while let Some(idx) = stack.pop() {
            if !visited.insert(idx) {
                continue;
            }
            let sources: Vec<_> = graph
                .sources(idx)
                .into_iter()
                .filter(|&s| {
                    graph
                        .vertex(s)
                        .is_some_and(|v| matches!(v.kind, ElementKind::Item | ElementKind::Method))
                })
                .collect();

            if sources.is_empty() {
                if let Some(v) = graph.vertex(idx) {
                    terminals.push(Terminal {
                        index: idx,
                        oid: v.oid.clone(),
                        origin: v.origin_tag().to_string(),
                    });
                }
            } else {
                stack.extend(sources);
            }
        }

        terminals.sort_by_key(|t| t.index);
        log::debug!("Trace of {} ended in {} terminal nodes", start_v.oid, terminals.len());
        Ok(terminals)
    }
}
