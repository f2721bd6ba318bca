use crate::error::{GraphError, Result};
use crate::graph::Digraph;
use petgraph::graph::NodeIndex;
use trace_metadata::MetadataElement;

/// Upstream source named by a `trc:TraceItem`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub item_oid: String,
    pub item_group_oid: Option<String>,
    pub form_oid: Option<String>,
}

impl SourceRef {
    pub fn new(item_oid: impl Into<String>) -> Self {
        Self {
            item_oid: item_oid.into(),
            item_group_oid: None,
            form_oid: None,
        }
    }

    pub fn in_group(mut self, item_group_oid: impl Into<String>) -> Self {
        self.item_group_oid = Some(item_group_oid.into());
        self
    }

    pub fn in_form(mut self, form_oid: impl Into<String>) -> Self {
        self.form_oid = Some(form_oid.into());
        self
    }

    /// Read a `TraceItem` element; `None` when it names no item
    pub fn from_element(element: &MetadataElement) -> Option<Self> {
        let item_oid = element.non_empty_attr("ItemOID")?;
        Some(Self {
            item_oid: item_oid.to_string(),
            item_group_oid: element.non_empty_attr("ItemGroupOID").map(str::to_string),
            form_oid: element.non_empty_attr("FormOID").map(str::to_string),
        })
    }

    /// `form:group:item` path built from whichever context is present;
    /// `None` for a bare item reference
    pub fn qualified_name(&self) -> Option<String> {
        if self.item_group_oid.is_none() && self.form_oid.is_none() {
            return None;
        }
        let parts: Vec<&str> = [
            self.form_oid.as_deref(),
            self.item_group_oid.as_deref(),
            Some(self.item_oid.as_str()),
        ]
        .into_iter()
        .flatten()
        .collect();
        Some(parts.join(":"))
    }

    /// Vertex this reference names, if present in the graph
    ///
    /// With context the vertex's qualified name must match; a bare reference
    /// accepts the first vertex carrying the OID.
    pub fn resolve(&self, graph: &Digraph) -> Option<NodeIndex> {
        match self.qualified_name() {
            Some(qualified_name) => graph.find_by_qualified_name(&self.item_oid, &qualified_name),
            None => graph.find(&self.item_oid),
        }
    }
}

/// Source references waiting for a vertex defined later in the document
#[derive(Debug, Default)]
pub struct PendingReferences {
    pending: Vec<(SourceRef, NodeIndex)>,
}

impl PendingReferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire `source -> target` now if the source exists, otherwise buffer it
    ///
    /// Returns `true` when the reference was resolved immediately.
    pub fn link(&mut self, graph: &mut Digraph, source: SourceRef, target: NodeIndex) -> bool {
        match source.resolve(graph) {
            Some(idx) => {
                graph.connect(idx, target);
                true
            }
            None => {
                log::debug!("Unable to find source node: {}", source.item_oid);
                self.pending.push((source, target));
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Retry every buffered reference against the completed graph
    ///
    /// Every reference that still cannot be resolved is logged; the first one
    /// is returned as an error. On success returns the number wired.
    pub fn reconcile(&mut self, graph: &mut Digraph) -> Result<usize> {
        let mut resolved = 0;
        let mut unresolved = Vec::new();

        for (source, target) in self.pending.drain(..) {
            match source.resolve(graph) {
                Some(idx) => {
                    graph.connect(idx, target);
                    resolved += 1;
                }
                None => {
                    let target_oid = graph
                        .vertex(target)
                        .map(|v| v.oid.clone())
                        .unwrap_or_default();
                    log::error!(
                        "Bad OID reference: {} (qualified name {}) required by {}",
                        source.item_oid,
                        source.qualified_name().unwrap_or_default(),
                        target_oid
                    );
                    unresolved.push((source, target_oid));
                }
            }
        }

        match unresolved.into_iter().next() {
            Some((source, target)) => Err(GraphError::UnresolvedReference {
                oid: source.item_oid,
                target,
            }),
            None => Ok(resolved),
        }
    }
}
