use crate::graph::Digraph;
use crate::origin::Origin;
use petgraph::graph::NodeIndex;
use petgraph::visit::Dfs;
use std::collections::HashSet;

/// Vertex not reached from root
#[derive(Debug, Clone, PartialEq)]
pub struct UnmarkedNode {
    pub index: NodeIndex,
    pub oid: String,
    pub origin: Option<Origin>,
}

impl UnmarkedNode {
    /// `oid (origin)` label used in reports
    pub fn label(&self) -> String {
        format!(
            "{} ({})",
            self.oid,
            self.origin.as_ref().map_or("", Origin::as_str)
        )
    }
}

/// Depth-first reachability from root along target edges
///
/// Root itself is never marked. Cycles are tolerated.
pub struct Reachability {
    marked: HashSet<NodeIndex>,
    order: Vec<NodeIndex>,
}

impl Reachability {
    pub fn run(graph: &Digraph) -> Self {
        let root = graph.root();
        let mut dfs = Dfs::new(graph.inner(), root);
        let mut marked = HashSet::new();
        let mut order = Vec::new();

        while let Some(idx) = dfs.next(graph.inner()) {
            if idx != root && marked.insert(idx) {
                order.push(idx);
            }
        }

        log::debug!("Reachability: {} of {} vertices marked", order.len(), graph.vertex_count() - 1);
        Self { marked, order }
    }

    pub fn is_marked(&self, idx: NodeIndex) -> bool {
        self.marked.contains(&idx)
    }

    /// Marked OIDs in visit order
    pub fn marked<'g>(&self, graph: &'g Digraph) -> Vec<&'g str> {
        self.order
            .iter()
            .filter_map(|&idx| graph.vertex(idx))
            .map(|v| v.oid.as_str())
            .collect()
    }

    pub fn marked_count(&self) -> usize {
        self.order.len()
    }

    /// Every non-root vertex not reached, in insertion order
    pub fn unmarked(&self, graph: &Digraph) -> Vec<UnmarkedNode> {
        graph
            .vertices()
            .filter(|(idx, v)| !v.is_root() && !self.marked.contains(idx))
            .map(|(index, v)| UnmarkedNode {
                index,
                oid: v.oid.clone(),
                origin: v.origin.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ElementKind, Phase, Vertex};
    use pretty_assertions::assert_eq;

    fn add(graph: &mut Digraph, oid: &str) -> NodeIndex {
        graph
            .add_vertex(Vertex::new(oid, ElementKind::Item, Phase::Tabulation))
            .unwrap()
    }

    #[test]
    fn test_marks_only_reachable_vertices() {
        let mut g = Digraph::new();
        let a = add(&mut g, "A");
        let b = add(&mut g, "B");
        let c = add(&mut g, "C");
        let root = g.root();
        g.connect(root, a);
        g.connect(a, b);
        g.connect(c, b);

        let r = Reachability::run(&g);
        assert_eq!(r.marked(&g), vec!["A", "B"]);
        assert!(!r.is_marked(root));

        let unmarked: Vec<_> = r.unmarked(&g).into_iter().map(|n| n.oid).collect();
        assert_eq!(unmarked, vec!["C"]);
    }

    #[test]
    fn test_cycles_terminate() {
        let mut g = Digraph::new();
        let a = add(&mut g, "A");
        let b = add(&mut g, "B");
        let root = g.root();
        g.connect(root, a);
        g.connect(a, b);
        g.connect(b, a);

        let r = Reachability::run(&g);
        assert_eq!(r.marked_count(), 2);
        assert!(r.unmarked(&g).is_empty());
    }

    #[test]
    fn test_empty_graph_has_nothing_unmarked() {
        let g = Digraph::new();
        let r = Reachability::run(&g);
        assert!(r.marked(&g).is_empty());
        assert!(r.unmarked(&g).is_empty());
    }

    #[test]
    fn test_unmarked_label() {
        let node = UnmarkedNode {
            index: NodeIndex::new(3),
            oid: "ItemB".to_string(),
            origin: Some(Origin::Assigned),
        };
        assert_eq!(node.label(), "ItemB (Assigned)");
    }
}
