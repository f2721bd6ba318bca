use crate::error::Result;
use crate::graph::Digraph;
use crate::origin::{classify_origin, classify_tag, Traceability};
use crate::reachability::{Reachability, UnmarkedNode};
use crate::report::{ReachabilityReport, UnreachableEntry};
use crate::trace::DeepTrace;
use std::collections::HashSet;

/// Split unreachable vertices into orphans and expected gaps
///
/// First pass: unreachable vertices with a terminal origin are expected;
/// the rest are retested. Each retested vertex is traced with `oracle` and
/// every non-traceable terminal vertex found is attached to root. A second
/// reachability pass then reports still-unreachable traceable vertices as
/// orphans. There is exactly one retest round. Without an oracle the
/// second pass sees the unchanged graph.
///
/// Each OID lands in one bucket: when any vertex carrying an OID is an
/// orphan, expected entries for that OID are dropped.
pub fn reclassify(graph: &mut Digraph, oracle: Option<&dyn DeepTrace>) -> Result<ReachabilityReport> {
    let mut report = ReachabilityReport::default();
    let mut retest: Vec<UnmarkedNode> = Vec::new();

    let first = Reachability::run(graph);
    for node in first.unmarked(graph) {
        if classify_origin(node.origin.as_ref()).is_traceable() {
            retest.push(node);
        } else {
            push_unique(&mut report.expected_unreachable, UnreachableEntry::from(&node));
        }
    }
    log::info!(
        "First pass: {} expected unreachable, {} to retest",
        report.expected_unreachable.len(),
        retest.len()
    );

    if let Some(oracle) = oracle {
        for node in &retest {
            for terminal in oracle.trace(graph, node.index)? {
                if classify_tag(&terminal.origin) != Traceability::NotTraceable {
                    continue;
                }
                if graph.connect_index_to_root(terminal.index)? {
                    log::debug!(
                        "Attached {} ({}) to root while retesting {}",
                        terminal.oid,
                        terminal.origin,
                        node.oid
                    );
                }
                if !report.added_to_root.contains(&terminal.oid) {
                    report.added_to_root.push(terminal.oid);
                }
            }
        }
    }

    let second = Reachability::run(graph);
    for node in second.unmarked(graph) {
        let entry = UnreachableEntry::from(&node);
        if classify_origin(node.origin.as_ref()).is_traceable() {
            push_unique(&mut report.orphans, entry);
        } else {
            push_unique(&mut report.expected_unreachable, entry);
        }
    }

    let orphan_oids: HashSet<&str> = report.orphans.iter().map(|e| e.oid.as_str()).collect();
    report.expected_unreachable.retain(|e| {
        let keep = !orphan_oids.contains(e.oid.as_str());
        if !keep {
            log::debug!("{} reported as orphan, not as expected", e.label());
        }
        keep
    });

    if report.orphans.is_empty() {
        log::info!("No orphan nodes found");
    } else {
        log::warn!("{} orphan nodes found", report.orphans.len());
    }
    Ok(report)
}

fn push_unique(list: &mut Vec<UnreachableEntry>, entry: UnreachableEntry) {
    if !list.contains(&entry) {
        list.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::Origin;
    use crate::trace::ProvenanceWalk;
    use crate::types::{ElementKind, Phase, Vertex};
    use pretty_assertions::assert_eq;

    fn item(graph: &mut Digraph, oid: &str, origin: Origin) -> petgraph::graph::NodeIndex {
        graph
            .add_vertex(Vertex::new(oid, ElementKind::Item, Phase::Analysis).with_origin(origin))
            .unwrap()
    }

    #[test]
    fn test_terminal_sources_are_attached_to_root() {
        let mut g = Digraph::new();
        let assigned = item(&mut g, "IT.PARAMCD", Origin::Assigned);
        let derived = item(&mut g, "IT.AVAL", Origin::Derived);
        g.connect(assigned, derived);

        let report = reclassify(&mut g, Some(&ProvenanceWalk)).unwrap();

        assert_eq!(report.added_to_root, vec!["IT.PARAMCD"]);
        assert!(report.orphans.is_empty());
        // first-pass classification is kept
        assert_eq!(
            report.expected_unreachable,
            vec![UnreachableEntry::new("IT.PARAMCD", "Assigned")]
        );
    }

    #[test]
    fn test_without_oracle_traceable_nodes_are_orphans() {
        let mut g = Digraph::new();
        let assigned = item(&mut g, "IT.PARAMCD", Origin::Assigned);
        let derived = item(&mut g, "IT.AVAL", Origin::Derived);
        g.connect(assigned, derived);

        let report = reclassify(&mut g, None).unwrap();
        assert_eq!(report.orphans, vec![UnreachableEntry::new("IT.AVAL", "Derived")]);
        assert!(report.added_to_root.is_empty());
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_traceable_terminal_stays_orphan() {
        let mut g = Digraph::new();
        let crf = item(&mut g, "IT.RAW", Origin::Crf);
        let derived = item(&mut g, "IT.AVAL", Origin::Derived);
        g.connect(crf, derived);

        let report = reclassify(&mut g, Some(&ProvenanceWalk)).unwrap();
        assert_eq!(
            report.orphans,
            vec![
                UnreachableEntry::new("IT.RAW", "CRF"),
                UnreachableEntry::new("IT.AVAL", "Derived"),
            ]
        );
        assert!(report.expected_unreachable.is_empty());
    }

    #[test]
    fn test_promotion_attaches_the_traced_vertex_not_its_namesake() {
        let mut g = Digraph::new();
        let group = g
            .add_vertex(Vertex::new("IG.DM", ElementKind::ItemGroup, Phase::Tabulation))
            .unwrap();
        let sdtm = g
            .add_vertex(Vertex::new("X001", ElementKind::Item, Phase::Tabulation).with_origin(Origin::Protocol))
            .unwrap();
        g.connect(group, sdtm);
        g.connect_root_node();

        let adam = item(&mut g, "X001", Origin::Assigned);
        let derived = item(&mut g, "IT.Y", Origin::Derived);
        g.connect(adam, derived);

        let report = reclassify(&mut g, Some(&ProvenanceWalk)).unwrap();

        assert!(report.orphans.is_empty(), "{:?}", report.orphans);
        assert_eq!(report.added_to_root, vec!["X001"]);
        assert!(g.targets(g.root()).contains(&adam));
        assert!(!g.targets(g.root()).contains(&sdtm));
    }

    #[test]
    fn test_shared_oid_lands_in_one_bucket() {
        let mut g = Digraph::new();
        g.add_vertex(Vertex::new("X001", ElementKind::Item, Phase::Tabulation).with_origin(Origin::Derived))
            .unwrap();
        item(&mut g, "X001", Origin::Assigned);

        let report = reclassify(&mut g, Some(&ProvenanceWalk)).unwrap();

        assert_eq!(report.orphans, vec![UnreachableEntry::new("X001", "Derived")]);
        assert!(report.expected_unreachable.iter().all(|e| e.oid != "X001"));
    }

    #[test]
    fn test_orphan_labels_are_not_repeated() {
        let mut g = Digraph::new();
        g.add_vertex(Vertex::new("X001", ElementKind::Item, Phase::Tabulation).with_origin(Origin::Derived))
            .unwrap();
        item(&mut g, "X001", Origin::Derived);

        let report = reclassify(&mut g, None).unwrap();
        assert_eq!(report.orphans, vec![UnreachableEntry::new("X001", "Derived")]);
    }
}
