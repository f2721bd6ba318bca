use crate::builder::{BuildStats, PhaseBuilder};
use crate::collection::CollectionBuilder;
use crate::define::DefineBuilder;
use crate::error::Result;
use crate::export::GraphExport;
use crate::graph::Digraph;
use crate::reachability::Reachability;
use crate::reclassify::reclassify;
use crate::report::ReachabilityReport;
use crate::trace::{DeepTrace, ProvenanceWalk};
use crate::types::Phase;
use trace_metadata::MetadataDocument;

/// Metadata document for one lifecycle phase
#[derive(Debug, Clone)]
pub struct PhaseDocument {
    pub phase: Phase,
    pub document: MetadataDocument,
}

impl PhaseDocument {
    pub fn new(phase: Phase, document: MetadataDocument) -> Self {
        Self { phase, document }
    }
}

/// Analysis switches
#[derive(Debug, Clone, Copy)]
pub struct TraceOptions {
    /// Run the deep-trace re-classification round
    pub retest: bool,
    /// Include the reachable OID list in the report
    pub include_reachable: bool,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            retest: true,
            include_reachable: false,
        }
    }
}

/// Everything a run produces
#[derive(Debug)]
pub struct TraceOutcome {
    pub build: Vec<BuildStats>,
    pub report: ReachabilityReport,
    pub export: GraphExport,
}

/// Build the graph from phase documents in lifecycle order and attach root
pub fn build_graph(documents: &[PhaseDocument]) -> Result<(Digraph, Vec<BuildStats>)> {
    let mut ordered: Vec<&PhaseDocument> = documents.iter().collect();
    ordered.sort_by_key(|d| d.phase);

    let mut graph = Digraph::new();
    let mut stats = Vec::new();

    for doc in ordered {
        let mut builder: Box<dyn PhaseBuilder> = match doc.phase {
            Phase::DataCollection => Box::new(CollectionBuilder::new()),
            Phase::Tabulation | Phase::Analysis => Box::new(DefineBuilder::new(doc.phase)),
            Phase::Ehr | Phase::AnalysisResults => {
                log::warn!("{} graph not yet supported, document skipped", doc.phase);
                continue;
            }
        };
        stats.push(builder.build(&mut graph, &doc.document)?);
    }

    graph.connect_root_node();
    log::info!(
        "Graph complete: {} vertices, {} edges",
        graph.vertex_count(),
        graph.edge_count()
    );
    Ok((graph, stats))
}

/// Reachability analysis and re-classification over a built graph
pub fn analyze(
    graph: &mut Digraph,
    options: TraceOptions,
    oracle: &dyn DeepTrace,
) -> Result<ReachabilityReport> {
    let reachable = options.include_reachable.then(|| {
        Reachability::run(graph)
            .marked(graph)
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>()
    });

    let oracle = options.retest.then_some(oracle);
    let mut report = reclassify(graph, oracle)?;
    report.reachable = reachable;
    Ok(report)
}

/// Full run: build, analyze with the in-memory provenance walk, export
pub fn run(documents: &[PhaseDocument], options: TraceOptions) -> Result<TraceOutcome> {
    let (mut graph, build) = build_graph(documents)?;
    let report = analyze(&mut graph, options, &ProvenanceWalk)?;
    let export = GraphExport::from_graph(&graph);
    Ok(TraceOutcome {
        build,
        report,
        export,
    })
}
