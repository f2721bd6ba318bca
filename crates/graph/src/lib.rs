//! # Trace Graph
//!
//! Provenance graph for clinical study metadata: which data elements feed
//! which, from collection through tabulation to analysis, and which elements
//! cannot be traced back to their sources.
//!
//! ## Features
//!
//! - **Phase builders** - ODM-XML forms and Define-XML datasets become one graph
//! - **Deferred references** - forward source references resolve after each document
//! - **Reachability** - depth-first search from a synthetic root
//! - **Re-classification** - unreachable nodes split into orphans and expected gaps
//! - **Export** - deterministic GraphML and JSON
//!
//! ## Architecture
//!
//! ```text
//! MetadataDocument (per phase)
//!     │
//!     ├──> Phase Builders
//!     │      ├─ CollectionBuilder: Form → ItemGroup → Item
//!     │      ├─ DefineBuilder: ItemGroup → Item, Method → Item, Source → Item
//!     │      └─ PendingReferences: qualified-name reconciliation
//!     │
//!     ├──> Digraph (petgraph arena, keyed by phase + OID)
//!     │      └─ root → entry nodes of the first phase
//!     │
//!     └──> Analysis
//!            ├─ Reachability (DFS from root)
//!            ├─ reclassify (one DeepTrace retest round)
//!            └─ ReachabilityReport + GraphExport
//! ```

mod builder;
mod collection;
mod define;
mod error;
mod export;
mod graph;
mod origin;
mod pipeline;
mod reachability;
mod reclassify;
mod report;
mod resolver;
mod trace;
mod types;

pub use builder::{BuildStats, PhaseBuilder};
pub use collection::CollectionBuilder;
pub use define::DefineBuilder;
pub use error::{GraphError, Result};
pub use export::{EdgeRecord, GraphExport, NodeRecord, EDGE_LABEL};
pub use graph::Digraph;
pub use origin::{classify_origin, classify_tag, Origin, Traceability};
pub use pipeline::{analyze, build_graph, run, PhaseDocument, TraceOptions, TraceOutcome};
pub use reachability::{Reachability, UnmarkedNode};
pub use reclassify::reclassify;
pub use report::{ReachabilityReport, UnreachableEntry};
pub use resolver::{PendingReferences, SourceRef};
pub use trace::{DeepTrace, ProvenanceWalk, Terminal};
pub use types::{ElementKind, Phase, Vertex, ROOT_OID};

pub use petgraph::graph::NodeIndex;
