use crate::error::{GraphError, Result};
use crate::types::{ElementKind, Phase, Vertex, ROOT_OID};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

/// Directed provenance graph
///
/// Vertices live in a petgraph arena; node indices follow insertion order
/// and are never invalidated because vertices are never removed. An OID is
/// unique within one phase; the same OID may recur across phases.
pub struct Digraph {
    graph: DiGraph<Vertex, ()>,
    root: NodeIndex,

    /// OID -> vertices carrying it, in insertion order
    oid_index: HashMap<String, Vec<NodeIndex>>,

    /// (phase, OID) -> vertex
    phase_index: HashMap<(Option<Phase>, String), NodeIndex>,

    phase_count: HashMap<Phase, usize>,

    /// (OID, first phase, later phase) triples already reported as non-unique
    non_unique: HashSet<(String, Phase, Phase)>,
}

impl Digraph {
    pub fn new() -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(Vertex::root());

        let mut oid_index = HashMap::new();
        oid_index.insert(ROOT_OID.to_string(), vec![root]);
        let mut phase_index = HashMap::new();
        phase_index.insert((None, ROOT_OID.to_string()), root);

        Self {
            graph,
            root,
            oid_index,
            phase_index,
            phase_count: HashMap::new(),
            non_unique: HashSet::new(),
        }
    }

    /// Insert a vertex unless its OID is already present in its phase
    ///
    /// Returns `None` (and logs a warning) for duplicates and for attempts to
    /// insert a second root.
    pub fn add_vertex(&mut self, vertex: Vertex) -> Option<NodeIndex> {
        if vertex.is_root() || vertex.oid == ROOT_OID || vertex.phase.is_none() {
            log::warn!(
                "Refusing to add vertex {} outside of a lifecycle phase",
                vertex.oid
            );
            return None;
        }

        let key = (vertex.phase, vertex.oid.clone());
        if self.phase_index.contains_key(&key) {
            log::warn!(
                "Duplicate node found ({}) and will not be added to the graph again",
                vertex.oid
            );
            return None;
        }

        let oid = vertex.oid.clone();
        let phase = vertex.phase;
        let idx = self.graph.add_node(vertex);

        self.phase_index.insert(key, idx);
        self.oid_index.entry(oid).or_default().push(idx);
        if let Some(phase) = phase {
            *self.phase_count.entry(phase).or_insert(0) += 1;
        }

        Some(idx)
    }

    /// Add the edge `source -> target` unless it already exists
    pub fn connect(&mut self, source: NodeIndex, target: NodeIndex) -> bool {
        if self.graph.find_edge(source, target).is_some() {
            log::debug!(
                "Target {} already exists for node {}",
                self.graph[target].oid,
                self.graph[source].oid
            );
            return false;
        }
        self.graph.add_edge(source, target, ());
        true
    }

    /// First vertex inserted with this OID (root included)
    pub fn find(&self, oid: &str) -> Option<NodeIndex> {
        self.oid_index.get(oid).and_then(|v| v.first()).copied()
    }

    pub fn find_in_phase(&self, phase: Phase, oid: &str) -> Option<NodeIndex> {
        self.phase_index
            .get(&(Some(phase), oid.to_string()))
            .copied()
    }

    /// Every vertex carrying this OID, across phases
    pub fn find_all(&self, oid: &str) -> &[NodeIndex] {
        self.oid_index.get(oid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Vertex with this OID whose qualified name matches
    pub fn find_by_qualified_name(&self, oid: &str, qualified_name: &str) -> Option<NodeIndex> {
        self.find_all(oid)
            .iter()
            .copied()
            .find(|&idx| self.graph[idx].qualified_name == qualified_name)
    }

    /// Lookup where a miss is an error rather than an expected outcome
    pub fn get_vertex(&self, oid: &str) -> Result<&Vertex> {
        self.find(oid)
            .map(|idx| &self.graph[idx])
            .ok_or_else(|| GraphError::VertexNotFound(oid.to_string()))
    }

    pub fn vertex_exists(&self, oid: &str) -> bool {
        self.oid_index.contains_key(oid)
    }

    pub fn vertex(&self, idx: NodeIndex) -> Option<&Vertex> {
        self.graph.node_weight(idx)
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// All vertices in insertion order, root first
    pub fn vertices(&self) -> impl Iterator<Item = (NodeIndex, &Vertex)> {
        self.graph
            .node_indices()
            .map(move |idx| (idx, &self.graph[idx]))
    }

    /// Vertices feeding `idx`, in edge insertion order
    pub fn sources(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.neighbors(idx, Direction::Incoming)
    }

    /// Vertices fed by `idx`, in edge insertion order
    pub fn targets(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.neighbors(idx, Direction::Outgoing)
    }

    fn neighbors(&self, idx: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| {
                let other = match direction {
                    Direction::Incoming => e.source(),
                    Direction::Outgoing => e.target(),
                };
                (e.id(), other)
            })
            .collect();
        edges.sort_by_key(|(id, _)| *id);
        edges.into_iter().map(|(_, other)| other).collect()
    }

    /// Attach root to the entry nodes of the first populated phase
    ///
    /// Priority is EHR, then data collection, then tabulation. A data
    /// collection start wires every form; a tabulation start wires every
    /// tabulation item group. Returns the number of vertices wired.
    pub fn connect_root_node(&mut self) -> usize {
        let start = self.first_phase();
        let entry: Vec<NodeIndex> = match start {
            Phase::DataCollection => self.entry_nodes(Phase::DataCollection, ElementKind::FormGroup),
            Phase::Tabulation => self.entry_nodes(Phase::Tabulation, ElementKind::ItemGroup),
            Phase::Ehr => {
                log::info!("EHR set to system start phase; no EHR entry nodes are wired");
                Vec::new()
            }
            Phase::Analysis | Phase::AnalysisResults => {
                log::warn!("{start} incorrectly set to system start phase");
                Vec::new()
            }
        };

        let root = self.root;
        for &idx in &entry {
            self.connect(root, idx);
        }
        log::info!("Root connected to {} {} entry nodes", entry.len(), start);
        entry.len()
    }

    fn first_phase(&self) -> Phase {
        [Phase::Ehr, Phase::DataCollection, Phase::Tabulation]
            .into_iter()
            .find(|&p| self.phase_count(p) > 0)
            .unwrap_or_else(|| {
                log::warn!("Expected starting phase not found, defaulting to {}", Phase::DataCollection);
                Phase::DataCollection
            })
    }

    fn entry_nodes(&self, phase: Phase, kind: ElementKind) -> Vec<NodeIndex> {
        self.vertices()
            .filter(|(_, v)| v.phase == Some(phase) && v.kind == kind)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Make the first vertex carrying `oid` a direct target of root (adds an
    /// edge, never a vertex)
    pub fn connect_node_to_root(&mut self, oid: &str) -> Result<NodeIndex> {
        let idx = self
            .find(oid)
            .ok_or_else(|| GraphError::VertexNotFound(oid.to_string()))?;
        self.connect_index_to_root(idx)?;
        Ok(idx)
    }

    /// Make the vertex at `idx` a direct target of root
    ///
    /// Returns `false` when the edge already existed or `idx` is root.
    pub fn connect_index_to_root(&mut self, idx: NodeIndex) -> Result<bool> {
        if self.graph.node_weight(idx).is_none() {
            return Err(GraphError::VertexNotFound(format!("#{}", idx.index())));
        }
        if idx == self.root {
            return Ok(false);
        }
        let root = self.root;
        Ok(self.connect(root, idx))
    }

    /// Record that `oid` was first defined in `first` and is defined again in
    /// `current`; warns once per distinct phase pair
    pub fn note_non_unique(&mut self, kind: ElementKind, oid: &str, first: Phase, current: Phase) {
        if self.non_unique.insert((oid.to_string(), first, current)) {
            log::warn!(
                "{kind} with OID {oid} does not appear to be unique. Nodes with this OID are found in {first} and {current}"
            );
        }
    }

    /// Non-unique OIDs reported so far
    pub fn non_unique_oids(&self) -> Vec<(String, Phase, Phase)> {
        let mut out: Vec<_> = self.non_unique.iter().cloned().collect();
        out.sort();
        out
    }

    pub fn phase_count(&self, phase: Phase) -> usize {
        self.phase_count.get(&phase).copied().unwrap_or(0)
    }

    /// Vertex count including root
    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Underlying petgraph arena, read-only
    pub fn inner(&self) -> &DiGraph<Vertex, ()> {
        &self.graph
    }
}

impl Default for Digraph {
    fn default() -> Self {
        Self::new()
    }
}
