use petgraph::{graph::NodeIndex, visit::EdgeRef, Directed, Direction, Graph};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    PackageImport,
    TypeImport,
    Extends,
    Implements,
    Field,
    Variable,
    Parameter,
    ReturnType,
    Creation,
    TypeParameterBound,
}

impl EdgeKind {
    pub fn label(self) -> &'static str {
        match self {
            EdgeKind::PackageImport => "package import",
            EdgeKind::TypeImport => "type import",
            EdgeKind::Extends => "extends",
            EdgeKind::Implements => "implements",
            EdgeKind::Field => "field",
            EdgeKind::Variable => "variable",
            EdgeKind::Parameter => "parameter",
            EdgeKind::ReturnType => "return type",
            EdgeKind::Creation => "creation",
            EdgeKind::TypeParameterBound => "type parameter bound",
        }
    }

    pub fn code(self) -> u8 {
        match self {
            EdgeKind::PackageImport => 0,
            EdgeKind::TypeImport => 1,
            EdgeKind::Extends => 2,
            EdgeKind::Implements => 3,
            EdgeKind::Field => 4,
            EdgeKind::Variable => 5,
            EdgeKind::Parameter => 6,
            EdgeKind::ReturnType => 7,
            EdgeKind::Creation => 8,
            EdgeKind::TypeParameterBound => 9,
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A directed, kind-tagged dependency from a declared class to a type name.
///
/// `target` is recorded as written in the source; nothing is resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DependencyEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    /// Extra annotation, e.g. the package a type import comes from.
    pub context: Option<String>,
}

/// Identity used for deduplication.
pub type EdgeKey = (String, String, EdgeKind);

impl DependencyEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            context: None,
        }
    }

    pub fn with_context(mut self, context: String) -> Self {
        self.context = Some(context);
        self
    }

    pub fn key(&self) -> EdgeKey {
        (self.source.clone(), self.target.clone(), self.kind)
    }
}

type ChunkIter<'a> = std::slice::Iter<'a, DependencyEdge>;

/// Append-only edge list whose clones share every chunk pushed so far.
///
/// Cloning copies one handle per chunk, never the edges themselves.
#[derive(Debug, Clone, Default)]
pub struct EdgeSet {
    chunks: Vec<Arc<[DependencyEdge]>>,
    len: usize,
}

impl EdgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_chunk(&mut self, chunk: Vec<DependencyEdge>) {
        if chunk.is_empty() {
            return;
        }
        self.len += chunk.len();
        self.chunks.push(chunk.into());
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn iter(&self) -> <&'_ EdgeSet as IntoIterator>::IntoIter {
        self.into_iter()
    }

    pub fn to_vec(&self) -> Vec<DependencyEdge> {
        self.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a EdgeSet {
    type Item = &'a DependencyEdge;
    type IntoIter = std::iter::FlatMap<
        std::slice::Iter<'a, Arc<[DependencyEdge]>>,
        ChunkIter<'a>,
        fn(&'a Arc<[DependencyEdge]>) -> ChunkIter<'a>,
    >;

    fn into_iter(self) -> Self::IntoIter {
        fn chunk_iter(chunk: &Arc<[DependencyEdge]>) -> ChunkIter<'_> {
            chunk.iter()
        }
        self.chunks
            .iter()
            .flat_map(chunk_iter as fn(&'a Arc<[DependencyEdge]>) -> ChunkIter<'a>)
    }
}

/// A type declared at the top level of a compilation unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassRecord {
    pub name: String,
    pub simple_name: String,
    pub package: Option<String>,
    pub file_path: PathBuf,
    pub line_number: usize,
}

impl ClassRecord {
    pub fn new(
        package: Option<&str>,
        simple_name: &str,
        file_path: PathBuf,
        line_number: usize,
    ) -> Self {
        Self {
            name: qualified_name(package, simple_name),
            simple_name: simple_name.to_string(),
            package: package.filter(|p| !p.is_empty()).map(str::to_string),
            file_path,
            line_number,
        }
    }
}

/// `package.Simple`, or `Simple` when the unit has no package.
pub fn qualified_name(package: Option<&str>, simple_name: &str) -> String {
    match package {
        Some(package) if !package.is_empty() => format!("{}.{}", package, simple_name),
        _ => simple_name.to_string(),
    }
}

/// Everything before the last dot, if there is one.
pub fn package_of(name: &str) -> Option<&str> {
    name.rfind('.').filter(|&i| i > 0).map(|i| &name[..i])
}

pub fn simple_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

pub type DependencyGraph = Graph<String, EdgeKind, Directed>;

/// Read-only petgraph projection of an edge set, used for selection queries.
#[derive(Debug, Clone, Default)]
pub struct ClassGraph {
    graph: DependencyGraph,
    node_map: HashMap<String, NodeIndex>,
}

pub struct GraphBuilder {
    graph: DependencyGraph,
    node_map: HashMap<String, NodeIndex>,
    seen: HashSet<EdgeKey>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
            node_map: HashMap::new(),
            seen: HashSet::new(),
        }
    }

    pub fn add_node(&mut self, class: &str) -> NodeIndex {
        if let Some(&index) = self.node_map.get(class) {
            return index;
        }
        let index = self.graph.add_node(class.to_string());
        self.node_map.insert(class.to_string(), index);
        index
    }

    /// Returns `None` when the same `(source, target, kind)` was already added.
    pub fn add_edge(&mut self, edge: &DependencyEdge) -> Option<petgraph::graph::EdgeIndex> {
        if !self.seen.insert(edge.key()) {
            return None;
        }
        let source_idx = self.add_node(&edge.source);
        let target_idx = self.add_node(&edge.target);
        Some(self.graph.add_edge(source_idx, target_idx, edge.kind))
    }

    pub fn build(self) -> ClassGraph {
        ClassGraph {
            graph: self.graph,
            node_map: self.node_map,
        }
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassGraph {
    pub fn from_edges<'a>(edges: impl IntoIterator<Item = &'a DependencyEdge>) -> Self {
        let mut builder = GraphBuilder::new();
        for edge in edges {
            builder.add_edge(edge);
        }
        builder.build()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, class: &str) -> bool {
        self.node_map.contains_key(class)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(String::as_str)
    }

    /// Outgoing edges grouped by kind and incoming edges grouped by source class.
    pub fn details(&self, class: &str) -> Option<ClassDetails> {
        let index = *self.node_map.get(class)?;

        let mut outgoing: BTreeMap<EdgeKind, BTreeSet<String>> = BTreeMap::new();
        for edge in self.graph.edges_directed(index, Direction::Outgoing) {
            outgoing
                .entry(*edge.weight())
                .or_default()
                .insert(self.graph[edge.target()].clone());
        }

        let mut incoming: BTreeMap<String, BTreeSet<EdgeKind>> = BTreeMap::new();
        for edge in self.graph.edges_directed(index, Direction::Incoming) {
            incoming
                .entry(self.graph[edge.source()].clone())
                .or_default()
                .insert(*edge.weight());
        }

        Some(ClassDetails {
            class: class.to_string(),
            outgoing,
            incoming,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassDetails {
    pub class: String,
    pub outgoing: BTreeMap<EdgeKind, BTreeSet<String>>,
    pub incoming: BTreeMap<String, BTreeSet<EdgeKind>>,
}

impl ClassDetails {
    pub fn outgoing_count(&self) -> usize {
        self.outgoing.values().map(BTreeSet::len).sum()
    }

    /// Lines for the "uses" list: a header per kind, then short target names.
    pub fn outgoing_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (kind, targets) in &self.outgoing {
            lines.push(format!("■ {} {}:", targets.len(), kind));
            lines.extend(targets.iter().map(|t| format!("   {}", simple_name(t))));
        }
        lines
    }

    /// Lines for the "used by" list: a header per source, then the kinds.
    pub fn incoming_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (source, kinds) in &self.incoming {
            lines.push(format!("■ {}:", simple_name(source)));
            lines.extend(kinds.iter().map(|k| format!("   {}", k)));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_name_omits_missing_package() {
        assert_eq!(qualified_name(Some("a.b"), "C"), "a.b.C");
        assert_eq!(qualified_name(None, "C"), "C");
        assert_eq!(qualified_name(Some(""), "C"), "C");
    }

    #[test]
    fn package_and_simple_name_split_on_last_dot() {
        assert_eq!(package_of("java.util.List"), Some("java.util"));
        assert_eq!(package_of("List"), None);
        assert_eq!(simple_name("java.util.List"), "List");
        assert_eq!(simple_name("List"), "List");
    }

    #[test]
    fn edge_set_clones_keep_their_length() {
        let mut edges = EdgeSet::new();
        edges.push_chunk(vec![DependencyEdge::new("A", "B", EdgeKind::Field)]);
        edges.push_chunk(Vec::new());
        let published = edges.clone();

        edges.push_chunk(vec![
            DependencyEdge::new("A", "C", EdgeKind::Field),
            DependencyEdge::new("C", "D", EdgeKind::Extends),
        ]);

        assert_eq!(published.len(), 1);
        assert_eq!(published.chunk_count(), 1);
        assert_eq!(edges.len(), 3);
        assert_eq!(edges.chunk_count(), 2);
        let targets: Vec<_> = edges.iter().map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec!["B", "C", "D"]);
    }

    #[test]
    fn details_lines_use_short_names() {
        let edges = vec![
            DependencyEdge::new("p.A", "q.B", EdgeKind::Field),
            DependencyEdge::new("p.C", "p.A", EdgeKind::Creation),
        ];
        let graph = ClassGraph::from_edges(&edges);
        let details = graph.details("p.A").unwrap();

        assert_eq!(details.outgoing_lines(), vec!["■ 1 field:", "   B"]);
        assert_eq!(details.incoming_lines(), vec!["■ C:", "   creation"]);
    }
}
