//! Graph compilation.
//!
//! Turns a [`SystemGraph`] into the two structures the risk engines consume:
//!
//! - [`LogicGraph`]: an index-based gate graph for cutset enumeration. Every
//!   component `c` becomes an `or` gate over a synthetic `@deps_c` gate
//!   (holding `c`'s own logic) plus its chosen supplier. Suppliers are `and`
//!   gates.
//! - [`DependencyMap`]: per node, the active component and supplier
//!   dependencies, used to build per-node boolean expressions for the BDD.
//!
//! ## Attachment rules
//!
//! For an active edge `src -> dst`:
//!
//! | dst        | src       | attaches to  |
//! |------------|-----------|--------------|
//! | indicator  | any       | indicator    |
//! | supplier   | any       | `dst`        |
//! | component  | supplier  | `dst`        |
//! | component  | component | `@deps_dst`  |
//!
//! With `ignore_suppliers`, every edge touching a supplier is dropped and
//! suppliers are left out of the compiled graph.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{Logic, NodeId, SystemGraph, FICTIVE_PREFIX};

/// Name prefix of the synthetic gate holding a component's dependency logic.
pub const DEPS_PREFIX: &str = "@deps_";

/// A vertex of the compiled gate graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Vertex {
    /// A node of the system graph; both a basic event and a gate.
    Node(NodeId),
    /// The synthetic `@deps_` gate of a component. Never fails on its own.
    Deps(NodeId),
}

impl Vertex {
    /// Whether this is a synthetic gate.
    pub fn is_fictive(&self) -> bool {
        matches!(self, Self::Deps(_))
    }

    /// The system node, for non-fictive vertices.
    pub fn node_id(&self) -> Option<&NodeId> {
        match self {
            Self::Node(id) => Some(id),
            Self::Deps(_) => None,
        }
    }

    /// Display name; synthetic gates carry the reserved prefix.
    pub fn name(&self) -> String {
        match self {
            Self::Node(id) => id.to_string(),
            Self::Deps(id) => format!("{}{}", DEPS_PREFIX, id),
        }
    }
}

impl std::fmt::Display for Vertex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Whether a vertex name denotes a synthetic gate.
pub fn is_fictive_name(name: &str) -> bool {
    name.starts_with(FICTIVE_PREFIX)
}

/// Compiled gate graph.
///
/// Vertices live in an arena and are referenced by index. Children are kept
/// in index order so traversal is deterministic.
#[derive(Debug, Clone)]
pub struct LogicGraph {
    vertices: Vec<Vertex>,
    index: BTreeMap<String, usize>,
    children: Vec<BTreeSet<usize>>,
    gates: Vec<Logic>,
    root: usize,
}

impl LogicGraph {
    fn with_root(indicator: &NodeId, logic: Logic) -> Self {
        let mut graph = Self {
            vertices: Vec::new(),
            index: BTreeMap::new(),
            children: Vec::new(),
            gates: Vec::new(),
            root: 0,
        };
        graph.root = graph.add_vertex(Vertex::Node(indicator.clone()), logic);
        graph
    }

    fn add_vertex(&mut self, vertex: Vertex, gate: Logic) -> usize {
        let idx = self.vertices.len();
        self.index.insert(vertex.name(), idx);
        self.vertices.push(vertex);
        self.children.push(BTreeSet::new());
        self.gates.push(gate);
        idx
    }

    fn attach(&mut self, parent: usize, child: usize) {
        self.children[parent].insert(child);
    }

    /// Index of the indicator.
    pub fn root(&self) -> usize {
        self.root
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Whether the graph has no vertices. Never true for a compiled graph.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Vertex at `idx`.
    pub fn vertex(&self, idx: usize) -> &Vertex {
        &self.vertices[idx]
    }

    /// Index of a vertex by name (`@deps_` names included).
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Children of `idx`, in index order.
    pub fn children(&self, idx: usize) -> &BTreeSet<usize> {
        &self.children[idx]
    }

    /// Gate of `idx`.
    pub fn gate(&self, idx: usize) -> Logic {
        self.gates[idx]
    }

    /// Whether `idx` is a synthetic gate.
    pub fn is_fictive(&self, idx: usize) -> bool {
        self.vertices[idx].is_fictive()
    }

    /// Adjacency by name, for inspection and debugging.
    pub fn adjacency(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(idx, _)| !self.children[*idx].is_empty())
            .map(|(idx, vertex)| {
                let children = self.children[idx].iter().map(|c| self.vertices[*c].name()).collect();
                (vertex.name(), children)
            })
            .collect()
    }

    /// Vertices reachable from the root, root included.
    pub fn reachable(&self) -> BTreeSet<usize> {
        let mut seen = BTreeSet::from([self.root]);
        let mut stack = vec![self.root];
        while let Some(v) = stack.pop() {
            for &c in &self.children[v] {
                if seen.insert(c) {
                    stack.push(c);
                }
            }
        }
        seen
    }

    /// A vertex on a cycle reachable from the root, if any.
    pub fn find_cycle(&self) -> Option<usize> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Open,
            Done,
        }

        let mut marks = vec![Mark::New; self.len()];
        // (vertex, children already pushed)
        let mut stack = vec![(self.root, false)];
        while let Some((v, expanded)) = stack.pop() {
            if expanded {
                marks[v] = Mark::Done;
                continue;
            }
            if marks[v] == Mark::Done {
                continue;
            }
            marks[v] = Mark::Open;
            stack.push((v, true));
            for &c in &self.children[v] {
                match marks[c] {
                    Mark::Open => return Some(c),
                    Mark::New => stack.push((c, false)),
                    Mark::Done => {}
                }
            }
        }
        None
    }

    /// Whether the structure reachable from the root is acyclic.
    pub fn is_acyclic(&self) -> bool {
        self.find_cycle().is_none()
    }

    /// Whether the structure reachable from the root is a tree: every
    /// reachable vertex except the root has exactly one reachable parent.
    pub fn is_tree(&self) -> bool {
        let reachable = self.reachable();
        let mut parents = vec![0usize; self.len()];
        for &v in &reachable {
            for &c in &self.children[v] {
                parents[c] += 1;
            }
        }
        reachable
            .iter()
            .all(|&v| if v == self.root { parents[v] == 0 } else { parents[v] == 1 })
    }

    /// Evaluate the boolean function of the compiled structure.
    ///
    /// A vertex fails when it fails on its own (`failed` returns true for a
    /// non-fictive, non-root vertex) or when its gate over its children
    /// fails. A vertex revisited while still being evaluated counts as not
    /// failed, so cyclic inputs terminate.
    pub fn evaluate<F>(&self, failed: F) -> bool
    where
        F: Fn(&NodeId) -> bool,
    {
        let mut memo: Vec<Option<bool>> = vec![None; self.len()];
        self.evaluate_vertex(self.root, &failed, &mut memo)
    }

    fn evaluate_vertex<F>(&self, v: usize, failed: &F, memo: &mut Vec<Option<bool>>) -> bool
    where
        F: Fn(&NodeId) -> bool,
    {
        if let Some(state) = memo[v] {
            return state;
        }
        memo[v] = Some(false);

        let own = v != self.root && self.vertices[v].node_id().is_some_and(failed);
        let state = own || {
            let children: Vec<usize> = self.children[v].iter().copied().collect();
            let states: Vec<bool> = children
                .into_iter()
                .map(|c| self.evaluate_vertex(c, failed, memo))
                .collect();
            self.gates[v].apply(states)
        };

        memo[v] = Some(state);
        state
    }
}

/// Compile a system graph into a gate graph.
pub fn compile(graph: &SystemGraph, ignore_suppliers: bool) -> LogicGraph {
    let indicator = graph.indicator();
    let indicator_logic = graph
        .node(indicator.as_str())
        .map(|n| n.component_logic())
        .unwrap_or(Logic::And);

    let mut lg = LogicGraph::with_root(indicator, indicator_logic);

    for node in graph.nodes() {
        if node.is_component() {
            let c = lg.add_vertex(Vertex::Node(node.id.clone()), Logic::Or);
            let deps = lg.add_vertex(Vertex::Deps(node.id.clone()), node.component_logic());
            lg.attach(c, deps);
        } else if node.is_supplier() && !ignore_suppliers {
            lg.add_vertex(Vertex::Node(node.id.clone()), Logic::And);
        }
    }

    for edge in graph.active_edges() {
        let src_is_supplier = graph.is_supplier(edge.src.as_str());
        let dst_is_supplier = graph.is_supplier(edge.dst.as_str());

        if ignore_suppliers && (src_is_supplier || dst_is_supplier) {
            continue;
        }

        let parent = if &edge.dst == indicator || dst_is_supplier || src_is_supplier {
            lg.index_of(edge.dst.as_str())
        } else {
            lg.index_of(&format!("{}{}", DEPS_PREFIX, edge.dst))
        };

        if let (Some(parent), Some(child)) = (parent, lg.index_of(edge.src.as_str())) {
            lg.attach(parent, child);
        }
    }

    tracing::debug!(
        graph_id = %graph.graph_id(),
        vertices = lg.len(),
        ignore_suppliers,
        "graph compiled"
    );

    lg
}

/// Active dependencies of one node, split by the kind of the dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    /// Non-supplier sources, in id order.
    pub components: Vec<NodeId>,
    /// Supplier sources, in id order.
    pub suppliers: Vec<NodeId>,
}

impl Dependencies {
    /// All dependencies, components first.
    pub fn all(&self) -> impl Iterator<Item = &NodeId> {
        self.components.iter().chain(self.suppliers.iter())
    }

    /// Whether the node has no active dependency.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.suppliers.is_empty()
    }
}

/// Per-node active dependencies. Every node of the graph has an entry.
pub type DependencyMap = BTreeMap<NodeId, Dependencies>;

/// Build the dependency map from the active edges.
pub fn dependency_map(graph: &SystemGraph) -> DependencyMap {
    let mut map: DependencyMap = graph.node_ids().map(|id| (id.clone(), Dependencies::default())).collect();
    for edge in graph.active_edges() {
        if let Some(deps) = map.get_mut(&edge.dst) {
            if graph.is_supplier(edge.src.as_str()) {
                deps.suppliers.push(edge.src.clone());
            } else {
                deps.components.push(edge.src.clone());
            }
        }
    }
    map
}
