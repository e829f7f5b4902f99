//! The frozen system graph.
//!
//! ## Invariants
//!
//! Checked once, at construction:
//!
//! - node ids are unique and well formed (see [`NodeId`])
//! - every node carries exactly one of `component`, `supplier`, `indicator`
//! - exactly one node is tagged `indicator`
//! - every component has a `component` logic slot
//! - every edge endpoint exists
//!
//! A graph never changes after construction. Operations such as
//! [`SystemGraph::with_suppliers`] return a new graph.
//!
//! ## Identity
//!
//! [`GraphId`] is the SHA-256 of the canonical exchange document: nodes keyed
//! by id, tags and logic sorted, edges sorted by `(src, dst, tags)`. Two graphs
//! built from the same parts in any order share the same id.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::edge::{Edge, EdgeTag};
use super::node::{Logic, LogicSlot, Node, NodeId, NodeKind, Tag};
use crate::canonical::content_hash_hex;

/// Malformed graph at construction. Fatal to that graph instance.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelValidationError {
    /// Node id breaks the id rules.
    #[error("Invalid node id {id:?}: {reason}")]
    InvalidId {
        /// The rejected id.
        id: String,
        /// Which rule was broken.
        reason: &'static str,
    },
    /// Two nodes share an id.
    #[error("Duplicate node id: {0}")]
    DuplicateId(NodeId),
    /// Tag string not recognised.
    #[error("Unknown tag {tag:?} on {owner}")]
    InvalidTag {
        /// Node id or `src->dst` of the owner.
        owner: String,
        /// The rejected tag.
        tag: String,
    },
    /// Node does not carry exactly one kind tag.
    #[error("Node {0} must carry exactly one of component, supplier, indicator")]
    InvalidKind(NodeId),
    /// Logic slot or token not recognised.
    #[error("Invalid logic {slot:?}: {token:?} on node {node}")]
    InvalidLogic {
        /// Node id.
        node: String,
        /// Slot name.
        slot: String,
        /// Logic token.
        token: String,
    },
    /// Component without a `component` logic slot.
    #[error("Component {0} has no component logic slot")]
    MissingLogicSlot(NodeId),
    /// Zero or several indicator nodes.
    #[error("Expected exactly one indicator node, found {0}")]
    IndicatorCount(usize),
    /// Edge endpoint missing from the node map.
    #[error("Edge {src} -> {dst} references unknown node {missing}")]
    DanglingEdge {
        /// Edge source.
        src: String,
        /// Edge destination.
        dst: String,
        /// The endpoint that does not exist.
        missing: String,
    },
    /// Supplier choice that does not correspond to a supplier link of the graph.
    #[error("Supplier selection {supplier} -> {component} does not match a supplier link")]
    UnknownSelection {
        /// Chosen supplier.
        supplier: String,
        /// Component it was chosen for.
        component: String,
    },
    /// Exchange document could not be parsed.
    #[error("Malformed graph document: {0}")]
    Malformed(String),
}

/// Content identity of a graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphId(String);

impl GraphId {
    /// Create a graph id from a hash string.
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    /// Get the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GraphId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Exchange schema: `{nodes: {id: {logic, tags}}, edges: [{src, dst, tags}]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Nodes keyed by id.
    pub nodes: BTreeMap<String, NodeDocument>,
    /// Edge list.
    #[serde(default)]
    pub edges: Vec<EdgeDocument>,
}

/// Exchange form of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDocument {
    /// Slot name to `"and"` / `"or"`.
    #[serde(default)]
    pub logic: BTreeMap<String, String>,
    /// Tag names.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Exchange form of an edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDocument {
    /// Dependency.
    pub src: String,
    /// Dependent.
    pub dst: String,
    /// Tag names.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Immutable, validated dependency graph of components and suppliers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "GraphDocument", try_from = "GraphDocument")]
pub struct SystemGraph {
    nodes: BTreeMap<NodeId, Node>,
    /// Sorted and deduplicated.
    edges: Vec<Edge>,
    indicator: NodeId,
    graph_id: GraphId,
}

impl SystemGraph {
    /// Build and validate a graph.
    pub fn new<N, E>(nodes: N, edges: E) -> Result<Self, ModelValidationError>
    where
        N: IntoIterator<Item = Node>,
        E: IntoIterator<Item = Edge>,
    {
        let mut node_map: BTreeMap<NodeId, Node> = BTreeMap::new();
        for node in nodes {
            if node_map.contains_key(&node.id) {
                return Err(ModelValidationError::DuplicateId(node.id));
            }
            node_map.insert(node.id.clone(), node);
        }

        let mut indicators = Vec::new();
        for node in node_map.values() {
            match node.kind() {
                None => return Err(ModelValidationError::InvalidKind(node.id.clone())),
                Some(NodeKind::Indicator) => indicators.push(node.id.clone()),
                Some(NodeKind::Component) if !node.logic.contains_key(&LogicSlot::Component) => {
                    return Err(ModelValidationError::MissingLogicSlot(node.id.clone()));
                }
                Some(_) => {}
            }
        }
        if indicators.len() != 1 {
            return Err(ModelValidationError::IndicatorCount(indicators.len()));
        }
        let indicator = indicators.remove(0);

        let mut edges: Vec<Edge> = edges.into_iter().collect();
        for edge in &edges {
            for endpoint in [&edge.src, &edge.dst] {
                if !node_map.contains_key(endpoint) {
                    return Err(ModelValidationError::DanglingEdge {
                        src: edge.src.to_string(),
                        dst: edge.dst.to_string(),
                        missing: endpoint.to_string(),
                    });
                }
            }
        }
        edges.sort();
        edges.dedup();

        let mut graph = Self {
            nodes: node_map,
            edges,
            indicator,
            graph_id: GraphId::new(String::new()),
        };
        graph.graph_id = GraphId::new(content_hash_hex(&graph.to_document()));

        tracing::debug!(
            graph_id = %graph.graph_id,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "system graph constructed"
        );

        Ok(graph)
    }

    /// Build a graph from the exchange document, validating every token.
    pub fn from_document(doc: &GraphDocument) -> Result<Self, ModelValidationError> {
        let mut nodes = Vec::with_capacity(doc.nodes.len());
        for (raw_id, node_doc) in &doc.nodes {
            let id = NodeId::new(raw_id.as_str())?;

            let mut tags = BTreeSet::new();
            for tag in &node_doc.tags {
                let parsed = Tag::from_str(tag).ok_or_else(|| ModelValidationError::InvalidTag {
                    owner: raw_id.clone(),
                    tag: tag.clone(),
                })?;
                tags.insert(parsed);
            }

            let mut logic = BTreeMap::new();
            for (slot, token) in &node_doc.logic {
                let invalid = || ModelValidationError::InvalidLogic {
                    node: raw_id.clone(),
                    slot: slot.clone(),
                    token: token.clone(),
                };
                let slot = LogicSlot::from_str(slot).ok_or_else(invalid)?;
                let value = Logic::from_str(token).ok_or_else(invalid)?;
                logic.insert(slot, value);
            }

            nodes.push(Node::new(id, tags, logic));
        }

        let mut edges = Vec::with_capacity(doc.edges.len());
        for edge_doc in &doc.edges {
            let mut tags = BTreeSet::new();
            for tag in &edge_doc.tags {
                let parsed = EdgeTag::from_str(tag).ok_or_else(|| ModelValidationError::InvalidTag {
                    owner: format!("{}->{}", edge_doc.src, edge_doc.dst),
                    tag: tag.clone(),
                })?;
                tags.insert(parsed);
            }
            edges.push(Edge {
                src: NodeId::new(edge_doc.src.as_str())?,
                dst: NodeId::new(edge_doc.dst.as_str())?,
                tags,
            });
        }

        Self::new(nodes, edges)
    }

    /// Parse the exchange schema from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ModelValidationError> {
        let doc: GraphDocument =
            serde_json::from_str(json).map_err(|e| ModelValidationError::Malformed(e.to_string()))?;
        Self::from_document(&doc)
    }

    /// Canonical exchange document.
    pub fn to_document(&self) -> GraphDocument {
        let nodes = self
            .nodes
            .values()
            .map(|node| {
                let doc = NodeDocument {
                    logic: node
                        .logic
                        .iter()
                        .map(|(slot, logic)| (slot.to_string(), logic.to_string()))
                        .collect(),
                    tags: node.tags.iter().map(|t| t.to_string()).collect(),
                };
                (node.id.to_string(), doc)
            })
            .collect();

        let edges = self
            .edges
            .iter()
            .map(|edge| EdgeDocument {
                src: edge.src.to_string(),
                dst: edge.dst.to_string(),
                tags: edge.tags.iter().map(|t| t.to_string()).collect(),
            })
            .collect();

        GraphDocument { nodes, edges }
    }

    /// Serialize to the exchange schema as compact JSON.
    pub fn to_json_string(&self) -> String {
        String::from_utf8_lossy(&crate::canonical::to_canonical_bytes(&self.to_document())).into_owned()
    }

    /// Content identity.
    pub fn graph_id(&self) -> &GraphId {
        &self.graph_id
    }

    /// The indicator id.
    pub fn indicator(&self) -> &NodeId {
        &self.indicator
    }

    /// Look up a node.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Whether a node with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// All nodes, ordered by id.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All node ids, ordered.
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// All edges in canonical order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges that take part in evaluation (not tagged `potential`).
    pub fn active_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(|e| e.is_active())
    }

    /// Component ids, ordered.
    pub fn components(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.values().filter(|n| n.is_component()).map(|n| &n.id)
    }

    /// Supplier ids, ordered.
    pub fn suppliers(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.values().filter(|n| n.is_supplier()).map(|n| &n.id)
    }

    /// Whether `id` is a component.
    pub fn is_component(&self, id: &str) -> bool {
        self.node(id).is_some_and(Node::is_component)
    }

    /// Whether `id` is a supplier.
    pub fn is_supplier(&self, id: &str) -> bool {
        self.node(id).is_some_and(Node::is_supplier)
    }

    /// Suppliers currently linked (non-potential) to a component.
    pub fn active_suppliers_of(&self, component: &str) -> Vec<&NodeId> {
        self.active_edges()
            .filter(|e| e.dst.as_str() == component && self.is_supplier(e.src.as_str()))
            .map(|e| &e.src)
            .collect()
    }

    /// The single active supplier of a component, if exactly one exists.
    pub fn selected_supplier(&self, component: &str) -> Option<&NodeId> {
        match self.active_suppliers_of(component).as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Supplier owner groups.
    ///
    /// Each group is a weakly connected component of the supplier-only edges,
    /// keyed by its smallest in-degree-zero supplier. Components without such
    /// a root (pure cycles) form no group. Isolated suppliers are singleton
    /// groups.
    pub fn supplier_groups(&self) -> BTreeMap<NodeId, BTreeSet<NodeId>> {
        let suppliers: BTreeSet<&NodeId> = self.suppliers().collect();

        let mut neighbours: BTreeMap<&NodeId, BTreeSet<&NodeId>> = BTreeMap::new();
        let mut in_degree: BTreeMap<&NodeId, usize> = suppliers.iter().map(|s| (*s, 0)).collect();
        for edge in &self.edges {
            if suppliers.contains(&edge.src) && suppliers.contains(&edge.dst) {
                neighbours.entry(&edge.src).or_default().insert(&edge.dst);
                neighbours.entry(&edge.dst).or_default().insert(&edge.src);
                *in_degree.entry(&edge.dst).or_default() += 1;
            }
        }

        let mut groups = BTreeMap::new();
        let mut visited: BTreeSet<&NodeId> = BTreeSet::new();

        // Roots in id order; the first root reached names its component.
        for root in suppliers.iter().filter(|s| in_degree.get(*s) == Some(&0)) {
            let root: &NodeId = root;
            if visited.contains(root) {
                continue;
            }
            let mut members = BTreeSet::new();
            let mut queue = VecDeque::from([root]);
            visited.insert(root);
            while let Some(current) = queue.pop_front() {
                members.insert(current.clone());
                for &next in neighbours.get(current).into_iter().flatten() {
                    if visited.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
            groups.insert(root.clone(), members);
        }

        groups
    }

    /// New graph reflecting a supplier selection.
    ///
    /// For every `(supplier, component)` pair, the link from `supplier` to
    /// `component` becomes active and every other supplier link into
    /// `component` becomes potential. Components not named keep their links.
    pub fn with_suppliers<I>(&self, choices: I) -> Result<Self, ModelValidationError>
    where
        I: IntoIterator<Item = (NodeId, NodeId)>,
    {
        let mut chosen: BTreeMap<NodeId, NodeId> = BTreeMap::new();
        for (supplier, component) in choices {
            let linked = self.is_supplier(supplier.as_str())
                && self.is_component(component.as_str())
                && self.edges.iter().any(|e| e.connects(supplier.as_str(), component.as_str()));
            if !linked {
                return Err(ModelValidationError::UnknownSelection {
                    supplier: supplier.to_string(),
                    component: component.to_string(),
                });
            }
            chosen.insert(component, supplier);
        }

        let edges = self.edges.iter().map(|edge| {
            let supplier_link = self.is_supplier(edge.src.as_str()) && self.is_component(edge.dst.as_str());
            match chosen.get(&edge.dst) {
                Some(supplier) if supplier_link => {
                    let mut edge = edge.clone();
                    if &edge.src == supplier {
                        edge.tags.remove(&EdgeTag::Potential);
                    } else {
                        edge.tags.insert(EdgeTag::Potential);
                    }
                    edge
                }
                _ => edge.clone(),
            }
        });

        Self::new(self.nodes.values().cloned(), edges.collect::<Vec<_>>())
    }
}

impl PartialEq for SystemGraph {
    fn eq(&self, other: &Self) -> bool {
        self.graph_id == other.graph_id
    }
}

impl Eq for SystemGraph {}

impl std::hash::Hash for SystemGraph {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.graph_id.hash(state);
    }
}

impl From<SystemGraph> for GraphDocument {
    fn from(graph: SystemGraph) -> Self {
        graph.to_document()
    }
}

impl TryFrom<GraphDocument> for SystemGraph {
    type Error = ModelValidationError;

    fn try_from(doc: GraphDocument) -> Result<Self, Self::Error> {
        Self::from_document(&doc)
    }
}
