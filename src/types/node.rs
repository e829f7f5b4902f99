//! Node types for system graphs.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::graph::ModelValidationError;

/// Prefix reserved for synthetic gates inserted by the compiler.
///
/// User supplied ids may never start with it, so any compiled node carrying
/// the prefix is known to be fictive.
pub const FICTIVE_PREFIX: &str = "@";

/// Identifier of a node in a [`SystemGraph`](super::SystemGraph).
///
/// Non-empty, starts with an alphabetic character and never with
/// [`FICTIVE_PREFIX`]. Ordered lexicographically for deterministic output.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Create a validated node id.
    pub fn new(id: impl Into<String>) -> Result<Self, ModelValidationError> {
        let id = id.into();
        let reason = match id.chars().next() {
            None => Some("id must not be empty"),
            Some(_) if id.starts_with(FICTIVE_PREFIX) => Some("id uses the reserved synthetic prefix"),
            Some(first) if !first.is_alphabetic() => Some("id must start with an alphabetic character"),
            Some(_) => None,
        };

        match reason {
            Some(reason) => Err(ModelValidationError::InvalidId { id, reason }),
            None => Ok(Self(id)),
        }
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NodeId {
    type Error = ModelValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for NodeId {
    type Error = ModelValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

/// Tag attached to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    /// A part of the system that can fail on its own.
    Component,
    /// An organisation providing components or other suppliers.
    Supplier,
    /// The single root aggregating overall system failure.
    Indicator,
    /// Not yet chosen; carried for bookkeeping only.
    Potential,
}

impl Tag {
    /// Parse tag from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "component" => Some(Self::Component),
            "supplier" => Some(Self::Supplier),
            "indicator" => Some(Self::Indicator),
            "potential" => Some(Self::Potential),
            _ => None,
        }
    }

    fn kind(self) -> Option<NodeKind> {
        match self {
            Self::Component => Some(NodeKind::Component),
            Self::Supplier => Some(NodeKind::Supplier),
            Self::Indicator => Some(NodeKind::Indicator),
            Self::Potential => None,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Component => write!(f, "component"),
            Self::Supplier => write!(f, "supplier"),
            Self::Indicator => write!(f, "indicator"),
            Self::Potential => write!(f, "potential"),
        }
    }
}

/// The role a node plays in the reliability logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Tagged `component`.
    Component,
    /// Tagged `supplier`.
    Supplier,
    /// Tagged `indicator`.
    Indicator,
}

/// Boolean gate combining the failures of dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Logic {
    /// Fails only when every dependency fails (redundancy).
    And,
    /// Fails when any dependency fails (single point of failure).
    Or,
}

impl Logic {
    /// Parse logic token from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            _ => None,
        }
    }

    /// Combine dependency states with this gate.
    ///
    /// An empty input never fails under either gate.
    pub fn apply<I: IntoIterator<Item = bool>>(self, states: I) -> bool {
        let mut states = states.into_iter().peekable();
        if states.peek().is_none() {
            return false;
        }
        match self {
            Self::And => states.all(|s| s),
            Self::Or => states.any(|s| s),
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
        }
    }
}

/// Which class of dependencies a logic entry applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicSlot {
    /// Dependencies on components.
    Component,
    /// Dependencies on suppliers.
    Supplier,
}

impl LogicSlot {
    /// Parse slot name from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "component" => Some(Self::Component),
            "supplier" => Some(Self::Supplier),
            _ => None,
        }
    }
}

impl fmt::Display for LogicSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Component => write!(f, "component"),
            Self::Supplier => write!(f, "supplier"),
        }
    }
}

/// A node of the system graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Unique identifier.
    pub id: NodeId,
    /// Tags; exactly one of component, supplier, indicator.
    pub tags: BTreeSet<Tag>,
    /// Gate per dependency slot.
    pub logic: BTreeMap<LogicSlot, Logic>,
}

impl Node {
    /// Create a node from parts.
    pub fn new(id: NodeId, tags: BTreeSet<Tag>, logic: BTreeMap<LogicSlot, Logic>) -> Self {
        Self { id, tags, logic }
    }

    /// Create a component whose component dependencies combine with `logic`.
    pub fn component(id: &str, logic: Logic) -> Result<Self, ModelValidationError> {
        Ok(Self::new(
            NodeId::new(id)?,
            BTreeSet::from([Tag::Component]),
            BTreeMap::from([(LogicSlot::Component, logic)]),
        ))
    }

    /// Create a supplier.
    pub fn supplier(id: &str) -> Result<Self, ModelValidationError> {
        Ok(Self::new(NodeId::new(id)?, BTreeSet::from([Tag::Supplier]), BTreeMap::new()))
    }

    /// Create the indicator.
    pub fn indicator(id: &str, logic: Logic) -> Result<Self, ModelValidationError> {
        Ok(Self::new(
            NodeId::new(id)?,
            BTreeSet::from([Tag::Indicator]),
            BTreeMap::from([(LogicSlot::Component, logic)]),
        ))
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.insert(tag);
        self
    }

    /// Add or replace a logic slot.
    pub fn with_logic(mut self, slot: LogicSlot, logic: Logic) -> Self {
        self.logic.insert(slot, logic);
        self
    }

    /// The node kind, if exactly one kind tag is present.
    pub fn kind(&self) -> Option<NodeKind> {
        let mut kinds = self.tags.iter().filter_map(|t| t.kind());
        match (kinds.next(), kinds.next()) {
            (Some(kind), None) => Some(kind),
            _ => None,
        }
    }

    /// Tagged component.
    pub fn is_component(&self) -> bool {
        self.tags.contains(&Tag::Component)
    }

    /// Tagged supplier.
    pub fn is_supplier(&self) -> bool {
        self.tags.contains(&Tag::Supplier)
    }

    /// Tagged indicator.
    pub fn is_indicator(&self) -> bool {
        self.tags.contains(&Tag::Indicator)
    }

    /// Gate over component dependencies (`and` when unspecified).
    pub fn component_logic(&self) -> Logic {
        self.logic.get(&LogicSlot::Component).copied().unwrap_or(Logic::And)
    }

    /// Gate over supplier dependencies (`and` when unspecified).
    pub fn supplier_logic(&self) -> Logic {
        self.logic.get(&LogicSlot::Supplier).copied().unwrap_or(Logic::And)
    }
}
