//! Edge types for system graphs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::node::NodeId;

/// Tag attached to an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeTag {
    /// A supplier link that has not been chosen. Inert for evaluation.
    Potential,
}

impl EdgeTag {
    /// Parse edge tag from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "potential" => Some(Self::Potential),
            _ => None,
        }
    }
}

impl std::fmt::Display for EdgeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Potential => write!(f, "potential"),
        }
    }
}

/// Dependency edge: `dst` fails (subject to its logic) when `src` fails.
///
/// Implements `Ord` for deterministic ordering: (src, dst, tags).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// The dependency.
    pub src: NodeId,
    /// The dependent node.
    pub dst: NodeId,
    /// Edge tags.
    #[serde(default)]
    pub tags: BTreeSet<EdgeTag>,
}

impl Edge {
    /// Create an active edge.
    pub fn new(src: NodeId, dst: NodeId) -> Self {
        Self {
            src,
            dst,
            tags: BTreeSet::new(),
        }
    }

    /// Create a potential (not yet chosen) edge.
    pub fn potential(src: NodeId, dst: NodeId) -> Self {
        Self::new(src, dst).with_tag(EdgeTag::Potential)
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: EdgeTag) -> Self {
        self.tags.insert(tag);
        self
    }

    /// Whether the edge is a not-yet-chosen supplier link.
    pub fn is_potential(&self) -> bool {
        self.tags.contains(&EdgeTag::Potential)
    }

    /// Whether the edge takes part in evaluation.
    pub fn is_active(&self) -> bool {
        !self.is_potential()
    }

    /// Whether the edge joins `src` to `dst`, ignoring tags.
    pub fn connects(&self, src: &str, dst: &str) -> bool {
        self.src.as_str() == src && self.dst.as_str() == dst
    }
}

// Canonical ordering: src, then dst, then tags
impl PartialOrd for Edge {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Edge {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match self.src.cmp(&other.src) {
            std::cmp::Ordering::Equal => match self.dst.cmp(&other.dst) {
                std::cmp::Ordering::Equal => self.tags.cmp(&other.tags),
                ord => ord,
            },
            ord => ord,
        }
    }
}
