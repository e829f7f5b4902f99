//! Probability providers.
//!
//! Map risk data (or its absence) onto the per-node failure probabilities
//! consumed by the risk engines. The indicator is a pure aggregator and is
//! always 0 in every provider output.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::canonical::{canonical_hash_hex, quantize};
use crate::types::{DataValidationError, NodeId, RiskData, SystemGraph};

/// Probability used for every node when nothing is known.
pub const UNKNOWN_PROBABILITY: f64 = 0.5;

/// Failure probability per node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProbabilityVector(BTreeMap<NodeId, f64>);

impl ProbabilityVector {
    /// Empty vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Probability of a node.
    pub fn get(&self, id: &str) -> Option<f64> {
        self.0.get(id).copied()
    }

    /// Set the probability of a node, returning the previous value.
    pub fn set(&mut self, id: NodeId, value: f64) -> Option<f64> {
        self.0.insert(id, value)
    }

    /// Remove a node's entry.
    pub fn remove(&mut self, id: &str) -> Option<f64> {
        self.0.remove(id)
    }

    /// Entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, f64)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the vector is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stable fingerprint of the values, quantised so float noise below
    /// 1e-9 does not change it.
    pub fn fingerprint(&self) -> String {
        let quantised: BTreeMap<&str, i64> = self.0.iter().map(|(k, v)| (k.as_str(), quantize(*v))).collect();
        canonical_hash_hex(&quantised)
    }
}

impl FromIterator<(NodeId, f64)> for ProbabilityVector {
    fn from_iter<I: IntoIterator<Item = (NodeId, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Every node 0.5, indicator 0.
pub fn provide_unknown_data(graph: &SystemGraph) -> ProbabilityVector {
    let mut p: ProbabilityVector = graph.node_ids().map(|id| (id.clone(), UNKNOWN_PROBABILITY)).collect();
    p.set(graph.indicator().clone(), 0.0);
    p
}

/// Probabilities taken from a risk record.
///
/// Node risks come from `data.nodes[id].risk` and default to 0. An edge
/// entry from a component's currently selected supplier then overrides that
/// component's risk. With `error_on_missing_node`, every graph node must
/// have a risk entry.
pub fn provide_direct_from_data(
    graph: &SystemGraph,
    data: &RiskData,
    error_on_missing_node: bool,
) -> Result<ProbabilityVector, DataValidationError> {
    data.validate_against(graph)?;

    let mut p = ProbabilityVector::new();
    for id in graph.node_ids() {
        let risk = data.nodes.get(id.as_str()).and_then(|n| n.risk);
        if risk.is_none() && error_on_missing_node && id != graph.indicator() {
            return Err(DataValidationError::MissingNode(id.to_string()));
        }
        p.set(id.clone(), risk.unwrap_or(0.0));
    }

    for edge in &data.edges {
        let Some(risk) = edge.risk else { continue };
        if !graph.is_component(&edge.dst) {
            continue;
        }
        if graph.selected_supplier(&edge.dst).is_some_and(|s| s.as_str() == edge.src) {
            if let Some(dst) = graph.node(&edge.dst) {
                p.set(dst.id.clone(), risk);
            }
        }
    }

    p.set(graph.indicator().clone(), 0.0);
    Ok(p)
}
