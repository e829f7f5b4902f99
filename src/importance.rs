//! Importance measures.
//!
//! Birnbaum importance of node `i` under risk function `R`:
//!
//! ```text
//! I(i) = R(p | p_i = 1) - R(p | p_i = 0)
//! ```
//!
//! The structural variant evaluates it at `p = 0.5` everywhere (indicator 0).
//! Computations work on a copy of `p`; the caller's vector is never changed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::probability::{provide_unknown_data, ProbabilityVector};
use crate::risk::RiskModel;
use crate::types::{DataValidationError, NodeId, RiskData, SystemGraph};

/// Importance per node.
pub type Importances = BTreeMap<NodeId, f64>;

/// Birnbaum importance of every node except the indicator.
pub fn birnbaum_importance<R: RiskModel>(
    graph: &SystemGraph,
    model: &R,
    p: &ProbabilityVector,
) -> Result<Importances, R::Error> {
    let mut work = p.clone();
    let mut importances = Importances::new();

    for id in graph.node_ids().filter(|id| *id != graph.indicator()) {
        let saved = work.get(id.as_str());

        work.set(id.clone(), 1.0);
        let top = model.risk(&work)?;
        work.set(id.clone(), 0.0);
        let bottom = model.risk(&work)?;

        match saved {
            Some(value) => work.set(id.clone(), value),
            None => work.remove(id.as_str()),
        };
        importances.insert(id.clone(), top - bottom);
    }

    Ok(importances)
}

/// Birnbaum importance at maximum entropy: every node 0.5, indicator 0.
pub fn birnbaum_structural_importance<R: RiskModel>(graph: &SystemGraph, model: &R) -> Result<Importances, R::Error> {
    birnbaum_importance(graph, model, &provide_unknown_data(graph))
}

/// Joint Birnbaum importance of a group: all members forced to 1, then all
/// forced to 0.
pub fn birnbaum_importance_select<R: RiskModel>(
    model: &R,
    p: &ProbabilityVector,
    select: &[NodeId],
) -> Result<f64, R::Error> {
    let mut work = p.clone();

    for id in select {
        work.set(id.clone(), 1.0);
    }
    let top = model.risk(&work)?;

    for id in select {
        work.set(id.clone(), 0.0);
    }
    let bottom = model.risk(&work)?;

    Ok(top - bottom)
}

/// Group of nodes for joint importance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// Explicit node ids.
    Nodes(Vec<NodeId>),
    /// Suppliers whose attribute `key` equals `value` in the risk data.
    SupplierAttribute {
        /// Attribute name.
        key: String,
        /// Required value.
        value: bool,
    },
}

impl Selection {
    /// Resolve to node ids of `graph`, in id order.
    pub fn resolve(&self, graph: &SystemGraph, data: Option<&RiskData>) -> Vec<NodeId> {
        match self {
            Self::Nodes(ids) => {
                let mut ids: Vec<NodeId> = ids.iter().filter(|id| graph.contains(id.as_str())).cloned().collect();
                ids.sort();
                ids.dedup();
                ids
            }
            Self::SupplierAttribute { key, value } => {
                let Some(data) = data else {
                    return Vec::new();
                };
                graph
                    .suppliers()
                    .filter(|s| {
                        data.nodes
                            .get(s.as_str())
                            .and_then(|n| n.attributes.get(key))
                            == Some(value)
                    })
                    .cloned()
                    .collect()
            }
        }
    }

    /// Stable label, used as the result key and cache resource name.
    pub fn label(&self) -> String {
        match self {
            Self::Nodes(ids) => {
                let names: Vec<&str> = ids.iter().map(NodeId::as_str).collect();
                format!("select_nodes_{}", names.join("_"))
            }
            Self::SupplierAttribute { key, value } => format!("select_{}_{}", key, value),
        }
    }
}

/// Share of each `(attribute, value)` pair among all attribute entries of
/// the graph's nodes.
///
/// With `error_on_missing_data`, every non-indicator node must have an entry
/// in `data`.
pub fn fractional_importance_of_attributes(
    graph: &SystemGraph,
    data: &RiskData,
    error_on_missing_data: bool,
) -> Result<BTreeMap<(String, bool), f64>, DataValidationError> {
    data.validate_against(graph)?;

    let mut counts: BTreeMap<(String, bool), usize> = BTreeMap::new();
    for id in graph.node_ids() {
        match data.nodes.get(id.as_str()) {
            Some(node) => {
                for (key, value) in &node.attributes {
                    *counts.entry((key.clone(), *value)).or_default() += 1;
                }
            }
            None if error_on_missing_data && id != graph.indicator() => {
                return Err(DataValidationError::MissingNode(id.to_string()));
            }
            None => {}
        }
    }

    let total: usize = counts.values().sum();
    Ok(counts
        .into_iter()
        .map(|(pair, count)| (pair, count as f64 / total as f64))
        .collect())
}

/// Post-processing applied to importance maps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scaling {
    /// Values as computed.
    #[default]
    None,
    /// Divide by the total. Unchanged when the total is 0.
    Proportional,
    /// Map onto `[0, 1]` by min and max. Unchanged when all values are equal.
    MinMax,
}

impl Scaling {
    /// Parse scaling name (`none`, `proportional`, `min_max`).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(Self::None),
            "proportional" => Some(Self::Proportional),
            "min_max" | "minmax" => Some(Self::MinMax),
            _ => None,
        }
    }

    /// Apply to a map of values.
    pub fn apply<K: Ord>(self, values: BTreeMap<K, f64>) -> BTreeMap<K, f64> {
        match self {
            Self::None => values,
            Self::Proportional => {
                let total: f64 = values.values().sum();
                if total == 0.0 {
                    values
                } else {
                    values.into_iter().map(|(k, v)| (k, v / total)).collect()
                }
            }
            Self::MinMax => {
                let min = values.values().copied().fold(f64::INFINITY, f64::min);
                let max = values.values().copied().fold(f64::NEG_INFINITY, f64::max);
                let range = max - min;
                if values.is_empty() || range == 0.0 {
                    values
                } else {
                    values.into_iter().map(|(k, v)| (k, (v - min) / range)).collect()
                }
            }
        }
    }
}
