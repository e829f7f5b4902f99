//! External risk data bound to a system graph.
//!
//! The record is sparse: nodes and edges may be omitted. It is always
//! validated against one specific graph before any value is used.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::graph::SystemGraph;

/// Risk data that does not fit the target graph. Recoverable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataValidationError {
    /// Record references a node the graph does not have.
    #[error("Risk data references unknown node: {0}")]
    UnknownNode(String),
    /// Record references an edge the graph does not have.
    #[error("Risk data references unknown edge: {src} -> {dst}")]
    UnknownEdge {
        /// Edge source.
        src: String,
        /// Edge destination.
        dst: String,
    },
    /// Risk outside `[0, 1]` or not finite.
    #[error("Risk {value} for {owner} is outside [0, 1]")]
    RiskOutOfRange {
        /// Node id or `src->dst`.
        owner: String,
        /// The rejected value.
        value: f64,
    },
    /// Negative or non-finite cost.
    #[error("Cost {value} for {owner} must be finite and non-negative")]
    CostOutOfRange {
        /// `src->dst` of the edge.
        owner: String,
        /// The rejected value.
        value: f64,
    },
    /// Node of the graph has no entry while one was required.
    #[error("Data missing for node: {0}")]
    MissingNode(String),
}

/// Per-node entry of a risk record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// Probability of failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<f64>,
    /// Boolean attributes (e.g. `domestic: true`).
    #[serde(default)]
    pub attributes: BTreeMap<String, bool>,
}

/// Per-edge entry of a risk record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    /// Dependency.
    pub src: String,
    /// Dependent.
    pub dst: String,
    /// Failure probability of the link, overriding the node risk of `dst`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<f64>,
    /// Cost of the link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

/// Sparse risk record: `{"nodes": {id: {risk, attributes}}, "edges": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskData {
    /// Node entries keyed by id.
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeData>,
    /// Edge entries.
    #[serde(default)]
    pub edges: Vec<EdgeData>,
}

impl RiskData {
    /// Empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a record from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Set the risk of a node.
    pub fn with_node_risk(mut self, id: &str, risk: f64) -> Self {
        self.nodes.entry(id.to_string()).or_default().risk = Some(risk);
        self
    }

    /// Set a boolean attribute on a node.
    pub fn with_attribute(mut self, id: &str, key: &str, value: bool) -> Self {
        self.nodes
            .entry(id.to_string())
            .or_default()
            .attributes
            .insert(key.to_string(), value);
        self
    }

    /// Add an edge entry.
    pub fn with_edge(mut self, src: &str, dst: &str, risk: Option<f64>, cost: Option<f64>) -> Self {
        self.edges.push(EdgeData {
            src: src.to_string(),
            dst: dst.to_string(),
            risk,
            cost,
        });
        self
    }

    /// Ids of nodes whose attribute `key` equals `value`.
    pub fn nodes_with_attribute(&self, key: &str, value: bool) -> impl Iterator<Item = &str> + '_ {
        let key = key.to_string();
        self.nodes
            .iter()
            .filter(move |(_, data)| data.attributes.get(&key) == Some(&value))
            .map(|(id, _)| id.as_str())
    }

    /// Check the record against `graph`.
    pub fn validate_against(&self, graph: &SystemGraph) -> Result<(), DataValidationError> {
        for (id, data) in &self.nodes {
            if !graph.contains(id) {
                return Err(DataValidationError::UnknownNode(id.clone()));
            }
            if let Some(risk) = data.risk {
                check_risk(id, risk)?;
            }
        }

        for edge in &self.edges {
            let owner = format!("{}->{}", edge.src, edge.dst);
            for endpoint in [&edge.src, &edge.dst] {
                if !graph.contains(endpoint) {
                    return Err(DataValidationError::UnknownNode(endpoint.clone()));
                }
            }
            if !graph.edges().iter().any(|e| e.connects(&edge.src, &edge.dst)) {
                return Err(DataValidationError::UnknownEdge {
                    src: edge.src.clone(),
                    dst: edge.dst.clone(),
                });
            }
            if let Some(risk) = edge.risk {
                check_risk(&owner, risk)?;
            }
            if let Some(cost) = edge.cost {
                if !cost.is_finite() || cost < 0.0 {
                    return Err(DataValidationError::CostOutOfRange { owner, value: cost });
                }
            }
        }

        Ok(())
    }
}

fn check_risk(owner: &str, value: f64) -> Result<(), DataValidationError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(DataValidationError::RiskOutOfRange {
            owner: owner.to_string(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Edge, Logic, Node, NodeId};

    fn graph() -> SystemGraph {
        let id = |s: &str| NodeId::new(s).unwrap();
        SystemGraph::new(
            vec![
                Node::indicator("indicator", Logic::And).unwrap(),
                Node::component("c1", Logic::And).unwrap(),
                Node::supplier("s1").unwrap(),
            ],
            vec![Edge::new(id("c1"), id("indicator")), Edge::new(id("s1"), id("c1"))],
        )
        .unwrap()
    }

    #[test]
    fn test_parse_record() {
        let json = r#"{
            "nodes": {"c1": {"risk": 0.2, "attributes": {"domestic": true}}},
            "edges": [{"src": "s1", "dst": "c1", "risk": 0.1, "cost": 3.0}]
        }"#;
        let data = RiskData::from_json_str(json).unwrap();
        assert_eq!(data.nodes["c1"].risk, Some(0.2));
        assert_eq!(data.edges[0].cost, Some(3.0));
        assert!(data.validate_against(&graph()).is_ok());
    }

    #[test]
    fn test_unknown_node_rejected() {
        let data = RiskData::new().with_node_risk("ghost", 0.1);
        assert_eq!(
            data.validate_against(&graph()),
            Err(DataValidationError::UnknownNode("ghost".to_string()))
        );
    }

    #[test]
    fn test_unknown_edge_rejected() {
        let data = RiskData::new().with_edge("c1", "s1", Some(0.1), None);
        assert!(matches!(
            data.validate_against(&graph()),
            Err(DataValidationError::UnknownEdge { .. })
        ));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let data = RiskData::new().with_node_risk("c1", 1.5);
        assert!(matches!(
            data.validate_against(&graph()),
            Err(DataValidationError::RiskOutOfRange { .. })
        ));

        let nan = RiskData::new().with_node_risk("c1", f64::NAN);
        assert!(nan.validate_against(&graph()).is_err());

        let cost = RiskData::new().with_edge("s1", "c1", None, Some(-1.0));
        assert!(matches!(
            cost.validate_against(&graph()),
            Err(DataValidationError::CostOutOfRange { .. })
        ));
    }

    #[test]
    fn test_attribute_selector() {
        let data = RiskData::new()
            .with_attribute("s1", "domestic", true)
            .with_attribute("c1", "domestic", false);
        let domestic: Vec<&str> = data.nodes_with_attribute("domestic", true).collect();
        assert_eq!(domestic, vec!["s1"]);
    }
}
