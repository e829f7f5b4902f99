//! System risk functions.
//!
//! [`RiskModel`] is the seam the importance engine is written against: the
//! exact BDD evaluation and the cutset approximation both implement it.

use crate::bdd::{BddConfig, BddError, SystemBdd};
use crate::cutset::{find_minimal_cutsets, probability_any_cutset, Cutset, CutsetConfig, CutsetError};
use crate::probability::ProbabilityVector;
use crate::types::SystemGraph;

/// A function from per-node failure probabilities to indicator failure
/// probability.
pub trait RiskModel {
    /// Error type for evaluation.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Probability that the indicator fails under `p`.
    fn risk(&self, p: &ProbabilityVector) -> Result<f64, Self::Error>;
}

impl RiskModel for SystemBdd {
    type Error = BddError;

    fn risk(&self, p: &ProbabilityVector) -> Result<f64, BddError> {
        SystemBdd::risk(self, p)
    }
}

/// Cutset-based risk approximation.
#[derive(Debug, Clone, PartialEq)]
pub struct CutsetRisk {
    cutsets: Vec<Cutset>,
}

impl CutsetRisk {
    /// Wrap precomputed minimal cutsets.
    pub fn new(cutsets: Vec<Cutset>) -> Self {
        Self { cutsets }
    }

    /// Enumerate the cutsets of `graph`.
    pub fn from_graph(graph: &SystemGraph, ignore_suppliers: bool, config: &CutsetConfig) -> Result<Self, CutsetError> {
        Ok(Self::new(find_minimal_cutsets(graph, ignore_suppliers, config)?))
    }

    /// The minimal cutsets.
    pub fn cutsets(&self) -> &[Cutset] {
        &self.cutsets
    }
}

impl RiskModel for CutsetRisk {
    type Error = CutsetError;

    fn risk(&self, p: &ProbabilityVector) -> Result<f64, CutsetError> {
        probability_any_cutset(&self.cutsets, p)
    }
}

/// `1 - prod(1 - x)`: probability that at least one independent event occurs.
pub fn probability_union<I: IntoIterator<Item = f64>>(probabilities: I) -> f64 {
    1.0 - probabilities.into_iter().map(|x| 1.0 - x).product::<f64>()
}

/// Exact risk of `graph` under `p`.
pub fn risk_by_bdd(graph: &SystemGraph, p: &ProbabilityVector, config: &BddConfig) -> Result<f64, BddError> {
    SystemBdd::build(graph, config)?.risk(p)
}

/// Cutset approximation of the risk of `graph` under `p`.
pub fn risk_by_cutsets(
    graph: &SystemGraph,
    p: &ProbabilityVector,
    ignore_suppliers: bool,
    config: &CutsetConfig,
) -> Result<f64, CutsetError> {
    CutsetRisk::from_graph(graph, ignore_suppliers, config)?.risk(p)
}
