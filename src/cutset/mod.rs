//! Minimal cutset enumeration.
//!
//! A cutset is a set of nodes whose joint failure guarantees failure of the
//! indicator; it is minimal when no proper subset is also a cutset.
//! [`find_minimal_cutsets`] runs MOCUS over the compiled gate graph;
//! [`brute_force_cutsets`] checks every subset of components and exists to
//! cross-check MOCUS on small graphs.
//!
//! ## Output order
//!
//! Cutsets are returned sorted by size, then lexicographically by member ids.

pub mod brute_force;
pub mod mocus;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::probability::ProbabilityVector;
use crate::types::NodeId;

pub use brute_force::{brute_force_cutsets, BRUTE_FORCE_MAX_VARIABLES};
pub use mocus::{find_minimal_cutsets, mocus};

/// Set of nodes whose joint failure fails the indicator.
pub type Cutset = BTreeSet<NodeId>;

/// Structural precondition of a cutset algorithm not met. Callers can fall
/// back to exact BDD evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CutsetError {
    /// Component with several active suppliers while suppliers are modelled.
    #[error("Component {0} has more than one active supplier")]
    MultipleSuppliers(String),
    /// Compiled structure contains a cycle.
    #[error("Compiled structure has a cycle through {0}")]
    Cyclic(String),
    /// Too many cutsets or basic events.
    #[error("Cutset limit exceeded: {0}")]
    LimitExceeded(String),
    /// Probability vector has no entry for a cutset member.
    #[error("Missing probability for node: {0}")]
    MissingProbability(String),
}

/// Cutset enumeration configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutsetConfig {
    /// Maximum working cutsets before giving up.
    pub max_cutsets: usize,
}

impl Default for CutsetConfig {
    fn default() -> Self {
        Self { max_cutsets: 100_000 }
    }
}

/// Reduce cutsets to the minimal ones.
///
/// Sorted by size, a cutset is kept unless a previously kept one is a
/// subset of it. Duplicates collapse.
pub fn minimize<I>(cutsets: I) -> Vec<Cutset>
where
    I: IntoIterator<Item = Cutset>,
{
    let mut candidates: Vec<Cutset> = cutsets.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
    candidates.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

    let mut kept: Vec<Cutset> = Vec::new();
    for candidate in candidates {
        if !kept.iter().any(|k| k.is_subset(&candidate)) {
            kept.push(candidate);
        }
    }
    kept
}

/// Probability that at least one cutset fails:
/// `1 - prod(1 - prod(p_member))`.
///
/// Assumes cutsets fail independently, which only holds when no node is
/// shared between them; otherwise this is an upper bound on the exact risk.
pub fn probability_any_cutset(cutsets: &[Cutset], p: &ProbabilityVector) -> Result<f64, CutsetError> {
    let mut survive = 1.0;
    for cutset in cutsets {
        let mut all_fail = 1.0;
        for member in cutset {
            let value = p
                .get(member.as_str())
                .ok_or_else(|| CutsetError::MissingProbability(member.to_string()))?;
            all_fail *= value;
        }
        survive *= 1.0 - all_fail;
    }
    Ok(1.0 - survive)
}
