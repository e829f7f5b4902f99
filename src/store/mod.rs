//! Derived-artifact repositories.
//!
//! Cutsets, BDDs, risks and importances are pure functions of a graph (and,
//! for some, of a probability vector or selection). A repository caches
//! them by [`ArtifactKey`]: the graph's content id plus a resource name.
//! Lookups are always safe to recompute on a miss.

pub mod memory;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::bdd::SystemBdd;
use crate::cutset::Cutset;
use crate::importance::Importances;
use crate::types::{GraphId, SystemGraph};

/// Kind of a derived artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Minimal cutsets.
    Cutsets,
    /// Shared BDD of the indicator.
    Bdd,
    /// Cutset-based risk.
    Risk,
    /// BDD-exact risk.
    ExactRisk,
    /// Birnbaum importances at given probabilities.
    BirnbaumImportances,
    /// Birnbaum importances at maximum entropy.
    StructuralImportances,
    /// Joint importance of a selection.
    SelectImportance,
}

impl ArtifactKind {
    /// Resource name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cutsets => "cutsets",
            Self::Bdd => "bdd",
            Self::Risk => "risk",
            Self::ExactRisk => "exact_risk",
            Self::BirnbaumImportances => "birnbaum_importances",
            Self::StructuralImportances => "birnbaum_structural_importances",
            Self::SelectImportance => "birnbaum_importances_select",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cache key: graph identity, artifact kind, and a qualifier for inputs
/// other than the graph (probability fingerprint, selection label, config
/// hash). At most one artifact is stored per key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    /// Content id of the graph.
    pub graph_id: GraphId,
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Extra inputs; empty when the artifact depends on the graph alone.
    pub qualifier: String,
}

impl ArtifactKey {
    /// Key for an artifact depending only on `graph`.
    pub fn new(graph: &SystemGraph, kind: ArtifactKind) -> Self {
        Self {
            graph_id: graph.graph_id().clone(),
            kind,
            qualifier: String::new(),
        }
    }

    /// Add a qualifier.
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = qualifier.into();
        self
    }

    /// `kind` or `kind:qualifier`.
    pub fn resource(&self) -> String {
        if self.qualifier.is_empty() {
            self.kind.to_string()
        } else {
            format!("{}:{}", self.kind, self.qualifier)
        }
    }
}

/// A cached artifact. Large values are shared behind `Arc`.
#[derive(Debug, Clone)]
pub enum Artifact {
    /// Minimal cutsets.
    Cutsets(Arc<Vec<Cutset>>),
    /// BDD of the indicator.
    Bdd(Arc<SystemBdd>),
    /// A risk value.
    Risk(f64),
    /// Importance map.
    Importances(Arc<Importances>),
}

impl Artifact {
    /// Variant name, for diagnostics.
    pub fn variant(&self) -> &'static str {
        match self {
            Self::Cutsets(_) => "cutsets",
            Self::Bdd(_) => "bdd",
            Self::Risk(_) => "risk",
            Self::Importances(_) => "importances",
        }
    }

    /// Cutsets, if this is a cutset artifact.
    pub fn as_cutsets(&self) -> Option<Arc<Vec<Cutset>>> {
        match self {
            Self::Cutsets(c) => Some(Arc::clone(c)),
            _ => None,
        }
    }

    /// BDD, if this is a BDD artifact.
    pub fn as_bdd(&self) -> Option<Arc<SystemBdd>> {
        match self {
            Self::Bdd(b) => Some(Arc::clone(b)),
            _ => None,
        }
    }

    /// Risk value, if this is a risk artifact.
    pub fn as_risk(&self) -> Option<f64> {
        match self {
            Self::Risk(r) => Some(*r),
            _ => None,
        }
    }

    /// Importances, if this is an importance artifact.
    pub fn as_importances(&self) -> Option<Arc<Importances>> {
        match self {
            Self::Importances(i) => Some(Arc::clone(i)),
            _ => None,
        }
    }
}

/// Explicit lookup failure, distinct from a value that is present.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryLookupError {
    /// Nothing stored under the key.
    #[error("No {resource} cached for graph {graph_id}")]
    Miss {
        /// Graph id of the key.
        graph_id: GraphId,
        /// Resource name of the key.
        resource: String,
    },
    /// Something is stored under the key, but of another variant.
    #[error("Cached {resource} for graph {graph_id} is a {found} artifact")]
    WrongVariant {
        /// Graph id of the key.
        graph_id: GraphId,
        /// Resource name of the key.
        resource: String,
        /// Variant found.
        found: &'static str,
    },
}

/// Cache of derived artifacts keyed by graph content id.
///
/// Methods take `&self`; implementations synchronise internally so one
/// repository can be shared across threads.
pub trait ArtifactRepository: Send + Sync {
    /// Fetch an artifact; `None` on a miss.
    fn get(&self, key: &ArtifactKey) -> Option<Artifact>;

    /// Store an artifact, replacing any previous one under the key.
    fn put(&self, key: ArtifactKey, artifact: Artifact);

    /// Remove an artifact, returning it if present.
    fn delete(&self, key: &ArtifactKey) -> Option<Artifact>;

    /// Fetch an artifact, reporting a miss as an error.
    fn lookup(&self, key: &ArtifactKey) -> Result<Artifact, RepositoryLookupError> {
        self.get(key).ok_or_else(|| RepositoryLookupError::Miss {
            graph_id: key.graph_id.clone(),
            resource: key.resource(),
        })
    }

    /// Fetch cutsets, reporting a miss or a different variant as an error.
    fn lookup_cutsets(&self, key: &ArtifactKey) -> Result<Arc<Vec<Cutset>>, RepositoryLookupError> {
        let artifact = self.lookup(key)?;
        artifact.as_cutsets().ok_or_else(|| RepositoryLookupError::WrongVariant {
            graph_id: key.graph_id.clone(),
            resource: key.resource(),
            found: artifact.variant(),
        })
    }
}

pub use memory::{InMemoryRepository, RepositoryConfig, RepositoryStats};
