//! # supply-risk-kernel
//!
//! Risk assessment for supply-chain dependency graphs.
//!
//! A system is modelled as a graph of components and suppliers whose
//! failures combine through `and` (redundancy) and `or` (single point of
//! failure) logic up to a single indicator node. The kernel answers:
//!
//! > How likely is the indicator to fail, and which nodes matter most?
//!
//! ## Architecture
//!
//! ```text
//! SystemGraph → compile → LogicGraph → MOCUS → minimal cutsets → approximate risk
//!      │
//!      └────→ DependencyMap → SystemBdd ─────────────────────→ exact risk
//!                                                                  ↓
//!                                         Birnbaum / structural importance
//! ```
//!
//! Derived artifacts are cached by graph content id through an
//! [`ArtifactRepository`]; [`RiskAnalyzer`] ties the pieces together.
//!
//! ## Determinism Guarantees
//!
//! - Same nodes and edges, in any order → identical [`GraphId`]
//! - Cutsets are returned sorted (size, then member ids)
//! - Importance maps are ordered by node id

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod canonical;
pub mod compiler;
pub mod bdd;
pub mod cutset;
pub mod risk;
pub mod importance;
pub mod probability;
pub mod store;
pub mod analyzer;

// Re-exports
pub use types::{
    Node, NodeId, NodeKind, Tag, Logic, LogicSlot, Edge, EdgeTag,
    SystemGraph, GraphId, GraphDocument, ModelValidationError,
    RiskData, DataValidationError, FICTIVE_PREFIX,
};
pub use canonical::{to_canonical_bytes, canonical_hash, canonical_hash_hex, content_hash_hex};
pub use compiler::{compile, dependency_map, LogicGraph, Vertex, DEPS_PREFIX};
pub use bdd::{BddConfig, BddError, BddManager, BddRef, SystemBdd};
pub use cutset::{
    Cutset, CutsetConfig, CutsetError, minimize, mocus, find_minimal_cutsets,
    brute_force_cutsets, probability_any_cutset, BRUTE_FORCE_MAX_VARIABLES,
};
pub use risk::{RiskModel, CutsetRisk, probability_union, risk_by_bdd, risk_by_cutsets};
pub use importance::{
    Importances, Selection, Scaling, birnbaum_importance, birnbaum_structural_importance,
    birnbaum_importance_select, fractional_importance_of_attributes,
};
pub use probability::{ProbabilityVector, provide_unknown_data, provide_direct_from_data};
pub use store::{
    ArtifactRepository, ArtifactKey, ArtifactKind, Artifact, RepositoryLookupError,
    InMemoryRepository, RepositoryConfig, RepositoryStats,
};
pub use analyzer::{RiskAnalyzer, AnalysisConfig, AnalysisError};

/// Schema version of the exchange document and risk record.
/// Increment on breaking changes to either.
pub const RISK_KERNEL_SCHEMA_VERSION: &str = "1.0.0";
