//! Cache-through risk analysis.
//!
//! [`RiskAnalyzer`] answers risk and importance queries for graphs, storing
//! every derived artifact in an [`ArtifactRepository`] keyed by the graph's
//! content id. Graphs are immutable, so a cached artifact stays valid for as
//! long as its key exists.
//!
//! ## Fallback
//!
//! Cutset risk needs an acyclic structure and at most one active supplier
//! per component. When either precondition fails and
//! [`AnalysisConfig::fallback_to_bdd`] is set, [`RiskAnalyzer::risk`]
//! answers with the exact BDD risk instead.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::bdd::{BddConfig, BddError, SystemBdd};
use crate::canonical::canonical_hash_hex;
use crate::cutset::{find_minimal_cutsets, probability_any_cutset, Cutset, CutsetConfig, CutsetError};
use crate::importance::{
    birnbaum_importance, birnbaum_importance_select, birnbaum_structural_importance, Importances, Selection,
};
use crate::probability::{provide_direct_from_data, ProbabilityVector};
use crate::store::{Artifact, ArtifactKey, ArtifactKind, ArtifactRepository, RepositoryLookupError};
use crate::types::{DataValidationError, ModelValidationError, RiskData, SystemGraph};

/// Error type for analysis operations.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Graph failed validation.
    #[error("Model error: {0}")]
    Model(#[from] ModelValidationError),
    /// Risk data does not fit the graph.
    #[error("Data error: {0}")]
    Data(#[from] DataValidationError),
    /// Cutset enumeration failed.
    #[error("Cutset error: {0}")]
    Cutset(#[from] CutsetError),
    /// BDD construction or evaluation failed.
    #[error("BDD error: {0}")]
    Bdd(#[from] BddError),
    /// Repository returned something unusable.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryLookupError),
}

/// Analysis configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// BDD construction.
    pub bdd: BddConfig,
    /// Cutset enumeration.
    pub cutsets: CutsetConfig,
    /// Leave suppliers out of cutset enumeration.
    pub ignore_suppliers: bool,
    /// Answer cutset risk queries with BDD risk when cutsets are unavailable.
    pub fallback_to_bdd: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            bdd: BddConfig::default(),
            cutsets: CutsetConfig::default(),
            ignore_suppliers: false,
            fallback_to_bdd: true,
        }
    }
}

impl AnalysisConfig {
    /// Deterministic hash of the parameters.
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(self)
    }
}

/// Cache-through analysis service.
pub struct RiskAnalyzer<R: ArtifactRepository> {
    repo: Arc<R>,
    config: AnalysisConfig,
}

impl<R: ArtifactRepository> RiskAnalyzer<R> {
    /// Create an analyzer over a repository.
    pub fn new(repo: Arc<R>, config: AnalysisConfig) -> Self {
        Self { repo, config }
    }

    /// The repository.
    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// The configuration.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    fn key(&self, graph: &SystemGraph, kind: ArtifactKind) -> ArtifactKey {
        ArtifactKey::new(graph, kind).with_qualifier(self.config.params_hash())
    }

    /// Minimal cutsets of `graph`.
    pub fn cutsets(&self, graph: &SystemGraph) -> Result<Arc<Vec<Cutset>>, AnalysisError> {
        let key = self.key(graph, ArtifactKind::Cutsets);
        match self.repo.lookup_cutsets(&key) {
            Ok(cutsets) => return Ok(cutsets),
            Err(RepositoryLookupError::Miss { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let cutsets = Arc::new(find_minimal_cutsets(
            graph,
            self.config.ignore_suppliers,
            &self.config.cutsets,
        )?);
        self.repo.put(key, Artifact::Cutsets(Arc::clone(&cutsets)));
        Ok(cutsets)
    }

    /// BDD of `graph`'s indicator.
    pub fn bdd(&self, graph: &SystemGraph) -> Result<Arc<SystemBdd>, AnalysisError> {
        let key = self.key(graph, ArtifactKind::Bdd);
        if let Some(bdd) = self.repo.get(&key).and_then(|a| a.as_bdd()) {
            return Ok(bdd);
        }

        let bdd = Arc::new(SystemBdd::build(graph, &self.config.bdd)?);
        self.repo.put(key, Artifact::Bdd(Arc::clone(&bdd)));
        Ok(bdd)
    }

    /// Cutset-based risk, falling back to exact risk when configured.
    pub fn risk(&self, graph: &SystemGraph, p: &ProbabilityVector) -> Result<f64, AnalysisError> {
        let key = self.key(graph, ArtifactKind::Risk).with_qualifier(self.qualified(p.fingerprint()));
        if let Some(risk) = self.repo.get(&key).and_then(|a| a.as_risk()) {
            return Ok(risk);
        }

        let risk = match self.cutsets(graph) {
            Ok(cutsets) => probability_any_cutset(&cutsets, p)?,
            Err(AnalysisError::Cutset(e)) if self.config.fallback_to_bdd => {
                tracing::warn!(
                    graph_id = %graph.graph_id(),
                    error = %e,
                    "cutsets unavailable, using exact risk"
                );
                self.exact_risk(graph, p)?
            }
            Err(e) => return Err(e),
        };

        self.repo.put(key, Artifact::Risk(risk));
        Ok(risk)
    }

    /// Exact risk from the BDD.
    pub fn exact_risk(&self, graph: &SystemGraph, p: &ProbabilityVector) -> Result<f64, AnalysisError> {
        let key = self.key(graph, ArtifactKind::ExactRisk).with_qualifier(self.qualified(p.fingerprint()));
        if let Some(risk) = self.repo.get(&key).and_then(|a| a.as_risk()) {
            return Ok(risk);
        }

        let risk = self.bdd(graph)?.risk(p)?;
        self.repo.put(key, Artifact::Risk(risk));
        Ok(risk)
    }

    /// Risk computed from a risk record.
    pub fn risk_from_data(&self, graph: &SystemGraph, data: &RiskData) -> Result<f64, AnalysisError> {
        let p = provide_direct_from_data(graph, data, false)?;
        self.risk(graph, &p)
    }

    /// Birnbaum importances under `p`, evaluated on the BDD.
    pub fn birnbaum_importances(
        &self,
        graph: &SystemGraph,
        p: &ProbabilityVector,
    ) -> Result<Arc<Importances>, AnalysisError> {
        let key = self
            .key(graph, ArtifactKind::BirnbaumImportances)
            .with_qualifier(self.qualified(p.fingerprint()));
        if let Some(imps) = self.repo.get(&key).and_then(|a| a.as_importances()) {
            return Ok(imps);
        }

        let bdd = self.bdd(graph)?;
        let imps = Arc::new(birnbaum_importance(graph, bdd.as_ref(), p)?);
        self.repo.put(key, Artifact::Importances(Arc::clone(&imps)));
        Ok(imps)
    }

    /// Birnbaum importances at maximum entropy.
    pub fn structural_importances(&self, graph: &SystemGraph) -> Result<Arc<Importances>, AnalysisError> {
        let key = self.key(graph, ArtifactKind::StructuralImportances);
        if let Some(imps) = self.repo.get(&key).and_then(|a| a.as_importances()) {
            return Ok(imps);
        }

        let bdd = self.bdd(graph)?;
        let imps = Arc::new(birnbaum_structural_importance(graph, bdd.as_ref())?);
        self.repo.put(key, Artifact::Importances(Arc::clone(&imps)));
        Ok(imps)
    }

    /// Joint importance of a selection, labelled by [`Selection::label`].
    ///
    /// Not cached: attribute selections depend on `data`, which the graph id
    /// does not cover.
    pub fn select_importance(
        &self,
        graph: &SystemGraph,
        p: &ProbabilityVector,
        selection: &Selection,
        data: Option<&RiskData>,
    ) -> Result<(String, f64), AnalysisError> {
        if let Some(data) = data {
            data.validate_against(graph)?;
        }
        let select = selection.resolve(graph, data);
        let bdd = self.bdd(graph)?;
        let value = birnbaum_importance_select(bdd.as_ref(), p, &select)?;
        Ok((format!("birnbaum_importances_{}", selection.label()), value))
    }

    fn qualified(&self, fingerprint: String) -> String {
        format!("{}:{}", self.config.params_hash(), fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probability::provide_unknown_data;
    use crate::store::InMemoryRepository;
    use crate::types::{Edge, Logic, Node, NodeId};

    fn id(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    fn analyzer() -> RiskAnalyzer<InMemoryRepository> {
        RiskAnalyzer::new(Arc::new(InMemoryRepository::new()), AnalysisConfig::default())
    }

    fn simple_or() -> SystemGraph {
        SystemGraph::new(
            vec![
                Node::indicator("indicator", Logic::And).unwrap(),
                Node::component("one", Logic::And).unwrap(),
                Node::component("two", Logic::And).unwrap(),
                Node::component("three", Logic::Or).unwrap(),
            ],
            vec![
                Edge::new(id("three"), id("indicator")),
                Edge::new(id("one"), id("three")),
                Edge::new(id("two"), id("three")),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_params_hash_determinism() {
        let a = AnalysisConfig::default();
        let b = AnalysisConfig::default();
        assert_eq!(a.params_hash(), b.params_hash());

        let c = AnalysisConfig {
            ignore_suppliers: true,
            ..AnalysisConfig::default()
        };
        assert_ne!(a.params_hash(), c.params_hash());
    }

    #[test]
    fn test_cutsets_cached() {
        let analyzer = analyzer();
        let sg = simple_or();

        let first = analyzer.cutsets(&sg).unwrap();
        let second = analyzer.cutsets(&sg).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 3);
        assert_eq!(analyzer.repository().stats().hits, 1);
    }

    #[test]
    fn test_risk_and_exact_risk() {
        let analyzer = analyzer();
        let sg = simple_or();
        let p = provide_unknown_data(&sg);

        // three | one | two at 0.5: cutsets are disjoint singletons
        let approx = analyzer.risk(&sg, &p).unwrap();
        let exact = analyzer.exact_risk(&sg, &p).unwrap();
        assert!((approx - 0.875).abs() < 1e-12);
        assert!((exact - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_fallback_on_multiple_suppliers() {
        let sg = SystemGraph::new(
            vec![
                Node::indicator("indicator", Logic::And).unwrap(),
                Node::component("c1", Logic::And).unwrap(),
                Node::supplier("s1").unwrap(),
                Node::supplier("s2").unwrap(),
            ],
            vec![
                Edge::new(id("c1"), id("indicator")),
                Edge::new(id("s1"), id("c1")),
                Edge::new(id("s2"), id("c1")),
            ],
        )
        .unwrap();
        let p = provide_unknown_data(&sg);

        let fallback = analyzer().risk(&sg, &p).unwrap();
        // c1 | (s1 & s2) at 0.5
        assert!((fallback - 0.625).abs() < 1e-12);

        let strict = RiskAnalyzer::new(
            Arc::new(InMemoryRepository::new()),
            AnalysisConfig {
                fallback_to_bdd: false,
                ..AnalysisConfig::default()
            },
        );
        assert!(matches!(
            strict.risk(&sg, &p),
            Err(AnalysisError::Cutset(CutsetError::MultipleSuppliers(_)))
        ));
    }

    #[test]
    fn test_importances() {
        let analyzer = analyzer();
        let sg = simple_or();

        let structural = analyzer.structural_importances(&sg).unwrap();
        assert_eq!(structural.len(), 3);
        // each of three OR'd events at 0.5: 1 - 0.75 = 0.25
        for value in structural.values() {
            assert!((value - 0.25).abs() < 1e-12);
        }

        let p = provide_unknown_data(&sg);
        let (label, joint) = analyzer
            .select_importance(&sg, &p, &Selection::Nodes(vec![id("one"), id("two")]), None)
            .unwrap();
        assert_eq!(label, "birnbaum_importances_select_nodes_one_two");
        assert!((joint - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_risk_from_invalid_data() {
        let analyzer = analyzer();
        let data = RiskData::new().with_node_risk("ghost", 0.1);
        assert!(matches!(
            analyzer.risk_from_data(&simple_or(), &data),
            Err(AnalysisError::Data(_))
        ));
    }
}
