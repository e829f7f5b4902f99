//! One shared BDD for the indicator of a system graph.
//!
//! Every node `u` contributes a local formula
//!
//! ```text
//! u | op_c(component deps) | op_s(supplier deps)
//! ```
//!
//! where `op_c` is `u`'s component logic and `op_s` its supplier logic
//! (`and` unless stated). Variables are declared in depth-first discovery
//! order from the indicator. The indicator's formula is the starting point;
//! each other node's formula is then substituted for its variable, parents
//! before children, so shared sub-structure is expanded once and merged by
//! the unique table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::manager::{BddManager, BddRef};
use crate::compiler::{dependency_map, DependencyMap};
use crate::probability::ProbabilityVector;
use crate::types::{GraphId, Logic, NodeId, SystemGraph};

/// BDD construction failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BddError {
    /// Active dependencies form a cycle through this node.
    #[error("Dependency cycle through node: {0}")]
    Cycle(String),
    /// Probability vector has no entry for a BDD variable.
    #[error("Missing probability for node: {0}")]
    MissingProbability(String),
}

/// BDD build configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BddConfig {
    /// Run greedy variable reordering after composition.
    pub reorder: bool,
    /// Skip reordering above this many variables.
    pub max_reorder_vars: usize,
    /// Maximum sweeps over adjacent variable pairs.
    pub max_reorder_passes: usize,
}

impl Default for BddConfig {
    fn default() -> Self {
        Self {
            reorder: true,
            max_reorder_vars: 64,
            max_reorder_passes: 2,
        }
    }
}

/// The indicator function of a system graph as a BDD.
#[derive(Debug, Clone)]
pub struct SystemBdd {
    manager: BddManager,
    root: BddRef,
    indicator: NodeId,
    graph_id: GraphId,
}

impl SystemBdd {
    /// Build the BDD of `graph`'s indicator.
    pub fn build(graph: &SystemGraph, config: &BddConfig) -> Result<Self, BddError> {
        let deps = dependency_map(graph);
        let indicator = graph.indicator().clone();
        let discovered = discover(&deps, &indicator)?;

        let mut manager = BddManager::with_order(discovered.iter().map(NodeId::as_str));

        let mut root = local_formula(&mut manager, graph, &deps, &indicator);
        for node in topological_order(&deps, &indicator) {
            if node == indicator || deps.get(&node).map_or(true, |d| d.is_empty()) {
                continue;
            }
            let local = local_formula(&mut manager, graph, &deps, &node);
            if let Some(level) = manager.level_of(node.as_str()) {
                root = manager.compose(root, level, local);
            }
        }

        // Drop intermediate nodes left over from composition.
        let order: Vec<String> = manager.var_names().to_vec();
        let (mut manager, mut root) = rebuild(&manager, root, &order).unwrap_or((manager, root));
        let composed_size = manager.node_count(root);

        if config.reorder && manager.num_vars() <= config.max_reorder_vars {
            (manager, root) = reorder(manager, root, config.max_reorder_passes);
        }

        tracing::debug!(
            graph_id = %graph.graph_id(),
            vars = manager.num_vars(),
            nodes = manager.node_count(root),
            composed_nodes = composed_size,
            "system bdd built"
        );

        Ok(Self {
            manager,
            root,
            indicator,
            graph_id: graph.graph_id().clone(),
        })
    }

    /// Exact probability that the indicator fails.
    ///
    /// The indicator's own entry is treated as 0 whatever `p` holds.
    pub fn risk(&self, p: &ProbabilityVector) -> Result<f64, BddError> {
        let mut by_level = Vec::with_capacity(self.manager.num_vars());
        for name in self.manager.var_names() {
            if name == self.indicator.as_str() {
                by_level.push(0.0);
                continue;
            }
            let value = p
                .get(name)
                .ok_or_else(|| BddError::MissingProbability(name.clone()))?;
            by_level.push(value);
        }
        Ok(self.manager.probability(self.root, &by_level))
    }

    /// Whether the indicator fails when exactly `failed` fail.
    pub fn evaluate(&self, failed: &BTreeSet<NodeId>) -> bool {
        let assignment: Vec<bool> = self
            .manager
            .var_names()
            .iter()
            .map(|name| name != self.indicator.as_str() && failed.contains(name.as_str()))
            .collect();
        self.manager.evaluate(self.root, &assignment)
    }

    /// Graph this BDD was built from.
    pub fn graph_id(&self) -> &GraphId {
        &self.graph_id
    }

    /// Variable order, top first.
    pub fn variable_order(&self) -> &[String] {
        self.manager.var_names()
    }

    /// Nodes of the indicator function, terminal included.
    pub fn node_count(&self) -> usize {
        self.manager.node_count(self.root)
    }

    /// Node ids the indicator function actually depends on.
    pub fn support(&self) -> Vec<&str> {
        self.manager
            .support(self.root)
            .into_iter()
            .map(|level| self.manager.var_names()[level as usize].as_str())
            .collect()
    }
}

/// Depth-first pre-order of nodes reachable from the indicator.
fn discover(deps: &DependencyMap, indicator: &NodeId) -> Result<Vec<NodeId>, BddError> {
    let mut discovered = Vec::new();
    let mut seen = BTreeSet::new();
    let mut on_path = BTreeSet::new();
    visit(deps, indicator, &mut discovered, &mut seen, &mut on_path)?;
    Ok(discovered)
}

fn visit(
    deps: &DependencyMap,
    node: &NodeId,
    discovered: &mut Vec<NodeId>,
    seen: &mut BTreeSet<NodeId>,
    on_path: &mut BTreeSet<NodeId>,
) -> Result<(), BddError> {
    if on_path.contains(node) {
        return Err(BddError::Cycle(node.to_string()));
    }
    if !seen.insert(node.clone()) {
        return Ok(());
    }
    discovered.push(node.clone());
    on_path.insert(node.clone());
    if let Some(d) = deps.get(node) {
        for child in d.all() {
            visit(deps, child, discovered, seen, on_path)?;
        }
    }
    on_path.remove(node);
    Ok(())
}

/// Reachable nodes with every node before all of its dependencies.
///
/// Assumes acyclicity, already checked by [`discover`].
fn topological_order(deps: &DependencyMap, indicator: &NodeId) -> Vec<NodeId> {
    let mut postorder = Vec::new();
    let mut seen = BTreeSet::new();
    // (node, dependencies already pushed)
    let mut stack = vec![(indicator.clone(), false)];
    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            postorder.push(node);
            continue;
        }
        if !seen.insert(node.clone()) {
            continue;
        }
        stack.push((node.clone(), true));
        if let Some(d) = deps.get(&node) {
            for child in d.all().collect::<Vec<_>>().into_iter().rev() {
                if !seen.contains(child) {
                    stack.push((child.clone(), false));
                }
            }
        }
    }
    postorder.reverse();
    postorder
}

fn local_formula(manager: &mut BddManager, graph: &SystemGraph, deps: &DependencyMap, node: &NodeId) -> BddRef {
    let own = match manager.level_of(node.as_str()) {
        Some(level) => manager.var(level),
        None => return BddRef::FALSE,
    };
    let Some(d) = deps.get(node) else {
        return own;
    };
    let (component_logic, supplier_logic) = graph
        .node(node.as_str())
        .map(|n| (n.component_logic(), n.supplier_logic()))
        .unwrap_or((Logic::And, Logic::And));

    let mut formula = own;
    for (children, logic) in [(&d.components, component_logic), (&d.suppliers, supplier_logic)] {
        if children.is_empty() {
            continue;
        }
        let vars: Vec<BddRef> = children
            .iter()
            .filter_map(|c| manager.level_of(c.as_str()))
            .collect::<Vec<_>>()
            .into_iter()
            .map(|level| manager.var(level))
            .collect();
        let joined = match logic {
            Logic::And => manager.and_all(vars),
            Logic::Or => manager.or_all(vars),
        };
        formula = manager.or(formula, joined);
    }
    formula
}

fn rebuild(manager: &BddManager, root: BddRef, order: &[String]) -> Option<(BddManager, BddRef)> {
    let mut target = BddManager::with_order(order.iter().cloned());
    let root = manager.transfer(root, &mut target)?;
    Some((target, root))
}

/// Greedy adjacent-swap reordering; keeps any strictly smaller order.
fn reorder(mut manager: BddManager, mut root: BddRef, passes: usize) -> (BddManager, BddRef) {
    let mut best = manager.node_count(root);
    let before = best;

    for _ in 0..passes {
        let mut improved = false;
        for i in 0..manager.num_vars().saturating_sub(1) {
            let mut order: Vec<String> = manager.var_names().to_vec();
            order.swap(i, i + 1);
            if let Some((candidate, candidate_root)) = rebuild(&manager, root, &order) {
                let size = candidate.node_count(candidate_root);
                if size < best {
                    best = size;
                    manager = candidate;
                    root = candidate_root;
                    improved = true;
                }
            }
        }
        if !improved {
            break;
        }
    }

    if best < before {
        tracing::debug!(before, after = best, "bdd reordered");
    }
    (manager, root)
}

/// Variable names grouped by depth-first discovery, for inspection.
pub fn discovery_order(graph: &SystemGraph) -> Result<Vec<NodeId>, BddError> {
    discover(&dependency_map(graph), graph.indicator())
}
