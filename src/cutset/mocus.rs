//! MOCUS over the compiled gate graph.
//!
//! Every vertex is both a basic event and a gate. Starting from the seed
//! cutset `{indicator}`, popping a vertex `v` adds, for every working cutset
//! containing `v`:
//!
//! - `and` gate: one cutset with `v` replaced by all of its children
//! - `or` gate: one cutset per child, with `v` replaced by that child
//!
//! Older cutsets are kept and removed by minimisation at the end, which is
//! what lets a non-fictive vertex stand for its own failure.

use std::collections::{BTreeSet, HashSet};

use super::{minimize, Cutset, CutsetConfig, CutsetError};
use crate::compiler::{compile, LogicGraph};
use crate::types::{Logic, SystemGraph};

/// Minimal cutsets of `graph`.
///
/// With suppliers modelled, each component may have at most one active
/// supplier. The compiled structure must be acyclic; shared sub-structure
/// is accepted.
pub fn find_minimal_cutsets(
    graph: &SystemGraph,
    ignore_suppliers: bool,
    config: &CutsetConfig,
) -> Result<Vec<Cutset>, CutsetError> {
    if !ignore_suppliers {
        if let Some(c) = graph.components().find(|c| graph.active_suppliers_of(c.as_str()).len() > 1) {
            return Err(CutsetError::MultipleSuppliers(c.to_string()));
        }
    }

    let lg = compile(graph, ignore_suppliers);
    if let Some(v) = lg.find_cycle() {
        return Err(CutsetError::Cyclic(lg.vertex(v).name()));
    }

    let cutsets = mocus(&lg, config)?;
    tracing::debug!(
        graph_id = %graph.graph_id(),
        minimal = cutsets.len(),
        ignore_suppliers,
        "minimal cutsets found"
    );
    Ok(cutsets)
}

/// Run MOCUS on an acyclic gate graph and return the minimal cutsets,
/// synthetic gates filtered out.
pub fn mocus(lg: &LogicGraph, config: &CutsetConfig) -> Result<Vec<Cutset>, CutsetError> {
    let root = lg.root();
    let seed = BTreeSet::from([root]);

    let mut working: Vec<BTreeSet<usize>> = vec![seed.clone()];
    let mut seen: HashSet<BTreeSet<usize>> = HashSet::from([seed.clone()]);

    // A vertex already waiting on the stack is not pushed again.
    let mut pending = vec![false; lg.len()];
    let mut stack = vec![root];
    pending[root] = true;

    while let Some(v) = stack.pop() {
        pending[v] = false;
        let children = lg.children(v);
        if children.is_empty() {
            continue;
        }

        let mut produced = Vec::new();
        for cutset in working.iter().filter(|c| c.contains(&v)) {
            let mut base = cutset.clone();
            base.remove(&v);
            match lg.gate(v) {
                Logic::And => {
                    let mut next = base;
                    next.extend(children.iter().copied());
                    produced.push(next);
                }
                Logic::Or => {
                    for &child in children {
                        let mut next = base.clone();
                        next.insert(child);
                        produced.push(next);
                    }
                }
            }
        }

        for cutset in produced {
            if seen.insert(cutset.clone()) {
                working.push(cutset);
                if working.len() > config.max_cutsets {
                    tracing::warn!(limit = config.max_cutsets, "mocus working set limit exceeded");
                    return Err(CutsetError::LimitExceeded(format!(
                        "more than {} working cutsets",
                        config.max_cutsets
                    )));
                }
            }
        }

        for &child in children {
            if !pending[child] {
                pending[child] = true;
                stack.push(child);
            }
        }
    }

    let working_len = working.len();
    let basic = working.into_iter().filter(|c| *c != seed).filter_map(|c| {
        if c.contains(&root) || c.iter().any(|&v| lg.is_fictive(v)) {
            return None;
        }
        Some(c.iter().filter_map(|&v| lg.vertex(v).node_id().cloned()).collect::<Cutset>())
    });
    let minimal = minimize(basic);

    tracing::debug!(working = working_len, minimal = minimal.len(), "mocus complete");
    Ok(minimal)
}
