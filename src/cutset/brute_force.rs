//! Exhaustive cutset oracle for small graphs.

use super::{minimize, Cutset, CutsetError};
use crate::compiler::compile;
use crate::types::{NodeId, SystemGraph};

/// Largest number of components [`brute_force_cutsets`] will enumerate.
pub const BRUTE_FORCE_MAX_VARIABLES: usize = 20;

/// Minimal cutsets found by testing every subset of components against the
/// compiled boolean function. Suppliers are ignored.
///
/// Exponential in the number of components; meant for tests.
pub fn brute_force_cutsets(graph: &SystemGraph) -> Result<Vec<Cutset>, CutsetError> {
    let components: Vec<&NodeId> = graph.components().collect();
    if components.len() > BRUTE_FORCE_MAX_VARIABLES {
        return Err(CutsetError::LimitExceeded(format!(
            "{} components, brute force handles at most {}",
            components.len(),
            BRUTE_FORCE_MAX_VARIABLES
        )));
    }

    let lg = compile(graph, true);
    if let Some(v) = lg.find_cycle() {
        return Err(CutsetError::Cyclic(lg.vertex(v).name()));
    }

    let mut failing = Vec::new();
    for mask in 0u32..(1u32 << components.len()) {
        let subset: Cutset = components
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, id)| (*id).clone())
            .collect();
        if lg.evaluate(|n| subset.contains(n)) {
            failing.push(subset);
        }
    }

    Ok(minimize(failing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cutset::{find_minimal_cutsets, CutsetConfig};
    use crate::types::{Edge, Logic, Node};

    fn id(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    #[test]
    fn test_matches_mocus() {
        let sg = SystemGraph::new(
            vec![
                Node::indicator("indicator", Logic::Or).unwrap(),
                Node::component("a", Logic::And).unwrap(),
                Node::component("b", Logic::Or).unwrap(),
                Node::component("c", Logic::And).unwrap(),
                Node::component("d", Logic::And).unwrap(),
            ],
            vec![
                Edge::new(id("a"), id("indicator")),
                Edge::new(id("b"), id("a")),
                Edge::new(id("c"), id("a")),
                Edge::new(id("d"), id("b")),
            ],
        )
        .unwrap();

        let oracle = brute_force_cutsets(&sg).unwrap();
        let mocus = find_minimal_cutsets(&sg, true, &CutsetConfig::default()).unwrap();
        assert_eq!(oracle, mocus);
    }

    #[test]
    fn test_empty_graph_has_no_cutsets() {
        let sg = SystemGraph::new(vec![Node::indicator("indicator", Logic::And).unwrap()], vec![]).unwrap();
        assert!(brute_force_cutsets(&sg).unwrap().is_empty());
    }

    #[test]
    fn test_too_many_components() {
        let mut nodes = vec![Node::indicator("indicator", Logic::Or).unwrap()];
        let mut edges = Vec::new();
        for i in 0..=BRUTE_FORCE_MAX_VARIABLES {
            let name = format!("c{}", i);
            nodes.push(Node::component(&name, Logic::And).unwrap());
            edges.push(Edge::new(id(&name), id("indicator")));
        }
        let sg = SystemGraph::new(nodes, edges).unwrap();
        assert!(matches!(brute_force_cutsets(&sg), Err(CutsetError::LimitExceeded(_))));
    }
}
