//! Golden tests for the risk kernel.
//!
//! Fixed fixtures with known cutsets, risks and importances.

use std::collections::BTreeSet;
use std::sync::Arc;

use supply_risk_kernel::{
    brute_force_cutsets, find_minimal_cutsets, probability_any_cutset, provide_direct_from_data,
    provide_unknown_data, risk_by_bdd, risk_by_cutsets, AnalysisConfig, ArtifactRepository, BddConfig,
    BddManager, Cutset, CutsetConfig, Edge, InMemoryRepository, Logic, Node, NodeId, ProbabilityVector,
    RiskAnalyzer, RiskData, RiskModel, Selection, SystemBdd, SystemGraph,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn id(s: &str) -> NodeId {
    NodeId::new(s).unwrap()
}

fn cs(ids: &[&str]) -> Cutset {
    ids.iter().map(|s| id(s)).collect()
}

fn uniform(graph: &SystemGraph, value: f64) -> ProbabilityVector {
    graph
        .node_ids()
        .map(|n| (n.clone(), if n == graph.indicator() { 0.0 } else { value }))
        .collect()
}

fn three_node(logic: Logic) -> SystemGraph {
    SystemGraph::new(
        vec![
            Node::indicator("indicator", Logic::And).unwrap(),
            Node::component("one", Logic::And).unwrap(),
            Node::component("two", Logic::And).unwrap(),
            Node::component("three", logic).unwrap(),
        ],
        vec![
            Edge::new(id("three"), id("indicator")),
            Edge::new(id("one"), id("three")),
            Edge::new(id("two"), id("three")),
        ],
    )
    .unwrap()
}

/// Nine components:
///
/// ```text
///            indicator
///                |
///            c1 (and)
///           /        \
///       c2 (or)     c5 (or)
///       /    \      /    \
///     c3     c4    c6    c7
///          (and)
///          /   \
///        c8    c9
/// ```
fn canonical() -> SystemGraph {
    let logic = [
        ("c1", Logic::And),
        ("c2", Logic::Or),
        ("c3", Logic::And),
        ("c4", Logic::And),
        ("c5", Logic::Or),
        ("c6", Logic::And),
        ("c7", Logic::And),
        ("c8", Logic::And),
        ("c9", Logic::And),
    ];
    let mut nodes = vec![Node::indicator("indicator", Logic::And).unwrap()];
    nodes.extend(logic.iter().map(|(n, l)| Node::component(n, *l).unwrap()));

    let edges = [
        ("c1", "indicator"),
        ("c2", "c1"),
        ("c5", "c1"),
        ("c3", "c2"),
        ("c4", "c2"),
        ("c6", "c5"),
        ("c7", "c5"),
        ("c8", "c4"),
        ("c9", "c4"),
    ]
    .iter()
    .map(|(s, d)| Edge::new(id(s), id(d)))
    .collect::<Vec<_>>();

    SystemGraph::new(nodes, edges).unwrap()
}

/// Two components; c1 has an active supplier s1 and an alternative s2,
/// both owned by `owner`.
fn supplied() -> SystemGraph {
    SystemGraph::new(
        vec![
            Node::indicator("indicator", Logic::Or).unwrap(),
            Node::component("c1", Logic::And).unwrap(),
            Node::component("c2", Logic::And).unwrap(),
            Node::supplier("owner").unwrap(),
            Node::supplier("s1").unwrap(),
            Node::supplier("s2").unwrap(),
            Node::supplier("s3").unwrap(),
        ],
        vec![
            Edge::new(id("c1"), id("indicator")),
            Edge::new(id("c2"), id("indicator")),
            Edge::new(id("s1"), id("c1")),
            Edge::potential(id("s2"), id("c1")),
            Edge::new(id("s3"), id("c2")),
            Edge::new(id("owner"), id("s1")),
            Edge::new(id("owner"), id("s2")),
        ],
    )
    .unwrap()
}

fn supplied_data() -> RiskData {
    RiskData::new()
        .with_node_risk("c1", 0.1)
        .with_node_risk("c2", 0.1)
        .with_node_risk("owner", 0.01)
        .with_node_risk("s1", 0.2)
        .with_node_risk("s2", 0.05)
        .with_node_risk("s3", 0.1)
        .with_attribute("s1", "domestic", false)
        .with_attribute("s2", "domestic", true)
        .with_attribute("s3", "domestic", true)
}

// ─────────────────────────────────────────────────────────────────────────────
// AND / OR FIXTURES
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_and_fixture() {
    init_tracing();
    let sg = three_node(Logic::And);

    let cutsets = find_minimal_cutsets(&sg, true, &CutsetConfig::default()).unwrap();
    assert_eq!(cutsets, vec![cs(&["three"]), cs(&["one", "two"])]);

    let bdd = SystemBdd::build(&sg, &BddConfig::default()).unwrap();
    let risk = |one: f64, two: f64, three: f64| {
        let p: ProbabilityVector = [("indicator", 0.0), ("one", one), ("two", two), ("three", three)]
            .iter()
            .map(|(k, v)| (id(k), *v))
            .collect();
        (
            bdd.risk(&p).unwrap(),
            probability_any_cutset(&cutsets, &p).unwrap(),
        )
    };

    assert_eq!(risk(0.0, 0.0, 0.0), (0.0, 0.0));
    let (exact, approx) = risk(0.0, 0.0, 1.0);
    assert!((exact - 1.0).abs() < 1e-12 && (approx - 1.0).abs() < 1e-12);
    let (exact, approx) = risk(0.5, 0.5, 0.0);
    assert!((exact - 0.25).abs() < 1e-12 && (approx - 0.25).abs() < 1e-12);
}

#[test]
fn test_or_fixture() {
    let sg = three_node(Logic::Or);
    let cutsets = find_minimal_cutsets(&sg, true, &CutsetConfig::default()).unwrap();
    assert_eq!(cutsets, vec![cs(&["one"]), cs(&["three"]), cs(&["two"])]);
    assert_eq!(cutsets, brute_force_cutsets(&sg).unwrap());
}

// ─────────────────────────────────────────────────────────────────────────────
// CANONICAL FIXTURE
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_canonical_cutsets() {
    init_tracing();
    let sg = canonical();
    let cutsets = find_minimal_cutsets(&sg, true, &CutsetConfig::default()).unwrap();

    let expected = vec![
        cs(&["c1"]),
        cs(&["c2", "c5"]),
        cs(&["c2", "c6"]),
        cs(&["c2", "c7"]),
        cs(&["c3", "c5"]),
        cs(&["c3", "c6"]),
        cs(&["c3", "c7"]),
        cs(&["c4", "c5"]),
        cs(&["c4", "c6"]),
        cs(&["c4", "c7"]),
        cs(&["c5", "c8", "c9"]),
        cs(&["c6", "c8", "c9"]),
        cs(&["c7", "c8", "c9"]),
    ];
    assert_eq!(cutsets.len(), 13);
    assert_eq!(cutsets, expected);
    assert_eq!(cutsets, brute_force_cutsets(&sg).unwrap());
}

#[test]
fn test_canonical_risk() {
    let sg = canonical();
    let p = uniform(&sg, 0.5);

    let approx = risk_by_cutsets(&sg, &p, true, &CutsetConfig::default()).unwrap();
    assert!((approx - 0.9748495630919933).abs() < 1e-9);

    // Cutsets share members, so the product formula overestimates.
    let exact = risk_by_bdd(&sg, &p, &BddConfig::default()).unwrap();
    assert!((exact - 0.896484375).abs() < 1e-12);
    assert!(approx >= exact);
}

#[test]
fn test_canonical_bdd_matches_cutsets_as_boolean_function() {
    let sg = canonical();
    let bdd = SystemBdd::build(&sg, &BddConfig::default()).unwrap();
    let cutsets = find_minimal_cutsets(&sg, true, &CutsetConfig::default()).unwrap();
    let components: Vec<NodeId> = sg.components().cloned().collect();

    for mask in 0u32..(1 << components.len()) {
        let failed: BTreeSet<NodeId> = components
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, n)| n.clone())
            .collect();
        let by_cutsets = cutsets.iter().any(|c| c.is_subset(&failed));
        assert_eq!(bdd.evaluate(&failed), by_cutsets, "failed = {:?}", failed);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DIAMOND FIXTURE
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_diamond_exact_and_oracle() {
    let sg = SystemGraph::new(
        vec![
            Node::indicator("indicator", Logic::Or).unwrap(),
            Node::component("top", Logic::And).unwrap(),
            Node::component("left", Logic::Or).unwrap(),
            Node::component("right", Logic::Or).unwrap(),
            Node::component("shared", Logic::And).unwrap(),
        ],
        vec![
            Edge::new(id("top"), id("indicator")),
            Edge::new(id("left"), id("top")),
            Edge::new(id("right"), id("top")),
            Edge::new(id("shared"), id("left")),
            Edge::new(id("shared"), id("right")),
        ],
    )
    .unwrap();

    let cutsets = find_minimal_cutsets(&sg, true, &CutsetConfig::default()).unwrap();
    assert_eq!(cutsets, vec![cs(&["shared"]), cs(&["top"]), cs(&["left", "right"])]);
    assert_eq!(cutsets, brute_force_cutsets(&sg).unwrap());

    // top | shared | left & right, with shared counted once
    let p = uniform(&sg, 0.5);
    let exact = risk_by_bdd(&sg, &p, &BddConfig::default()).unwrap();
    assert!((exact - (1.0 - 0.5 * 0.5 * 0.75)).abs() < 1e-12);
}

// ─────────────────────────────────────────────────────────────────────────────
// SUPPLIER FIXTURE
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_supplier_cutsets_and_groups() {
    let sg = supplied();

    let cutsets = find_minimal_cutsets(&sg, false, &CutsetConfig::default()).unwrap();
    assert_eq!(
        cutsets,
        vec![cs(&["c1"]), cs(&["c2"]), cs(&["owner"]), cs(&["s1"]), cs(&["s3"])]
    );

    let groups = sg.supplier_groups();
    assert_eq!(groups[&id("owner")], [id("owner"), id("s1"), id("s2")].into_iter().collect());
    assert_eq!(groups[&id("s3")], [id("s3")].into_iter().collect());
}

#[test]
fn test_supplier_swap_changes_risk() {
    let sg = supplied();
    let data = supplied_data();

    let p = provide_direct_from_data(&sg, &data, true).unwrap();
    let before = risk_by_bdd(&sg, &p, &BddConfig::default()).unwrap();
    let expected = 1.0 - 0.9 * 0.9 * 0.8 * 0.99 * 0.9;
    assert!((before - expected).abs() < 1e-12);

    let swapped = sg.with_suppliers([(id("s2"), id("c1"))]).unwrap();
    let p = provide_direct_from_data(&swapped, &data, true).unwrap();
    let after = risk_by_bdd(&swapped, &p, &BddConfig::default()).unwrap();
    let expected = 1.0 - 0.9 * 0.9 * 0.95 * 0.99 * 0.9;
    assert!((after - expected).abs() < 1e-12);
    assert!(after < before);

    // independent singleton cutsets: the approximation is exact here
    let approx = risk_by_cutsets(&swapped, &p, false, &CutsetConfig::default()).unwrap();
    assert!((approx - after).abs() < 1e-12);
}

// ─────────────────────────────────────────────────────────────────────────────
// IMPORTANCE TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_disconnected_node_has_zero_importance() {
    let base = three_node(Logic::And);
    let mut nodes: Vec<Node> = base.nodes().cloned().collect();
    nodes.push(Node::component("island", Logic::Or).unwrap());
    let sg = SystemGraph::new(nodes, base.edges().to_vec()).unwrap();

    let bdd = SystemBdd::build(&sg, &BddConfig::default()).unwrap();
    let imps = supply_risk_kernel::birnbaum_structural_importance(&sg, &bdd).unwrap();
    assert_eq!(imps[&id("island")], 0.0);
    assert!(imps[&id("three")] > 0.0);

    let cutsets = supply_risk_kernel::CutsetRisk::from_graph(&sg, true, &CutsetConfig::default()).unwrap();
    let imps = supply_risk_kernel::birnbaum_structural_importance(&sg, &cutsets).unwrap();
    assert_eq!(imps[&id("island")], 0.0);
}

#[test]
fn test_select_by_supplier_attribute() {
    let sg = supplied();
    let data = supplied_data();
    let analyzer = RiskAnalyzer::new(Arc::new(InMemoryRepository::new()), AnalysisConfig::default());
    let p = provide_direct_from_data(&sg, &data, false).unwrap();

    let selection = Selection::SupplierAttribute {
        key: "domestic".to_string(),
        value: true,
    };
    let (label, value) = analyzer.select_importance(&sg, &p, &selection, Some(&data)).unwrap();
    assert_eq!(label, "birnbaum_importances_select_domestic_true");

    // s2 is inert (potential), so only s3 matters: forcing it to 1 fails the
    // indicator, forcing it to 0 leaves the rest of the system.
    let rest = 1.0 - 0.9 * 0.9 * 0.8 * 0.99;
    assert!((value - (1.0 - rest)).abs() < 1e-12);
}

// ─────────────────────────────────────────────────────────────────────────────
// ANALYZER / REPOSITORY TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_analyzer_reuses_artifacts_across_equal_graphs() {
    init_tracing();
    let repo = Arc::new(InMemoryRepository::new());
    let analyzer = RiskAnalyzer::new(Arc::clone(&repo), AnalysisConfig::default());

    let a = canonical();
    // Same structure rebuilt from its exchange form
    let b = SystemGraph::from_json_str(&a.to_json_string()).unwrap();
    assert_eq!(a.graph_id(), b.graph_id());

    let first = analyzer.cutsets(&a).unwrap();
    let second = analyzer.cutsets(&b).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let p = uniform(&a, 0.5);
    let exact = analyzer.exact_risk(&a, &p).unwrap();
    assert!((exact - 0.896484375).abs() < 1e-12);
    assert_eq!(analyzer.exact_risk(&b, &p).unwrap(), exact);

    let stats = repo.stats();
    assert!(stats.hits >= 2);
}

#[test]
fn test_repository_delete_forces_recompute() {
    let repo = Arc::new(InMemoryRepository::new());
    let analyzer = RiskAnalyzer::new(Arc::clone(&repo), AnalysisConfig::default());
    let sg = three_node(Logic::Or);

    let first = analyzer.bdd(&sg).unwrap();
    let key = supply_risk_kernel::ArtifactKey::new(&sg, supply_risk_kernel::ArtifactKind::Bdd)
        .with_qualifier(analyzer.config().params_hash());
    assert!(repo.delete(&key).is_some());
    assert!(repo.lookup(&key).is_err());

    let second = analyzer.bdd(&sg).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    let p = provide_unknown_data(&sg);
    assert_eq!(first.risk(&p).unwrap(), RiskModel::risk(second.as_ref(), &p).unwrap());
}

// ─────────────────────────────────────────────────────────────────────────────
// EXCHANGE FORMAT TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_exchange_document_parsing() {
    let json = r#"{
        "nodes": {
            "indicator": {"logic": {"component": "and"}, "tags": ["indicator"]},
            "one": {"logic": {"component": "and"}, "tags": ["component"]},
            "two": {"logic": {"component": "and"}, "tags": ["component"]},
            "three": {"logic": {"component": "and"}, "tags": ["component"]},
            "vendor": {"logic": {}, "tags": ["supplier"]},
            "spare": {"logic": {}, "tags": ["supplier", "potential"]}
        },
        "edges": [
            {"src": "three", "dst": "indicator", "tags": []},
            {"src": "one", "dst": "three", "tags": []},
            {"src": "two", "dst": "three", "tags": []},
            {"src": "vendor", "dst": "one", "tags": []},
            {"src": "spare", "dst": "one", "tags": ["potential"]}
        ]
    }"#;

    let sg = SystemGraph::from_json_str(json).unwrap();
    assert_eq!(sg.num_nodes(), 6);
    assert_eq!(sg.selected_supplier("one"), Some(&id("vendor")));

    let round_trip: SystemGraph = serde_json::from_str(&serde_json::to_string(&sg).unwrap()).unwrap();
    assert_eq!(round_trip.graph_id(), sg.graph_id());
}

#[test]
fn test_nasa_style_function() {
    // T | K2 | S & (S1 | K1 | R)
    let mut m = BddManager::with_order(["t", "k2", "s", "s1", "k1", "r"]);
    let vars: Vec<_> = (0..6).map(|level| m.var(level)).collect();
    let inner = m.or_all([vars[3], vars[4], vars[5]]);
    let branch = m.and(vars[2], inner);
    let f = m.or_all([vars[0], vars[1], branch]);

    let p = [5e-6, 3e-5, 1e-4, 3e-5, 3e-5, 5e-5];
    let inner_p = 1.0 - (1.0 - p[3]) * (1.0 - p[4]) * (1.0 - p[5]);
    let expected = 1.0 - (1.0 - p[0]) * (1.0 - p[1]) * (1.0 - p[2] * inner_p);
    assert!((m.probability(f, &p) - expected).abs() < 1e-15);
}
