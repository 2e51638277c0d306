use changetrace_core::{
    Artifact, ArtifactRegistry, CancellationToken, CoreError, Domain, ImpactPropagator,
    PropagationDirection, RelationshipType, SharedTraceGraph, TraceGraph, TraceLink,
};
use std::collections::BTreeMap;

fn registry(entries: &[(&str, Domain)]) -> ArtifactRegistry {
    let mut registry = ArtifactRegistry::new();
    for (id, domain) in entries {
        registry
            .register(Artifact::new(*id, *domain, format!("{id} title"), "general").unwrap())
            .unwrap();
    }
    registry
}

fn graph(edges: &[(&str, &str)]) -> TraceGraph {
    let mut graph = TraceGraph::new();
    for (source, target) in edges {
        graph
            .add_link(TraceLink::new(*source, *target, RelationshipType::Satisfies))
            .unwrap();
    }
    graph
}

fn cycle() -> (TraceGraph, ArtifactRegistry) {
    (
        graph(&[("REQ-A", "FUNC-B"), ("FUNC-B", "LOG-C"), ("LOG-C", "REQ-A")]),
        registry(&[
            ("REQ-A", Domain::Requirement),
            ("FUNC-B", Domain::Function),
            ("LOG-C", Domain::Logical),
        ]),
    )
}

#[test]
fn default_policy_counts_direct_neighbors_in_both_directions() {
    let graph = graph(&[("MIS-1", "REQ-1"), ("REQ-1", "FUNC-1"), ("FUNC-1", "LOG-1")]);
    let registry = registry(&[
        ("MIS-1", Domain::Mission),
        ("REQ-1", Domain::Requirement),
        ("FUNC-1", Domain::Function),
        ("LOG-1", Domain::Logical),
    ]);

    let report = ImpactPropagator::default()
        .compute(&graph, &registry, "REQ-1", None)
        .unwrap();
    assert_eq!(
        report.counts,
        BTreeMap::from([(Domain::Mission, 1), (Domain::Function, 1)])
    );
}

#[test]
fn repeated_computation_is_identical() {
    let (graph, registry) = cycle();
    let propagator = ImpactPropagator::new(3, PropagationDirection::Both);
    let first = propagator.compute(&graph, &registry, "REQ-A", None).unwrap();
    let second = propagator.compute(&graph, &registry, "REQ-A", None).unwrap();
    assert_eq!(first, second);
}

#[test]
fn three_cycle_counts_each_artifact_once() {
    let (graph, registry) = cycle();
    for direction in [
        PropagationDirection::Both,
        PropagationDirection::Downstream,
        PropagationDirection::Upstream,
    ] {
        let report = ImpactPropagator::new(3, direction)
            .compute(&graph, &registry, "REQ-A", None)
            .unwrap();
        assert_eq!(
            report.counts,
            BTreeMap::from([(Domain::Function, 1), (Domain::Logical, 1)]),
            "direction {direction:?}"
        );
        assert_eq!(report.total(), 2);
    }
}

#[test]
fn downstream_walk_reports_hop_distance() {
    let (graph, registry) = cycle();
    let report = ImpactPropagator::new(3, PropagationDirection::Downstream)
        .compute(&graph, &registry, "REQ-A", None)
        .unwrap();
    let hops: Vec<_> = report
        .affected
        .iter()
        .map(|item| (item.artifact_id.as_str(), item.hops))
        .collect();
    assert_eq!(hops, vec![("FUNC-B", 1), ("LOG-C", 2)]);
}

#[test]
fn direction_limits_which_links_are_followed() {
    let graph = graph(&[("REQ-1", "FUNC-1")]);
    let registry = registry(&[("REQ-1", Domain::Requirement), ("FUNC-1", Domain::Function)]);

    let upstream = ImpactPropagator::new(1, PropagationDirection::Upstream)
        .compute(&graph, &registry, "FUNC-1", None)
        .unwrap();
    assert_eq!(upstream.counts, BTreeMap::from([(Domain::Requirement, 1)]));

    let downstream = ImpactPropagator::new(1, PropagationDirection::Downstream)
        .compute(&graph, &registry, "FUNC-1", None)
        .unwrap();
    assert!(downstream.counts.is_empty());
}

#[test]
fn direct_same_domain_neighbor_is_not_counted() {
    let graph = graph(&[("REQ-1", "REQ-2"), ("REQ-1", "FUNC-1")]);
    let registry = registry(&[
        ("REQ-1", Domain::Requirement),
        ("REQ-2", Domain::Requirement),
        ("FUNC-1", Domain::Function),
    ]);
    let report = ImpactPropagator::default()
        .compute(&graph, &registry, "REQ-1", None)
        .unwrap();
    assert_eq!(report.counts, BTreeMap::from([(Domain::Function, 1)]));
    assert_eq!(report.total(), 1);
}

#[test]
fn same_domain_artifact_counts_once_a_path_routes_back_into_the_domain() {
    // REQ-2 is a direct neighbor and also reachable through FUNC-1.
    let graph = graph(&[("REQ-1", "REQ-2"), ("REQ-1", "FUNC-1"), ("FUNC-1", "REQ-2")]);
    let registry = registry(&[
        ("REQ-1", Domain::Requirement),
        ("REQ-2", Domain::Requirement),
        ("FUNC-1", Domain::Function),
    ]);

    let one_hop = ImpactPropagator::default()
        .compute(&graph, &registry, "REQ-1", None)
        .unwrap();
    assert_eq!(one_hop.counts, BTreeMap::from([(Domain::Function, 1)]));

    let two_hops = ImpactPropagator::new(2, PropagationDirection::Both)
        .compute(&graph, &registry, "REQ-1", None)
        .unwrap();
    assert_eq!(
        two_hops.counts,
        BTreeMap::from([(Domain::Requirement, 1), (Domain::Function, 1)])
    );
    let hops: Vec<_> = two_hops
        .affected
        .iter()
        .map(|item| (item.artifact_id.as_str(), item.hops))
        .collect();
    assert_eq!(hops, vec![("FUNC-1", 1), ("REQ-2", 2)]);
}

#[test]
fn origin_domain_artifacts_count_after_leaving_the_domain() {
    let graph = graph(&[("REQ-1", "FUNC-1"), ("FUNC-1", "REQ-2")]);
    let registry = registry(&[
        ("REQ-1", Domain::Requirement),
        ("FUNC-1", Domain::Function),
        ("REQ-2", Domain::Requirement),
    ]);
    let report = ImpactPropagator::new(2, PropagationDirection::Both)
        .compute(&graph, &registry, "REQ-1", None)
        .unwrap();
    assert_eq!(
        report.counts,
        BTreeMap::from([(Domain::Requirement, 1), (Domain::Function, 1)])
    );
}

#[test]
fn unlinked_origin_has_empty_impact_but_unknown_origin_fails() {
    let graph = graph(&[("REQ-1", "FUNC-1")]);
    let registry = registry(&[
        ("REQ-1", Domain::Requirement),
        ("FUNC-1", Domain::Function),
        ("BOM-1", Domain::Bom),
    ]);
    let propagator = ImpactPropagator::default();

    let report = propagator.compute(&graph, &registry, "BOM-1", None).unwrap();
    assert!(report.counts.is_empty());

    let err = propagator.compute(&graph, &registry, "BOM-404", None).unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[test]
fn cancellation_fails_without_partial_result() {
    let (graph, registry) = cycle();
    let token = CancellationToken::new();
    let propagator = ImpactPropagator::new(3, PropagationDirection::Both);

    assert!(propagator
        .compute(&graph, &registry, "REQ-A", Some(&token))
        .is_ok());

    token.cancel();
    let err = propagator
        .compute(&graph, &registry, "REQ-A", Some(&token))
        .unwrap_err();
    assert!(matches!(err, CoreError::Cancelled { .. }));
    assert_eq!(err.code(), "cancelled");
}

#[test]
fn snapshot_is_isolated_from_later_mutations() {
    let shared = SharedTraceGraph::new(graph(&[("REQ-1", "FUNC-1")]));
    let registry = registry(&[
        ("REQ-1", Domain::Requirement),
        ("FUNC-1", Domain::Function),
        ("LOG-1", Domain::Logical),
    ]);

    let before = shared.snapshot();
    let allocated = TraceLink::new("REQ-1", "LOG-1", RelationshipType::Allocated);
    shared.mutate(|graph| graph.add_link(allocated)).unwrap();

    let propagator = ImpactPropagator::default();
    let old = propagator.compute(&before, &registry, "REQ-1", None).unwrap();
    let new = propagator
        .compute(&shared.snapshot(), &registry, "REQ-1", None)
        .unwrap();
    assert_eq!(old.total(), 1);
    assert_eq!(new.total(), 2);
}
