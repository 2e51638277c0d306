//! Change impact propagation over the trace graph.
//!
//! # Responsibility
//! - Count distinct artifacts reachable from a changed artifact, per domain.
//!
//! # Invariants
//! - Traversal is breadth-first and bounded by `max_hops`.
//! - The origin is never counted or re-entered; each artifact is counted
//!   at most once no matter how many paths or cycles reach it.
//! - Artifacts in the origin's own domain count only when reached on a
//!   path that passed through another domain first.
//! - Results are a pure function of the graph snapshot.
//! - Cancellation is checked before each frontier expansion and yields no
//!   partial result.

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult, EntityKind};
use crate::model::change::ImpactCounts;
use crate::model::domain::Domain;
use crate::repo::artifact_registry::ArtifactLookup;
use crate::repo::trace_graph::{PropagationDirection, TraceGraph};
use log::debug;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation signal shared between a caller and a running
/// propagation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// One artifact reached by propagation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedArtifact {
    pub artifact_id: String,
    pub domain: Domain,
    /// Hop distance from the origin (`1` = direct neighbor).
    pub hops: u32,
}

/// Result of one propagation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactReport {
    pub origin_id: String,
    pub max_hops: u32,
    pub direction: PropagationDirection,
    /// Distinct affected artifacts per domain.
    pub counts: ImpactCounts,
    /// Affected artifacts ordered by hop distance, then id.
    pub affected: Vec<AffectedArtifact>,
}

impl ImpactReport {
    pub fn total(&self) -> usize {
        self.affected.len()
    }
}

/// Bounded breadth-first impact propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImpactPropagator {
    max_hops: u32,
    direction: PropagationDirection,
}

impl Default for ImpactPropagator {
    fn default() -> Self {
        Self {
            max_hops: 1,
            direction: PropagationDirection::Both,
        }
    }
}

impl ImpactPropagator {
    pub fn new(max_hops: u32, direction: PropagationDirection) -> Self {
        Self {
            max_hops,
            direction,
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(config.max_propagation_hops, config.propagation_direction)
    }

    /// Same policy with a different hop bound.
    pub fn with_max_hops(self, max_hops: u32) -> Self {
        Self { max_hops, ..self }
    }

    pub fn max_hops(&self) -> u32 {
        self.max_hops
    }

    pub fn direction(&self) -> PropagationDirection {
        self.direction
    }

    /// Computes impact counts for a change to `origin_id`.
    ///
    /// Same-domain artifacts reached directly are traversed but not counted.
    ///
    /// # Errors
    /// - `NotFound` when the origin, or any reached artifact, is unknown to
    ///   `artifacts`.
    /// - `Cancelled` when `cancel` fires before a frontier expansion.
    pub fn compute<L>(
        &self,
        graph: &TraceGraph,
        artifacts: &L,
        origin_id: &str,
        cancel: Option<&CancellationToken>,
    ) -> CoreResult<ImpactReport>
    where
        L: ArtifactLookup + ?Sized,
    {
        let Some(origin_domain) = artifacts.domain_of(origin_id) else {
            return Err(CoreError::not_found(EntityKind::Artifact, origin_id));
        };
        let domain_at = |index: usize| {
            let artifact_id = graph.node_id(index);
            artifacts
                .domain_of(artifact_id)
                .ok_or_else(|| CoreError::not_found(EntityKind::Artifact, artifact_id))
        };

        let mut report = ImpactReport {
            origin_id: origin_id.to_string(),
            max_hops: self.max_hops,
            direction: self.direction,
            counts: ImpactCounts::new(),
            affected: Vec::new(),
        };
        let Some(origin) = graph.index_of(origin_id) else {
            return Ok(report);
        };

        // Visit state per node: [stayed in origin domain, left it].
        let mut visited = vec![[false; 2]; graph.node_count()];
        visited[origin] = [true, true];
        let mut frontier = vec![(origin, false)];

        for hop in 1..=self.max_hops {
            if frontier.is_empty() {
                break;
            }
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                debug!(
                    "event=impact_compute module=impact status=cancelled origin={} hops_completed={}",
                    origin_id,
                    hop - 1
                );
                return Err(CoreError::Cancelled {
                    artifact_id: origin_id.to_string(),
                    hops_completed: hop - 1,
                });
            }

            let mut next = Vec::new();
            for &(node, left_origin_domain) in &frontier {
                for neighbor in graph.neighbors(node, self.direction) {
                    let domain = domain_at(neighbor)?;
                    let left = left_origin_domain || domain != origin_domain;
                    if visited[neighbor][1] || visited[neighbor][usize::from(left)] {
                        continue;
                    }
                    visited[neighbor][usize::from(left)] = true;
                    next.push((neighbor, domain, left));
                }
            }
            next.sort_by(|a, b| {
                graph
                    .node_id(a.0)
                    .cmp(graph.node_id(b.0))
                    .then(a.2.cmp(&b.2))
            });

            // A node enters the "left" state at most once, so it counts once.
            for &(index, domain, left) in &next {
                if !left {
                    continue;
                }
                *report.counts.entry(domain).or_default() += 1;
                report.affected.push(AffectedArtifact {
                    artifact_id: graph.node_id(index).to_string(),
                    domain,
                    hops: hop,
                });
            }
            frontier = next
                .into_iter()
                .map(|(index, _, left)| (index, left))
                .collect();
        }

        debug!(
            "event=impact_compute module=impact status=ok origin={} max_hops={} affected={}",
            origin_id,
            self.max_hops,
            report.total()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::{CancellationToken, ImpactPropagator};
    use crate::error::CoreError;
    use crate::model::domain::Domain;
    use crate::model::trace::{RelationshipType, TraceLink};
    use crate::repo::artifact_registry::ArtifactLookup;
    use crate::repo::trace_graph::{PropagationDirection, TraceGraph};
    use std::collections::HashMap;

    struct Domains(HashMap<&'static str, Domain>);

    impl ArtifactLookup for Domains {
        fn domain_of(&self, artifact_id: &str) -> Option<Domain> {
            self.0.get(artifact_id).copied()
        }
    }

    fn chain() -> (TraceGraph, Domains) {
        let mut graph = TraceGraph::new();
        for (source, target) in [("MIS-1", "REQ-1"), ("REQ-1", "FUNC-1"), ("FUNC-1", "LOG-1")] {
            graph
                .add_link(TraceLink::new(source, target, RelationshipType::Satisfies))
                .unwrap();
        }
        let domains = Domains(HashMap::from([
            ("MIS-1", Domain::Mission),
            ("REQ-1", Domain::Requirement),
            ("FUNC-1", Domain::Function),
            ("LOG-1", Domain::Logical),
        ]));
        (graph, domains)
    }

    #[test]
    fn affected_list_is_ordered_by_hop_then_id() {
        let (graph, domains) = chain();
        let report = ImpactPropagator::new(3, PropagationDirection::Both)
            .compute(&graph, &domains, "REQ-1", None)
            .unwrap();
        let order: Vec<_> = report
            .affected
            .iter()
            .map(|item| (item.artifact_id.as_str(), item.hops))
            .collect();
        assert_eq!(order, vec![("FUNC-1", 1), ("MIS-1", 1), ("LOG-1", 2)]);
    }

    #[test]
    fn zero_hops_reaches_nothing() {
        let (graph, domains) = chain();
        let report = ImpactPropagator::default()
            .with_max_hops(0)
            .compute(&graph, &domains, "REQ-1", None)
            .unwrap();
        assert!(report.counts.is_empty());
    }

    #[test]
    fn cancelled_token_aborts_before_first_expansion() {
        let (graph, domains) = chain();
        let token = CancellationToken::new();
        token.cancel();
        let err = ImpactPropagator::default()
            .compute(&graph, &domains, "REQ-1", Some(&token))
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Cancelled {
                hops_completed: 0,
                ..
            }
        ));
    }

    #[test]
    fn same_domain_neighbor_is_traversed_but_not_counted() {
        let mut graph = TraceGraph::new();
        for (source, target) in [("REQ-1", "REQ-2"), ("REQ-2", "FUNC-2")] {
            graph
                .add_link(TraceLink::new(source, target, RelationshipType::Satisfies))
                .unwrap();
        }
        let domains = Domains(HashMap::from([
            ("REQ-1", Domain::Requirement),
            ("REQ-2", Domain::Requirement),
            ("FUNC-2", Domain::Function),
        ]));

        let report = ImpactPropagator::new(2, PropagationDirection::Both)
            .compute(&graph, &domains, "REQ-1", None)
            .unwrap();
        let order: Vec<_> = report
            .affected
            .iter()
            .map(|item| (item.artifact_id.as_str(), item.hops))
            .collect();
        assert_eq!(order, vec![("FUNC-2", 2)]);
    }
}
