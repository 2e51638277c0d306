//! Verification coverage over the trace graph.
//!
//! # Responsibility
//! - Compute per-artifact coverage from incident `Verifies` links.
//! - Cache results per artifact until a touching link is added or removed.
//!
//! # Invariants
//! - `0 <= coverage_percent <= 100`; no links yields an explicit `0`.
//! - A cache entry is valid only for the endpoint revision it was computed
//!   at. No time-based expiry.

use crate::model::domain::Domain;
use crate::model::trace::VerificationStatus;
use crate::repo::trace_graph::TraceGraph;
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Rollup of an artifact's verification links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VerificationState {
    /// Every verification link is verified.
    FullyVerified,
    /// Some, but not all, verification links are verified.
    PartiallyVerified,
    /// At least one verification link exists and none is verified.
    NotVerified,
    /// No verification link exists.
    Undefined,
}

impl VerificationState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullyVerified => "fullyVerified",
            Self::PartiallyVerified => "partiallyVerified",
            Self::NotVerified => "notVerified",
            Self::Undefined => "undefined",
        }
    }
}

/// Coverage of one artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    pub artifact_id: String,
    /// Incident `Verifies` links, either direction.
    pub total_links: usize,
    pub verified_links: usize,
    pub coverage_percent: f64,
    pub state: VerificationState,
}

impl CoverageReport {
    /// Pure coverage computation against one graph snapshot.
    pub fn compute(graph: &TraceGraph, artifact_id: &str) -> Self {
        let relevant: Vec<_> = graph
            .links_of(artifact_id)
            .into_iter()
            .filter(|link| link.is_verification())
            .collect();
        let total_links = relevant.len();
        let verified_links = relevant
            .iter()
            .filter(|link| link.verification_status == Some(VerificationStatus::Verified))
            .count();

        let coverage_percent = if total_links == 0 {
            0.0
        } else {
            100.0 * verified_links as f64 / total_links as f64
        };
        let state = match (total_links, verified_links) {
            (0, _) => VerificationState::Undefined,
            (_, 0) => VerificationState::NotVerified,
            (total, verified) if total == verified => VerificationState::FullyVerified,
            _ => VerificationState::PartiallyVerified,
        };

        Self {
            artifact_id: artifact_id.to_string(),
            total_links,
            verified_links,
            coverage_percent,
            state,
        }
    }
}

/// Coverage aggregated over the artifacts of one domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageSummary {
    pub domain: Domain,
    pub artifact_count: usize,
    pub by_state: BTreeMap<VerificationState, usize>,
    /// Mean coverage over artifacts that have at least one verification
    /// link. `None` when no artifact has one.
    pub mean_coverage_percent: Option<f64>,
}

#[derive(Debug, Clone)]
struct CachedCoverage {
    revision: u64,
    report: CoverageReport,
}

/// Memoizing coverage calculator.
#[derive(Debug, Default)]
pub struct CoverageCalculator {
    cache: Mutex<HashMap<String, CachedCoverage>>,
}

impl CoverageCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns coverage for one artifact, reusing a cached report when no
    /// link touching the artifact changed since it was computed.
    pub fn get(&self, graph: &TraceGraph, artifact_id: &str) -> CoverageReport {
        let revision = graph.endpoint_revision(artifact_id);
        let mut cache = self.lock();
        if let Some(cached) = cache.get(artifact_id) {
            if cached.revision == revision {
                return cached.report.clone();
            }
        }

        let report = CoverageReport::compute(graph, artifact_id);
        debug!(
            "event=coverage_compute module=coverage status=ok artifact_id={} links={} state={}",
            artifact_id,
            report.total_links,
            report.state.as_str()
        );
        cache.insert(
            artifact_id.to_string(),
            CachedCoverage {
                revision,
                report: report.clone(),
            },
        );
        report
    }

    /// Aggregates coverage for `artifact_ids`, all belonging to `domain`.
    pub fn domain_summary<'a, I>(
        &self,
        graph: &TraceGraph,
        domain: Domain,
        artifact_ids: I,
    ) -> CoverageSummary
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut summary = CoverageSummary {
            domain,
            artifact_count: 0,
            by_state: BTreeMap::new(),
            mean_coverage_percent: None,
        };
        let mut defined = 0usize;
        let mut percent_sum = 0.0;

        for artifact_id in artifact_ids {
            let report = self.get(graph, artifact_id);
            summary.artifact_count += 1;
            *summary.by_state.entry(report.state).or_default() += 1;
            if report.state != VerificationState::Undefined {
                defined += 1;
                percent_sum += report.coverage_percent;
            }
        }

        if defined > 0 {
            summary.mean_coverage_percent = Some(percent_sum / defined as f64);
        }
        summary
    }

    /// Drops the cached report of one artifact.
    pub fn invalidate(&self, artifact_id: &str) {
        self.lock().remove(artifact_id);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn cached_len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_cached(&self, artifact_id: &str) -> bool {
        self.lock().contains_key(artifact_id)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CachedCoverage>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{CoverageCalculator, CoverageReport, VerificationState};
    use crate::model::trace::{RelationshipType, TraceLink, VerificationStatus};
    use crate::repo::trace_graph::TraceGraph;

    fn verifies(test: &str, requirement: &str, status: VerificationStatus) -> TraceLink {
        TraceLink::new(test, requirement, RelationshipType::Verifies).with_verification(status, 50)
    }

    #[test]
    fn non_verification_links_are_ignored() {
        let mut graph = TraceGraph::new();
        graph
            .add_link(TraceLink::new("REQ-1", "FUNC-1", RelationshipType::Satisfies))
            .unwrap();
        let report = CoverageReport::compute(&graph, "REQ-1");
        assert_eq!(report.total_links, 0);
        assert_eq!(report.coverage_percent, 0.0);
        assert_eq!(report.state, VerificationState::Undefined);
    }

    #[test]
    fn partially_verified_links_do_not_count_as_verified() {
        let mut graph = TraceGraph::new();
        graph
            .add_link(verifies("TST-1", "REQ-1", VerificationStatus::Verified))
            .unwrap();
        graph
            .add_link(verifies("TST-2", "REQ-1", VerificationStatus::PartiallyVerified))
            .unwrap();
        let report = CoverageReport::compute(&graph, "REQ-1");
        assert_eq!(report.verified_links, 1);
        assert_eq!(report.coverage_percent, 50.0);
        assert_eq!(report.state, VerificationState::PartiallyVerified);
    }

    #[test]
    fn cache_is_reused_until_a_touching_link_changes() {
        let mut graph = TraceGraph::new();
        graph
            .add_link(verifies("TST-1", "REQ-1", VerificationStatus::Verified))
            .unwrap();
        graph
            .add_link(verifies("TST-2", "REQ-2", VerificationStatus::Verified))
            .unwrap();
        let calculator = CoverageCalculator::new();
        let first = calculator.get(&graph, "REQ-1");
        assert_eq!(first.state, VerificationState::FullyVerified);

        graph
            .add_link(verifies("TST-3", "REQ-2", VerificationStatus::NotVerified))
            .unwrap();
        assert_eq!(calculator.get(&graph, "REQ-1"), first);

        graph
            .add_link(verifies("TST-3", "REQ-1", VerificationStatus::NotVerified))
            .unwrap();
        let second = calculator.get(&graph, "REQ-1");
        assert_eq!(second.total_links, 2);
        assert_eq!(second.state, VerificationState::PartiallyVerified);
    }
}
