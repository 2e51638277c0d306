//! Directed trace graph over artifact ids.
//!
//! # Responsibility
//! - Store validated trace links in an index arena with adjacency sets.
//! - Provide snapshot isolation for analyses via `SharedTraceGraph`.
//!
//! # Invariants
//! - At most one link per ordered `(source, target)` pair.
//! - `RelationshipType::None` is never stored.
//! - Every add/remove stamps both endpoints with a fresh, process-wide
//!   unique revision; an endpoint's revision changes iff its link set did.

use crate::error::{CoreError, CoreResult, EntityKind};
use crate::model::trace::TraceLink;
use crate::repo::{read_lock, write_lock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

/// Which link directions a traversal follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropagationDirection {
    /// Follow links in both directions.
    #[default]
    Both,
    /// Follow `source -> target` only.
    Downstream,
    /// Follow `target -> source` only.
    Upstream,
}

/// Arena-backed trace graph.
#[derive(Debug, Clone, Default)]
pub struct TraceGraph {
    nodes: Vec<String>,
    node_index: HashMap<String, usize>,
    outgoing: Vec<BTreeSet<usize>>,
    incoming: Vec<BTreeSet<usize>>,
    revisions: Vec<u64>,
    links: BTreeMap<(usize, usize), TraceLink>,
}

impl TraceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one link.
    ///
    /// # Errors
    /// - `Validation` when link invariants fail.
    /// - `DuplicateId` when the ordered pair is already linked.
    pub fn add_link(&mut self, link: TraceLink) -> CoreResult<()> {
        link.validate()?;
        if self.link(&link.source_id, &link.target_id).is_some() {
            return Err(CoreError::duplicate(EntityKind::TraceLink, link.key()));
        }

        let source = self.intern(&link.source_id);
        let target = self.intern(&link.target_id);
        self.outgoing[source].insert(target);
        self.incoming[target].insert(source);
        self.links.insert((source, target), link);
        self.stamp(source, target);
        Ok(())
    }

    /// Removes the link of one ordered pair and returns it.
    pub fn remove_link(&mut self, source_id: &str, target_id: &str) -> CoreResult<TraceLink> {
        let missing = || {
            CoreError::not_found(EntityKind::TraceLink, format!("{source_id}->{target_id}"))
        };
        let source = self.index_of(source_id).ok_or_else(missing)?;
        let target = self.index_of(target_id).ok_or_else(missing)?;
        let link = self.links.remove(&(source, target)).ok_or_else(missing)?;

        self.outgoing[source].remove(&target);
        self.incoming[target].remove(&source);
        self.stamp(source, target);
        Ok(link)
    }

    pub fn link(&self, source_id: &str, target_id: &str) -> Option<&TraceLink> {
        let source = self.index_of(source_id)?;
        let target = self.index_of(target_id)?;
        self.links.get(&(source, target))
    }

    /// Links where `artifact_id` is source or target: outgoing first, then
    /// incoming, each in neighbor arena order.
    pub fn links_of(&self, artifact_id: &str) -> Vec<&TraceLink> {
        let Some(index) = self.index_of(artifact_id) else {
            return Vec::new();
        };
        let outgoing = self.outgoing[index]
            .iter()
            .filter_map(|target| self.links.get(&(index, *target)));
        let incoming = self.incoming[index]
            .iter()
            .filter_map(|source| self.links.get(&(*source, index)));
        outgoing.chain(incoming).collect()
    }

    /// All stored links.
    pub fn links(&self) -> impl Iterator<Item = &TraceLink> {
        self.links.values()
    }

    /// Revision stamp of the last link mutation touching `artifact_id`.
    ///
    /// `0` when no link ever touched it.
    pub fn endpoint_revision(&self, artifact_id: &str) -> u64 {
        self.index_of(artifact_id)
            .map_or(0, |index| self.revisions[index])
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Number of artifact ids that have ever been a link endpoint.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn index_of(&self, artifact_id: &str) -> Option<usize> {
        self.node_index.get(artifact_id).copied()
    }

    pub(crate) fn node_id(&self, index: usize) -> &str {
        &self.nodes[index]
    }

    /// Neighbor indexes of one node in ascending arena order.
    pub(crate) fn neighbors(
        &self,
        index: usize,
        direction: PropagationDirection,
    ) -> impl Iterator<Item = usize> + '_ {
        let downstream = matches!(
            direction,
            PropagationDirection::Both | PropagationDirection::Downstream
        );
        let upstream = matches!(
            direction,
            PropagationDirection::Both | PropagationDirection::Upstream
        );
        let outgoing = self.outgoing[index]
            .iter()
            .copied()
            .filter(move |_| downstream);
        let incoming = self.incoming[index]
            .iter()
            .copied()
            .filter(move |_| upstream);
        outgoing.chain(incoming)
    }

    fn intern(&mut self, artifact_id: &str) -> usize {
        if let Some(index) = self.index_of(artifact_id) {
            return index;
        }
        let index = self.nodes.len();
        self.nodes.push(artifact_id.to_string());
        self.node_index.insert(artifact_id.to_string(), index);
        self.outgoing.push(BTreeSet::new());
        self.incoming.push(BTreeSet::new());
        self.revisions.push(0);
        index
    }

    fn stamp(&mut self, source: usize, target: usize) {
        let revision = next_revision();
        self.revisions[source] = revision;
        self.revisions[target] = revision;
    }
}

/// Copy-on-write holder giving analyses an immutable graph snapshot.
///
/// Mutations clone the graph only while an older snapshot is still alive,
/// so a traversal never observes a mutation mid-flight.
#[derive(Debug, Default)]
pub struct SharedTraceGraph {
    current: RwLock<Arc<TraceGraph>>,
}

impl SharedTraceGraph {
    pub fn new(graph: TraceGraph) -> Self {
        Self {
            current: RwLock::new(Arc::new(graph)),
        }
    }

    /// Returns the current immutable snapshot.
    pub fn snapshot(&self) -> Arc<TraceGraph> {
        Arc::clone(&read_lock(&self.current))
    }

    /// Applies one atomic mutation under the writer lock.
    ///
    /// `mutation` must leave the graph unchanged when it returns an error;
    /// `TraceGraph::add_link` and `TraceGraph::remove_link` both do.
    pub fn mutate<R, F>(&self, mutation: F) -> CoreResult<R>
    where
        F: FnOnce(&mut TraceGraph) -> CoreResult<R>,
    {
        let mut current = write_lock(&self.current);
        mutation(Arc::make_mut(&mut current))
    }
}

#[cfg(test)]
mod tests {
    use super::{PropagationDirection, SharedTraceGraph, TraceGraph};
    use crate::error::CoreError;
    use crate::model::trace::{RelationshipType, TraceLink};

    fn link(source: &str, target: &str) -> TraceLink {
        TraceLink::new(source, target, RelationshipType::Satisfies)
    }

    #[test]
    fn rejects_duplicate_pairs_but_allows_reverse_direction() {
        let mut graph = TraceGraph::new();
        graph.add_link(link("REQ-1", "FUNC-1")).unwrap();
        let err = graph.add_link(link("REQ-1", "FUNC-1")).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateId { .. }));
        graph.add_link(link("FUNC-1", "REQ-1")).unwrap();
        assert_eq!(graph.link_count(), 2);
    }

    #[test]
    fn failed_add_leaves_graph_untouched() {
        let mut graph = TraceGraph::new();
        let err = graph
            .add_link(TraceLink::absent("REQ-1", "FUNC-1"))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.endpoint_revision("REQ-1"), 0);
    }

    #[test]
    fn revisions_move_only_for_touched_endpoints() {
        let mut graph = TraceGraph::new();
        graph.add_link(link("REQ-1", "FUNC-1")).unwrap();
        graph.add_link(link("REQ-2", "FUNC-2")).unwrap();
        let before_req1 = graph.endpoint_revision("REQ-1");
        let before_req2 = graph.endpoint_revision("REQ-2");

        graph.remove_link("REQ-2", "FUNC-2").unwrap();
        assert_eq!(graph.endpoint_revision("REQ-1"), before_req1);
        assert_ne!(graph.endpoint_revision("REQ-2"), before_req2);
    }

    #[test]
    fn remove_unknown_link_is_not_found() {
        let mut graph = TraceGraph::new();
        graph.add_link(link("REQ-1", "FUNC-1")).unwrap();
        let err = graph.remove_link("FUNC-1", "REQ-1").unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
        let err = graph.remove_link("REQ-9", "FUNC-1").unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn neighbors_respect_direction() {
        let mut graph = TraceGraph::new();
        graph.add_link(link("REQ-1", "FUNC-1")).unwrap();
        graph.add_link(link("MIS-1", "REQ-1")).unwrap();
        let req = graph.index_of("REQ-1").unwrap();

        let ids = |direction| -> Vec<String> {
            graph
                .neighbors(req, direction)
                .map(|index| graph.node_id(index).to_string())
                .collect()
        };
        assert_eq!(ids(PropagationDirection::Downstream), vec!["FUNC-1"]);
        assert_eq!(ids(PropagationDirection::Upstream), vec!["MIS-1"]);
        assert_eq!(ids(PropagationDirection::Both).len(), 2);
    }

    #[test]
    fn snapshots_are_isolated_from_later_mutations() {
        let shared = SharedTraceGraph::default();
        shared
            .mutate(|graph| graph.add_link(link("REQ-1", "FUNC-1")))
            .unwrap();
        let before = shared.snapshot();

        shared
            .mutate(|graph| graph.add_link(link("REQ-1", "FUNC-2")))
            .unwrap();
        assert_eq!(before.link_count(), 1);
        assert_eq!(shared.snapshot().link_count(), 2);
    }
}
