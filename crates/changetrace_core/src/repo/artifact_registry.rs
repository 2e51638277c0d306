//! Per-domain artifact registry.
//!
//! # Responsibility
//! - Store artifact identity/metadata and answer lookups by id or domain.
//!
//! # Invariants
//! - Ids are unique across all domains.
//! - `list_by_domain` preserves registration order.

use crate::error::{CoreError, CoreResult, EntityKind};
use crate::model::artifact::Artifact;
use crate::model::domain::Domain;
use std::collections::{BTreeMap, HashMap};

/// Resolves the domain of an artifact id.
///
/// Implemented by the registry; graph analyses depend on this seam instead
/// of the concrete store.
pub trait ArtifactLookup {
    fn domain_of(&self, artifact_id: &str) -> Option<Domain>;
}

/// In-memory artifact store.
#[derive(Debug, Clone, Default)]
pub struct ArtifactRegistry {
    artifacts: Vec<Artifact>,
    by_id: HashMap<String, usize>,
    by_domain: BTreeMap<Domain, Vec<usize>>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one artifact.
    ///
    /// # Errors
    /// - `DuplicateId` when the id is already registered.
    pub fn register(&mut self, artifact: Artifact) -> CoreResult<()> {
        if self.by_id.contains_key(artifact.id()) {
            return Err(CoreError::duplicate(EntityKind::Artifact, artifact.id()));
        }

        let index = self.artifacts.len();
        self.by_id.insert(artifact.id().to_string(), index);
        self.by_domain
            .entry(artifact.domain())
            .or_default()
            .push(index);
        self.artifacts.push(artifact);
        Ok(())
    }

    /// Returns one artifact by id.
    pub fn get(&self, artifact_id: &str) -> CoreResult<&Artifact> {
        self.by_id
            .get(artifact_id)
            .map(|index| &self.artifacts[*index])
            .ok_or_else(|| CoreError::not_found(EntityKind::Artifact, artifact_id))
    }

    pub fn contains(&self, artifact_id: &str) -> bool {
        self.by_id.contains_key(artifact_id)
    }

    /// Artifacts of one domain in registration order.
    pub fn list_by_domain(&self, domain: Domain) -> Vec<&Artifact> {
        self.by_domain
            .get(&domain)
            .map(|indexes| indexes.iter().map(|index| &self.artifacts[*index]).collect())
            .unwrap_or_default()
    }

    /// Revisions that directly supersede `artifact_id`, in registration order.
    pub fn revisions_of(&self, artifact_id: &str) -> Vec<&Artifact> {
        self.artifacts
            .iter()
            .filter(|artifact| artifact.supersedes() == Some(artifact_id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl ArtifactLookup for ArtifactRegistry {
    fn domain_of(&self, artifact_id: &str) -> Option<Domain> {
        self.get(artifact_id).ok().map(Artifact::domain)
    }
}

#[cfg(test)]
mod tests {
    use super::{ArtifactLookup, ArtifactRegistry};
    use crate::model::artifact::Artifact;
    use crate::model::domain::Domain;

    #[test]
    fn lookup_resolves_domains() {
        let mut registry = ArtifactRegistry::new();
        registry
            .register(Artifact::new("BOM-1", Domain::Bom, "Frame kit", "assembly").unwrap())
            .unwrap();
        assert_eq!(registry.domain_of("BOM-1"), Some(Domain::Bom));
        assert_eq!(registry.domain_of("BOM-2"), None);
    }

    #[test]
    fn revisions_are_tracked_by_supersedes() {
        let mut registry = ArtifactRegistry::new();
        let original = Artifact::new("PHY-1", Domain::Physical, "Housing", "enclosure").unwrap();
        let revised = original.supersede("PHY-1.1", "Housing v2").unwrap();
        registry.register(original).unwrap();
        registry.register(revised).unwrap();

        let ids: Vec<_> = registry
            .revisions_of("PHY-1")
            .into_iter()
            .map(Artifact::id)
            .collect();
        assert_eq!(ids, vec!["PHY-1.1"]);
    }
}
