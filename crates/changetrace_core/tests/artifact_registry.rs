use changetrace_core::{Artifact, ArtifactLookup, ArtifactRegistry, CoreError, Domain, EntityKind};

fn artifact(id: &str, domain: Domain) -> Artifact {
    Artifact::new(id, domain, format!("{id} title"), "general").unwrap()
}

#[test]
fn register_then_get_returns_same_metadata() {
    let mut registry = ArtifactRegistry::new();
    registry
        .register(Artifact::new("REQ-1", Domain::Requirement, "Max range", "performance").unwrap())
        .unwrap();

    let loaded = registry.get("REQ-1").unwrap();
    assert_eq!(loaded.domain(), Domain::Requirement);
    assert_eq!(loaded.title(), "Max range");
    assert_eq!(loaded.category(), "performance");
    assert_eq!(registry.domain_of("REQ-1"), Some(Domain::Requirement));
}

#[test]
fn ids_are_unique_across_domains() {
    let mut registry = ArtifactRegistry::new();
    registry.register(artifact("X-1", Domain::Requirement)).unwrap();

    let err = registry.register(artifact("X-1", Domain::Cad)).unwrap_err();
    match err {
        CoreError::DuplicateId { kind, id } => {
            assert_eq!(kind, EntityKind::Artifact);
            assert_eq!(id, "X-1");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get("X-1").unwrap().domain(), Domain::Requirement);
}

#[test]
fn list_by_domain_keeps_registration_order() {
    let mut registry = ArtifactRegistry::new();
    for id in ["REQ-3", "REQ-1", "REQ-2"] {
        registry.register(artifact(id, Domain::Requirement)).unwrap();
    }
    registry.register(artifact("FUNC-1", Domain::Function)).unwrap();

    let ids: Vec<_> = registry
        .list_by_domain(Domain::Requirement)
        .into_iter()
        .map(Artifact::id)
        .collect();
    assert_eq!(ids, vec!["REQ-3", "REQ-1", "REQ-2"]);
    assert!(registry.list_by_domain(Domain::Bom).is_empty());
}

#[test]
fn unknown_id_is_not_found() {
    let registry = ArtifactRegistry::new();
    let err = registry.get("REQ-404").unwrap_err();
    assert!(matches!(
        err,
        CoreError::NotFound {
            kind: EntityKind::Artifact,
            ..
        }
    ));
    assert_eq!(registry.domain_of("REQ-404"), None);
}

#[test]
fn revisions_are_new_artifacts_pointing_back() {
    let mut registry = ArtifactRegistry::new();
    let original = artifact("CAD-7", Domain::Cad);
    let revised = original.supersede("CAD-7.B", "Bracket rev B").unwrap();
    registry.register(original).unwrap();
    registry.register(revised).unwrap();

    let revisions = registry.revisions_of("CAD-7");
    assert_eq!(revisions.len(), 1);
    assert_eq!(revisions[0].id(), "CAD-7.B");
    assert_eq!(registry.get("CAD-7").unwrap().supersedes(), None);
}

#[test]
fn every_domain_has_metadata() {
    for domain in Domain::ALL {
        assert!(!domain.label().is_empty());
        assert!(!domain.id_prefix().is_empty());
        let conventional = artifact(&format!("{}-1", domain.id_prefix()), domain);
        assert!(conventional.has_conventional_prefix());
        assert_eq!(Domain::parse(domain.as_str()), Some(domain));
    }
}
