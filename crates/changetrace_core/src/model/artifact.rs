//! Artifact identity model.
//!
//! # Responsibility
//! - Define the immutable identity/metadata record of one engineering item.
//! - Provide revision helpers that supersede instead of mutating.
//!
//! # Invariants
//! - `id` is domain-prefixed (`PREFIX-suffix`) and never reused.
//! - Fields are private; an `Artifact` cannot change after construction.

use crate::error::ValidationError;
use crate::model::domain::Domain;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static ARTIFACT_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9]*-[A-Za-z0-9][A-Za-z0-9._-]*$")
        .expect("valid artifact id regex")
});

/// One uniquely identified item in an engineering domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ArtifactFields")]
pub struct Artifact {
    id: String,
    domain: Domain,
    title: String,
    category: String,
    /// Id of the artifact this one is a revision of.
    #[serde(skip_serializing_if = "Option::is_none")]
    supersedes: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactFields {
    id: String,
    domain: Domain,
    title: String,
    category: String,
    #[serde(default)]
    supersedes: Option<String>,
}

impl TryFrom<ArtifactFields> for Artifact {
    type Error = ValidationError;

    fn try_from(value: ArtifactFields) -> Result<Self, Self::Error> {
        let mut artifact = Artifact::new(value.id, value.domain, value.title, value.category)?;
        if let Some(previous) = value.supersedes {
            validate_artifact_id(&previous)?;
            artifact.supersedes = Some(previous);
        }
        Ok(artifact)
    }
}

impl Artifact {
    /// Creates a validated artifact.
    ///
    /// # Errors
    /// - `MalformedArtifactId` when `id` is not `PREFIX-suffix`.
    /// - `EmptyField` when `title` is blank.
    pub fn new(
        id: impl Into<String>,
        domain: Domain,
        title: impl Into<String>,
        category: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let id = id.into().trim().to_string();
        validate_artifact_id(&id)?;

        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(ValidationError::EmptyField { field: "title" });
        }

        Ok(Self {
            id,
            domain,
            title,
            category: category.into().trim().to_string(),
            supersedes: None,
        })
    }

    /// Builds the next revision of this artifact under a new id.
    ///
    /// The original stays untouched so existing trace history keeps pointing
    /// at it.
    pub fn supersede(
        &self,
        new_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let mut next = Artifact::new(new_id, self.domain, title, self.category.clone())?;
        if next.id == self.id {
            return Err(ValidationError::MalformedArtifactId { id: next.id });
        }
        next.supersedes = Some(self.id.clone());
        Ok(next)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn supersedes(&self) -> Option<&str> {
        self.supersedes.as_deref()
    }

    /// Whether the id prefix matches its domain's convention, ignoring case.
    pub fn has_conventional_prefix(&self) -> bool {
        self.id
            .split_once('-')
            .is_some_and(|(prefix, _)| prefix.eq_ignore_ascii_case(self.domain.id_prefix()))
    }
}

pub(crate) fn validate_artifact_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::EmptyField { field: "id" });
    }
    if !ARTIFACT_ID_RE.is_match(id) {
        return Err(ValidationError::MalformedArtifactId { id: id.to_string() });
    }
    Ok(())
}
