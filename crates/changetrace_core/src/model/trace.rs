//! Trace link model.
//!
//! # Responsibility
//! - Define the typed, directed relationship between two artifacts.
//! - Validate link invariants before a link can enter the trace graph.
//!
//! # Invariants
//! - `source_id != target_id`.
//! - `RelationshipType::None` marks an absent matrix cell and is never stored.
//! - A stored link carries both `verification_status` and `coverage`;
//!   a `None` cell carries neither.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationshipType {
    Satisfies,
    Implements,
    Verifies,
    Allocated,
    /// Explicit absence marker for dense matrix cells.
    None,
}

impl RelationshipType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Satisfies => "satisfies",
            Self::Implements => "implements",
            Self::Verifies => "verifies",
            Self::Allocated => "allocated",
            Self::None => "none",
        }
    }

    pub fn is_present(self) -> bool {
        self != Self::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VerificationStatus {
    Verified,
    NotVerified,
    PartiallyVerified,
    NotApplicable,
}

impl VerificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::NotVerified => "notVerified",
            Self::PartiallyVerified => "partiallyVerified",
            Self::NotApplicable => "notApplicable",
        }
    }
}

/// Directed relationship between two artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceLink {
    pub source_id: String,
    pub target_id: String,
    pub relationship_type: RelationshipType,
    pub verification_status: Option<VerificationStatus>,
    /// Percent in `0..=100`.
    pub coverage: Option<u8>,
}

impl TraceLink {
    /// Creates a link with default verification metadata.
    ///
    /// `Verifies` links start as `NotVerified`; every other relationship
    /// starts as `NotApplicable`. Coverage starts at `0`. A `None`
    /// relationship produces an absence cell with no metadata.
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relationship_type: RelationshipType,
    ) -> Self {
        let verification_status = match relationship_type {
            RelationshipType::None => None,
            RelationshipType::Verifies => Some(VerificationStatus::NotVerified),
            _ => Some(VerificationStatus::NotApplicable),
        };
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            relationship_type,
            verification_status,
            coverage: verification_status.map(|_| 0),
        }
    }

    /// Absence marker used when materializing a dense matrix.
    pub fn absent(source_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self::new(source_id, target_id, RelationshipType::None)
    }

    pub fn with_verification(mut self, status: VerificationStatus, coverage: u8) -> Self {
        self.verification_status = Some(status);
        self.coverage = Some(coverage);
        self
    }

    /// Stable key of the ordered `(source, target)` pair.
    pub fn key(&self) -> String {
        format!("{}->{}", self.source_id, self.target_id)
    }

    /// Whether this link counts toward verification coverage.
    pub fn is_verification(&self) -> bool {
        self.relationship_type == RelationshipType::Verifies
    }

    pub fn touches(&self, artifact_id: &str) -> bool {
        self.source_id == artifact_id || self.target_id == artifact_id
    }

    /// Checks the invariants a link must satisfy to be stored in a graph.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.source_id.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "sourceId" });
        }
        if self.target_id.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "targetId" });
        }
        if self.source_id == self.target_id {
            return Err(ValidationError::SelfLink {
                artifact_id: self.source_id.clone(),
            });
        }
        if !self.relationship_type.is_present() {
            return Err(ValidationError::AbsentRelationship {
                source_id: self.source_id.clone(),
                target_id: self.target_id.clone(),
            });
        }
        match (self.verification_status, self.coverage) {
            (Some(_), Some(value)) if value > 100 => {
                Err(ValidationError::CoverageOutOfRange { value })
            }
            (Some(_), Some(_)) => Ok(()),
            _ => Err(ValidationError::VerificationMismatch {
                source_id: self.source_id.clone(),
                target_id: self.target_id.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RelationshipType, TraceLink, VerificationStatus};
    use crate::error::ValidationError;

    #[test]
    fn defaults_depend_on_relationship() {
        let verifies = TraceLink::new("TST-1", "REQ-1", RelationshipType::Verifies);
        assert_eq!(
            verifies.verification_status,
            Some(VerificationStatus::NotVerified)
        );
        assert_eq!(verifies.coverage, Some(0));

        let satisfies = TraceLink::new("REQ-1", "FUNC-1", RelationshipType::Satisfies);
        assert_eq!(
            satisfies.verification_status,
            Some(VerificationStatus::NotApplicable)
        );
        satisfies.validate().expect("default link is storable");

        let absent = TraceLink::absent("REQ-1", "FUNC-1");
        assert_eq!(absent.verification_status, None);
        assert_eq!(absent.coverage, None);
    }

    #[test]
    fn validate_rejects_self_links_and_absence_markers() {
        let err = TraceLink::new("REQ-1", "REQ-1", RelationshipType::Satisfies)
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::SelfLink {
                artifact_id: "REQ-1".to_string()
            }
        );

        let err = TraceLink::absent("REQ-1", "FUNC-1").validate().unwrap_err();
        assert!(matches!(err, ValidationError::AbsentRelationship { .. }));
    }

    #[test]
    fn validate_requires_status_and_coverage_together() {
        let mut link = TraceLink::new("TST-1", "REQ-1", RelationshipType::Verifies);
        link.coverage = None;
        assert!(matches!(
            link.validate().unwrap_err(),
            ValidationError::VerificationMismatch { .. }
        ));

        let link = TraceLink::new("TST-1", "REQ-1", RelationshipType::Verifies)
            .with_verification(VerificationStatus::Verified, 101);
        assert_eq!(
            link.validate().unwrap_err(),
            ValidationError::CoverageOutOfRange { value: 101 }
        );
    }
}
