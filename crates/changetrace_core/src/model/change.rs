//! Change record model and status lifecycle.
//!
//! # Responsibility
//! - Define the write-once record describing one change to one artifact.
//! - Own the status state machine used by the change log.
//!
//! # Invariants
//! - `before_value` is required when `change_type` is `Modified` or `Removed`.
//! - `after_value` is required when `change_type` is `Added` or `Modified`.
//! - Only `status` ever changes after a record is appended.

use crate::error::ValidationError;
use crate::model::artifact::validate_artifact_id;
use crate::model::domain::Domain;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Prefix used for generated change record ids.
pub const CHANGE_ID_PREFIX: &str = "CHG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }

    pub fn parse(value: &str) -> Option<ChangeType> {
        match value {
            "added" => Some(Self::Added),
            "modified" => Some(Self::Modified),
            "removed" => Some(Self::Removed),
            _ => None,
        }
    }

    fn requires_before_value(self) -> bool {
        matches!(self, Self::Modified | Self::Removed)
    }

    fn requires_after_value(self) -> bool {
        matches!(self, Self::Added | Self::Modified)
    }
}

/// Engineering severity of a change. Ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Critical,
    Major,
    Minor,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Self::Critical, Self::Major, Self::Minor];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Major => "major",
            Self::Minor => "minor",
        }
    }

    pub fn parse(value: &str) -> Option<Severity> {
        Self::ALL.into_iter().find(|severity| severity.as_str() == value)
    }
}

/// Review lifecycle of a change record.
///
/// `Draft -> InReview -> {Approved, Rejected}`, `Approved -> Implemented`.
/// `Rejected` and `Implemented` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeStatus {
    Draft,
    InReview,
    Approved,
    Rejected,
    Implemented,
}

impl ChangeStatus {
    pub const ALL: [ChangeStatus; 5] = [
        Self::Draft,
        Self::InReview,
        Self::Approved,
        Self::Rejected,
        Self::Implemented,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InReview => "inReview",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Implemented => "implemented",
        }
    }

    pub fn parse(value: &str) -> Option<ChangeStatus> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Implemented)
    }

    /// Whether `self -> next` is an edge of the lifecycle graph.
    ///
    /// Staying in the same state is not an edge; callers treat it as a no-op.
    pub fn can_transition_to(self, next: ChangeStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::InReview)
                | (Self::InReview, Self::Approved)
                | (Self::InReview, Self::Rejected)
                | (Self::Approved, Self::Implemented)
        )
    }
}

/// Count of impacted artifacts per domain.
pub type ImpactCounts = BTreeMap<Domain, u32>;

/// One recorded change to one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    /// Globally unique, immutable id.
    pub id: String,
    pub domain: Domain,
    /// Registry id of the changed artifact.
    pub artifact_id: String,
    pub change_type: ChangeType,
    pub severity: Severity,
    pub status: ChangeStatus,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
    pub author: String,
    pub before_value: Option<String>,
    pub after_value: Option<String>,
    #[serde(default)]
    pub impacted_items: ImpactCounts,
}

impl ChangeRecord {
    /// Creates a draft record with a generated `CHG-<uuid>` id.
    pub fn new(
        domain: Domain,
        artifact_id: impl Into<String>,
        change_type: ChangeType,
        severity: Severity,
        timestamp: i64,
        author: impl Into<String>,
    ) -> Self {
        let id = format!("{CHANGE_ID_PREFIX}-{}", Uuid::new_v4().simple());
        Self::with_id(id, domain, artifact_id, change_type, severity, timestamp, author)
    }

    /// Creates a draft record with a caller-provided id.
    ///
    /// Used by import paths where the id already exists externally. Does not
    /// validate; the change log does that on append.
    pub fn with_id(
        id: impl Into<String>,
        domain: Domain,
        artifact_id: impl Into<String>,
        change_type: ChangeType,
        severity: Severity,
        timestamp: i64,
        author: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            domain,
            artifact_id: artifact_id.into(),
            change_type,
            severity,
            status: ChangeStatus::Draft,
            timestamp,
            author: author.into(),
            before_value: None,
            after_value: None,
            impacted_items: ImpactCounts::new(),
        }
    }

    pub fn with_before(mut self, value: impl Into<String>) -> Self {
        self.before_value = Some(value.into());
        self
    }

    pub fn with_after(mut self, value: impl Into<String>) -> Self {
        self.after_value = Some(value.into());
        self
    }

    pub fn with_status(mut self, status: ChangeStatus) -> Self {
        self.status = status;
        self
    }

    /// Total impacted artifacts across every domain.
    pub fn total_impacted(&self) -> u64 {
        self.impacted_items.values().map(|count| u64::from(*count)).sum()
    }

    /// Checks record-level invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "id" });
        }
        validate_artifact_id(&self.artifact_id).map_err(|err| match err {
            ValidationError::EmptyField { .. } => ValidationError::EmptyField {
                field: "artifactId",
            },
            other => other,
        })?;
        if self.author.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "author" });
        }

        if self.change_type.requires_before_value() && self.before_value.is_none() {
            return Err(ValidationError::MissingBeforeValue {
                change_id: self.id.clone(),
            });
        }
        if self.change_type.requires_after_value() && self.after_value.is_none() {
            return Err(ValidationError::MissingAfterValue {
                change_id: self.id.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeRecord, ChangeStatus, ChangeType, Severity};
    use crate::error::ValidationError;
    use crate::model::domain::Domain;

    fn modified() -> ChangeRecord {
        ChangeRecord::with_id(
            "CHG-1",
            Domain::Requirement,
            "REQ-1",
            ChangeType::Modified,
            Severity::Major,
            1_700_000_000_000,
            "a.lovelace",
        )
    }

    #[test]
    fn generated_ids_are_prefixed_and_unique() {
        let a = ChangeRecord::new(
            Domain::Cad,
            "CAD-1",
            ChangeType::Added,
            Severity::Minor,
            0,
            "x",
        );
        let b = ChangeRecord::new(
            Domain::Cad,
            "CAD-1",
            ChangeType::Added,
            Severity::Minor,
            0,
            "x",
        );
        assert!(a.id.starts_with("CHG-"));
        assert_ne!(a.id, b.id);
        assert_eq!(a.status, ChangeStatus::Draft);
    }

    #[test]
    fn modified_requires_both_values() {
        let err = modified().with_after("10 km").validate().unwrap_err();
        assert!(matches!(err, ValidationError::MissingBeforeValue { .. }));

        let err = modified().with_before("5 km").validate().unwrap_err();
        assert!(matches!(err, ValidationError::MissingAfterValue { .. }));

        modified()
            .with_before("5 km")
            .with_after("10 km")
            .validate()
            .expect("complete modified record");
    }

    #[test]
    fn added_and_removed_need_only_their_side() {
        let mut added = modified().with_after("new");
        added.change_type = ChangeType::Added;
        added.validate().expect("added with after only");

        let mut removed = modified().with_before("old");
        removed.change_type = ChangeType::Removed;
        removed.validate().expect("removed with before only");
        removed.before_value = None;
        let err = removed.validate().unwrap_err();
        assert!(matches!(err, ValidationError::MissingBeforeValue { .. }));
    }

    #[test]
    fn lifecycle_edges() {
        use ChangeStatus::*;
        assert!(Draft.can_transition_to(InReview));
        assert!(InReview.can_transition_to(Approved));
        assert!(InReview.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Implemented));
        assert!(!Draft.can_transition_to(Implemented));
        assert!(!Rejected.can_transition_to(InReview));
        assert!(!Implemented.can_transition_to(Draft));
        assert!(Rejected.is_terminal() && Implemented.is_terminal());
    }

    #[test]
    fn serializes_with_camel_case_wire_names() {
        let record = modified()
            .with_before("5")
            .with_after("10")
            .with_status(ChangeStatus::InReview);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["artifactId"], "REQ-1");
        assert_eq!(json["changeType"], "modified");
        assert_eq!(json["status"], "inReview");
    }
}
