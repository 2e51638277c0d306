//! Structured error kinds shared by every core component.
//!
//! # Responsibility
//! - Provide one error taxonomy for registry, change log, graph and query
//!   operations.
//! - Carry offending field/id context so callers can render their own text.
//!
//! # Invariants
//! - Errors are returned at the call that caused them; nothing is coerced.
//! - A returned error means the mutation was not applied.

use crate::db::DbError;
use crate::logging::LoggingError;
use crate::model::change::ChangeStatus;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used across the core crate.
pub type CoreResult<T> = Result<T, CoreError>;

/// Entity family an id-based error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Artifact,
    ChangeRecord,
    TraceLink,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Artifact => "artifact",
            Self::ChangeRecord => "change record",
            Self::TraceLink => "trace link",
        }
    }
}

/// Invariant violation detected while validating inbound data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text field is blank after trim.
    EmptyField { field: &'static str },
    /// Artifact id does not follow the `PREFIX-suffix` shape.
    MalformedArtifactId { id: String },
    /// `beforeValue` is required for modified/removed changes.
    MissingBeforeValue { change_id: String },
    /// `afterValue` is required for added/modified changes.
    MissingAfterValue { change_id: String },
    /// New change records start in `Draft`; later states are reached by
    /// transitions only.
    InvalidInitialStatus {
        change_id: String,
        status: ChangeStatus,
    },
    /// Change record domain disagrees with its artifact's domain.
    DomainMismatch { change_id: String, artifact_id: String },
    /// Trace link points at itself.
    SelfLink { artifact_id: String },
    /// `RelationshipType::None` is a matrix marker and is never stored.
    AbsentRelationship { source_id: String, target_id: String },
    /// Verification status and coverage must be set together.
    VerificationMismatch { source_id: String, target_id: String },
    /// Link coverage is outside `0..=100`.
    CoverageOutOfRange { value: u8 },
    /// Pagination requested page `0`.
    InvalidPage,
    /// Pagination requested a zero page size.
    InvalidPageSize,
    /// Search, filter or sort refers to a field the record type does not expose.
    UnknownField { field: String },
    /// Configuration value rejected.
    InvalidConfig { field: &'static str, message: String },
}

impl ValidationError {
    /// Name of the offending field, as exposed to presentation layers.
    pub fn field(&self) -> &str {
        match self {
            Self::EmptyField { field } => field,
            Self::MalformedArtifactId { .. } => "id",
            Self::MissingBeforeValue { .. } => "beforeValue",
            Self::MissingAfterValue { .. } => "afterValue",
            Self::InvalidInitialStatus { .. } => "status",
            Self::DomainMismatch { .. } => "domain",
            Self::SelfLink { .. } => "targetId",
            Self::AbsentRelationship { .. } => "relationshipType",
            Self::VerificationMismatch { .. } => "verificationStatus",
            Self::CoverageOutOfRange { .. } => "coverage",
            Self::InvalidPage => "page",
            Self::InvalidPageSize => "pageSize",
            Self::UnknownField { field } => field,
            Self::InvalidConfig { field, .. } => field,
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField { field } => write!(f, "`{field}` must not be blank"),
            Self::MalformedArtifactId { id } => {
                write!(f, "artifact id `{id}` must look like PREFIX-suffix")
            }
            Self::MissingBeforeValue { change_id } => {
                write!(f, "change {change_id} requires beforeValue")
            }
            Self::MissingAfterValue { change_id } => {
                write!(f, "change {change_id} requires afterValue")
            }
            Self::InvalidInitialStatus { change_id, status } => write!(
                f,
                "change {change_id} must be recorded as draft, not `{}`",
                status.as_str()
            ),
            Self::DomainMismatch {
                change_id,
                artifact_id,
            } => write!(
                f,
                "change {change_id} domain does not match artifact {artifact_id}"
            ),
            Self::SelfLink { artifact_id } => {
                write!(f, "trace link must not point at itself: {artifact_id}")
            }
            Self::AbsentRelationship {
                source_id,
                target_id,
            } => write!(
                f,
                "trace link {source_id} -> {target_id} has relationship `none`"
            ),
            Self::VerificationMismatch {
                source_id,
                target_id,
            } => write!(
                f,
                "trace link {source_id} -> {target_id}: set verification and coverage together"
            ),
            Self::CoverageOutOfRange { value } => {
                write!(f, "coverage {value} is outside 0..=100")
            }
            Self::InvalidPage => write!(f, "page is 1-indexed and must be >= 1"),
            Self::InvalidPageSize => write!(f, "page size must be >= 1"),
            Self::UnknownField { field } => write!(f, "unknown record field `{field}`"),
            Self::InvalidConfig { field, message } => {
                write!(f, "invalid config `{field}`: {message}")
            }
        }
    }
}

impl Error for ValidationError {}

/// Crate-wide error taxonomy.
#[derive(Debug)]
pub enum CoreError {
    Validation(ValidationError),
    DuplicateId {
        kind: EntityKind,
        id: String,
    },
    NotFound {
        kind: EntityKind,
        id: String,
    },
    InvalidTransition {
        change_id: String,
        from: ChangeStatus,
        to: ChangeStatus,
    },
    /// Impact propagation observed a cancellation signal. No result was kept.
    Cancelled {
        artifact_id: String,
        hops_completed: u32,
    },
    /// Change journal persistence failed; the in-memory log is unchanged.
    Storage(DbError),
    /// Configured log sink could not be installed.
    Logging(LoggingError),
}

impl CoreError {
    pub(crate) fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn duplicate(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::DuplicateId {
            kind,
            id: id.into(),
        }
    }

    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::DuplicateId { .. } => "duplicate_id",
            Self::NotFound { .. } => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Cancelled { .. } => "cancelled",
            Self::Storage(_) => "storage_error",
            Self::Logging(_) => "logging_error",
        }
    }
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::DuplicateId { kind, id } => write!(f, "{} already exists: {id}", kind.as_str()),
            Self::NotFound { kind, id } => write!(f, "{} not found: {id}", kind.as_str()),
            Self::InvalidTransition {
                change_id,
                from,
                to,
            } => write!(
                f,
                "change {change_id} cannot move from `{}` to `{}`",
                from.as_str(),
                to.as_str()
            ),
            Self::Cancelled {
                artifact_id,
                hops_completed,
            } => write!(
                f,
                "impact propagation from {artifact_id} cancelled after {hops_completed} hop(s)"
            ),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Logging(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Logging(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for CoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for CoreError {
    fn from(value: DbError) -> Self {
        Self::Storage(value)
    }
}

impl From<LoggingError> for CoreError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(DbError::Sqlite(value))
    }
}
