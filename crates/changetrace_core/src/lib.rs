//! Change-impact and traceability core.
//! This crate is the single source of truth for artifact, trace and change
//! invariants across the engineering domains.

pub mod analysis;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod service;

pub use analysis::coverage::{
    CoverageCalculator, CoverageReport, CoverageSummary, VerificationState,
};
pub use analysis::impact::{AffectedArtifact, CancellationToken, ImpactPropagator, ImpactReport};
pub use config::CoreConfig;
pub use db::{open_db, open_db_in_memory, DbError};
pub use error::{CoreError, CoreResult, EntityKind, ValidationError};
pub use logging::{init_logging, logging_status, LogLevel, LogSettings, LoggingError};
pub use model::artifact::Artifact;
pub use model::change::{ChangeRecord, ChangeStatus, ChangeType, ImpactCounts, Severity};
pub use model::domain::Domain;
pub use model::trace::{RelationshipType, TraceLink, VerificationStatus};
pub use query::engine::{
    FilterOptions, PageOptions, QueryEngine, QueryPage, QueryRequest, Queryable, SearchOptions,
    SortDirection, SortOptions, SortValue,
};
pub use query::matrix::{TraceCell, TraceMatrix};
pub use repo::artifact_registry::{ArtifactLookup, ArtifactRegistry};
pub use repo::change_journal::{
    ChangeJournal, JournaledChange, NullJournal, SqliteChangeJournal, StatusTransition,
};
pub use repo::change_log::{ChangeLog, ChangeSummary};
pub use repo::trace_graph::{PropagationDirection, SharedTraceGraph, TraceGraph};
pub use service::trace_service::TraceabilityService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
