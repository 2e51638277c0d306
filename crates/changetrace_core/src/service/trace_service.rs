//! Traceability use-case service.
//!
//! # Responsibility
//! - Provide stable entry points over registry, change log and trace graph.
//! - Derive change impact at record time and keep coverage caches honest.
//! - Route change log writes through the configured journal.
//!
//! # Invariants
//! - Links only reference registered artifacts.
//! - A change record's domain matches its artifact's domain.
//! - Every returned value is an owned clone; callers never alias state.
//! - Analyses run on one graph snapshot and never block writers.

use crate::analysis::coverage::{CoverageCalculator, CoverageReport, CoverageSummary};
use crate::analysis::impact::{CancellationToken, ImpactPropagator, ImpactReport};
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult, EntityKind, ValidationError};
use crate::logging;
use crate::model::artifact::Artifact;
use crate::model::change::{ChangeRecord, ChangeStatus};
use crate::model::domain::Domain;
use crate::model::trace::TraceLink;
use crate::query::engine::{QueryEngine, QueryPage, QueryRequest};
use crate::query::matrix::TraceMatrix;
use crate::repo::artifact_registry::ArtifactRegistry;
use crate::repo::change_journal::{ChangeJournal, NullJournal};
use crate::repo::change_log::{ChangeLog, ChangeSummary};
use crate::repo::trace_graph::{SharedTraceGraph, TraceGraph};
use crate::repo::{read_lock, write_lock};
use log::{info, warn};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Facade over the traceability core.
pub struct TraceabilityService<J: ChangeJournal = NullJournal> {
    config: CoreConfig,
    artifacts: RwLock<ArtifactRegistry>,
    graph: SharedTraceGraph,
    changes: ChangeLog,
    coverage: CoverageCalculator,
    propagator: ImpactPropagator,
    query: QueryEngine,
    journal: J,
}

impl TraceabilityService<NullJournal> {
    /// Creates an in-memory service.
    ///
    /// # Errors
    /// - `Validation` when `config` is invalid.
    /// - `Logging` when the configured log sink cannot be installed.
    pub fn new(config: CoreConfig) -> CoreResult<Self> {
        Self::with_journal(config, NullJournal)
    }
}

impl<J: ChangeJournal> TraceabilityService<J> {
    /// Creates a service whose change log is persisted through `journal`.
    ///
    /// Installs the configured log sink first, then replays the journal
    /// into the change log.
    pub fn with_journal(config: CoreConfig, journal: J) -> CoreResult<Self> {
        config.validate()?;
        if let Some(settings) = &config.logging {
            logging::init_logging(settings)?;
        }
        let restored = journal.load_all()?;
        let restored_count = restored.len();
        let changes = ChangeLog::restore(restored)?;
        info!(
            "event=service_init module=service status=ok max_hops={} restored_changes={}",
            config.max_propagation_hops, restored_count
        );

        Ok(Self {
            propagator: ImpactPropagator::from_config(&config),
            query: QueryEngine::from_config(&config),
            artifacts: RwLock::new(ArtifactRegistry::new()),
            graph: SharedTraceGraph::new(TraceGraph::new()),
            coverage: CoverageCalculator::new(),
            changes,
            config,
            journal,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn journal(&self) -> &J {
        &self.journal
    }

    /// Registers one artifact.
    ///
    /// An id whose prefix does not follow the domain convention is accepted
    /// with a warning.
    pub fn register_artifact(&self, artifact: Artifact) -> CoreResult<()> {
        let artifact_id = artifact.id().to_string();
        let domain = artifact.domain();
        if !artifact.has_conventional_prefix() {
            warn!(
                "event=artifact_register module=service status=warn artifact_id={} prefix={}",
                artifact_id,
                domain.id_prefix()
            );
        }
        write_lock(&self.artifacts)
            .register(artifact)
            .inspect_err(|err| log_write_error("artifact_register", &artifact_id, err))?;
        info!(
            "event=artifact_register module=service status=ok artifact_id={} domain={}",
            artifact_id,
            domain.as_str()
        );
        Ok(())
    }

    pub fn artifact(&self, artifact_id: &str) -> CoreResult<Artifact> {
        read_lock(&self.artifacts).get(artifact_id).cloned()
    }

    /// Artifacts of one domain in registration order.
    pub fn artifacts_in(&self, domain: Domain) -> Vec<Artifact> {
        read_lock(&self.artifacts)
            .list_by_domain(domain)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Adds one trace link between two registered artifacts.
    ///
    /// # Errors
    /// - `NotFound` when either endpoint is not registered.
    /// - `Validation` / `DuplicateId` from the trace graph.
    pub fn add_link(&self, link: TraceLink) -> CoreResult<()> {
        self.ensure_registered(&link.source_id)?;
        self.ensure_registered(&link.target_id)?;

        let key = link.key();
        let (source_id, target_id) = (link.source_id.clone(), link.target_id.clone());
        self.graph
            .mutate(|graph| graph.add_link(link))
            .inspect_err(|err| log_write_error("link_add", &key, err))?;
        self.coverage.invalidate(&source_id);
        self.coverage.invalidate(&target_id);
        info!("event=link_add module=service status=ok link={}", key);
        Ok(())
    }

    /// Removes the link of one ordered pair and returns it.
    pub fn remove_link(&self, source_id: &str, target_id: &str) -> CoreResult<TraceLink> {
        let removed = self
            .graph
            .mutate(|graph| graph.remove_link(source_id, target_id))?;
        self.coverage.invalidate(source_id);
        self.coverage.invalidate(target_id);
        info!(
            "event=link_remove module=service status=ok link={}",
            removed.key()
        );
        Ok(removed)
    }

    /// Links touching one artifact, outgoing first.
    pub fn links_of(&self, artifact_id: &str) -> Vec<TraceLink> {
        self.graph
            .snapshot()
            .links_of(artifact_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Derives impact counts for `record` and appends it to the change log.
    ///
    /// Any caller-provided `impacted_items` are replaced by the derived
    /// counts. Returns the stored record.
    ///
    /// # Errors
    /// - `NotFound` when the artifact is not registered.
    /// - `Validation` for record invariants or a domain mismatch.
    /// - `DuplicateId` when the change id exists.
    /// - `Storage` when the journal rejects the write.
    pub fn record_change(&self, mut record: ChangeRecord) -> CoreResult<ChangeRecord> {
        record.validate()?;
        let artifact_domain = read_lock(&self.artifacts)
            .get(&record.artifact_id)?
            .domain();
        if artifact_domain != record.domain {
            return Err(ValidationError::DomainMismatch {
                change_id: record.id.clone(),
                artifact_id: record.artifact_id.clone(),
            }
            .into());
        }

        let impact = self.compute_impact(&record.artifact_id, None)?;
        record.impacted_items = impact.counts;

        self.changes
            .append_with(record.clone(), |stored| self.journal.append(stored))
            .inspect_err(|err| log_write_error("change_record", &record.id, err))?;
        info!(
            "event=change_record module=service status=ok change_id={} artifact_id={} impacted={}",
            record.id,
            record.artifact_id,
            record.total_impacted()
        );
        Ok(record)
    }

    /// Moves one change record along the review lifecycle.
    pub fn transition_change(
        &self,
        change_id: &str,
        next: ChangeStatus,
    ) -> CoreResult<ChangeRecord> {
        let at = now_epoch_ms();
        let record = self
            .changes
            .transition_with(change_id, next, |from| {
                self.journal.record_transition(change_id, from, next, at)
            })
            .inspect_err(|err| log_write_error("change_transition", change_id, err))?;
        info!(
            "event=change_transition module=service status=ok change_id={} to={}",
            change_id,
            next.as_str()
        );
        Ok(record)
    }

    pub fn change(&self, change_id: &str) -> CoreResult<ChangeRecord> {
        self.changes.get(change_id)
    }

    /// Records at or after `since`, newest first. `None` spans all domains.
    pub fn changes_since(&self, domain: Option<Domain>, since: i64) -> Vec<ChangeRecord> {
        match domain {
            Some(domain) => self.changes.query(domain, since),
            None => self.changes.query_all(since),
        }
    }

    pub fn history_of(&self, artifact_id: &str) -> Vec<ChangeRecord> {
        self.changes.history_of(artifact_id)
    }

    /// Time-windowed change records shaped by the query engine.
    pub fn query_changes(
        &self,
        domain: Option<Domain>,
        since: i64,
        request: &QueryRequest,
    ) -> CoreResult<QueryPage<ChangeRecord>> {
        self.query.run(self.changes_since(domain, since), request)
    }

    /// Impact of a change to `artifact_id` under the configured policy.
    pub fn compute_impact(
        &self,
        artifact_id: &str,
        cancel: Option<&CancellationToken>,
    ) -> CoreResult<ImpactReport> {
        self.compute_impact_with(self.propagator, artifact_id, cancel)
    }

    /// Impact of a change to `artifact_id` under an explicit policy.
    pub fn compute_impact_with(
        &self,
        propagator: ImpactPropagator,
        artifact_id: &str,
        cancel: Option<&CancellationToken>,
    ) -> CoreResult<ImpactReport> {
        let snapshot = self.graph.snapshot();
        let artifacts = read_lock(&self.artifacts);
        propagator.compute(&snapshot, &*artifacts, artifact_id, cancel)
    }

    /// Verification coverage of one registered artifact.
    pub fn coverage(&self, artifact_id: &str) -> CoreResult<CoverageReport> {
        self.ensure_registered(artifact_id)?;
        Ok(self.coverage.get(&self.graph.snapshot(), artifact_id))
    }

    pub fn domain_coverage(&self, domain: Domain) -> CoverageSummary {
        let snapshot = self.graph.snapshot();
        let artifacts = read_lock(&self.artifacts);
        let ids = artifacts
            .list_by_domain(domain)
            .into_iter()
            .map(Artifact::id);
        self.coverage.domain_summary(&snapshot, domain, ids)
    }

    /// Dense matrix of `row_domain` artifacts against `column_domain`
    /// artifacts, both in registration order.
    pub fn trace_matrix(&self, row_domain: Domain, column_domain: Domain) -> TraceMatrix {
        let ids_in = |domain| -> Vec<String> {
            self.artifacts_in(domain)
                .iter()
                .map(|artifact| artifact.id().to_string())
                .collect()
        };
        let (rows, columns) = (ids_in(row_domain), ids_in(column_domain));
        TraceMatrix::build(&self.graph.snapshot(), rows, columns)
    }

    pub fn change_summary(&self, domain: Option<Domain>) -> ChangeSummary {
        self.changes.status_summary(domain)
    }

    fn ensure_registered(&self, artifact_id: &str) -> CoreResult<()> {
        if read_lock(&self.artifacts).contains(artifact_id) {
            Ok(())
        } else {
            Err(CoreError::not_found(EntityKind::Artifact, artifact_id))
        }
    }
}

fn log_write_error(event: &str, subject: &str, err: &CoreError) {
    warn!(
        "event={} module=service status=error subject={} error_code={}",
        event,
        subject,
        err.code()
    );
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}
