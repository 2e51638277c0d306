//! Append-only change log.
//!
//! # Responsibility
//! - Accept validated change records and expose time-windowed reads.
//! - Enforce the review status state machine.
//!
//! # Invariants
//! - Records are never removed; ids are unique for the log lifetime.
//! - Records enter as `Draft`; every later status is reached by a lifecycle
//!   transition, including during restore.
//! - Appends and transitions are serialized through one write lock.
//! - Read order is `timestamp DESC, id ASC`.

use crate::error::{CoreError, CoreResult, EntityKind, ValidationError};
use crate::model::change::{ChangeRecord, ChangeStatus, Severity};
use crate::model::domain::Domain;
use crate::repo::change_journal::JournaledChange;
use crate::repo::{read_lock, write_lock};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// Deterministic total order for change records: newest first, then id.
pub fn newest_first(a: &ChangeRecord, b: &ChangeRecord) -> Ordering {
    b.timestamp
        .cmp(&a.timestamp)
        .then_with(|| a.id.cmp(&b.id))
}

/// Per-status and per-severity record counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    pub total: usize,
    pub by_status: BTreeMap<ChangeStatus, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
}

#[derive(Debug, Default)]
struct ChangeLogState {
    records: Vec<ChangeRecord>,
    by_id: HashMap<String, usize>,
}

/// Thread-safe append-only collection of change records.
#[derive(Debug, Default)]
pub struct ChangeLog {
    state: RwLock<ChangeLogState>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a log from journaled history.
    ///
    /// Each record is appended as first recorded and its transitions are
    /// replayed through the lifecycle. The first invalid record, duplicate
    /// id or out-of-lifecycle edge aborts the restore.
    pub fn restore(history: Vec<JournaledChange>) -> CoreResult<Self> {
        let log = Self::new();
        for entry in history {
            let change_id = entry.record.id.clone();
            log.append(entry.record)?;
            for step in entry.transitions {
                if !step.from.can_transition_to(step.to) {
                    return Err(CoreError::InvalidTransition {
                        change_id,
                        from: step.from,
                        to: step.to,
                    });
                }
                log.transition_with(&change_id, step.to, |current| {
                    if current == step.from {
                        Ok(())
                    } else {
                        Err(CoreError::InvalidTransition {
                            change_id: change_id.clone(),
                            from: current,
                            to: step.to,
                        })
                    }
                })?;
            }
        }
        Ok(log)
    }

    /// Appends one record.
    ///
    /// # Errors
    /// - `Validation` when record invariants fail or the status is not
    ///   `Draft`.
    /// - `DuplicateId` when the id was appended before.
    pub fn append(&self, record: ChangeRecord) -> CoreResult<()> {
        self.append_with(record, |_| Ok(()))
    }

    /// Appends one record after `persist` accepts it.
    ///
    /// `persist` runs under the write lock once validation passed. If it
    /// fails, the record is not appended.
    pub fn append_with<F>(&self, record: ChangeRecord, persist: F) -> CoreResult<()>
    where
        F: FnOnce(&ChangeRecord) -> CoreResult<()>,
    {
        record.validate()?;
        if record.status != ChangeStatus::Draft {
            return Err(ValidationError::InvalidInitialStatus {
                change_id: record.id,
                status: record.status,
            }
            .into());
        }

        let mut state = write_lock(&self.state);
        if state.by_id.contains_key(&record.id) {
            return Err(CoreError::duplicate(EntityKind::ChangeRecord, record.id));
        }
        persist(&record)?;

        let index = state.records.len();
        state.by_id.insert(record.id.clone(), index);
        state.records.push(record);
        Ok(())
    }

    /// Returns an owned copy of one record.
    pub fn get(&self, change_id: &str) -> CoreResult<ChangeRecord> {
        let state = read_lock(&self.state);
        state
            .by_id
            .get(change_id)
            .map(|index| state.records[*index].clone())
            .ok_or_else(|| CoreError::not_found(EntityKind::ChangeRecord, change_id))
    }

    /// Records of one domain with `timestamp >= since`, newest first.
    pub fn query(&self, domain: Domain, since: i64) -> Vec<ChangeRecord> {
        self.collect(|record| record.domain == domain && record.timestamp >= since)
    }

    /// Records of every domain with `timestamp >= since`, newest first.
    pub fn query_all(&self, since: i64) -> Vec<ChangeRecord> {
        self.collect(|record| record.timestamp >= since)
    }

    /// Records about one artifact, newest first.
    pub fn history_of(&self, artifact_id: &str) -> Vec<ChangeRecord> {
        self.collect(|record| record.artifact_id == artifact_id)
    }

    /// Moves one record to `next` status.
    ///
    /// Re-applying the current status is a no-op.
    ///
    /// # Errors
    /// - `NotFound` for unknown ids.
    /// - `InvalidTransition` for edges outside the lifecycle.
    pub fn transition(&self, change_id: &str, next: ChangeStatus) -> CoreResult<ChangeRecord> {
        self.transition_with(change_id, next, |_| Ok(()))
    }

    /// Moves one record to `next` status after `persist` accepts the edge.
    ///
    /// `persist` receives the status being left and is not called for no-ops.
    pub fn transition_with<F>(
        &self,
        change_id: &str,
        next: ChangeStatus,
        persist: F,
    ) -> CoreResult<ChangeRecord>
    where
        F: FnOnce(ChangeStatus) -> CoreResult<()>,
    {
        let mut state = write_lock(&self.state);
        let index = *state
            .by_id
            .get(change_id)
            .ok_or_else(|| CoreError::not_found(EntityKind::ChangeRecord, change_id))?;

        let current = state.records[index].status;
        if current == next {
            return Ok(state.records[index].clone());
        }
        if !current.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                change_id: change_id.to_string(),
                from: current,
                to: next,
            });
        }
        persist(current)?;

        let record = &mut state.records[index];
        record.status = next;
        Ok(record.clone())
    }

    /// Status and severity counts, optionally restricted to one domain.
    pub fn status_summary(&self, domain: Option<Domain>) -> ChangeSummary {
        let state = read_lock(&self.state);
        let mut summary = ChangeSummary::default();
        for record in state
            .records
            .iter()
            .filter(|record| domain.map_or(true, |domain| record.domain == domain))
        {
            summary.total += 1;
            *summary.by_status.entry(record.status).or_default() += 1;
            *summary.by_severity.entry(record.severity).or_default() += 1;
        }
        summary
    }

    pub fn len(&self) -> usize {
        read_lock(&self.state).records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collect<P>(&self, predicate: P) -> Vec<ChangeRecord>
    where
        P: Fn(&ChangeRecord) -> bool,
    {
        let state = read_lock(&self.state);
        let mut records: Vec<ChangeRecord> = state
            .records
            .iter()
            .filter(|record| predicate(record))
            .cloned()
            .collect();
        records.sort_by(newest_first);
        records
    }
}
