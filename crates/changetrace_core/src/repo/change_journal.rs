//! Durable journal for the append-only change log.
//!
//! # Responsibility
//! - Persist appended change records and status transitions.
//! - Hand persisted history back as recorded records plus their status
//!   transitions, so the change log can re-apply its own lifecycle rules.
//!
//! # Invariants
//! - Journal rows are write-once; SQLite triggers abort updates/deletes.
//! - Transitions are returned in persisted order.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::error::CoreResult;
use crate::model::change::{ChangeRecord, ChangeStatus, ChangeType, ImpactCounts, Severity};
use crate::model::domain::Domain;
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use std::collections::HashMap;

/// One persisted status edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTransition {
    pub from: ChangeStatus,
    pub to: ChangeStatus,
    pub at: i64,
}

/// A record as it was first appended, followed by its status edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournaledChange {
    pub record: ChangeRecord,
    pub transitions: Vec<StatusTransition>,
}

impl JournaledChange {
    pub fn new(record: ChangeRecord) -> Self {
        Self {
            record,
            transitions: Vec::new(),
        }
    }

    /// Status after every journaled transition, without lifecycle checks.
    pub fn current_status(&self) -> ChangeStatus {
        self.transitions
            .last()
            .map_or(self.record.status, |transition| transition.to)
    }
}

/// Sink for change log writes.
///
/// Calls happen under the change log's write lock, before the in-memory
/// commit. An error rejects the write.
pub trait ChangeJournal {
    fn append(&self, record: &ChangeRecord) -> CoreResult<()>;
    fn record_transition(
        &self,
        change_id: &str,
        from: ChangeStatus,
        to: ChangeStatus,
        at: i64,
    ) -> CoreResult<()>;
    /// Every persisted record in append order, with its transitions.
    fn load_all(&self) -> CoreResult<Vec<JournaledChange>>;
}

/// Journal that keeps nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullJournal;

impl ChangeJournal for NullJournal {
    fn append(&self, _record: &ChangeRecord) -> CoreResult<()> {
        Ok(())
    }

    fn record_transition(
        &self,
        _change_id: &str,
        _from: ChangeStatus,
        _to: ChangeStatus,
        _at: i64,
    ) -> CoreResult<()> {
        Ok(())
    }

    fn load_all(&self) -> CoreResult<Vec<JournaledChange>> {
        Ok(Vec::new())
    }
}

/// SQLite-backed change journal.
pub struct SqliteChangeJournal<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteChangeJournal<'conn> {
    /// Creates a journal over a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> CoreResult<Self> {
        let version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        let expected = latest_version();
        if version != expected {
            return Err(DbError::InvalidData(format!(
                "change journal requires schema version {expected}, got {version}"
            ))
            .into());
        }
        Ok(Self { conn })
    }

    /// Transitions persisted for one change, oldest first.
    pub fn transitions_of(&self, change_id: &str) -> CoreResult<Vec<StatusTransition>> {
        let mut stmt = self.conn.prepare(
            "SELECT from_status, to_status, transitioned_at
             FROM change_status_transitions
             WHERE change_id = ?1
             ORDER BY seq ASC;",
        )?;
        let mut rows = stmt.query([change_id])?;
        let mut transitions = Vec::new();
        while let Some(row) = rows.next()? {
            transitions.push(parse_transition_row(row)?);
        }
        Ok(transitions)
    }
}

impl ChangeJournal for SqliteChangeJournal<'_> {
    fn append(&self, record: &ChangeRecord) -> CoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO change_records (
                id,
                domain,
                artifact_id,
                change_type,
                severity,
                initial_status,
                timestamp,
                author,
                before_value,
                after_value
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                record.id.as_str(),
                record.domain.as_str(),
                record.artifact_id.as_str(),
                record.change_type.as_str(),
                record.severity.as_str(),
                record.status.as_str(),
                record.timestamp,
                record.author.as_str(),
                record.before_value.as_deref(),
                record.after_value.as_deref(),
            ],
        )?;
        for (domain, count) in &record.impacted_items {
            tx.execute(
                "INSERT INTO change_impacts (change_id, domain, impacted_count)
                 VALUES (?1, ?2, ?3);",
                params![record.id.as_str(), domain.as_str(), i64::from(*count)],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn record_transition(
        &self,
        change_id: &str,
        from: ChangeStatus,
        to: ChangeStatus,
        at: i64,
    ) -> CoreResult<()> {
        self.conn.execute(
            "INSERT INTO change_status_transitions (
                change_id,
                from_status,
                to_status,
                transitioned_at
            ) VALUES (?1, ?2, ?3, ?4);",
            params![change_id, from.as_str(), to.as_str(), at],
        )?;
        Ok(())
    }

    fn load_all(&self) -> CoreResult<Vec<JournaledChange>> {
        let impacts = self.load_impacts()?;

        let mut stmt = self.conn.prepare(
            "SELECT
                id,
                domain,
                artifact_id,
                change_type,
                severity,
                initial_status,
                timestamp,
                author,
                before_value,
                after_value
             FROM change_records
             ORDER BY seq ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut history = Vec::new();
        let mut positions = HashMap::new();
        while let Some(row) = rows.next()? {
            let mut record = parse_change_row(row)?;
            if let Some(counts) = impacts.get(&record.id) {
                record.impacted_items = counts.clone();
            }
            positions.insert(record.id.clone(), history.len());
            history.push(JournaledChange::new(record));
        }

        let mut stmt = self.conn.prepare(
            "SELECT change_id, from_status, to_status, transitioned_at
             FROM change_status_transitions
             ORDER BY seq ASC;",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let change_id: String = row.get("change_id")?;
            let position = positions.get(&change_id).copied().ok_or_else(|| {
                DbError::InvalidData(format!("transition for unknown change `{change_id}`"))
            })?;
            history[position].transitions.push(parse_transition_row(row)?);
        }

        Ok(history)
    }
}

impl SqliteChangeJournal<'_> {
    fn load_impacts(&self) -> CoreResult<HashMap<String, ImpactCounts>> {
        let mut stmt = self
            .conn
            .prepare("SELECT change_id, domain, impacted_count FROM change_impacts;")?;
        let mut rows = stmt.query([])?;
        let mut impacts: HashMap<String, ImpactCounts> = HashMap::new();
        while let Some(row) = rows.next()? {
            let change_id: String = row.get("change_id")?;
            let domain_text: String = row.get("domain")?;
            let domain = Domain::parse(&domain_text).ok_or_else(|| {
                DbError::InvalidData(format!("invalid domain `{domain_text}` in change_impacts"))
            })?;
            let count: i64 = row.get("impacted_count")?;
            let count = u32::try_from(count).map_err(|_| {
                DbError::InvalidData(format!("invalid impacted_count `{count}`"))
            })?;
            impacts.entry(change_id).or_default().insert(domain, count);
        }
        Ok(impacts)
    }
}

fn parse_change_row(row: &Row<'_>) -> CoreResult<ChangeRecord> {
    let domain_text: String = row.get("domain")?;
    let domain = Domain::parse(&domain_text).ok_or_else(|| {
        DbError::InvalidData(format!("invalid domain `{domain_text}` in change_records"))
    })?;
    let type_text: String = row.get("change_type")?;
    let change_type = ChangeType::parse(&type_text).ok_or_else(|| {
        DbError::InvalidData(format!("invalid change_type `{type_text}`"))
    })?;
    let severity_text: String = row.get("severity")?;
    let severity = Severity::parse(&severity_text).ok_or_else(|| {
        DbError::InvalidData(format!("invalid severity `{severity_text}`"))
    })?;
    let status = parse_status(&row.get::<_, String>("initial_status")?)?;

    let record = ChangeRecord {
        id: row.get("id")?,
        domain,
        artifact_id: row.get("artifact_id")?,
        change_type,
        severity,
        status,
        timestamp: row.get("timestamp")?,
        author: row.get("author")?,
        before_value: row.get("before_value")?,
        after_value: row.get("after_value")?,
        impacted_items: ImpactCounts::new(),
    };
    record.validate()?;
    Ok(record)
}

fn parse_transition_row(row: &Row<'_>) -> CoreResult<StatusTransition> {
    Ok(StatusTransition {
        from: parse_status(&row.get::<_, String>("from_status")?)?,
        to: parse_status(&row.get::<_, String>("to_status")?)?,
        at: row.get("transitioned_at")?,
    })
}

fn parse_status(value: &str) -> CoreResult<ChangeStatus> {
    ChangeStatus::parse(value)
        .ok_or_else(|| DbError::InvalidData(format!("invalid status `{value}`")).into())
}
