//! Generic search/filter/sort/paginate engine.
//!
//! # Responsibility
//! - Shape any collection of queryable records into one result page.
//! - Take every option as an explicit value; the engine holds no view state.
//!
//! # Invariants
//! - Stage order is fixed: search, filter, sort, paginate.
//! - Sorting is total: ties always break by record id ascending.
//! - Pages past the end are empty but still report `total_count`.

use crate::config::CoreConfig;
use crate::error::{CoreResult, ValidationError};
use crate::model::change::ChangeRecord;
use std::collections::{BTreeMap, BTreeSet};

/// Record shape the query engine can operate on.
///
/// Implement this for domain-specific extensions of `ChangeRecord` by
/// delegating the shared fields and adding the extra ones.
pub trait Queryable: Clone {
    /// Field names accepted by search, filter and sort.
    const FIELDS: &'static [&'static str];

    /// Unique id used as the final sort tie-breaker.
    fn record_id(&self) -> &str;

    /// Textual representation of a field, `None` when the field is unset.
    fn field_text(&self, field: &str) -> Option<String>;

    /// Sort key of a field. Defaults to the textual representation.
    fn sort_value(&self, field: &str) -> Option<SortValue> {
        self.field_text(field).map(SortValue::Text)
    }
}

/// Comparable sort key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortValue {
    Number(i64),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Case-insensitive substring. Blank means no search.
    pub query: String,
    /// Fields to search; `None` uses the engine's configured list.
    pub fields: Option<Vec<String>>,
}

impl SearchOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            fields: None,
        }
    }

    pub fn in_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}

/// Conjunction of per-field allowed-value sets.
///
/// An empty value set places no restriction on its field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub predicates: BTreeMap<String, BTreeSet<String>>,
}

impl FilterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<I, S>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.predicates
            .entry(field.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// Single active sort key. Defaults to `timestamp` descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOptions {
    pub field: String,
    pub direction: SortDirection,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            field: "timestamp".to_string(),
            direction: SortDirection::Descending,
        }
    }
}

impl SortOptions {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Header-click behavior: same field flips direction, a new field
    /// starts ascending.
    pub fn toggle(&self, field: &str) -> Self {
        if self.field == field {
            Self::new(field, self.direction.toggled())
        } else {
            Self::new(field, SortDirection::Ascending)
        }
    }
}

/// 1-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    pub page: u32,
    /// `None` uses the engine's default page size.
    pub page_size: Option<u32>,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: None,
        }
    }
}

impl PageOptions {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size: Some(page_size),
        }
    }
}

/// Full set of options for one engine run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRequest {
    pub search: SearchOptions,
    pub filter: FilterOptions,
    pub sort: SortOptions,
    pub page: PageOptions,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPage<T> {
    pub items: Vec<T>,
    /// Matches after search and filter, before pagination.
    pub total_count: usize,
    pub page: u32,
    pub page_size: u32,
}

impl<T> QueryPage<T> {
    /// Number of pages at this page size; `0` for a zero page size.
    pub fn page_count(&self) -> usize {
        match self.page_size {
            0 => 0,
            size => self.total_count.div_ceil(size as usize),
        }
    }
}

/// Stateless query engine configured with defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEngine {
    searchable_fields: Vec<String>,
    default_page_size: u32,
}

impl QueryEngine {
    pub fn new(searchable_fields: Vec<String>, default_page_size: u32) -> Self {
        Self {
            searchable_fields,
            default_page_size,
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(config.searchable_fields.clone(), config.default_page_size)
    }

    /// Runs search, filter, sort and paginate over `records`.
    ///
    /// # Errors
    /// - `Validation` for unknown fields, page `0`, or page size `0`.
    pub fn run<T: Queryable>(
        &self,
        records: Vec<T>,
        request: &QueryRequest,
    ) -> CoreResult<QueryPage<T>> {
        let page_size = request.page.page_size.unwrap_or(self.default_page_size);
        validate_page(request.page.page, page_size)?;

        let fields = request
            .search
            .fields
            .as_ref()
            .unwrap_or(&self.searchable_fields);
        let searched = search(records, &request.search.query, fields)?;
        let mut filtered = filter(searched, &request.filter)?;
        sort(&mut filtered, &request.sort)?;
        paginate(filtered, request.page.page, page_size)
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::from_config(&CoreConfig::default())
    }
}

/// Keeps records where `query` occurs, case-insensitively, in any of
/// `fields`. A blank query returns `records` unchanged without looking at
/// `fields`.
pub fn search<T: Queryable>(
    records: Vec<T>,
    query: &str,
    fields: &[String],
) -> CoreResult<Vec<T>> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Ok(records);
    }
    ensure_known_fields::<T, _>(fields.iter().map(String::as_str))?;

    Ok(records
        .into_iter()
        .filter(|record| {
            fields.iter().any(|field| {
                record
                    .field_text(field)
                    .is_some_and(|text| text.to_lowercase().contains(&needle))
            })
        })
        .collect())
}

/// Keeps records whose textual field value is in every non-empty value set.
pub fn filter<T: Queryable>(records: Vec<T>, options: &FilterOptions) -> CoreResult<Vec<T>> {
    ensure_known_fields::<T, _>(options.predicates.keys().map(String::as_str))?;
    let active: Vec<_> = options
        .predicates
        .iter()
        .filter(|(_, allowed)| !allowed.is_empty())
        .collect();
    if active.is_empty() {
        return Ok(records);
    }

    Ok(records
        .into_iter()
        .filter(|record| {
            active.iter().all(|(field, allowed)| {
                record
                    .field_text(field)
                    .is_some_and(|value| allowed.contains(&value))
            })
        })
        .collect())
}

/// Sorts by one key; unset values sort first when ascending. Ties break by
/// id ascending in both directions.
pub fn sort<T: Queryable>(records: &mut [T], options: &SortOptions) -> CoreResult<()> {
    ensure_known_fields::<T, _>([options.field.as_str()])?;
    records.sort_by(|a, b| {
        let by_key = a
            .sort_value(&options.field)
            .cmp(&b.sort_value(&options.field));
        let by_key = match options.direction {
            SortDirection::Ascending => by_key,
            SortDirection::Descending => by_key.reverse(),
        };
        by_key.then_with(|| a.record_id().cmp(b.record_id()))
    });
    Ok(())
}

/// Cuts one 1-indexed page out of `records`.
pub fn paginate<T>(records: Vec<T>, page: u32, page_size: u32) -> CoreResult<QueryPage<T>> {
    validate_page(page, page_size)?;
    let total_count = records.len();
    let start = (page as usize - 1).saturating_mul(page_size as usize);
    let items = records
        .into_iter()
        .skip(start)
        .take(page_size as usize)
        .collect();
    Ok(QueryPage {
        items,
        total_count,
        page,
        page_size,
    })
}

fn validate_page(page: u32, page_size: u32) -> Result<(), ValidationError> {
    if page == 0 {
        return Err(ValidationError::InvalidPage);
    }
    if page_size == 0 {
        return Err(ValidationError::InvalidPageSize);
    }
    Ok(())
}

fn ensure_known_fields<'a, T, I>(fields: I) -> Result<(), ValidationError>
where
    T: Queryable,
    I: IntoIterator<Item = &'a str>,
{
    for field in fields {
        if !T::FIELDS.contains(&field) {
            return Err(ValidationError::UnknownField {
                field: field.to_string(),
            });
        }
    }
    Ok(())
}

impl Queryable for ChangeRecord {
    const FIELDS: &'static [&'static str] = &[
        "id",
        "domain",
        "artifactId",
        "changeType",
        "severity",
        "status",
        "timestamp",
        "author",
        "beforeValue",
        "afterValue",
    ];

    fn record_id(&self) -> &str {
        &self.id
    }

    fn field_text(&self, field: &str) -> Option<String> {
        match field {
            "id" => Some(self.id.clone()),
            "domain" => Some(self.domain.as_str().to_string()),
            "artifactId" => Some(self.artifact_id.clone()),
            "changeType" => Some(self.change_type.as_str().to_string()),
            "severity" => Some(self.severity.as_str().to_string()),
            "status" => Some(self.status.as_str().to_string()),
            "timestamp" => Some(self.timestamp.to_string()),
            "author" => Some(self.author.clone()),
            "beforeValue" => self.before_value.clone(),
            "afterValue" => self.after_value.clone(),
            _ => None,
        }
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "timestamp" => Some(SortValue::Number(self.timestamp)),
            // Lifecycle/severity order rather than alphabetical.
            "severity" => Some(SortValue::Number(self.severity as i64)),
            "status" => Some(SortValue::Number(self.status as i64)),
            "domain" => Some(SortValue::Number(self.domain as i64)),
            other => self.field_text(other).map(SortValue::Text),
        }
    }
}
