//! Core configuration.
//!
//! # Responsibility
//! - Hold the tunables recognized by the core and their defaults.
//! - Parse and validate configuration supplied by the host application.
//!
//! # Invariants
//! - A `CoreConfig` handed to the service has passed `validate()`.

use crate::error::ValidationError;
use crate::logging::LogSettings;
use crate::model::change::ChangeRecord;
use crate::query::engine::Queryable;
use crate::repo::trace_graph::PropagationDirection;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_PROPAGATION_HOPS: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 25;
const MAX_PAGE_SIZE: u32 = 1_000;

const DEFAULT_SEARCHABLE_FIELDS: &[&str] = &[
    "id",
    "artifactId",
    "author",
    "changeType",
    "severity",
    "status",
    "beforeValue",
    "afterValue",
];

/// Tunables recognized by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CoreConfig {
    /// Impact traversal depth. `1` means direct neighbors only.
    pub max_propagation_hops: u32,
    /// Link directions followed by impact traversal.
    pub propagation_direction: PropagationDirection,
    /// Page size used when a page request does not set one.
    pub default_page_size: u32,
    /// Change record fields the query engine searches by default.
    pub searchable_fields: Vec<String>,
    /// File log sink installed by the service. `None` leaves logging to the
    /// host.
    pub logging: Option<LogSettings>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_propagation_hops: DEFAULT_MAX_PROPAGATION_HOPS,
            propagation_direction: PropagationDirection::Both,
            default_page_size: DEFAULT_PAGE_SIZE,
            searchable_fields: DEFAULT_SEARCHABLE_FIELDS
                .iter()
                .map(|field| field.to_string())
                .collect(),
            logging: None,
        }
    }
}

impl CoreConfig {
    /// Parses a JSON config document; missing keys take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ValidationError> {
        let config: CoreConfig =
            serde_json::from_str(raw).map_err(|err| ValidationError::InvalidConfig {
                field: "config",
                message: err.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_propagation_hops == 0 {
            return Err(ValidationError::InvalidConfig {
                field: "maxPropagationHops",
                message: "must be >= 1".to_string(),
            });
        }
        if self.default_page_size == 0 || self.default_page_size > MAX_PAGE_SIZE {
            return Err(ValidationError::InvalidConfig {
                field: "defaultPageSize",
                message: format!("must be within 1..={MAX_PAGE_SIZE}"),
            });
        }
        if let Some(unknown) = self
            .searchable_fields
            .iter()
            .find(|field| !ChangeRecord::FIELDS.contains(&field.as_str()))
        {
            return Err(ValidationError::InvalidConfig {
                field: "searchableFields",
                message: format!("unknown change record field `{unknown}`"),
            });
        }
        if let Some(logging) = &self.logging {
            logging
                .validate()
                .map_err(|err| ValidationError::InvalidConfig {
                    field: "logging.dir",
                    message: err.to_string(),
                })?;
        }
        Ok(())
    }
}
