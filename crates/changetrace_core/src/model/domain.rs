//! Engineering domain tags.
//!
//! # Responsibility
//! - Define the closed set of disciplines an artifact can belong to.
//! - Keep per-domain metadata in one exhaustive mapping table.
//!
//! # Invariants
//! - `Domain` is a tag, never a subtype hierarchy.
//! - Adding a domain requires touching every `match` below.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Engineering discipline of an artifact.
///
/// Variant order is the canonical display order used by summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Domain {
    Mission,
    OperationalScenario,
    Requirement,
    Function,
    Logical,
    Physical,
    Parameter,
    Cad,
    Bom,
}

impl Domain {
    /// Every domain in canonical order.
    pub const ALL: [Domain; 9] = [
        Self::Mission,
        Self::OperationalScenario,
        Self::Requirement,
        Self::Function,
        Self::Logical,
        Self::Physical,
        Self::Parameter,
        Self::Cad,
        Self::Bom,
    ];

    /// Stable wire name (matches serde representation).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mission => "mission",
            Self::OperationalScenario => "operationalScenario",
            Self::Requirement => "requirement",
            Self::Function => "function",
            Self::Logical => "logical",
            Self::Physical => "physical",
            Self::Parameter => "parameter",
            Self::Cad => "cad",
            Self::Bom => "bom",
        }
    }

    /// Human-readable label for column headers and legends.
    pub fn label(self) -> &'static str {
        match self {
            Self::Mission => "Mission Objectives",
            Self::OperationalScenario => "Operational Scenarios",
            Self::Requirement => "Requirements",
            Self::Function => "Functions",
            Self::Logical => "Logical Architecture",
            Self::Physical => "Physical Architecture",
            Self::Parameter => "Parameters",
            Self::Cad => "CAD Models",
            Self::Bom => "Bill of Materials",
        }
    }

    /// Conventional artifact id prefix for this domain.
    ///
    /// Registration only warns on a mismatch; lookups never derive a domain
    /// from an id.
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Mission => "MIS",
            Self::OperationalScenario => "OPS",
            Self::Requirement => "REQ",
            Self::Function => "FUNC",
            Self::Logical => "LOG",
            Self::Physical => "PHY",
            Self::Parameter => "PAR",
            Self::Cad => "CAD",
            Self::Bom => "BOM",
        }
    }

    /// Parses a wire name. Case-sensitive, like serde.
    pub fn parse(value: &str) -> Option<Domain> {
        Self::ALL
            .into_iter()
            .find(|domain| domain.as_str() == value.trim())
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Domain;
    use std::collections::HashSet;

    #[test]
    fn wire_names_match_serde() {
        for domain in Domain::ALL {
            let json = serde_json::to_value(domain).unwrap();
            assert_eq!(json, domain.as_str());
            assert_eq!(Domain::parse(domain.as_str()), Some(domain));
        }
    }

    #[test]
    fn prefixes_are_unique() {
        let prefixes: HashSet<_> = Domain::ALL.iter().map(|d| d.id_prefix()).collect();
        assert_eq!(prefixes.len(), Domain::ALL.len());
    }

    #[test]
    fn parse_rejects_unknown_names() {
        assert_eq!(Domain::parse("OperationalScenario"), None);
        assert_eq!(Domain::parse("software"), None);
    }
}
