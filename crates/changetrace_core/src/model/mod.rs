//! Domain model for the change-impact and traceability graph.
//!
//! # Responsibility
//! - Define canonical data structures used by every core component.
//! - Keep invariant checks next to the types they protect.
//!
//! # Invariants
//! - Artifacts are immutable and superseded, never edited.
//! - Change records are write-once apart from `status`.
//! - `RelationshipType::None` never appears in a stored link.

pub mod artifact;
pub mod change;
pub mod domain;
pub mod trace;
