//! Read-side shaping of core data: record queries and trace matrices.

pub mod engine;
pub mod matrix;
