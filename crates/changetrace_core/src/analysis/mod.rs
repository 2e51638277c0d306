//! Derived-value computations over a trace graph snapshot.
//!
//! Both analyses are read-only: they take `&TraceGraph` and never infer or
//! add links.

pub mod coverage;
pub mod impact;
