//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate registry, graph, change log and analyses into use-case
//!   level APIs.
//! - Keep presentation layers decoupled from storage details.

pub mod trace_service;
