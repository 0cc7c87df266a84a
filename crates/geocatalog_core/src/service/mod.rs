//! Core use-case services: the sequential import → merge → query pipeline.
//!
//! # Responsibility
//! - Orchestrate repository calls into batch import, merge, and query APIs.
//! - Keep callers decoupled from storage details.
//!
//! # Invariants
//! - The pipeline is strictly sequential: geometry import, then attribute
//!   merge, then read-only aggregation.

pub mod import_service;
pub mod merge_service;
pub mod query_service;
