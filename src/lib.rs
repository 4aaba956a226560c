//! Casetrack - multi-tenant test case management and execution tracking.
//!
//! The core is the access-control and execution-lifecycle engine: every
//! operation is guarded by the predicates in [`access`], structural deletes
//! run through the ordered cascade in [`db::cascade`], and execution state
//! moves PENDING -> IN_PROGRESS -> COMPLETED, forward only.

pub mod access;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod pagination;
