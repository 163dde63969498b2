//! Rehabilitation goal data models.
//!
//! This crate defines the goal hierarchy (long-term, monthly, weekly) shared
//! by the breakdown and cascade engines.

#![warn(missing_docs)]

// Core identities
mod id;

// Goal hierarchy
mod goal;
mod criteria;
mod config;

// Re-exports
pub use id::*;

pub use goal::{Goal, GoalPatch, GoalSpec, GoalStatus, ParseError, Tier};
pub use criteria::{EvaluationCriteria, Provenance};
pub use config::BreakdownConfig;

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
