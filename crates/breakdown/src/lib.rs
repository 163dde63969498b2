//! Goal breakdown (tier decomposition)
//!
//! Splits a long-term or monthly goal into the next tier down, checks a
//! proposed split against its parent, and suggests split configurations from
//! a patient's history. Everything here is pure; persisting the generated
//! children is the caller's job.

#![warn(missing_docs)]

pub mod decompose;
pub mod validator;
pub mod suggest;

pub use decompose::{decompose, BreakdownResult};
pub use validator::{validate, ValidationReport};
pub use suggest::{suggest, SuggestionSet};

use rehab_core::{GoalId, Tier};

/// Result type for breakdown operations.
pub type Result<T> = std::result::Result<T, BreakdownError>;

/// Input errors that stop a breakdown before any child is produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BreakdownError {
    /// Start or end date is missing
    #[error("goal {0} needs both a start and an end date to be broken down")]
    MissingDates(GoalId),

    /// Start date after end date
    #[error("goal {0} starts after it ends")]
    InvertedDates(GoalId),

    /// Weekly goals are leaves
    #[error("{0} goals cannot be broken down")]
    NotDecomposable(Tier),

    /// Target rate outside 0-100
    #[error("goal {0} has target completion rate {1}%, expected 0-100")]
    InvalidRate(GoalId, u8),

    /// Zero children requested
    #[error("child count must be at least 1")]
    InvalidChildCount,

    /// Period arithmetic left the representable date range
    #[error("date out of range while scheduling child {0}")]
    DateOverflow(u32),
}
