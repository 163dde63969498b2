//! Cascade completion
//!
//! Reacts to goal status changes by walking the goal tree upward: when every
//! sibling of a goal is closed and at least one was completed, the parent is
//! proposed for completion, confirmed through a collaborator, written, and
//! evaluated in turn. Completing the last open long-term goal archives the
//! tree.

#![warn(missing_docs)]

pub mod evaluator;
pub mod confirm;
pub mod engine;

pub use evaluator::{CascadeConfig, CascadeEvaluator, CascadeOutcome, PromotionProposal};
pub use confirm::{AutoConfirm, Confirmation, PromotionConfirmer};
pub use engine::{CascadeEngine, CascadeReport, CascadeTermination};

use rehab_core::{GoalId, Tier};
use rehab_storage::StorageError;

/// Result type for cascade operations.
pub type Result<T> = std::result::Result<T, CascadeError>;

/// Failures while evaluating or applying a cascade. A failed step performs no
/// write, so the caller can retry it.
#[derive(Debug, thiserror::Error)]
pub enum CascadeError {
    /// Reading or writing goals failed
    #[error("store error: {0}")]
    Store(#[from] StorageError),

    /// The goal points at a parent that does not exist
    #[error("parent {parent} of goal {goal} not found")]
    ParentNotFound {
        /// Goal whose parent is missing
        goal: GoalId,
        /// Missing parent
        parent: GoalId,
    },

    /// Parent and child tiers are not adjacent
    #[error("goal {goal} is {child} but its parent {parent} is {parent_tier}")]
    TierMismatch {
        /// Child goal
        goal: GoalId,
        /// Child tier
        child: Tier,
        /// Parent goal
        parent: GoalId,
        /// Parent tier
        parent_tier: Tier,
    },

    /// Handing the finished tree to the archive failed
    #[error("archive error: {0}")]
    Archive(#[source] StorageError),
}
