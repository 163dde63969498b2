//! Store and archive collaborator traits.

use async_trait::async_trait;
use rehab_core::{Goal, GoalId, GoalPatch, GoalStatus, PatientId, Tier, Time};
use serde::{Deserialize, Serialize};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Which statuses a patient/tier query should return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StatusFilter {
    /// No filtering
    #[default]
    Any,
    /// Only goals in one of these statuses
    Only(Vec<GoalStatus>),
    /// Goals in any status except these
    Excluding(Vec<GoalStatus>),
}

impl StatusFilter {
    /// Whether a status passes the filter.
    pub fn matches(&self, status: GoalStatus) -> bool {
        match self {
            StatusFilter::Any => true,
            StatusFilter::Only(statuses) => statuses.contains(&status),
            StatusFilter::Excluding(statuses) => !statuses.contains(&status),
        }
    }
}

/// Row store for goal records.
///
/// Implementations decide how goals are persisted; the breakdown and cascade
/// engines only go through this interface.
#[async_trait]
pub trait GoalStore: Send + Sync {
    /// Load a goal by ID.
    async fn fetch_goal(&self, id: GoalId) -> Result<Option<Goal>>;

    /// Direct children of a goal, ordered by sequence number.
    async fn fetch_children(&self, parent_id: GoalId) -> Result<Vec<Goal>>;

    /// All goals sharing `parent_id`, including the one that triggered the
    /// lookup. Ordered by sequence number.
    async fn fetch_siblings(&self, parent_id: GoalId) -> Result<Vec<Goal>> {
        self.fetch_children(parent_id).await
    }

    /// Persist new goals.
    async fn create_goals(&mut self, goals: &[Goal]) -> Result<()>;

    /// Apply a partial update and return the updated goal.
    async fn update_goal(&mut self, id: GoalId, patch: &GoalPatch) -> Result<Goal>;

    /// A patient's goals of one tier whose status passes `filter`.
    async fn fetch_goals_by_patient_and_tier(
        &self,
        patient_id: PatientId,
        tier: Tier,
        filter: &StatusFilter,
    ) -> Result<Vec<Goal>>;

    /// Every stored goal.
    async fn list_goals(&self) -> Result<Vec<Goal>>;
}

/// Copy-out snapshot of a finished goal tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedTree {
    /// The long-term goal at the root
    pub root_goal_id: GoalId,

    /// Owning patient
    pub patient_id: PatientId,

    /// Root and all descendants, root first
    pub goals: Vec<Goal>,

    /// When the snapshot was taken
    pub archived_at: Time,
}

/// Receives completed goal trees. Archival never removes goals from the store.
#[async_trait]
pub trait GoalArchiver: Send + Sync {
    /// Archive a goal tree.
    async fn archive_goal_tree(&mut self, tree: &ArchivedTree) -> Result<()>;

    /// Whether a tree rooted at `root_goal_id` has already been archived.
    async fn is_archived(&self, root_goal_id: GoalId) -> Result<bool>;
}

/// Order goals by sequence number, root goals (no sequence) by start date.
pub(crate) fn sort_siblings(goals: &mut [Goal]) {
    goals.sort_by(|a, b| {
        a.sequence_number
            .cmp(&b.sequence_number)
            .then(a.start_date.cmp(&b.start_date))
            .then(a.id.cmp(&b.id))
    });
}
