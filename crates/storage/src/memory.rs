//! In-memory storage, for tests and embedding.

use std::collections::HashMap;

use async_trait::async_trait;
use rehab_core::{Goal, GoalId, GoalPatch, PatientId, Tier};

use super::trait_::sort_siblings;
use super::{ArchivedTree, GoalArchiver, GoalStore, Result, StatusFilter, StorageError};

/// `HashMap`-backed goal store. Also records archived trees.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    goals: HashMap<GoalId, Goal>,
    archived: Vec<ArchivedTree>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `goals`.
    pub fn with_goals(goals: impl IntoIterator<Item = Goal>) -> Self {
        Self {
            goals: goals.into_iter().map(|g| (g.id, g)).collect(),
            archived: Vec::new(),
        }
    }

    /// Insert or replace a goal.
    pub fn insert(&mut self, goal: Goal) {
        self.goals.insert(goal.id, goal);
    }

    /// Trees archived so far.
    pub fn archived(&self) -> &[ArchivedTree] {
        &self.archived
    }

    /// Number of stored goals.
    pub fn len(&self) -> usize {
        self.goals.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }
}

#[async_trait]
impl GoalStore for MemoryStore {
    async fn fetch_goal(&self, id: GoalId) -> Result<Option<Goal>> {
        Ok(self.goals.get(&id).cloned())
    }

    async fn fetch_children(&self, parent_id: GoalId) -> Result<Vec<Goal>> {
        let mut children: Vec<Goal> = self
            .goals
            .values()
            .filter(|g| g.parent_id == Some(parent_id))
            .cloned()
            .collect();
        sort_siblings(&mut children);
        Ok(children)
    }

    async fn create_goals(&mut self, goals: &[Goal]) -> Result<()> {
        for goal in goals {
            self.goals.insert(goal.id, goal.clone());
        }
        Ok(())
    }

    async fn update_goal(&mut self, id: GoalId, patch: &GoalPatch) -> Result<Goal> {
        let goal = self
            .goals
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("goal {}", id)))?;
        goal.apply_patch(patch);
        Ok(goal.clone())
    }

    async fn fetch_goals_by_patient_and_tier(
        &self,
        patient_id: PatientId,
        tier: Tier,
        filter: &StatusFilter,
    ) -> Result<Vec<Goal>> {
        let mut goals: Vec<Goal> = self
            .goals
            .values()
            .filter(|g| g.patient_id == patient_id && g.tier == tier && filter.matches(g.status))
            .cloned()
            .collect();
        sort_siblings(&mut goals);
        Ok(goals)
    }

    async fn list_goals(&self) -> Result<Vec<Goal>> {
        let mut goals: Vec<Goal> = self.goals.values().cloned().collect();
        goals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(goals)
    }
}

#[async_trait]
impl GoalArchiver for MemoryStore {
    async fn archive_goal_tree(&mut self, tree: &ArchivedTree) -> Result<()> {
        self.archived.push(tree.clone());
        Ok(())
    }

    async fn is_archived(&self, root_goal_id: GoalId) -> Result<bool> {
        Ok(self.archived.iter().any(|t| t.root_goal_id == root_goal_id))
    }
}
