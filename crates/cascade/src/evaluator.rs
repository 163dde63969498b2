//! Read-only cascade evaluation for one status change.

use rehab_core::{Goal, GoalId, GoalStatus, PatientId, Tier};
use rehab_storage::{GoalStore, StatusFilter};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{CascadeError, Result};

/// Configuration for cascade evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeConfig {
    /// Weekly slots a long-term goal is expected to hold (6 months × 4 weeks).
    /// Used as the denominator of a long-term goal's completion rate no matter
    /// how its months were actually broken down.
    pub expected_weekly_slots: u32,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            expected_weekly_slots: 24,
        }
    }
}

/// A parent goal whose children are all closed, awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionProposal {
    /// Goal to mark completed
    pub parent_id: GoalId,

    /// Its tier
    pub parent_tier: Tier,

    /// Its title, for the confirmation prompt
    pub parent_title: String,

    /// Owning patient
    pub patient_id: PatientId,

    /// Rate to record on the parent
    pub actual_completion_rate: u8,

    /// Completed children
    pub completed_children: usize,

    /// Cancelled children
    pub cancelled_children: usize,
}

/// What a status change calls for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeOutcome {
    /// Nothing to do
    NoAction,

    /// The parent can be completed once confirmed
    ProposeParentCompletion(PromotionProposal),

    /// The patient's last long-term goal is complete: archive its tree and
    /// reset the patient to "needs new goal"
    ArchiveAndReset {
        /// Root of the finished tree
        root_goal_id: GoalId,
        /// Patient to reset
        patient_id: PatientId,
    },
}

/// Decides the cascade outcome of a status change. Performs no writes, so
/// evaluating the same state twice yields the same outcome.
#[derive(Debug, Clone, Default)]
pub struct CascadeEvaluator {
    config: CascadeConfig,
}

impl CascadeEvaluator {
    /// Create an evaluator with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: CascadeConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Evaluate `goal`, whose status has just been written.
    pub async fn evaluate<S>(&self, store: &S, goal: &Goal) -> Result<CascadeOutcome>
    where
        S: GoalStore + ?Sized,
    {
        let Some(parent_id) = goal.parent_id else {
            return self.evaluate_root(store, goal).await;
        };

        let parent = store
            .fetch_goal(parent_id)
            .await?
            .ok_or(CascadeError::ParentNotFound {
                goal: goal.id,
                parent: parent_id,
            })?;
        if goal.tier.parent() != Some(parent.tier) {
            return Err(CascadeError::TierMismatch {
                goal: goal.id,
                child: goal.tier,
                parent: parent.id,
                parent_tier: parent.tier,
            });
        }
        if parent.status.is_terminal() {
            debug!("Parent {} already {}", parent.id, parent.status);
            return Ok(CascadeOutcome::NoAction);
        }

        let mut siblings = store.fetch_siblings(parent_id).await?;
        if let Some(stored) = siblings.iter_mut().find(|s| s.id == goal.id) {
            *stored = goal.clone();
        }
        if siblings.is_empty() {
            debug!("No siblings found under {}", parent_id);
            return Ok(CascadeOutcome::NoAction);
        }

        let open = siblings.iter().filter(|s| !s.status.is_terminal()).count();
        if open > 0 {
            debug!("{} of {} siblings under {} still open", open, siblings.len(), parent_id);
            return Ok(CascadeOutcome::NoAction);
        }

        let completed = siblings
            .iter()
            .filter(|s| s.status == GoalStatus::Completed)
            .count();
        if completed == 0 {
            debug!("All siblings under {} cancelled, not promoting", parent_id);
            return Ok(CascadeOutcome::NoAction);
        }

        let actual_completion_rate = match parent.tier {
            Tier::LongTerm => self.long_term_rate(store, &siblings).await?,
            _ => 100,
        };

        Ok(CascadeOutcome::ProposeParentCompletion(PromotionProposal {
            parent_id: parent.id,
            parent_tier: parent.tier,
            parent_title: parent.title.clone(),
            patient_id: parent.patient_id,
            actual_completion_rate,
            completed_children: completed,
            cancelled_children: siblings.len() - completed,
        }))
    }

    /// A root goal can only end the tree: a completed long-term goal with no
    /// other uncompleted long-term goal for the patient triggers archival.
    async fn evaluate_root<S>(&self, store: &S, goal: &Goal) -> Result<CascadeOutcome>
    where
        S: GoalStore + ?Sized,
    {
        if goal.tier != Tier::LongTerm || goal.status != GoalStatus::Completed {
            return Ok(CascadeOutcome::NoAction);
        }

        let remaining = store
            .fetch_goals_by_patient_and_tier(
                goal.patient_id,
                Tier::LongTerm,
                &StatusFilter::Excluding(vec![GoalStatus::Completed]),
            )
            .await?
            .into_iter()
            .filter(|g| g.id != goal.id)
            .count();
        if remaining > 0 {
            debug!(
                "Patient {} still has {} uncompleted long-term goals",
                goal.patient_id, remaining
            );
            return Ok(CascadeOutcome::NoAction);
        }

        Ok(CascadeOutcome::ArchiveAndReset {
            root_goal_id: goal.id,
            patient_id: goal.patient_id,
        })
    }

    /// Completed weekly goals across all months, over the expected slot count.
    async fn long_term_rate<S>(&self, store: &S, months: &[Goal]) -> Result<u8>
    where
        S: GoalStore + ?Sized,
    {
        let mut completed_weeks = 0u32;
        for month in months {
            completed_weeks += store
                .fetch_children(month.id)
                .await?
                .iter()
                .filter(|w| w.tier == Tier::Weekly && w.status == GoalStatus::Completed)
                .count() as u32;
        }
        Ok(completion_rate(completed_weeks, self.config.expected_weekly_slots))
    }
}

/// `round(100 × done / slots)`, capped at 100.
fn completion_rate(done: u32, slots: u32) -> u8 {
    if slots == 0 {
        return 100;
    }
    let rate = (200 * u64::from(done) + u64::from(slots)) / (2 * u64::from(slots));
    rate.min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rehab_breakdown::decompose;
    use rehab_core::{BreakdownConfig, GoalPatch};
    use rehab_storage::{MemoryStore, StorageError};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// A long-term goal broken into 6 months of 4 weeks each.
    struct Tree {
        root: Goal,
        months: Vec<Goal>,
        weeks: Vec<Vec<Goal>>,
    }

    fn build_tree() -> Tree {
        let root = Goal::long_term(PatientId::new(), "Walk 100m unaided", date(2025, 1, 1), date(2025, 6, 30));
        let months: Vec<Goal> = decompose(&root, &BreakdownConfig::for_tier(Tier::LongTerm).unwrap())
            .unwrap()
            .children
            .into_iter()
            .map(|s| s.into_goal())
            .collect();
        let weeks = months
            .iter()
            .map(|m| {
                decompose(m, &BreakdownConfig::for_tier(Tier::Monthly).unwrap())
                    .unwrap()
                    .children
                    .into_iter()
                    .map(|s| s.into_goal())
                    .collect()
            })
            .collect();
        Tree { root, months, weeks }
    }

    fn set_status(goal: &mut Goal, status: GoalStatus) {
        goal.apply_patch(&GoalPatch::status(status));
    }

    fn store_of(tree: &Tree) -> MemoryStore {
        let mut goals = vec![tree.root.clone()];
        goals.extend(tree.months.iter().cloned());
        goals.extend(tree.weeks.iter().flatten().cloned());
        MemoryStore::with_goals(goals)
    }

    #[tokio::test]
    async fn test_open_sibling_means_no_action() {
        let mut tree = build_tree();
        for week in tree.weeks[0].iter_mut().take(3) {
            set_status(week, GoalStatus::Completed);
        }
        let store = store_of(&tree);

        let outcome = CascadeEvaluator::new()
            .evaluate(&store, &tree.weeks[0][2])
            .await
            .unwrap();
        assert_eq!(outcome, CascadeOutcome::NoAction);
    }

    #[tokio::test]
    async fn test_month_promoted_at_full_rate() {
        let mut tree = build_tree();
        for week in tree.weeks[0].iter_mut().take(3) {
            set_status(week, GoalStatus::Completed);
        }
        set_status(&mut tree.weeks[0][3], GoalStatus::Cancelled);
        let store = store_of(&tree);

        let outcome = CascadeEvaluator::new()
            .evaluate(&store, &tree.weeks[0][3])
            .await
            .unwrap();
        let CascadeOutcome::ProposeParentCompletion(proposal) = outcome else {
            panic!("expected a promotion proposal");
        };
        assert_eq!(proposal.parent_id, tree.months[0].id);
        assert_eq!(proposal.parent_tier, Tier::Monthly);
        assert_eq!(proposal.actual_completion_rate, 100);
        assert_eq!(proposal.completed_children, 3);
        assert_eq!(proposal.cancelled_children, 1);
    }

    #[tokio::test]
    async fn test_triggering_goal_overrides_stale_row() {
        let mut tree = build_tree();
        for week in tree.weeks[0].iter_mut().take(3) {
            set_status(week, GoalStatus::Completed);
        }
        let store = store_of(&tree);

        let mut changed = tree.weeks[0][3].clone();
        set_status(&mut changed, GoalStatus::Completed);
        let outcome = CascadeEvaluator::new().evaluate(&store, &changed).await.unwrap();
        assert!(matches!(outcome, CascadeOutcome::ProposeParentCompletion(_)));
    }

    #[tokio::test]
    async fn test_all_cancelled_never_promotes() {
        let mut tree = build_tree();
        for week in tree.weeks[1].iter_mut() {
            set_status(week, GoalStatus::Cancelled);
        }
        let store = store_of(&tree);

        let outcome = CascadeEvaluator::new()
            .evaluate(&store, &tree.weeks[1][0])
            .await
            .unwrap();
        assert_eq!(outcome, CascadeOutcome::NoAction);
    }

    #[tokio::test]
    async fn test_long_term_rate_counts_completed_weeks() {
        let mut tree = build_tree();
        // 18 of 24 weeks completed: three weeks cancelled in each of the first two months
        for (m, weeks) in tree.weeks.iter_mut().enumerate() {
            for (w, week) in weeks.iter_mut().enumerate() {
                let status = if m < 2 && w > 0 {
                    GoalStatus::Cancelled
                } else {
                    GoalStatus::Completed
                };
                set_status(week, status);
            }
        }
        for month in tree.months.iter_mut() {
            set_status(month, GoalStatus::Completed);
        }
        let store = store_of(&tree);

        let outcome = CascadeEvaluator::new()
            .evaluate(&store, &tree.months[5])
            .await
            .unwrap();
        let CascadeOutcome::ProposeParentCompletion(proposal) = outcome else {
            panic!("expected a promotion proposal");
        };
        assert_eq!(proposal.parent_id, tree.root.id);
        assert_eq!(proposal.actual_completion_rate, 75);
    }

    #[tokio::test]
    async fn test_evaluation_is_idempotent() {
        let mut tree = build_tree();
        for week in tree.weeks[2].iter_mut() {
            set_status(week, GoalStatus::Completed);
        }
        let store = store_of(&tree);
        let evaluator = CascadeEvaluator::new();

        let first = evaluator.evaluate(&store, &tree.weeks[2][1]).await.unwrap();
        let second = evaluator.evaluate(&store, &tree.weeks[2][1]).await.unwrap();
        assert_eq!(first, second);
        assert!(matches!(first, CascadeOutcome::ProposeParentCompletion(_)));
    }

    #[tokio::test]
    async fn test_completed_parent_not_proposed_again() {
        let mut tree = build_tree();
        for week in tree.weeks[0].iter_mut() {
            set_status(week, GoalStatus::Completed);
        }
        set_status(&mut tree.months[0], GoalStatus::Completed);
        let store = store_of(&tree);

        let outcome = CascadeEvaluator::new()
            .evaluate(&store, &tree.weeks[0][0])
            .await
            .unwrap();
        assert_eq!(outcome, CascadeOutcome::NoAction);
    }

    #[tokio::test]
    async fn test_cancelled_parent_not_proposed() {
        let mut tree = build_tree();
        for week in tree.weeks[0].iter_mut() {
            set_status(week, GoalStatus::Completed);
        }
        set_status(&mut tree.months[0], GoalStatus::Cancelled);
        let store = store_of(&tree);

        let outcome = CascadeEvaluator::new()
            .evaluate(&store, &tree.weeks[0][3])
            .await
            .unwrap();
        assert_eq!(outcome, CascadeOutcome::NoAction);
    }

    #[tokio::test]
    async fn test_empty_sibling_set_is_no_action() {
        let tree = build_tree();
        // Only the parent is stored; the sibling query comes back empty.
        let store = MemoryStore::with_goals([tree.root.clone(), tree.months[0].clone()]);

        let mut week = tree.weeks[0][0].clone();
        set_status(&mut week, GoalStatus::Completed);
        let outcome = CascadeEvaluator::new().evaluate(&store, &week).await.unwrap();
        assert_eq!(outcome, CascadeOutcome::NoAction);
    }

    #[tokio::test]
    async fn test_missing_parent_is_an_error() {
        let tree = build_tree();
        let store = MemoryStore::new();

        let result = CascadeEvaluator::new().evaluate(&store, &tree.months[0]).await;
        assert!(matches!(result, Err(CascadeError::ParentNotFound { .. })));
    }

    #[tokio::test]
    async fn test_skipped_tier_is_an_error() {
        let tree = build_tree();
        let mut week = tree.weeks[0][0].clone();
        week.parent_id = Some(tree.root.id);
        let store = store_of(&tree);

        let result = CascadeEvaluator::new().evaluate(&store, &week).await;
        assert!(matches!(result, Err(CascadeError::TierMismatch { .. })));
    }

    #[tokio::test]
    async fn test_root_completion_archives_when_last() {
        let mut tree = build_tree();
        set_status(&mut tree.root, GoalStatus::Completed);
        let store = store_of(&tree);

        let outcome = CascadeEvaluator::new().evaluate(&store, &tree.root).await.unwrap();
        assert_eq!(
            outcome,
            CascadeOutcome::ArchiveAndReset {
                root_goal_id: tree.root.id,
                patient_id: tree.root.patient_id,
            }
        );
    }

    #[tokio::test]
    async fn test_root_completion_waits_for_other_long_term_goals() {
        let mut tree = build_tree();
        set_status(&mut tree.root, GoalStatus::Completed);
        let mut store = store_of(&tree);
        store.insert(Goal::long_term(
            tree.root.patient_id,
            "Cook a meal",
            date(2025, 7, 1),
            date(2025, 12, 31),
        ));

        let outcome = CascadeEvaluator::new().evaluate(&store, &tree.root).await.unwrap();
        assert_eq!(outcome, CascadeOutcome::NoAction);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        struct FailingStore;

        #[async_trait]
        impl GoalStore for FailingStore {
            async fn fetch_goal(&self, _id: GoalId) -> rehab_storage::Result<Option<Goal>> {
                Err(StorageError::Other("connection reset".to_string()))
            }
            async fn fetch_children(&self, _parent_id: GoalId) -> rehab_storage::Result<Vec<Goal>> {
                Err(StorageError::Other("connection reset".to_string()))
            }
            async fn create_goals(&mut self, _goals: &[Goal]) -> rehab_storage::Result<()> {
                Ok(())
            }
            async fn update_goal(&mut self, _id: GoalId, _patch: &GoalPatch) -> rehab_storage::Result<Goal> {
                Err(StorageError::Other("connection reset".to_string()))
            }
            async fn fetch_goals_by_patient_and_tier(
                &self,
                _patient_id: PatientId,
                _tier: Tier,
                _filter: &StatusFilter,
            ) -> rehab_storage::Result<Vec<Goal>> {
                Err(StorageError::Other("connection reset".to_string()))
            }
            async fn list_goals(&self) -> rehab_storage::Result<Vec<Goal>> {
                Ok(vec![])
            }
        }

        let tree = build_tree();
        let result = CascadeEvaluator::new()
            .evaluate(&FailingStore, &tree.weeks[0][0])
            .await;
        assert!(matches!(result, Err(CascadeError::Store(_))));
    }

    #[test]
    fn test_completion_rate_rounding() {
        assert_eq!(completion_rate(18, 24), 75);
        assert_eq!(completion_rate(24, 24), 100);
        assert_eq!(completion_rate(1, 24), 4);
        assert_eq!(completion_rate(0, 24), 0);
        assert_eq!(completion_rate(30, 24), 100);
        assert_eq!(completion_rate(5, 0), 100);
    }
}
