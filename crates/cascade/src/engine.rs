//! The cascade engine - drives evaluation, confirmation and promotion.

use rehab_core::{Goal, GoalId, GoalPatch, PatientId};
use rehab_storage::{ArchivedTree, GoalArchiver, GoalStore};
use tracing::{debug, info};

use crate::confirm::{Confirmation, PromotionConfirmer};
use crate::evaluator::{CascadeConfig, CascadeEvaluator, CascadeOutcome, PromotionProposal};
use crate::{CascadeError, Result};

/// Where a cascade stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeTermination {
    /// Nothing (more) to promote
    NoAction,

    /// The confirmer said no; the parent stays un-promoted
    Declined(PromotionProposal),

    /// The confirmer gave no answer; the parent stays un-promoted
    AwaitingConfirmation(PromotionProposal),

    /// The patient's last long-term goal completed and its tree was archived.
    /// The patient record should be reset to "needs new goal".
    Archived {
        /// Root of the archived tree
        root_goal_id: GoalId,
        /// Patient to reset
        patient_id: PatientId,
    },
}

/// Everything one cascade run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeReport {
    /// Promotions written, lowest tier first
    pub promotions: Vec<PromotionProposal>,

    /// Why the cascade stopped
    pub termination: CascadeTermination,
}

/// Runs the cascade state machine:
///
/// ```text
/// Evaluate → Confirm → Promote parent → Evaluate parent → ... → Archive
/// ```
///
/// Each promotion is written before moving up a tier, so a failure part way
/// keeps every promotion already confirmed and writes nothing for the failed
/// step. Callers should run the cascade after every goal status write; a
/// cascade missed because of a concurrent sibling update is picked up by the
/// next run.
pub struct CascadeEngine<S, C, A> {
    store: S,
    confirmer: C,
    archiver: A,
    evaluator: CascadeEvaluator,
}

impl<S, C, A> CascadeEngine<S, C, A>
where
    S: GoalStore,
    C: PromotionConfirmer,
    A: GoalArchiver,
{
    /// Create a new cascade engine.
    pub fn new(store: S, confirmer: C, archiver: A) -> Self {
        Self {
            store,
            confirmer,
            archiver,
            evaluator: CascadeEvaluator::new(),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: CascadeConfig) -> Self {
        self.evaluator = self.evaluator.with_config(config);
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The underlying store, mutably.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// The archive collaborator.
    pub fn archiver(&self) -> &A {
        &self.archiver
    }

    /// Evaluate a status change without acting on it.
    pub async fn evaluate(&self, goal: &Goal) -> Result<CascadeOutcome> {
        self.evaluator.evaluate(&self.store, goal).await
    }

    /// Cascade a status change on `goal` up the tree.
    pub async fn on_status_changed(&mut self, goal: &Goal) -> Result<CascadeReport> {
        let mut current = goal.clone();
        let mut promotions = Vec::new();

        loop {
            let outcome = self.evaluator.evaluate(&self.store, &current).await?;
            debug!("Cascade step for goal {}: {:?}", current.id, outcome);

            let termination = match outcome {
                CascadeOutcome::NoAction => CascadeTermination::NoAction,

                CascadeOutcome::ProposeParentCompletion(proposal) => {
                    match self.confirmer.request_confirmation(&proposal).await {
                        Confirmation::Confirmed => {
                            let parent = self
                                .store
                                .update_goal(
                                    proposal.parent_id,
                                    &GoalPatch::completed(proposal.actual_completion_rate),
                                )
                                .await?;
                            info!(
                                "Promoted {} goal {} to completed ({}%)",
                                parent.tier, parent.id, proposal.actual_completion_rate
                            );
                            promotions.push(proposal);
                            current = parent;
                            continue;
                        }
                        Confirmation::Declined => {
                            info!("Promotion of goal {} declined", proposal.parent_id);
                            CascadeTermination::Declined(proposal)
                        }
                        Confirmation::NoResponse => {
                            debug!("Promotion of goal {} left unanswered", proposal.parent_id);
                            CascadeTermination::AwaitingConfirmation(proposal)
                        }
                    }
                }

                CascadeOutcome::ArchiveAndReset {
                    root_goal_id,
                    patient_id,
                } => {
                    let archived = self
                        .archiver
                        .is_archived(root_goal_id)
                        .await
                        .map_err(CascadeError::Archive)?;
                    if archived {
                        debug!("Goal tree {} already archived", root_goal_id);
                        return Ok(CascadeReport {
                            promotions,
                            termination: CascadeTermination::NoAction,
                        });
                    }

                    let tree = self.snapshot_tree(root_goal_id, patient_id).await?;
                    self.archiver
                        .archive_goal_tree(&tree)
                        .await
                        .map_err(CascadeError::Archive)?;
                    info!(
                        "Archived goal tree {} ({} goals); patient {} needs a new goal",
                        root_goal_id,
                        tree.goals.len(),
                        patient_id
                    );
                    CascadeTermination::Archived {
                        root_goal_id,
                        patient_id,
                    }
                }
            };

            return Ok(CascadeReport {
                promotions,
                termination,
            });
        }
    }

    /// Copy the root and all its descendants out of the store.
    async fn snapshot_tree(&self, root_goal_id: GoalId, patient_id: PatientId) -> Result<ArchivedTree> {
        let root = self
            .store
            .fetch_goal(root_goal_id)
            .await?
            .ok_or_else(|| rehab_storage::StorageError::NotFound(format!("goal {}", root_goal_id)))?;

        let mut goals = vec![root];
        let mut next = 0;
        while next < goals.len() {
            let children = self.store.fetch_children(goals[next].id).await?;
            goals.extend(children);
            next += 1;
        }

        Ok(ArchivedTree {
            root_goal_id,
            patient_id,
            goals,
            archived_at: chrono::Utc::now(),
        })
    }
}
