//! Confirmation collaborator for proposed promotions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::evaluator::PromotionProposal;

/// Answer to a promotion proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confirmation {
    /// Write the promotion and keep cascading
    Confirmed,
    /// Leave the parent as it is
    Declined,
    /// No answer came back; the cascade stays halted
    NoResponse,
}

/// Asks someone (typically a clinician in a dialog) whether a parent goal
/// should be marked completed.
#[async_trait]
pub trait PromotionConfirmer: Send + Sync {
    /// Request confirmation for `proposal`.
    async fn request_confirmation(&self, proposal: &PromotionProposal) -> Confirmation;
}

/// Confirms every proposal.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

#[async_trait]
impl PromotionConfirmer for AutoConfirm {
    async fn request_confirmation(&self, _proposal: &PromotionProposal) -> Confirmation {
        Confirmation::Confirmed
    }
}

#[async_trait]
impl<T: PromotionConfirmer + ?Sized> PromotionConfirmer for std::sync::Arc<T> {
    async fn request_confirmation(&self, proposal: &PromotionProposal) -> Confirmation {
        (**self).request_confirmation(proposal).await
    }
}
