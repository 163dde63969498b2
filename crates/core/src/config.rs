//! Breakdown configuration.

use serde::{Deserialize, Serialize};

use crate::goal::Tier;

/// How a goal should be split into the next tier down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownConfig {
    /// Number of children to generate
    pub child_count: u32,

    /// Spread the parent's target rate evenly across children
    pub distribute_progress_evenly: bool,

    /// Leave slack at the end of the schedule. Recorded only.
    pub include_buffer_time: bool,

    /// Stretch the last child to the parent's end date
    pub preserve_original_dates: bool,
}

impl BreakdownConfig {
    /// Default configuration for breaking down a goal of `tier`.
    /// Returns `None` for the leaf tier.
    pub fn for_tier(tier: Tier) -> Option<Self> {
        Some(Self {
            child_count: tier.default_child_count()?,
            distribute_progress_evenly: true,
            include_buffer_time: false,
            preserve_original_dates: true,
        })
    }

    /// Override the child count.
    pub fn with_child_count(mut self, child_count: u32) -> Self {
        self.child_count = child_count;
        self
    }
}
