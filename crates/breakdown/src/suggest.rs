//! Breakdown suggestions from a patient's completion history.

use rehab_core::{BreakdownConfig, Goal, GoalStatus};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{BreakdownError, Result};

/// Above this completion ratio a shorter schedule is suggested.
const HIGH_COMPLETION_RATIO: f64 = 0.8;

/// Below this completion ratio a longer, buffered schedule is suggested.
const LOW_COMPLETION_RATIO: f64 = 0.5;

/// Candidate configurations, each paired with the reasoning at the same index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionSet {
    /// Suggested configurations
    pub suggestions: Vec<BreakdownConfig>,

    /// Why each configuration was suggested
    pub reasoning: Vec<String>,
}

impl SuggestionSet {
    fn push(&mut self, config: BreakdownConfig, reason: String) {
        self.suggestions.push(config);
        self.reasoning.push(reason);
    }

    /// Iterate suggestions with their reasoning.
    pub fn iter(&self) -> impl Iterator<Item = (&BreakdownConfig, &str)> {
        self.suggestions
            .iter()
            .zip(self.reasoning.iter().map(String::as_str))
    }
}

/// Suggest ways to break `goal` down.
///
/// Two baseline configurations are always returned. With a non-empty
/// `history`, the share of completed goals adds a shorter (ratio > 0.8) or a
/// longer buffered (ratio < 0.5) schedule.
pub fn suggest(goal: &Goal, history: Option<&[Goal]>) -> Result<SuggestionSet> {
    let child_tier = goal
        .tier
        .child()
        .ok_or(BreakdownError::NotDecomposable(goal.tier))?;
    let base = BreakdownConfig::for_tier(goal.tier).ok_or(BreakdownError::NotDecomposable(goal.tier))?;
    let n = base.child_count;
    let noun = child_tier.period_noun();

    let mut set = SuggestionSet {
        suggestions: Vec::new(),
        reasoning: Vec::new(),
    };

    set.push(
        base.clone(),
        format!("even split into {} {}s keeps the original date range", n, noun),
    );
    set.push(
        BreakdownConfig {
            child_count: n,
            distribute_progress_evenly: false,
            include_buffer_time: true,
            preserve_original_dates: false,
        },
        format!("uneven split into {} {}s with buffer time for setbacks", n, noun),
    );

    let Some(history) = history.filter(|h| !h.is_empty()) else {
        return Ok(set);
    };

    let completed = history
        .iter()
        .filter(|g| g.status == GoalStatus::Completed)
        .count();
    let ratio = completed as f64 / history.len() as f64;
    debug!(
        "Goal {} history: {}/{} completed ({:.2})",
        goal.id,
        completed,
        history.len(),
        ratio
    );

    if ratio > HIGH_COMPLETION_RATIO && n > 1 {
        set.push(
            BreakdownConfig {
                child_count: n - 1,
                distribute_progress_evenly: true,
                include_buffer_time: false,
                preserve_original_dates: true,
            },
            format!(
                "shorter schedule justified by high historical completion ({} {}s, {:.0}% of past goals completed)",
                n - 1,
                noun,
                ratio * 100.0
            ),
        );
    } else if ratio < LOW_COMPLETION_RATIO {
        set.push(
            BreakdownConfig {
                child_count: n + 1,
                distribute_progress_evenly: true,
                include_buffer_time: true,
                preserve_original_dates: false,
            },
            format!(
                "extra buffer justified by low historical completion ({} {}s, {:.0}% of past goals completed)",
                n + 1,
                noun,
                ratio * 100.0
            ),
        );
    }

    Ok(set)
}
