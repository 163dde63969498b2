//! Tier decomposition.

use chrono::{Datelike, Days, Months, NaiveDate};
use rehab_core::{BreakdownConfig, Goal, GoalSpec, Provenance, Tier};
use tracing::{debug, warn};

use crate::{BreakdownError, Result};

/// Children generated for one parent, plus non-fatal warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakdownResult {
    /// Child specs in sequence order
    pub children: Vec<GoalSpec>,

    /// Things the caller should show but that did not stop the breakdown
    pub warnings: Vec<String>,
}

/// Split `parent` into `config.child_count` goals of the next tier down.
///
/// Child `i` starts `i` periods after the parent (calendar months for monthly
/// children, weeks for weekly children) and ends on the last day of the
/// calendar month, or the Sunday of the ISO week, that contains its start.
/// Child dates never leave the parent's range. The parent's
/// target rate is divided evenly with the remainder on the last child, so the
/// child rates always add up to the parent's.
pub fn decompose(parent: &Goal, config: &BreakdownConfig) -> Result<BreakdownResult> {
    let child_tier = parent
        .tier
        .child()
        .ok_or(BreakdownError::NotDecomposable(parent.tier))?;
    let (start, end) = parent
        .date_range()
        .ok_or(BreakdownError::MissingDates(parent.id))?;
    if start > end {
        return Err(BreakdownError::InvertedDates(parent.id));
    }
    if parent.target_completion_rate > 100 {
        return Err(BreakdownError::InvalidRate(
            parent.id,
            parent.target_completion_rate,
        ));
    }
    if config.child_count == 0 {
        return Err(BreakdownError::InvalidChildCount);
    }

    let n = config.child_count;
    let rate = u32::from(parent.target_completion_rate);
    let base = rate / n;
    let remainder = rate % n;

    let mut warnings = Vec::new();
    let full_span_end = period_start(start, child_tier, n)?
        .pred_opt()
        .ok_or(BreakdownError::DateOverflow(n))?;
    if full_span_end > end {
        let message = format!(
            "goal period is shorter than {} {}s; consider adjusting",
            n,
            child_tier.period_noun()
        );
        warn!("Breakdown of goal {}: {}", parent.id, message);
        warnings.push(message);
    }

    let mut children = Vec::with_capacity(n as usize);
    for i in 0..n {
        let last = i == n - 1;
        let natural_start = period_start(start, child_tier, i)?;
        let natural_end = calendar_period_end(natural_start, child_tier)
            .ok_or(BreakdownError::DateOverflow(i))?;

        let child_start = natural_start.min(end);
        let child_end = if last && config.preserve_original_dates {
            end
        } else {
            natural_end.min(end)
        };

        let share = if last { base + remainder } else { base };

        let provenance = Provenance {
            breakdown_source: parent.tier,
            original_goal_id: parent.id,
            auto_generated: true,
            config: config.clone(),
        };

        children.push(GoalSpec {
            patient_id: parent.patient_id,
            tier: child_tier,
            parent_id: parent.id,
            sequence_number: Some(i + 1),
            title: format!("{} - {} {}/{}", parent.title, child_tier.period_noun(), i + 1, n),
            description: parent.description.clone(),
            start_date: child_start,
            end_date: child_end,
            target_completion_rate: share as u8,
            evaluation_criteria: parent.evaluation_criteria.derive_for_child(provenance),
        });
    }

    debug!(
        "Broke goal {} into {} {} goals",
        parent.id,
        children.len(),
        child_tier
    );

    Ok(BreakdownResult { children, warnings })
}

/// First day of period `k` counted from `origin`.
fn period_start(origin: NaiveDate, tier: Tier, k: u32) -> Result<NaiveDate> {
    let date = match tier {
        Tier::Weekly => origin.checked_add_days(Days::new(7 * u64::from(k))),
        _ => origin.checked_add_months(Months::new(k)),
    };
    date.ok_or(BreakdownError::DateOverflow(k))
}

/// Last day of the calendar month (or Monday-to-Sunday week) containing `day`.
fn calendar_period_end(day: NaiveDate, tier: Tier) -> Option<NaiveDate> {
    match tier {
        Tier::Weekly => {
            let to_sunday = 6 - day.weekday().num_days_from_monday();
            day.checked_add_days(Days::new(u64::from(to_sunday)))
        }
        _ => day
            .with_day(1)?
            .checked_add_months(Months::new(1))?
            .pred_opt(),
    }
}
