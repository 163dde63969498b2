//! Consistency checks for a proposed breakdown.

use std::collections::BTreeSet;

use rehab_core::{Goal, GoalSpec};
use serde::{Deserialize, Serialize};

/// Allowed difference between the children's rate sum and the parent's rate.
const RATE_TOLERANCE: i64 = 1;

/// Outcome of validating a breakdown. Issues are advisory; whether to save
/// despite them is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True iff `issues` is empty
    pub is_valid: bool,

    /// Human-readable problems, one per failed check
    pub issues: Vec<String>,
}

/// Check `children` against `parent`. Every check runs.
pub fn validate(parent: &Goal, children: &[GoalSpec]) -> ValidationReport {
    let mut issues = Vec::new();

    let sum: i64 = children
        .iter()
        .map(|c| i64::from(c.target_completion_rate))
        .sum();
    let expected = i64::from(parent.target_completion_rate);
    if (sum - expected).abs() > RATE_TOLERANCE {
        issues.push(format!(
            "target completion rates add up to {}%, parent goal expects {}%",
            sum, expected
        ));
    }

    let over: Vec<String> = children
        .iter()
        .filter(|c| c.target_completion_rate > 100)
        .map(|c| format!("#{}", c.sequence_number.unwrap_or(0)))
        .collect();
    if !over.is_empty() {
        issues.push(format!("target completion rate above 100%: {}", over.join(", ")));
    }

    match parent.date_range() {
        Some((parent_start, parent_end)) => {
            if let Some(earliest) = children.iter().map(|c| c.start_date).min() {
                if earliest < parent_start {
                    issues.push(format!(
                        "earliest child starts {}, before the parent goal starts ({})",
                        earliest, parent_start
                    ));
                }
            }
            if let Some(latest) = children.iter().map(|c| c.end_date).max() {
                if latest > parent_end {
                    issues.push(format!(
                        "latest child ends {}, after the parent goal ends ({})",
                        latest, parent_end
                    ));
                }
            }
        }
        None if !children.is_empty() => {
            issues.push("parent goal has no date range to check children against".to_string());
        }
        None => {}
    }

    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for seq in children.iter().filter_map(|c| c.sequence_number) {
        if !seen.insert(seq) {
            duplicates.insert(seq);
        }
    }
    if !duplicates.is_empty() {
        let list: Vec<String> = duplicates.iter().map(|s| s.to_string()).collect();
        issues.push(format!("duplicate sequence numbers: {}", list.join(", ")));
    }

    ValidationReport {
        is_valid: issues.is_empty(),
        issues,
    }
}
