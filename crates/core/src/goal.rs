//! Goal model - one node of a patient's rehabilitation goal tree.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::criteria::EvaluationCriteria;
use crate::id::{GoalId, PatientId};
use crate::Time;

/// A rehabilitation goal at one tier of the hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    /// Unique identifier
    pub id: GoalId,

    /// Owning patient
    pub patient_id: PatientId,

    /// Hierarchy level
    pub tier: Tier,

    /// Goal one tier up; `None` for long-term goals
    pub parent_id: Option<GoalId>,

    /// 1-based position among siblings; `None` for root goals
    pub sequence_number: Option<u32>,

    /// Goal title
    pub title: String,

    /// Detailed description
    pub description: String,

    /// First day of the goal (inclusive)
    pub start_date: Option<NaiveDate>,

    /// Last day of the goal (inclusive)
    pub end_date: Option<NaiveDate>,

    /// Planned contribution toward the parent, 0-100
    pub target_completion_rate: u8,

    /// Measured completion, 0-100, written on terminal transition
    pub actual_completion_rate: Option<u8>,

    /// Goal status
    pub status: GoalStatus,

    /// Carried metadata with breakdown provenance
    pub evaluation_criteria: EvaluationCriteria,

    /// When the goal reached `Completed`
    pub completed_at: Option<Time>,

    /// When created
    pub created_at: Time,

    /// Last updated
    pub updated_at: Time,
}

impl Goal {
    /// Create a root long-term goal for a patient.
    pub fn long_term(
        patient_id: PatientId,
        title: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: GoalId::new(),
            patient_id,
            tier: Tier::LongTerm,
            parent_id: None,
            sequence_number: None,
            title: title.into(),
            description: String::new(),
            start_date: Some(start_date),
            end_date: Some(end_date),
            target_completion_rate: 100,
            actual_completion_rate: None,
            status: GoalStatus::Active,
            evaluation_criteria: EvaluationCriteria::default(),
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Both ends of the date range, if present.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.start_date?, self.end_date?))
    }

    /// Apply a partial update in place.
    pub fn apply_patch(&mut self, patch: &GoalPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(rate) = patch.actual_completion_rate {
            self.actual_completion_rate = Some(rate);
        }
        if let Some(at) = patch.completed_at {
            self.completed_at = Some(at);
        }
        if let Some(rate) = patch.target_completion_rate {
            self.target_completion_rate = rate;
        }
        if let Some(date) = patch.start_date {
            self.start_date = Some(date);
        }
        if let Some(date) = patch.end_date {
            self.end_date = Some(date);
        }
        self.updated_at = chrono::Utc::now();
    }
}

/// Level of a goal in the hierarchy. Ordered LongTerm → Monthly → Weekly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    /// Six-month horizon, root of a tree
    LongTerm,
    /// One calendar month
    Monthly,
    /// One week, the leaf tier
    Weekly,
}

impl Tier {
    /// The tier one step down, if any.
    pub fn child(self) -> Option<Tier> {
        match self {
            Tier::LongTerm => Some(Tier::Monthly),
            Tier::Monthly => Some(Tier::Weekly),
            Tier::Weekly => None,
        }
    }

    /// The tier one step up, if any.
    pub fn parent(self) -> Option<Tier> {
        match self {
            Tier::LongTerm => None,
            Tier::Monthly => Some(Tier::LongTerm),
            Tier::Weekly => Some(Tier::Monthly),
        }
    }

    /// Number of children a breakdown of this tier produces by default.
    pub fn default_child_count(self) -> Option<u32> {
        match self {
            Tier::LongTerm => Some(6),
            Tier::Monthly => Some(4),
            Tier::Weekly => None,
        }
    }

    /// Singular noun for one period of this tier.
    pub fn period_noun(self) -> &'static str {
        match self {
            Tier::LongTerm => "half-year",
            Tier::Monthly => "month",
            Tier::Weekly => "week",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::LongTerm => write!(f, "long-term"),
            Tier::Monthly => write!(f, "monthly"),
            Tier::Weekly => write!(f, "weekly"),
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "long-term" | "longterm" | "long_term" => Ok(Tier::LongTerm),
            "monthly" => Ok(Tier::Monthly),
            "weekly" => Ok(Tier::Weekly),
            _ => Err(ParseError::Tier(s.to_string())),
        }
    }
}

/// Goal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalStatus {
    /// Created, not yet started
    Pending,
    /// Being worked on
    Active,
    /// Done (terminal)
    Completed,
    /// Dropped (terminal)
    Cancelled,
    /// Paused
    OnHold,
}

impl GoalStatus {
    /// `Completed` and `Cancelled` end a goal's lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, GoalStatus::Completed | GoalStatus::Cancelled)
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalStatus::Pending => write!(f, "pending"),
            GoalStatus::Active => write!(f, "active"),
            GoalStatus::Completed => write!(f, "completed"),
            GoalStatus::Cancelled => write!(f, "cancelled"),
            GoalStatus::OnHold => write!(f, "on-hold"),
        }
    }
}

impl std::str::FromStr for GoalStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(GoalStatus::Pending),
            "active" => Ok(GoalStatus::Active),
            "completed" | "done" => Ok(GoalStatus::Completed),
            "cancelled" | "canceled" => Ok(GoalStatus::Cancelled),
            "on-hold" | "onhold" | "on_hold" => Ok(GoalStatus::OnHold),
            _ => Err(ParseError::Status(s.to_string())),
        }
    }
}

/// Error parsing a tier or status name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Unknown tier name
    #[error("unknown tier: {0}")]
    Tier(String),

    /// Unknown status name
    #[error("unknown status: {0}")]
    Status(String),
}

/// A child goal produced by a breakdown, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalSpec {
    /// Owning patient, inherited from the parent
    pub patient_id: PatientId,
    /// One tier below the parent
    pub tier: Tier,
    /// Goal this spec was generated from
    pub parent_id: GoalId,
    /// 1-based position among siblings
    pub sequence_number: Option<u32>,
    /// Goal title
    pub title: String,
    /// Detailed description
    pub description: String,
    /// First day (inclusive)
    pub start_date: NaiveDate,
    /// Last day (inclusive)
    pub end_date: NaiveDate,
    /// Share of the parent's target rate
    pub target_completion_rate: u8,
    /// Parent criteria plus provenance
    pub evaluation_criteria: EvaluationCriteria,
}

impl GoalSpec {
    /// Materialize the spec as a new `Pending` goal record.
    pub fn into_goal(self) -> Goal {
        let now = chrono::Utc::now();
        Goal {
            id: GoalId::new(),
            patient_id: self.patient_id,
            tier: self.tier,
            parent_id: Some(self.parent_id),
            sequence_number: self.sequence_number,
            title: self.title,
            description: self.description,
            start_date: Some(self.start_date),
            end_date: Some(self.end_date),
            target_completion_rate: self.target_completion_rate,
            actual_completion_rate: None,
            status: GoalStatus::Pending,
            evaluation_criteria: self.evaluation_criteria,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update to a stored goal. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalPatch {
    /// New status
    pub status: Option<GoalStatus>,
    /// Measured completion
    pub actual_completion_rate: Option<u8>,
    /// Completion timestamp
    pub completed_at: Option<Time>,
    /// New target rate
    pub target_completion_rate: Option<u8>,
    /// New first day
    pub start_date: Option<NaiveDate>,
    /// New last day
    pub end_date: Option<NaiveDate>,
}

impl GoalPatch {
    /// Patch that sets only the status.
    pub fn status(status: GoalStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Patch marking a goal completed now with the given rate.
    pub fn completed(actual_completion_rate: u8) -> Self {
        Self {
            status: Some(GoalStatus::Completed),
            actual_completion_rate: Some(actual_completion_rate),
            completed_at: Some(chrono::Utc::now()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_tier_navigation() {
        assert_eq!(Tier::LongTerm.child(), Some(Tier::Monthly));
        assert_eq!(Tier::Monthly.child(), Some(Tier::Weekly));
        assert_eq!(Tier::Weekly.child(), None);
        assert_eq!(Tier::Weekly.parent(), Some(Tier::Monthly));
        assert_eq!(Tier::LongTerm.parent(), None);
        assert!(Tier::LongTerm < Tier::Weekly);
    }

    #[test]
    fn test_default_child_counts() {
        assert_eq!(Tier::LongTerm.default_child_count(), Some(6));
        assert_eq!(Tier::Monthly.default_child_count(), Some(4));
        assert_eq!(Tier::Weekly.default_child_count(), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(GoalStatus::Completed.is_terminal());
        assert!(GoalStatus::Cancelled.is_terminal());
        assert!(!GoalStatus::OnHold.is_terminal());
        assert!(!GoalStatus::Active.is_terminal());
        assert!(!GoalStatus::Pending.is_terminal());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Completed".parse::<GoalStatus>().unwrap(), GoalStatus::Completed);
        assert_eq!("on-hold".parse::<GoalStatus>().unwrap(), GoalStatus::OnHold);
        assert!(matches!("finished".parse::<GoalStatus>(), Err(ParseError::Status(_))));
        assert_eq!("weekly".parse::<Tier>().unwrap(), Tier::Weekly);
    }

    #[test]
    fn test_apply_completed_patch() {
        let mut goal = Goal::long_term(PatientId::new(), "Walk unaided", date(2025, 1, 1), date(2025, 6, 30));
        goal.apply_patch(&GoalPatch::completed(75));
        assert_eq!(goal.status, GoalStatus::Completed);
        assert_eq!(goal.actual_completion_rate, Some(75));
        assert!(goal.completed_at.is_some());
        assert_eq!(goal.date_range(), Some((date(2025, 1, 1), date(2025, 6, 30))));
    }

    #[test]
    fn test_spec_into_goal_is_pending() {
        let parent = Goal::long_term(PatientId::new(), "Walk unaided", date(2025, 1, 1), date(2025, 6, 30));
        let spec = GoalSpec {
            patient_id: parent.patient_id,
            tier: Tier::Monthly,
            parent_id: parent.id,
            sequence_number: Some(1),
            title: "Walk unaided - month 1/6".to_string(),
            description: String::new(),
            start_date: date(2025, 1, 1),
            end_date: date(2025, 1, 31),
            target_completion_rate: 16,
            evaluation_criteria: EvaluationCriteria::default(),
        };
        let goal = spec.into_goal();
        assert_eq!(goal.status, GoalStatus::Pending);
        assert_eq!(goal.parent_id, Some(parent.id));
        assert_eq!(goal.actual_completion_rate, None);
    }
}
