//! Evaluation criteria carried from a goal to the children generated from it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::BreakdownConfig;
use crate::goal::Tier;
use crate::id::GoalId;

/// Metadata attached to a goal: typed breakdown provenance plus free-form
/// caller data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationCriteria {
    /// Where this goal came from, if it was generated by a breakdown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,

    /// Caller-supplied extension data
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl EvaluationCriteria {
    /// Copy of these criteria for a generated child. The `extra` overlay is
    /// copied as-is and provenance is replaced.
    pub fn derive_for_child(&self, provenance: Provenance) -> Self {
        Self {
            provenance: Some(provenance),
            extra: self.extra.clone(),
        }
    }

    /// Set an extension value.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Breakdown provenance tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Tier of the goal that was broken down
    pub breakdown_source: Tier,

    /// The goal that was broken down
    pub original_goal_id: GoalId,

    /// Generated rather than entered by a clinician
    pub auto_generated: bool,

    /// Configuration the breakdown ran with
    pub config: BreakdownConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_keeps_extra_and_sets_provenance() {
        let parent = EvaluationCriteria::default().with_extra("measure", "10m walk test");
        let provenance = Provenance {
            breakdown_source: Tier::LongTerm,
            original_goal_id: GoalId::new(),
            auto_generated: true,
            config: BreakdownConfig::for_tier(Tier::LongTerm).unwrap(),
        };

        let child = parent.derive_for_child(provenance.clone());
        assert_eq!(child.extra.get("measure"), Some(&Value::from("10m walk test")));
        assert_eq!(child.provenance, Some(provenance));
        assert!(parent.provenance.is_none());
    }

    #[test]
    fn test_empty_criteria_serializes_to_empty_object() {
        let json = serde_json::to_string(&EvaluationCriteria::default()).unwrap();
        assert_eq!(json, "{}");
    }
}
