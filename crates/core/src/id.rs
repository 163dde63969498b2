//! Unique identifiers for goal records and their owners.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a Goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GoalId(Ulid);

impl GoalId {
    /// Generate a new GoalId
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for GoalId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GoalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for GoalId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Identifier of the patient that owns a goal tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatientId(Ulid);

impl PatientId {
    /// Generate a new PatientId
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for PatientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PatientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for PatientId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_id_display_parse() {
        let id = GoalId::new();
        let parsed: GoalId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_patient_id_rejects_garbage() {
        assert!("not-a-ulid".parse::<PatientId>().is_err());
    }
}
