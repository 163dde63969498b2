//! JSON file storage implementation.
//!
//! Stores each goal as a JSON file under `goals/` and keeps a small per-goal
//! meta marker (version + updated_at) under `meta/goals/`. Archived trees are
//! written whole to `archive/<root-goal-id>.json`.

use std::path::{Path, PathBuf};

use rehab_core::{Goal, GoalId, GoalPatch, PatientId, Tier};
use tokio::fs;
use tracing::debug;

use super::trait_::sort_siblings;
use super::{ArchivedTree, GoalArchiver, GoalStore, Result, StatusFilter, StorageError};

/// File-based JSON storage backend.
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    /// Open storage rooted at `root`, creating the directories it needs.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("goals")).await?;
        fs::create_dir_all(root.join("archive")).await?;
        fs::create_dir_all(root.join("meta").join("goals")).await?;

        Ok(Self { root })
    }

    /// Storage root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn goal_path(&self, id: GoalId) -> PathBuf {
        self.root.join("goals").join(format!("{}.json", id))
    }

    fn archive_path(&self, root_goal_id: GoalId) -> PathBuf {
        self.root.join("archive").join(format!("{}.json", root_goal_id))
    }

    fn meta_path(&self, kind: &str, id: &str) -> PathBuf {
        self.root.join("meta").join(kind).join(format!("{}.meta.json", id))
    }

    /// Load an archived tree, if one was written for `root_goal_id`.
    pub async fn load_archived(&self, root_goal_id: GoalId) -> Result<Option<ArchivedTree>> {
        read_json(&self.archive_path(root_goal_id)).await
    }

    async fn write_goal(&self, goal: &Goal) -> Result<()> {
        let json = serde_json::to_string_pretty(goal)?;
        fs::write(self.goal_path(goal.id), json.as_bytes()).await?;
        let version = self.bump_version("goals", &goal.id.to_string()).await?;
        debug!("Wrote goal {} (version {})", goal.id, version);
        Ok(())
    }

    /// Read and increment per-object version, return new version.
    async fn bump_version(&self, kind: &str, id: &str) -> Result<u64> {
        let path = self.meta_path(kind, id);
        let mut version = 0u64;
        if let Ok(s) = fs::read_to_string(&path).await {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&s) {
                if let Some(v) = json.get("version").and_then(|v| v.as_u64()) {
                    version = v;
                }
            }
        }
        version += 1;
        let meta = serde_json::json!({"version": version, "updated_at": chrono::Utc::now()});
        fs::write(&path, serde_json::to_string_pretty(&meta)?.as_bytes()).await?;
        Ok(version)
    }

    async fn all_goals(&self) -> Result<Vec<Goal>> {
        list_dir(&self.root.join("goals")).await
    }
}

#[async_trait::async_trait]
impl GoalStore for JsonStore {
    async fn fetch_goal(&self, id: GoalId) -> Result<Option<Goal>> {
        read_json(&self.goal_path(id)).await
    }

    async fn fetch_children(&self, parent_id: GoalId) -> Result<Vec<Goal>> {
        let mut children: Vec<Goal> = self
            .all_goals()
            .await?
            .into_iter()
            .filter(|g| g.parent_id == Some(parent_id))
            .collect();
        sort_siblings(&mut children);
        Ok(children)
    }

    async fn create_goals(&mut self, goals: &[Goal]) -> Result<()> {
        for goal in goals {
            self.write_goal(goal).await?;
        }
        Ok(())
    }

    async fn update_goal(&mut self, id: GoalId, patch: &GoalPatch) -> Result<Goal> {
        let mut goal = self
            .fetch_goal(id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("goal {}", id)))?;
        goal.apply_patch(patch);
        self.write_goal(&goal).await?;
        Ok(goal)
    }

    async fn fetch_goals_by_patient_and_tier(
        &self,
        patient_id: PatientId,
        tier: Tier,
        filter: &StatusFilter,
    ) -> Result<Vec<Goal>> {
        let mut goals: Vec<Goal> = self
            .all_goals()
            .await?
            .into_iter()
            .filter(|g| g.patient_id == patient_id && g.tier == tier && filter.matches(g.status))
            .collect();
        sort_siblings(&mut goals);
        Ok(goals)
    }

    async fn list_goals(&self) -> Result<Vec<Goal>> {
        let mut goals = self.all_goals().await?;
        goals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(goals)
    }
}

#[async_trait::async_trait]
impl GoalArchiver for JsonStore {
    async fn archive_goal_tree(&mut self, tree: &ArchivedTree) -> Result<()> {
        let json = serde_json::to_string_pretty(tree)?;
        fs::write(self.archive_path(tree.root_goal_id), json.as_bytes()).await?;
        debug!("Archived goal tree {} ({} goals)", tree.root_goal_id, tree.goals.len());
        Ok(())
    }

    async fn is_archived(&self, root_goal_id: GoalId) -> Result<bool> {
        Ok(fs::try_exists(self.archive_path(root_goal_id)).await?)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn list_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        if let Some(item) = read_json(&entry.path()).await? {
            items.push(item);
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rehab_core::GoalStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_create_fetch_update() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStore::new(dir.path()).await.unwrap();

        let goal = Goal::long_term(PatientId::new(), "Climb stairs", date(2025, 1, 1), date(2025, 6, 30));
        store.create_goals(std::slice::from_ref(&goal)).await.unwrap();

        let loaded = store.fetch_goal(goal.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Climb stairs");

        let updated = store.update_goal(goal.id, &GoalPatch::completed(80)).await.unwrap();
        assert_eq!(updated.status, GoalStatus::Completed);

        let reloaded = store.fetch_goal(goal.id).await.unwrap().unwrap();
        assert_eq!(reloaded.actual_completion_rate, Some(80));

        let meta = fs::read_to_string(store.meta_path("goals", &goal.id.to_string())).await.unwrap();
        let meta: serde_json::Value = serde_json::from_str(&meta).unwrap();
        assert_eq!(meta["version"], 2);
    }

    #[tokio::test]
    async fn test_missing_goal_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path()).await.unwrap();
        assert!(store.fetch_goal(GoalId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_archive_keeps_goals_in_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStore::new(dir.path()).await.unwrap();

        let goal = Goal::long_term(PatientId::new(), "Dress independently", date(2025, 1, 1), date(2025, 6, 30));
        store.create_goals(std::slice::from_ref(&goal)).await.unwrap();

        let tree = ArchivedTree {
            root_goal_id: goal.id,
            patient_id: goal.patient_id,
            goals: vec![goal.clone()],
            archived_at: chrono::Utc::now(),
        };
        assert!(!store.is_archived(goal.id).await.unwrap());
        store.archive_goal_tree(&tree).await.unwrap();

        assert!(store.is_archived(goal.id).await.unwrap());
        assert_eq!(store.load_archived(goal.id).await.unwrap(), Some(tree));
        assert!(store.fetch_goal(goal.id).await.unwrap().is_some());
    }
}
