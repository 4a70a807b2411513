//! In-memory implementation of `EntityStore`.
//!
//! All state is held in memory and lost on restart. Each operation takes the
//! write lock for its whole body, which serializes writers and makes every
//! multi-step operation atomic with respect to other callers.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::EntityStore;
use crate::models::{
    DeactivationSummary, PrCounts, PrStatus, PullRequest, PullRequestShort, Reassignment,
    ReviewStat, Team, TeamMember, User,
};
use crate::selector::ReviewerSelector;
use crate::{Error, Result};

/// Pull request plus its insertion sequence, used to order equal timestamps.
#[derive(Debug, Clone)]
struct StoredPr {
    pr: PullRequest,
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    teams: BTreeSet<String>,
    users: BTreeMap<String, User>,
    prs: HashMap<String, StoredPr>,
    next_seq: u64,
}

impl Inner {
    fn pr_mut(&mut self, pr_id: &str) -> Result<&mut PullRequest> {
        self.prs
            .get_mut(pr_id)
            .map(|stored| &mut stored.pr)
            .ok_or_else(|| Error::pr_not_found(pr_id))
    }

    fn save_team(&mut self, team: &Team) {
        self.teams.insert(team.team_name.clone());
        for member in &team.members {
            self.users
                .insert(member.user_id.clone(), member.to_user(&team.team_name));
        }
    }
}

/// In-memory entity store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_distinct(reviewer_ids: &[String]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for id in reviewer_ids {
        if !seen.insert(id) {
            return Err(Error::Conflict(format!("reviewer {} assigned twice", id)));
        }
    }
    Ok(())
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn create_pr(&self, pr: &PullRequest) -> Result<()> {
        check_distinct(&pr.assigned_reviewers)?;

        let mut inner = self.inner.write().await;
        if inner.prs.contains_key(&pr.id) {
            return Err(Error::Conflict(format!("pull request {} already exists", pr.id)));
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.prs.insert(
            pr.id.clone(),
            StoredPr {
                pr: pr.clone(),
                seq,
            },
        );
        Ok(())
    }

    async fn pr_exists(&self, pr_id: &str) -> Result<bool> {
        Ok(self.inner.read().await.prs.contains_key(pr_id))
    }

    async fn get_pr(&self, pr_id: &str) -> Result<PullRequest> {
        self.inner
            .read()
            .await
            .prs
            .get(pr_id)
            .map(|stored| stored.pr.clone())
            .ok_or_else(|| Error::pr_not_found(pr_id))
    }

    async fn merge_pr(&self, pr_id: &str, merged_at: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let pr = inner.pr_mut(pr_id)?;

        if pr.status != PrStatus::Open {
            return Ok(false);
        }

        pr.status = PrStatus::Merged;
        pr.merged_at = Some(merged_at);
        Ok(true)
    }

    async fn update_pr_reviewers(&self, pr_id: &str, reviewer_ids: &[String]) -> Result<()> {
        check_distinct(reviewer_ids)?;

        let mut inner = self.inner.write().await;
        let pr = inner.pr_mut(pr_id)?;
        if pr.is_merged() {
            return Err(Error::InvalidState(format!(
                "pull request {} is merged",
                pr_id
            )));
        }

        pr.assigned_reviewers = reviewer_ids.to_vec();
        Ok(())
    }

    async fn reassign_reviewer(
        &self,
        pr_id: &str,
        old_reviewer_id: &str,
        selector: &ReviewerSelector,
    ) -> Result<Reassignment> {
        let mut inner = self.inner.write().await;

        let pr = inner
            .prs
            .get(pr_id)
            .map(|stored| stored.pr.clone())
            .ok_or_else(|| Error::pr_not_found(pr_id))?;
        let old_reviewer = inner
            .users
            .get(old_reviewer_id)
            .cloned()
            .ok_or_else(|| Error::user_not_found(old_reviewer_id))?;
        let slot = pr.reassignable_slot(old_reviewer_id)?;

        let exclude = pr.reassignment_exclusions();
        let candidates: Vec<User> = inner
            .users
            .values()
            .filter(|u| u.team_name == old_reviewer.team_name && u.is_active)
            .filter(|u| !exclude.contains(&u.user_id))
            .cloned()
            .collect();
        let new_reviewer = selector
            .pick_one(&candidates)?
            .ok_or_else(|| Error::no_candidate(&old_reviewer.team_name))?;

        let pr = inner.pr_mut(pr_id)?;
        pr.assigned_reviewers[slot] = new_reviewer.user_id.clone();

        Ok(Reassignment {
            pr: pr.clone(),
            replaced_by: new_reviewer.user_id,
        })
    }

    async fn get_review_stats(&self) -> Result<Vec<ReviewStat>> {
        let inner = self.inner.read().await;

        let stats = inner
            .users
            .values()
            .filter(|user| user.is_active)
            .map(|user| {
                let mut stat = ReviewStat {
                    user_id: user.user_id.clone(),
                    open_prs: 0,
                    total_prs: 0,
                };
                for stored in inner.prs.values() {
                    if stored.pr.has_reviewer(&user.user_id) {
                        stat.total_prs += 1;
                        if stored.pr.status == PrStatus::Open {
                            stat.open_prs += 1;
                        }
                    }
                }
                stat
            })
            .collect();

        Ok(stats)
    }

    async fn get_pr_counts(&self) -> Result<PrCounts> {
        let inner = self.inner.read().await;
        let mut counts = PrCounts::default();
        for stored in inner.prs.values() {
            counts.total_prs += 1;
            match stored.pr.status {
                PrStatus::Open => counts.open_prs += 1,
                PrStatus::Merged => counts.merged_prs += 1,
            }
        }
        Ok(counts)
    }

    async fn create_or_update_user(&self, user: &User) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.teams.insert(user.team_name.clone());
        inner.users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<User> {
        self.inner
            .read()
            .await
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| Error::user_not_found(user_id))
    }

    async fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<User> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(user_id)
            .ok_or_else(|| Error::user_not_found(user_id))?;
        user.is_active = is_active;
        Ok(user.clone())
    }

    async fn get_active_team_members(
        &self,
        team_name: &str,
        exclude_ids: &[String],
    ) -> Result<Vec<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .filter(|u| u.team_name == team_name && u.is_active)
            .filter(|u| !exclude_ids.contains(&u.user_id))
            .cloned()
            .collect())
    }

    async fn get_user_review_prs(&self, user_id: &str) -> Result<Vec<PullRequestShort>> {
        let inner = self.inner.read().await;

        let mut reviewed: Vec<&StoredPr> = inner
            .prs
            .values()
            .filter(|stored| stored.pr.has_reviewer(user_id))
            .collect();
        reviewed.sort_by(|a, b| {
            b.pr.created_at
                .cmp(&a.pr.created_at)
                .then(b.seq.cmp(&a.seq))
        });

        Ok(reviewed.into_iter().map(|stored| stored.pr.to_short()).collect())
    }

    async fn create_team(&self, team: &Team) -> Result<()> {
        self.inner.write().await.save_team(team);
        Ok(())
    }

    async fn insert_team(&self, team: &Team) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.teams.contains(&team.team_name) {
            return Err(Error::Conflict(format!(
                "team {} already exists",
                team.team_name
            )));
        }
        inner.save_team(team);
        Ok(())
    }

    async fn team_exists(&self, team_name: &str) -> Result<bool> {
        Ok(self.inner.read().await.teams.contains(team_name))
    }

    async fn get_team(&self, team_name: &str) -> Result<Team> {
        let inner = self.inner.read().await;
        let members: Vec<TeamMember> = inner
            .users
            .values()
            .filter(|u| u.team_name == team_name)
            .cloned()
            .map(TeamMember::from)
            .collect();

        if members.is_empty() {
            return Err(Error::team_not_found(team_name));
        }

        Ok(Team::new(team_name, members))
    }

    async fn bulk_deactivate_users(&self, team_name: &str) -> Result<DeactivationSummary> {
        let mut inner = self.inner.write().await;

        let member_ids: BTreeSet<String> = inner
            .users
            .values()
            .filter(|u| u.team_name == team_name)
            .map(|u| u.user_id.clone())
            .collect();

        let mut assignments_removed = 0u64;
        for stored in inner.prs.values_mut() {
            if stored.pr.status != PrStatus::Open {
                continue;
            }
            let before = stored.pr.assigned_reviewers.len();
            stored
                .pr
                .assigned_reviewers
                .retain(|r| !member_ids.contains(r));
            assignments_removed += (before - stored.pr.assigned_reviewers.len()) as u64;
        }

        for id in &member_ids {
            if let Some(user) = inner.users.get_mut(id) {
                user.is_active = false;
            }
        }

        Ok(DeactivationSummary {
            team_name: team_name.to_string(),
            users_deactivated: member_ids.len() as u64,
            assignments_removed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(name: &str, ids: &[&str]) -> Team {
        Team::new(
            name,
            ids.iter()
                .map(|id| TeamMember::new(*id, format!("{}-name", id), true))
                .collect(),
        )
    }

    fn reviewers(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_and_get_pr() {
        let store = MemoryStore::new();
        let pr = PullRequest::new("pr-1", "fix", "a1", reviewers(&["r1", "r2"]));
        store.create_pr(&pr).await.unwrap();

        assert!(store.pr_exists("pr-1").await.unwrap());
        assert_eq!(store.get_pr("pr-1").await.unwrap(), pr);

        let dup = store.create_pr(&pr).await.unwrap_err();
        assert!(matches!(dup, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_pr_rejects_duplicate_reviewers() {
        let store = MemoryStore::new();
        let pr = PullRequest::new("pr-1", "fix", "a1", reviewers(&["r1", "r1"]));
        assert!(matches!(
            store.create_pr(&pr).await,
            Err(Error::Conflict(_))
        ));
        assert!(!store.pr_exists("pr-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_merge_is_conditional() {
        let store = MemoryStore::new();
        store
            .create_pr(&PullRequest::new("pr-1", "fix", "a1", vec![]))
            .await
            .unwrap();

        let first = Utc::now();
        assert!(store.merge_pr("pr-1", first).await.unwrap());
        assert!(!store.merge_pr("pr-1", Utc::now()).await.unwrap());

        let pr = store.get_pr("pr-1").await.unwrap();
        assert_eq!(pr.merged_at, Some(first));
        assert!(matches!(
            store.merge_pr("missing", Utc::now()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reassign_keeps_slot() {
        let store = MemoryStore::new();
        store.create_team(&team("core", &["a1", "r1", "r2", "r3"])).await.unwrap();
        store
            .create_pr(&PullRequest::new("pr-1", "fix", "a1", reviewers(&["r1", "r2"])))
            .await
            .unwrap();

        let selector = ReviewerSelector::seeded(3);
        let outcome = store.reassign_reviewer("pr-1", "r1", &selector).await.unwrap();
        assert_eq!(outcome.replaced_by, "r3");
        assert_eq!(outcome.pr.assigned_reviewers, reviewers(&["r3", "r2"]));
        assert_eq!(store.get_pr("pr-1").await.unwrap(), outcome.pr);

        let again = store
            .reassign_reviewer("pr-1", "r1", &selector)
            .await
            .unwrap_err();
        assert!(matches!(again, Error::NotAssigned { .. }));
    }

    #[tokio::test]
    async fn test_reassign_draws_from_current_reviewer_set() {
        let store = MemoryStore::new();
        store.create_team(&team("core", &["a1", "r1", "r2", "r3"])).await.unwrap();
        store
            .create_pr(&PullRequest::new("pr-1", "fix", "a1", reviewers(&["r1", "r2"])))
            .await
            .unwrap();

        let selector = ReviewerSelector::seeded(5);
        let (left, right) = tokio::join!(
            store.reassign_reviewer("pr-1", "r1", &selector),
            store.reassign_reviewer("pr-1", "r2", &selector),
        );
        left.unwrap();
        right.unwrap();

        let assigned = store.get_pr("pr-1").await.unwrap().assigned_reviewers;
        assert_eq!(assigned.len(), 2);
        assert_ne!(assigned[0], assigned[1]);
        assert!(!assigned.contains(&"a1".to_string()));
    }

    #[tokio::test]
    async fn test_update_reviewers_frozen_after_merge() {
        let store = MemoryStore::new();
        store.create_team(&team("core", &["a1", "r1", "r2", "r3", "r4"])).await.unwrap();
        store
            .create_pr(&PullRequest::new("pr-1", "fix", "a1", reviewers(&["r1"])))
            .await
            .unwrap();
        store
            .update_pr_reviewers("pr-1", &reviewers(&["r2", "r3"]))
            .await
            .unwrap();
        assert_eq!(
            store.get_pr("pr-1").await.unwrap().assigned_reviewers,
            reviewers(&["r2", "r3"])
        );

        store.merge_pr("pr-1", Utc::now()).await.unwrap();
        assert!(matches!(
            store.update_pr_reviewers("pr-1", &reviewers(&["r4"])).await,
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            store
                .reassign_reviewer("pr-1", "r2", &ReviewerSelector::seeded(1))
                .await,
            Err(Error::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_team_roundtrip_and_upsert() {
        let store = MemoryStore::new();
        store.create_team(&team("core", &["u2", "u1"])).await.unwrap();

        let fetched = store.get_team("core").await.unwrap();
        let ids: Vec<_> = fetched.members.iter().map(|m| m.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u2"]);
        assert!(store.team_exists("core").await.unwrap());

        // Moving u2 to another team through an upsert
        store.create_team(&team("infra", &["u2"])).await.unwrap();
        assert_eq!(store.get_team("core").await.unwrap().members.len(), 1);
        assert_eq!(store.get_user("u2").await.unwrap().team_name, "infra");

        assert!(matches!(
            store.get_team("ghost").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_team_rejects_known_names() {
        let store = MemoryStore::new();
        store.insert_team(&team("core", &["u1"])).await.unwrap();

        let err = store.insert_team(&team("core", &["u2"])).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert!(matches!(store.get_user("u2").await, Err(Error::NotFound(_))));

        // A user upsert puts its team on record as well
        store
            .create_or_update_user(&User::new("x1", "x", "infra", true))
            .await
            .unwrap();
        assert!(store.team_exists("infra").await.unwrap());
        assert!(matches!(
            store.insert_team(&team("infra", &["x2"])).await,
            Err(Error::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_active_members_exclusion() {
        let store = MemoryStore::new();
        store
            .create_team(&team("core", &["u3", "u1", "u2", "u4"]))
            .await
            .unwrap();
        store.set_user_active("u4", false).await.unwrap();
        store
            .create_or_update_user(&User::new("x1", "x", "other", true))
            .await
            .unwrap();

        let members = store
            .get_active_team_members("core", &reviewers(&["u2"]))
            .await
            .unwrap();
        let ids: Vec<_> = members.iter().map(|u| u.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u3"]);
    }

    #[tokio::test]
    async fn test_bulk_deactivate_spares_merged_history() {
        let store = MemoryStore::new();
        store.create_team(&team("core", &["u1", "u2"])).await.unwrap();
        store.create_team(&team("infra", &["a1", "x1"])).await.unwrap();

        store
            .create_pr(&PullRequest::new("p1", "open", "a1", reviewers(&["u1", "x1"])))
            .await
            .unwrap();
        store
            .create_pr(&PullRequest::new("p2", "merged", "a1", reviewers(&["u1"])))
            .await
            .unwrap();
        store.merge_pr("p2", Utc::now()).await.unwrap();

        let summary = store.bulk_deactivate_users("core").await.unwrap();
        assert_eq!(summary.users_deactivated, 2);
        assert_eq!(summary.assignments_removed, 1);

        assert!(!store.get_user("u1").await.unwrap().is_active);
        assert!(!store.get_user("u2").await.unwrap().is_active);
        assert_eq!(
            store.get_pr("p1").await.unwrap().assigned_reviewers,
            reviewers(&["x1"])
        );
        assert_eq!(
            store.get_pr("p2").await.unwrap().assigned_reviewers,
            reviewers(&["u1"])
        );
    }

    #[tokio::test]
    async fn test_review_prs_newest_first() {
        let store = MemoryStore::new();
        store.create_team(&team("core", &["a1", "r1"])).await.unwrap();
        for id in ["p1", "p2", "p3"] {
            store
                .create_pr(&PullRequest::new(id, id, "a1", reviewers(&["r1"])))
                .await
                .unwrap();
        }

        let prs = store.get_user_review_prs("r1").await.unwrap();
        let ids: Vec<_> = prs.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p3", "p2", "p1"]);
        assert!(store.get_user_review_prs("a1").await.unwrap().is_empty());
    }
}
