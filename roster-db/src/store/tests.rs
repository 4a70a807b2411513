use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tempfile::TempDir;

use roster_core::models::{PrStatus, PullRequest, Team, TeamMember, User};
use roster_core::service::PullRequestService;
use roster_core::store::EntityStore;
use roster_core::{Error, ReviewerSelector};

use super::SqliteStore;
use crate::tests::test_config;
use crate::Database;

async fn setup() -> (TempDir, SqliteStore) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(&test_config(&temp_dir)).await.unwrap();
    (temp_dir, db.store())
}

async fn seed_team(store: &SqliteStore, name: &str, ids: &[&str]) {
    let members = ids
        .iter()
        .map(|id| TeamMember::new(*id, format!("{}-name", id), true))
        .collect();
    store.create_team(&Team::new(name, members)).await.unwrap();
}

fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_pr_roundtrip_keeps_slot_order() {
    let (_dir, store) = setup().await;
    seed_team(&store, "core", &["a1", "r1", "r2"]).await;

    let pr = PullRequest::new("p1", "fix", "a1", ids(&["r2", "r1"]));
    store.create_pr(&pr).await.unwrap();

    let fetched = store.get_pr("p1").await.unwrap();
    assert_eq!(fetched.assigned_reviewers, ids(&["r2", "r1"]));
    assert_eq!(fetched.status, PrStatus::Open);
    assert!(fetched.merged_at.is_none());
    assert_eq!(
        fetched.created_at.timestamp_millis(),
        pr.created_at.timestamp_millis()
    );
    assert!(store.pr_exists("p1").await.unwrap());
    assert!(!store.pr_exists("p2").await.unwrap());

    assert!(matches!(
        store.get_pr("p2").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_create_pr_duplicate_is_conflict() {
    let (_dir, store) = setup().await;
    seed_team(&store, "core", &["a1", "r1"]).await;

    store
        .create_pr(&PullRequest::new("p1", "first", "a1", ids(&["r1"])))
        .await
        .unwrap();
    let err = store
        .create_pr(&PullRequest::new("p1", "again", "a1", vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // The failed insert left the first pull request alone
    assert_eq!(store.get_pr("p1").await.unwrap().name, "first");
}

#[tokio::test]
async fn test_create_pr_is_atomic() {
    let (_dir, store) = setup().await;
    seed_team(&store, "core", &["a1", "r1"]).await;

    // Unknown reviewer fails the foreign key after the pull request row went in
    let err = store
        .create_pr(&PullRequest::new("p1", "fix", "a1", ids(&["r1", "ghost"])))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(!store.pr_exists("p1").await.unwrap());
}

#[tokio::test]
async fn test_merge_is_compare_and_set() {
    let (_dir, store) = setup().await;
    seed_team(&store, "core", &["a1", "r1"]).await;
    store
        .create_pr(&PullRequest::new("p1", "fix", "a1", ids(&["r1"])))
        .await
        .unwrap();

    let first_at = Utc::now();
    assert!(store.merge_pr("p1", first_at).await.unwrap());
    assert!(!store
        .merge_pr("p1", first_at + ChronoDuration::seconds(5))
        .await
        .unwrap());

    let pr = store.get_pr("p1").await.unwrap();
    assert_eq!(pr.status, PrStatus::Merged);
    assert_eq!(
        pr.merged_at.map(|at| at.timestamp_millis()),
        Some(first_at.timestamp_millis())
    );

    assert!(matches!(
        store.merge_pr("ghost", Utc::now()).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_update_reviewers() {
    let (_dir, store) = setup().await;
    seed_team(&store, "core", &["a1", "r1", "r2", "r3"]).await;
    store
        .create_pr(&PullRequest::new("p1", "fix", "a1", ids(&["r1", "r2"])))
        .await
        .unwrap();

    store
        .update_pr_reviewers("p1", &ids(&["r3", "r1"]))
        .await
        .unwrap();
    assert_eq!(
        store.get_pr("p1").await.unwrap().assigned_reviewers,
        ids(&["r3", "r1"])
    );

    let err = store
        .update_pr_reviewers("p1", &ids(&["r2", "r2"]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(
        store.get_pr("p1").await.unwrap().assigned_reviewers,
        ids(&["r3", "r1"])
    );

    store.merge_pr("p1", Utc::now()).await.unwrap();
    assert!(matches!(
        store.update_pr_reviewers("p1", &ids(&["r2"])).await,
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(
        store.update_pr_reviewers("ghost", &[]).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_reassign_outcomes() {
    let (_dir, store) = setup().await;
    seed_team(&store, "core", &["a1", "r1", "r2", "r3"]).await;
    store
        .create_pr(&PullRequest::new("p1", "fix", "a1", ids(&["r1", "r2"])))
        .await
        .unwrap();
    let selector = ReviewerSelector::seeded(1);

    // r3 is the only teammate not already on the pull request
    let outcome = store.reassign_reviewer("p1", "r1", &selector).await.unwrap();
    assert_eq!(outcome.replaced_by, "r3");
    assert_eq!(outcome.pr.assigned_reviewers, ids(&["r3", "r2"]));
    assert_eq!(
        store.get_pr("p1").await.unwrap().assigned_reviewers,
        ids(&["r3", "r2"])
    );

    assert!(matches!(
        store.reassign_reviewer("p1", "r1", &selector).await,
        Err(Error::NotAssigned { .. })
    ));
    assert!(matches!(
        store.reassign_reviewer("p1", "ghost", &selector).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        store.reassign_reviewer("ghost", "r1", &selector).await,
        Err(Error::NotFound(_))
    ));

    store.set_user_active("r1", false).await.unwrap();
    assert!(matches!(
        store.reassign_reviewer("p1", "r2", &selector).await,
        Err(Error::NoCandidate(_))
    ));

    store.merge_pr("p1", Utc::now()).await.unwrap();
    assert!(matches!(
        store.reassign_reviewer("p1", "r2", &selector).await,
        Err(Error::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_reassign_after_deactivation_gap() {
    let (_dir, store) = setup().await;
    seed_team(&store, "core", &["a1", "r1", "r4"]).await;
    seed_team(&store, "infra", &["x1", "x2"]).await;
    store
        .create_pr(&PullRequest::new("p1", "fix", "a1", ids(&["x1", "r1"])))
        .await
        .unwrap();
    store.bulk_deactivate_users("infra").await.unwrap();

    let outcome = store
        .reassign_reviewer("p1", "r1", &ReviewerSelector::seeded(2))
        .await
        .unwrap();
    assert_eq!(outcome.replaced_by, "r4");
    assert_eq!(
        store.get_pr("p1").await.unwrap().assigned_reviewers,
        ids(&["r4"])
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_reassignments_of_one_reviewer() {
    let (_dir, store) = setup().await;
    seed_team(&store, "core", &["a1", "r1", "r2", "r3", "r4"]).await;
    store
        .create_pr(&PullRequest::new("p1", "fix", "a1", ids(&["r1", "r2"])))
        .await
        .unwrap();

    let left = {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .reassign_reviewer("p1", "r1", &ReviewerSelector::seeded(1))
                .await
        })
    };
    let right = {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .reassign_reviewer("p1", "r1", &ReviewerSelector::seeded(2))
                .await
        })
    };
    let (left, right) = (left.await.unwrap(), right.await.unwrap());

    assert!(left.is_ok() != right.is_ok(), "exactly one swap must win");
    let loser = left.as_ref().err().or(right.as_ref().err()).unwrap();
    assert!(matches!(loser, Error::NotAssigned { .. }));

    let reviewers = store.get_pr("p1").await.unwrap().assigned_reviewers;
    assert_eq!(reviewers.len(), 2);
    assert_eq!(reviewers[1], "r2");
    assert!(reviewers[0] == "r3" || reviewers[0] == "r4");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reassignments_of_different_reviewers() {
    let (_dir, store) = setup().await;
    seed_team(&store, "core", &["a1", "r1", "r2", "r3"]).await;

    for run in 0..10 {
        let pr_id = format!("p{}", run);
        store
            .create_pr(&PullRequest::new(pr_id.as_str(), "fix", "a1", ids(&["r1", "r2"])))
            .await
            .unwrap();

        let tasks: Vec<_> = ["r1", "r2"]
            .into_iter()
            .map(|old| {
                let store = store.clone();
                let pr_id = pr_id.clone();
                tokio::spawn(async move {
                    store
                        .reassign_reviewer(&pr_id, old, &ReviewerSelector::secure())
                        .await
                })
            })
            .collect();
        for task in tasks {
            // Each reassignment sees the other's outcome, so both find a candidate
            task.await.unwrap().unwrap();
        }

        let reviewers = store.get_pr(&pr_id).await.unwrap().assigned_reviewers;
        assert_eq!(reviewers.len(), 2, "run {}", run);
        assert_ne!(reviewers[0], reviewers[1], "run {}", run);
        assert!(!reviewers.contains(&"a1".to_string()), "run {}", run);
    }
}

#[tokio::test]
async fn test_users_and_teams() {
    let (_dir, store) = setup().await;
    assert!(!store.team_exists("core").await.unwrap());

    seed_team(&store, "core", &["u2", "u1"]).await;
    assert!(store.team_exists("core").await.unwrap());

    let team = store.get_team("core").await.unwrap();
    assert_eq!(team.members[0].user_id, "u1");
    assert_eq!(team.members[1].user_id, "u2");

    // Moving a user to another team upserts it
    store
        .create_or_update_user(&User::new("u2", "bob", "infra", false))
        .await
        .unwrap();
    assert_eq!(store.get_team("core").await.unwrap().members.len(), 1);
    assert_eq!(
        store.get_user("u2").await.unwrap(),
        User::new("u2", "bob", "infra", false)
    );

    let user = store.set_user_active("u2", true).await.unwrap();
    assert!(user.is_active);
    assert!(matches!(
        store.set_user_active("ghost", true).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        store.get_team("nobody").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_active_team_members_excludes() {
    let (_dir, store) = setup().await;
    seed_team(&store, "core", &["u1", "u2", "u3", "u4"]).await;
    seed_team(&store, "infra", &["x1"]).await;
    store.set_user_active("u4", false).await.unwrap();

    let all: Vec<String> = store
        .get_active_team_members("core", &[])
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.user_id)
        .collect();
    assert_eq!(all, ids(&["u1", "u2", "u3"]));

    let some: Vec<String> = store
        .get_active_team_members("core", &ids(&["u1", "u3"]))
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.user_id)
        .collect();
    assert_eq!(some, ids(&["u2"]));
}

#[tokio::test]
async fn test_review_prs_newest_first() {
    let (_dir, store) = setup().await;
    seed_team(&store, "core", &["a1", "r1"]).await;

    let mut older = PullRequest::new("p-old", "old", "a1", ids(&["r1"]));
    older.created_at = Utc::now() - ChronoDuration::hours(1);
    store.create_pr(&older).await.unwrap();
    store
        .create_pr(&PullRequest::new("p-new", "new", "a1", ids(&["r1"])))
        .await
        .unwrap();

    let prs = store.get_user_review_prs("r1").await.unwrap();
    let order: Vec<&str> = prs.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(order, vec!["p-new", "p-old"]);
    assert!(store.get_user_review_prs("a1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stats_and_counts() {
    let (_dir, store) = setup().await;
    seed_team(&store, "core", &["a1", "r1", "r2", "idle"]).await;
    store
        .create_pr(&PullRequest::new("p1", "one", "a1", ids(&["r1", "r2"])))
        .await
        .unwrap();
    store
        .create_pr(&PullRequest::new("p2", "two", "a1", ids(&["r1"])))
        .await
        .unwrap();
    store.merge_pr("p2", Utc::now()).await.unwrap();
    store.set_user_active("r2", false).await.unwrap();

    let mut stats = store.get_review_stats().await.unwrap();
    stats.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    let summary: Vec<(&str, i64, i64)> = stats
        .iter()
        .map(|s| (s.user_id.as_str(), s.open_prs, s.total_prs))
        .collect();
    // r2 is inactive and left out
    assert_eq!(summary, vec![("a1", 0, 0), ("idle", 0, 0), ("r1", 1, 2)]);

    let counts = store.get_pr_counts().await.unwrap();
    assert_eq!(counts.total_prs, 2);
    assert_eq!(counts.open_prs, 1);
    assert_eq!(counts.merged_prs, 1);
}

#[tokio::test]
async fn test_bulk_deactivate_keeps_merged_history() {
    let (_dir, store) = setup().await;
    seed_team(&store, "core", &["u1", "u2"]).await;
    seed_team(&store, "infra", &["a1", "x1"]).await;

    store
        .create_pr(&PullRequest::new("p-open", "open", "a1", ids(&["u1", "x1"])))
        .await
        .unwrap();
    store
        .create_pr(&PullRequest::new("p-merged", "merged", "a1", ids(&["u2"])))
        .await
        .unwrap();
    store.merge_pr("p-merged", Utc::now()).await.unwrap();

    let summary = store.bulk_deactivate_users("core").await.unwrap();
    assert_eq!(summary.team_name, "core");
    assert_eq!(summary.users_deactivated, 2);
    assert_eq!(summary.assignments_removed, 1);

    assert_eq!(
        store.get_pr("p-open").await.unwrap().assigned_reviewers,
        ids(&["x1"])
    );
    assert_eq!(
        store.get_pr("p-merged").await.unwrap().assigned_reviewers,
        ids(&["u2"])
    );
    assert!(!store.get_user("u1").await.unwrap().is_active);
    assert!(store.get_user("x1").await.unwrap().is_active);
}

#[tokio::test]
async fn test_insert_team_conflicts_on_known_name() {
    let (_dir, store) = setup().await;
    store
        .insert_team(&Team::new("core", vec![TeamMember::new("u1", "alice", true)]))
        .await
        .unwrap();

    let err = store
        .insert_team(&Team::new("core", vec![TeamMember::new("u2", "bob", true)]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert!(matches!(store.get_user("u2").await, Err(Error::NotFound(_))));

    // Teams put on record through a user upsert count as well
    store
        .create_or_update_user(&User::new("x1", "x", "infra", true))
        .await
        .unwrap();
    assert!(matches!(
        store
            .insert_team(&Team::new("infra", vec![TeamMember::new("x2", "y", true)]))
            .await,
        Err(Error::Conflict(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_insert_team_one_wins() {
    let (_dir, store) = setup().await;

    for run in 0..10 {
        let team_name = format!("team-{}", run);
        let tasks: Vec<_> = ["left", "right"]
            .into_iter()
            .map(|side| {
                let store = store.clone();
                let team = Team::new(
                    team_name.as_str(),
                    vec![TeamMember::new(format!("{}-{}", side, run), side, true)],
                );
                tokio::spawn(async move { store.insert_team(&team).await })
            })
            .collect();

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap());
        }

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1, "run {}", run);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(Error::Conflict(_)))));
        assert_eq!(store.get_team(&team_name).await.unwrap().members.len(), 1);
    }
}

async fn block_deactivation(store: &SqliteStore) {
    sqlx::query(
        r#"
        CREATE TRIGGER block_deactivation BEFORE UPDATE OF is_active ON users
        WHEN NEW.is_active = 0
        BEGIN
            SELECT RAISE(ABORT, 'deactivation blocked');
        END
        "#,
    )
    .execute(&store.pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn test_bulk_deactivate_rolls_back_on_failure() {
    let (_dir, store) = setup().await;
    seed_team(&store, "core", &["u1", "u2"]).await;
    seed_team(&store, "infra", &["a1", "x1"]).await;
    store
        .create_pr(&PullRequest::new("p1", "open", "a1", ids(&["u1", "x1"])))
        .await
        .unwrap();

    // The assignment delete succeeds, then the deactivation update aborts
    block_deactivation(&store).await;
    let err = store.bulk_deactivate_users("core").await.unwrap_err();
    assert!(matches!(err, Error::Unavailable(_)));

    assert_eq!(
        store.get_pr("p1").await.unwrap().assigned_reviewers,
        ids(&["u1", "x1"])
    );
    assert!(store.get_user("u1").await.unwrap().is_active);
    assert!(store.get_user("u2").await.unwrap().is_active);
}

#[tokio::test]
async fn test_update_reviewers_rolls_back_on_failure() {
    let (_dir, store) = setup().await;
    seed_team(&store, "core", &["a1", "r1", "r2", "r3"]).await;
    store
        .create_pr(&PullRequest::new("p1", "fix", "a1", ids(&["r1", "r2"])))
        .await
        .unwrap();

    // Old assignments are deleted before the unknown reviewer fails its insert
    let err = store
        .update_pr_reviewers("p1", &ids(&["r3", "ghost"]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(
        store.get_pr("p1").await.unwrap().assigned_reviewers,
        ids(&["r1", "r2"])
    );
}

#[tokio::test]
async fn test_dropped_bulk_deactivate_writes_nothing() {
    let (_dir, store) = setup().await;
    seed_team(&store, "core", &["u1", "u2"]).await;
    seed_team(&store, "infra", &["a1"]).await;
    store
        .create_pr(&PullRequest::new("p1", "open", "a1", ids(&["u1"])))
        .await
        .unwrap();

    // Hold the write lock so the deactivation is still in flight when dropped
    let mut blocker = store.pool.acquire().await.unwrap();
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut *blocker)
        .await
        .unwrap();

    let outcome = tokio::time::timeout(
        std::time::Duration::from_millis(200),
        store.bulk_deactivate_users("core"),
    )
    .await;
    assert!(outcome.is_err(), "deactivation should still be waiting");

    sqlx::query("ROLLBACK").execute(&mut *blocker).await.unwrap();
    drop(blocker);

    assert_eq!(
        store.get_pr("p1").await.unwrap().assigned_reviewers,
        ids(&["u1"])
    );
    assert!(store.get_user("u1").await.unwrap().is_active);
    assert!(store.get_user("u2").await.unwrap().is_active);

    // The pool is still usable once the abandoned transaction is gone
    let summary = store.bulk_deactivate_users("core").await.unwrap();
    assert_eq!(summary.users_deactivated, 2);
    assert!(store.get_pr("p1").await.unwrap().assigned_reviewers.is_empty());
}

#[tokio::test]
async fn test_lifecycle_through_service() {
    let (_dir, store) = setup().await;
    seed_team(&store, "core", &["a1", "r1", "r2", "r3"]).await;
    let service = PullRequestService::new(Arc::new(store.clone()), ReviewerSelector::seeded(7));

    let pr = service.create_pr("p1", "feature", "a1").await.unwrap();
    assert_eq!(pr.assigned_reviewers.len(), 2);
    assert!(!pr.has_reviewer("a1"));

    let old = pr.assigned_reviewers[0].clone();
    let reassigned = service.reassign_reviewer("p1", &old).await.unwrap();
    assert_eq!(reassigned.pr.assigned_reviewers[0], reassigned.replaced_by);
    assert_ne!(reassigned.replaced_by, old);
    assert_ne!(reassigned.replaced_by, "a1");

    let merged = service.merge_pr("p1").await.unwrap();
    assert_eq!(merged.status, PrStatus::Merged);
    let again = service.merge_pr("p1").await.unwrap();
    assert_eq!(again.merged_at, merged.merged_at);

    let current = merged.assigned_reviewers[1].clone();
    assert!(matches!(
        service.reassign_reviewer("p1", &current).await,
        Err(Error::InvalidState(_))
    ));
}
