//! SQLite implementation of the entity store
//!
//! Multi-row writes run inside a transaction; an abandoned future drops the
//! transaction and SQLite rolls it back. Compare-and-set operations are a
//! single conditional statement, diagnosed afterwards when nothing matched.
//! Read-modify-write operations open with a write so the transaction holds
//! the database write lock before its first read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use roster_core::models::{
    DeactivationSummary, PrCounts, PrStatus, PullRequest, PullRequestShort, Reassignment,
    ReviewStat, Team, TeamMember, User,
};
use roster_core::store::EntityStore;
use roster_core::{Error, Result, ReviewerSelector};

use crate::error::{classify, unavailable};

#[cfg(test)]
mod tests;

#[derive(sqlx::FromRow)]
struct PrRow {
    pull_request_id: String,
    pull_request_name: String,
    author_id: String,
    status: String,
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct PrShortRow {
    pull_request_id: String,
    pull_request_name: String,
    author_id: String,
    status: String,
}

impl TryFrom<PrShortRow> for PullRequestShort {
    type Error = Error;

    fn try_from(row: PrShortRow) -> Result<Self> {
        Ok(PullRequestShort {
            id: row.pull_request_id,
            name: row.pull_request_name,
            author_id: row.author_id,
            status: row.status.parse()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: String,
    username: String,
    team_name: String,
    is_active: bool,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User::new(row.user_id, row.username, row.team_name, row.is_active)
    }
}

#[derive(sqlx::FromRow)]
struct StatRow {
    user_id: String,
    open_prs: i64,
    total_prs: i64,
}

#[derive(sqlx::FromRow)]
struct CountsRow {
    total_prs: i64,
    open_prs: i64,
    merged_prs: i64,
}

const USER_COLUMNS: &str = "user_id, username, team_name, is_active";

/// Entity store backed by a SQLite pool
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn pr_status(conn: &mut SqliteConnection, pr_id: &str) -> Result<Option<PrStatus>> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM pull_requests WHERE pull_request_id = ?")
                .bind(pr_id)
                .fetch_optional(&mut *conn)
                .await
                .map_err(unavailable)?;

        status.map(|s| s.parse()).transpose()
    }

    async fn fetch_pr(conn: &mut SqliteConnection, pr_id: &str) -> Result<PullRequest> {
        let row: PrRow = sqlx::query_as(
            r#"
            SELECT pull_request_id, pull_request_name, author_id, status, created_at, merged_at
            FROM pull_requests
            WHERE pull_request_id = ?
            "#,
        )
        .bind(pr_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(unavailable)?
        .ok_or_else(|| Error::pr_not_found(pr_id))?;

        let assigned_reviewers: Vec<String> = sqlx::query_scalar(
            "SELECT user_id FROM pull_request_reviewers WHERE pull_request_id = ? ORDER BY slot",
        )
        .bind(pr_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(unavailable)?;

        Ok(PullRequest {
            id: row.pull_request_id,
            name: row.pull_request_name,
            author_id: row.author_id,
            status: row.status.parse()?,
            assigned_reviewers,
            created_at: row.created_at,
            merged_at: row.merged_at,
        })
    }

    async fn fetch_user(conn: &mut SqliteConnection, user_id: &str) -> Result<User> {
        let row: UserRow = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE user_id = ?",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(unavailable)?
        .ok_or_else(|| Error::user_not_found(user_id))?;

        Ok(row.into())
    }

    async fn fetch_active_members(
        conn: &mut SqliteConnection,
        team_name: &str,
        exclude_ids: &[String],
    ) -> Result<Vec<User>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM users WHERE is_active = 1 AND team_name = ",
            USER_COLUMNS
        ));
        query.push_bind(team_name);

        if !exclude_ids.is_empty() {
            query.push(" AND user_id NOT IN (");
            let mut ids = query.separated(", ");
            for id in exclude_ids {
                ids.push_bind(id);
            }
            ids.push_unseparated(")");
        }
        query.push(" ORDER BY user_id");

        let rows: Vec<UserRow> = query
            .build_query_as()
            .fetch_all(&mut *conn)
            .await
            .map_err(unavailable)?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Bump `updated_at` on an open pull request
    ///
    /// As the first statement of a transaction this takes the database write
    /// lock, so later reads in the same transaction cannot go stale. Returns
    /// whether an open row matched.
    async fn touch_open_pr(conn: &mut SqliteConnection, pr_id: &str) -> Result<bool> {
        let touched = sqlx::query(
            r#"
            UPDATE pull_requests SET updated_at = CURRENT_TIMESTAMP
            WHERE pull_request_id = ? AND status = 'OPEN'
            "#,
        )
        .bind(pr_id)
        .execute(&mut *conn)
        .await
        .map_err(unavailable)?;

        Ok(touched.rows_affected() == 1)
    }

    async fn save_team(conn: &mut SqliteConnection, team: &Team) -> Result<()> {
        for member in &team.members {
            Self::upsert_user(&mut *conn, &member.to_user(&team.team_name)).await?;
        }
        Ok(())
    }

    async fn upsert_user(conn: &mut SqliteConnection, user: &User) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO teams (team_name) VALUES (?)")
            .bind(&user.team_name)
            .execute(&mut *conn)
            .await
            .map_err(unavailable)?;

        sqlx::query(
            r#"
            INSERT INTO users (user_id, username, team_name, is_active)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                username = excluded.username,
                team_name = excluded.team_name,
                is_active = excluded.is_active,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&user.user_id)
        .bind(&user.username)
        .bind(&user.team_name)
        .bind(user.is_active)
        .execute(&mut *conn)
        .await
        .map_err(classify(format!("user {}", user.user_id)))?;

        Ok(())
    }

    async fn insert_reviewers(
        conn: &mut SqliteConnection,
        pr_id: &str,
        reviewer_ids: &[String],
    ) -> Result<()> {
        let now = Utc::now();
        for (slot, reviewer_id) in reviewer_ids.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO pull_request_reviewers (pull_request_id, user_id, slot, assigned_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(pr_id)
            .bind(reviewer_id)
            .bind(slot as i64)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(classify(format!(
                "reviewer {} on pull request {}",
                reviewer_id, pr_id
            )))?;
        }
        Ok(())
    }
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn create_pr(&self, pr: &PullRequest) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        sqlx::query(
            r#"
            INSERT INTO pull_requests (
                pull_request_id, pull_request_name, author_id, status, created_at, merged_at
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&pr.id)
        .bind(&pr.name)
        .bind(&pr.author_id)
        .bind(pr.status.as_str())
        .bind(pr.created_at)
        .bind(pr.merged_at)
        .execute(&mut *tx)
        .await
        .map_err(classify(format!("pull request {}", pr.id)))?;

        Self::insert_reviewers(&mut *tx, &pr.id, &pr.assigned_reviewers).await?;

        tx.commit().await.map_err(unavailable)?;
        Ok(())
    }

    async fn pr_exists(&self, pr_id: &str) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pull_requests WHERE pull_request_id = ?)")
            .bind(pr_id)
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)
    }

    async fn get_pr(&self, pr_id: &str) -> Result<PullRequest> {
        // One read transaction so the row and its reviewers are one snapshot
        let mut tx = self.pool.begin().await.map_err(unavailable)?;
        let pr = Self::fetch_pr(&mut *tx, pr_id).await?;
        tx.commit().await.map_err(unavailable)?;
        Ok(pr)
    }

    async fn merge_pr(&self, pr_id: &str, merged_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE pull_requests
            SET status = 'MERGED', merged_at = ?, updated_at = CURRENT_TIMESTAMP
            WHERE pull_request_id = ? AND status = 'OPEN'
            "#,
        )
        .bind(merged_at)
        .bind(pr_id)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        if self.pr_exists(pr_id).await? {
            Ok(false)
        } else {
            Err(Error::pr_not_found(pr_id))
        }
    }

    async fn update_pr_reviewers(&self, pr_id: &str, reviewer_ids: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        if !Self::touch_open_pr(&mut *tx, pr_id).await? {
            return match Self::pr_status(&mut *tx, pr_id).await? {
                None => Err(Error::pr_not_found(pr_id)),
                Some(_) => Err(Error::InvalidState(format!(
                    "pull request {} is merged",
                    pr_id
                ))),
            };
        }

        sqlx::query("DELETE FROM pull_request_reviewers WHERE pull_request_id = ?")
            .bind(pr_id)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;

        Self::insert_reviewers(&mut *tx, pr_id, reviewer_ids).await?;

        tx.commit().await.map_err(unavailable)?;
        Ok(())
    }

    async fn reassign_reviewer(
        &self,
        pr_id: &str,
        old_reviewer_id: &str,
        selector: &ReviewerSelector,
    ) -> Result<Reassignment> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        // A missing or merged row is reported by the checks below
        Self::touch_open_pr(&mut *tx, pr_id).await?;

        let mut pr = Self::fetch_pr(&mut *tx, pr_id).await?;
        let old_reviewer = Self::fetch_user(&mut *tx, old_reviewer_id).await?;
        let slot = pr.reassignable_slot(old_reviewer_id)?;

        let candidates = Self::fetch_active_members(
            &mut *tx,
            &old_reviewer.team_name,
            &pr.reassignment_exclusions(),
        )
        .await?;
        let new_reviewer = selector
            .pick_one(&candidates)?
            .ok_or_else(|| Error::no_candidate(&old_reviewer.team_name))?;

        sqlx::query(
            r#"
            UPDATE pull_request_reviewers
            SET user_id = ?, assigned_at = ?
            WHERE pull_request_id = ? AND user_id = ?
            "#,
        )
        .bind(&new_reviewer.user_id)
        .bind(Utc::now())
        .bind(pr_id)
        .bind(old_reviewer_id)
        .execute(&mut *tx)
        .await
        .map_err(classify(format!(
            "reviewer {} on pull request {}",
            new_reviewer.user_id, pr_id
        )))?;

        tx.commit().await.map_err(unavailable)?;

        pr.assigned_reviewers[slot] = new_reviewer.user_id.clone();
        Ok(Reassignment {
            pr,
            replaced_by: new_reviewer.user_id,
        })
    }

    async fn get_review_stats(&self) -> Result<Vec<ReviewStat>> {
        let rows: Vec<StatRow> = sqlx::query_as(
            r#"
            SELECT
                u.user_id AS user_id,
                COALESCE(SUM(CASE WHEN pr.status = 'OPEN' THEN 1 ELSE 0 END), 0) AS open_prs,
                COUNT(pr.pull_request_id) AS total_prs
            FROM users u
            LEFT JOIN pull_request_reviewers prr ON prr.user_id = u.user_id
            LEFT JOIN pull_requests pr ON pr.pull_request_id = prr.pull_request_id
            WHERE u.is_active = 1
            GROUP BY u.user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(rows
            .into_iter()
            .map(|row| ReviewStat {
                user_id: row.user_id,
                open_prs: row.open_prs,
                total_prs: row.total_prs,
            })
            .collect())
    }

    async fn get_pr_counts(&self) -> Result<PrCounts> {
        let row: CountsRow = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS total_prs,
                COALESCE(SUM(CASE WHEN status = 'OPEN' THEN 1 ELSE 0 END), 0) AS open_prs,
                COALESCE(SUM(CASE WHEN status = 'MERGED' THEN 1 ELSE 0 END), 0) AS merged_prs
            FROM pull_requests
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(PrCounts {
            total_prs: row.total_prs,
            open_prs: row.open_prs,
            merged_prs: row.merged_prs,
        })
    }

    async fn create_or_update_user(&self, user: &User) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;
        Self::upsert_user(&mut *tx, user).await?;
        tx.commit().await.map_err(unavailable)?;
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<User> {
        let mut conn = self.pool.acquire().await.map_err(unavailable)?;
        Self::fetch_user(&mut *conn, user_id).await
    }

    async fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<User> {
        let row: UserRow = sqlx::query_as(&format!(
            r#"
            UPDATE users SET is_active = ?, updated_at = CURRENT_TIMESTAMP
            WHERE user_id = ?
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(is_active)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?
        .ok_or_else(|| Error::user_not_found(user_id))?;

        Ok(row.into())
    }

    async fn get_active_team_members(
        &self,
        team_name: &str,
        exclude_ids: &[String],
    ) -> Result<Vec<User>> {
        let mut conn = self.pool.acquire().await.map_err(unavailable)?;
        Self::fetch_active_members(&mut *conn, team_name, exclude_ids).await
    }

    async fn get_user_review_prs(&self, user_id: &str) -> Result<Vec<PullRequestShort>> {
        let rows: Vec<PrShortRow> = sqlx::query_as(
            r#"
            SELECT pr.pull_request_id, pr.pull_request_name, pr.author_id, pr.status
            FROM pull_requests pr
            JOIN pull_request_reviewers prr ON prr.pull_request_id = pr.pull_request_id
            WHERE prr.user_id = ?
            ORDER BY pr.created_at DESC, pr.rowid DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.into_iter().map(PullRequestShort::try_from).collect()
    }

    async fn create_team(&self, team: &Team) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        sqlx::query("INSERT OR IGNORE INTO teams (team_name) VALUES (?)")
            .bind(&team.team_name)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;
        Self::save_team(&mut *tx, team).await?;

        tx.commit().await.map_err(unavailable)?;
        Ok(())
    }

    async fn insert_team(&self, team: &Team) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        sqlx::query("INSERT INTO teams (team_name) VALUES (?)")
            .bind(&team.team_name)
            .execute(&mut *tx)
            .await
            .map_err(classify(format!("team {}", team.team_name)))?;
        Self::save_team(&mut *tx, team).await?;

        tx.commit().await.map_err(unavailable)?;
        Ok(())
    }

    async fn team_exists(&self, team_name: &str) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM teams WHERE team_name = ?)")
            .bind(team_name)
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)
    }

    async fn get_team(&self, team_name: &str) -> Result<Team> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE team_name = ? ORDER BY user_id",
            USER_COLUMNS
        ))
        .bind(team_name)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        if rows.is_empty() {
            return Err(Error::team_not_found(team_name));
        }

        let members = rows
            .into_iter()
            .map(|row| TeamMember::from(User::from(row)))
            .collect();
        Ok(Team::new(team_name, members))
    }

    async fn bulk_deactivate_users(&self, team_name: &str) -> Result<DeactivationSummary> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        let removed = sqlx::query(
            r#"
            DELETE FROM pull_request_reviewers
            WHERE user_id IN (SELECT user_id FROM users WHERE team_name = ?)
              AND pull_request_id IN (
                  SELECT pull_request_id FROM pull_requests WHERE status = 'OPEN'
              )
            "#,
        )
        .bind(team_name)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;

        let deactivated = sqlx::query(
            r#"
            UPDATE users SET is_active = 0, updated_at = CURRENT_TIMESTAMP
            WHERE team_name = ?
            "#,
        )
        .bind(team_name)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;

        tx.commit().await.map_err(unavailable)?;

        Ok(DeactivationSummary {
            team_name: team_name.to_string(),
            users_deactivated: deactivated.rows_affected(),
            assignments_removed: removed.rows_affected(),
        })
    }
}
