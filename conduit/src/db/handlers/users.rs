//! Database repository for users and the follow graph.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use crate::types::UserId;
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing users
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub skip: i64,
    pub limit: i64,
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        // Always generate a new ID for users
        let user_id = Uuid::new_v4();

        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            INSERT INTO users (id, username, email, bio, image, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&request.username)
        .bind(&request.email)
        .bind(&request.bio)
        .bind(&request.image)
        .bind(&request.password_hash)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let users = sqlx::query_as::<_, UserDBResponse>(
            "SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(users)
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(user_id = %id), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        // Atomic update with conditional field updates
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            UPDATE users SET
                username = COALESCE($2, username),
                email = COALESCE($3, email),
                bio = COALESCE($4, bio),
                image = COALESCE($5, image),
                password_hash = COALESCE($6, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.username.as_deref())
        .bind(request.email.as_deref())
        .bind(request.bio.as_deref())
        .bind(request.image.as_deref())
        .bind(request.password_hash.as_deref())
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(user)
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, email), err)]
    pub async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self), err)]
    pub async fn get_user_by_username(&mut self, username: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    /// Record that `follower` follows `followed`. Idempotent: following an
    /// already-followed user is a no-op.
    #[instrument(skip(self), fields(followed = %followed, follower = %follower), err)]
    pub async fn follow(&mut self, followed: UserId, follower: UserId) -> Result<()> {
        sqlx::query(
            "INSERT INTO follows (followed_id, follower_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(followed)
        .bind(follower)
        .execute(&mut *self.db)
        .await?;

        Ok(())
    }

    /// Remove a follow edge if it exists. Idempotent.
    #[instrument(skip(self), fields(followed = %followed, follower = %follower), err)]
    pub async fn unfollow(&mut self, followed: UserId, follower: UserId) -> Result<()> {
        sqlx::query("DELETE FROM follows WHERE followed_id = $1 AND follower_id = $2")
            .bind(followed)
            .bind(follower)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn is_following(&mut self, followed: UserId, follower: UserId) -> Result<bool> {
        let following = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE followed_id = $1 AND follower_id = $2)",
        )
        .bind(followed)
        .bind(follower)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(following)
    }
}

#[cfg(test)]
mod tests {
    use super::super::repository::Repository;
    use super::*;
    use sqlx::PgPool;

    fn test_user(username: &str, email: &str) -> UserCreateDBRequest {
        UserCreateDBRequest {
            username: username.to_string(),
            email: email.to_string(),
            bio: String::new(),
            image: None,
            password_hash: "$argon2id$fake".to_string(),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_and_fetch_user(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let created = repo.create(&test_user("testuser", "test@example.com")).await.unwrap();
        assert_eq!(created.username, "testuser");
        assert_eq!(created.email, "test@example.com");
        assert_eq!(created.bio, "");
        assert!(created.image.is_none());

        let by_email = repo.get_user_by_email("test@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);

        let by_username = repo.get_user_by_username("testuser").await.unwrap().unwrap();
        assert_eq!(by_username.id, created.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_email_is_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        repo.create(&test_user("first", "dup@example.com")).await.unwrap();
        let err = repo.create(&test_user("second", "dup@example.com")).await.unwrap_err();

        match err {
            DbError::UniqueViolation { table, .. } => {
                assert_eq!(table.as_deref(), Some("users"));
            }
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_partial_update_leaves_other_fields(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let created = repo.create(&test_user("partial", "partial@example.com")).await.unwrap();

        let update = UserUpdateDBRequest {
            bio: Some("new bio".to_string()),
            ..Default::default()
        };
        let updated = repo.update(created.id, &update).await.unwrap();

        assert_eq!(updated.bio, "new bio");
        assert_eq!(updated.username, "partial");
        assert_eq!(updated.email, "partial@example.com");
        assert_eq!(updated.password_hash, created.password_hash);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_missing_user_is_not_found(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let err = repo
            .update(Uuid::new_v4(), &UserUpdateDBRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_follow_is_idempotent(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let alice = repo.create(&test_user("alice", "alice@example.com")).await.unwrap();
        let bob = repo.create(&test_user("bob", "bob@example.com")).await.unwrap();

        assert!(!repo.is_following(alice.id, bob.id).await.unwrap());

        repo.follow(alice.id, bob.id).await.unwrap();
        repo.follow(alice.id, bob.id).await.unwrap();
        assert!(repo.is_following(alice.id, bob.id).await.unwrap());
        // Follows are directional
        assert!(!repo.is_following(bob.id, alice.id).await.unwrap());

        repo.unfollow(alice.id, bob.id).await.unwrap();
        repo.unfollow(alice.id, bob.id).await.unwrap();
        assert!(!repo.is_following(alice.id, bob.id).await.unwrap());
    }
}
