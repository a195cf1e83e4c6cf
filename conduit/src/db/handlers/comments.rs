//! Database repository for comments.

use crate::db::{
    errors::Result,
    models::comments::{CommentCreateDBRequest, CommentDBResponse},
};
use crate::types::{ArticleId, CommentId};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

pub struct Comments<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Comments<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(article_id = %request.article_id), err)]
    pub async fn create(&mut self, request: &CommentCreateDBRequest) -> Result<CommentDBResponse> {
        let comment_id = Uuid::new_v4();

        let comment = sqlx::query_as::<_, CommentDBResponse>(
            r#"
            INSERT INTO comments (id, article_id, author_id, body)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(comment_id)
        .bind(request.article_id)
        .bind(request.author_id)
        .bind(&request.body)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(comment)
    }

    /// Comments on an article, oldest first
    #[instrument(skip(self), fields(article_id = %article_id), err)]
    pub async fn list_for_article(&mut self, article_id: ArticleId) -> Result<Vec<CommentDBResponse>> {
        let comments = sqlx::query_as::<_, CommentDBResponse>(
            "SELECT * FROM comments WHERE article_id = $1 ORDER BY created_at ASC",
        )
        .bind(article_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(comments)
    }

    /// Delete comments by id. Missing ids are skipped; returns how many rows
    /// actually went away.
    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    pub async fn delete_by_ids(&mut self, ids: &[CommentId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM comments WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::super::articles::Articles;
    use super::super::repository::Repository;
    use super::super::users::Users;
    use super::*;
    use crate::db::models::articles::ArticleCreateDBRequest;
    use crate::db::models::users::UserCreateDBRequest;
    use crate::types::UserId;
    use sqlx::PgPool;

    async fn seed_article(conn: &mut PgConnection) -> (UserId, ArticleId) {
        let author = {
            let mut users = Users::new(conn);
            users
                .create(&UserCreateDBRequest {
                    username: "commenter".to_string(),
                    email: "commenter@example.com".to_string(),
                    bio: String::new(),
                    image: None,
                    password_hash: "$argon2id$fake".to_string(),
                })
                .await
                .unwrap()
                .id
        };

        let mut articles = Articles::new(conn);
        let article = articles
            .create(&ArticleCreateDBRequest {
                slug: "discussed".to_string(),
                title: "discussed".to_string(),
                description: String::new(),
                body: String::new(),
                author_id: author,
                tag_names: vec![],
            })
            .await
            .unwrap();

        (author, article.id)
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_comments_list_oldest_first(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let (author, article_id) = seed_article(&mut conn).await;
        let mut repo = Comments::new(&mut conn);

        for body in ["first", "second", "third"] {
            repo.create(&CommentCreateDBRequest {
                article_id,
                author_id: author,
                body: body.to_string(),
            })
            .await
            .unwrap();
        }

        let comments = repo.list_for_article(article_id).await.unwrap();
        let bodies: Vec<_> = comments.iter().map(|c| c.body.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second", "third"]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_by_ids_skips_missing(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let (author, article_id) = seed_article(&mut conn).await;
        let mut repo = Comments::new(&mut conn);

        let comment = repo
            .create(&CommentCreateDBRequest {
                article_id,
                author_id: author,
                body: "ephemeral".to_string(),
            })
            .await
            .unwrap();

        let deleted = repo.delete_by_ids(&[comment.id, Uuid::new_v4()]).await.unwrap();
        assert_eq!(deleted, 1);

        // Idempotent: a second delete removes nothing
        let deleted = repo.delete_by_ids(&[comment.id]).await.unwrap();
        assert_eq!(deleted, 0);

        assert!(repo.list_for_article(article_id).await.unwrap().is_empty());
    }
}
