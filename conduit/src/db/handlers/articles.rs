//! Database repository for articles, tags and favorites.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::articles::{ArticleCreateDBRequest, ArticleDBResponse, ArticleUpdateDBRequest},
};
use crate::types::{ArticleId, TagId, UserId};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection};
use tracing::instrument;
use uuid::Uuid;

/// Which subset of articles to list. At most one criterion applies.
#[derive(Debug, Clone, Default)]
pub enum ArticleFilterKind {
    #[default]
    All,
    /// Articles carrying the given tag name
    Tag(String),
    /// Articles written by the given username
    Author(String),
    /// Articles favorited by the given username
    FavoritedBy(String),
}

/// Filter for listing articles
#[derive(Debug, Clone)]
pub struct ArticleFilter {
    pub kind: ArticleFilterKind,
    pub skip: i64,
    pub limit: i64,
}

// Database entity model; tags are attached separately
#[derive(Debug, Clone, FromRow)]
struct Article {
    pub id: ArticleId,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<(Vec<String>, Article)> for ArticleDBResponse {
    fn from((tags, article): (Vec<String>, Article)) -> Self {
        Self {
            id: article.id,
            slug: article.slug,
            title: article.title,
            description: article.description,
            body: article.body,
            author_id: article.author_id,
            tags,
            created_at: article.created_at,
            updated_at: article.updated_at,
        }
    }
}

pub struct Articles<'c> {
    db: &'c mut PgConnection,
}

/// Find-or-create each tag by name and link it to the article. Tag matching
/// is case-sensitive. Returns the linked names, duplicates collapsed, in
/// input order.
async fn link_tags(conn: &mut PgConnection, article_id: ArticleId, names: &[String]) -> Result<Vec<String>> {
    let mut linked: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if linked.iter().any(|n| n == name) {
            continue;
        }

        // DO UPDATE instead of DO NOTHING so RETURNING always yields the row
        let tag_id = sqlx::query_scalar::<_, TagId>(
            r#"
            INSERT INTO tags (id, name) VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query("INSERT INTO article_tags (article_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(article_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await?;

        linked.push(name.clone());
    }

    Ok(linked)
}

async fn tags_for(conn: &mut PgConnection, article_id: ArticleId) -> Result<Vec<String>> {
    let tags = sqlx::query_scalar::<_, String>(
        r#"
        SELECT t.name FROM tags t
        JOIN article_tags atg ON atg.tag_id = t.id
        WHERE atg.article_id = $1
        "#,
    )
    .bind(article_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(tags)
}

#[async_trait::async_trait]
impl<'c> Repository for Articles<'c> {
    type CreateRequest = ArticleCreateDBRequest;
    type UpdateRequest = ArticleUpdateDBRequest;
    type Response = ArticleDBResponse;
    type Id = ArticleId;
    type Filter = ArticleFilter;

    #[instrument(skip(self, request), fields(slug = %request.slug), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let article_id = Uuid::new_v4();

        // Article row and its tag links land atomically
        let mut tx = self.db.begin().await?;

        let article = sqlx::query_as::<_, Article>(
            r#"
            INSERT INTO articles (id, slug, title, description, body, author_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(article_id)
        .bind(&request.slug)
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.body)
        .bind(request.author_id)
        .fetch_one(&mut *tx)
        .await?;

        let tags = link_tags(&mut tx, article_id, &request.tag_names).await?;

        tx.commit().await?;

        Ok(ArticleDBResponse::from((tags, article)))
    }

    #[instrument(skip(self), fields(article_id = %id), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let article = sqlx::query_as::<_, Article>("SELECT * FROM articles WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match article {
            Some(article) => {
                let tags = tags_for(self.db, article.id).await?;
                Ok(Some(ArticleDBResponse::from((tags, article))))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let rows = match &filter.kind {
            ArticleFilterKind::All => {
                sqlx::query_as::<_, Article>(
                    "SELECT * FROM articles ORDER BY created_at DESC LIMIT $1 OFFSET $2",
                )
                .bind(filter.limit)
                .bind(filter.skip)
                .fetch_all(&mut *self.db)
                .await?
            }
            ArticleFilterKind::Tag(tag) => {
                sqlx::query_as::<_, Article>(
                    r#"
                    SELECT a.* FROM articles a
                    JOIN article_tags atg ON atg.article_id = a.id
                    JOIN tags t ON t.id = atg.tag_id
                    WHERE t.name = $1
                    ORDER BY a.created_at DESC LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(tag)
                .bind(filter.limit)
                .bind(filter.skip)
                .fetch_all(&mut *self.db)
                .await?
            }
            ArticleFilterKind::Author(username) => {
                sqlx::query_as::<_, Article>(
                    r#"
                    SELECT a.* FROM articles a
                    JOIN users u ON u.id = a.author_id
                    WHERE u.username = $1
                    ORDER BY a.created_at DESC LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(username)
                .bind(filter.limit)
                .bind(filter.skip)
                .fetch_all(&mut *self.db)
                .await?
            }
            ArticleFilterKind::FavoritedBy(username) => {
                sqlx::query_as::<_, Article>(
                    r#"
                    SELECT a.* FROM articles a
                    JOIN favorites f ON f.article_id = a.id
                    JOIN users u ON u.id = f.user_id
                    WHERE u.username = $1
                    ORDER BY f.created_at DESC LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(username)
                .bind(filter.limit)
                .bind(filter.skip)
                .fetch_all(&mut *self.db)
                .await?
            }
        };

        self.with_tags(rows).await
    }

    #[instrument(skip(self), fields(article_id = %id), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        // FK cascades remove tag links, favorites and comments
        let result = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(article_id = %id), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let article = sqlx::query_as::<_, Article>(
            r#"
            UPDATE articles SET
                slug = COALESCE($2, slug),
                title = COALESCE($3, title),
                description = COALESCE($4, description),
                body = COALESCE($5, body),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.slug.as_deref())
        .bind(request.title.as_deref())
        .bind(request.description.as_deref())
        .bind(request.body.as_deref())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        // The tag set is always replaced wholesale
        sqlx::query("DELETE FROM article_tags WHERE article_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let tags = link_tags(&mut tx, id, &request.tag_names).await?;

        tx.commit().await?;

        Ok(ArticleDBResponse::from((tags, article)))
    }
}

impl<'c> Articles<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    async fn with_tags(&mut self, rows: Vec<Article>) -> Result<Vec<ArticleDBResponse>> {
        let mut result = Vec::with_capacity(rows.len());
        for article in rows {
            let tags = tags_for(self.db, article.id).await?;
            result.push(ArticleDBResponse::from((tags, article)));
        }
        Ok(result)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_slug(&mut self, slug: &str) -> Result<Option<ArticleDBResponse>> {
        let article = sqlx::query_as::<_, Article>("SELECT * FROM articles WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&mut *self.db)
            .await?;

        match article {
            Some(article) => {
                let tags = tags_for(self.db, article.id).await?;
                Ok(Some(ArticleDBResponse::from((tags, article))))
            }
            None => Ok(None),
        }
    }

    /// Total number of articles matching a filter, ignoring pagination.
    ///
    /// For `FavoritedBy` this counts every favorite of that user rather than
    /// the matching articles; clients of the public API depend on that
    /// number, odd as it is.
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &ArticleFilter) -> Result<i64> {
        let count = match &filter.kind {
            ArticleFilterKind::All => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM articles")
                    .fetch_one(&mut *self.db)
                    .await?
            }
            ArticleFilterKind::Tag(tag) => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT COUNT(*) FROM articles a
                    JOIN article_tags atg ON atg.article_id = a.id
                    JOIN tags t ON t.id = atg.tag_id
                    WHERE t.name = $1
                    "#,
                )
                .bind(tag)
                .fetch_one(&mut *self.db)
                .await?
            }
            ArticleFilterKind::Author(username) => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT COUNT(*) FROM articles a
                    JOIN users u ON u.id = a.author_id
                    WHERE u.username = $1
                    "#,
                )
                .bind(username)
                .fetch_one(&mut *self.db)
                .await?
            }
            ArticleFilterKind::FavoritedBy(username) => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT COUNT(*) FROM favorites f
                    JOIN users u ON u.id = f.user_id
                    WHERE u.username = $1
                    "#,
                )
                .bind(username)
                .fetch_one(&mut *self.db)
                .await?
            }
        };

        Ok(count)
    }

    /// Articles authored by users that `user_id` follows, newest update
    /// first, with the total count for the same set.
    #[instrument(skip(self), fields(user_id = %user_id), err)]
    pub async fn feed(&mut self, user_id: UserId, skip: i64, limit: i64) -> Result<(Vec<ArticleDBResponse>, i64)> {
        let rows = sqlx::query_as::<_, Article>(
            r#"
            SELECT a.* FROM articles a
            WHERE a.author_id IN (SELECT followed_id FROM follows WHERE follower_id = $1)
            ORDER BY a.updated_at DESC LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;

        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM articles a
            WHERE a.author_id IN (SELECT followed_id FROM follows WHERE follower_id = $1)
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *self.db)
        .await?;

        let articles = self.with_tags(rows).await?;
        Ok((articles, count))
    }

    /// Mark an article as favorited by a user. Idempotent.
    #[instrument(skip(self), fields(article_id = %article_id, user_id = %user_id), err)]
    pub async fn set_favorite(&mut self, article_id: ArticleId, user_id: UserId) -> Result<()> {
        sqlx::query(
            "INSERT INTO favorites (article_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(article_id)
        .bind(user_id)
        .execute(&mut *self.db)
        .await?;

        Ok(())
    }

    /// Remove a favorite if it exists. Idempotent.
    #[instrument(skip(self), fields(article_id = %article_id, user_id = %user_id), err)]
    pub async fn remove_favorite(&mut self, article_id: ArticleId, user_id: UserId) -> Result<()> {
        sqlx::query("DELETE FROM favorites WHERE article_id = $1 AND user_id = $2")
            .bind(article_id)
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn is_favorited(&mut self, article_id: ArticleId, user_id: UserId) -> Result<bool> {
        let favorited = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM favorites WHERE article_id = $1 AND user_id = $2)",
        )
        .bind(article_id)
        .bind(user_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(favorited)
    }

    #[instrument(skip(self), err)]
    pub async fn favorites_count(&mut self, article_id: ArticleId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM favorites WHERE article_id = $1")
            .bind(article_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    /// Every tag name known to the system, in no particular order
    #[instrument(skip(self), err)]
    pub async fn all_tags(&mut self) -> Result<Vec<String>> {
        let tags = sqlx::query_scalar::<_, String>("SELECT name FROM tags")
            .fetch_all(&mut *self.db)
            .await?;

        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::super::repository::Repository;
    use super::super::users::Users;
    use super::*;
    use crate::db::models::users::UserCreateDBRequest;
    use sqlx::PgPool;

    async fn create_author(conn: &mut PgConnection, username: &str) -> UserId {
        let mut users = Users::new(conn);
        let user = users
            .create(&UserCreateDBRequest {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                bio: String::new(),
                image: None,
                password_hash: "$argon2id$fake".to_string(),
            })
            .await
            .unwrap();
        user.id
    }

    fn article_request(author_id: UserId, slug: &str, tags: &[&str]) -> ArticleCreateDBRequest {
        ArticleCreateDBRequest {
            slug: slug.to_string(),
            title: slug.replace('-', " "),
            description: "desc".to_string(),
            body: "body".to_string(),
            author_id,
            tag_names: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_article_with_tags(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let author = create_author(&mut conn, "author").await;
        let mut repo = Articles::new(&mut conn);

        let created = repo
            .create(&article_request(author, "first-post", &["rust", "web"]))
            .await
            .unwrap();

        assert_eq!(created.slug, "first-post");
        assert_eq!(created.tags, vec!["rust", "web"]);

        let fetched = repo.get_by_slug("first-post").await.unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        let mut tags = fetched.tags.clone();
        tags.sort();
        assert_eq!(tags, vec!["rust", "web"]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_tags_are_shared_between_articles(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let author = create_author(&mut conn, "author").await;
        let mut repo = Articles::new(&mut conn);

        repo.create(&article_request(author, "one", &["rust"])).await.unwrap();
        repo.create(&article_request(author, "two", &["rust", "tokio"])).await.unwrap();

        let mut tags = repo.all_tags().await.unwrap();
        tags.sort();
        // "rust" was reused, not duplicated
        assert_eq!(tags, vec!["rust", "tokio"]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_slug_is_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let author = create_author(&mut conn, "author").await;
        let mut repo = Articles::new(&mut conn);

        repo.create(&article_request(author, "same-slug", &[])).await.unwrap();
        let err = repo.create(&article_request(author, "same-slug", &[])).await.unwrap_err();

        match err {
            DbError::UniqueViolation { table, .. } => {
                assert_eq!(table.as_deref(), Some("articles"));
            }
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_replaces_tag_set(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let author = create_author(&mut conn, "author").await;
        let mut repo = Articles::new(&mut conn);

        let created = repo
            .create(&article_request(author, "tagged", &["old", "stale"]))
            .await
            .unwrap();

        let update = ArticleUpdateDBRequest {
            body: Some("new body".to_string()),
            tag_names: vec!["fresh".to_string()],
            ..Default::default()
        };
        let updated = repo.update(created.id, &update).await.unwrap();

        assert_eq!(updated.body, "new body");
        assert_eq!(updated.title, created.title);
        assert_eq!(updated.tags, vec!["fresh"]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_by_tag_and_author(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let alice = create_author(&mut conn, "alice").await;
        let bob = create_author(&mut conn, "bob").await;
        let mut repo = Articles::new(&mut conn);

        repo.create(&article_request(alice, "a-one", &["shared"])).await.unwrap();
        repo.create(&article_request(alice, "a-two", &[])).await.unwrap();
        repo.create(&article_request(bob, "b-one", &["shared"])).await.unwrap();

        let by_tag = ArticleFilter {
            kind: ArticleFilterKind::Tag("shared".to_string()),
            skip: 0,
            limit: 10,
        };
        let articles = repo.list(&by_tag).await.unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(repo.count(&by_tag).await.unwrap(), 2);

        let by_author = ArticleFilter {
            kind: ArticleFilterKind::Author("alice".to_string()),
            skip: 0,
            limit: 10,
        };
        let articles = repo.list(&by_author).await.unwrap();
        assert_eq!(articles.len(), 2);
        assert!(articles.iter().all(|a| a.author_id == alice));
        assert_eq!(repo.count(&by_author).await.unwrap(), 2);

        let all = ArticleFilter {
            kind: ArticleFilterKind::All,
            skip: 0,
            limit: 2,
        };
        assert_eq!(repo.list(&all).await.unwrap().len(), 2);
        assert_eq!(repo.count(&all).await.unwrap(), 3);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_favorites_are_idempotent_and_counted(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let author = create_author(&mut conn, "author").await;
        let reader = create_author(&mut conn, "reader").await;
        let mut repo = Articles::new(&mut conn);

        let article = repo.create(&article_request(author, "liked", &[])).await.unwrap();

        assert!(!repo.is_favorited(article.id, reader).await.unwrap());
        repo.set_favorite(article.id, reader).await.unwrap();
        repo.set_favorite(article.id, reader).await.unwrap();
        assert!(repo.is_favorited(article.id, reader).await.unwrap());
        assert_eq!(repo.favorites_count(article.id).await.unwrap(), 1);

        let favorited = ArticleFilter {
            kind: ArticleFilterKind::FavoritedBy("reader".to_string()),
            skip: 0,
            limit: 10,
        };
        let articles = repo.list(&favorited).await.unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].id, article.id);

        repo.remove_favorite(article.id, reader).await.unwrap();
        assert!(!repo.is_favorited(article.id, reader).await.unwrap());
        assert_eq!(repo.favorites_count(article.id).await.unwrap(), 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_feed_only_contains_followed_authors(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let alice = create_author(&mut conn, "alice").await;
        let bob = create_author(&mut conn, "bob").await;
        let carol = create_author(&mut conn, "carol").await;

        {
            let mut users = Users::new(&mut conn);
            users.follow(alice, carol).await.unwrap();
        }

        let mut repo = Articles::new(&mut conn);
        repo.create(&article_request(alice, "from-alice", &[])).await.unwrap();
        repo.create(&article_request(bob, "from-bob", &[])).await.unwrap();

        let (articles, count) = repo.feed(carol, 0, 10).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].slug, "from-alice");

        // Unfollowed viewers get an empty feed
        let (articles, count) = repo.feed(bob, 0, 10).await.unwrap();
        assert_eq!(count, 0);
        assert!(articles.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_cascades(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let author = create_author(&mut conn, "author").await;
        let reader = create_author(&mut conn, "reader").await;
        let mut repo = Articles::new(&mut conn);

        let article = repo.create(&article_request(author, "doomed", &["gone"])).await.unwrap();
        repo.set_favorite(article.id, reader).await.unwrap();

        assert!(repo.delete(article.id).await.unwrap());
        assert!(repo.get_by_slug("doomed").await.unwrap().is_none());
        assert_eq!(repo.favorites_count(article.id).await.unwrap(), 0);
        // Deleting again reports nothing deleted
        assert!(!repo.delete(article.id).await.unwrap());
    }
}
