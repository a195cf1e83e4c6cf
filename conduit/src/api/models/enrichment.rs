//! View composition: turning database records into viewer-specific responses.
//!
//! An article on the wire carries its author's profile, whether the viewer
//! favorited it, its favorite count and a sorted tag list; a profile carries
//! whether the viewer follows it. This module centralizes that assembly so
//! the single-article, list, feed and comment endpoints all agree.
//!
//! Composition is deliberately naive: one author lookup, one favorite check
//! and one count query per article. Fine at current volumes; this is the
//! known hotspot if list endpoints ever get slow.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::{
    api::models::{articles::ArticleView, comments::CommentView, profiles::ProfileView},
    db::{
        handlers::{Articles, Repository, Users},
        models::{articles::ArticleDBResponse, comments::CommentDBResponse, users::UserDBResponse},
    },
    errors::{Error, Result},
    types::UserId,
};

/// Wire timestamp format: UTC, millisecond precision, literal `Z`
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Composes responses for one viewer (or for an anonymous request).
pub struct ViewComposer<'c> {
    db: &'c mut PgConnection,
    viewer: Option<UserId>,
}

impl<'c> ViewComposer<'c> {
    pub fn new(db: &'c mut PgConnection, viewer: Option<UserId>) -> Self {
        Self { db, viewer }
    }

    pub async fn profile(&mut self, user: &UserDBResponse) -> Result<ProfileView> {
        let following = match self.viewer {
            Some(viewer) => Users::new(&mut *self.db)
                .is_following(user.id, viewer)
                .await
                .map_err(Error::Database)?,
            None => false,
        };

        Ok(ProfileView {
            username: user.username.clone(),
            bio: user.bio.clone(),
            image: user.image.clone(),
            following,
        })
    }

    pub async fn article(&mut self, article: ArticleDBResponse) -> Result<ArticleView> {
        let author = Users::new(&mut *self.db)
            .get_by_id(article.author_id)
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound {
                resource: "profile".to_string(),
                id: article.author_id.to_string(),
            })?;
        let author = self.profile(&author).await?;

        let mut articles = Articles::new(&mut *self.db);
        let favorited = match self.viewer {
            Some(viewer) => articles.is_favorited(article.id, viewer).await.map_err(Error::Database)?,
            None => false,
        };
        let favorites_count = articles.favorites_count(article.id).await.map_err(Error::Database)?;

        let mut tag_list = article.tags;
        tag_list.sort();

        Ok(ArticleView {
            slug: article.slug,
            title: article.title,
            description: article.description,
            body: article.body,
            tag_list,
            created_at: format_timestamp(&article.created_at),
            updated_at: format_timestamp(&article.updated_at),
            favorited,
            favorites_count,
            author,
        })
    }

    pub async fn articles(&mut self, articles: Vec<ArticleDBResponse>) -> Result<Vec<ArticleView>> {
        let mut views = Vec::with_capacity(articles.len());
        for article in articles {
            views.push(self.article(article).await?);
        }
        Ok(views)
    }

    pub async fn comment(&mut self, comment: CommentDBResponse) -> Result<CommentView> {
        let author = Users::new(&mut *self.db)
            .get_by_id(comment.author_id)
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound {
                resource: "profile".to_string(),
                id: comment.author_id.to_string(),
            })?;
        let author = self.profile(&author).await?;

        Ok(CommentView {
            id: comment.id,
            body: comment.body,
            created_at: format_timestamp(&comment.created_at),
            updated_at: format_timestamp(&comment.updated_at),
            author,
        })
    }

    pub async fn comments(&mut self, comments: Vec<CommentDBResponse>) -> Result<Vec<CommentView>> {
        let mut views = Vec::with_capacity(comments.len());
        for comment in comments {
            views.push(self.comment(comment).await?);
        }
        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::users::Users;
    use crate::db::models::articles::ArticleCreateDBRequest;
    use crate::db::models::users::UserCreateDBRequest;
    use chrono::TimeZone;
    use sqlx::PgPool;

    #[test]
    fn timestamps_use_millisecond_utc_format() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 7, 9, 30, 5).unwrap() + chrono::Duration::milliseconds(42);
        assert_eq!(format_timestamp(&dt), "2024-03-07T09:30:05.042Z");

        let whole_second = Utc.with_ymd_and_hms(2024, 3, 7, 9, 30, 5).unwrap();
        assert_eq!(format_timestamp(&whole_second), "2024-03-07T09:30:05.000Z");
    }

    async fn seed_user(conn: &mut PgConnection, username: &str) -> UserDBResponse {
        let mut users = Users::new(conn);
        users
            .create(&UserCreateDBRequest {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                bio: format!("{username} writes here"),
                image: None,
                password_hash: "$argon2id$fake".to_string(),
            })
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn profile_following_depends_on_viewer(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let author = seed_user(&mut conn, "author").await;
        let fan = seed_user(&mut conn, "fan").await;
        let stranger = seed_user(&mut conn, "stranger").await;

        {
            let mut users = Users::new(&mut conn);
            users.follow(author.id, fan.id).await.unwrap();
        }

        let mut composer = ViewComposer::new(&mut conn, Some(fan.id));
        let profile = composer.profile(&author).await.unwrap();
        assert!(profile.following);
        assert_eq!(profile.username, "author");
        assert_eq!(profile.bio, "author writes here");

        let mut composer = ViewComposer::new(&mut conn, Some(stranger.id));
        assert!(!composer.profile(&author).await.unwrap().following);

        let mut composer = ViewComposer::new(&mut conn, None);
        assert!(!composer.profile(&author).await.unwrap().following);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn article_view_sorts_tags_and_resolves_favorites(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let author = seed_user(&mut conn, "author").await;
        let reader = seed_user(&mut conn, "reader").await;

        let article = {
            let mut articles = Articles::new(&mut conn);
            let article = articles
                .create(&ArticleCreateDBRequest {
                    slug: "tag-soup".to_string(),
                    title: "tag soup".to_string(),
                    description: "d".to_string(),
                    body: "b".to_string(),
                    author_id: author.id,
                    tag_names: vec!["zebra".to_string(), "apple".to_string(), "mango".to_string()],
                })
                .await
                .unwrap();
            articles.set_favorite(article.id, reader.id).await.unwrap();
            article
        };

        let mut composer = ViewComposer::new(&mut conn, Some(reader.id));
        let view = composer.article(article.clone()).await.unwrap();

        assert_eq!(view.tag_list, vec!["apple", "mango", "zebra"]);
        assert!(view.favorited);
        assert_eq!(view.favorites_count, 1);
        assert_eq!(view.author.username, "author");

        // Anonymous viewers see the count but never a favorite
        let mut composer = ViewComposer::new(&mut conn, None);
        let view = composer.article(article).await.unwrap();
        assert!(!view.favorited);
        assert_eq!(view.favorites_count, 1);
    }
}
