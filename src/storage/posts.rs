use chrono::Utc;

use super::schema::Database;
use super::types::{DatabaseError, NewPost, Post, PostRow, PostWithFeed, PostWithFeedRow};

/// Hard cap on `browse` results
const MAX_POSTS: i64 = 2000;

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a post.
    ///
    /// A post whose `(feed_id, url)` already exists yields
    /// [`DatabaseError::Duplicate`]; the stored row is left untouched.
    pub async fn create_post(&self, post: &NewPost) -> Result<Post, DatabaseError> {
        let now = Utc::now().timestamp_millis();
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (feed_id, url, title, description, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, feed_id, url, title, description, published_at, created_at, updated_at
        "#,
        )
        .bind(post.feed_id)
        .bind(&post.url)
        .bind(&post.title)
        .bind(&post.description)
        .bind(post.published_at.map(|t| t.timestamp_millis()))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_insert(e, format!("post {}", post.url)))?;

        Ok(row.into_post())
    }

    /// Every post stored for a feed, in insertion order
    pub async fn get_posts_for_feed(&self, feed_id: i64) -> Result<Vec<Post>, DatabaseError> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, feed_id, url, title, description, published_at, created_at, updated_at
            FROM posts
            WHERE feed_id = ?
            ORDER BY id
        "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PostRow::into_post).collect())
    }

    /// Newest posts from the feeds `user_id` follows.
    ///
    /// Dated posts come first, newest published first; undated posts follow,
    /// newest ingested first. `limit` is capped at 2000.
    pub async fn get_posts_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<PostWithFeed>, DatabaseError> {
        let limit = limit.clamp(0, MAX_POSTS);
        let rows = sqlx::query_as::<_, PostWithFeedRow>(
            r#"
            SELECT p.id, p.feed_id, p.url, p.title, p.description, p.published_at,
                   p.created_at, p.updated_at, f.name AS feed_name
            FROM posts p
            JOIN feeds f ON f.id = p.feed_id
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            WHERE ff.user_id = ?
            ORDER BY p.published_at IS NULL, p.published_at DESC, p.created_at DESC, p.id DESC
            LIMIT ?
        "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PostWithFeed {
                post: row.post.into_post(),
                feed_name: row.feed_name,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, Feed, NewPost};
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    async fn setup() -> (Database, Feed) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("kahya").await.unwrap();
        let feed = db
            .create_feed("Blog", "https://example.com/feed.xml", user.id)
            .await
            .unwrap();
        (db, feed)
    }

    fn new_post(feed_id: i64, url: &str) -> NewPost {
        NewPost {
            feed_id,
            url: url.to_string(),
            title: Some("Title".to_string()),
            description: None,
            published_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_post_round_trips_optional_fields() {
        let (db, feed) = setup().await;
        let published = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();

        let post = db
            .create_post(&NewPost {
                published_at: Some(published),
                ..new_post(feed.id, "https://example.com/a")
            })
            .await
            .unwrap();

        assert_eq!(post.title.as_deref(), Some("Title"));
        assert_eq!(post.description, None);
        assert_eq!(post.published_at, Some(published));
        assert_eq!(db.get_posts_for_feed(feed.id).await.unwrap(), vec![post]);
    }

    #[tokio::test]
    async fn test_duplicate_url_same_feed_rejected() {
        let (db, feed) = setup().await;
        db.create_post(&new_post(feed.id, "https://example.com/a"))
            .await
            .unwrap();

        let err = db
            .create_post(&new_post(feed.id, "https://example.com/a"))
            .await
            .unwrap_err();
        assert!(err.is_duplicate(), "expected Duplicate, got {:?}", err);
        assert_eq!(db.get_posts_for_feed(feed.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_url_in_different_feeds_allowed() {
        let (db, feed) = setup().await;
        let other = db
            .create_feed("Mirror", "https://mirror.example.com/feed.xml", feed.user_id)
            .await
            .unwrap();

        db.create_post(&new_post(feed.id, "https://example.com/a"))
            .await
            .unwrap();
        db.create_post(&new_post(other.id, "https://example.com/a"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_url_is_not_a_duplicate() {
        let (db, feed) = setup().await;
        let err = db.create_post(&new_post(feed.id, "")).await.unwrap_err();
        assert!(!err.is_duplicate());
    }

    #[tokio::test]
    async fn test_posts_for_user_only_followed_feeds_newest_first() {
        let (db, feed) = setup().await;
        let user = db.get_user_by_name("kahya").await.unwrap().unwrap();
        let unfollowed = db
            .create_feed("Other", "https://other.example.com/feed.xml", user.id)
            .await
            .unwrap();
        db.create_feed_follow(user.id, feed.id).await.unwrap();

        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for (url, offset) in [("old", Some(0)), ("undated", None), ("new", Some(2))] {
            db.create_post(&NewPost {
                published_at: offset.map(|d| base + Duration::days(d)),
                ..new_post(feed.id, &format!("https://example.com/{url}"))
            })
            .await
            .unwrap();
        }
        db.create_post(&new_post(unfollowed.id, "https://other.example.com/x"))
            .await
            .unwrap();

        let urls: Vec<_> = db
            .get_posts_for_user(user.id, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.post.url)
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/new",
                "https://example.com/old",
                "https://example.com/undated",
            ]
        );

        let limited = db.get_posts_for_user(user.id, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].feed_name, "Blog");
    }
}
