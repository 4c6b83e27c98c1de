//! Turning parsed feed items into stored posts.

use crate::feed::ParsedFeedItem;
use crate::storage::{Database, DatabaseError, NewPost};
use crate::util::parse_published_at;

/// Per-feed tally of what happened to each item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub inserted: usize,
    pub duplicates: usize,
    pub failed: usize,
}

impl IngestReport {
    /// Items looked at, whatever became of them.
    pub fn total(&self) -> usize {
        self.inserted + self.duplicates + self.failed
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Normalize one parsed item into an insert for `feed_id`.
///
/// Link, title and description are trimmed; an empty title or description
/// becomes `None`. The publish date is parsed leniently and is `None` when it
/// is missing or in an unsupported format.
pub fn build_post(feed_id: i64, item: &ParsedFeedItem) -> NewPost {
    NewPost {
        feed_id,
        url: item.link.trim().to_string(),
        title: non_empty(&item.title),
        description: non_empty(&item.description),
        published_at: parse_published_at(&item.pub_date),
    }
}

/// Store every item of one fetched feed, skipping posts that already exist.
///
/// Items are written independently: a duplicate is counted and logged at
/// debug level, any other storage failure is logged with the item link and
/// the remaining items are still attempted. Re-ingesting the same items is
/// therefore harmless.
pub async fn ingest_items(db: &Database, feed_id: i64, items: &[ParsedFeedItem]) -> IngestReport {
    let mut report = IngestReport::default();

    for item in items {
        let post = build_post(feed_id, item);
        match db.create_post(&post).await {
            Ok(_) => report.inserted += 1,
            Err(DatabaseError::Duplicate(_)) => {
                tracing::debug!(feed_id, link = %post.url, "Post already stored, skipping");
                report.duplicates += 1;
            }
            Err(e) => {
                tracing::warn!(feed_id, link = %post.url, error = %e, "Failed to store post");
                report.failed += 1;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    async fn setup() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("kahya").await.unwrap();
        let feed = db
            .create_feed("Example", "https://example.com/rss", user.id)
            .await
            .unwrap();
        (db, feed.id)
    }

    fn item(link: &str, title: &str, pub_date: &str) -> ParsedFeedItem {
        ParsedFeedItem {
            title: title.to_string(),
            link: link.to_string(),
            description: String::new(),
            pub_date: pub_date.to_string(),
        }
    }

    #[test]
    fn test_build_post_normalizes_fields() {
        let parsed = ParsedFeedItem {
            title: "  Hello  ".to_string(),
            link: " https://example.com/a\n".to_string(),
            description: "   ".to_string(),
            pub_date: "Mon, 02 Jan 2006 15:04:05 -0700".to_string(),
        };

        let post = build_post(7, &parsed);
        assert_eq!(
            post,
            NewPost {
                feed_id: 7,
                url: "https://example.com/a".to_string(),
                title: Some("Hello".to_string()),
                description: None,
                published_at: Some(Utc.with_ymd_and_hms(2006, 1, 2, 22, 4, 5).unwrap()),
            }
        );
    }

    #[test]
    fn test_build_post_unparseable_date_is_none() {
        let post = build_post(1, &item("https://example.com/a", "", "yesterday-ish"));
        assert_eq!(post.title, None);
        assert_eq!(post.published_at, None);
    }

    #[tokio::test]
    async fn test_ingest_inserts_all_new_items() {
        let (db, feed_id) = setup().await;
        let items = vec![
            item("https://example.com/1", "One", ""),
            item("https://example.com/2", "Two", ""),
            item("https://example.com/3", "Three", ""),
        ];

        let report = ingest_items(&db, feed_id, &items).await;
        assert_eq!(
            report,
            IngestReport {
                inserted: 3,
                duplicates: 0,
                failed: 0
            }
        );
        assert_eq!(db.get_posts_for_feed(feed_id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_reingest_is_idempotent() {
        let (db, feed_id) = setup().await;
        let items = vec![
            item("https://example.com/1", "One", ""),
            item("https://example.com/2", "Two", ""),
        ];

        ingest_items(&db, feed_id, &items).await;
        let report = ingest_items(&db, feed_id, &items).await;

        assert_eq!(report.inserted, 0);
        assert_eq!(report.duplicates, 2);
        assert_eq!(db.get_posts_for_feed(feed_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_within_one_batch() {
        let (db, feed_id) = setup().await;
        let items = vec![
            item("https://example.com/1", "First copy", ""),
            item(" https://example.com/1 ", "Second copy", ""),
        ];

        let report = ingest_items(&db, feed_id, &items).await;
        assert_eq!(report.inserted, 1);
        assert_eq!(report.duplicates, 1);

        let posts = db.get_posts_for_feed(feed_id).await.unwrap();
        assert_eq!(posts[0].title.as_deref(), Some("First copy"));
    }

    #[tokio::test]
    async fn test_failed_item_does_not_stop_batch() {
        let (db, feed_id) = setup().await;
        let items = vec![
            item("https://example.com/1", "One", ""),
            item("   ", "No link", ""),
            item("https://example.com/3", "Three", ""),
        ];

        let report = ingest_items(&db, feed_id, &items).await;
        assert_eq!(
            report,
            IngestReport {
                inserted: 2,
                duplicates: 0,
                failed: 1
            }
        );
        assert_eq!(report.total(), 3);
    }

    #[tokio::test]
    async fn test_ingest_for_missing_feed_fails_every_item() {
        let (db, _) = setup().await;
        let items = vec![item("https://example.com/1", "One", "")];

        let report = ingest_items(&db, 9999, &items).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.inserted, 0);
    }
}
