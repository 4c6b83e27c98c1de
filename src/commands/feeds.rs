use anyhow::{bail, Context, Result};
use std::io::Write;

use super::Session;
use crate::storage::{DatabaseError, Feed};
use crate::util::{preview, strip_control_chars, validate_feed_url};

/// Posts shown by `browse` when no limit is given
pub const DEFAULT_BROWSE_LIMIT: i64 = 2;

const DESCRIPTION_PREVIEW_CHARS: usize = 280;

async fn feed_by_url(session: &Session, url: &str) -> Result<Feed> {
    // Stored URLs are in normalized form
    let url = validate_feed_url(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.trim().to_string());
    match session.db.get_feed_by_url(&url).await? {
        Some(feed) => Ok(feed),
        None => bail!("No feed with URL {url}. Add it with `gator addfeed <name> <url>`."),
    }
}

/// Add a feed owned by the current user and follow it.
pub async fn addfeed(session: &Session, name: &str, url: &str, out: &mut impl Write) -> Result<()> {
    let user = session.current_user().await?;

    let name = name.trim();
    if name.is_empty() {
        bail!("Feed name must not be empty");
    }
    let url = validate_feed_url(url).with_context(|| format!("Cannot add feed {url:?}"))?;

    let feed = match session.db.create_feed(name, url.as_str(), user.id).await {
        Ok(feed) => feed,
        Err(DatabaseError::Duplicate(_)) => {
            bail!("Feed {url} already exists. Follow it with `gator follow {url}`.")
        }
        Err(e) => return Err(e.into()),
    };
    let follow = session.db.create_feed_follow(user.id, feed.id).await?;

    tracing::info!(feed_id = feed.id, url = %feed.url, user = %user.name, "Added feed");
    writeln!(out, "Added feed {} ({})", feed.name, feed.url)?;
    writeln!(out, "{} now follows {}", follow.user_name, follow.feed_name)?;
    Ok(())
}

/// List every feed with the user who added it.
pub async fn feeds(session: &Session, out: &mut impl Write) -> Result<()> {
    for feed in session.db.get_feeds().await? {
        writeln!(
            out,
            "* {} {} (added by {})",
            feed.name,
            feed.url,
            feed.user_name.as_deref().unwrap_or("unknown")
        )?;
    }
    Ok(())
}

/// Follow an existing feed as the current user.
pub async fn follow(session: &Session, url: &str, out: &mut impl Write) -> Result<()> {
    let user = session.current_user().await?;
    let feed = feed_by_url(session, url).await?;

    let follow = match session.db.create_feed_follow(user.id, feed.id).await {
        Ok(follow) => follow,
        Err(DatabaseError::Duplicate(_)) => bail!("{} already follows {}", user.name, feed.url),
        Err(e) => return Err(e.into()),
    };

    writeln!(out, "{} now follows {}", follow.user_name, follow.feed_name)?;
    Ok(())
}

/// List the feeds the current user follows.
pub async fn following(session: &Session, out: &mut impl Write) -> Result<()> {
    let user = session.current_user().await?;
    for follow in session.db.get_feed_follows_for_user(user.id).await? {
        writeln!(out, "* {}", follow.feed_name)?;
    }
    Ok(())
}

/// Stop following a feed as the current user.
pub async fn unfollow(session: &Session, url: &str, out: &mut impl Write) -> Result<()> {
    let user = session.current_user().await?;
    let feed = feed_by_url(session, url).await?;

    if !session.db.unfollow_feed(user.id, feed.id).await? {
        bail!("{} does not follow {}", user.name, feed.url);
    }

    writeln!(out, "{} unfollowed {}", user.name, feed.name)?;
    Ok(())
}

/// Show the newest posts from the feeds the current user follows.
pub async fn browse(session: &Session, limit: i64, out: &mut impl Write) -> Result<()> {
    if limit < 1 {
        bail!("Limit must be at least 1");
    }
    let user = session.current_user().await?;
    let posts = session.db.get_posts_for_user(user.id, limit).await?;

    if posts.is_empty() {
        writeln!(out, "No posts yet. Run `gator agg <interval>` to collect some.")?;
        return Ok(());
    }

    for entry in posts {
        let post = &entry.post;
        let date = post
            .published_at
            .map(|t| t.format("%a %b %e %Y").to_string())
            .unwrap_or_else(|| "undated".to_string());
        let title = post.title.as_deref().unwrap_or("(untitled)");

        writeln!(out, "{} from {}", date, strip_control_chars(&entry.feed_name))?;
        writeln!(out, "--- {} ---", strip_control_chars(title))?;
        if let Some(description) = &post.description {
            writeln!(
                out,
                "    {}",
                preview(&strip_control_chars(description), DESCRIPTION_PREVIEW_CHARS)
            )?;
        }
        writeln!(out, "Link: {}", strip_control_chars(&post.url))?;
        writeln!(out, "=====================================")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::register;
    use crate::commands::test_support::{output, session};
    use crate::storage::NewPost;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    async fn logged_in(test_name: &str, user: &str) -> Session {
        let mut session = session(test_name).await;
        register(&mut session, user, &mut Vec::new()).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_addfeed_creates_and_follows() {
        let session = logged_in("addfeed", "kahya").await;
        let mut out = Vec::new();

        addfeed(&session, "Boot.dev", "https://blog.boot.dev/index.xml", &mut out)
            .await
            .unwrap();

        assert_eq!(
            output(out),
            "Added feed Boot.dev (https://blog.boot.dev/index.xml)\nkahya now follows Boot.dev\n"
        );
        let user = session.current_user().await.unwrap();
        let follows = session.db.get_feed_follows_for_user(user.id).await.unwrap();
        assert_eq!(follows.len(), 1);
    }

    #[tokio::test]
    async fn test_addfeed_rejects_bad_url() {
        let session = logged_in("addfeed_bad_url", "kahya").await;
        assert!(addfeed(&session, "Local", "file:///etc/passwd", &mut Vec::new())
            .await
            .is_err());
        assert!(addfeed(&session, "Nope", "not a url", &mut Vec::new())
            .await
            .is_err());
        assert!(session.db.get_feeds().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_addfeed_requires_login() {
        let session = session("addfeed_no_login").await;
        assert!(addfeed(&session, "X", "https://example.com/rss", &mut Vec::new())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_addfeed_duplicate_url_suggests_follow() {
        let session = logged_in("addfeed_dup", "kahya").await;
        addfeed(&session, "A", "https://example.com/rss", &mut Vec::new())
            .await
            .unwrap();

        let err = addfeed(&session, "B", "https://example.com/rss", &mut Vec::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("gator follow"));
    }

    #[tokio::test]
    async fn test_follow_unfollow_following() {
        let mut session = logged_in("follow", "kahya").await;
        addfeed(&session, "Hacker News", "https://news.ycombinator.com/rss", &mut Vec::new())
            .await
            .unwrap();

        register(&mut session, "holgith", &mut Vec::new()).await.unwrap();
        let mut out = Vec::new();
        follow(&session, "https://news.ycombinator.com/rss", &mut out)
            .await
            .unwrap();
        assert_eq!(output(out), "holgith now follows Hacker News\n");

        assert!(follow(&session, "https://news.ycombinator.com/rss", &mut Vec::new())
            .await
            .is_err());

        let mut out = Vec::new();
        following(&session, &mut out).await.unwrap();
        assert_eq!(output(out), "* Hacker News\n");

        unfollow(&session, "https://news.ycombinator.com/rss", &mut Vec::new())
            .await
            .unwrap();
        let mut out = Vec::new();
        following(&session, &mut out).await.unwrap();
        assert_eq!(output(out), "");

        assert!(unfollow(&session, "https://news.ycombinator.com/rss", &mut Vec::new())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_follow_unknown_feed() {
        let session = logged_in("follow_unknown", "kahya").await;
        let err = follow(&session, "https://example.com/missing", &mut Vec::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No feed with URL"));
    }

    #[tokio::test]
    async fn test_feeds_lists_owner() {
        let session = logged_in("feeds", "kahya").await;
        addfeed(&session, "Example", "https://example.com/rss", &mut Vec::new())
            .await
            .unwrap();

        let mut out = Vec::new();
        feeds(&session, &mut out).await.unwrap();
        assert_eq!(
            output(out),
            "* Example https://example.com/rss (added by kahya)\n"
        );
    }

    #[tokio::test]
    async fn test_browse_shows_newest_first() {
        let session = logged_in("browse", "kahya").await;
        addfeed(&session, "Example", "https://example.com/rss", &mut Vec::new())
            .await
            .unwrap();
        let feed = session
            .db
            .get_feed_by_url("https://example.com/rss")
            .await
            .unwrap()
            .unwrap();

        for (slug, day) in [("old", 1), ("new", 20), ("mid", 10)] {
            session
                .db
                .create_post(&NewPost {
                    feed_id: feed.id,
                    url: format!("https://example.com/{slug}"),
                    title: Some(format!("\x1b[31m{slug}\x1b[0m")),
                    description: None,
                    published_at: Some(Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()),
                })
                .await
                .unwrap();
        }

        let mut out = Vec::new();
        browse(&session, DEFAULT_BROWSE_LIMIT, &mut out)
            .await
            .unwrap();
        let text = output(out);

        assert!(text.contains("--- new ---"));
        assert!(text.contains("--- mid ---"));
        assert!(!text.contains("--- old ---"));
        assert!(!text.contains('\x1b'));
        assert!(text.find("new").unwrap() < text.find("mid").unwrap());
    }

    #[tokio::test]
    async fn test_browse_empty_and_bad_limit() {
        let session = logged_in("browse_empty", "kahya").await;

        let mut out = Vec::new();
        browse(&session, 5, &mut out).await.unwrap();
        assert!(output(out).starts_with("No posts yet"));

        assert!(browse(&session, 0, &mut Vec::new()).await.is_err());
    }
}
