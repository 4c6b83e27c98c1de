//! The polling loop: one feed per tick, forever, until shut down.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::MissedTickBehavior;

use super::writer::{ingest_items, IngestReport};
use crate::feed::{FeedFetcher, FetchError};
use crate::storage::{Database, DatabaseError, Feed};
use crate::util::format_duration;

/// Why a single ingestion cycle did not complete.
#[derive(Debug, Error)]
pub enum CycleError {
    /// There are no feeds at all. Not a failure, just nothing to do.
    #[error("no feeds to fetch")]
    NoFeeds,

    /// Selecting or marking the feed failed
    #[error(transparent)]
    Store(#[from] DatabaseError),

    /// The feed could not be retrieved or parsed
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Outcome of one completed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// The feed as selected, before it was marked fetched
    pub feed: Feed,
    /// Items found in the fetched document
    pub items: usize,
    pub ingest: IngestReport,
}

/// What a finished aggregation loop did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Cycles that ran to completion, successful or not
    pub cycles: u64,
    /// Cycles that ended in a store or fetch error
    pub failures: u64,
}

/// Drives fetching and ingestion for every feed in the store.
///
/// Feeds are served strictly one at a time, least recently fetched first,
/// so over enough ticks every feed gets its turn regardless of who follows it.
#[derive(Clone)]
pub struct Aggregator {
    db: Database,
    fetcher: FeedFetcher,
}

impl Aggregator {
    pub fn new(db: Database, fetcher: FeedFetcher) -> Self {
        Self { db, fetcher }
    }

    /// Fetch the single least-recently-fetched feed and store its new posts.
    ///
    /// The feed is marked fetched *before* the network request, so a feed
    /// that keeps failing still moves to the back of the queue.
    ///
    /// # Errors
    ///
    /// - [`CycleError::NoFeeds`] if the store holds no feeds
    /// - [`CycleError::Store`] if selecting or marking the feed fails
    /// - [`CycleError::Fetch`] if the feed cannot be fetched or parsed
    ///
    /// Per-item storage failures do not fail the cycle; they are counted in
    /// the returned [`IngestReport`].
    pub async fn run_one_cycle(&self) -> Result<CycleReport, CycleError> {
        let feed = self
            .db
            .next_feed_to_fetch()
            .await?
            .ok_or(CycleError::NoFeeds)?;

        self.db.mark_feed_fetched(feed.id).await?;
        tracing::debug!(feed_id = feed.id, url = %feed.url, "Fetching feed");

        let parsed = self.fetcher.fetch(&feed.url).await?;
        let ingest = ingest_items(&self.db, feed.id, &parsed.items).await;

        tracing::info!(
            feed = %feed.name,
            items = parsed.items.len(),
            inserted = ingest.inserted,
            duplicates = ingest.duplicates,
            failed = ingest.failed,
            handled = ingest.total(),
            "Feed collected"
        );

        Ok(CycleReport {
            items: parsed.items.len(),
            feed,
            ingest,
        })
    }

    /// Run one cycle per `interval` until `shutdown` completes.
    ///
    /// The first tick fires immediately. Cycles never overlap: a slow cycle
    /// delays the following ticks rather than bunching them up. A failed
    /// cycle is logged and the loop carries on. When `shutdown` completes
    /// the loop returns at once, abandoning any cycle still in flight.
    pub async fn run_aggregation_loop<F>(&self, interval: Duration, shutdown: F) -> LoopSummary
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        // tokio::time::interval panics on a zero period
        let period = interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut summary = LoopSummary::default();
        tracing::info!(interval = %format_duration(period), "Collecting feeds");

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, abandoning in-flight cycle");
                    break;
                }
                result = self.run_one_cycle() => {
                    summary.cycles += 1;
                    match result {
                        Ok(_) => {}
                        Err(CycleError::NoFeeds) => {
                            tracing::info!("No feeds to fetch, waiting for the next tick");
                        }
                        Err(e) => {
                            summary.failures += 1;
                            tracing::warn!(error = %e, "Aggregation cycle failed");
                        }
                    }
                }
            }
        }

        tracing::info!(
            cycles = summary.cycles,
            failures = summary.failures,
            "Aggregation loop stopped"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{FetchErrorKind, DEFAULT_USER_AGENT};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS: &str = r#"<rss version="2.0"><channel><title>T</title>
        <item><title>A</title><link>https://example.com/a</link></item>
        <item><title>B</title><link>https://example.com/b</link></item>
    </channel></rss>"#;

    async fn setup() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("kahya").await.unwrap();
        (db, user.id)
    }

    fn fetcher(timeout: Duration) -> FeedFetcher {
        FeedFetcher::new(DEFAULT_USER_AGENT, timeout).unwrap()
    }

    #[tokio::test]
    async fn test_cycle_without_feeds() {
        let (db, _) = setup().await;
        let aggregator = Aggregator::new(db, fetcher(Duration::from_secs(5)));

        assert!(matches!(
            aggregator.run_one_cycle().await,
            Err(CycleError::NoFeeds)
        ));
    }

    #[tokio::test]
    async fn test_cycle_ingests_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&server)
            .await;

        let (db, user_id) = setup().await;
        let feed = db
            .create_feed("T", &format!("{}/rss", server.uri()), user_id)
            .await
            .unwrap();
        let aggregator = Aggregator::new(db.clone(), fetcher(Duration::from_secs(5)));

        let report = aggregator.run_one_cycle().await.unwrap();
        assert_eq!(report.feed.id, feed.id);
        assert_eq!(report.items, 2);
        assert_eq!(report.ingest.inserted, 2);
        assert_eq!(report.ingest.total(), report.items);

        let stored = db.get_feed_by_url(&feed.url).await.unwrap().unwrap();
        assert!(stored.last_fetched_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_fetch_still_marks_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (db, user_id) = setup().await;
        let url = format!("{}/down", server.uri());
        db.create_feed("Down", &url, user_id).await.unwrap();
        let aggregator = Aggregator::new(db.clone(), fetcher(Duration::from_secs(5)));

        match aggregator.run_one_cycle().await {
            Err(CycleError::Fetch(e)) => {
                assert_eq!(e.url, url);
                assert!(matches!(e.kind, FetchErrorKind::HttpStatus(503)));
            }
            other => panic!("Expected fetch error, got {:?}", other),
        }

        let stored = db.get_feed_by_url(&url).await.unwrap().unwrap();
        assert!(stored.last_fetched_at.is_some());
    }

    #[tokio::test]
    async fn test_cycle_picks_least_recently_fetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&server)
            .await;

        let (db, user_id) = setup().await;
        let older = db
            .create_feed("Older", &format!("{}/older", server.uri()), user_id)
            .await
            .unwrap();
        let newer = db
            .create_feed("Newer", &format!("{}/newer", server.uri()), user_id)
            .await
            .unwrap();
        db.mark_feed_fetched_at(older.id, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            .await
            .unwrap();
        db.mark_feed_fetched_at(newer.id, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
            .await
            .unwrap();

        let aggregator = Aggregator::new(db, fetcher(Duration::from_secs(5)));
        assert_eq!(aggregator.run_one_cycle().await.unwrap().feed.id, older.id);
        assert_eq!(aggregator.run_one_cycle().await.unwrap().feed.id, newer.id);
    }

    #[tokio::test]
    async fn test_loop_survives_repeated_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (db, user_id) = setup().await;
        db.create_feed("Broken", &format!("{}/broken", server.uri()), user_id)
            .await
            .unwrap();
        let aggregator = Aggregator::new(db, fetcher(Duration::from_secs(5)));

        let summary = aggregator
            .run_aggregation_loop(
                Duration::from_millis(20),
                tokio::time::sleep(Duration::from_millis(300)),
            )
            .await;

        assert!(summary.cycles >= 3, "only {} cycles ran", summary.cycles);
        assert_eq!(summary.failures, summary.cycles);
    }

    #[tokio::test]
    async fn test_no_feeds_is_not_a_failure() {
        let (db, _) = setup().await;
        let aggregator = Aggregator::new(db, fetcher(Duration::from_secs(5)));

        let summary = aggregator
            .run_aggregation_loop(
                Duration::from_millis(20),
                tokio::time::sleep(Duration::from_millis(100)),
            )
            .await;

        assert!(summary.cycles >= 1);
        assert_eq!(summary.failures, 0);
    }

    #[tokio::test]
    async fn test_shutdown_abandons_in_flight_cycle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(RSS)
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let (db, user_id) = setup().await;
        db.create_feed("Slow", &format!("{}/slow", server.uri()), user_id)
            .await
            .unwrap();
        let aggregator = Aggregator::new(db.clone(), fetcher(Duration::from_secs(10)));

        let started = std::time::Instant::now();
        let summary = aggregator
            .run_aggregation_loop(
                Duration::from_secs(60),
                tokio::time::sleep(Duration::from_millis(200)),
            )
            .await;

        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(summary, LoopSummary::default());
        assert!(db.get_posts_for_feed(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_already_completed_shutdown_runs_nothing() {
        let (db, _) = setup().await;
        let aggregator = Aggregator::new(db, fetcher(Duration::from_secs(5)));

        let summary = aggregator
            .run_aggregation_loop(Duration::from_secs(1), std::future::ready(()))
            .await;
        assert_eq!(summary, LoopSummary::default());
    }
}
