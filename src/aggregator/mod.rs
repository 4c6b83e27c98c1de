//! Feed polling and post ingestion.
//!
//! Each tick of [`Aggregator::run_aggregation_loop`] runs one cycle:
//!
//! 1. pick the least-recently-fetched feed ([`Database::next_feed_to_fetch`])
//! 2. stamp it fetched ([`Database::mark_feed_fetched`])
//! 3. fetch and parse it ([`FeedFetcher::fetch`])
//! 4. store each item that is not already stored ([`ingest_items`])
//!
//! A failure at any step ends that cycle only.
//!
//! [`Database::next_feed_to_fetch`]: crate::storage::Database::next_feed_to_fetch
//! [`Database::mark_feed_fetched`]: crate::storage::Database::mark_feed_fetched
//! [`FeedFetcher::fetch`]: crate::feed::FeedFetcher::fetch

mod scheduler;
mod writer;

pub use scheduler::{Aggregator, CycleError, CycleReport, LoopSummary};
pub use writer::{build_post, ingest_items, IngestReport};
