//! Retrieving and parsing remote RSS feeds.
//!
//! - [`FeedFetcher`] - one HTTP GET per call, bounded by a timeout and a
//!   body size limit, no retries
//! - [`parse_feed`] - RSS 2.0 document into [`ParsedFeed`]
//!
//! Nothing here touches the database; storing items is the aggregator's job.

mod fetcher;
mod parser;

pub use fetcher::{FeedFetcher, FetchError, FetchErrorKind, DEFAULT_USER_AGENT, FETCH_TIMEOUT};
pub use parser::{parse_feed, ParseError, ParsedFeed, ParsedFeedItem};
