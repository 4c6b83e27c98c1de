//! Small utilities shared by the aggregator and the CLI.
//!
//! - **Time**: RSS `pubDate` parsing into UTC instants
//! - **Duration**: interval strings like `"1m"` or `"1h30m"`
//! - **Text**: terminal-safe rendering of feed-supplied text
//! - **URLs**: checking feed URLs before they are stored
//!
//! # Examples
//!
//! ```
//! use gator::util::{parse_duration, parse_published_at};
//! use std::time::Duration;
//!
//! assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
//! assert!(parse_published_at("Mon, 02 Jan 2006 15:04:05 -0700").is_some());
//! assert!(parse_published_at("not a date").is_none());
//! ```

mod duration;
mod feed_url;
mod text;
mod time;

pub use duration::{format_duration, parse_duration, DurationError};
pub use feed_url::{validate_feed_url, FeedUrlError};
pub use text::{preview, strip_control_chars};
pub use time::{parse_published_at, RFC1123Z, RFC822Z};
