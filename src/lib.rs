//! gator: a personal RSS aggregator.
//!
//! Users follow feeds; [`aggregator::Aggregator`] polls them one at a time
//! and stores new posts in SQLite for `gator browse` to show.

pub mod aggregator;
pub mod commands;
pub mod config;
pub mod feed;
pub mod storage;
pub mod util;
