//! SQLite persistence for users, feeds, follows and posts.
//!
//! Every operation is an `async fn` on [`Database`], split across one file
//! per table. The aggregation engine only relies on
//! [`Database::next_feed_to_fetch`], [`Database::mark_feed_fetched`] and
//! [`Database::create_post`]; the rest backs the CLI.

mod feeds;
mod follows;
mod posts;
mod schema;
mod types;
mod users;

pub use schema::Database;
pub use types::{
    DatabaseError, Feed, FeedFollow, FeedWithOwner, NewPost, Post, PostWithFeed, User,
};
