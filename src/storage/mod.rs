//! Persistent feed configuration.
//!
//! The feed list is a pretty-printed JSON array of [`FeedConfig`] records,
//! rewritten atomically on every change.

mod feed_store;
mod types;

pub use feed_store::FeedStore;
pub use types::{FeedConfig, FeedPatch, StoreError, DEFAULT_NUM_ARTICLES};
