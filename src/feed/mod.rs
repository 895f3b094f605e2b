//! Feed retrieval and normalization.
//!
//! - [`parser`] - feed document to [`RawEntry`] using the `feed-rs` crate
//! - [`fetcher`] - single-attempt HTTP retrieval with a timeout and size cap
//! - [`normalizer`] - the fallback table and optional full-text enrichment
//! - [`aggregator`] - bounded fan-out over all feeds with order-preserving results
//!
//! # Example
//!
//! ```no_run
//! use epistle::feed::{Aggregator, ArticleNormalizer, FeedFetcher, FetchSettings};
//! use epistle::storage::FeedConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let fetcher = FeedFetcher::new(FetchSettings::default())?;
//! let aggregator = Aggregator::new(fetcher, ArticleNormalizer::new(4));
//!
//! let feeds = vec![FeedConfig::new("https://blog.rust-lang.org/feed.xml")];
//! let groups = aggregator.collect_grouped(&feeds, &CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod fetcher;
pub mod normalizer;
pub mod parser;

pub use aggregator::{sort_by_published, AggregateError, Aggregator, FeedArticles};
pub use fetcher::{FeedFetcher, FetchError, FetchSettings};
pub use normalizer::{fallback, Article, ArticleNormalizer, EntryError};
pub use parser::RawEntry;
