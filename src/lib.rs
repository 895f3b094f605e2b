//! Epistle bundles a list of syndication feeds into a single EPUB newspaper.
//!
//! The pipeline runs leaves first:
//!
//! 1. [`storage::FeedStore`] holds the configured feeds
//! 2. [`feed::Aggregator`] fetches every feed and normalizes its entries,
//!    optionally enriching each article through a [`content::Enricher`]
//! 3. [`document::DocumentAssembler`] lays the articles out as chapters
//! 4. [`document::write_epub`] packages the result

pub mod config;
pub mod content;
pub mod document;
pub mod feed;
pub mod storage;
pub mod util;
