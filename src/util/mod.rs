//! Utility functions shared across the pipeline.
//!
//! - **URL validation**: feed URLs (shape only) and article links handed to
//!   the enrichment service (SSRF rules)
//! - **Text processing**: control-character stripping and HTML-to-text
//!   reduction so feed content is safe to embed in XHTML
//! - **Atomic writes**: write-to-temp-then-rename for the feed list and the
//!   generated EPUB
//!
//! # Examples
//!
//! ```
//! use epistle::util::{clean_inline, validate_feed_url};
//!
//! let url = validate_feed_url("https://example.com/feed.xml").unwrap();
//! assert_eq!(url.host_str(), Some("example.com"));
//!
//! assert_eq!(clean_inline("Tom &amp; Jerry"), "Tom & Jerry");
//! ```

mod atomic;
mod text;
mod url_validator;

pub use atomic::{write_atomic, write_bytes_atomic};
pub use text::{clean_inline, strip_control_chars, strip_html};
pub use url_validator::{validate_feed_url, validate_url, UrlValidationError};
