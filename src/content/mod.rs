//! Full-text enrichment of article links.

mod jina;

pub use jina::{ContentError, Enricher, JinaEnricher, DEFAULT_BASE_URL, DEFAULT_ENRICH_TIMEOUT};
