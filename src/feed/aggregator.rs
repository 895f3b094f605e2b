use futures::stream::{self, StreamExt};
use std::cmp::Reverse;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::fetcher::FeedFetcher;
use super::normalizer::{Article, ArticleNormalizer};
use crate::content::Enricher;
use crate::storage::FeedConfig;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("Collection cancelled")]
    Cancelled,
}

/// The articles of one feed, in feed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedArticles {
    pub feed: FeedConfig,
    pub articles: Vec<Article>,
}

/// Fans out over configured feeds and gathers their articles.
pub struct Aggregator {
    fetcher: FeedFetcher,
    normalizer: ArticleNormalizer,
    enricher: Option<Arc<dyn Enricher>>,
    feed_concurrency: usize,
    sort_by_date: bool,
}

impl Aggregator {
    pub fn new(fetcher: FeedFetcher, normalizer: ArticleNormalizer) -> Self {
        Self {
            fetcher,
            normalizer,
            enricher: None,
            feed_concurrency: 8,
            sort_by_date: false,
        }
    }

    /// Enrich every article with a link through `enricher`.
    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_feed_concurrency(mut self, feed_concurrency: usize) -> Self {
        self.feed_concurrency = feed_concurrency.max(1);
        self
    }

    pub fn with_sort_by_date(mut self, sort_by_date: bool) -> Self {
        self.sort_by_date = sort_by_date;
        self
    }

    /// Collect every feed's articles, one [`FeedArticles`] per input feed in
    /// input order, whatever order the feeds answer in. Unavailable feeds
    /// yield an empty group. When sorting by date, each group is ordered
    /// newest first; the groups themselves keep input order.
    ///
    /// # Errors
    ///
    /// [`AggregateError::Cancelled`] if `cancel` fires first; partial results
    /// are dropped.
    pub async fn collect_grouped(
        &self,
        feeds: &[FeedConfig],
        cancel: &CancellationToken,
    ) -> Result<Vec<FeedArticles>, AggregateError> {
        let work = stream::iter(feeds)
            .map(|feed| self.collect_feed(feed))
            .buffered(self.feed_concurrency)
            .collect::<Vec<_>>();

        let mut groups = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Collection cancelled");
                return Err(AggregateError::Cancelled);
            }
            groups = work => groups,
        };

        if self.sort_by_date {
            for group in &mut groups {
                sort_by_published(&mut group.articles);
            }
        }

        let total: usize = groups.iter().map(|g| g.articles.len()).sum();
        tracing::info!(feeds = groups.len(), articles = total, "Collected articles");
        Ok(groups)
    }

    /// Collect every feed's articles as one flat list: feed order, then entry
    /// order, or newest first across all feeds when sorting by date.
    pub async fn collect(
        &self,
        feeds: &[FeedConfig],
        cancel: &CancellationToken,
    ) -> Result<Vec<Article>, AggregateError> {
        let mut articles: Vec<Article> = self
            .collect_grouped(feeds, cancel)
            .await?
            .into_iter()
            .flat_map(|group| group.articles)
            .collect();

        if self.sort_by_date {
            sort_by_published(&mut articles);
        }
        Ok(articles)
    }

    async fn collect_feed(&self, feed: &FeedConfig) -> FeedArticles {
        let entries = self.fetcher.fetch_entries(feed).await;
        let articles = self
            .normalizer
            .normalize_all(feed, &entries, self.enricher.as_deref())
            .await;

        tracing::debug!(feed = %feed.url, articles = articles.len(), "Feed collected");
        FeedArticles {
            feed: feed.clone(),
            articles,
        }
    }
}

/// Newest first; undated articles go last. Stable, so ties keep their order.
pub fn sort_by_published(articles: &mut [Article]) {
    articles.sort_by_key(|a| (a.published_at.is_none(), Reverse(a.published_at)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FetchSettings;
    use chrono::{DateTime, TimeZone, Utc};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn article(title: &str, published_at: Option<DateTime<Utc>>) -> Article {
        Article {
            title: title.to_string(),
            link: String::new(),
            summary: None,
            author: "a".to_string(),
            published: "p".to_string(),
            published_at,
            text: None,
        }
    }

    fn day(d: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap())
    }

    fn rss(titles: &[&str]) -> String {
        let items: String = titles
            .iter()
            .map(|t| format!("<item><title>{t}</title><link>https://example.com/{t}</link></item>"))
            .collect();
        format!(r#"<?xml version="1.0"?><rss version="2.0"><channel>{items}</channel></rss>"#)
    }

    async fn mount(server: &MockServer, route: &str, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(template)
            .mount(server)
            .await;
    }

    fn aggregator() -> Aggregator {
        let fetcher = FeedFetcher::new(FetchSettings::default()).unwrap();
        Aggregator::new(fetcher, ArticleNormalizer::default()).with_feed_concurrency(4)
    }

    #[test]
    fn test_sort_newest_first_undated_last() {
        let mut articles = vec![
            article("undated-1", None),
            article("old", day(1)),
            article("new", day(9)),
            article("undated-2", None),
            article("mid", day(5)),
        ];

        sort_by_published(&mut articles);

        let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "mid", "old", "undated-1", "undated-2"]);
    }

    #[test]
    fn test_sort_ties_keep_order() {
        let mut articles = vec![
            article("a", day(3)),
            article("b", day(3)),
            article("c", day(3)),
        ];

        sort_by_published(&mut articles);

        let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_groups_follow_input_order_not_completion_order() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/slow",
            ResponseTemplate::new(200)
                .set_body_string(rss(&["slow-1"]))
                .set_delay(Duration::from_millis(300)),
        )
        .await;
        mount(&server, "/fast", ResponseTemplate::new(200).set_body_string(rss(&["fast-1"]))).await;

        let feeds = vec![
            FeedConfig::new(format!("{}/slow", server.uri())),
            FeedConfig::new(format!("{}/fast", server.uri())),
        ];

        let groups = aggregator()
            .collect_grouped(&feeds, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].feed, feeds[0]);
        assert_eq!(groups[0].articles[0].title, "slow-1");
        assert_eq!(groups[1].articles[0].title, "fast-1");
    }

    #[tokio::test]
    async fn test_unavailable_feed_yields_empty_group() {
        let server = MockServer::start().await;
        mount(&server, "/good", ResponseTemplate::new(200).set_body_string(rss(&["a", "b", "c"])))
            .await;
        mount(&server, "/bad", ResponseTemplate::new(200).set_body_string("<<garbage")).await;

        let feeds = vec![
            FeedConfig::new(format!("{}/good", server.uri())),
            FeedConfig::new(format!("{}/bad", server.uri())),
        ];

        let groups = aggregator()
            .collect_grouped(&feeds, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(groups[0].articles.len(), 3);
        assert!(groups[1].articles.is_empty());
    }

    #[tokio::test]
    async fn test_collect_flattens_and_truncates() {
        let server = MockServer::start().await;
        mount(&server, "/one", ResponseTemplate::new(200).set_body_string(rss(&["a", "b", "c"])))
            .await;
        mount(&server, "/two", ResponseTemplate::new(200).set_body_string(rss(&["d"]))).await;

        let feeds = vec![
            FeedConfig::new(format!("{}/one", server.uri())).with_num_articles(2),
            FeedConfig::new(format!("{}/two", server.uri())),
        ];

        let articles = aggregator()
            .collect(&feeds, &CancellationToken::new())
            .await
            .unwrap();

        let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "d"]);
    }

    fn dated_rss(items: &[(&str, Option<&str>)]) -> String {
        let items: String = items
            .iter()
            .map(|(title, date)| {
                let date = date
                    .map(|d| format!("<pubDate>{d}</pubDate>"))
                    .unwrap_or_default();
                format!("<item><title>{title}</title><link>https://example.com/{title}</link>{date}</item>")
            })
            .collect();
        format!(r#"<?xml version="1.0"?><rss version="2.0"><channel>{items}</channel></rss>"#)
    }

    async fn interleaved_feeds(server: &MockServer) -> Vec<FeedConfig> {
        let first = dated_rss(&[
            ("one-jan-02", Some("02 Jan 2024 09:00:00 +0000")),
            ("one-undated", None),
            ("one-jan-06", Some("06 Jan 2024 09:00:00 +0000")),
        ]);
        let second = dated_rss(&[
            ("two-jan-04", Some("04 Jan 2024 09:00:00 +0000")),
            ("two-jan-08", Some("08 Jan 2024 09:00:00 +0000")),
        ]);
        mount(server, "/one", ResponseTemplate::new(200).set_body_string(first)).await;
        mount(server, "/two", ResponseTemplate::new(200).set_body_string(second)).await;

        vec![
            FeedConfig::new(format!("{}/one", server.uri())),
            FeedConfig::new(format!("{}/two", server.uri())),
        ]
    }

    #[tokio::test]
    async fn test_collect_sorted_by_date_across_feeds() {
        let server = MockServer::start().await;
        let feeds = interleaved_feeds(&server).await;

        let articles = aggregator()
            .with_sort_by_date(true)
            .collect(&feeds, &CancellationToken::new())
            .await
            .unwrap();

        let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["two-jan-08", "one-jan-06", "two-jan-04", "one-jan-02", "one-undated"]
        );
    }

    #[tokio::test]
    async fn test_collect_grouped_sorts_within_each_feed() {
        let server = MockServer::start().await;
        let feeds = interleaved_feeds(&server).await;

        let groups = aggregator()
            .with_sort_by_date(true)
            .collect_grouped(&feeds, &CancellationToken::new())
            .await
            .unwrap();

        let titles: Vec<Vec<_>> = groups
            .iter()
            .map(|g| g.articles.iter().map(|a| a.title.as_str()).collect())
            .collect();
        assert_eq!(
            titles,
            vec![
                vec!["one-jan-06", "one-jan-02", "one-undated"],
                vec!["two-jan-08", "two-jan-04"],
            ]
        );
    }

    #[tokio::test]
    async fn test_unsorted_collect_keeps_feed_order() {
        let server = MockServer::start().await;
        let feeds = interleaved_feeds(&server).await;

        let articles = aggregator()
            .collect(&feeds, &CancellationToken::new())
            .await
            .unwrap();

        let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["one-jan-02", "one-undated", "one-jan-06", "two-jan-04", "two-jan-08"]
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let feeds = vec![FeedConfig::new("https://example.invalid/feed")];
        let result = aggregator().collect_grouped(&feeds, &cancel).await;

        assert_eq!(result, Err(AggregateError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancelled_mid_flight() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/slow",
            ResponseTemplate::new(200)
                .set_body_string(rss(&["x"]))
                .set_delay(Duration::from_secs(5)),
        )
        .await;

        let feeds = vec![FeedConfig::new(format!("{}/slow", server.uri()))];
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result = aggregator().collect(&feeds, &cancel).await;

        assert_eq!(result, Err(AggregateError::Cancelled));
    }

    #[tokio::test]
    async fn test_empty_feed_list() {
        let groups = aggregator()
            .collect_grouped(&[], &CancellationToken::new())
            .await
            .unwrap();
        assert!(groups.is_empty());
    }
}
