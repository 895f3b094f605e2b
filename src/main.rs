use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use epistle::config::Config;
use epistle::content::JinaEnricher;
use epistle::document::{
    default_output_path, write_epub, ArticleLayout, CoverImage, DocumentAssembler, Metadata,
};
use epistle::feed::{Aggregator, ArticleNormalizer, FeedFetcher};
use epistle::storage::{FeedConfig, FeedPatch, FeedStore, DEFAULT_NUM_ARTICLES};

/// Get the config directory path (~/.config/epistle/)
fn default_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("epistle"))
}

#[derive(Parser, Debug)]
#[command(name = "epistle", version, about = "Bundle your RSS/Atom feeds into an EPUB newspaper")]
struct Args {
    /// Directory holding feeds.json and config.toml (default: ~/.config/epistle)
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a feed
    Add {
        url: String,
        #[arg(long)]
        name: Option<String>,
        /// Number of entries to take from the feed on each run
        #[arg(long, default_value_t = DEFAULT_NUM_ARTICLES)]
        num_articles: usize,
        #[arg(long)]
        category: Option<String>,
    },
    /// Remove every feed with this URL
    Remove { url: String },
    /// Change a feed's settings
    Update {
        url: String,
        #[arg(long, value_name = "URL")]
        new_url: Option<String>,
        #[arg(long, conflicts_with = "clear_name")]
        name: Option<String>,
        /// Remove the feed's name
        #[arg(long)]
        clear_name: bool,
        #[arg(long)]
        num_articles: Option<usize>,
        #[arg(long, conflicts_with = "clear_category")]
        category: Option<String>,
        /// Remove the feed's category
        #[arg(long)]
        clear_category: bool,
    },
    /// List configured feeds
    List,
    /// Fetch all feeds and write the newspaper
    Generate {
        /// Output file (default: <output_dir>/newspaper_YYYY-MM-DD.epub)
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// "full" (enriched articles) or "summary"
        #[arg(long)]
        article_type: Option<ArticleLayout>,
        /// Order articles within each feed newest first
        #[arg(long)]
        sort_by_date: bool,
    },
}

fn prepare_config_dir(config_dir: &Path) -> Result<()> {
    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir).with_context(|| {
            format!("Failed to create config directory '{}'", config_dir.display())
        })?;
        println!("Created config directory: {}", config_dir.display());

        // User-only access, the config may hold an API key
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            if let Err(e) = std::fs::set_permissions(config_dir, perms) {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to set config directory permissions to 0700"
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("epistle=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = match args.config_dir {
        Some(dir) => dir,
        None => default_config_dir()?,
    };
    prepare_config_dir(&config_dir)?;

    let feeds_path = config_dir.join("feeds.json");
    let mut store = FeedStore::open(&feeds_path)
        .with_context(|| format!("Failed to load feeds from '{}'", feeds_path.display()))?;

    match args.command {
        Command::Add {
            url,
            name,
            num_articles,
            category,
        } => {
            let mut feed = FeedConfig::new(url.trim()).with_num_articles(num_articles);
            feed.name = name;
            feed.category = category;
            store.add(feed).context("Failed to add feed")?;
            println!("Added {}", url.trim());
        }
        Command::Remove { url } => {
            let removed = store.remove(&url).context("Failed to remove feed")?;
            if removed == 0 {
                println!("No feed with URL {url}");
            } else {
                println!("Removed {url}");
            }
        }
        Command::Update {
            url,
            new_url,
            name,
            clear_name,
            num_articles,
            category,
            clear_category,
        } => {
            let Some(feed) = store.get(&url).cloned() else {
                bail!("No feed with URL {url}");
            };
            let patch = FeedPatch {
                url: new_url.map(|u| u.trim().to_string()),
                name: if clear_name { Some(None) } else { name.map(Some) },
                num_articles,
                category: if clear_category { Some(None) } else { category.map(Some) },
            };
            store
                .update(&url, patch.apply(feed))
                .context("Failed to update feed")?;
            println!("Updated {url}");
        }
        Command::List => list(&store),
        Command::Generate {
            output,
            article_type,
            sort_by_date,
        } => {
            let config_path = config_dir.join("config.toml");
            let config = Config::load(&config_path)
                .with_context(|| format!("Failed to load '{}'", config_path.display()))?;
            let layout = article_type.unwrap_or(config.article_type);
            let sort_by_date = sort_by_date || config.sort_by_date;
            generate(&store, &config, layout, sort_by_date, output).await?;
        }
    }

    Ok(())
}

fn list(store: &FeedStore) {
    if store.is_empty() {
        println!("No feeds configured. Add one with: epistle add <url>");
        return;
    }
    for feed in store.feeds() {
        let category = feed
            .category
            .as_deref()
            .map(|c| format!(" [{c}]"))
            .unwrap_or_default();
        println!(
            "{:<30} {:>3}  {}{}",
            feed.display_name(),
            feed.num_articles,
            feed.url,
            category
        );
    }
}

async fn generate(
    store: &FeedStore,
    config: &Config,
    layout: ArticleLayout,
    sort_by_date: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    if store.is_empty() {
        tracing::warn!("No feeds configured, nothing to generate");
        println!("No feeds configured. Add one with: epistle add <url>");
        return Ok(());
    }

    let now = Utc::now();
    let fetcher = FeedFetcher::new(config.fetch_settings()).context("Failed to build HTTP client")?;

    let mut aggregator = Aggregator::new(
        fetcher.clone(),
        ArticleNormalizer::new(config.enrich_concurrency),
    )
    .with_feed_concurrency(config.feed_concurrency)
    .with_sort_by_date(sort_by_date);

    if layout == ArticleLayout::Full {
        let enricher = JinaEnricher::new(
            fetcher.client().clone(),
            &config.jina_base_url,
            config.api_key(),
            config.enrich_timeout(),
        )
        .context("Invalid reader configuration")?;
        aggregator = aggregator.with_enricher(Arc::new(enricher));
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling generation");
            on_interrupt.cancel();
        }
    });

    tracing::info!(feeds = store.len(), layout = %layout, "Collecting articles");
    let groups = aggregator.collect_grouped(store.feeds(), &cancel).await?;

    let title = format!("{} {}", now.format("%Y-%m-%d"), config.title);
    let metadata = Metadata::new(title, config.author.as_str(), config.language.as_str(), now);
    let mut assembler = DocumentAssembler::new(metadata, layout);
    if let Some(cover_path) = &config.cover_image {
        assembler = assembler.with_cover(CoverImage::load(cover_path)?);
    }

    let document = assembler
        .assemble(&groups)
        .context("Nothing to publish: every feed was empty or unavailable")?;

    let path = output.unwrap_or_else(|| default_output_path(&config.output_dir, now));
    write_epub(&document, &path)?;

    println!("Wrote {}", path.display());
    Ok(())
}
