//! Browse the DEV.to front page from the terminal
//!
//! This demo shows the core flow of devto-feed:
//! - Building a feed from configuration
//! - Loading the first page and one more
//! - Fetching one article with its body
//!
//! ```bash
//! RUST_LOG=devto_feed=debug cargo run --example browse
//! ```

use devto_feed::{ArticleFeed, Config, LoadOutcome};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config {
        api_key: std::env::var("DEVTO_API_KEY").ok(),
        page_size: 10,
        ..Default::default()
    };
    let feed = ArticleFeed::from_config(&config)?;

    for outcome in [feed.refresh().await, feed.load_more().await] {
        if let LoadOutcome::Failed { page, error } = outcome {
            eprintln!("page {page} failed: {error}");
        }
    }

    let snapshot = feed.snapshot();
    for (index, article) in snapshot.items.iter().enumerate() {
        println!(
            "{:>3}. {} ({}, {} min) {}",
            index + 1,
            article.title,
            article.author_handle(),
            article.reading_time_minutes,
            article.tags_string()
        );
    }

    if let Some(first) = snapshot.items.first() {
        let detail = feed.article_detail(first.id).await?;
        let body = detail.content().unwrap_or("(no body)");
        println!("\n{}\n{}", detail.title, body.chars().take(400).collect::<String>());
    }

    Ok(())
}
