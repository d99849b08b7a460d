//! # devto-feed
//!
//! Client library for the public DEV.to article API.
//!
//! ## Design Philosophy
//!
//! devto-feed is designed to be:
//! - **Tolerant** - Inconsistent API payloads (tags as array or comma-separated string,
//!   optional nested objects) decode into one normalized [`Article`] model
//! - **Strict where it matters** - Missing required fields fail with the field named,
//!   never a silent default
//! - **Library-first** - No UI; presentation code consumes snapshots and events
//! - **Substitutable** - The feed talks to an [`ArticleSource`], so tests and embedders
//!   can swap the HTTP client out
//!
//! ## Quick Start
//!
//! ```no_run
//! use devto_feed::{ArticleFeed, Config, FeedEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let feed = ArticleFeed::from_config(&Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = feed.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if let FeedEvent::LoadFailed { error, .. } = event {
//!                 eprintln!("load failed: {error}");
//!             }
//!         }
//!     });
//!
//!     feed.refresh().await;
//!     feed.load_more().await;
//!
//!     for article in feed.snapshot().items {
//!         println!("{} {} {}", article.title, article.author_handle(), article.tags_string());
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// HTTP access to the article API
pub mod client;
/// Configuration types
pub mod config;
/// Tolerant record decoding
pub mod decode;
/// Error types
pub mod error;
/// Paginated article feed
pub mod feed;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use client::{ArticleSource, DevToClient};
pub use config::Config;
pub use decode::{decode_article, decode_page, decode_tags, split_tag_string};
pub use error::{DecodeError, Error, ErrorInfo, Result};
pub use feed::{ArticleFeed, FeedSnapshot, LoadOutcome, SkipReason};
pub use types::{Article, ArticleId, Author, AuthorKind, FeedEvent};
