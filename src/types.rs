//! Core types and events for devto-feed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorInfo;

/// Unique identifier for an article
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(pub i64);

impl ArticleId {
    /// Create a new ArticleId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for ArticleId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<ArticleId> for i64 {
    fn from(id: ArticleId) -> Self {
        id.0
    }
}

impl PartialEq<i64> for ArticleId {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for ArticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ArticleId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Which slot of an article an [`Author`] was decoded from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorKind {
    /// The writing user (`user` on the wire)
    Person,
    /// The publishing organization (`organization` on the wire)
    Organization,
}

/// A person or organization credited on an article
///
/// Both wire shapes carry the same fields, so one type serves both slots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Person or organization
    pub kind: AuthorKind,
    /// Display name
    pub name: String,
    /// Username on the origin site, without the leading `@`
    pub handle: String,
    /// Profile image URL
    pub avatar_url: Option<String>,
}

impl Author {
    /// The handle in `@handle` form
    pub fn at_handle(&self) -> String {
        format!("@{}", self.handle)
    }
}

/// A normalized article
///
/// Built once by the decoder and never modified afterwards; the feed only
/// replaces or extends whole lists of these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Stable identifier
    pub id: ArticleId,
    /// Headline
    pub title: String,
    /// Short summary
    pub description: String,
    /// Cover image URL
    pub cover_image_url: Option<String>,
    /// Raw publication timestamp, exactly as the API sent it
    pub published_at: String,
    /// Human-readable date preformatted by the API (e.g. "Apr 29")
    pub display_date: String,
    /// Writing user
    pub author: Author,
    /// Publishing organization, when the article has one
    pub organization: Option<Author>,
    /// Link to the full article on the origin site
    pub canonical_url: String,
    /// Tags in source order, never empty strings
    pub tags: Vec<String>,
    /// Estimated reading time
    pub reading_time_minutes: i64,
    /// Rendered body (detail fetch only)
    pub body_html: Option<String>,
    /// Markdown body (detail fetch only)
    pub body_markdown: Option<String>,
}

impl Article {
    /// Author display name
    pub fn author_name(&self) -> &str {
        &self.author.name
    }

    /// Author handle as `@handle`
    pub fn author_handle(&self) -> String {
        self.author.at_handle()
    }

    /// Organization name, if the article was published by one
    pub fn source_name(&self) -> Option<&str> {
        self.organization.as_ref().map(|org| org.name.as_str())
    }

    /// Cover image URL
    pub fn image_url(&self) -> Option<&str> {
        self.cover_image_url.as_deref()
    }

    /// Display date passthrough
    pub fn formatted_date(&self) -> &str {
        &self.display_date
    }

    /// Effective body: HTML if present, otherwise Markdown
    pub fn content(&self) -> Option<&str> {
        self.body_html
            .as_deref()
            .or(self.body_markdown.as_deref())
    }

    /// Tags rendered as `#tag1 #tag2`, or an empty string without tags
    pub fn tags_string(&self) -> String {
        self.tags
            .iter()
            .map(|tag| format!("#{tag}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Best-effort RFC 3339 parse of [`published_at`](Self::published_at)
    pub fn published_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.published_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Whether this record carries body content (i.e. came from a detail fetch)
    pub fn has_body(&self) -> bool {
        self.body_html.is_some() || self.body_markdown.is_some()
    }
}

/// Events emitted by an [`ArticleFeed`](crate::ArticleFeed)
///
/// Subscribers receive these through [`ArticleFeed::subscribe`](crate::ArticleFeed::subscribe);
/// the current state is always available through a snapshot as well.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FeedEvent {
    /// The loading flag changed
    LoadingChanged {
        /// New value of the flag
        is_loading: bool,
    },

    /// Page 1 replaced the article list
    ItemsReplaced {
        /// Number of articles now loaded
        count: usize,
    },

    /// A later page was appended
    ItemsAppended {
        /// Page that was appended
        page: u32,
        /// Articles added by this page
        added: usize,
        /// Number of articles now loaded
        total: usize,
    },

    /// A short or empty page marked the end of the list
    EndOfData {
        /// Page that came back short
        page: u32,
    },

    /// A page load failed; loaded articles are unchanged
    LoadFailed {
        /// Page that was requested
        page: u32,
        /// What went wrong
        error: ErrorInfo,
    },

    /// A response arrived after a refresh and was dropped
    StaleDiscarded {
        /// Page the stale response belonged to
        page: u32,
    },
}
