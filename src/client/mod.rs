//! HTTP access to the article API.
//!
//! [`ArticleSource`] is the seam the feed depends on; [`DevToClient`] is the
//! reqwest-backed implementation talking to `<base>/articles`. Tests and
//! embedders can substitute any other source.

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::decode::{decode_article_bytes, decode_page_bytes};
use crate::error::{Error, Result};
use crate::types::{Article, ArticleId};

/// Header carrying the optional API key
pub const API_KEY_HEADER: &str = "api-key";

/// Trait for fetching articles
///
/// Implementations must be cheap to share across tasks; the feed holds one
/// behind an `Arc` and issues at most one list request at a time, while detail
/// requests may run concurrently with it.
///
/// # Examples
///
/// ```no_run
/// use devto_feed::{ArticleSource, Config, DevToClient};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = DevToClient::new(&Config::default())?;
///
/// let page = client.fetch_page(1, 30).await?;
/// if let Some(first) = page.first() {
///     let full = client.fetch_article(first.id).await?;
///     println!("{}", full.content().unwrap_or_default());
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Fetch one page of article summaries (no body content)
    ///
    /// # Arguments
    ///
    /// * `page` - 1-based page number
    /// * `per_page` - Number of articles requested
    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Vec<Article>>;

    /// Fetch one article including its body content
    async fn fetch_article(&self, id: ArticleId) -> Result<Article>;
}

/// Client for the DEV.to article endpoints
#[derive(Clone, Debug)]
pub struct DevToClient {
    /// HTTP client (connection pool, timeout, user agent)
    http: reqwest::Client,

    /// `<base>/articles`
    articles_url: Url,

    /// Sent as the `api-key` header when present
    api_key: Option<String>,
}

impl DevToClient {
    /// Create a new client from configuration
    ///
    /// # Errors
    /// Returns error if the configuration is invalid, the articles endpoint cannot
    /// be derived from `base_url`, or the HTTP client cannot be created
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to create HTTP client: {}", e),
                key: None,
            })?;

        Ok(Self {
            http,
            articles_url: articles_endpoint(&config.base_url)?,
            api_key: config.api_key().map(str::to_string),
        })
    }

    /// The list endpoint all requests are derived from
    pub fn articles_url(&self) -> &Url {
        &self.articles_url
    }

    /// `GET <base>/articles?page={page}&per_page={per_page}`
    pub fn page_url(&self, page: u32, per_page: u32) -> Url {
        let mut url = self.articles_url.clone();
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.to_string());
        url
    }

    /// `GET <base>/articles/{id}`
    ///
    /// # Errors
    /// Returns [`Error::InvalidRequestTarget`] if the endpoint cannot take path segments
    pub fn article_url(&self, id: ArticleId) -> Result<Url> {
        let mut url = self.articles_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                Error::InvalidRequestTarget(format!(
                    "cannot append article id to '{}'",
                    self.articles_url
                ))
            })?
            .push(&id.to_string());
        Ok(url)
    }

    /// Issue a GET and return the body of a successful response
    async fn get_body(&self, url: Url) -> Result<Vec<u8>> {
        debug!(url = %url, "fetching");

        let mut request = self.http.get(url.clone());
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!(url = %url, error = %e, "request timed out");
            } else {
                warn!(url = %url, error = %e, "request failed");
            }
            Error::Network(e)
        })?;

        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "response received");

        if !status.is_success() {
            return Err(Error::RequestFailed {
                status: Some(status.as_u16()),
                message: format!("HTTP {} from {}", status.as_u16(), url),
            });
        }

        let body = response.bytes().await?;
        debug!(url = %url, bytes = body.len(), "received body");

        Ok(body.to_vec())
    }
}

#[async_trait]
impl ArticleSource for DevToClient {
    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Vec<Article>> {
        let body = self.get_body(self.page_url(page, per_page)).await?;

        decode_page_bytes(&body).inspect_err(|e| {
            warn!(page, per_page, error = %e, "failed to decode article page");
        })
    }

    async fn fetch_article(&self, id: ArticleId) -> Result<Article> {
        let body = self.get_body(self.article_url(id)?).await?;

        decode_article_bytes(&body).inspect_err(|e| {
            warn!(id = %id, error = %e, "failed to decode article");
        })
    }
}

/// Derive `<base>/articles` from the configured API root
fn articles_endpoint(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| Error::InvalidRequestTarget(format!("'{}': {}", base_url, e)))?;

    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|_| Error::InvalidRequestTarget(format!("'{}' cannot be a base", base_url)))?
        .pop_if_empty()
        .push("articles");

    Ok(url)
}
