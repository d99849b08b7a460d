//! Incremental article loading.
//!
//! [`ArticleFeed`] owns the accumulated article list and the pagination cursor.
//! Presentation code calls [`refresh`](ArticleFeed::refresh) on pull-to-refresh
//! and [`load_more`](ArticleFeed::load_more) when the user scrolls near the end,
//! then reads a [`FeedSnapshot`] or listens for [`FeedEvent`]s.
//!
//! State transitions:
//! - At most one page load is in flight. A load requested while another is
//!   running is rejected, not queued.
//! - A short or empty page marks the end of the list; `load_more` is then a no-op
//!   until the next refresh.
//! - A failed load leaves the loaded articles and the end-of-data flag alone and
//!   records the error, so the same page can be retried.
//! - Every refresh starts a new generation. A response issued under an older
//!   generation is discarded when it lands.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::client::{ArticleSource, DevToClient};
use crate::config::Config;
use crate::error::{ErrorInfo, Result};
use crate::types::{Article, ArticleId, FeedEvent};

/// Capacity of the event channel; slow subscribers lag rather than block loads
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Why a load request was turned away without fetching anything
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Another page load is in flight
    InFlight,
    /// The last page has already been loaded
    EndOfData,
}

/// Result of a [`refresh`](ArticleFeed::refresh) or [`load_more`](ArticleFeed::load_more) call
#[derive(Clone, Debug, PartialEq)]
pub enum LoadOutcome {
    /// A page was fetched and applied
    Loaded {
        /// Page that was loaded
        page: u32,
        /// Articles returned by the API
        received: usize,
        /// Articles added to the list (duplicates of loaded ids are skipped)
        added: usize,
        /// Whether this page marked the end of the list
        end_of_data: bool,
    },
    /// Nothing was fetched
    Skipped(SkipReason),
    /// The response arrived after a refresh and was dropped
    Stale {
        /// Page the response belonged to
        page: u32,
    },
    /// The fetch failed; the error is also kept in the feed's `last_error`
    Failed {
        /// Page that was requested
        page: u32,
        /// What went wrong
        error: ErrorInfo,
    },
}

/// Point-in-time copy of the feed state
#[derive(Clone, Debug, PartialEq)]
pub struct FeedSnapshot {
    /// Loaded articles in page order, then API order within a page
    pub items: Vec<Article>,
    /// Page of the latest load; rewound to the last page applied if that load
    /// fails or is cancelled, and never below 1
    pub current_page: u32,
    /// Articles requested per page
    pub page_size: u32,
    /// No further pages exist
    pub end_of_data: bool,
    /// A page load is in flight
    pub is_loading: bool,
    /// Error from the most recent failed load, cleared when the next load starts
    pub last_error: Option<ErrorInfo>,
    /// Rows before the end of the list that trigger a prefetch
    pub prefetch_distance: usize,
}

impl FeedSnapshot {
    /// Number of loaded articles
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is loaded
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether showing the row at `visible_index` should trigger `load_more`
    ///
    /// True once the row is within `prefetch_distance` of the end of the list,
    /// provided no load is running and more pages exist.
    pub fn should_load_more(&self, visible_index: usize) -> bool {
        if self.is_loading || self.end_of_data || self.items.is_empty() {
            return false;
        }
        visible_index.saturating_add(self.prefetch_distance) >= self.items.len()
    }
}

/// Mutable pagination state, only ever touched under the feed's lock
#[derive(Debug)]
struct FeedState {
    items: Vec<Article>,
    loaded_ids: HashSet<ArticleId>,
    current_page: u32,
    /// Highest page applied since the last refresh, 0 if none
    loaded_page: u32,
    end_of_data: bool,
    is_loading: bool,
    last_error: Option<ErrorInfo>,
    generation: u64,
}

impl FeedState {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            loaded_ids: HashSet::new(),
            current_page: 1,
            loaded_page: 0,
            end_of_data: false,
            is_loading: false,
            last_error: None,
            generation: 0,
        }
    }

    /// Admission control for a fetch-and-append cycle
    fn admit(&mut self) -> std::result::Result<Ticket, SkipReason> {
        if self.is_loading {
            return Err(SkipReason::InFlight);
        }
        if self.end_of_data {
            return Err(SkipReason::EndOfData);
        }

        self.is_loading = true;
        self.last_error = None;
        Ok(Ticket {
            generation: self.generation,
            page: self.current_page,
        })
    }

    /// Point the cursor back at the last applied page after a load that
    /// never landed, unless a refresh has already reset it
    fn rewind(&mut self, ticket: Ticket) {
        if self.generation == ticket.generation {
            self.current_page = self.loaded_page.max(1);
        }
    }

    fn replace(&mut self, articles: Vec<Article>) -> usize {
        self.items.clear();
        self.loaded_ids.clear();
        self.append(articles)
    }

    fn append(&mut self, articles: Vec<Article>) -> usize {
        let before = self.items.len();
        for article in articles {
            if self.loaded_ids.insert(article.id) {
                self.items.push(article);
            } else {
                debug!(id = %article.id, "skipping article already loaded");
            }
        }
        self.items.len() - before
    }
}

/// The page and generation a fetch was issued for
#[derive(Clone, Copy, Debug)]
struct Ticket {
    generation: u64,
    page: u32,
}

/// Clears the loading flag however the fetch cycle ends, including when the
/// caller drops the future mid-request; an unsettled ticket also rewinds the cursor
struct LoadingGuard<'a> {
    feed: &'a ArticleFeed,
    ticket: Ticket,
    settled: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.feed.lock_state();
            state.is_loading = false;
            if !self.settled {
                debug!(page = self.ticket.page, "page load cancelled");
                state.rewind(self.ticket);
            }
        }
        self.feed.emit(FeedEvent::LoadingChanged { is_loading: false });
    }
}

/// Paginated, incrementally loaded list of articles (cloneable - all fields are Arc-wrapped)
///
/// # Example
///
/// ```no_run
/// use devto_feed::{ArticleFeed, Config};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let feed = ArticleFeed::from_config(&Config::default())?;
///
/// feed.refresh().await;
/// while !feed.snapshot().end_of_data {
///     feed.load_more().await;
///     if feed.snapshot().last_error.is_some() {
///         break;
///     }
/// }
///
/// for article in feed.snapshot().items {
///     println!("{} by {}", article.title, article.author_handle());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ArticleFeed {
    /// Where pages and details come from
    source: Arc<dyn ArticleSource>,
    /// Articles requested per page
    page_size: u32,
    /// Prefetch threshold handed to snapshots
    prefetch_distance: usize,
    /// Pagination state (never held across an await)
    state: Arc<Mutex<FeedState>>,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: broadcast::Sender<FeedEvent>,
}

impl std::fmt::Debug for ArticleFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArticleFeed")
            .field("page_size", &self.page_size)
            .field("prefetch_distance", &self.prefetch_distance)
            .field("state", &*self.lock_state())
            .finish_non_exhaustive()
    }
}

impl ArticleFeed {
    /// Create a feed over any article source
    ///
    /// Nothing is fetched until [`refresh`](Self::refresh) is called.
    pub fn new(source: Arc<dyn ArticleSource>, config: &Config) -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            source,
            page_size: config.page_size,
            prefetch_distance: config.prefetch_distance,
            state: Arc::new(Mutex::new(FeedState::new())),
            event_tx,
        }
    }

    /// Create a feed backed by a [`DevToClient`]
    ///
    /// # Errors
    /// Returns error if the client cannot be built from `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = DevToClient::new(config)?;
        Ok(Self::new(Arc::new(client), config))
    }

    /// Subscribe to feed events
    ///
    /// Each subscriber receives every event sent after it subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.event_tx.subscribe()
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> FeedSnapshot {
        let state = self.lock_state();
        FeedSnapshot {
            items: state.items.clone(),
            current_page: state.current_page,
            page_size: self.page_size,
            end_of_data: state.end_of_data,
            is_loading: state.is_loading,
            last_error: state.last_error.clone(),
            prefetch_distance: self.prefetch_distance,
        }
    }

    /// Whether a page load is in flight
    pub fn is_loading(&self) -> bool {
        self.lock_state().is_loading
    }

    /// Articles requested per page
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Start over from page 1
    ///
    /// Clears the loaded articles, resets the cursor and end-of-data flag, and
    /// starts a new generation so any response still in flight is discarded.
    /// Page 1 is then fetched and replaces the (now empty) list. If a load is
    /// still in flight the reset still happens but the fetch is rejected; the
    /// stale response is dropped when it lands and the caller can refresh again.
    pub async fn refresh(&self) -> LoadOutcome {
        let admitted = {
            let mut state = self.lock_state();
            state.generation += 1;
            state.current_page = 1;
            state.loaded_page = 0;
            state.end_of_data = false;
            state.items.clear();
            state.loaded_ids.clear();
            state.admit()
        };

        info!(page_size = self.page_size, "refreshing article feed");
        self.emit(FeedEvent::ItemsReplaced { count: 0 });

        match admitted {
            Ok(ticket) => self.run_cycle(ticket).await,
            Err(reason) => {
                debug!(?reason, "refresh fetch rejected");
                LoadOutcome::Skipped(reason)
            }
        }
    }

    /// Fetch and append the next page
    ///
    /// Returns immediately without touching any state if the end of the list has
    /// been reached or a load is already in flight.
    pub async fn load_more(&self) -> LoadOutcome {
        let admitted = {
            let mut state = self.lock_state();
            if state.end_of_data {
                Err(SkipReason::EndOfData)
            } else if state.is_loading {
                Err(SkipReason::InFlight)
            } else {
                state.current_page = state.loaded_page + 1;
                state.admit()
            }
        };

        match admitted {
            Ok(ticket) => self.run_cycle(ticket).await,
            Err(reason) => {
                debug!(?reason, "load_more skipped");
                LoadOutcome::Skipped(reason)
            }
        }
    }

    /// Fetch one article with its body content
    ///
    /// Independent of the pagination state: it may run alongside a page load and
    /// a failure here is only reported to the caller.
    ///
    /// # Errors
    /// Returns the source's error unchanged
    pub async fn article_detail(&self, id: ArticleId) -> Result<Article> {
        debug!(id = %id, "fetching article detail");
        self.source.fetch_article(id).await.inspect_err(|e| {
            warn!(id = %id, error = %e, "article detail fetch failed");
        })
    }

    /// The fetch-and-append cycle for an admitted ticket
    async fn run_cycle(&self, ticket: Ticket) -> LoadOutcome {
        let mut guard = LoadingGuard {
            feed: self,
            ticket,
            settled: false,
        };
        self.emit(FeedEvent::LoadingChanged { is_loading: true });

        debug!(
            page = ticket.page,
            per_page = self.page_size,
            generation = ticket.generation,
            "fetching article page"
        );
        let fetched = self.source.fetch_page(ticket.page, self.page_size).await;

        let mut state = self.lock_state();

        guard.settled = true;

        if state.generation != ticket.generation {
            drop(state);
            warn!(page = ticket.page, "discarding response issued before refresh");
            self.emit(FeedEvent::StaleDiscarded { page: ticket.page });
            return LoadOutcome::Stale { page: ticket.page };
        }

        match fetched {
            Ok(articles) => {
                let received = articles.len();
                state.loaded_page = ticket.page;
                let added = if ticket.page == 1 {
                    state.replace(articles)
                } else {
                    state.append(articles)
                };

                // Short or empty page: nothing further to request
                let end_of_data = received < self.page_size as usize;
                if end_of_data {
                    state.end_of_data = true;
                }
                let total = state.items.len();
                drop(state);

                info!(page = ticket.page, received, added, total, "loaded article page");

                if ticket.page == 1 {
                    self.emit(FeedEvent::ItemsReplaced { count: total });
                } else {
                    self.emit(FeedEvent::ItemsAppended {
                        page: ticket.page,
                        added,
                        total,
                    });
                }
                if end_of_data {
                    info!(page = ticket.page, total, "reached end of article feed");
                    self.emit(FeedEvent::EndOfData { page: ticket.page });
                }

                LoadOutcome::Loaded {
                    page: ticket.page,
                    received,
                    added,
                    end_of_data,
                }
            }
            Err(e) => {
                let error = ErrorInfo::from(&e);
                state.last_error = Some(error.clone());
                // The next load_more asks for this page again
                state.rewind(ticket);
                drop(state);

                warn!(page = ticket.page, error = %e, "failed to load article page");
                self.emit(FeedEvent::LoadFailed {
                    page: ticket.page,
                    error: error.clone(),
                });

                LoadOutcome::Failed {
                    page: ticket.page,
                    error,
                }
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: FeedEvent) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
