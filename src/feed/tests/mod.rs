use super::*;
use crate::error::Error;
use crate::types::{Author, AuthorKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::ops::Range;
use tokio::sync::{Notify, Semaphore};

const PAGE_SIZE: u32 = 30;

fn article(id: i64) -> Article {
    Article {
        id: ArticleId(id),
        title: format!("Article {id}"),
        description: "Summary".to_string(),
        cover_image_url: None,
        published_at: "2025-04-29T12:00:00Z".to_string(),
        display_date: "Apr 29".to_string(),
        author: Author {
            kind: AuthorKind::Person,
            name: "Ada".to_string(),
            handle: "ada".to_string(),
            avatar_url: None,
        },
        organization: None,
        canonical_url: format!("https://dev.to/ada/{id}"),
        tags: vec!["rust".to_string()],
        reading_time_minutes: 3,
        body_html: None,
        body_markdown: None,
    }
}

fn articles(ids: Range<i64>) -> Vec<Article> {
    ids.map(article).collect()
}

enum Scripted {
    Page(Vec<Article>),
    Fail(&'static str),
}

/// In-memory source with per-page responses, request recording, and an
/// optional gate that holds the next page fetch until released
#[derive(Default)]
struct ScriptedSource {
    pages: Mutex<HashMap<u32, Scripted>>,
    details: Mutex<HashMap<ArticleId, Article>>,
    requests: Mutex<Vec<(u32, u32)>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    started: Notify,
}

impl ScriptedSource {
    fn set_page(&self, page: u32, response: Scripted) {
        self.pages.lock().unwrap().insert(page, response);
    }

    fn set_detail(&self, article: Article) {
        self.details.lock().unwrap().insert(article.id, article);
    }

    /// Hold the next page fetch; it proceeds once a permit is added
    fn hold_next(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn requests(&self) -> Vec<(u32, u32)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArticleSource for ScriptedSource {
    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Vec<Article>> {
        self.requests.lock().unwrap().push((page, per_page));

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            // Only held fetches signal, so earlier loads leave no stored permit behind
            self.started.notify_one();
            let _permit = gate.acquire().await.unwrap();
        }

        match self.pages.lock().unwrap().get(&page) {
            Some(Scripted::Page(articles)) => Ok(articles.clone()),
            Some(Scripted::Fail(message)) => Err(Error::RequestFailed {
                status: None,
                message: message.to_string(),
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_article(&self, id: ArticleId) -> Result<Article> {
        self.details
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(Error::RequestFailed {
                status: Some(404),
                message: format!("article {id} not found"),
            })
    }
}

fn feed_over(source: &Arc<ScriptedSource>) -> ArticleFeed {
    let config = Config {
        page_size: PAGE_SIZE,
        ..Default::default()
    };
    ArticleFeed::new(source.clone(), &config)
}

fn ids(snapshot: &FeedSnapshot) -> Vec<i64> {
    snapshot.items.iter().map(|a| a.id.get()).collect()
}

#[test]
fn initial_state() {
    let source = Arc::new(ScriptedSource::default());
    let snapshot = feed_over(&source).snapshot();

    assert!(snapshot.is_empty());
    assert_eq!(snapshot.current_page, 1);
    assert_eq!(snapshot.page_size, PAGE_SIZE);
    assert!(!snapshot.end_of_data);
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.last_error, None);
    assert!(source.requests().is_empty(), "nothing is fetched on creation");
}

#[tokio::test]
async fn full_page_then_short_page() {
    let source = Arc::new(ScriptedSource::default());
    source.set_page(1, Scripted::Page(articles(0..30)));
    source.set_page(2, Scripted::Page(articles(30..40)));
    let feed = feed_over(&source);

    let outcome = feed.refresh().await;
    assert_eq!(
        outcome,
        LoadOutcome::Loaded {
            page: 1,
            received: 30,
            added: 30,
            end_of_data: false
        }
    );
    let snapshot = feed.snapshot();
    assert_eq!(snapshot.len(), 30);
    assert_eq!(snapshot.current_page, 1);
    assert!(!snapshot.end_of_data);

    let outcome = feed.load_more().await;
    assert_eq!(
        outcome,
        LoadOutcome::Loaded {
            page: 2,
            received: 10,
            added: 10,
            end_of_data: true
        }
    );
    let snapshot = feed.snapshot();
    assert_eq!(snapshot.len(), 40);
    assert_eq!(snapshot.current_page, 2);
    assert!(snapshot.end_of_data);
    assert_eq!(ids(&snapshot), (0..40).collect::<Vec<_>>());

    assert_eq!(source.requests(), vec![(1, PAGE_SIZE), (2, PAGE_SIZE)]);
}

#[tokio::test]
async fn load_more_after_end_of_data_is_a_no_op() {
    let source = Arc::new(ScriptedSource::default());
    source.set_page(1, Scripted::Page(articles(0..12)));
    let feed = feed_over(&source);

    feed.refresh().await;
    let before = feed.snapshot();
    assert!(before.end_of_data);

    assert_eq!(
        feed.load_more().await,
        LoadOutcome::Skipped(SkipReason::EndOfData)
    );

    assert_eq!(feed.snapshot(), before);
    assert_eq!(source.requests().len(), 1);
}

#[tokio::test]
async fn empty_page_marks_end_of_data() {
    let source = Arc::new(ScriptedSource::default());
    source.set_page(1, Scripted::Page(articles(0..30)));
    let feed = feed_over(&source);

    feed.refresh().await;
    let outcome = feed.load_more().await;

    assert_eq!(
        outcome,
        LoadOutcome::Loaded {
            page: 2,
            received: 0,
            added: 0,
            end_of_data: true
        }
    );
    assert_eq!(feed.snapshot().len(), 30);
    assert!(feed.snapshot().end_of_data);
}

#[tokio::test]
async fn refresh_is_idempotent() {
    let source = Arc::new(ScriptedSource::default());
    source.set_page(1, Scripted::Page(articles(0..30)));
    let feed = feed_over(&source);

    feed.refresh().await;
    let once = feed.snapshot();
    feed.refresh().await;
    let twice = feed.snapshot();

    assert_eq!(once.items, twice.items);
    assert_eq!(twice.current_page, 1);
}

#[tokio::test]
async fn refresh_after_several_pages_starts_over() {
    let source = Arc::new(ScriptedSource::default());
    source.set_page(1, Scripted::Page(articles(0..30)));
    source.set_page(2, Scripted::Page(articles(30..60)));
    source.set_page(3, Scripted::Page(articles(60..90)));
    let feed = feed_over(&source);

    feed.refresh().await;
    feed.load_more().await;
    feed.load_more().await;
    assert_eq!(feed.snapshot().len(), 90);
    assert_eq!(feed.snapshot().current_page, 3);

    // The first page changed upstream
    source.set_page(1, Scripted::Page(articles(100..130)));
    feed.refresh().await;

    let snapshot = feed.snapshot();
    assert_eq!(snapshot.len(), 30);
    assert_eq!(snapshot.current_page, 1);
    assert!(!snapshot.end_of_data);
    assert_eq!(ids(&snapshot), (100..130).collect::<Vec<_>>());
}

#[tokio::test]
async fn refresh_with_short_first_page_ends_immediately() {
    let source = Arc::new(ScriptedSource::default());
    source.set_page(1, Scripted::Page(articles(0..30)));
    source.set_page(2, Scripted::Page(articles(30..45)));
    let feed = feed_over(&source);

    feed.refresh().await;
    feed.load_more().await;
    assert!(feed.snapshot().end_of_data);

    source.set_page(1, Scripted::Page(articles(0..5)));
    feed.refresh().await;

    let snapshot = feed.snapshot();
    assert_eq!(snapshot.len(), 5);
    assert!(snapshot.end_of_data);
}

#[tokio::test]
async fn failed_load_keeps_items_and_allows_retry() {
    let source = Arc::new(ScriptedSource::default());
    source.set_page(1, Scripted::Page(articles(0..30)));
    source.set_page(2, Scripted::Fail("connection reset"));
    let feed = feed_over(&source);

    feed.refresh().await;
    let before = feed.snapshot();

    match feed.load_more().await {
        LoadOutcome::Failed { page, error } => {
            assert_eq!(page, 2);
            assert_eq!(error.code, "request_failed");
            assert!(error.message.contains("connection reset"));
        }
        other => panic!("expected failure, got {other:?}"),
    }

    let after = feed.snapshot();
    assert_eq!(after.items, before.items);
    assert_eq!(after.current_page, 1, "cursor rewinds to the last applied page");
    assert!(!after.end_of_data);
    assert!(!after.is_loading);
    assert!(after.last_error.is_some());

    // Retry asks for the same page again
    source.set_page(2, Scripted::Page(articles(30..60)));
    let outcome = feed.load_more().await;
    assert!(matches!(outcome, LoadOutcome::Loaded { page: 2, .. }));

    let snapshot = feed.snapshot();
    assert_eq!(snapshot.len(), 60);
    assert_eq!(snapshot.last_error, None, "a new load clears the error");
    assert_eq!(
        source.requests(),
        vec![(1, PAGE_SIZE), (2, PAGE_SIZE), (2, PAGE_SIZE)]
    );
}

#[tokio::test]
async fn failed_refresh_leaves_end_of_data_alone() {
    let source = Arc::new(ScriptedSource::default());
    source.set_page(1, Scripted::Fail("timed out"));
    let feed = feed_over(&source);

    let outcome = feed.refresh().await;
    assert!(matches!(outcome, LoadOutcome::Failed { page: 1, .. }));

    let snapshot = feed.snapshot();
    assert!(snapshot.is_empty());
    assert!(!snapshot.end_of_data);
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.last_error.unwrap().code, "request_failed");
    assert_eq!(snapshot.current_page, 1);

    // load_more retries page 1, which replaces the list
    source.set_page(1, Scripted::Page(articles(0..30)));
    let outcome = feed.load_more().await;
    assert!(matches!(outcome, LoadOutcome::Loaded { page: 1, .. }));
    assert_eq!(feed.snapshot().current_page, 1);
}

#[tokio::test]
async fn load_more_while_loading_is_rejected() {
    let source = Arc::new(ScriptedSource::default());
    source.set_page(1, Scripted::Page(articles(0..30)));
    let feed = feed_over(&source);

    let gate = source.hold_next();
    let task = tokio::spawn({
        let feed = feed.clone();
        async move { feed.refresh().await }
    });
    source.started.notified().await;

    let during = feed.snapshot();
    assert!(during.is_loading);

    assert_eq!(
        feed.load_more().await,
        LoadOutcome::Skipped(SkipReason::InFlight)
    );
    assert_eq!(feed.snapshot(), during, "rejected call must not change state");
    assert_eq!(source.requests().len(), 1, "no additional fetch");

    gate.add_permits(1);
    let outcome = task.await.unwrap();
    assert!(matches!(outcome, LoadOutcome::Loaded { page: 1, .. }));
    assert!(!feed.is_loading());
    assert_eq!(feed.snapshot().len(), 30);
}

#[tokio::test]
async fn stale_response_after_refresh_is_discarded() {
    let source = Arc::new(ScriptedSource::default());
    source.set_page(1, Scripted::Page(articles(0..30)));
    source.set_page(2, Scripted::Page(articles(30..60)));
    let feed = feed_over(&source);
    feed.refresh().await;

    let gate = source.hold_next();
    let slow_page = tokio::spawn({
        let feed = feed.clone();
        async move { feed.load_more().await }
    });
    source.started.notified().await;

    // The reset happens, but the fetch is rejected while page 2 is in flight
    assert_eq!(
        feed.refresh().await,
        LoadOutcome::Skipped(SkipReason::InFlight)
    );
    assert!(feed.snapshot().is_empty());
    assert_eq!(feed.snapshot().current_page, 1);

    gate.add_permits(1);
    assert_eq!(slow_page.await.unwrap(), LoadOutcome::Stale { page: 2 });

    let snapshot = feed.snapshot();
    assert!(snapshot.is_empty(), "stale page must not be appended");
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.current_page, 1);

    feed.refresh().await;
    assert_eq!(ids(&feed.snapshot()), (0..30).collect::<Vec<_>>());
}

#[tokio::test]
async fn dropped_load_releases_loading_flag() {
    let source = Arc::new(ScriptedSource::default());
    source.set_page(1, Scripted::Page(articles(0..30)));
    let feed = feed_over(&source);

    let _gate = source.hold_next();
    let task = tokio::spawn({
        let feed = feed.clone();
        async move { feed.refresh().await }
    });
    source.started.notified().await;
    assert!(feed.is_loading());

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    assert!(!feed.is_loading());

    assert!(matches!(
        feed.refresh().await,
        LoadOutcome::Loaded { page: 1, .. }
    ));
}

#[tokio::test]
async fn dropped_load_more_does_not_skip_a_page() {
    let source = Arc::new(ScriptedSource::default());
    source.set_page(1, Scripted::Page(articles(0..30)));
    source.set_page(2, Scripted::Page(articles(30..60)));
    source.set_page(3, Scripted::Page(articles(60..90)));
    let feed = feed_over(&source);
    feed.refresh().await;

    let _gate = source.hold_next();
    let task = tokio::spawn({
        let feed = feed.clone();
        async move { feed.load_more().await }
    });
    source.started.notified().await;
    assert_eq!(feed.snapshot().current_page, 2);

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    let snapshot = feed.snapshot();
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.current_page, 1);
    assert_eq!(snapshot.len(), 30);

    let outcome = feed.load_more().await;
    assert!(
        matches!(outcome, LoadOutcome::Loaded { page: 2, .. }),
        "got {outcome:?}"
    );
    assert_eq!(ids(&feed.snapshot()), (0..60).collect::<Vec<_>>());
    assert_eq!(
        source.requests(),
        vec![(1, PAGE_SIZE), (2, PAGE_SIZE), (2, PAGE_SIZE)]
    );
}

#[tokio::test]
async fn dropped_load_after_refresh_leaves_the_reset_cursor() {
    let source = Arc::new(ScriptedSource::default());
    source.set_page(1, Scripted::Page(articles(0..30)));
    source.set_page(2, Scripted::Page(articles(30..60)));
    let feed = feed_over(&source);
    feed.refresh().await;

    let _gate = source.hold_next();
    let task = tokio::spawn({
        let feed = feed.clone();
        async move { feed.load_more().await }
    });
    source.started.notified().await;

    // Reset while page 2 is in flight, then cancel the old load
    feed.refresh().await;
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    let snapshot = feed.snapshot();
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.current_page, 1);

    let outcome = feed.load_more().await;
    assert!(
        matches!(outcome, LoadOutcome::Loaded { page: 1, .. }),
        "nothing was applied since the reset, got {outcome:?}"
    );
}

#[tokio::test]
async fn duplicate_ids_across_pages_are_skipped() {
    let source = Arc::new(ScriptedSource::default());
    source.set_page(1, Scripted::Page(articles(0..30)));
    // The list shifted by five between requests
    source.set_page(2, Scripted::Page(articles(25..55)));
    let feed = feed_over(&source);

    feed.refresh().await;
    let outcome = feed.load_more().await;

    assert_eq!(
        outcome,
        LoadOutcome::Loaded {
            page: 2,
            received: 30,
            added: 25,
            end_of_data: false
        }
    );
    let snapshot = feed.snapshot();
    assert_eq!(ids(&snapshot), (0..55).collect::<Vec<_>>());
}

#[tokio::test]
async fn events_follow_a_page_load() {
    let source = Arc::new(ScriptedSource::default());
    source.set_page(1, Scripted::Page(articles(0..30)));
    source.set_page(2, Scripted::Page(articles(30..33)));
    let feed = feed_over(&source);
    let mut events = feed.subscribe();

    feed.refresh().await;
    feed.load_more().await;

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }

    assert_eq!(
        received,
        vec![
            FeedEvent::ItemsReplaced { count: 0 },
            FeedEvent::LoadingChanged { is_loading: true },
            FeedEvent::ItemsReplaced { count: 30 },
            FeedEvent::LoadingChanged { is_loading: false },
            FeedEvent::LoadingChanged { is_loading: true },
            FeedEvent::ItemsAppended {
                page: 2,
                added: 3,
                total: 33
            },
            FeedEvent::EndOfData { page: 2 },
            FeedEvent::LoadingChanged { is_loading: false },
        ]
    );
}

#[tokio::test]
async fn failure_event_carries_error() {
    let source = Arc::new(ScriptedSource::default());
    source.set_page(1, Scripted::Fail("boom"));
    let feed = feed_over(&source);
    let mut events = feed.subscribe();

    feed.refresh().await;

    let mut saw_failure = false;
    while let Ok(event) = events.try_recv() {
        if let FeedEvent::LoadFailed { page, error } = event {
            assert_eq!(page, 1);
            assert_eq!(error.code, "request_failed");
            saw_failure = true;
        }
    }
    assert!(saw_failure);
}

#[tokio::test]
async fn article_detail_does_not_touch_pagination() {
    let source = Arc::new(ScriptedSource::default());
    source.set_page(1, Scripted::Page(articles(0..30)));
    let mut detailed = article(7);
    detailed.body_markdown = Some("# Hello".to_string());
    source.set_detail(detailed.clone());
    let feed = feed_over(&source);

    feed.refresh().await;
    let before = feed.snapshot();

    let fetched = feed.article_detail(ArticleId(7)).await.unwrap();
    assert_eq!(fetched, detailed);
    assert_eq!(fetched.content(), Some("# Hello"));

    let err = feed.article_detail(ArticleId(999)).await.unwrap_err();
    assert_eq!(err.status(), Some(404));

    assert_eq!(feed.snapshot(), before);
}

#[tokio::test]
async fn article_detail_runs_while_a_page_is_loading() {
    let source = Arc::new(ScriptedSource::default());
    source.set_page(1, Scripted::Page(articles(0..30)));
    source.set_detail(article(3));
    let feed = feed_over(&source);

    let gate = source.hold_next();
    let task = tokio::spawn({
        let feed = feed.clone();
        async move { feed.refresh().await }
    });
    source.started.notified().await;

    let detail = feed.article_detail(ArticleId(3)).await.unwrap();
    assert_eq!(detail.id, ArticleId(3));
    assert!(feed.is_loading());

    gate.add_permits(1);
    task.await.unwrap();
}

fn snapshot_with(len: usize, is_loading: bool, end_of_data: bool) -> FeedSnapshot {
    FeedSnapshot {
        items: articles(0..len as i64),
        current_page: 1,
        page_size: PAGE_SIZE,
        end_of_data,
        is_loading,
        last_error: None,
        prefetch_distance: 5,
    }
}

#[test]
fn should_load_more_near_the_end() {
    let snapshot = snapshot_with(30, false, false);

    assert!(!snapshot.should_load_more(0));
    assert!(!snapshot.should_load_more(24));
    assert!(snapshot.should_load_more(25));
    assert!(snapshot.should_load_more(29));
}

#[test]
fn should_load_more_respects_flags() {
    assert!(!snapshot_with(30, true, false).should_load_more(29));
    assert!(!snapshot_with(30, false, true).should_load_more(29));
    assert!(!snapshot_with(0, false, false).should_load_more(0));
    assert!(snapshot_with(3, false, false).should_load_more(0));
}

#[test]
fn should_load_more_with_huge_prefetch_distance() {
    let mut snapshot = snapshot_with(30, false, false);
    snapshot.prefetch_distance = usize::MAX;

    assert!(snapshot.should_load_more(0));
    assert!(snapshot.should_load_more(usize::MAX));
}
