//! Search and listing: fetch, truncate, cache, render.
//!
//! Every fetch takes a sequence number when it is issued. A response is
//! applied only if no newer fetch was issued while it was in flight, so a
//! slow search can never overwrite the results of a later one. Stale
//! successes and stale failures are both dropped without a notification.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::backend::GalleryBackend;
use crate::cache::{ResultCache, ResultScope, ResultSnapshot};
use crate::config::MAX_RANKED_RESULTS;
use crate::error::GalleryError;
use crate::events::{EventSink, GalleryEvent, RenderedResults};
use crate::models::{GalleryImage, Query};
use crate::render::{EscapedText, Renderer};

/// What the cache looks like after an applied fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSummary {
    pub scope: ResultScope,
    /// Results kept in the cache.
    pub shown: usize,
    /// Results the server returned before truncation.
    pub total: usize,
    pub label: String,
}

#[derive(Debug)]
pub enum SearchOutcome {
    Applied(SearchSummary),
    /// A newer fetch was issued while this one was in flight.
    Superseded,
    /// The fetch failed; the cache still holds the previous results.
    Failed(GalleryError),
}

impl SearchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

pub struct SearchController<B: GalleryBackend> {
    backend: Arc<B>,
    cache: Mutex<ResultCache>,
    issued: AtomicU64,
    renderer: Renderer,
    events: EventSink,
    max_ranked: usize,
}

impl<B: GalleryBackend> SearchController<B> {
    pub fn new(backend: Arc<B>, renderer: Renderer, events: EventSink) -> Self {
        Self {
            backend,
            cache: Mutex::new(ResultCache::new()),
            issued: AtomicU64::new(0),
            renderer,
            events,
            max_ranked: MAX_RANKED_RESULTS,
        }
    }

    pub fn with_max_ranked(mut self, max_ranked: usize) -> Self {
        self.max_ranked = max_ranked;
        self
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// The snapshot currently on screen.
    pub fn current(&self) -> Arc<ResultSnapshot> {
        self.cache().current()
    }

    pub fn find(&self, id: &str) -> Option<GalleryImage> {
        self.cache().find(id)
    }

    /// Reload the full, unranked listing.
    pub async fn refresh(&self) -> SearchOutcome {
        self.search(Query::all()).await
    }

    /// Re-run whatever produced the current snapshot.
    pub async fn reload_current(&self) -> SearchOutcome {
        let query = Query::new(self.current().scope.query());
        self.search(query).await
    }

    /// Fetch results for `query` (empty lists everything) and, if still
    /// the latest request, replace the cache and emit the rendered view.
    pub async fn search(&self, query: Query) -> SearchOutcome {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let scope = if query.is_listing() {
            ResultScope::Listing
        } else {
            ResultScope::Search {
                query: query.as_str().to_string(),
            }
        };
        debug!(seq, query = %query, "Fetching results");

        let fetched = match &scope {
            ResultScope::Listing => self.backend.list_images().await,
            ResultScope::Search { query } => self.backend.search(query).await,
        };

        let mut images = match fetched {
            Ok(images) => images,
            Err(e) => {
                if self.is_stale(seq) {
                    debug!(seq, error = %e, "Dropping failure of superseded fetch");
                    return SearchOutcome::Superseded;
                }
                warn!(seq, error = %e, "Fetch failed, keeping previous results");
                let what = if scope.is_search() {
                    "Search failed"
                } else {
                    "Failed to load images"
                };
                self.events.error(format!("{what}: {e}"));
                return SearchOutcome::Failed(e.into());
            }
        };

        let total = images.len();
        match scope {
            ResultScope::Listing => images.iter_mut().for_each(|img| img.relevance = None),
            ResultScope::Search { .. } => images.truncate(self.max_ranked),
        }

        let snapshot = ResultSnapshot {
            scope,
            images,
            total,
            seq,
        };

        // Events go out under the cache lock so hosts see renders in the
        // same order the cache was replaced.
        {
            let mut cache = self.cache();
            if self.is_stale(seq) || !cache.replace(snapshot.clone()) {
                debug!(seq, "Dropping superseded results");
                return SearchOutcome::Superseded;
            }
            self.publish(&snapshot);
        }

        let summary = SearchSummary {
            scope: snapshot.scope.clone(),
            shown: snapshot.images.len(),
            total,
            label: snapshot.label(),
        };
        info!(
            seq,
            shown = summary.shown,
            total = summary.total,
            search = snapshot.scope.is_search(),
            "Results applied"
        );
        SearchOutcome::Applied(summary)
    }

    fn publish(&self, snapshot: &ResultSnapshot) {
        let is_search = snapshot.scope.is_search();
        self.events
            .emit(GalleryEvent::ResultsRendered(RenderedResults {
                label: EscapedText::new(&snapshot.label()),
                count: snapshot.images.len(),
                show_relevance: is_search,
                view: self.renderer.render(&snapshot.images, is_search),
            }));

        if snapshot.is_truncated() {
            self.events.info(format!(
                "Showing top {} of {} results",
                snapshot.images.len(),
                snapshot.total
            ));
        }
        if is_search && !snapshot.images.is_empty() {
            self.events.emit(GalleryEvent::ScrollToResults);
        }
    }

    fn is_stale(&self, seq: u64) -> bool {
        self.issued.load(Ordering::SeqCst) != seq
    }

    fn cache(&self) -> MutexGuard<'_, ResultCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::Url;

    use super::*;
    use crate::backend::{BackendCall, MockBackend};
    use crate::events::{drain, notifications, NotificationLevel};
    use crate::models::gallery_image::sample_image;

    fn ranked(n: usize) -> Vec<GalleryImage> {
        (0..n)
            .map(|i| {
                let mut img = sample_image(&format!("r{i}"));
                img.relevance = Some(100.0 - i as f64);
                img
            })
            .collect()
    }

    fn controller(
        mock: MockBackend,
    ) -> (
        Arc<MockBackend>,
        SearchController<MockBackend>,
        tokio::sync::mpsc::UnboundedReceiver<GalleryEvent>,
    ) {
        let backend = Arc::new(mock);
        let (events, rx) = EventSink::channel();
        let renderer = Renderer::new(&Url::parse("http://localhost:5000/").unwrap());
        let ctrl = SearchController::new(Arc::clone(&backend), renderer, events);
        (backend, ctrl, rx)
    }

    #[tokio::test]
    async fn ranked_results_are_capped_at_ten() {
        let (_, ctrl, mut rx) = controller(MockBackend::new().with_search_results("cat", ranked(25)));

        let outcome = ctrl.search(Query::new("cat")).await;
        match outcome {
            SearchOutcome::Applied(s) => {
                assert_eq!(s.shown, 10);
                assert_eq!(s.total, 25);
                assert_eq!(s.label, "10 results for \"cat\"");
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        let snap = ctrl.current();
        assert_eq!(snap.images.len(), 10);
        assert_eq!(snap.images[0].id, "r0");
        assert_eq!(snap.images[9].id, "r9");

        let events = drain(&mut rx);
        let infos: Vec<_> = notifications(&events)
            .into_iter()
            .filter(|n| n.level == NotificationLevel::Info)
            .collect();
        assert_eq!(infos.len(), 1);
        assert!(infos[0].message.contains("10 of 25"));
    }

    #[tokio::test]
    async fn few_results_are_not_truncated() {
        let (_, ctrl, mut rx) = controller(MockBackend::new().with_search_results("dog", ranked(4)));

        assert!(ctrl.search(Query::new("dog")).await.is_applied());
        assert_eq!(ctrl.current().images.len(), 4);
        assert!(notifications(&drain(&mut rx)).is_empty());
    }

    #[tokio::test]
    async fn listing_is_never_ranked_or_capped() {
        let (backend, ctrl, mut rx) = controller(MockBackend::new().with_images(ranked(12)));

        assert!(ctrl.refresh().await.is_applied());
        let snap = ctrl.current();
        assert_eq!(snap.images.len(), 12);
        assert!(snap.images.iter().all(|img| img.relevance.is_none()));
        assert_eq!(snap.scope, ResultScope::Listing);
        assert_eq!(backend.calls(), vec![BackendCall::List]);

        let events = drain(&mut rx);
        assert!(!events.contains(&GalleryEvent::ScrollToResults));
        match &events[0] {
            GalleryEvent::ResultsRendered(r) => {
                assert_eq!(r.label.as_str(), "12 images");
                assert!(!r.show_relevance);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn whitespace_query_lists_everything() {
        let (backend, ctrl, _rx) = controller(MockBackend::new().with_images(ranked(2)));
        ctrl.search(Query::new("   ")).await;
        assert_eq!(backend.calls(), vec![BackendCall::List]);
    }

    #[tokio::test]
    async fn failure_keeps_previous_results() {
        let (backend, ctrl, mut rx) =
            controller(MockBackend::new().with_search_results("cat", ranked(3)));
        ctrl.search(Query::new("cat")).await;
        drain(&mut rx);

        backend.set_offline(true);
        let outcome = ctrl.search(Query::new("dog")).await;
        assert!(matches!(
            outcome,
            SearchOutcome::Failed(GalleryError::Transport(_))
        ));

        let snap = ctrl.current();
        assert_eq!(snap.scope.query(), "cat");
        assert_eq!(snap.images.len(), 3);

        let events = drain(&mut rx);
        let notes = notifications(&events);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].level, NotificationLevel::Error);
        assert!(notes[0].message.starts_with("Search failed"));
        assert!(!events
            .iter()
            .any(|e| matches!(e, GalleryEvent::ResultsRendered(_))));
    }

    #[tokio::test]
    async fn slow_earlier_search_cannot_overwrite_later_one() {
        let (_, ctrl, _rx) = controller(
            MockBackend::new()
                .with_search_results("slow", ranked(5))
                .with_search_results("fast", ranked(1))
                .with_search_delay("slow", Duration::from_millis(150)),
        );

        let (slow, fast) = tokio::join!(ctrl.search(Query::new("slow")), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ctrl.search(Query::new("fast")).await
        });

        assert!(matches!(slow, SearchOutcome::Superseded));
        assert!(fast.is_applied());
        let snap = ctrl.current();
        assert_eq!(snap.scope.query(), "fast");
        assert_eq!(snap.images.len(), 1);
    }

    #[tokio::test]
    async fn stale_failure_is_silent() {
        let (backend, ctrl, mut rx) = controller(
            MockBackend::new()
                .with_search_results("fast", ranked(2))
                .with_search_delay("slow", Duration::from_millis(150)),
        );

        let (slow, _) = tokio::join!(ctrl.search(Query::new("slow")), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let outcome = ctrl.search(Query::new("fast")).await;
            backend.set_offline(true);
            outcome
        });

        assert!(matches!(slow, SearchOutcome::Superseded));
        assert_eq!(ctrl.current().scope.query(), "fast");
        assert!(notifications(&drain(&mut rx))
            .iter()
            .all(|n| n.level != NotificationLevel::Error));
    }

    #[tokio::test]
    async fn non_empty_search_scrolls_into_view() {
        let (_, ctrl, mut rx) = controller(MockBackend::new().with_search_results("cat", ranked(2)));

        ctrl.search(Query::new("cat")).await;
        let events = drain(&mut rx);
        assert_eq!(events.last(), Some(&GalleryEvent::ScrollToResults));

        ctrl.search(Query::new("nothing")).await;
        let events = drain(&mut rx);
        assert!(!events.contains(&GalleryEvent::ScrollToResults));
        match &events[0] {
            GalleryEvent::ResultsRendered(r) => assert!(r.view.is_empty()),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn reload_current_repeats_last_scope() {
        let (backend, ctrl, _rx) = controller(MockBackend::new().with_search_results("cat", ranked(2)));
        ctrl.search(Query::new("cat")).await;
        ctrl.reload_current().await;
        assert_eq!(
            backend.calls(),
            vec![
                BackendCall::Search("cat".into()),
                BackendCall::Search("cat".into())
            ]
        );
    }

    #[tokio::test]
    async fn hostile_query_is_escaped_in_rendered_label() {
        let hostile = "<img src=x onerror=alert(1)>";
        let (_, ctrl, mut rx) =
            controller(MockBackend::new().with_search_results(hostile, ranked(1)));

        let outcome = ctrl.search(Query::new(hostile)).await;
        match outcome {
            SearchOutcome::Applied(s) => assert!(s.label.contains(hostile)),
            other => panic!("unexpected outcome {other:?}"),
        }

        let events = drain(&mut rx);
        let label = events
            .iter()
            .find_map(|e| match e {
                GalleryEvent::ResultsRendered(r) => Some(r.label.clone()),
                _ => None,
            })
            .unwrap();
        assert!(!label.as_str().contains('<'));
        assert_eq!(
            label.as_str(),
            "1 result for &quot;&lt;img src=x onerror=alert(1)&gt;&quot;"
        );
    }

    #[tokio::test]
    async fn failed_listing_keeps_previous_listing() {
        let (backend, ctrl, mut rx) = controller(MockBackend::new().with_images(ranked(3)));
        assert!(ctrl.refresh().await.is_applied());
        drain(&mut rx);

        backend.set_offline(true);
        assert!(matches!(ctrl.refresh().await, SearchOutcome::Failed(_)));

        let snap = ctrl.current();
        assert_eq!(snap.scope, ResultScope::Listing);
        assert_eq!(snap.images.len(), 3);
        let events = drain(&mut rx);
        let notes = notifications(&events);
        assert_eq!(notes.len(), 1);
        assert!(notes[0].message.starts_with("Failed to load images"));
    }

    #[tokio::test]
    async fn ranked_cap_is_configurable() {
        let (backend, _, _rx) = controller(MockBackend::new().with_search_results("cat", ranked(8)));
        let (events, mut rx) = EventSink::channel();
        let renderer = Renderer::new(&Url::parse("http://localhost:5000/").unwrap());
        let ctrl = SearchController::new(backend, renderer, events).with_max_ranked(3);

        ctrl.search(Query::new("cat")).await;
        assert_eq!(ctrl.current().images.len(), 3);
        assert!(notifications(&drain(&mut rx))[0].message.contains("3 of 8"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn last_render_matches_cached_snapshot() {
        let mut mock = MockBackend::new();
        for i in 0..16 {
            mock = mock.with_search_results(&format!("q{i}"), ranked(i + 1));
        }
        let (_, ctrl, mut rx) = controller(mock);
        let ctrl = Arc::new(ctrl);

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..16 {
            let ctrl = Arc::clone(&ctrl);
            tasks.spawn(async move { ctrl.search(Query::new(&format!("q{i}"))).await });
        }
        while tasks.join_next().await.is_some() {}

        let last_rendered = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                GalleryEvent::ResultsRendered(r) => Some(r.label),
                _ => None,
            })
            .last()
            .unwrap();
        let label = ctrl.current().label();
        assert_eq!(last_rendered, EscapedText::new(&label));
    }
}
