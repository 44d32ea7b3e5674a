//! Client façade: one object a host drives for everything the gallery does.
//!
//! Destructive operations go through a `ConfirmationGate` first; a refusal
//! ends the operation before any request is built.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::{GalleryBackend, HttpBackend};
use crate::cache::ResultSnapshot;
use crate::config::ClientConfig;
use crate::error::GalleryError;
use crate::events::EventSink;
use crate::models::{GalleryImage, Query, SourceFile};
use crate::pipeline::{
    DownsamplePreprocessor, ImagePreprocessor, SearchController, SearchOutcome, UploadOrchestrator,
    UploadOutcome,
};
use crate::render::{GalleryView, ImageCard, Renderer};

// ═══════════════════════════════════════════════════════════
// Confirmation
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmRequest {
    DeleteImage { id: String, name: String },
    /// `count` is the gallery size when known; a search on screen only
    /// shows part of what would be destroyed.
    ClearAll { count: Option<usize> },
}

impl ConfirmRequest {
    /// Question to put to the user.
    pub fn message(&self) -> String {
        match self {
            Self::DeleteImage { name, .. } => {
                format!("Delete \"{name}\"? This cannot be undone.")
            }
            Self::ClearAll { count: Some(count) } => format!(
                "Delete all {count} image{} from the gallery? This cannot be undone.",
                if *count == 1 { "" } else { "s" }
            ),
            Self::ClearAll { count: None } => {
                "Delete every image in the gallery? This cannot be undone.".to_string()
            }
        }
    }
}

/// Asks the user before anything is destroyed.
pub trait ConfirmationGate: Send + Sync {
    fn confirm(&self, request: &ConfirmRequest) -> bool;
}

/// Approves everything (`--yes`, scripted hosts).
pub struct AlwaysConfirm;

impl ConfirmationGate for AlwaysConfirm {
    fn confirm(&self, _request: &ConfirmRequest) -> bool {
        true
    }
}

/// Refuses everything.
pub struct NeverConfirm;

impl ConfirmationGate for NeverConfirm {
    fn confirm(&self, _request: &ConfirmRequest) -> bool {
        false
    }
}

#[derive(Debug)]
pub enum DeleteOutcome {
    Cancelled,
    Deleted,
    Failed(GalleryError),
}

#[derive(Debug)]
pub enum ClearOutcome {
    Cancelled,
    Cleared,
    Failed(GalleryError),
}

// ═══════════════════════════════════════════════════════════
// GalleryClient
// ═══════════════════════════════════════════════════════════

pub struct GalleryClient<B: GalleryBackend, P: ImagePreprocessor = DownsamplePreprocessor> {
    backend: Arc<B>,
    search: Arc<SearchController<B>>,
    uploader: UploadOrchestrator<B, P>,
    gate: Box<dyn ConfirmationGate>,
    events: EventSink,
}

impl GalleryClient<HttpBackend> {
    /// Client for a real server, configured from `config`.
    pub fn connect(
        config: &ClientConfig,
        gate: impl ConfirmationGate + 'static,
        events: EventSink,
    ) -> Result<Self, GalleryError> {
        let backend = HttpBackend::new(config)?;
        info!(server = %config.server_url, "Gallery client ready");
        Ok(Self::new(
            backend,
            DownsamplePreprocessor::new(config.preprocess.clone()),
            Renderer::new(&config.server_url),
            gate,
            events,
        ))
    }
}

impl<B, P> GalleryClient<B, P>
where
    B: GalleryBackend,
    P: ImagePreprocessor + 'static,
{
    pub fn new(
        backend: B,
        preprocessor: P,
        renderer: Renderer,
        gate: impl ConfirmationGate + 'static,
        events: EventSink,
    ) -> Self {
        let backend = Arc::new(backend);
        let search = Arc::new(SearchController::new(
            Arc::clone(&backend),
            renderer,
            events.clone(),
        ));
        let uploader = UploadOrchestrator::new(
            Arc::clone(&backend),
            preprocessor,
            Arc::clone(&search),
            events.clone(),
        );
        Self {
            backend,
            search,
            uploader,
            gate: Box::new(gate),
            events,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Initial load: the full listing.
    pub async fn load(&self) -> SearchOutcome {
        self.search.refresh().await
    }

    /// Run a search; blank text lists everything.
    pub async fn search(&self, text: &str) -> SearchOutcome {
        self.search.search(Query::new(text)).await
    }

    pub async fn upload(&self, files: Vec<SourceFile>) -> Result<UploadOutcome, GalleryError> {
        self.uploader.upload_batch(files).await
    }

    pub fn current(&self) -> Arc<ResultSnapshot> {
        self.search.current()
    }

    /// Re-render the cached results without fetching.
    pub fn view(&self) -> GalleryView {
        let snapshot = self.current();
        self.search
            .renderer()
            .render(&snapshot.images, snapshot.scope.is_search())
    }

    /// A cached image record by id.
    pub fn image(&self, id: &str) -> Option<GalleryImage> {
        self.search.find(id)
    }

    /// Unescaped URL the server serves `filename` from.
    pub fn image_url(&self, filename: &str) -> String {
        self.search.renderer().image_url(filename)
    }

    /// Detail card for a cached image.
    pub fn detail(&self, id: &str) -> Option<ImageCard> {
        let image = self.search.find(id)?;
        let ranked = self.current().scope.is_search();
        Some(self.search.renderer().render_detail(&image, ranked))
    }

    /// Confirm, delete, then re-run the current listing or search.
    pub async fn delete_image(&self, id: &str) -> DeleteOutcome {
        let name = self
            .search
            .find(id)
            .map(|img| img.display_name().to_string())
            .unwrap_or_else(|| id.to_string());
        let request = ConfirmRequest::DeleteImage {
            id: id.to_string(),
            name,
        };
        if !self.gate.confirm(&request) {
            debug!(id, "Delete cancelled");
            return DeleteOutcome::Cancelled;
        }

        match self.backend.delete_image(id).await {
            Ok(()) => {
                info!(id, "Image deleted");
                self.events.success("Image deleted");
                self.search.reload_current().await;
                DeleteOutcome::Deleted
            }
            Err(e) => {
                warn!(id, error = %e, "Delete failed");
                self.events.error(format!("Failed to delete image: {e}"));
                DeleteOutcome::Failed(e.into())
            }
        }
    }

    /// Confirm, wipe the gallery, then reload the (now empty) listing.
    pub async fn clear_all(&self) -> ClearOutcome {
        // Only a fetched listing knows the gallery size.
        let snapshot = self.current();
        let is_listing = snapshot.seq > 0 && !snapshot.scope.is_search();
        let request = ConfirmRequest::ClearAll {
            count: is_listing.then_some(snapshot.total),
        };
        if !self.gate.confirm(&request) {
            debug!("Clear cancelled");
            return ClearOutcome::Cancelled;
        }

        let err = match self.backend.clear_all().await {
            Ok(true) => {
                info!("Gallery cleared");
                self.events.success("All images cleared");
                self.search.refresh().await;
                return ClearOutcome::Cleared;
            }
            Ok(false) => GalleryError::Unexpected("server did not clear the gallery".into()),
            Err(e) => e.into(),
        };
        warn!(error = %err, "Clear failed");
        self.events.error(format!("Failed to clear gallery: {err}"));
        ClearOutcome::Failed(err)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use reqwest::Url;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::backend::{BackendCall, MockBackend};
    use crate::events::{drain, notifications, GalleryEvent, NotificationLevel};
    use crate::models::gallery_image::sample_image;
    use crate::pipeline::MockPreprocessor;

    /// Approves and remembers every question asked.
    #[derive(Clone, Default)]
    struct RecordingGate(Arc<Mutex<Vec<ConfirmRequest>>>);

    impl ConfirmationGate for RecordingGate {
        fn confirm(&self, request: &ConfirmRequest) -> bool {
            self.0.lock().unwrap().push(request.clone());
            true
        }
    }

    fn client(
        mock: MockBackend,
        gate: impl ConfirmationGate + 'static,
    ) -> (
        GalleryClient<MockBackend, MockPreprocessor>,
        UnboundedReceiver<GalleryEvent>,
    ) {
        let (events, rx) = EventSink::channel();
        let renderer = Renderer::new(&Url::parse("http://localhost:5000/").unwrap());
        (
            GalleryClient::new(mock, MockPreprocessor::new(), renderer, gate, events),
            rx,
        )
    }

    fn gallery(ids: &[&str]) -> MockBackend {
        MockBackend::new().with_images(ids.iter().map(|id| sample_image(id)).collect())
    }

    #[tokio::test]
    async fn refused_delete_sends_nothing() {
        let (client, mut rx) = client(gallery(&["a"]), NeverConfirm);
        client.load().await;
        drain(&mut rx);

        assert!(matches!(
            client.delete_image("a").await,
            DeleteOutcome::Cancelled
        ));
        assert_eq!(client.backend().calls(), vec![BackendCall::List]);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn refused_clear_sends_nothing() {
        let (client, _rx) = client(gallery(&["a", "b"]), NeverConfirm);
        assert!(matches!(client.clear_all().await, ClearOutcome::Cancelled));
        assert!(client.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn confirmed_delete_reloads_listing() {
        let gate = RecordingGate::default();
        let (client, mut rx) = client(gallery(&["a", "b"]), gate.clone());
        client.load().await;

        assert!(matches!(client.delete_image("a").await, DeleteOutcome::Deleted));
        assert_eq!(
            client.backend().calls(),
            vec![
                BackendCall::List,
                BackendCall::Delete("a".into()),
                BackendCall::List
            ]
        );
        assert_eq!(client.current().images.len(), 1);

        let asked = gate.0.lock().unwrap().clone();
        assert_eq!(asked.len(), 1);
        assert!(asked[0].message().contains("photo_a.jpg"));

        let events = drain(&mut rx);
        assert!(notifications(&events)
            .iter()
            .any(|n| n.level == NotificationLevel::Success && n.message == "Image deleted"));
    }

    #[tokio::test]
    async fn delete_during_search_reruns_that_search() {
        let mock = gallery(&["a"]).with_search_results("cat", vec![sample_image("a")]);
        let (client, _rx) = client(mock, AlwaysConfirm);
        client.search("cat").await;
        client.delete_image("a").await;

        assert_eq!(
            client.backend().calls(),
            vec![
                BackendCall::Search("cat".into()),
                BackendCall::Delete("a".into()),
                BackendCall::Search("cat".into())
            ]
        );
    }

    #[tokio::test]
    async fn failed_delete_keeps_cache_and_notifies() {
        let (client, mut rx) = client(gallery(&["a"]), AlwaysConfirm);
        client.load().await;
        drain(&mut rx);

        assert!(matches!(
            client.delete_image("missing").await,
            DeleteOutcome::Failed(GalleryError::Transport(_))
        ));
        assert_eq!(client.current().images.len(), 1);

        let events = drain(&mut rx);
        let notes = notifications(&events);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].level, NotificationLevel::Error);
        assert!(notes[0].message.contains("Image not found"));
    }

    #[tokio::test]
    async fn clear_all_empties_the_gallery() {
        let gate = RecordingGate::default();
        let (client, _rx) = client(gallery(&["a", "b", "c"]), gate.clone());
        client.load().await;

        assert!(matches!(client.clear_all().await, ClearOutcome::Cleared));
        assert!(client.current().images.is_empty());
        assert!(client.view().is_empty());
        assert_eq!(
            gate.0.lock().unwrap()[0],
            ConfirmRequest::ClearAll { count: Some(3) }
        );
    }

    #[tokio::test]
    async fn clear_during_search_does_not_quote_hit_count() {
        let ids: Vec<String> = (0..40).map(|i| format!("img{i}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let hits = vec![sample_image("img1"), sample_image("img2"), sample_image("img3")];
        let gate = RecordingGate::default();
        let (client, _rx) = client(gallery(&refs).with_search_results("cat", hits), gate.clone());

        client.search("cat").await;
        assert_eq!(client.current().images.len(), 3);
        assert!(matches!(client.clear_all().await, ClearOutcome::Cleared));

        let asked = gate.0.lock().unwrap()[0].clone();
        assert_eq!(asked, ConfirmRequest::ClearAll { count: None });
        assert!(!asked.message().contains('3'));
        assert!(client.backend().stored_images().is_empty());
        assert!(client.current().images.is_empty());
    }

    #[tokio::test]
    async fn clear_before_any_fetch_has_no_count() {
        let gate = RecordingGate::default();
        let (client, _rx) = client(gallery(&["a", "b"]), gate.clone());
        client.clear_all().await;
        assert_eq!(
            gate.0.lock().unwrap()[0],
            ConfirmRequest::ClearAll { count: None }
        );
    }

    #[test]
    fn clear_message_pluralizes_known_count() {
        assert!(ConfirmRequest::ClearAll { count: Some(1) }
            .message()
            .contains("all 1 image from"));
        assert!(ConfirmRequest::ClearAll { count: Some(40) }
            .message()
            .contains("all 40 images"));
    }

    #[tokio::test]
    async fn refused_server_clear_is_a_failure() {
        let (client, mut rx) = client(gallery(&["a"]).refusing_clear(), AlwaysConfirm);
        client.load().await;
        drain(&mut rx);

        assert!(matches!(client.clear_all().await, ClearOutcome::Failed(_)));
        assert_eq!(client.current().images.len(), 1);
        assert_eq!(
            client.backend().calls(),
            vec![BackendCall::List, BackendCall::Clear]
        );
        let events = drain(&mut rx);
        assert_eq!(notifications(&events)[0].level, NotificationLevel::Error);
    }

    #[tokio::test]
    async fn detail_shows_three_keywords() {
        let (client, _rx) = client(gallery(&["a"]), AlwaysConfirm);
        client.load().await;

        let card = client.detail("a").unwrap();
        let record = client.image("a").unwrap();
        assert_eq!(record.display_name(), "photo_a.jpg");
        let keywords = card
            .tags
            .iter()
            .filter(|t| t.kind == crate::render::TagKind::Keyword)
            .count();
        assert_eq!(keywords, 3);
        assert!(client.detail("nope").is_none());
    }

    #[tokio::test]
    async fn record_and_url_stay_unescaped_for_plain_text() {
        let mut img = sample_image("t");
        img.original_filename = "Tom & Jerry's.jpg".into();
        img.filename = "tom&jerry.jpg".into();
        let (client, _rx) = client(MockBackend::new().with_images(vec![img]), AlwaysConfirm);
        client.load().await;

        let record = client.image("t").unwrap();
        assert_eq!(record.display_name(), "Tom & Jerry's.jpg");
        assert_eq!(
            client.image_url(&record.filename),
            "http://localhost:5000/uploads/tom&jerry.jpg"
        );
        assert_eq!(
            client.detail("t").unwrap().title.as_str(),
            "Tom &amp; Jerry&#39;s.jpg"
        );
    }

    #[tokio::test]
    async fn uploads_flow_through_to_listing() {
        let (client, _rx) = client(MockBackend::new(), AlwaysConfirm);
        let outcome = client
            .upload(vec![SourceFile::new("cat.png", "image/png", vec![1, 2, 3])])
            .await
            .unwrap();
        assert_eq!(outcome.accepted, 1);
        assert_eq!(client.current().images[0].original_filename, "cat.png");
    }
}
