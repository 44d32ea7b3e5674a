//! Events the client pushes to its host.
//!
//! The core never touches presentation state: progress, notifications and
//! freshly rendered results all go out over one unbounded channel. A client
//! built with `EventSink::disconnected()` simply drops them.

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::render::{EscapedText, GalleryView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Info,
    Error,
}

/// A toast-style message for the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

/// Emitted before each file of a batch is prepared and sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadProgress {
    /// 1-based index of the file about to go out.
    pub current: usize,
    pub total: usize,
    /// `current / total` as a whole percentage.
    pub percent: u8,
    pub file_name: String,
}

impl UploadProgress {
    pub fn new(index: usize, total: usize, file_name: &str) -> Self {
        let current = index + 1;
        let percent = if total == 0 {
            100
        } else {
            ((current * 100) / total).min(100) as u8
        };
        Self {
            current,
            total,
            percent,
            file_name: file_name.to_string(),
        }
    }
}

/// The cache now holds a new snapshot; this is how to show it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedResults {
    /// Result-count label, e.g. `3 results for "invoice"`. Carries the
    /// query, so it is escaped like the rest of the view.
    pub label: EscapedText,
    pub count: usize,
    pub show_relevance: bool,
    pub view: GalleryView,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GalleryEvent {
    UploadProgress(UploadProgress),
    Notification(Notification),
    ResultsRendered(RenderedResults),
    /// A non-empty search produced results; bring them into view.
    ScrollToResults,
}

/// Sending half of the host event channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Option<UnboundedSender<GalleryEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, UnboundedReceiver<GalleryEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink nobody listens to.
    pub fn disconnected() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: GalleryEvent) {
        if let Some(tx) = &self.tx {
            // Host went away; nothing left to tell.
            let _ = tx.send(event);
        }
    }

    pub fn notify(&self, level: NotificationLevel, message: impl Into<String>) {
        self.emit(GalleryEvent::Notification(Notification {
            level,
            message: message.into(),
        }));
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(NotificationLevel::Success, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(NotificationLevel::Info, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(NotificationLevel::Error, message);
    }
}

/// Drain everything currently queued on a receiver.
pub fn drain(rx: &mut UnboundedReceiver<GalleryEvent>) -> Vec<GalleryEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Just the notifications from a list of events.
pub fn notifications(events: &[GalleryEvent]) -> Vec<&Notification> {
    events
        .iter()
        .filter_map(|e| match e {
            GalleryEvent::Notification(n) => Some(n),
            _ => None,
        })
        .collect()
}
