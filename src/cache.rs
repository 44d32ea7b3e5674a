//! The last successfully applied result set.
//!
//! Snapshots are immutable and shared behind an `Arc`; replacing one is a
//! single pointer swap, so a reader never sees a half-populated set.

use std::sync::Arc;

use crate::models::GalleryImage;

/// What produced a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultScope {
    /// Unranked listing of the whole gallery.
    Listing,
    /// Ranked search for `query` (already trimmed, never empty).
    Search { query: String },
}

impl ResultScope {
    pub fn is_search(&self) -> bool {
        matches!(self, Self::Search { .. })
    }

    pub fn query(&self) -> &str {
        match self {
            Self::Listing => "",
            Self::Search { query } => query,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultSnapshot {
    pub scope: ResultScope,
    pub images: Vec<GalleryImage>,
    /// Result count reported by the server before any truncation.
    pub total: usize,
    /// Sequence number of the request that produced this snapshot.
    pub seq: u64,
}

impl ResultSnapshot {
    pub fn empty() -> Self {
        Self {
            scope: ResultScope::Listing,
            images: Vec::new(),
            total: 0,
            seq: 0,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.images.len() < self.total
    }

    /// `3 images` for a listing, `2 results for "cat"` for a search.
    pub fn label(&self) -> String {
        let n = self.images.len();
        match &self.scope {
            ResultScope::Listing => format!("{n} image{}", plural(n)),
            ResultScope::Search { query } => format!("{n} result{} for \"{query}\"", plural(n)),
        }
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

pub struct ResultCache {
    current: Arc<ResultSnapshot>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            current: Arc::new(ResultSnapshot::empty()),
        }
    }

    pub fn current(&self) -> Arc<ResultSnapshot> {
        Arc::clone(&self.current)
    }

    /// Swap in `snapshot` unless the cache already holds a newer one.
    /// Returns whether the swap happened.
    pub fn replace(&mut self, snapshot: ResultSnapshot) -> bool {
        if snapshot.seq < self.current.seq {
            tracing::debug!(
                incoming = snapshot.seq,
                held = self.current.seq,
                "Dropping older result snapshot"
            );
            return false;
        }
        self.current = Arc::new(snapshot);
        true
    }

    pub fn len(&self) -> usize {
        self.current.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.images.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<GalleryImage> {
        self.current.images.iter().find(|img| img.id == id).cloned()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}
