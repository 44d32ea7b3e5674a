//! Pure transform from cached gallery records to a display model.
//!
//! Every piece of text that came from the server or the user (file names,
//! keywords, colour and type labels, URLs) passes through `EscapedText`
//! before it can reach markup. There is no other way to build an
//! `EscapedText`, so the display model cannot carry raw user text.

use std::fmt;

use reqwest::Url;
use serde::Serialize;

use crate::models::GalleryImage;

/// Keyword badges per card in the gallery grid.
pub const LISTING_KEYWORDS: usize = 2;
/// Keyword badges in the single-image detail view.
pub const DETAIL_KEYWORDS: usize = 3;
/// Colour labels shown per card.
pub const MAX_COLOR_TAGS: usize = 2;

pub const PROCESSING_BADGE: &str = "Reading text…";

// ═══════════════════════════════════════════════════════════
// Escaping
// ═══════════════════════════════════════════════════════════

/// Text that is safe to splice into HTML element content or a quoted attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EscapedText(String);

impl EscapedText {
    pub fn new(raw: &str) -> Self {
        Self(escape_html(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EscapedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════
// Display model
// ═══════════════════════════════════════════════════════════

/// Where a card is shown; controls how many keyword badges survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardContext {
    Listing,
    Detail,
}

impl CardContext {
    pub fn keyword_limit(&self) -> usize {
        match self {
            Self::Listing => LISTING_KEYWORDS,
            Self::Detail => DETAIL_KEYWORDS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    Keyword,
    Color,
    ImageType,
}

impl TagKind {
    fn css_class(&self) -> &'static str {
        match self {
            Self::Keyword => "tag tag-keyword",
            Self::Color => "tag tag-color",
            Self::ImageType => "tag tag-type",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    pub kind: TagKind,
    pub text: EscapedText,
}

/// One image as the UI should draw it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageCard {
    pub id: EscapedText,
    pub image_url: EscapedText,
    pub title: EscapedText,
    pub tags: Vec<Tag>,
    /// Present only when relevance display was requested and the record has one.
    pub relevance: Option<f64>,
    /// Shown while the server is still reading text from the image.
    pub processing_badge: Option<EscapedText>,
}

impl ImageCard {
    pub fn to_html(&self) -> String {
        let mut html = format!(
            r#"<div class="image-card" data-id="{id}"><img src="{src}" alt="{title}" loading="lazy"><div class="image-info"><div class="image-name" title="{title}">{title}</div>"#,
            id = self.id,
            src = self.image_url,
            title = self.title,
        );

        if let Some(score) = self.relevance {
            html.push_str(&format!(
                r#"<div class="relevance">Relevance: {score}</div>"#
            ));
        }
        if let Some(badge) = &self.processing_badge {
            html.push_str(&format!(r#"<span class="ocr-badge">{badge}</span>"#));
        }

        html.push_str(r#"<div class="image-tags">"#);
        for tag in &self.tags {
            html.push_str(&format!(
                r#"<span class="{class}">{text}</span>"#,
                class = tag.kind.css_class(),
                text = tag.text,
            ));
        }
        html.push_str("</div></div></div>");
        html
    }
}

/// Placeholder shown when there is nothing to list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmptyState {
    pub title: EscapedText,
    pub hint: EscapedText,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GalleryView {
    Empty(EmptyState),
    Cards { cards: Vec<ImageCard> },
}

impl GalleryView {
    pub fn len(&self) -> usize {
        match self {
            Self::Empty(_) => 0,
            Self::Cards { cards } => cards.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_html(&self) -> String {
        match self {
            Self::Empty(empty) => format!(
                r#"<div class="empty-state"><h3>{}</h3><p>{}</p></div>"#,
                empty.title, empty.hint
            ),
            Self::Cards { cards } => cards.iter().map(ImageCard::to_html).collect(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Renderer
// ═══════════════════════════════════════════════════════════

/// Builds display models; knows only where stored images are served from.
#[derive(Debug, Clone)]
pub struct Renderer {
    uploads_base: Url,
}

impl Renderer {
    /// `server_url` must end with `/` (see `config::parse_server_url`).
    pub fn new(server_url: &Url) -> Self {
        let uploads_base = server_url
            .join("uploads/")
            .unwrap_or_else(|_| server_url.clone());
        Self { uploads_base }
    }

    /// `/uploads/{filename}` with the filename percent-encoded as one path segment.
    pub fn image_url(&self, filename: &str) -> String {
        let mut url = self.uploads_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(filename);
        }
        url.to_string()
    }

    /// Render the grid. `show_relevance` is true for query-scoped results.
    pub fn render(&self, images: &[GalleryImage], show_relevance: bool) -> GalleryView {
        if images.is_empty() {
            return GalleryView::Empty(empty_state(show_relevance));
        }

        let cards = images
            .iter()
            .map(|img| self.card(img, show_relevance, CardContext::Listing))
            .collect();
        GalleryView::Cards { cards }
    }

    /// A single image for the detail view (one more keyword badge).
    pub fn render_detail(&self, image: &GalleryImage, show_relevance: bool) -> ImageCard {
        self.card(image, show_relevance, CardContext::Detail)
    }

    fn card(&self, img: &GalleryImage, show_relevance: bool, context: CardContext) -> ImageCard {
        let mut tags: Vec<Tag> = img
            .effective_keywords()
            .into_iter()
            .take(context.keyword_limit())
            .map(|k| Tag {
                kind: TagKind::Keyword,
                text: EscapedText::new(k),
            })
            .collect();

        tags.extend(
            img.colors
                .iter()
                .filter(|c| !c.trim().is_empty())
                .take(MAX_COLOR_TAGS)
                .map(|c| Tag {
                    kind: TagKind::Color,
                    text: EscapedText::new(c),
                }),
        );

        if let Some(kind) = img.image_type.as_deref().filter(|t| !t.trim().is_empty()) {
            tags.push(Tag {
                kind: TagKind::ImageType,
                text: EscapedText::new(kind),
            });
        }

        ImageCard {
            id: EscapedText::new(&img.id),
            image_url: EscapedText::new(&self.image_url(&img.filename)),
            title: EscapedText::new(img.display_name()),
            tags,
            relevance: if show_relevance { img.relevance } else { None },
            processing_badge: img
                .is_processing()
                .then(|| EscapedText::new(PROCESSING_BADGE)),
        }
    }
}

fn empty_state(is_search: bool) -> EmptyState {
    if is_search {
        EmptyState {
            title: EscapedText::new("No matching images"),
            hint: EscapedText::new("Try a different description or fewer words."),
        }
    } else {
        EmptyState {
            title: EscapedText::new("No images yet"),
            hint: EscapedText::new("Upload some images to get started."),
        }
    }
}
