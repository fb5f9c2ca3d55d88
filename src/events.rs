//! Event and context types for the collector.
//!
//! The host application owns the actual UI event listeners; it feeds these
//! types with the values it reads from its page (URL, referrer, element
//! attributes, pointer coordinates). The collector turns them into the
//! JSON bodies of the collection endpoint contract.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Page-level context captured at the time of a tracked action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageContext {
    /// Full URL of the current page
    pub page_url: String,
    /// Referrer URL, empty when there is none
    pub referrer: String,
    /// Physical screen width in pixels
    pub screen_width: u32,
    /// Physical screen height in pixels
    pub screen_height: u32,
    /// Viewport width in pixels
    pub viewport_width: u32,
    /// Viewport height in pixels
    pub viewport_height: u32,
}

impl PageContext {
    /// Create a context for the given URL with no referrer and zeroed metrics.
    pub fn new(page_url: impl Into<String>) -> Self {
        Self {
            page_url: page_url.into(),
            referrer: String::new(),
            screen_width: 0,
            screen_height: 0,
            viewport_width: 0,
            viewport_height: 0,
        }
    }

    /// Set the referrer URL.
    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = referrer.into();
        self
    }

    /// Set screen dimensions.
    pub fn with_screen(mut self, width: u32, height: u32) -> Self {
        self.screen_width = width;
        self.screen_height = height;
        self
    }

    /// Set viewport dimensions.
    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }
}

/// Attributes of an element the host wants click-tracked.
///
/// `track_id` mirrors the `data-track-id` attribute convention: elements
/// without it are not tracked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackedElement {
    /// Tracking identifier, required for the click to be recorded
    pub track_id: Option<String>,
    /// Explicit tracking label, highest priority for the display label
    pub label: Option<String>,
    /// Visible text content of the element
    pub text: Option<String>,
    /// Accessibility label, lowest priority fallback
    pub aria_label: Option<String>,
}

impl TrackedElement {
    /// Create an element with just a tracking identifier.
    pub fn with_id(track_id: impl Into<String>) -> Self {
        Self {
            track_id: Some(track_id.into()),
            ..Self::default()
        }
    }

    /// Resolve the human-readable label for this element.
    ///
    /// Priority: explicit label, then trimmed text content, then the
    /// accessibility label. Falls back to "Unknown".
    pub fn resolved_label(&self) -> String {
        if let Some(label) = self.label.as_deref() {
            if !label.is_empty() {
                return label.to_string();
            }
        }
        if let Some(text) = self.text.as_deref() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
        if let Some(aria) = self.aria_label.as_deref() {
            if !aria.is_empty() {
                return aria.to_string();
            }
        }
        "Unknown".to_string()
    }
}

/// A single click sample for heatmap aggregation.
///
/// Coordinates are in page space: viewport coordinates plus scroll offsets,
/// so samples from different scroll positions land on the same page map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapClick {
    /// URL of the page the click happened on
    pub page_url: String,
    /// Horizontal page coordinate
    pub x: f64,
    /// Vertical page coordinate
    pub y: f64,
    /// Viewport width at click time
    pub viewport_width: u32,
    /// Viewport height at click time
    pub viewport_height: u32,
    /// Best-effort CSS-like selector of the clicked element
    pub element_selector: String,
    /// Trimmed text of the clicked element, empty when none
    pub element_text: String,
}

impl HeatmapClick {
    /// Build a sample from viewport coordinates and scroll offsets.
    #[allow(clippy::too_many_arguments)]
    pub fn from_viewport(
        page_url: impl Into<String>,
        viewport_x: f64,
        viewport_y: f64,
        scroll_x: f64,
        scroll_y: f64,
        viewport_width: u32,
        viewport_height: u32,
        element_selector: impl Into<String>,
        element_text: impl Into<String>,
    ) -> Self {
        Self {
            page_url: page_url.into(),
            x: viewport_x + scroll_x,
            y: viewport_y + scroll_y,
            viewport_width,
            viewport_height,
            element_selector: element_selector.into(),
            element_text: element_text.into(),
        }
    }
}

/// Build a best-effort CSS-like descriptor for an element.
///
/// Produces `tag#id.class1.class2`; id and classes are skipped when absent.
pub fn element_selector(tag: &str, id: Option<&str>, classes: &[&str]) -> String {
    let mut selector = tag.to_lowercase();
    if let Some(id) = id {
        if !id.is_empty() {
            selector.push('#');
            selector.push_str(id);
        }
    }
    for class in classes {
        if !class.is_empty() {
            selector.push('.');
            selector.push_str(class);
        }
    }
    selector
}

/// An event held in a batching queue awaiting flush.
///
/// Lives only in process memory; destroyed on flush or discard.
#[derive(Debug, Clone)]
pub struct QueuedEvent {
    /// Endpoint path the payload targets, e.g. `/track/visit`
    pub endpoint: String,
    /// JSON body, without the `consent_given` stamp (added at send time)
    pub payload: Value,
}

impl QueuedEvent {
    pub fn new(endpoint: impl Into<String>, payload: Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            payload,
        }
    }
}

/// Current time as an RFC 3339 timestamp with millisecond precision.
pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
