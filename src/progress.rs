//! Progress-callback trait for export events.
//!
//! Inject an [`Arc<dyn ExportProgressCallback>`] via
//! [`crate::config::ExportConfigBuilder::progress_callback`] to follow an
//! export as it resolves photos, paginates and finalises the document.
//!
//! # Example
//!
//! ```rust
//! use itinerary_pdf::{ExportConfig, ExportProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PageCounter {
//!     breaks: AtomicUsize,
//! }
//!
//! impl ExportProgressCallback for PageCounter {
//!     fn on_page_break(&self, page_index: usize) {
//!         self.breaks.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("opened page {}", page_index + 1);
//!     }
//! }
//!
//! let counter = Arc::new(PageCounter { breaks: AtomicUsize::new(0) });
//!
//! let config = ExportConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExportProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::ImageLoadFailure;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Where an export is in its lifecycle.
///
/// `Accumulating` and `PageBreak` alternate while content is laid out;
/// `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportState {
    Accumulating,
    PageBreak,
    Finalizing,
    Done,
    Failed,
}

impl ExportState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExportState::Done | ExportState::Failed)
    }
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExportState::Accumulating => "accumulating",
            ExportState::PageBreak => "page_break",
            ExportState::Finalizing => "finalizing",
            ExportState::Done => "done",
            ExportState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Called by the export pipeline as it runs.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Photos are resolved sequentially, so image events
/// never overlap.
pub trait ExportProgressCallback: Send + Sync {
    /// Called once before any photo is fetched.
    ///
    /// # Arguments
    /// * `destination` — trip destination, sanitised
    /// * `photos`      — number of photos that will be attempted
    fn on_export_start(&self, destination: &str, photos: usize) {
        let _ = (destination, photos);
    }

    /// Called before a photo is fetched. `index` is 0-based.
    fn on_image_start(&self, index: usize, total: usize, url: &str) {
        let _ = (index, total, url);
    }

    fn on_image_loaded(&self, index: usize, url: &str) {
        let _ = (index, url);
    }

    /// Called when a photo is skipped. The export continues.
    fn on_image_failed(&self, index: usize, failure: &ImageLoadFailure) {
        let _ = (index, failure);
    }

    /// Called on every state transition.
    fn on_state(&self, state: ExportState) {
        let _ = state;
    }

    /// Called when layout opens a new page. `page_index` is 0-based and
    /// never 0.
    fn on_page_break(&self, page_index: usize) {
        let _ = page_index;
    }

    /// Called once after the PDF bytes exist.
    ///
    /// # Arguments
    /// * `pages`  — final page count
    /// * `images` — photos actually embedded
    /// * `bytes`  — size of the PDF
    fn on_export_complete(&self, pages: usize, images: usize, bytes: usize) {
        let _ = (pages, images, bytes);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ExportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExportConfig`].
pub type ProgressCallback = Arc<dyn ExportProgressCallback>;

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Records every event as a short string.
    #[derive(Default)]
    pub struct RecordingCallback {
        pub events: Mutex<Vec<String>>,
    }

    impl RecordingCallback {
        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl ExportProgressCallback for RecordingCallback {
        fn on_export_start(&self, destination: &str, photos: usize) {
            self.push(format!("start {destination} {photos}"));
        }

        fn on_image_loaded(&self, index: usize, _url: &str) {
            self.push(format!("image {index} ok"));
        }

        fn on_image_failed(&self, index: usize, _failure: &ImageLoadFailure) {
            self.push(format!("image {index} failed"));
        }

        fn on_state(&self, state: ExportState) {
            self.push(format!("state {state}"));
        }

        fn on_page_break(&self, page_index: usize) {
            self.push(format!("break {page_index}"));
        }

        fn on_export_complete(&self, pages: usize, images: usize, _bytes: usize) {
            self.push(format!("complete {pages} {images}"));
        }
    }
}
