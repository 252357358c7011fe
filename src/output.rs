//! Output types returned by the export entry points.

use crate::error::ImageLoadFailure;
use crate::pipeline::layout::Page;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A finished export, held in memory.
#[derive(Debug, Clone)]
pub struct ExportOutput {
    /// `Itinerary_<destination>_<millis>.pdf`.
    pub file_name: String,

    /// The complete PDF file.
    pub pdf: Vec<u8>,

    /// Laid-out pages with footers, as serialised into `pdf`.
    pub pages: Vec<Page>,

    pub stats: ExportStats,
}

impl ExportOutput {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// An export that has been written to disk.
#[derive(Debug, Clone)]
pub struct SavedExport {
    /// Where the PDF was saved.
    pub path: PathBuf,

    pub output: ExportOutput,
}

/// Counters and timings for one export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportStats {
    /// Pages in the final document.
    pub pages: usize,

    /// Photos supplied by the conversation.
    pub photos_supplied: usize,

    /// Photos attempted (at most the configured cap).
    pub photos_attempted: usize,

    /// Photos actually drawn in the gallery.
    pub images_embedded: usize,

    /// Photos that were skipped, with the reason for each.
    pub image_failures: Vec<ImageLoadFailure>,

    /// Turns rendered in the follow-up appendix.
    pub follow_up_questions: usize,

    /// Size of the PDF in bytes.
    pub pdf_bytes: usize,

    /// Wall-clock time spent resolving photos.
    pub image_duration_ms: u64,

    /// Wall-clock time spent in layout and serialisation.
    pub render_duration_ms: u64,

    pub total_duration_ms: u64,
}
