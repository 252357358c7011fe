//! Error types for the itinerary-pdf library.
//!
//! Errors are split by how far they propagate:
//!
//! * [`ExportError`] — **Fatal**: the export cannot produce an artifact
//!   (layout impossible, serialisation or save failed, cancelled, blocked).
//!   Returned as `Err(ExportError)` from the top-level `export*` functions,
//!   and no partial file is ever left on disk.
//!
//! * [`ImageLoadFailure`] — **Non-fatal**: one gallery photo could not be
//!   fetched or decoded. It is logged and the image is left out; the rest of
//!   the document is generated normally.
//!
//! * [`LayoutError`] — raised by the pure layout engine; the assembler wraps
//!   it into [`ExportError::Layout`] together with the trip destination.
//!
//! * [`CollaboratorError`] — the planning assistant answered with an error
//!   or could not be reached. It puts the session into its error state and
//!   blocks export until a later question succeeds.
//!
//! Text sanitisation has no error type: `sanitize` is total.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the export pipeline.
#[derive(Debug, Error)]
pub enum ExportError {
    // ── Layout errors ─────────────────────────────────────────────────────
    /// An element could not be placed on any page.
    #[error("Layout failed for '{destination}': {source}")]
    Layout {
        destination: String,
        #[source]
        source: LayoutError,
    },

    // ── Serialisation errors ──────────────────────────────────────────────
    /// The PDF writer rejected the page list.
    #[error("PDF serialisation failed on page {page}: {detail}")]
    Render { page: usize, detail: String },

    /// The finished document could not be written to bytes.
    #[error("PDF serialisation failed: {0}")]
    Serialize(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF.
    #[error("Failed to write itinerary '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Control flow ──────────────────────────────────────────────────────
    /// The caller cancelled the export before it finished.
    #[error("Export cancelled during {stage}")]
    Cancelled { stage: &'static str },

    /// Another export of the same session is still running.
    #[error("An export for this session is already in progress")]
    ExportInProgress,

    /// The last assistant response was an error; there is nothing to export.
    #[error("Cannot export while the assistant is in an error state: {0}")]
    Blocked(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExportError {
    /// Short name of the pipeline stage the error belongs to, for logs.
    pub fn stage(&self) -> &'static str {
        match self {
            ExportError::Layout { .. } => "layout",
            ExportError::Render { .. } | ExportError::Serialize(_) => "render",
            ExportError::OutputWriteFailed { .. } => "save",
            ExportError::Cancelled { stage } => *stage,
            ExportError::ExportInProgress | ExportError::Blocked(_) => "start",
            ExportError::InvalidConfig(_) => "config",
            ExportError::Internal(_) => "internal",
        }
    }
}

/// Failures of the pure layout engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    /// A single element is taller than the usable height of a page.
    #[error(
        "element of height {height:.1}mm cannot fit on page {page_index} \
         (usable height {usable:.1}mm)"
    )]
    Oversized {
        page_index: usize,
        height: f32,
        usable: f32,
    },
}

impl LayoutError {
    pub fn page_index(&self) -> usize {
        match self {
            LayoutError::Oversized { page_index, .. } => *page_index,
        }
    }
}

/// A non-fatal error for a single gallery image.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ImageLoadFailure {
    /// The server answered with a non-success status.
    #[error("Image '{url}': HTTP {status}")]
    Http { url: String, status: u16 },

    /// Connection, TLS or body read failure.
    #[error("Image '{url}': download failed: {reason}")]
    Transport { url: String, reason: String },

    /// Fetch and decode together exceeded the per-image timeout.
    #[error("Image '{url}': timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// The bytes are not an image the decoder understands.
    #[error("Image '{url}': decode failed: {reason}")]
    Decode { url: String, reason: String },

    /// A file-system path where only remote URLs are accepted.
    #[error("Image '{url}': local paths are not allowed")]
    LocalPathRejected { url: String },

    /// Decoded fine but has a zero width or height.
    #[error("Image '{url}': invalid dimensions {width}x{height}")]
    InvalidDimensions { url: String, width: u32, height: u32 },
}

impl ImageLoadFailure {
    pub fn url(&self) -> &str {
        match self {
            ImageLoadFailure::Http { url, .. }
            | ImageLoadFailure::Transport { url, .. }
            | ImageLoadFailure::Timeout { url, .. }
            | ImageLoadFailure::Decode { url, .. }
            | ImageLoadFailure::LocalPathRejected { url }
            | ImageLoadFailure::InvalidDimensions { url, .. } => url,
        }
    }
}

/// The planning assistant did not produce an answer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollaboratorError {
    /// Non-success response; `message` is the backend's `error` field verbatim.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The backend could not be reached at all.
    #[error("Error al conectar con el servidor: {reason}")]
    Unreachable { reason: String },

    /// The backend answered 2xx with a body we cannot read.
    #[error("Invalid response from assistant: {reason}")]
    InvalidResponse { reason: String },

    /// An empty question was not sent.
    #[error("No se proporcionó una pregunta")]
    EmptyQuestion,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_error_display() {
        let e = ExportError::Layout {
            destination: "Roma".into(),
            source: LayoutError::Oversized {
                page_index: 2,
                height: 300.0,
                usable: 257.0,
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("Roma"), "got: {msg}");
        assert!(msg.contains("page 2"), "got: {msg}");
        assert_eq!(e.stage(), "layout");
    }

    #[test]
    fn cancelled_reports_stage() {
        let e = ExportError::Cancelled { stage: "images" };
        assert_eq!(e.stage(), "images");
        assert!(e.to_string().contains("images"));
    }

    #[test]
    fn image_failure_keeps_url() {
        let e = ImageLoadFailure::Timeout {
            url: "https://img.example/a.jpg".into(),
            secs: 15,
        };
        assert_eq!(e.url(), "https://img.example/a.jpg");
        assert!(e.to_string().contains("15s"));
    }

    #[test]
    fn rejected_is_verbatim() {
        let e = CollaboratorError::Rejected {
            status: 500,
            message: "API key de Gemini no configurada".into(),
        };
        assert_eq!(e.to_string(), "API key de Gemini no configurada");
    }
}
