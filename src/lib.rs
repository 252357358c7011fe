//! # itinerary-pdf
//!
//! Export a travel-planning conversation to a paginated, printable PDF.
//!
//! A planning assistant answers questions about a trip in loosely formatted
//! Spanish markdown, with emoji, and sends a few destination photos along.
//! This crate turns such a conversation into an A4 itinerary: banner, the
//! traveller's choices, a photo gallery, a summary of the first answer and
//! a numbered appendix of follow-up questions, with a page-numbered footer
//! on every page.
//!
//! ## Pipeline Overview
//!
//! ```text
//! TripRequest + history + photos
//!  │
//!  ├─ 1. Images    fetch → decode → re-encode, ≤3, sequential, per-image timeout
//!  ├─ 2. Sections  sanitise text, summarise the first answer, build Vec<Section>
//!  ├─ 3. Layout    pure pagination with an explicit cursor (mm, top-left)
//!  ├─ 4. Footers   "Page i of N" once N is known
//!  └─ 5. PDF       lopdf, base-14 Helvetica, JPEG XObjects
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use itinerary_pdf::{export_to_dir, Budget, ExportConfig, ExportRequest, Preference, TripRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let trip = TripRequest::new("Lisboa", "2026-11-02", Budget::Mid, Preference::Culture);
//!     let request = ExportRequest::new(trip, vec![], vec![]);
//!     let path = export_to_dir(&request, ".", &ExportConfig::default()).await?;
//!     println!("saved {}", path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `itinerary-pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! itinerary-pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assemble;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assemble::{
    artifact_name, build_sections, export, export_sync, export_to_dir, export_to_dir_with_cancel,
    export_with_cancel, save_to_dir, ExportRequest,
};
pub use client::{AssistantClient, HealthStatus, PlanRequest, PlanResponse, PlanningAssistant};
pub use config::{AssistantConfig, ExportConfig, ExportConfigBuilder, ItineraryPolicy};
pub use document::Section;
pub use error::{CollaboratorError, ExportError, ImageLoadFailure, LayoutError};
pub use model::{
    Budget, ConversationTurn, PhotoRef, Preference, SidePanel, TripExport, TripRequest,
};
pub use output::{ExportOutput, ExportStats, SavedExport};
pub use pipeline::extract::{summarize, Extractor, FullTextExtractor, SummaryExtractor};
pub use pipeline::fetch::{HttpImageFetcher, ImageFetcher};
pub use pipeline::layout::{layout, LayoutConfig, Page, PageConfig};
pub use pipeline::sanitize::sanitize;
pub use progress::{ExportProgressCallback, ExportState, NoopProgressCallback, ProgressCallback};
pub use session::PlanningSession;
pub use tokio_util::sync::CancellationToken;
