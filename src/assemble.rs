//! Export entry points: trip snapshot → PDF.
//!
//! Runs the pipeline in a fixed order: resolve photos, build the section
//! list, lay it out, stamp footers, serialise. Only the photo step does I/O;
//! everything after it works on values already in memory.
//!
//! [`export`] returns the document in memory. [`export_to_dir`] also saves
//! it under its artifact name, atomically, so a failed or cancelled export
//! never leaves a partial file behind.

use crate::config::ExportConfig;
use crate::document::{
    GallerySection, KeyValueSection, QaPair, QaSection, Section, TextBlockSection, TitleSection,
};
use crate::error::ExportError;
use crate::model::{ConversationTurn, PhotoRef, TripExport, TripRequest};
use crate::output::{ExportOutput, ExportStats, SavedExport};
use crate::pipeline::fetch::{HttpImageFetcher, ImageFetcher};
use crate::pipeline::footer::{stamp_footers, FooterSpec};
use crate::pipeline::image::{EmbeddedImage, GalleryOutcome, ImageEmbedder};
use crate::pipeline::layout::layout_with;
use crate::pipeline::render::{write_pdf, PdfMetadata};
use crate::pipeline::sanitize::sanitize;
use crate::progress::{ExportProgressCallback, ExportState, NoopProgressCallback};
use crate::prompts::{APPENDIX_HEADING, GALLERY_HEADING, ITINERARY_HEADING, SELECTIONS_HEADING};
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Everything one export reads.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub trip: TripRequest,
    /// The first turn is the primary itinerary; later turns form the appendix.
    pub history: Vec<ConversationTurn>,
    pub photos: Vec<PhotoRef>,
    /// Drives the artifact name, the footer date and the PDF creation date.
    pub exported_at: DateTime<Utc>,
}

impl ExportRequest {
    /// A request stamped with the current time.
    pub fn new(trip: TripRequest, history: Vec<ConversationTurn>, photos: Vec<PhotoRef>) -> Self {
        Self {
            trip,
            history,
            photos,
            exported_at: Utc::now(),
        }
    }

    pub fn with_exported_at(mut self, at: DateTime<Utc>) -> Self {
        self.exported_at = at;
        self
    }
}

impl From<TripExport> for ExportRequest {
    fn from(snapshot: TripExport) -> Self {
        Self::new(snapshot.trip, snapshot.history, snapshot.photos)
    }
}

/// Export a trip to an in-memory PDF.
///
/// Photos that cannot be loaded are skipped (see
/// [`ExportStats::image_failures`]); everything else that goes wrong is
/// fatal.
pub async fn export(
    request: &ExportRequest,
    config: &ExportConfig,
) -> Result<ExportOutput, ExportError> {
    export_with_cancel(request, config, &CancellationToken::new()).await
}

/// Like [`export`], returning [`ExportError::Cancelled`] once `cancel` fires.
///
/// Cancellation is checked while photos are fetched and between the later
/// stages.
pub async fn export_with_cancel(
    request: &ExportRequest,
    config: &ExportConfig,
    cancel: &CancellationToken,
) -> Result<ExportOutput, ExportError> {
    let progress = progress_of(config);
    match run_export(request, config, cancel, progress).await {
        Ok(output) => {
            report_done(&output, progress);
            Ok(output)
        }
        Err(e) => Err(report_failure(request, e, progress)),
    }
}

fn progress_of(config: &ExportConfig) -> &dyn ExportProgressCallback {
    config
        .progress_callback
        .as_deref()
        .unwrap_or(&NoopProgressCallback)
}

fn report_done(output: &ExportOutput, progress: &dyn ExportProgressCallback) {
    progress.on_state(ExportState::Done);
    progress.on_export_complete(
        output.stats.pages,
        output.stats.images_embedded,
        output.stats.pdf_bytes,
    );
}

/// Log a fatal error once and move the export into its terminal state.
fn report_failure(
    request: &ExportRequest,
    e: ExportError,
    progress: &dyn ExportProgressCallback,
) -> ExportError {
    let page_index = match &e {
        ExportError::Layout { source, .. } => Some(source.page_index()),
        ExportError::Render { page, .. } => Some(*page),
        _ => None,
    };
    error!(
        stage = e.stage(),
        destination = %request.trip.destination,
        page_index = ?page_index,
        error = %e,
        "Export failed"
    );
    progress.on_state(ExportState::Failed);
    e
}

async fn run_export(
    request: &ExportRequest,
    config: &ExportConfig,
    cancel: &CancellationToken,
    progress: &dyn ExportProgressCallback,
) -> Result<ExportOutput, ExportError> {
    let total_start = Instant::now();
    let destination = sanitize(&request.trip.destination);
    info!(
        destination = %destination,
        turns = request.history.len(),
        photos = request.photos.len(),
        "Starting export"
    );

    // ── Step 1: Resolve photo source ─────────────────────────────────────
    let fetcher = resolve_fetcher(config)?;
    let embedder = ImageEmbedder::new(fetcher, config.image_display_width, config.image_timeout());

    // ── Step 2: Resolve gallery photos ───────────────────────────────────
    progress.on_export_start(&destination, request.photos.len().min(config.max_photos));
    progress.on_state(ExportState::Accumulating);

    let image_start = Instant::now();
    let GalleryOutcome {
        images,
        failures,
        attempted,
    } = embedder
        .embed_gallery(&request.photos, config.max_photos, cancel, progress)
        .await?;
    let image_duration_ms = image_start.elapsed().as_millis() as u64;
    let images_embedded = images.len();
    info!(
        embedded = images_embedded,
        failed = failures.len(),
        "Resolved gallery in {}ms",
        image_duration_ms
    );

    // ── Step 3: Build the section list ───────────────────────────────────
    let sections = build_sections(request, images, config);
    debug!(sections = sections.len(), "Built document");
    ensure_live(cancel, "layout")?;

    // ── Step 4: Paginate ─────────────────────────────────────────────────
    let render_start = Instant::now();
    let pages = layout_with(&sections, &config.layout, |page_index| {
        progress.on_state(ExportState::PageBreak);
        progress.on_page_break(page_index);
        progress.on_state(ExportState::Accumulating);
    })
    .map_err(|source| ExportError::Layout {
        destination: destination.clone(),
        source,
    })?;

    // ── Step 5: Stamp footers ────────────────────────────────────────────
    progress.on_state(ExportState::Finalizing);
    let footer = FooterSpec::new(
        sanitize(&config.product_name),
        request.exported_at.date_naive(),
    );
    let pages = stamp_footers(pages, &footer, &config.layout.page);

    // ── Step 6: Serialise ────────────────────────────────────────────────
    let meta = PdfMetadata {
        title: format!("Itinerario de viaje: {destination}"),
        producer: config.product_name.clone(),
        created_at: request.exported_at,
    };
    let layout_config = config.layout.clone();
    let (pages, pdf) = tokio::task::spawn_blocking(move || {
        let pdf = write_pdf(&pages, &meta, &layout_config)?;
        Ok::<_, ExportError>((pages, pdf))
    })
    .await
    .map_err(|e| ExportError::Internal(format!("PDF writer task panicked: {e}")))??;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    ensure_live(cancel, "render")?;

    // ── Step 7: Compute stats ────────────────────────────────────────────
    let stats = ExportStats {
        pages: pages.len(),
        photos_supplied: request.photos.len(),
        photos_attempted: attempted,
        images_embedded,
        image_failures: failures,
        follow_up_questions: request.history.len().saturating_sub(1),
        pdf_bytes: pdf.len(),
        image_duration_ms,
        render_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        destination = %destination,
        pages = stats.pages,
        images = stats.images_embedded,
        "Export complete in {}ms",
        stats.total_duration_ms
    );
    Ok(ExportOutput {
        file_name: artifact_name(&request.trip.destination, request.exported_at),
        pdf,
        pages,
        stats,
    })
}

/// Export and save the PDF into `dir` under its artifact name.
///
/// Uses an atomic write (temp file in `dir` + rename) to prevent partial
/// files. Returns the path of the saved file.
pub async fn export_to_dir(
    request: &ExportRequest,
    dir: impl AsRef<Path>,
    config: &ExportConfig,
) -> Result<PathBuf, ExportError> {
    export_to_dir_with_cancel(request, dir, config, &CancellationToken::new())
        .await
        .map(|saved| saved.path)
}

/// Like [`export_to_dir`], cancellable up to the moment the file is written.
///
/// The export only reaches [`ExportState::Done`] once the file is on disk;
/// a failed save is reported like any other fatal error.
pub async fn export_to_dir_with_cancel(
    request: &ExportRequest,
    dir: impl AsRef<Path>,
    config: &ExportConfig,
    cancel: &CancellationToken,
) -> Result<SavedExport, ExportError> {
    let progress = progress_of(config);
    let saved = async {
        let output = run_export(request, config, cancel, progress).await?;
        ensure_live(cancel, "save")?;
        let path = save_to_dir(&output, dir).await?;
        Ok::<_, ExportError>(SavedExport { path, output })
    }
    .await;

    match saved {
        Ok(saved) => {
            report_done(&saved.output, progress);
            Ok(saved)
        }
        Err(e) => Err(report_failure(request, e, progress)),
    }
}

/// Atomically write an already finished export into `dir`.
///
/// Reports nothing to the progress callback; use [`export_to_dir`] to export
/// and save as one tracked operation.
pub async fn save_to_dir(
    output: &ExportOutput,
    dir: impl AsRef<Path>,
) -> Result<PathBuf, ExportError> {
    let dir = dir.as_ref().to_path_buf();
    let path = dir.join(&output.file_name);

    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ExportError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;

    let pdf = output.pdf.clone();
    let target = path.clone();
    tokio::task::spawn_blocking(move || write_atomically(&dir, &target, &pdf))
        .await
        .map_err(|e| ExportError::Internal(format!("Save task panicked: {e}")))??;

    info!(path = %path.display(), bytes = output.pdf.len(), "Saved itinerary");
    Ok(path)
}

fn write_atomically(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let fail = |source: std::io::Error| ExportError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(fail)?;
    tmp.write_all(bytes).map_err(fail)?;
    tmp.as_file().sync_all().map_err(fail)?;
    tmp.persist(path).map_err(|e| fail(e.error))?;
    Ok(())
}

/// Synchronous wrapper around [`export`].
///
/// Creates a temporary tokio runtime internally.
pub fn export_sync(
    request: &ExportRequest,
    config: &ExportConfig,
) -> Result<ExportOutput, ExportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExportError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(export(request, config))
}

/// `Itinerary_<destination>_<millis>.pdf`, safe to use as a file name.
pub fn artifact_name(destination: &str, exported_at: DateTime<Utc>) -> String {
    let cleaned: String = sanitize(destination)
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = if cleaned.trim_matches(['_', '.']).is_empty() {
        "destino".to_string()
    } else {
        cleaned
    };
    format!("Itinerary_{cleaned}_{}.pdf", exported_at.timestamp_millis())
}

/// The ordered section list for one export.
///
/// `images` are the already resolved gallery photos; the gallery is left
/// out when there are none.
pub fn build_sections(
    request: &ExportRequest,
    images: Vec<EmbeddedImage>,
    config: &ExportConfig,
) -> Vec<Section> {
    let trip = &request.trip;
    let mut sections = vec![
        Section::Title(TitleSection {
            product: sanitize(&config.product_name),
            tagline: sanitize(&config.tagline),
            destination: sanitize(&trip.destination),
        }),
        Section::KeyValue(
            KeyValueSection::new(SELECTIONS_HEADING)
                .pair("Fecha", sanitize(&trip.date))
                .pair("Presupuesto", trip.budget.label())
                .pair("Preferencia", trip.preference.label()),
        ),
    ];

    if !images.is_empty() {
        sections.push(Section::Gallery(GallerySection {
            heading: GALLERY_HEADING.to_string(),
            images,
        }));
    }

    if let Some(first) = request.history.first() {
        let mut itinerary = config.resolved_extractor().extract(&first.answer);
        match itinerary.first_mut() {
            Some(Section::TextBlock(block)) if block.heading.is_none() => {
                block.heading = Some(ITINERARY_HEADING.to_string());
            }
            _ => itinerary.insert(
                0,
                Section::TextBlock(TextBlockSection::new("").with_heading(ITINERARY_HEADING)),
            ),
        }
        sections.extend(itinerary);
    }

    if request.history.len() > 1 {
        sections.push(Section::Qa(QaSection {
            heading: APPENDIX_HEADING.to_string(),
            pairs: request.history[1..]
                .iter()
                .map(|turn| QaPair {
                    question: sanitize(&turn.question),
                    answer: sanitize(&turn.answer),
                })
                .collect(),
        }));
    }

    sections
}

fn resolve_fetcher(config: &ExportConfig) -> Result<Arc<dyn ImageFetcher>, ExportError> {
    if let Some(ref fetcher) = config.fetcher {
        return Ok(Arc::clone(fetcher));
    }
    let fetcher = HttpImageFetcher::new(config.image_timeout())
        .map_err(|e| ExportError::Internal(format!("Failed to build HTTP client: {e}")))?
        .with_local_files(config.allow_local_photos);
    Ok(Arc::new(fetcher))
}

fn ensure_live(cancel: &CancellationToken, stage: &'static str) -> Result<(), ExportError> {
    if cancel.is_cancelled() {
        return Err(ExportError::Cancelled { stage });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImageLoadFailure;
    use crate::model::{Budget, Preference};
    use crate::pipeline::extract::{Extractor, SUMMARY_HEADER};
    use crate::pipeline::image::test_support::{png, FakeFetcher};
    use crate::progress::test_support::RecordingCallback;
    use crate::progress::ProgressCallback;
    use chrono::TimeZone;

    fn request(history: Vec<ConversationTurn>, photos: Vec<PhotoRef>) -> ExportRequest {
        let trip = TripRequest::new("Cusco", "2026-07-10", Budget::Mid, Preference::Adventure);
        ExportRequest::new(trip, history, photos)
            .with_exported_at(Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap())
    }

    fn turns() -> Vec<ConversationTurn> {
        vec![
            ConversationTurn::new(
                "Quiero planificar un viaje a Cusco",
                "**CLIMA ACTUAL:** 12 grados, despejado. ALOJAMIENTO: Hostal en San Blas.",
                "",
            ),
            ConversationTurn::new("¿Y el tren?", "Reserva el *Vistadome* con tiempo.", ""),
        ]
    }

    fn config_with(fetcher: FakeFetcher) -> (ExportConfig, Arc<RecordingCallback>) {
        let recorder = Arc::new(RecordingCallback::default());
        let config = ExportConfig::builder()
            .fetcher(Arc::new(fetcher))
            .progress_callback(recorder.clone() as ProgressCallback)
            .build()
            .unwrap();
        (config, recorder)
    }

    #[test]
    fn test_section_order() {
        let config = ExportConfig::default();
        let sections = build_sections(&request(turns(), vec![]), vec![], &config);
        let kinds: Vec<&str> = sections.iter().map(Section::kind).collect();
        assert_eq!(kinds, vec!["title", "key_value", "text", "qa"]);

        match &sections[1] {
            Section::KeyValue(kv) => {
                assert_eq!(kv.heading, SELECTIONS_HEADING);
                assert_eq!(kv.pairs[1].1, "Medio ($500 - $1,500)");
                assert_eq!(kv.pairs[2].1, "Aventura");
            }
            other => panic!("unexpected {other:?}"),
        }
        match &sections[2] {
            Section::TextBlock(block) => {
                assert_eq!(block.heading.as_deref(), Some(ITINERARY_HEADING));
                assert!(block.text.starts_with(SUMMARY_HEADER));
            }
            other => panic!("unexpected {other:?}"),
        }
        match &sections[3] {
            Section::Qa(qa) => {
                assert_eq!(qa.pairs.len(), 1);
                assert_eq!(qa.pairs[0].answer, "Reserva el Vistadome con tiempo.");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_empty_history_has_no_itinerary_or_appendix() {
        let sections = build_sections(&request(vec![], vec![]), vec![], &ExportConfig::default());
        let kinds: Vec<&str> = sections.iter().map(Section::kind).collect();
        assert_eq!(kinds, vec!["title", "key_value"]);
    }

    #[test]
    fn test_custom_extractor_gets_heading() {
        struct Headed;
        impl Extractor for Headed {
            fn extract(&self, text: &str) -> Vec<Section> {
                vec![Section::TextBlock(
                    TextBlockSection::new(text).with_heading("Propio"),
                )]
            }
        }
        let config = ExportConfig::builder()
            .extractor(Arc::new(Headed))
            .build()
            .unwrap();
        let sections = build_sections(&request(turns()[..1].to_vec(), vec![]), vec![], &config);
        match (&sections[2], &sections[3]) {
            (Section::TextBlock(a), Section::TextBlock(b)) => {
                assert_eq!(a.heading.as_deref(), Some(ITINERARY_HEADING));
                assert_eq!(b.heading.as_deref(), Some("Propio"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_artifact_name() {
        let at = Utc.timestamp_millis_opt(1_760_000_000_123).unwrap();
        assert_eq!(
            artifact_name("São Paulo", at),
            "Itinerary_São_Paulo_1760000000123.pdf"
        );
        assert_eq!(
            artifact_name("../etc/passwd", at),
            "Itinerary_.._etc_passwd_1760000000123.pdf"
        );
        assert_eq!(artifact_name("  ", at), "Itinerary_destino_1760000000123.pdf");
    }

    #[tokio::test]
    async fn test_export_reports_states_and_stats() {
        let fetcher = FakeFetcher::default()
            .with("a", Ok(png(40, 30)))
            .with(
                "b",
                Err(ImageLoadFailure::Http {
                    url: "b".into(),
                    status: 500,
                }),
            );
        let (config, recorder) = config_with(fetcher);
        let req = request(turns(), vec![PhotoRef::new("a"), PhotoRef::new("b")]);

        let output = export(&req, &config).await.unwrap();

        assert!(output.pdf.starts_with(b"%PDF"));
        assert_eq!(output.file_name, artifact_name("Cusco", req.exported_at));
        assert_eq!(output.stats.pages, output.pages.len());
        assert_eq!(output.stats.photos_attempted, 2);
        assert_eq!(output.stats.images_embedded, 1);
        assert_eq!(output.stats.image_failures.len(), 1);
        assert_eq!(output.stats.follow_up_questions, 1);

        let events = recorder.events();
        assert_eq!(events.first().map(String::as_str), Some("start Cusco 2"));
        assert!(events.contains(&"image 1 failed".to_string()));
        let complete = format!("complete {} 1", output.pages.len());
        assert_eq!(
            events[events.len() - 3..],
            ["state finalizing".to_string(), "state done".to_string(), complete]
        );
    }

    #[tokio::test]
    async fn test_cancelled_export_reports_failure() {
        let (config, recorder) = config_with(FakeFetcher::default().with("a", Ok(png(4, 4))));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = export_with_cancel(&request(turns(), vec![PhotoRef::new("a")]), &config, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, ExportError::Cancelled { .. }), "{err}");
        assert_eq!(recorder.events().last().map(String::as_str), Some("state failed"));
    }

    #[tokio::test]
    async fn test_export_to_dir_leaves_only_the_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let (config, _) = config_with(FakeFetcher::default());
        let req = request(turns(), vec![]);

        let path = export_to_dir(&req, dir.path(), &config).await.unwrap();

        assert_eq!(path, dir.path().join(artifact_name("Cusco", req.exported_at)));
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_save_failure_ends_in_failed_state() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let (config, recorder) = config_with(FakeFetcher::default());

        let err = export_to_dir(&request(turns(), vec![]), &blocker, &config)
            .await
            .unwrap_err();

        assert!(matches!(err, ExportError::OutputWriteFailed { .. }), "{err}");
        assert_eq!(err.stage(), "save");
        let events = recorder.events();
        assert_eq!(events.last().map(String::as_str), Some("state failed"));
        assert!(!events.iter().any(|e| e == "state done" || e.starts_with("complete")));
    }

    #[tokio::test]
    async fn test_export_to_dir_completes_after_the_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let (config, recorder) = config_with(FakeFetcher::default());

        let saved = export_to_dir_with_cancel(
            &request(turns(), vec![]),
            dir.path(),
            &config,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(saved.path.exists());
        assert_eq!(std::fs::read(&saved.path).unwrap(), saved.output.pdf);
        let events = recorder.events();
        let tail = &events[events.len() - 2..];
        assert_eq!(tail[0], "state done");
        assert!(tail[1].starts_with("complete 1 "), "{tail:?}");
    }

    #[tokio::test]
    async fn test_cancelled_export_to_dir_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (config, recorder) = config_with(FakeFetcher::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = export_to_dir_with_cancel(&request(turns(), vec![]), dir.path(), &config, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, ExportError::Cancelled { .. }), "{err}");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(recorder.events().last().map(String::as_str), Some("state failed"));
    }

    #[test]
    fn test_export_sync() {
        let (config, _) = config_with(FakeFetcher::default());
        let output = export_sync(&request(vec![], vec![]), &config).unwrap();
        assert_eq!(output.page_count(), 1);
    }
}
