//! CLI binary for itinerary-pdf.
//!
//! A thin shim over the library crate: reads a trip snapshot, optionally
//! asks the planning assistant one more question, and saves the PDF.

use anyhow::{Context, Result};
use clap::Parser;
use itinerary_pdf::{
    AssistantClient, AssistantConfig, ExportConfig, ExportProgressCallback, ExportState,
    CancellationToken, ImageLoadFailure, ItineraryPolicy, PlanningSession, ProgressCallback,
    SavedExport, TripExport,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a bar over the gallery photos, then a spinner while
/// pages are laid out and written.
struct CliProgressCallback {
    bar: ProgressBar,
    pages: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading trip…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            pages: AtomicUsize::new(1),
        })
    }
}

impl ExportProgressCallback for CliProgressCallback {
    fn on_export_start(&self, destination: &str, photos: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos}/{len} photos  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(photos as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Images");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Exporting itinerary for {destination}…"))
        ));
    }

    fn on_image_start(&self, index: usize, total: usize, url: &str) {
        self.bar
            .set_message(format!("{}/{total} {}", index + 1, dim(url)));
    }

    fn on_image_loaded(&self, index: usize, url: &str) {
        self.bar
            .println(format!("  {} Photo {}  {}", green("✓"), index + 1, dim(url)));
        self.bar.inc(1);
    }

    fn on_image_failed(&self, index: usize, failure: &ImageLoadFailure) {
        let error = failure.to_string();
        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error
        };
        self.bar
            .println(format!("  {} Photo {}  {}", red("✗"), index + 1, red(&msg)));
        self.bar.inc(1);
    }

    fn on_state(&self, state: ExportState) {
        match state {
            ExportState::Accumulating => {
                self.bar.set_prefix("Layout");
                self.bar.set_message(format!(
                    "page {}",
                    self.pages.load(Ordering::SeqCst)
                ));
            }
            ExportState::Finalizing => {
                self.bar.set_prefix("Writing");
                self.bar.set_message("PDF…");
            }
            ExportState::Failed => self.bar.abandon(),
            ExportState::PageBreak | ExportState::Done => {}
        }
    }

    fn on_page_break(&self, page_index: usize) {
        self.pages.store(page_index + 1, Ordering::SeqCst);
    }

    fn on_export_complete(&self, pages: usize, images: usize, _bytes: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages, {} photos",
            green("✔"),
            bold(&pages.to_string()),
            images
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Export a saved conversation into the current directory
  itinerary-pdf trip.json

  # Export into a folder, full first answer instead of the summary
  itinerary-pdf trip.json -o exports/ --full-text

  # Ask the assistant first (automatic first question when the history is empty)
  itinerary-pdf trip.json --ask auto --backend-url http://localhost:5000

  # Ask a follow-up question, then export
  itinerary-pdf trip.json --ask "¿Qué platos típicos debo probar?"

  # Input file that points at photos on disk
  itinerary-pdf trip.json --local-photos

  # Machine-readable summary
  itinerary-pdf --json trip.json

INPUT FILE:
  {
    "datosViaje": {"destino": "Lisboa", "fecha": "2026-11-02",
                   "presupuesto": "medio", "preferencia": "cultura"},
    "historial": [{"pregunta": "...", "respuesta": "...", "fecha": "..."}],
    "fotos": [{"url": "https://..."}]
  }

  presupuesto: economico | medio | alto | premium
  preferencia: aventura | relajacion | cultura
"#;

/// Export travel-planning conversations to PDF itineraries.
#[derive(Parser, Debug)]
#[command(
    name = "itinerary-pdf",
    version,
    about = "Export travel-planning conversations to PDF itineraries",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// JSON file with the trip, the conversation history and the photos.
    input: PathBuf,

    /// Directory the PDF is written to.
    #[arg(short, long, env = "ITINERARY_PDF_OUTPUT_DIR", default_value = ".")]
    output: PathBuf,

    /// Render the whole first answer instead of the keyword summary.
    #[arg(long, env = "ITINERARY_PDF_FULL_TEXT")]
    full_text: bool,

    /// Per-photo fetch and decode timeout in seconds.
    #[arg(long, env = "ITINERARY_PDF_IMAGE_TIMEOUT", default_value_t = 15)]
    image_timeout: u64,

    /// Read photo references that are not http(s) URLs as local files.
    /// Off by default: photo references may come from the assistant.
    #[arg(long, env = "ITINERARY_PDF_LOCAL_PHOTOS")]
    local_photos: bool,

    /// Maximum number of gallery photos.
    #[arg(long, env = "ITINERARY_PDF_MAX_PHOTOS", default_value_t = 3)]
    max_photos: usize,

    /// Product name shown in the banner and the footer.
    #[arg(long, env = "ITINERARY_PDF_PRODUCT_NAME")]
    product_name: Option<String>,

    /// Ask the assistant this question before exporting ("auto" sends the
    /// automatic first question).
    #[arg(long, env = "ITINERARY_PDF_ASK")]
    ask: Option<String>,

    /// Base URL of the planning-assistant backend.
    #[arg(
        long,
        env = "ITINERARY_PDF_BACKEND_URL",
        default_value = "http://localhost:5000"
    )]
    backend_url: String,

    /// Print export stats as JSON on stdout.
    #[arg(long, env = "ITINERARY_PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "ITINERARY_PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ITINERARY_PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ITINERARY_PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Load the trip ────────────────────────────────────────────────────
    let raw = tokio::fs::read_to_string(&cli.input)
        .await
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    let snapshot: TripExport = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid trip file", cli.input.display()))?;
    let mut session = PlanningSession::from_snapshot(snapshot);

    // ── Optional assistant round-trip ────────────────────────────────────
    if let Some(ref question) = cli.ask {
        let client = AssistantClient::new(AssistantConfig::new(&cli.backend_url))
            .context("Failed to build assistant client")?;
        let answered = if question.eq_ignore_ascii_case("auto") {
            if !session.history().is_empty() {
                anyhow::bail!("--ask auto only applies to a conversation without history");
            }
            session.start(&client).await
        } else {
            session.ask(&client, question).await
        };
        let turn = answered.context("Assistant request failed")?;
        if !cli.quiet {
            eprintln!(
                "{} {}",
                cyan("◆"),
                dim(&format!("assistant answered ({} chars)", turn.answer.len()))
            );
        }
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExportProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run export ───────────────────────────────────────────────────────
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let SavedExport { path, output } = session
        .export_to_dir_with_cancel(&cli.output, &config, &cancel)
        .await
        .context("Export failed")?;

    if cli.json {
        let report = serde_json::json!({
            "path": path,
            "stats": output.stats,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise stats")?
        );
    } else if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {} pages  {}/{} photos  {}ms  →  {}",
            if stats.image_failures.is_empty() {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.pages,
            stats.images_embedded,
            stats.photos_attempted,
            stats.total_duration_ms,
            bold(&path.display().to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `ExportConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExportConfig> {
    let policy = if cli.full_text {
        ItineraryPolicy::FullText
    } else {
        ItineraryPolicy::Summary
    };

    let mut builder = ExportConfig::builder()
        .image_timeout_secs(cli.image_timeout)
        .max_photos(cli.max_photos)
        .allow_local_photos(cli.local_photos)
        .itinerary_policy(policy);

    if let Some(ref name) = cli.product_name {
        builder = builder.product_name(name.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
