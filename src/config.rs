//! Configuration types for itinerary export.
//!
//! All export behaviour is controlled through [`ExportConfig`], built via its
//! [`ExportConfigBuilder`]. The assistant client has its own, much smaller
//! [`AssistantConfig`].

use crate::error::ExportError;
use crate::pipeline::extract::{Extractor, FullTextExtractor, SummaryExtractor};
use crate::pipeline::fetch::ImageFetcher;
use crate::pipeline::layout::{LayoutConfig, PageConfig, Typography};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for one itinerary export.
///
/// Built via [`ExportConfig::builder()`] or using [`ExportConfig::default()`].
///
/// # Example
/// ```rust
/// use itinerary_pdf::{ExportConfig, ItineraryPolicy};
///
/// let config = ExportConfig::builder()
///     .max_photos(2)
///     .image_timeout_secs(5)
///     .itinerary_policy(ItineraryPolicy::FullText)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExportConfig {
    /// Page geometry and fixed typography. Default: A4, 20 mm margins.
    pub layout: LayoutConfig,

    /// Width photos are drawn at, in mm. Default: 170 (the A4 content width).
    pub image_display_width: f32,

    /// Photos attempted, in order. Later photos are never used as
    /// replacements for failed ones. Default: 3.
    pub max_photos: usize,

    /// Budget for fetching and decoding one photo, in seconds. Default: 15.
    pub image_timeout_secs: u64,

    /// How the first answer is rendered. Default: [`ItineraryPolicy::Summary`].
    pub itinerary_policy: ItineraryPolicy,

    /// Banner text and footer product name. Default: "ViajeIA".
    pub product_name: String,

    /// Line under the banner. Default: "Tu Asistente Personal de Viajes".
    pub tagline: String,

    /// Let the built-in fetcher read non-URL photo references from disk.
    /// Default: false. Ignored when `fetcher` is set.
    pub allow_local_photos: bool,

    /// Photo source. If None, an HTTP fetcher is built from `image_timeout_secs`.
    pub fetcher: Option<Arc<dyn ImageFetcher>>,

    /// Overrides `itinerary_policy` when set.
    pub extractor: Option<Arc<dyn Extractor>>,

    /// Optional progress callback. Default: None (no-op).
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            image_display_width: 170.0,
            max_photos: 3,
            image_timeout_secs: 15,
            itinerary_policy: ItineraryPolicy::default(),
            product_name: "ViajeIA".to_string(),
            tagline: "Tu Asistente Personal de Viajes".to_string(),
            allow_local_photos: false,
            fetcher: None,
            extractor: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("page", &self.layout.page)
            .field("image_display_width", &self.image_display_width)
            .field("max_photos", &self.max_photos)
            .field("image_timeout_secs", &self.image_timeout_secs)
            .field("itinerary_policy", &self.itinerary_policy)
            .field("product_name", &self.product_name)
            .field("tagline", &self.tagline)
            .field("allow_local_photos", &self.allow_local_photos)
            .field("fetcher", &self.fetcher.as_ref().map(|_| "<dyn ImageFetcher>"))
            .field("extractor", &self.extractor.as_ref().map(|_| "<dyn Extractor>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExportProgressCallback>"),
            )
            .finish()
    }
}

impl ExportConfig {
    /// Create a new builder for `ExportConfig`.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }

    /// The extractor used for the first answer.
    pub fn resolved_extractor(&self) -> Arc<dyn Extractor> {
        match (&self.extractor, self.itinerary_policy) {
            (Some(extractor), _) => Arc::clone(extractor),
            (None, ItineraryPolicy::Summary) => Arc::new(SummaryExtractor),
            (None, ItineraryPolicy::FullText) => Arc::new(FullTextExtractor),
        }
    }

    fn validate(&self) -> Result<(), ExportError> {
        let page = &self.layout.page;
        let usable_h = page.usable_height();
        let usable_w = page.usable_width();
        if usable_h <= 0.0 || usable_w <= 0.0 {
            return Err(ExportError::InvalidConfig(format!(
                "Margins leave no content area ({usable_w:.1}×{usable_h:.1} mm)"
            )));
        }
        if page.footer_offset <= 0.0 || page.footer_offset >= page.margin_bottom {
            return Err(ExportError::InvalidConfig(format!(
                "Footer offset must be inside the bottom margin (0–{} mm), got {}",
                page.margin_bottom, page.footer_offset
            )));
        }
        for style in self.layout.typography.text_styles() {
            if style.size_pt <= 0.0 || style.advance <= 0.0 || style.advance > usable_h {
                return Err(ExportError::InvalidConfig(format!(
                    "Line advance {} mm does not fit the usable height {usable_h} mm",
                    style.advance
                )));
            }
        }
        if self.image_display_width <= 0.0 || self.image_display_width > usable_w {
            return Err(ExportError::InvalidConfig(format!(
                "Image width must be 0–{usable_w} mm, got {}",
                self.image_display_width
            )));
        }
        if self.product_name.trim().is_empty() {
            return Err(ExportError::InvalidConfig(
                "Product name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ExportConfig`].
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl fmt::Debug for ExportConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExportConfigBuilder").field(&self.config).finish()
    }
}

impl ExportConfigBuilder {
    pub fn page(mut self, page: PageConfig) -> Self {
        self.config.layout.page = page;
        self
    }

    pub fn typography(mut self, typography: Typography) -> Self {
        self.config.layout.typography = typography;
        self
    }

    pub fn image_display_width(mut self, mm: f32) -> Self {
        self.config.image_display_width = mm;
        self
    }

    pub fn max_photos(mut self, n: usize) -> Self {
        self.config.max_photos = n.min(10);
        self
    }

    pub fn image_timeout_secs(mut self, secs: u64) -> Self {
        self.config.image_timeout_secs = secs.clamp(1, 300);
        self
    }

    pub fn itinerary_policy(mut self, policy: ItineraryPolicy) -> Self {
        self.config.itinerary_policy = policy;
        self
    }

    pub fn product_name(mut self, name: impl Into<String>) -> Self {
        self.config.product_name = name.into();
        self
    }

    pub fn tagline(mut self, tagline: impl Into<String>) -> Self {
        self.config.tagline = tagline.into();
        self
    }

    pub fn allow_local_photos(mut self, allow: bool) -> Self {
        self.config.allow_local_photos = allow;
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.config.fetcher = Some(fetcher);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExportConfig, ExportError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the primary itinerary (the first answer) is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItineraryPolicy {
    /// Keyword bullets, or the opening sentences. (default)
    #[default]
    Summary,
    /// The whole answer, sanitised.
    FullText,
}

// ── Assistant client ─────────────────────────────────────────────────────

/// Connection settings for the planning-assistant backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Base URL without trailing slash. Default: `http://localhost:5000`.
    pub base_url: String,

    /// Per-request timeout in seconds. Default: 60.
    ///
    /// Answers are generated by an LLM behind the backend and routinely take
    /// tens of seconds.
    pub timeout_secs: u64,

    /// Retries after a transport failure or 5xx. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_secs: 60,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

impl AssistantConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ExportConfig::builder().build().unwrap();
        assert_eq!(config.max_photos, 3);
        assert_eq!(config.image_display_width, 170.0);
        assert_eq!(config.itinerary_policy, ItineraryPolicy::Summary);
        assert_eq!(config.image_timeout(), Duration::from_secs(15));
        assert!(!config.allow_local_photos);
    }

    #[test]
    fn setters_clamp() {
        let config = ExportConfig::builder()
            .image_timeout_secs(0)
            .max_photos(50)
            .build()
            .unwrap();
        assert_eq!(config.image_timeout_secs, 1);
        assert_eq!(config.max_photos, 10);
    }

    #[test]
    fn rejects_line_taller_than_page() {
        let page = PageConfig {
            margin_top: 140.0,
            margin_bottom: 150.0,
            ..PageConfig::default()
        };
        let err = ExportConfig::builder().page(page).build().unwrap_err();
        assert!(matches!(err, ExportError::InvalidConfig(_)), "{err}");
    }

    #[test]
    fn rejects_image_wider_than_content() {
        let err = ExportConfig::builder()
            .image_display_width(180.0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Image width"));
    }

    #[test]
    fn rejects_footer_inside_content() {
        let page = PageConfig {
            footer_offset: 25.0,
            ..PageConfig::default()
        };
        assert!(ExportConfig::builder().page(page).build().is_err());
    }

    #[test]
    fn policy_selects_extractor() {
        let summary = ExportConfig::default().resolved_extractor();
        let sections = summary.extract("Hola.");
        assert_eq!(sections.len(), 1);

        let config = ExportConfig::builder()
            .itinerary_policy(ItineraryPolicy::FullText)
            .build()
            .unwrap();
        match &config.resolved_extractor().extract("**Hola**")[0] {
            crate::document::Section::TextBlock(b) => assert_eq!(b.text, "Hola"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn assistant_base_url_trimmed() {
        let config = AssistantConfig::new("http://planner.local:5000/");
        assert_eq!(config.base_url, "http://planner.local:5000");
    }
}
