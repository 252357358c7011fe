//! Resolving gallery photos into embeddable images.
//!
//! Each photo goes through fetch → decode → measure → re-encode. The whole
//! chain for one photo is bounded by the per-image timeout; decode and
//! re-encode are CPU-bound and run on the blocking pool. Photos are
//! resolved one after another, never concurrently.

use crate::error::{ExportError, ImageLoadFailure};
use crate::model::PhotoRef;
use crate::pipeline::encode::{encode_jpeg, EncodedJpeg};
use crate::pipeline::fetch::ImageFetcher;
use crate::progress::ExportProgressCallback;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A photo ready for layout and serialisation.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub url: String,
    /// Intrinsic size of the source image.
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// Display size at the fixed display width, before any page fitting.
    pub display_width: f32,
    pub display_height: f32,
    /// Baseline RGB JPEG of the (possibly downsampled) pixels.
    pub jpeg: Arc<[u8]>,
    pub jpeg_width: u32,
    pub jpeg_height: u32,
}

/// What happened to the attempted photos of one gallery.
#[derive(Debug, Clone, Default)]
pub struct GalleryOutcome {
    /// Photos that resolved, in their original order.
    pub images: Vec<EmbeddedImage>,
    pub failures: Vec<ImageLoadFailure>,
    pub attempted: usize,
}

/// Display height for an image of `w`×`h` pixels drawn `display_width` wide.
pub fn scaled_height(display_width: f32, w: u32, h: u32) -> f32 {
    display_width * (h as f32 / w as f32)
}

/// Resolves [`PhotoRef`]s through an [`ImageFetcher`].
#[derive(Clone)]
pub struct ImageEmbedder {
    fetcher: Arc<dyn ImageFetcher>,
    display_width: f32,
    timeout: Duration,
}

impl ImageEmbedder {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, display_width: f32, timeout: Duration) -> Self {
        Self {
            fetcher,
            display_width,
            timeout,
        }
    }

    /// Fetch, decode and re-encode one photo.
    pub async fn embed(&self, photo: &PhotoRef) -> Result<EmbeddedImage, ImageLoadFailure> {
        let url = photo.url.clone();
        match tokio::time::timeout(self.timeout, self.embed_inner(photo)).await {
            Ok(result) => result,
            Err(_) => Err(ImageLoadFailure::Timeout {
                url,
                secs: self.timeout.as_secs(),
            }),
        }
    }

    async fn embed_inner(&self, photo: &PhotoRef) -> Result<EmbeddedImage, ImageLoadFailure> {
        let bytes = self.fetcher.fetch(&photo.url).await?;

        let url = photo.url.clone();
        let decoded = tokio::task::spawn_blocking(move || decode_and_encode(&url, &bytes))
            .await
            .map_err(|e| ImageLoadFailure::Decode {
                url: photo.url.clone(),
                reason: format!("decode task panicked: {e}"),
            })??;

        let (w, h, jpeg) = decoded;
        let display_height = scaled_height(self.display_width, w, h);
        debug!(
            url = %photo.url,
            w, h, display_height, "Resolved photo"
        );

        Ok(EmbeddedImage {
            url: photo.url.clone(),
            pixel_width: w,
            pixel_height: h,
            display_width: self.display_width,
            display_height,
            jpeg_width: jpeg.width,
            jpeg_height: jpeg.height,
            jpeg: Arc::from(jpeg.data),
        })
    }

    /// Resolve the first `max_photos` photos in order.
    ///
    /// Failures are logged and skipped; a failed photo is not replaced by a
    /// later one. Returns [`ExportError::Cancelled`] if `cancel` fires.
    pub async fn embed_gallery(
        &self,
        photos: &[PhotoRef],
        max_photos: usize,
        cancel: &CancellationToken,
        progress: &dyn ExportProgressCallback,
    ) -> Result<GalleryOutcome, ExportError> {
        let attempted = &photos[..photos.len().min(max_photos)];
        if photos.len() > attempted.len() {
            info!(
                supplied = photos.len(),
                attempted = attempted.len(),
                "Ignoring photos beyond the gallery cap"
            );
        }

        let results: Vec<Result<EmbeddedImage, ImageLoadFailure>> =
            stream::iter(attempted.iter().enumerate())
                .then(|(idx, photo)| async move {
                if cancel.is_cancelled() {
                    return Err(ExportError::Cancelled { stage: "images" });
                }
                progress.on_image_start(idx, attempted.len(), &photo.url);
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return Err(ExportError::Cancelled { stage: "images" });
                    }
                    outcome = self.embed(photo) => outcome,
                };
                match &outcome {
                    Ok(_) => progress.on_image_loaded(idx, &photo.url),
                    Err(failure) => {
                        warn!(url = %photo.url, error = %failure, "Skipping photo");
                        progress.on_image_failed(idx, failure);
                    }
                }
                Ok(outcome)
            })
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_, _>>()?;

        let mut gallery = GalleryOutcome {
            attempted: attempted.len(),
            ..GalleryOutcome::default()
        };
        for result in results {
            match result {
                Ok(image) => gallery.images.push(image),
                Err(failure) => gallery.failures.push(failure),
            }
        }
        Ok(gallery)
    }
}

fn decode_and_encode(
    url: &str,
    bytes: &[u8],
) -> Result<(u32, u32, EncodedJpeg), ImageLoadFailure> {
    let img = image::load_from_memory(bytes).map_err(|e| ImageLoadFailure::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return Err(ImageLoadFailure::InvalidDimensions {
            url: url.to_string(),
            width: w,
            height: h,
        });
    }
    let jpeg = encode_jpeg(&img).map_err(|e| ImageLoadFailure::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    Ok((w, h, jpeg))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// PNG bytes of a `w`×`h` solid image.
    pub fn png(w: u32, h: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            w,
            h,
            image::Rgb([20, 120, 200]),
        ));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    /// In-memory fetcher that records every URL it is asked for.
    #[derive(Default)]
    pub struct FakeFetcher {
        pub responses: HashMap<String, Result<Vec<u8>, ImageLoadFailure>>,
        pub delay: Option<Duration>,
        pub requested: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub fn with(mut self, url: &str, result: Result<Vec<u8>, ImageLoadFailure>) -> Self {
            self.responses.insert(url.to_string(), result);
            self
        }

        pub fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageLoadFailure> {
            self.requested.lock().unwrap().push(url.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.responses
                .get(url)
                .cloned()
                .unwrap_or_else(|| {
                    Err(ImageLoadFailure::Http {
                        url: url.to_string(),
                        status: 404,
                    })
                })
        }
    }
}
