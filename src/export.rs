//! Signature export pipeline.
//!
//! `Exporter::export` is the single failure boundary: it waits for every image
//! in the region, rasterizes a capture copy at the configured scale, encodes it
//! as PNG and delivers it under a fixed file name. Any error is logged and
//! surfaced once through the `Notifier`; nothing is retried.

use crate::region::Region;
use crate::rendering::raster::{encode_png, TinySkiaRasterizer};
use crate::rendering::{Rasterizer, Screenshot};
use crate::{Error, ExportConfig, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// File name of every exported signature.
pub const SIGNATURE_FILE_NAME: &str = "eph-signature-8k.png";

/// Message shown to the user when an export fails.
pub const FAILURE_MESSAGE: &str = "Error generating signature. Please try again.";

/// Hands the encoded image to the user.
pub trait Delivery: Send + Sync {
    fn deliver(&self, file_name: &str, shot: &Screenshot) -> Result<PathBuf>;
}

/// Writes exports into a directory, replacing any previous file of the same name.
#[derive(Debug, Clone)]
pub struct FileDelivery {
    dir: PathBuf,
}

impl FileDelivery {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Delivery for FileDelivery {
    fn deliver(&self, file_name: &str, shot: &Screenshot) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            Error::DeliveryError(format!("cannot create {}: {}", self.dir.display(), e))
        })?;
        let path = self.dir.join(file_name);
        std::fs::write(&path, &shot.png_data)
            .map_err(|e| Error::DeliveryError(format!("cannot write {}: {}", path.display(), e)))?;
        Ok(path)
    }
}

/// Blocking user notification for failed exports.
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}

/// Notifier that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, message: &str) {
        log::warn!("{}", message);
    }
}

/// Result of one `export()` call.
#[derive(Debug)]
pub enum ExportOutcome {
    /// The PNG was written
    Delivered {
        path: PathBuf,
        width: u32,
        height: u32,
    },
    /// No region was mounted; nothing happened
    Skipped,
    /// Another export was still running; nothing happened
    Busy,
    /// The export failed and the user was notified
    Failed(Error),
}

impl ExportOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExportOutcome::Delivered { .. })
    }
}

/// How the readiness barrier resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    /// Images already complete when the barrier was entered
    pub immediate: usize,
    /// Images the barrier had to wait for
    pub waited: usize,
}

/// Wait until every image in `region` has loaded, bounded by `timeout_ms`.
///
/// Fails on the first image that fails to load, naming its locator. An image
/// that already failed when the barrier is entered fails it immediately.
pub async fn await_images(region: &Region, timeout_ms: u64) -> Result<Readiness> {
    let mut readiness = Readiness::default();
    let mut pending = Vec::new();
    for el in region.images() {
        if el.is_complete() {
            readiness.immediate += 1;
            el.wait().await?;
        } else {
            readiness.waited += 1;
            pending.push(el.wait());
        }
    }
    if pending.is_empty() {
        return Ok(readiness);
    }

    log::debug!("waiting for {} image(s) to load", pending.len());
    let results = tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        futures::future::join_all(pending),
    )
    .await
    .map_err(|_| Error::Timeout(timeout_ms))?;
    for r in results {
        r?;
    }
    Ok(readiness)
}

// Clears the in-flight flag when the export finishes, however it finishes.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Turns a mounted region into a delivered PNG.
pub struct Exporter {
    config: ExportConfig,
    rasterizer: Arc<dyn Rasterizer>,
    delivery: Arc<dyn Delivery>,
    notifier: Arc<dyn Notifier>,
    in_flight: AtomicBool,
}

impl Exporter {
    /// Exporter with the tiny-skia rasterizer, writing into `config.output_dir`.
    pub fn new(config: ExportConfig) -> Self {
        let delivery = Arc::new(FileDelivery::new(config.output_dir.clone()));
        Self {
            config,
            rasterizer: Arc::new(TinySkiaRasterizer::new()),
            delivery,
            notifier: Arc::new(LogNotifier),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn with_delivery(mut self, delivery: Arc<dyn Delivery>) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export the region, reporting failure to the user instead of returning it.
    pub async fn export(&self, region: Option<&Region>) -> ExportOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::warn!("export already in progress; ignoring request");
            return ExportOutcome::Busy;
        }
        let _guard = InFlight(&self.in_flight);

        match self.try_export(region).await {
            Ok((path, shot)) => {
                log::info!(
                    "saved {} ({}x{}, sha256 {})",
                    path.display(),
                    shot.width,
                    shot.height,
                    shot.digest()
                );
                ExportOutcome::Delivered {
                    path,
                    width: shot.width,
                    height: shot.height,
                }
            }
            Err(Error::MissingRegion) => {
                log::debug!("export requested with no mounted region; ignoring");
                ExportOutcome::Skipped
            }
            Err(err) => {
                log::error!("Error generating signature: {}", err);
                self.notifier.alert(FAILURE_MESSAGE);
                ExportOutcome::Failed(err)
            }
        }
    }

    /// The pipeline without the failure boundary.
    ///
    /// `image_timeout_ms` bounds the readiness barrier and rasterization;
    /// PNG encoding runs afterwards without a deadline.
    pub async fn try_export(&self, region: Option<&Region>) -> Result<(PathBuf, Screenshot)> {
        let region = region.ok_or(Error::MissingRegion)?;
        let timeout_ms = self.config.image_timeout_ms;
        let readiness = await_images(region, timeout_ms).await?;
        log::debug!(
            "images ready ({} immediate, {} awaited)",
            readiness.immediate,
            readiness.waited
        );

        let capture = region.clone_for_capture();
        let options = self.config.raster_options();
        let rasterizer = self.rasterizer.clone();
        let task = tokio::task::spawn_blocking(move || rasterizer.rasterize(&capture, &options));
        let bitmap = tokio::time::timeout(Duration::from_millis(timeout_ms), task)
            .await
            .map_err(|_| Error::Timeout(timeout_ms))?
            .map_err(|e| Error::RenderError(format!("rasterizer task failed: {}", e)))??;
        log::debug!("rasterized {}x{}", bitmap.width, bitmap.height);

        let shot = tokio::task::spawn_blocking(move || encode_png(&bitmap))
            .await
            .map_err(|e| Error::RenderError(format!("encoder task failed: {}", e)))??;

        let path = self.delivery.deliver(SIGNATURE_FILE_NAME, &shot)?;
        Ok((path, shot))
    }
}
