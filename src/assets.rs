//! Image sources for the signature card.
//!
//! Loaders turn a locator taken from an `<img src>` into decoded pixels. The
//! default loader understands `file:`, `data:` and (with the `http` feature)
//! `http(s):` locators, resolving relative ones against the configured asset
//! base.

use crate::{Error, ExportConfig, Result};
use base64::Engine as _;
use futures::future::{BoxFuture, FutureExt};
use image::RgbaImage;
use resvg::usvg;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// Decoded image payload.
#[derive(Clone)]
pub enum ImageData {
    /// Straight-alpha RGBA pixels
    Raster(Arc<RgbaImage>),
    /// Validated SVG document, rendered at capture resolution
    Vector { svg: Arc<Vec<u8>>, width: f32, height: f32 },
}

impl std::fmt::Debug for ImageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageData::Raster(img) => write!(f, "Raster({}x{})", img.width(), img.height()),
            ImageData::Vector { width, height, .. } => write!(f, "Vector({}x{})", width, height),
        }
    }
}

/// An image that finished loading.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// Locator as written in the markup
    pub src: String,
    /// Whether the image came from an origin other than the page's
    pub cross_origin: bool,
    /// Whether the serving origin approved cross-origin reads
    /// (`Access-Control-Allow-Origin`)
    pub cors_approved: bool,
    pub data: ImageData,
}

impl LoadedImage {
    /// A same-origin raster image.
    pub fn raster(src: impl Into<String>, pixels: RgbaImage) -> Self {
        Self {
            src: src.into(),
            cross_origin: false,
            cors_approved: false,
            data: ImageData::Raster(Arc::new(pixels)),
        }
    }

    /// Intrinsic size in CSS pixels.
    pub fn natural_size(&self) -> (f32, f32) {
        match &self.data {
            ImageData::Raster(img) => (img.width() as f32, img.height() as f32),
            ImageData::Vector { width, height, .. } => (*width, *height),
        }
    }
}

/// Something that can fetch and decode an image locator.
pub trait ImageLoader: Send + Sync {
    fn load(&self, src: &str) -> BoxFuture<'static, Result<LoadedImage>>;
}

/// Decode raster (PNG/JPEG) or SVG bytes.
pub fn decode_image(src: &str, bytes: &[u8]) -> Result<ImageData> {
    if image::guess_format(bytes).is_ok() {
        let img = image::load_from_memory(bytes).map_err(|e| Error::image_load(src, e))?;
        return Ok(ImageData::Raster(Arc::new(img.to_rgba8())));
    }

    let tree = usvg::Tree::from_data(bytes, &usvg::Options::default())
        .map_err(|e| Error::image_load(src, format!("unrecognized image data: {}", e)))?;
    let size = tree.size();
    Ok(ImageData::Vector {
        svg: Arc::new(bytes.to_vec()),
        width: size.width(),
        height: size.height(),
    })
}

/// Payload of a `data:` locator.
fn decode_data_url(src: &str) -> Result<Vec<u8>> {
    let rest = src
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| Error::image_load(src, "not a data URL"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::image_load(src, "data URL has no payload"))?;
    if meta.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| Error::image_load(src, e))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

/// Loader for `file:`, `data:` and `http(s):` locators.
#[derive(Clone)]
pub struct DefaultLoader {
    base: Option<Url>,
    page_origin: Option<url::Origin>,
    use_cors: bool,
    #[cfg(feature = "http")]
    client: reqwest::Client,
    #[cfg(feature = "http")]
    user_agent: String,
}

impl DefaultLoader {
    pub fn new(config: &ExportConfig) -> Result<Self> {
        let base = config
            .asset_base
            .as_deref()
            .map(|b| {
                Url::parse(b)
                    .map_err(|e| Error::ConfigError(format!("Invalid asset base {}: {}", b, e)))
            })
            .transpose()?;

        let page_origin = match config.page_origin.as_deref() {
            Some(o) => Some(
                Url::parse(o)
                    .map_err(|e| Error::ConfigError(format!("Invalid page origin {}: {}", o, e)))?
                    .origin(),
            ),
            // A page served from the asset host shares its origin.
            None => base
                .as_ref()
                .filter(|b| matches!(b.scheme(), "http" | "https"))
                .map(Url::origin),
        };

        #[cfg(feature = "http")]
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.image_timeout_ms))
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base,
            page_origin,
            use_cors: config.use_cors,
            #[cfg(feature = "http")]
            client,
            #[cfg(feature = "http")]
            user_agent: config.user_agent.clone(),
        })
    }

    /// Resolve a markup locator to an absolute URL.
    pub fn resolve(&self, src: &str) -> Result<Url> {
        match Url::parse(src) {
            Ok(u) => Ok(u),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self
                    .base
                    .as_ref()
                    .ok_or_else(|| Error::image_load(src, "relative locator and no asset base"))?;
                base.join(src).map_err(|e| Error::image_load(src, e))
            }
            Err(e) => Err(Error::image_load(src, e)),
        }
    }

    fn is_cross_origin(&self, url: &Url) -> bool {
        match url.scheme() {
            "data" | "file" => false,
            _ => self.page_origin.as_ref() != Some(&url.origin()),
        }
    }

    async fn fetch(self, src: String) -> Result<LoadedImage> {
        let url = self.resolve(&src)?;
        let cross_origin = self.is_cross_origin(&url);
        log::debug!("loading image {} from {}", src, url);

        let (bytes, cors_approved) = match url.scheme() {
            "data" => (decode_data_url(&src)?, false),
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| Error::image_load(&src, "not a local path"))?;
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| Error::image_load(&src, e))?;
                (bytes, false)
            }
            #[cfg(feature = "http")]
            "http" | "https" => self.fetch_http(&url, &src, cross_origin).await?,
            other => {
                return Err(Error::image_load(&src, format!("unsupported scheme {}", other)));
            }
        };

        let data = decode_image(&src, &bytes)?;
        Ok(LoadedImage {
            src,
            cross_origin,
            cors_approved,
            data,
        })
    }

    #[cfg(feature = "http")]
    async fn fetch_http(&self, url: &Url, src: &str, cross_origin: bool) -> Result<(Vec<u8>, bool)> {
        use reqwest::header::{ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN, USER_AGENT};

        let page_origin = self.page_origin.as_ref().map(|o| o.ascii_serialization());
        let mut req = self
            .client
            .get(url.clone())
            .header(USER_AGENT, self.user_agent.clone());
        if cross_origin && self.use_cors {
            if let Some(origin) = &page_origin {
                req = req.header(ORIGIN, origin.clone());
            }
        }

        let resp = req.send().await.map_err(|e| Error::image_load(src, e))?;
        if !resp.status().is_success() {
            return Err(Error::image_load(src, resp.status()));
        }

        let cors_approved = resp
            .headers()
            .get(ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(|v| {
                let v = v.trim();
                v == "*" || page_origin.as_deref() == Some(v)
            })
            .unwrap_or(false);

        let bytes = resp.bytes().await.map_err(|e| Error::image_load(src, e))?;
        Ok((bytes.to_vec(), cors_approved))
    }
}

impl ImageLoader for DefaultLoader {
    fn load(&self, src: &str) -> BoxFuture<'static, Result<LoadedImage>> {
        self.clone().fetch(src.to_string()).boxed()
    }
}

enum MemoryEntry {
    Ready(LoadedImage),
    Broken(String),
    Stalled,
}

/// Loader backed by images already held in memory.
///
/// Locators without an entry fail to load. `stall` registers a locator whose
/// load never completes.
#[derive(Default)]
pub struct MemoryLoader {
    entries: HashMap<String, MemoryEntry>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, image: LoadedImage) -> &mut Self {
        self.entries.insert(image.src.clone(), MemoryEntry::Ready(image));
        self
    }

    pub fn insert_broken(&mut self, src: &str, reason: &str) -> &mut Self {
        self.entries
            .insert(src.to_string(), MemoryEntry::Broken(reason.to_string()));
        self
    }

    pub fn stall(&mut self, src: &str) -> &mut Self {
        self.entries.insert(src.to_string(), MemoryEntry::Stalled);
        self
    }
}

impl ImageLoader for MemoryLoader {
    fn load(&self, src: &str) -> BoxFuture<'static, Result<LoadedImage>> {
        match self.entries.get(src) {
            Some(MemoryEntry::Ready(img)) => futures::future::ready(Ok(img.clone())).boxed(),
            Some(MemoryEntry::Broken(reason)) => {
                futures::future::ready(Err(Error::image_load(src, reason))).boxed()
            }
            Some(MemoryEntry::Stalled) => futures::future::pending().boxed(),
            None => futures::future::ready(Err(Error::image_load(src, "no such asset"))).boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, image::Rgba([0, 169, 157, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    const SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="110" height="110"><circle cx="55" cy="55" r="50" fill="#00a99d"/></svg>"##;

    #[test]
    fn decodes_png_and_svg() {
        match decode_image("a.png", &png_bytes(3, 2)).unwrap() {
            ImageData::Raster(img) => assert_eq!((img.width(), img.height()), (3, 2)),
            other => panic!("unexpected {:?}", other),
        }
        match decode_image("a.svg", SVG.as_bytes()).unwrap() {
            ImageData::Vector { width, height, .. } => assert_eq!((width, height), (110.0, 110.0)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn garbage_bytes_fail_with_locator() {
        let err = decode_image("/images/x.png", b"definitely not an image").unwrap_err();
        assert_eq!(err.image_src(), Some("/images/x.png"));
    }

    #[test]
    fn data_urls_decode() {
        let b64 = base64::engine::general_purpose::STANDARD.encode(png_bytes(1, 1));
        let src = format!("data:image/png;base64,{}", b64);
        assert_eq!(decode_data_url(&src).unwrap(), png_bytes(1, 1));
        assert!(decode_data_url("data:image/png;base64").is_err());
    }

    #[test]
    fn relative_locators_need_a_base() {
        let loader = DefaultLoader::new(&ExportConfig::default()).unwrap();
        let err = loader.resolve("/images/eph-logo.png").unwrap_err();
        assert_eq!(err.image_src(), Some("/images/eph-logo.png"));

        let cfg = ExportConfig {
            asset_base: Some("http://localhost:3000/".into()),
            ..Default::default()
        };
        let loader = DefaultLoader::new(&cfg).unwrap();
        let url = loader.resolve("/images/eph-logo.png").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/images/eph-logo.png");
        assert!(!loader.is_cross_origin(&url));
        assert!(loader.is_cross_origin(&Url::parse("http://cdn.example.com/a.png").unwrap()));
    }

    #[tokio::test]
    async fn file_locators_load_from_disk() {
        let dir = std::env::temp_dir().join(format!("ephsig-assets-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("images")).unwrap();
        std::fs::write(dir.join("images/badge.png"), png_bytes(4, 4)).unwrap();

        let base = Url::from_directory_path(&dir).unwrap();
        let cfg = ExportConfig {
            asset_base: Some(base.to_string()),
            ..Default::default()
        };
        let loader = DefaultLoader::new(&cfg).unwrap();
        let img = loader.load("images/badge.png").await.unwrap();
        assert_eq!(img.natural_size(), (4.0, 4.0));
        assert!(!img.cross_origin);

        let err = loader.load("images/missing.png").await.unwrap_err();
        assert_eq!(err.image_src(), Some("images/missing.png"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
