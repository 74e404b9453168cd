//! EPH email signature generator
//!
//! Builds the Ezulwini Private Hospital email-signature card from four text
//! fields and exports it as a high-resolution PNG.
//!
//! # Pipeline
//!
//! - [`draft::SignatureDraft`] holds the editable fields
//! - [`template::render_card`] turns a draft into card markup
//! - [`region::Region`] mounts that markup and loads its images
//! - [`export::Exporter`] waits for the images, rasterizes at 8x on white and
//!   writes `eph-signature-8k.png`
//!
//! # Example
//!
//! ```no_run
//! use ephsig::{ExportConfig, Field, SignatureApp};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExportConfig {
//!     asset_base: Some("file:///srv/eph/public/".to_string()),
//!     ..Default::default()
//! };
//! let mut app = SignatureApp::new(config)?;
//! app.mount();
//! app.set(Field::Name, "Jane Doe");
//! app.set(Field::Phone2, "");
//! let outcome = app.export().await;
//! println!("exported: {}", outcome.is_success());
//! # Ok(())
//! # }
//! ```

use serde::Deserialize;
use std::path::PathBuf;

pub mod error;
pub use error::{Error, Result};

pub mod app;
pub mod assets;
pub mod draft;
pub mod export;
pub mod region;
pub mod rendering;
pub mod template;

pub use app::SignatureApp;
pub use draft::{Field, SignatureDraft};
pub use export::{ExportOutcome, Exporter, SIGNATURE_FILE_NAME};
pub use region::Region;
pub use template::AssetLocators;

use rendering::{RasterOptions, Rgba};

/// Configuration for rendering and exporting a signature
///
/// Defaults reproduce the production export: 8x magnification on white,
/// CORS honoured, tainting refused, 15 second image timeout, 900px card.
///
/// # Examples
///
/// ```
/// let cfg = ephsig::ExportConfig::default();
/// assert_eq!(cfg.scale, 8.0);
/// assert_eq!(cfg.image_timeout_ms, 15000);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Linear magnification relative to the displayed card size
    pub scale: f32,
    /// Background fill as `#rrggbb`
    pub background: String,
    /// Honour `crossorigin` on images
    pub use_cors: bool,
    /// Draw tainting images instead of failing the export
    pub allow_taint: bool,
    /// Bound on image loading and on rasterization, in milliseconds
    pub image_timeout_ms: u64,
    /// Displayed card width in CSS pixels
    pub region_width: f32,
    /// Base URL that relative image locators resolve against
    pub asset_base: Option<String>,
    /// Origin the card is considered to be served from
    pub page_origin: Option<String>,
    /// User agent sent when fetching remote images
    pub user_agent: String,
    /// Directory the exported PNG is written into
    pub output_dir: PathBuf,
    /// Image locators embedded in the card
    pub assets: AssetLocators,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            scale: 8.0,
            background: "#ffffff".to_string(),
            use_cors: true,
            allow_taint: false,
            image_timeout_ms: 15000,
            region_width: 900.0,
            asset_base: None,
            page_origin: None,
            user_agent: concat!("ephsig/", env!("CARGO_PKG_VERSION")).to_string(),
            output_dir: PathBuf::from("."),
            assets: AssetLocators::default(),
        }
    }
}

impl ExportConfig {
    /// Load a configuration file; keys that are absent keep their defaults.
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let cfg: ExportConfig = serde_json::from_str(&text)
            .map_err(|e| Error::ConfigError(format!("Invalid {}: {}", path.display(), e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(Error::ConfigError(format!("scale must be positive, got {}", self.scale)));
        }
        if !(self.region_width.is_finite() && self.region_width > 0.0) {
            return Err(Error::ConfigError(format!(
                "region_width must be positive, got {}",
                self.region_width
            )));
        }
        if self.image_timeout_ms == 0 {
            return Err(Error::ConfigError("image_timeout_ms must be non-zero".into()));
        }
        if Rgba::parse_hex(&self.background).is_none() {
            return Err(Error::ConfigError(format!(
                "background must be #rrggbb, got {}",
                self.background
            )));
        }
        Ok(())
    }

    pub fn raster_options(&self) -> RasterOptions {
        RasterOptions {
            scale: self.scale,
            background: Rgba::parse_hex(&self.background).unwrap_or(Rgba::WHITE),
            use_cors: self.use_cors,
            allow_taint: self.allow_taint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExportConfig::default();
        assert_eq!(config.scale, 8.0);
        assert_eq!(config.region_width, 900.0);
        assert!(config.use_cors);
        assert!(!config.allow_taint);
        assert_eq!(config.raster_options().background, Rgba::WHITE);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_json_config() {
        let cfg: ExportConfig =
            serde_json::from_str(r#"{"region_width": 640, "assets": {"logo": "data:,x"}}"#).unwrap();
        assert_eq!(cfg.region_width, 640.0);
        assert_eq!(cfg.scale, 8.0);
        assert_eq!(cfg.assets.logo, "data:,x");
        assert_eq!(cfg.assets.badge, "/images/cohsasa-badge.png");
    }

    #[test]
    fn test_invalid_config() {
        let bad = ExportConfig { background: "white".into(), ..Default::default() };
        assert!(matches!(bad.validate(), Err(Error::ConfigError(_))));
        let bad = ExportConfig { scale: 0.0, ..Default::default() };
        assert!(bad.validate().is_err());
    }
}
