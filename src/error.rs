//! Error types for signature rendering and export

use thiserror::Error;

/// Result type alias for signature operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or exporting a signature
#[derive(Error, Debug)]
pub enum Error {
    /// Export was requested before any region was mounted
    #[error("No signature region is mounted")]
    MissingRegion,

    /// An embedded image never reached a loaded state
    #[error("Failed to load image: {src} ({reason})")]
    ImageLoad { src: String, reason: String },

    /// Failed to render the region
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// A cross-origin image without CORS approval would taint the canvas
    #[error("Tainted canvas: cross-origin image {0} is not readable")]
    Tainted(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Failed to hand the encoded image to the user
    #[error("Delivery failed: {0}")]
    DeliveryError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl Error {
    pub(crate) fn image_load(src: &str, reason: impl std::fmt::Display) -> Self {
        Error::ImageLoad {
            src: src.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Source locator of the offending image, if this error names one.
    pub fn image_src(&self) -> Option<&str> {
        match self {
            Error::ImageLoad { src, .. } | Error::Tainted(src) => Some(src),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_load_names_the_locator() {
        let err = Error::image_load("/images/eph-logo.png", "404 Not Found");
        assert!(err.to_string().starts_with("Failed to load image: /images/eph-logo.png"));
        assert_eq!(err.image_src(), Some("/images/eph-logo.png"));
        assert_eq!(Error::Timeout(15000).image_src(), None);
    }
}
