//! The mounted signature card.
//!
//! A `Region` is the rendered card markup together with one `ImageElement` per
//! `<img>` in it. Mounting starts every image load in the background; each
//! element publishes its state through a `watch` channel so the exporter can
//! check `is_complete()` or await the terminal state.

use crate::assets::{ImageLoader, LoadedImage};
use crate::rendering::layout::{layout_card, CardLayout};
use crate::{Error, Result};
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Cross-origin mode given to capture copies of every image.
pub const CAPTURE_CROSS_ORIGIN: &str = "anonymous";

/// Load state of one embedded image.
#[derive(Debug, Clone)]
pub enum ImageState {
    Loading,
    Loaded(LoadedImage),
    Failed(String),
}

impl ImageState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ImageState::Loading)
    }
}

// Aborts the background load once no element refers to it anymore.
struct LoadTask(tokio::task::JoinHandle<()>);

impl Drop for LoadTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// An `<img>` element of the region.
#[derive(Clone)]
pub struct ImageElement {
    src: String,
    cross_origin: Option<String>,
    state: watch::Receiver<ImageState>,
    _task: Option<Arc<LoadTask>>,
}

impl std::fmt::Debug for ImageElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageElement")
            .field("src", &self.src)
            .field("cross_origin", &self.cross_origin)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl ImageElement {
    fn spawn(src: String, cross_origin: Option<String>, loader: &dyn ImageLoader) -> Self {
        let (tx, rx) = watch::channel(ImageState::Loading);
        let fut = loader.load(&src);
        let handle = tokio::spawn(async move {
            let state = match fut.await {
                Ok(img) => ImageState::Loaded(img),
                Err(Error::ImageLoad { reason, .. }) => ImageState::Failed(reason),
                Err(e) => ImageState::Failed(e.to_string()),
            };
            let _ = tx.send(state);
        });
        Self {
            src,
            cross_origin,
            state: rx,
            _task: Some(Arc::new(LoadTask(handle))),
        }
    }

    fn settled(src: String, cross_origin: Option<String>, state: ImageState) -> Self {
        let (_tx, rx) = watch::channel(state);
        Self {
            src,
            cross_origin,
            state: rx,
            _task: None,
        }
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    /// Value of the `crossorigin` attribute, if any.
    pub fn cross_origin(&self) -> Option<&str> {
        self.cross_origin.as_deref()
    }

    /// True once the image has either loaded or failed.
    pub fn is_complete(&self) -> bool {
        self.state.borrow().is_terminal()
    }

    pub fn state(&self) -> ImageState {
        self.state.borrow().clone()
    }

    /// The decoded image if it has loaded.
    pub fn loaded(&self) -> Option<LoadedImage> {
        match &*self.state.borrow() {
            ImageState::Loaded(img) => Some(img.clone()),
            _ => None,
        }
    }

    /// Wait for the terminal state; a failed load names this element's locator.
    pub async fn wait(&self) -> Result<LoadedImage> {
        let mut rx = self.state.clone();
        loop {
            let current = rx.borrow_and_update().clone();
            match current {
                ImageState::Loaded(img) => return Ok(img),
                ImageState::Failed(reason) => return Err(Error::image_load(&self.src, reason)),
                ImageState::Loading => {}
            }
            if rx.changed().await.is_err() {
                return Err(Error::image_load(&self.src, "load abandoned"));
            }
        }
    }
}

fn img_selector() -> Selector {
    Selector::parse("img[src]").unwrap()
}

/// `(src, crossorigin)` of every image in document order.
fn enumerate_images(markup: &str) -> Vec<(String, Option<String>)> {
    let doc = Html::parse_fragment(markup);
    let sel = img_selector();
    doc.select(&sel)
        .filter_map(|n| {
            let src = n.value().attr("src")?;
            Some((src.to_string(), n.value().attr("crossorigin").map(str::to_string)))
        })
        .collect()
}

/// The rendered signature card used as the rasterization source.
pub struct Region {
    markup: String,
    images: Vec<ImageElement>,
    loader: Arc<dyn ImageLoader>,
    width: f32,
}

impl Region {
    /// Mount `markup` and start loading its images. Must run inside a Tokio runtime.
    pub fn mount(markup: impl Into<String>, loader: Arc<dyn ImageLoader>, width: f32) -> Self {
        let markup = markup.into();
        let images = enumerate_images(&markup)
            .into_iter()
            .map(|(src, co)| ImageElement::spawn(src, co, loader.as_ref()))
            .collect();
        Self {
            markup,
            images,
            loader,
            width,
        }
    }

    /// Mount `markup` with images that are already decoded. Locators missing
    /// from `images` are mounted as failed.
    pub fn preloaded(
        markup: impl Into<String>,
        images: Vec<LoadedImage>,
        loader: Arc<dyn ImageLoader>,
        width: f32,
    ) -> Self {
        let markup = markup.into();
        let cache: HashMap<String, LoadedImage> =
            images.into_iter().map(|img| (img.src.clone(), img)).collect();
        let images = enumerate_images(&markup)
            .into_iter()
            .map(|(src, co)| {
                let state = match cache.get(&src) {
                    Some(img) => ImageState::Loaded(img.clone()),
                    None => ImageState::Failed("not preloaded".into()),
                };
                ImageElement::settled(src, co, state)
            })
            .collect();
        Self {
            markup,
            images,
            loader,
            width,
        }
    }

    /// Re-render in place. Images whose locator is unchanged keep their state.
    pub fn replace_markup(&mut self, markup: impl Into<String>) {
        let markup = markup.into();
        let mut previous: HashMap<String, ImageElement> = HashMap::new();
        for el in self.images.drain(..) {
            previous.entry(el.src.clone()).or_insert(el);
        }

        self.images = enumerate_images(&markup)
            .into_iter()
            .map(|(src, co)| match previous.get(&src) {
                Some(el) => ImageElement {
                    cross_origin: co,
                    ..el.clone()
                },
                None => ImageElement::spawn(src, co, self.loader.as_ref()),
            })
            .collect();
        self.markup = markup;
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn images(&self) -> &[ImageElement] {
        &self.images
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    /// Copy used for capture: every image is marked anonymous cross-origin
    /// whatever the original markup said.
    pub fn clone_for_capture(&self) -> Region {
        Region {
            markup: self.markup.clone(),
            images: self
                .images
                .iter()
                .map(|el| ImageElement {
                    cross_origin: Some(CAPTURE_CROSS_ORIGIN.to_string()),
                    ..el.clone()
                })
                .collect(),
            loader: self.loader.clone(),
            width: self.width,
        }
    }

    /// Natural sizes of the images loaded so far, keyed by locator.
    pub fn natural_sizes(&self) -> HashMap<String, (f32, f32)> {
        self.images
            .iter()
            .filter_map(|el| el.loaded().map(|img| (el.src.clone(), img.natural_size())))
            .collect()
    }

    pub fn layout(&self) -> CardLayout {
        let doc = Html::parse_fragment(&self.markup);
        layout_card(&doc, self.width, &self.natural_sizes())
    }

    /// Displayed width and height in CSS pixels.
    pub fn display_size(&self) -> (f32, f32) {
        let l = self.layout();
        (l.width, l.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryLoader;
    use image::RgbaImage;

    const MARKUP: &str = r#"<div><img src="/a.png"><img src="/b.png" crossorigin="use-credentials"><img alt="no src"></div>"#;

    fn loader() -> Arc<dyn ImageLoader> {
        let mut m = MemoryLoader::new();
        m.insert(LoadedImage::raster("/a.png", RgbaImage::new(2, 2)))
            .insert(LoadedImage::raster("/b.png", RgbaImage::new(3, 1)))
            .insert(LoadedImage::raster("/c.png", RgbaImage::new(1, 1)));
        Arc::new(m)
    }

    #[tokio::test]
    async fn mount_enumerates_images_with_src() {
        let region = Region::mount(MARKUP, loader(), 900.0);
        let srcs: Vec<_> = region.images().iter().map(|i| i.src()).collect();
        assert_eq!(srcs, vec!["/a.png", "/b.png"]);
        assert_eq!(region.images()[1].cross_origin(), Some("use-credentials"));

        for el in region.images() {
            el.wait().await.unwrap();
            assert!(el.is_complete());
        }
        assert_eq!(region.natural_sizes()["/b.png"], (3.0, 1.0));
    }

    #[tokio::test]
    async fn failed_load_reports_locator() {
        let region = Region::mount(r#"<img src="/missing.png">"#, loader(), 900.0);
        let err = region.images()[0].wait().await.unwrap_err();
        assert_eq!(err.image_src(), Some("/missing.png"));
        assert!(region.images()[0].is_complete());
    }

    #[tokio::test]
    async fn capture_copy_marks_every_image_anonymous() {
        let region = Region::mount(MARKUP, loader(), 900.0);
        assert_eq!(region.images()[0].cross_origin(), None);

        let copy = region.clone_for_capture();
        assert!(copy
            .images()
            .iter()
            .all(|i| i.cross_origin() == Some(CAPTURE_CROSS_ORIGIN)));
        // the original markup is untouched
        assert_eq!(region.images()[0].cross_origin(), None);
    }

    #[tokio::test]
    async fn replace_markup_keeps_loaded_images() {
        let mut region = Region::mount(MARKUP, loader(), 900.0);
        region.images()[0].wait().await.unwrap();

        region.replace_markup(r#"<img src="/a.png"><img src="/c.png">"#);
        assert!(region.images()[0].is_complete());
        assert_eq!(region.images()[1].src(), "/c.png");
        region.images()[1].wait().await.unwrap();
    }

    #[test]
    fn preloaded_images_are_complete_immediately() {
        let region = Region::preloaded(
            MARKUP,
            vec![LoadedImage::raster("/a.png", RgbaImage::new(1, 1))],
            loader(),
            900.0,
        );
        assert!(region.images().iter().all(ImageElement::is_complete));
        assert!(region.images()[0].loaded().is_some());
        assert!(matches!(region.images()[1].state(), ImageState::Failed(_)));
    }
}
