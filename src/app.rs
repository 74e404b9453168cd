//! The signature page: draft, live preview and export wired together.

use crate::assets::{DefaultLoader, ImageLoader};
use crate::draft::{Field, SignatureDraft};
use crate::export::{ExportOutcome, Exporter};
use crate::region::Region;
use crate::template::{render_card, render_text_preview, AssetLocators};
use crate::{ExportConfig, Result};
use std::sync::Arc;

pub struct SignatureApp {
    draft: SignatureDraft,
    assets: AssetLocators,
    loader: Arc<dyn ImageLoader>,
    region_width: f32,
    region: Option<Region>,
    exporter: Exporter,
    redraws: usize,
}

impl SignatureApp {
    /// App with the default loader and exporter for `config`.
    pub fn new(config: ExportConfig) -> Result<Self> {
        config.validate()?;
        let loader = Arc::new(DefaultLoader::new(&config)?);
        Ok(Self::with_loader(config, loader))
    }

    pub fn with_loader(config: ExportConfig, loader: Arc<dyn ImageLoader>) -> Self {
        Self {
            draft: SignatureDraft::default(),
            assets: config.assets.clone(),
            loader,
            region_width: config.region_width,
            region: None,
            exporter: Exporter::new(config),
            redraws: 0,
        }
    }

    /// Replace the exporter, keeping everything else.
    pub fn with_exporter(mut self, exporter: Exporter) -> Self {
        self.exporter = exporter;
        self
    }

    /// Start from `draft` instead of the defaults.
    pub fn with_draft(mut self, draft: SignatureDraft) -> Self {
        self.draft = draft;
        self.redraw();
        self
    }

    pub fn draft(&self) -> &SignatureDraft {
        &self.draft
    }

    pub fn region(&self) -> Option<&Region> {
        self.region.as_ref()
    }

    /// Number of preview renders since construction.
    pub fn redraw_count(&self) -> usize {
        self.redraws
    }

    /// Render the card for the first time and start loading its images.
    /// Must run inside a Tokio runtime.
    pub fn mount(&mut self) {
        if self.region.is_none() {
            let markup = render_card(&self.draft, &self.assets);
            self.region = Some(Region::mount(markup, self.loader.clone(), self.region_width));
            self.redraws += 1;
        }
    }

    /// Set a field and redraw the preview before returning.
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.draft.set(field, value);
        self.redraw();
    }

    fn redraw(&mut self) {
        if let Some(region) = self.region.as_mut() {
            region.replace_markup(render_card(&self.draft, &self.assets));
            self.redraws += 1;
        }
    }

    pub fn preview_markup(&self) -> String {
        match &self.region {
            Some(r) => r.markup().to_string(),
            None => render_card(&self.draft, &self.assets),
        }
    }

    pub fn preview_text(&self) -> String {
        render_text_preview(&self.draft)
    }

    pub async fn export(&self) -> ExportOutcome {
        self.exporter.export(self.region.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryLoader;

    fn app() -> SignatureApp {
        SignatureApp::with_loader(ExportConfig::default(), Arc::new(MemoryLoader::new()))
    }

    #[tokio::test]
    async fn every_edit_redraws_the_mounted_preview() {
        let mut app = app();
        app.set(Field::Name, "before mount");
        assert_eq!(app.redraw_count(), 0);

        app.mount();
        assert_eq!(app.redraw_count(), 1);
        app.set(Field::Name, "Jane Doe");
        app.set(Field::JobTitle, "Radiologist");
        app.set(Field::Phone1, "+268 1111 1111");
        app.set(Field::Phone2, "");
        assert_eq!(app.redraw_count(), 5);

        let markup = app.preview_markup();
        assert!(markup.contains(">Jane Doe<"));
        assert!(markup.contains(">+268 1111 1111<"));
        assert!(app.preview_text().contains("Phone: +268 1111 1111\n"));
    }

    #[tokio::test]
    async fn export_without_mount_is_skipped() {
        let app = app();
        assert!(matches!(app.export().await, ExportOutcome::Skipped));
    }

    #[tokio::test]
    async fn missing_assets_fail_export() {
        let mut app = app();
        app.mount();
        match app.export().await {
            ExportOutcome::Failed(err) => assert_eq!(err.image_src(), Some("/images/eph-logo.png")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
