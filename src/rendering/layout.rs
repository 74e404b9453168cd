/// Card layout: reads the signature markup back by class name and places
/// every box in CSS pixels.
use crate::rendering::Rgba;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;

/// Glyph advance as a fraction of the font size.
pub const ADVANCE: f32 = 0.6;
/// Glyph ink height as a fraction of the font size.
pub const GLYPH_HEIGHT: f32 = 0.8;

const BORDER: f32 = 1.0;
const STRIPE_HEIGHT: f32 = 12.0;
const COLUMN_PADDING: f32 = 32.0;
const CONTACTS_TOP: f32 = 60.0;
const ROW_HEIGHT: f32 = 24.0;
const ROW_GAP: f32 = 12.0;
const BRANDS_TOP: f32 = 24.0;
const BRAND_GAP: f32 = 16.0;
const FOOTER_HEIGHT: f32 = 76.0;
const WAVE_HEIGHT: f32 = 64.0;

const BORDER_COLOR: Rgba = Rgba(0xd1, 0xd5, 0xdb, 255);
const DIVIDER_COLOR: Rgba = Rgba(0xf1, 0xf3, 0xf4, 255);
const NAME_COLOR: Rgba = Rgba(0x1f, 0x29, 0x37, 255);
const TITLE_COLOR: Rgba = Rgba(0x4b, 0x55, 0x63, 255);
const ACCENT_COLOR: Rgba = Rgba(0x00, 0xa9, 0x9d, 255);
const LABEL_COLOR: Rgba = Rgba(0x6b, 0x72, 0x80, 255);
const VALUE_COLOR: Rgba = Rgba(0x37, 0x41, 0x51, 255);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub color: Rgba,
    pub bold: bool,
    pub italic: bool,
}

impl TextStyle {
    fn new(size: f32, color: Rgba) -> Self {
        Self { size, color, bold: false, italic: false }
    }

    fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    fn line_height(&self) -> f32 {
        (self.size * 1.25).round()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Fill(Rgba),
    /// Circular badge with a top-left to bottom-right gradient
    Badge { from: Rgba, to: Rgba },
    Text { text: String, style: TextStyle },
    Image { src: String, opacity: f32 },
    /// The footer swoosh, stretched over the rect
    Wave,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub rect: Rect,
    pub kind: ElementKind,
}

/// Positioned boxes of the card, in paint order.
#[derive(Debug, Clone)]
pub struct CardLayout {
    pub width: f32,
    pub height: f32,
    pub nodes: Vec<LayoutNode>,
}

impl CardLayout {
    pub fn images(&self) -> impl Iterator<Item = (&Rect, &str)> {
        self.nodes.iter().filter_map(|n| match &n.kind {
            ElementKind::Image { src, .. } => Some((&n.rect, src.as_str())),
            _ => None,
        })
    }

    pub fn texts(&self) -> impl Iterator<Item = (&Rect, &str)> {
        self.nodes.iter().filter_map(|n| match &n.kind {
            ElementKind::Text { text, .. } => Some((&n.rect, text.as_str())),
            _ => None,
        })
    }
}

pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * ADVANCE
}

fn sel(s: &str) -> Selector {
    Selector::parse(s).unwrap()
}

fn first<'a>(scope: ElementRef<'a>, s: &str) -> Option<ElementRef<'a>> {
    scope.select(&sel(s)).next()
}

fn text_of(el: Option<ElementRef<'_>>) -> String {
    el.map(|n| n.text().collect::<String>()).unwrap_or_default()
}

fn attr_f32(el: ElementRef<'_>, name: &str) -> Option<f32> {
    el.value().attr(name).and_then(|v| v.trim().parse().ok())
}

fn attr_color(el: ElementRef<'_>, name: &str) -> Option<Rgba> {
    el.value().attr(name).and_then(Rgba::parse_hex)
}

/// Displayed size of an image: explicit attributes first, then the natural
/// aspect ratio, then a square.
fn image_size(el: ElementRef<'_>, natural: Option<(f32, f32)>) -> (f32, f32) {
    let aspect = natural
        .filter(|(w, h)| *w > 0.0 && *h > 0.0)
        .map(|(w, h)| w / h)
        .unwrap_or(1.0);
    match (attr_f32(el, "width"), attr_f32(el, "height")) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, w / aspect),
        (None, Some(h)) => (h * aspect, h),
        (None, None) => natural.unwrap_or((0.0, 0.0)),
    }
}

struct Column {
    nodes: Vec<LayoutNode>,
}

impl Column {
    fn push(&mut self, rect: Rect, kind: ElementKind) {
        self.nodes.push(LayoutNode { rect, kind });
    }

    fn text(&mut self, x: f32, y: f32, text: String, style: TextStyle) -> f32 {
        let h = style.line_height();
        let w = text_width(&text, style.size);
        self.push(Rect::new(x, y, w, h), ElementKind::Text { text, style });
        h
    }
}

/// Lay out the card rendered by `template::render_card` at `width` CSS pixels.
///
/// `natural` holds the intrinsic sizes of images that have loaded; images
/// without an entry fall back to their markup attributes.
pub fn layout_card(document: &Html, width: f32, natural: &HashMap<String, (f32, f32)>) -> CardLayout {
    let root = document.root_element();
    let inner = (width - 2.0 * BORDER).max(0.0);
    let mut col = Column { nodes: Vec::new() };

    // Stripe
    let cells: Vec<Rgba> = root
        .select(&sel(".sig-stripe > [data-fill]"))
        .filter_map(|c| attr_color(c, "data-fill"))
        .collect();
    if !cells.is_empty() {
        let cell_w = inner / cells.len() as f32;
        for (i, color) in cells.into_iter().enumerate() {
            col.push(
                Rect::new(BORDER + i as f32 * cell_w, BORDER, cell_w, STRIPE_HEIGHT),
                ElementKind::Fill(color),
            );
        }
    }
    let main_top = BORDER + STRIPE_HEIGHT;
    let col_w = ((inner - 1.0) / 2.0).max(0.0);
    let left_x = BORDER;
    let divider_x = left_x + col_w;
    let right_x = divider_x + 1.0;

    // Info column: measured first, then centred vertically once the main
    // section height is known.
    let name_style = TextStyle::new(28.0, NAME_COLOR).bold();
    let title_style = TextStyle::new(16.0, TITLE_COLOR);
    let org_style = TextStyle::new(13.0, ACCENT_COLOR).italic();
    let name = text_of(first(root, ".sig-name"));
    let title = text_of(first(root, ".sig-title"));
    let org = text_of(first(root, ".sig-org"));
    let logo = first(root, "img.sig-logo").and_then(|el| {
        let src = el.value().attr("src")?.to_string();
        let (w, h) = image_size(el, natural.get(&src).copied());
        Some((src, w, h))
    });

    let logo_block = logo.as_ref().map(|(_, _, h)| 16.0 + h + 16.0).unwrap_or(0.0);
    let info_h = 20.0
        + name_style.line_height()
        + 8.0
        + 2.0
        + 8.0
        + title_style.line_height()
        + logo_block
        + org_style.line_height();
    let block_w = [
        text_width(&name, name_style.size),
        text_width(&title, title_style.size),
        text_width(&org, org_style.size),
        logo.as_ref().map(|(_, w, _)| *w).unwrap_or(0.0),
    ]
    .into_iter()
    .fold(0.0_f32, f32::max);

    // Contacts column
    let label_style = TextStyle::new(12.0, LABEL_COLOR);
    let mut contacts_y = main_top + CONTACTS_TOP;
    let contact_x = right_x + COLUMN_PADDING;
    let rows: Vec<ElementRef<'_>> = root.select(&sel(".sig-contact")).collect();
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            contacts_y += ROW_GAP;
        }
        let from = attr_color(*row, "data-from").unwrap_or(ACCENT_COLOR);
        let to = attr_color(*row, "data-to").unwrap_or(from);
        col.push(
            Rect::new(contact_x, contacts_y, ROW_HEIGHT, ROW_HEIGHT),
            ElementKind::Badge { from, to },
        );

        let mut x = contact_x + ROW_HEIGHT + 10.0;
        let label = text_of(first(*row, ".sig-label"));
        let ly = contacts_y + (ROW_HEIGHT - label_style.line_height()) / 2.0;
        col.text(x, ly, label.clone(), label_style.clone());
        x += text_width(&label, label_style.size) + 8.0;

        if let Some(value) = first(*row, ".sig-value") {
            let color = if value.value().name() == "a" { ACCENT_COLOR } else { VALUE_COLOR };
            let style = TextStyle::new(13.0, color);
            let vy = contacts_y + (ROW_HEIGHT - style.line_height()) / 2.0;
            col.text(x, vy, value.text().collect(), style);
        }
        contacts_y += ROW_HEIGHT;
    }

    let brands: Vec<(String, f32, f32, f32)> = root
        .select(&sel(".sig-brands img[src]"))
        .filter_map(|el| {
            let src = el.value().attr("src")?.to_string();
            let (w, h) = image_size(el, natural.get(&src).copied());
            let opacity = attr_f32(el, "data-opacity").unwrap_or(1.0);
            Some((src, w, h, opacity))
        })
        .collect();
    if !brands.is_empty() {
        contacts_y += ROW_GAP + BRANDS_TOP;
        let row_h = brands.iter().map(|b| b.2).fold(0.0_f32, f32::max);
        let mut x = contact_x;
        for (i, (src, w, h, opacity)) in brands.into_iter().enumerate() {
            if i > 0 {
                x += BRAND_GAP;
            }
            col.push(
                Rect::new(x, contacts_y + (row_h - h) / 2.0, w, h),
                ElementKind::Image { src, opacity },
            );
            x += w;
        }
        contacts_y += row_h;
    }
    let contacts_h = contacts_y + COLUMN_PADDING - main_top;

    let main_h = (info_h + 2.0 * COLUMN_PADDING).max(contacts_h);

    // Place the info block centred in the left column.
    let cx = left_x + col_w / 2.0;
    let mut y = main_top + (main_h - info_h) / 2.0 + 20.0;
    y += col.text(cx - text_width(&name, name_style.size) / 2.0, y, name, name_style);
    y += 8.0;
    col.push(Rect::new(cx - block_w / 2.0, y, block_w, 2.0), ElementKind::Fill(NAME_COLOR));
    y += 2.0 + 8.0;
    y += col.text(cx - text_width(&title, title_style.size) / 2.0, y, title, title_style);
    if let Some((src, w, h)) = logo {
        y += 16.0;
        col.push(
            Rect::new(cx - w / 2.0, y, w, h),
            ElementKind::Image { src, opacity: 1.0 },
        );
        y += h + 16.0;
    }
    col.text(cx - text_width(&org, org_style.size) / 2.0, y, org, org_style);

    col.push(Rect::new(divider_x, main_top, 1.0, main_h), ElementKind::Fill(DIVIDER_COLOR));

    // Footer
    let footer_top = main_top + main_h;
    if let Some(footer) = first(root, ".sig-footer") {
        col.push(Rect::new(BORDER, footer_top, inner, WAVE_HEIGHT), ElementKind::Wave);
        let style = TextStyle::new(15.0, Rgba::WHITE).bold();
        let label: String = footer.text().collect::<String>().trim().to_string();
        let lw = text_width(&label, style.size);
        let ly = footer_top + 32.0 + (28.0 - style.line_height()) / 2.0;
        col.text(BORDER + inner - 24.0 - lw, ly, label, style);
    }

    let height = footer_top + FOOTER_HEIGHT + BORDER;

    // Border drawn last so content never covers it.
    for r in [
        Rect::new(0.0, 0.0, width, BORDER),
        Rect::new(0.0, height - BORDER, width, BORDER),
        Rect::new(0.0, 0.0, BORDER, height),
        Rect::new(width - BORDER, 0.0, BORDER, height),
    ] {
        col.push(r, ElementKind::Fill(BORDER_COLOR));
    }

    CardLayout {
        width,
        height,
        nodes: col.nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::SignatureDraft;
    use crate::template::{render_card, AssetLocators};

    fn layout(draft: &SignatureDraft, natural: &HashMap<String, (f32, f32)>) -> CardLayout {
        let html = render_card(draft, &AssetLocators::default());
        layout_card(&Html::parse_fragment(&html), 900.0, natural)
    }

    #[test]
    fn card_has_fixed_display_size() {
        let l = layout(&SignatureDraft::default(), &HashMap::new());
        assert_eq!(l.width, 900.0);
        // stripe + contacts column + footer + borders
        assert_eq!(l.height, 1.0 + 12.0 + 334.0 + 76.0 + 1.0);
    }

    #[test]
    fn texts_come_from_markup() {
        let d = SignatureDraft::new("Jane Doe", "Radiologist", "+268 1111 1111", "");
        let l = layout(&d, &HashMap::new());
        let texts: Vec<&str> = l.texts().map(|(_, t)| t).collect();
        assert!(texts.contains(&"Jane Doe"));
        assert!(texts.contains(&"Radiologist"));
        assert!(texts.contains(&"Phone:"));
        assert!(texts.contains(&"+268 1111 1111"));
        assert!(texts.contains(&"Ezulwini Private Hospital"));
    }

    #[test]
    fn name_is_centred_in_the_info_column() {
        let l = layout(&SignatureDraft::default(), &HashMap::new());
        let (rect, _) = l.texts().find(|(_, t)| *t == "Mkhanyisi Simelane").unwrap();
        let centre = rect.x + rect.width / 2.0;
        assert!((centre - (1.0 + 448.5 / 2.0)).abs() < 0.01);
    }

    #[test]
    fn logo_width_follows_natural_aspect() {
        let mut natural = HashMap::new();
        natural.insert("/images/eph-logo.png".to_string(), (300.0, 100.0));
        let l = layout(&SignatureDraft::default(), &natural);
        let (logo, _) = l.images().find(|(_, s)| *s == "/images/eph-logo.png").unwrap();
        assert_eq!((logo.width, logo.height), (144.0, 48.0));

        let (badge, _) = l.images().find(|(_, s)| *s == "/images/cohsasa-badge.png").unwrap();
        assert_eq!((badge.width, badge.height), (40.0, 40.0));
    }
}
