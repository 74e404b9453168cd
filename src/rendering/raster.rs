/// tiny-skia rasterizer for the signature card, plus PNG encoding
use crate::assets::{ImageData, LoadedImage};
use crate::region::Region;
use crate::rendering::layout::{Rect, TextStyle, ADVANCE, GLYPH_HEIGHT};
use crate::rendering::paint::{build_display_list, Fill, PaintCommand, PathSegment};
use crate::rendering::{Bitmap, RasterOptions, Rasterizer, Rgba, Screenshot};
use crate::{Error, Result};
use font8x8::UnicodeFonts;
use resvg::tiny_skia::{
    self, Color, ColorU8, FillRule, FilterQuality, GradientStop, IntSize, LinearGradient, Mask,
    Paint, PathBuilder, Pixmap, PixmapPaint, Point, SpreadMode, Transform,
};
use resvg::usvg;
use std::collections::HashMap;

fn color(c: Rgba) -> Color {
    Color::from_rgba8(c.0, c.1, c.2, c.3)
}

fn paint_for(fill: &Fill) -> Option<Paint<'static>> {
    let mut paint = Paint {
        anti_alias: true,
        ..Paint::default()
    };
    match fill {
        Fill::Solid(c) => paint.set_color(color(*c)),
        Fill::Linear { start, end, stops } => {
            let stops = stops
                .iter()
                .map(|(offset, c)| GradientStop::new(*offset, color(*c)))
                .collect();
            paint.shader = LinearGradient::new(
                Point::from_xy(start.0, start.1),
                Point::from_xy(end.0, end.1),
                stops,
                SpreadMode::Pad,
                Transform::identity(),
            )?;
        }
    }
    Some(paint)
}

fn glyph(c: char) -> [u8; 8] {
    font8x8::BASIC_FONTS
        .get(c)
        .or_else(|| font8x8::LATIN_FONTS.get(c))
        .or_else(|| font8x8::BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Outline of `text` as one path of glyph-bit runs, so adjacent bits never seam.
fn text_path(x: f32, y: f32, text: &str, style: &TextStyle) -> Option<tiny_skia::Path> {
    let bit_w = style.size * ADVANCE / 8.0;
    let bit_h = style.size * GLYPH_HEIGHT / 8.0;
    let line_h = (style.size * 1.25).round();
    let top = y + (line_h - style.size * GLYPH_HEIGHT) / 2.0;
    let embolden = if style.bold { bit_w * 0.5 } else { 0.0 };

    let mut pb = PathBuilder::new();
    for (i, c) in text.chars().enumerate() {
        let gx = x + i as f32 * style.size * ADVANCE;
        for (row, bits) in glyph(c).iter().enumerate() {
            let shear = if style.italic { (7 - row) as f32 * bit_w * 0.25 } else { 0.0 };
            let ry = top + row as f32 * bit_h;
            let mut bit = 0;
            while bit < 8 {
                if bits & (1 << bit) == 0 {
                    bit += 1;
                    continue;
                }
                let start = bit;
                while bit < 8 && bits & (1 << bit) != 0 {
                    bit += 1;
                }
                let rx = gx + shear + start as f32 * bit_w;
                let rw = (bit - start) as f32 * bit_w + embolden;
                if let Some(r) = tiny_skia::Rect::from_xywh(rx, ry, rw, bit_h) {
                    pb.push_rect(r);
                }
            }
        }
    }
    pb.finish()
}

fn build_path(segments: &[PathSegment]) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    for s in segments {
        match *s {
            PathSegment::MoveTo(x, y) => pb.move_to(x, y),
            PathSegment::LineTo(x, y) => pb.line_to(x, y),
            PathSegment::CubicTo(x1, y1, x2, y2, x, y) => pb.cubic_to(x1, y1, x2, y2, x, y),
            PathSegment::Close => pb.close(),
        }
    }
    pb.finish()
}

fn pixmap_from_rgba(img: &image::RgbaImage) -> Option<Pixmap> {
    let mut data = Vec::with_capacity(img.as_raw().len());
    for p in img.pixels() {
        let c = ColorU8::from_rgba(p[0], p[1], p[2], p[3]).premultiply();
        data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    Pixmap::from_vec(data, IntSize::from_wh(img.width(), img.height())?)
}

/// Render an SVG straight at device resolution.
fn pixmap_from_svg(svg: &[u8], width: u32, height: u32) -> Result<Pixmap> {
    let tree = usvg::Tree::from_data(svg, &usvg::Options::default())
        .map_err(|e| Error::RenderError(format!("SVG parse failed: {}", e)))?;
    let mut pixmap = Pixmap::new(width.max(1), height.max(1))
        .ok_or_else(|| Error::RenderError("cannot allocate SVG surface".into()))?;
    let size = tree.size();
    let t = Transform::from_scale(width as f32 / size.width(), height as f32 / size.height());
    resvg::render(&tree, t, &mut pixmap.as_mut());
    Ok(pixmap)
}

/// Reject images the canvas may not read.
///
/// A cross-origin image is readable only when CORS is honoured, the element
/// requests it (`crossorigin`) and the server approved the read.
pub fn check_taint(region: &Region, options: &RasterOptions) -> Result<()> {
    if options.allow_taint {
        return Ok(());
    }
    for el in region.images() {
        let img = el.loaded().ok_or_else(|| {
            Error::RenderError(format!("image {} is not ready", el.src()))
        })?;
        let readable = !img.cross_origin
            || (options.use_cors && el.cross_origin().is_some() && img.cors_approved);
        if !readable {
            return Err(Error::Tainted(el.src().to_string()));
        }
    }
    Ok(())
}

/// Pure-Rust rasterizer built on tiny-skia (and resvg for SVG images).
#[derive(Debug, Default, Clone, Copy)]
pub struct TinySkiaRasterizer;

impl TinySkiaRasterizer {
    pub fn new() -> Self {
        TinySkiaRasterizer
    }

    fn draw_image(
        &self,
        pixmap: &mut Pixmap,
        img: &LoadedImage,
        rect: &Rect,
        opacity: f32,
        scale: f32,
    ) -> Result<()> {
        let paint = PixmapPaint {
            opacity,
            quality: FilterQuality::Bicubic,
            ..PixmapPaint::default()
        };
        match &img.data {
            ImageData::Raster(rgba) => {
                if rgba.width() == 0 || rgba.height() == 0 {
                    return Ok(());
                }
                let src = pixmap_from_rgba(rgba)
                    .ok_or_else(|| Error::RenderError(format!("bad pixels in {}", img.src)))?;
                let t = Transform::from_row(
                    rect.width / rgba.width() as f32,
                    0.0,
                    0.0,
                    rect.height / rgba.height() as f32,
                    rect.x,
                    rect.y,
                );
                pixmap.draw_pixmap(0, 0, src.as_ref(), &paint, Transform::from_scale(scale, scale).pre_concat(t), None);
            }
            ImageData::Vector { svg, .. } => {
                let w = (rect.width * scale).round() as u32;
                let h = (rect.height * scale).round() as u32;
                if w == 0 || h == 0 {
                    return Ok(());
                }
                let src = pixmap_from_svg(svg, w, h)?;
                pixmap.draw_pixmap(
                    0,
                    0,
                    src.as_ref(),
                    &paint,
                    Transform::from_translate(rect.x * scale, rect.y * scale),
                    None,
                );
            }
        }
        Ok(())
    }

    fn execute(
        &self,
        pixmap: &mut Pixmap,
        cmds: &[PaintCommand],
        images: &HashMap<String, LoadedImage>,
        scale: f32,
    ) -> Result<()> {
        let transform = Transform::from_scale(scale, scale);
        for cmd in cmds {
            match cmd {
                PaintCommand::SolidRect { x, y, width, height, rgba } => {
                    if let (Some(r), Some(paint)) = (
                        tiny_skia::Rect::from_xywh(*x, *y, *width, *height),
                        paint_for(&Fill::Solid(*rgba)),
                    ) {
                        pixmap.fill_rect(r, &paint, transform, None);
                    }
                }
                PaintCommand::Circle { cx, cy, radius, fill } => {
                    if let (Some(path), Some(paint)) =
                        (PathBuilder::from_circle(*cx, *cy, *radius), paint_for(fill))
                    {
                        pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
                    }
                }
                PaintCommand::Path { segments, fill, clip } => {
                    let (Some(path), Some(paint)) = (build_path(segments), paint_for(fill)) else {
                        continue;
                    };
                    let mask = match clip {
                        Some(c) => {
                            let mut mask = Mask::new(pixmap.width(), pixmap.height()).ok_or_else(
                                || Error::RenderError("cannot allocate clip mask".into()),
                            )?;
                            if let Some(clip_path) = tiny_skia::Rect::from_xywh(c.x, c.y, c.width, c.height)
                                .map(PathBuilder::from_rect)
                            {
                                mask.fill_path(&clip_path, FillRule::Winding, true, transform);
                            }
                            Some(mask)
                        }
                        None => None,
                    };
                    pixmap.fill_path(&path, &paint, FillRule::Winding, transform, mask.as_ref());
                }
                PaintCommand::Text { x, y, text, style } => {
                    if let (Some(path), Some(paint)) =
                        (text_path(*x, *y, text, style), paint_for(&Fill::Solid(style.color)))
                    {
                        pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
                    }
                }
                PaintCommand::Image { src, rect, opacity } => {
                    let img = images
                        .get(src)
                        .ok_or_else(|| Error::RenderError(format!("image {} is not ready", src)))?;
                    self.draw_image(pixmap, img, rect, *opacity, scale)?;
                }
            }
        }
        Ok(())
    }
}

impl Rasterizer for TinySkiaRasterizer {
    fn rasterize(&self, region: &Region, options: &RasterOptions) -> Result<Bitmap> {
        if !(options.scale.is_finite() && options.scale > 0.0) {
            return Err(Error::ConfigError(format!("invalid scale {}", options.scale)));
        }
        check_taint(region, options)?;

        let images: HashMap<String, LoadedImage> = region
            .images()
            .iter()
            .filter_map(|el| el.loaded().map(|img| (el.src().to_string(), img)))
            .collect();

        let layout = region.layout();
        let width = (layout.width * options.scale).round() as u32;
        let height = (layout.height * options.scale).round() as u32;
        log::debug!(
            "rasterizing {}x{} region at {}x -> {}x{}",
            layout.width,
            layout.height,
            options.scale,
            width,
            height
        );

        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            Error::RenderError(format!("cannot allocate {}x{} bitmap", width, height))
        })?;
        pixmap.fill(color(Rgba(options.background.0, options.background.1, options.background.2, 255)));

        let cmds = build_display_list(&layout);
        self.execute(&mut pixmap, &cmds, &images, options.scale)?;

        let mut pixels = Vec::with_capacity(pixmap.data().len());
        for p in pixmap.pixels() {
            let c = p.demultiply();
            pixels.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        Ok(Bitmap { width, height, pixels })
    }
}

/// Encode losslessly as an 8-bit RGB PNG. Alpha is dropped: captures are
/// always painted over an opaque background.
pub fn encode_png(bitmap: &Bitmap) -> Result<Screenshot> {
    let rgb: Vec<u8> = bitmap
        .pixels
        .chunks_exact(4)
        .flat_map(|p| [p[0], p[1], p[2]])
        .collect();

    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, bitmap.width, bitmap.height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Best);
        let mut writer = encoder
            .write_header()
            .map_err(|e| Error::RenderError(format!("PNG header: {}", e)))?;
        writer
            .write_image_data(&rgb)
            .map_err(|e| Error::RenderError(format!("PNG encode: {}", e)))?;
    }

    Ok(Screenshot {
        width: bitmap.width,
        height: bitmap.height,
        png_data,
    })
}
