/// Display list for the card
use crate::rendering::layout::{CardLayout, ElementKind, Rect, TextStyle};
use crate::rendering::Rgba;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    MoveTo(f32, f32),
    LineTo(f32, f32),
    CubicTo(f32, f32, f32, f32, f32, f32),
    Close,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    Solid(Rgba),
    /// Stops are `(offset, colour)`; the gradient runs from `start` to `end`.
    Linear {
        start: (f32, f32),
        end: (f32, f32),
        stops: Vec<(f32, Rgba)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        rgba: Rgba,
    },
    Circle {
        cx: f32,
        cy: f32,
        radius: f32,
        fill: Fill,
    },
    Path {
        segments: Vec<PathSegment>,
        fill: Fill,
        clip: Option<Rect>,
    },
    Text {
        x: f32,
        y: f32,
        text: String,
        style: TextStyle,
    },
    Image {
        src: String,
        rect: Rect,
        opacity: f32,
    },
}

// Swoosh outlines in a 900x64 box.
const WAVE_BOX: (f32, f32) = (900.0, 64.0);
const WAVE_BODY: &[PathSegment] = &[
    PathSegment::MoveTo(0.0, 64.0),
    PathSegment::CubicTo(120.0, 20.0, 180.0, 35.0, 300.0, 25.0),
    PathSegment::CubicTo(420.0, 15.0, 480.0, 40.0, 600.0, 30.0),
    PathSegment::CubicTo(720.0, 20.0, 780.0, 45.0, 900.0, 35.0),
    PathSegment::LineTo(900.0, 64.0),
    PathSegment::Close,
];
const WAVE_REFLECTION: &[PathSegment] = &[
    PathSegment::MoveTo(0.0, 64.0),
    PathSegment::CubicTo(120.0, 20.0, 180.0, 35.0, 300.0, 25.0),
    PathSegment::CubicTo(420.0, 15.0, 480.0, 40.0, 600.0, 30.0),
    PathSegment::CubicTo(720.0, 20.0, 780.0, 45.0, 900.0, 35.0),
    PathSegment::LineTo(900.0, 50.0),
    PathSegment::CubicTo(780.0, 60.0, 720.0, 35.0, 600.0, 45.0),
    PathSegment::CubicTo(480.0, 55.0, 420.0, 30.0, 300.0, 40.0),
    PathSegment::CubicTo(180.0, 50.0, 120.0, 35.0, 0.0, 79.0),
    PathSegment::Close,
];

fn wave_stops() -> Vec<(f32, Rgba)> {
    vec![
        (0.0, Rgba(0x2d, 0xd4, 0xbf, 255)),
        (0.25, Rgba(0x06, 0xb6, 0xd4, 255)),
        (0.5, Rgba(0x0e, 0xa5, 0xe9, 255)),
        (0.75, Rgba(0x3b, 0x82, 0xf6, 255)),
        (1.0, Rgba(0x1e, 0x40, 0xaf, 255)),
    ]
}

fn reflection_stops() -> Vec<(f32, Rgba)> {
    [(0.0, 0.1), (0.3, 0.3), (0.5, 0.4), (0.7, 0.2), (1.0, 0.05)]
        .into_iter()
        .map(|(o, a)| (o, Rgba::WHITE.with_alpha(a)))
        .collect()
}

/// Map a path from the wave box onto `rect` (non-uniform stretch).
fn fit_path(segments: &[PathSegment], rect: &Rect) -> Vec<PathSegment> {
    let sx = rect.width / WAVE_BOX.0;
    let sy = rect.height / WAVE_BOX.1;
    let p = |x: f32, y: f32| (rect.x + x * sx, rect.y + y * sy);
    segments
        .iter()
        .map(|s| match *s {
            PathSegment::MoveTo(x, y) => {
                let (x, y) = p(x, y);
                PathSegment::MoveTo(x, y)
            }
            PathSegment::LineTo(x, y) => {
                let (x, y) = p(x, y);
                PathSegment::LineTo(x, y)
            }
            PathSegment::CubicTo(x1, y1, x2, y2, x, y) => {
                let (x1, y1) = p(x1, y1);
                let (x2, y2) = p(x2, y2);
                let (x, y) = p(x, y);
                PathSegment::CubicTo(x1, y1, x2, y2, x, y)
            }
            PathSegment::Close => PathSegment::Close,
        })
        .collect()
}

pub fn build_display_list(layout: &CardLayout) -> Vec<PaintCommand> {
    let mut cmds = Vec::with_capacity(layout.nodes.len() + 1);
    for node in &layout.nodes {
        let r = node.rect;
        match &node.kind {
            ElementKind::Fill(rgba) => cmds.push(PaintCommand::SolidRect {
                x: r.x,
                y: r.y,
                width: r.width,
                height: r.height,
                rgba: *rgba,
            }),
            ElementKind::Badge { from, to } => cmds.push(PaintCommand::Circle {
                cx: r.x + r.width / 2.0,
                cy: r.y + r.height / 2.0,
                radius: r.width.min(r.height) / 2.0,
                fill: Fill::Linear {
                    start: (r.x, r.y),
                    end: (r.right(), r.bottom()),
                    stops: vec![(0.0, *from), (1.0, *to)],
                },
            }),
            ElementKind::Text { text, style } => {
                if !text.is_empty() {
                    cmds.push(PaintCommand::Text {
                        x: r.x,
                        y: r.y,
                        text: text.clone(),
                        style: style.clone(),
                    })
                }
            }
            ElementKind::Image { src, opacity } => cmds.push(PaintCommand::Image {
                src: src.clone(),
                rect: r,
                opacity: *opacity,
            }),
            ElementKind::Wave => {
                let gradient = |stops| Fill::Linear {
                    start: (r.x, r.y),
                    end: (r.right(), r.y),
                    stops,
                };
                cmds.push(PaintCommand::Path {
                    segments: fit_path(WAVE_BODY, &r),
                    fill: gradient(wave_stops()),
                    clip: Some(r),
                });
                cmds.push(PaintCommand::Path {
                    segments: fit_path(WAVE_REFLECTION, &r),
                    fill: gradient(reflection_stops()),
                    clip: Some(r),
                });
            }
        }
    }
    cmds
}
