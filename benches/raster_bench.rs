use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use ephsig::assets::{LoadedImage, MemoryLoader};
use ephsig::rendering::raster::{encode_png, TinySkiaRasterizer};
use ephsig::rendering::{RasterOptions, Rasterizer};
use ephsig::template::{render_card, AssetLocators};
use ephsig::{Region, SignatureDraft};

fn card(width: f32) -> Region {
    let assets = AssetLocators::default();
    let solid = |w, h| image::RgbaImage::from_pixel(w, h, image::Rgba([0, 169, 157, 255]));
    let images = vec![
        LoadedImage::raster(&assets.logo, solid(96, 48)),
        LoadedImage::raster(&assets.colored_logo, solid(110, 110)),
        LoadedImage::raster(&assets.badge, solid(40, 40)),
    ];
    Region::preloaded(
        render_card(&SignatureDraft::default(), &assets),
        images,
        Arc::new(MemoryLoader::new()),
        width,
    )
}

fn bench_rasterize(c: &mut Criterion) {
    let region = card(900.0);
    let rasterizer = TinySkiaRasterizer::new();

    let opts = RasterOptions { scale: 1.0, ..Default::default() };
    c.bench_function("rasterize_card_1x", |b| {
        b.iter(|| {
            let _ = rasterizer.rasterize(&region, &opts).unwrap();
        })
    });

    let opts = RasterOptions::default();
    let mut group = c.benchmark_group("export_8x");
    group.sample_size(10);
    group.bench_function("rasterize_encode_card_8x", |b| {
        b.iter(|| {
            let bitmap = rasterizer.rasterize(&region, &opts).unwrap();
            let _ = encode_png(&bitmap).unwrap();
        })
    });
    group.finish();
}

fn bench_layout(c: &mut Criterion) {
    let region = card(900.0);
    c.bench_function("layout_card", |b| {
        b.iter(|| {
            let _ = region.layout();
        })
    });
}

criterion_group!(benches, bench_rasterize, bench_layout);
criterion_main!(benches);
