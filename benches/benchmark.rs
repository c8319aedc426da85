use criterion::{criterion_group, criterion_main, Criterion};
use heif_image_plugin::engine::convert::{from_native, to_encode_frame};
use heif_image_plugin::engine::format::detect;
use heif_image_plugin::codecs::{NativeImage, PixelLayout};
use image::{DynamicImage, GrayAlphaImage, RgbImage};
use std::hint::black_box;

#[path = "../tests/common/mod.rs"]
mod common;

fn bench_detect(c: &mut Criterion) {
    let heic = b"\x00\x00\x00\x18ftypheic\x00\x00\x00\x00mif1heic".to_vec();
    let png = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR\x00\x00\x00\x10".to_vec();
    c.bench_function("detect heic", |b| b.iter(|| detect(black_box(&heic))));
    c.bench_function("detect png", |b| b.iter(|| detect(black_box(&png))));
}

fn bench_convert(c: &mut Criterion) {
    let rgb = DynamicImage::ImageRgb8(RgbImage::new(1024, 1024));
    let gray_alpha = DynamicImage::ImageLumaA8(GrayAlphaImage::new(1024, 1024));
    c.bench_function("to_encode_frame rgb8 1024", |b| {
        b.iter(|| to_encode_frame(black_box(&rgb)).map(|f| f.data.len()))
    });
    c.bench_function("to_encode_frame la8 1024", |b| {
        b.iter(|| to_encode_frame(black_box(&gray_alpha)).map(|f| f.data.len()))
    });

    let padded = NativeImage {
        layout: PixelLayout::Rgba8,
        width: 1000,
        height: 1000,
        stride: 4096,
        data: vec![0; 4096 * 1000],
    };
    c.bench_function("from_native padded rgba 1000", |b| {
        b.iter(|| from_native(black_box(padded.clone())).map(|p| p.data.len()))
    });
}

fn bench_open_load(c: &mut Criterion) {
    let plugin = heif_image_plugin::HeifPlugin::new(common::FakeCodec::new());
    let data = common::ContainerBuilder::rgb(512, 512).build();
    c.bench_function("open + load 512 (fake codec)", |b| {
        b.iter(|| {
            let mut image = plugin.open_bytes(black_box(data.clone())).ok()?;
            image.load().ok().map(|loaded| loaded.pixels.data.len())
        })
    });
}

criterion_group!(benches, bench_detect, bench_convert, bench_open_load);
criterion_main!(benches);
