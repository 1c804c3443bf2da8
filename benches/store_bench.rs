use criterion::{black_box, criterion_group, criterion_main, Criterion};
use imgfs::store::{CreateOptions, ImgFs};
use imgfs::Resolution;

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([90, 90, 200]));
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 90)
        .encode_image(&img)
        .unwrap();
    out
}

fn bench_store(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.imgfs");
    let mut fs = ImgFs::create(&path, CreateOptions::default()).unwrap();

    let blob = jpeg(1024, 768);
    fs.insert(&blob, "bench").unwrap();
    // Materialize the thumbnail so the read benches measure pure I/O.
    fs.read("bench", Resolution::Thumb).unwrap();

    c.bench_function("read_original", |b| {
        b.iter(|| fs.read(black_box("bench"), Resolution::Orig).unwrap())
    });
    c.bench_function("read_thumbnail_cached", |b| {
        b.iter(|| fs.read(black_box("bench"), Resolution::Thumb).unwrap())
    });
}

criterion_group!(benches, bench_store);
criterion_main!(benches);
