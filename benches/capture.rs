use criterion::{black_box, criterion_group, criterion_main, Criterion};
use optical_scan::capture::{DisplaySurface, FrameCapture, MockStream, MockSurface, RasterBuffer};
use optical_scan::decode::{classify, DecodeError};

fn bench_capture(c: &mut Criterion) {
    let (mut surface, _controller) = MockSurface::manual(640, 480);
    surface.bind(&MockStream::new("bench-stream"));
    let mut capture = FrameCapture::new();

    c.bench_function("capture_640x480", |b| {
        b.iter(|| black_box(capture.capture(&surface).sequence()))
    });
}

fn bench_luminance(c: &mut Criterion) {
    let buffer = RasterBuffer::new(640, 480);

    c.bench_function("luminance_640x480", |b| b.iter(|| black_box(buffer.luminance())));
}

fn bench_classify(c: &mut Criterion) {
    c.bench_function("classify_not_found", |b| {
        b.iter(|| black_box(classify(Err(DecodeError::NotFound))))
    });
}

criterion_group!(benches, bench_capture, bench_luminance, bench_classify);
criterion_main!(benches);
