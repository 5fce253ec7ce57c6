use criterion::{Criterion, black_box, criterion_group, criterion_main};
use pdf_gfx::geometry::{Matrix, PointF};
use pdf_gfx::rendering::{Path, PointKind};

fn rect_path() -> Path {
    let mut path = Path::new();
    path.append_rect(10.0, 10.0, 200.0, 150.0);
    path
}

fn zigzag_path(segments: usize) -> Path {
    let mut path = Path::new();
    path.append_point(PointF::new(0.0, 0.0), PointKind::Move);
    for i in 1..=segments {
        let y = if i % 2 == 0 { 0.0 } else { 5.0 };
        path.append_point(PointF::new(i as f32, y), PointKind::Line);
    }
    path
}

fn bench_rect_detection(c: &mut Criterion) {
    let path = rect_path();
    let matrix = Matrix::new(2.0, 0.0, 0.0, 3.0, 5.0, 7.0);
    c.bench_function("get_rect_identity", |b| {
        b.iter(|| black_box(&path).get_rect(None))
    });
    c.bench_function("get_rect_scaled", |b| {
        b.iter(|| black_box(&path).get_rect(Some(black_box(&matrix))))
    });
}

fn bench_stroke_bounds(c: &mut Criterion) {
    let path = zigzag_path(200);
    c.bench_function("bounding_box_for_stroke", |b| {
        b.iter(|| black_box(&path).bounding_box_for_stroke(black_box(2.5), 10.0))
    });
}

fn bench_zero_area_scan(c: &mut Criterion) {
    let path = zigzag_path(200);
    c.bench_function("zero_area_scan", |b| {
        b.iter(|| pdf_gfx::rendering::zero_area_path(black_box(path.points()), None, false))
    });
}

criterion_group!(
    benches,
    bench_rect_detection,
    bench_stroke_bounds,
    bench_zero_area_scan
);
criterion_main!(benches);
