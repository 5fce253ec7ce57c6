use pdf_gfx::geometry::{Matrix, PointF};
use pdf_gfx::rendering::{Path, PointKind};
use proptest::prelude::*;

fn rect_path(left: f32, bottom: f32, right: f32, top: f32) -> Path {
    let mut path = Path::new();
    path.append_rect(left, bottom, right, top);
    path
}

proptest! {
    #[test]
    fn appended_rects_are_recognized(
        left in -1000.0f32..1000.0,
        bottom in -1000.0f32..1000.0,
        width in 0.001f32..1000.0,
        height in 0.001f32..1000.0,
    ) {
        let path = rect_path(left, bottom, left + width, bottom + height);
        prop_assert!(path.is_rect());
        let rect = path.get_rect(None).unwrap();
        prop_assert_eq!(rect.left, left);
        prop_assert_eq!(rect.bottom, bottom);
        prop_assert_eq!(rect.right, left + width);
        prop_assert_eq!(rect.top, bottom + height);
    }

    #[test]
    fn scale_translate_keeps_rects_axis_aligned(
        sx in 0.1f32..10.0,
        sy in 0.1f32..10.0,
        dx in -100.0f32..100.0,
        dy in -100.0f32..100.0,
    ) {
        let path = rect_path(1.0, 2.0, 5.0, 7.0);
        let matrix = Matrix::new(sx, 0.0, 0.0, sy, dx, dy);
        prop_assert!(path.get_rect(Some(&matrix)).is_some());
    }

    #[test]
    fn shear_disqualifies_rects(shear in 0.01f32..10.0) {
        let path = rect_path(1.0, 2.0, 5.0, 7.0);
        let matrix = Matrix::new(1.0, shear, 0.0, 1.0, 0.0, 0.0);
        prop_assert!(path.get_rect(Some(&matrix)).is_none());
    }

    #[test]
    fn stroke_bounds_contain_fill_bounds(
        coords in proptest::collection::vec((-500.0f32..500.0, -500.0f32..500.0), 2..20),
        line_width in 0.0f32..50.0,
    ) {
        let mut path = Path::new();
        for (i, &(x, y)) in coords.iter().enumerate() {
            let kind = if i == 0 { PointKind::Move } else { PointKind::Line };
            path.append_point(PointF::new(x, y), kind);
        }
        let fill = path.bounding_box();
        let stroke = path.bounding_box_for_stroke(line_width, 10.0);
        prop_assert!(stroke.left <= fill.left);
        prop_assert!(stroke.right >= fill.right);
    }

    #[test]
    fn transform_round_trips_through_inverse_scale(
        sx in 0.5f32..4.0,
        x in -100.0f32..100.0,
        y in -100.0f32..100.0,
    ) {
        let matrix = Matrix::new(sx, 0.0, 0.0, sx, 0.0, 0.0);
        let p = matrix.transform_point(PointF::new(x, y));
        let back = Matrix::new(1.0 / sx, 0.0, 0.0, 1.0 / sx, 0.0, 0.0).transform_point(p);
        prop_assert!((back.x - x).abs() < 1e-2);
        prop_assert!((back.y - y).abs() < 1e-2);
    }
}
