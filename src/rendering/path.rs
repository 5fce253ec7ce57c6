//! Vector path storage and geometric queries.
//!
//! A [`Path`] is a flat point array; sub-paths start at `Move` points
//! and Bezier segments occupy three consecutive `Bezier` points. The
//! interesting work here is rectangle recognition (which feeds the
//! device's fill-rect fast path) and the stroke-aware bounding box
//! used to size offscreen compositing surfaces.

use smallvec::SmallVec;

use crate::geometry::{FloatRect, Matrix, PointF};

/// Segment type of a path point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointKind {
    Move,
    Line,
    Bezier,
}

/// One entry of the point array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub pos: PointF,
    pub kind: PointKind,
    pub close_figure: bool,
}

impl Point {
    pub fn new(pos: PointF, kind: PointKind) -> Self {
        Point {
            pos,
            kind,
            close_figure: false,
        }
    }

    /// True for a point of the given kind that does not close its
    /// figure.
    pub fn is_open(&self, kind: PointKind) -> bool {
        self.kind == kind && !self.close_figure
    }
}

fn xy_both_differ(a: PointF, b: PointF) -> bool {
    a.x != b.x && a.y != b.y
}

fn rect_from_corners(a: PointF, c: PointF) -> FloatRect {
    let mut rect = FloatRect::new(a.x, a.y, c.x, c.y);
    rect.normalize();
    rect
}

/// A 4-point ring, or a 5-point ring whose ends coincide, whose later
/// points are all line segments, and whose opposing corners do not
/// collapse.
fn is_rect_candidate(points: &[Point]) -> bool {
    let len = points.len();
    if len != 4 && len != 5 {
        return false;
    }
    if len == 5 && points[0].pos != points[4].pos {
        return false;
    }
    if points[0].pos == points[2].pos || points[1].pos == points[3].pos {
        return false;
    }
    points[1..].iter().all(|p| p.kind == PointKind::Line)
}

fn is_rect_impl(points: &[Point]) -> bool {
    if !is_rect_candidate(points) {
        return false;
    }
    for i in 1..4 {
        if xy_both_differ(points[i].pos, points[i - 1].pos) {
            return false;
        }
    }
    !xy_both_differ(points[0].pos, points[3].pos)
}

/// Collapses zero-length line segments out of a closed ring. Fails when
/// the ring is not closed or more than five points survive.
fn normalized_points(points: &[Point]) -> Option<SmallVec<[Point; 6]>> {
    if points[0].pos != points[points.len() - 1].pos {
        return None;
    }
    let mut out: SmallVec<[Point; 6]> = SmallVec::new();
    for point in points {
        if let Some(last) = out.last() {
            if point.kind == PointKind::Line
                && !point.close_figure
                && !last.close_figure
                && point.pos == last.pos
            {
                continue;
            }
            if out.len() == 5 {
                return None;
            }
        }
        out.push(*point);
    }
    Some(out)
}

const VERTICAL_SLOPE_THRESHOLD: f32 = 1.0 / 20.0;

fn length(dx: f32, dy: f32) -> f32 {
    (dx * dx + dy * dy).sqrt()
}

/// Accounts for the cap excursion of a stroked segment ending at
/// `end_pos`.
fn update_line_end_points(rect: &mut FloatRect, start_pos: PointF, end_pos: PointF, half_width: f32) {
    if start_pos.x == end_pos.x {
        if start_pos.y == end_pos.y {
            rect.update(PointF::new(end_pos.x + half_width, end_pos.y + half_width));
            rect.update(PointF::new(end_pos.x - half_width, end_pos.y - half_width));
            return;
        }
        let point_y = if end_pos.y < start_pos.y {
            end_pos.y - half_width
        } else {
            end_pos.y + half_width
        };
        rect.update(PointF::new(end_pos.x + half_width, point_y));
        rect.update(PointF::new(end_pos.x - half_width, point_y));
        return;
    }
    if start_pos.y == end_pos.y {
        let point_x = if end_pos.x < start_pos.x {
            end_pos.x - half_width
        } else {
            end_pos.x + half_width
        };
        rect.update(PointF::new(point_x, end_pos.y + half_width));
        rect.update(PointF::new(point_x, end_pos.y - half_width));
        return;
    }
    let dx = end_pos.x - start_pos.x;
    let dy = end_pos.y - start_pos.y;
    let ll = length(dx, dy);
    let mx = end_pos.x + half_width * dx / ll;
    let my = end_pos.y + half_width * dy / ll;
    let dx1 = half_width * dy / ll;
    let dy1 = half_width * dx / ll;
    rect.update(PointF::new(mx - dx1, my + dy1));
    rect.update(PointF::new(mx + dx1, my - dy1));
}

/// Accounts for the join excursion of two stroked segments meeting at
/// `mid`, using the intersection of the offset line equations.
fn update_line_join_points(
    rect: &mut FloatRect,
    start: PointF,
    mid: PointF,
    end: PointF,
    half_width: f32,
) {
    let start_vert = (start.x - mid.x).abs() < VERTICAL_SLOPE_THRESHOLD;
    let end_vert = (mid.x - end.x).abs() < VERTICAL_SLOPE_THRESHOLD;
    if start_vert && end_vert {
        let dir = if mid.y > start.y { 1.0 } else { -1.0 };
        let point_y = mid.y + half_width * dir;
        rect.update(PointF::new(mid.x + half_width, point_y));
        rect.update(PointF::new(mid.x - half_width, point_y));
        return;
    }

    let mut start_k = 0.0;
    let mut start_c = 0.0;
    let mut start_dc = 0.0;
    let mut end_k = 0.0;
    let mut end_c = 0.0;
    let mut end_dc = 0.0;
    if !start_vert {
        let sx = start.x - mid.x;
        let sy = start.y - mid.y;
        start_k = (mid.y - start.y) / (mid.x - start.x);
        start_c = mid.y - start_k * mid.x;
        start_dc = (half_width * length(sx, sy) / sx).abs();
    }
    if !end_vert {
        let ex = end.x - mid.x;
        let ey = end.y - mid.y;
        end_k = ey / ex;
        end_c = mid.y - end_k * mid.x;
        end_dc = (half_width * length(ex, ey) / ex).abs();
    }

    if start_vert {
        let mut outside = PointF::new(start.x, 0.0);
        if end.x < start.x {
            outside.x += half_width;
        } else {
            outside.x -= half_width;
        }
        if start.y < end_k * start.x + end_c {
            outside.y = end_k * outside.x + end_c + end_dc;
        } else {
            outside.y = end_k * outside.x + end_c - end_dc;
        }
        rect.update(outside);
        return;
    }
    if end_vert {
        let mut outside = PointF::new(end.x, 0.0);
        if start.x < end.x {
            outside.x += half_width;
        } else {
            outside.x -= half_width;
        }
        if end.y < start_k * end.x + start_c {
            outside.y = start_k * outside.x + start_c + start_dc;
        } else {
            outside.y = start_k * outside.x + start_c - start_dc;
        }
        rect.update(outside);
        return;
    }

    let start_outside_c = if end.y < start_k * end.x + start_c {
        start_c + start_dc
    } else {
        start_c - start_dc
    };
    let end_outside_c = if start.y < end_k * start.x + end_c {
        end_c + end_dc
    } else {
        end_c - end_dc
    };
    let join_x = (end_outside_c - start_outside_c) / (start_k - end_k);
    let join_y = start_k * join_x + start_outside_c;
    rect.update(PointF::new(join_x, join_y));
}

/// A vector path stored as a flat point array.
#[derive(Debug, Clone, Default)]
pub struct Path {
    points: Vec<Point>,
}

impl Path {
    pub fn new() -> Self {
        Path::default()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn append_point(&mut self, pos: PointF, kind: PointKind) {
        self.points.push(Point::new(pos, kind));
    }

    pub fn append_point_and_close(&mut self, pos: PointF, kind: PointKind) {
        let mut point = Point::new(pos, kind);
        point.close_figure = true;
        self.points.push(point);
    }

    /// Marks the last point as closing its figure. Idempotent.
    pub fn close_path(&mut self) {
        if let Some(last) = self.points.last_mut() {
            last.close_figure = true;
        }
    }

    /// Appends a line segment, starting a fresh sub-path unless the
    /// path already ends close to `start`.
    pub fn append_line(&mut self, start: PointF, end: PointF) {
        let needs_move = self.points.last().is_none_or(|last| {
            (last.pos.x - start.x).abs() > 0.001 || (last.pos.y - start.y).abs() > 0.001
        });
        if needs_move {
            self.append_point(start, PointKind::Move);
        }
        self.append_point(end, PointKind::Line);
    }

    /// Appends a closed 5-point rectangle ring.
    pub fn append_rect(&mut self, left: f32, bottom: f32, right: f32, top: f32) {
        self.append_point(PointF::new(left, bottom), PointKind::Move);
        self.append_point(PointF::new(left, top), PointKind::Line);
        self.append_point(PointF::new(right, top), PointKind::Line);
        self.append_point(PointF::new(right, bottom), PointKind::Line);
        self.append_point_and_close(PointF::new(left, bottom), PointKind::Line);
    }

    pub fn append_float_rect(&mut self, rect: &FloatRect) {
        self.append_rect(rect.left, rect.bottom, rect.right, rect.top);
    }

    /// Appends another path, transforming the appended points when a
    /// matrix is given.
    pub fn append(&mut self, other: &Path, matrix: Option<&Matrix>) {
        if other.points.is_empty() {
            return;
        }
        let old_len = self.points.len();
        self.points.extend_from_slice(&other.points);
        if let Some(m) = matrix {
            for point in &mut self.points[old_len..] {
                point.pos = m.transform_point(point.pos);
            }
        }
    }

    pub fn transform(&mut self, matrix: &Matrix) {
        for point in &mut self.points {
            point.pos = matrix.transform_point(point.pos);
        }
    }

    pub fn bounding_box(&self) -> FloatRect {
        let Some(first) = self.points.first() else {
            return FloatRect::default();
        };
        let mut rect = FloatRect::from_point(first.pos);
        for point in &self.points[1..] {
            rect.update(point.pos);
        }
        rect
    }

    /// Conservative bounds of the path stroked with `line_width`,
    /// modeling cap and join excursions per segment. `miter_limit` is
    /// accepted for API symmetry; the join model already bounds the
    /// full miter spike.
    pub fn bounding_box_for_stroke(&self, line_width: f32, _miter_limit: f32) -> FloatRect {
        let mut rect = FloatRect::new(100_000.0, 100_000.0, -100_000.0, -100_000.0);
        let points = &self.points;
        let half_width = line_width;
        let mut i = 0;
        while i < points.len() {
            let start;
            let end;
            let mut mid = 0;
            let join;
            if points[i].is_open(PointKind::Move) {
                if i + 1 == points.len() {
                    break;
                }
                start = i + 1;
                end = i;
                join = false;
            } else {
                if points[i].is_open(PointKind::Bezier) {
                    rect.update(points[i].pos);
                    rect.update(points[i + 1].pos);
                    i += 2;
                    if i >= points.len() {
                        break;
                    }
                }
                if i == points.len() - 1 || points[i + 1].is_open(PointKind::Move) {
                    if i == 0 {
                        rect.update(points[i].pos);
                        i += 1;
                        continue;
                    }
                    start = i - 1;
                    end = i;
                    join = false;
                } else {
                    start = i - 1;
                    mid = i;
                    end = i + 1;
                    join = true;
                }
            }
            if join {
                update_line_join_points(
                    &mut rect,
                    points[start].pos,
                    points[mid].pos,
                    points[end].pos,
                    half_width,
                );
            } else {
                update_line_end_points(&mut rect, points[start].pos, points[end].pos, half_width);
            }
            i += 1;
        }
        rect
    }

    /// True when the path is a recognizable axis-aligned rectangle.
    pub fn is_rect(&self) -> bool {
        if self.points.len() > 5 {
            return match normalized_points(&self.points) {
                Some(points) => is_rect_impl(&points),
                None => false,
            };
        }
        is_rect_impl(&self.points)
    }

    /// Returns the rectangle the path outlines, if any. With a matrix,
    /// the shape test runs pre-transform and axis alignment is
    /// re-checked on the transformed points.
    pub fn get_rect(&self, matrix: Option<&Matrix>) -> Option<FloatRect> {
        let normalized;
        let points: &[Point] = if self.points.len() > 5 {
            normalized = normalized_points(&self.points)?;
            &normalized
        } else {
            &self.points
        };

        let Some(m) = matrix else {
            if !is_rect_impl(points) {
                return None;
            }
            return Some(rect_from_corners(points[0].pos, points[2].pos));
        };

        if !is_rect_candidate(points) {
            return None;
        }
        let mut transformed: SmallVec<[PointF; 5]> = SmallVec::new();
        for (i, point) in points.iter().enumerate() {
            let t = m.transform_point(point.pos);
            if i > 0 && xy_both_differ(t, transformed[i - 1]) {
                return None;
            }
            transformed.push(t);
        }
        if xy_both_differ(transformed[0], transformed[3]) {
            return None;
        }
        Some(rect_from_corners(transformed[0], transformed[2]))
    }
}
