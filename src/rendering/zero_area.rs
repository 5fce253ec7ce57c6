//! Detection of fills with no interior.
//!
//! A filled path whose sub-paths enclose no area rasterizes to
//! nothing, yet viewers are expected to show a hairline. This module
//! recognizes the degenerate shapes (single segments, palindromic
//! scribbles, folded colinear runs) and synthesizes the stroke path
//! the device substitutes for the fill.

use crate::geometry::{Matrix, PointF};
use crate::rendering::path::{Path, Point, PointKind};

/// Hairline substitute for a degenerate fill.
#[derive(Debug, Default)]
pub struct ZeroAreaPath {
    pub path: Path,
    /// Emit with a quarter-alpha stroke.
    pub thin: bool,
    /// The emitted points are already in device space.
    pub set_identity: bool,
}

/// Two- or three-point sub-paths: a bare segment, possibly retraced.
fn check_simple_line_path(
    points: &[Point],
    matrix: Option<&Matrix>,
    adjust: bool,
    out: &mut ZeroAreaPath,
) -> bool {
    if points.len() != 2 && points.len() != 3 {
        return false;
    }
    if points[0].kind != PointKind::Move
        || points[1].kind != PointKind::Line
        || (points.len() == 3 && points[2].kind != PointKind::Line)
    {
        return false;
    }
    if points.len() == 3 && points[0].pos != points[2].pos {
        return false;
    }

    if points[0].pos == points[1].pos {
        // A dot; nothing to draw.
        return true;
    }
    let mut start = points[0].pos;
    let mut end = points[1].pos;
    if adjust {
        if let Some(m) = matrix {
            start = m.transform_point(start);
            end = m.transform_point(end);
            out.set_identity = true;
        }
        start = PointF::new(start.x.trunc() + 0.5, start.y.trunc() + 0.5);
        end = PointF::new(end.x.trunc() + 0.5, end.y.trunc() + 0.5);
    }
    out.path.append_point(start, PointKind::Move);
    out.path.append_point(end, PointKind::Line);
    out.thin = true;
    true
}

/// Odd-length paths that retrace themselves around a midpoint.
fn check_palindromic_path(points: &[Point], out: &mut ZeroAreaPath) -> bool {
    if points.len() <= 3 || points.len() % 2 == 0 {
        return false;
    }
    let mid = points.len() / 2;
    let mut scratch = ZeroAreaPath::default();
    for i in 0..mid {
        let left = points[mid - i - 1];
        let right = points[mid + i + 1];
        if left.kind == PointKind::Bezier
            || right.kind == PointKind::Bezier
            || left.pos != right.pos
        {
            return false;
        }
        scratch.path.append_point(points[mid - i].pos, PointKind::Move);
        scratch.path.append_point(left.pos, PointKind::Line);
    }
    *out = scratch;
    out.thin = true;
    true
}

fn is_folding_vertical_line(prev: PointF, cur: PointF, next: PointF) -> bool {
    if prev.x != cur.x || cur.x != next.x {
        return false;
    }
    (cur.y - prev.y) * (cur.y - next.y) > 0.0
}

fn is_folding_horizontal_line(prev: PointF, cur: PointF, next: PointF) -> bool {
    if prev.y != cur.y || cur.y != next.y {
        return false;
    }
    (cur.x - prev.x) * (cur.x - next.x) > 0.0
}

fn is_folding_diagonal_line(prev: PointF, cur: PointF, next: PointF) -> bool {
    prev.x != cur.x
        && next.x != cur.x
        && prev.y != cur.y
        && next.y != cur.y
        && (prev.y - cur.y) * (next.x - cur.x) == (next.y - cur.y) * (prev.x - cur.x)
}

/// Scans one sub-path for a zero-area hairline substitute. Returns
/// `None` when the sub-path encloses area and needs a real fill.
pub fn zero_area_path(points: &[Point], matrix: Option<&Matrix>, adjust: bool) -> Option<ZeroAreaPath> {
    if points.len() < 2 {
        return None;
    }
    let mut out = ZeroAreaPath::default();
    if check_simple_line_path(points, matrix, adjust, &mut out) {
        return Some(out);
    }
    if check_palindromic_path(points, &mut out) {
        return Some(out);
    }

    let mut out = ZeroAreaPath::default();
    let mut i = 0usize;
    while i < points.len() {
        let kind = points[i].kind;
        if kind == PointKind::Move {
            debug_assert_eq!(0, i);
            i += 1;
            continue;
        }
        if kind == PointKind::Bezier {
            debug_assert!(i + 2 < points.len());
            i += 3;
            continue;
        }
        debug_assert_eq!(kind, PointKind::Line);
        let next_index = (i + 1) % points.len();
        let next = points[next_index];
        if next.kind != PointKind::Bezier && next.kind != PointKind::Move {
            let prev = points[i - 1];
            let cur = points[i];
            if is_folding_vertical_line(prev.pos, cur.pos, next.pos) {
                let use_prev = (cur.pos.y - prev.pos.y).abs() < (cur.pos.y - next.pos.y).abs();
                let start = if use_prev { prev.pos } else { cur.pos };
                let end = if use_prev { cur.pos } else { next.pos };
                out.path.append_point(start, PointKind::Move);
                out.path.append_point(end, PointKind::Line);
            } else if is_folding_horizontal_line(prev.pos, cur.pos, next.pos)
                || is_folding_diagonal_line(prev.pos, cur.pos, next.pos)
            {
                let use_prev = (cur.pos.x - prev.pos.x).abs() < (cur.pos.x - next.pos.x).abs();
                let start = if use_prev { prev.pos } else { cur.pos };
                let end = if use_prev { cur.pos } else { next.pos };
                out.path.append_point(start, PointKind::Move);
                out.path.append_point(end, PointKind::Line);
            }
        }
        i += 1;
    }
    if out.path.is_empty() {
        // No fold anywhere; the sub-path encloses area.
        return None;
    }
    if points.len() > 3 {
        out.thin = true;
    }
    Some(out)
}
