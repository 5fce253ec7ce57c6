//! Geometric primitives shared by the rendering layer.
//!
//! Coordinates follow PDF conventions: page space is y-up with
//! fractional coordinates ([`FloatRect`]), device space is y-down with
//! integer pixel bounds ([`RectI`]). The 2x3 affine [`Matrix`] maps
//! between the two.

/// A point with fractional coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl PointF {
    pub fn new(x: f32, y: f32) -> Self {
        PointF { x, y }
    }
}

/// A point on the integer pixel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointI {
    pub x: i32,
    pub y: i32,
}

impl PointI {
    pub fn new(x: i32, y: i32) -> Self {
        PointI { x, y }
    }
}

/// 2x3 affine transform. Maps `(x, y)` to
/// `(a*x + c*y + e, b*x + d*y + f)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix::identity()
    }
}

impl Matrix {
    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Matrix { a, b, c, d, e, f }
    }

    pub fn identity() -> Self {
        Matrix::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub fn is_identity(&self) -> bool {
        *self == Matrix::identity()
    }

    /// Returns the transform that applies `self` first, then `other`.
    pub fn combined(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    /// Appends `other`, so that `other` applies after `self`.
    pub fn concat(&mut self, other: &Matrix) {
        *self = self.combined(other);
    }

    /// Prepends a scale, so that the scale applies before `self`.
    pub fn scale(&mut self, sx: f32, sy: f32) {
        self.a *= sx;
        self.b *= sx;
        self.c *= sy;
        self.d *= sy;
    }

    /// Appends a translation in the target space.
    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.e += dx;
        self.f += dy;
    }

    pub fn transform_point(&self, p: PointF) -> PointF {
        PointF {
            x: self.a * p.x + self.c * p.y + self.e,
            y: self.b * p.x + self.d * p.y + self.f,
        }
    }

    /// Transforms a rectangle and returns its axis-aligned bounds.
    pub fn transform_rect(&self, rect: &FloatRect) -> FloatRect {
        let corners = [
            PointF::new(rect.left, rect.bottom),
            PointF::new(rect.left, rect.top),
            PointF::new(rect.right, rect.top),
            PointF::new(rect.right, rect.bottom),
        ];
        let mut out = FloatRect::from_point(self.transform_point(corners[0]));
        for corner in &corners[1..] {
            out.update(self.transform_point(*corner));
        }
        out
    }
}

/// Fractional rectangle in y-up space: `bottom <= top` once normalized.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FloatRect {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl FloatRect {
    pub fn new(left: f32, bottom: f32, right: f32, top: f32) -> Self {
        FloatRect {
            left,
            bottom,
            right,
            top,
        }
    }

    /// A degenerate rectangle covering a single point.
    pub fn from_point(p: PointF) -> Self {
        FloatRect::new(p.x, p.y, p.x, p.y)
    }

    /// Grows the rectangle to contain `p`.
    pub fn update(&mut self, p: PointF) {
        self.left = self.left.min(p.x);
        self.right = self.right.max(p.x);
        self.bottom = self.bottom.min(p.y);
        self.top = self.top.max(p.y);
    }

    pub fn normalize(&mut self) {
        if self.left > self.right {
            std::mem::swap(&mut self.left, &mut self.right);
        }
        if self.bottom > self.top {
            std::mem::swap(&mut self.bottom, &mut self.top);
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    /// Smallest device-space pixel rectangle containing `self`.
    pub fn outer_rect(&self) -> RectI {
        RectI {
            left: self.left.floor() as i32,
            top: self.bottom.floor() as i32,
            right: self.right.ceil() as i32,
            bottom: self.top.ceil() as i32,
        }
    }
}

/// Integer rectangle in y-down device space: `top` is the smaller
/// coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RectI {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl RectI {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        RectI {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// False when either extent overflows i32.
    pub fn valid(&self) -> bool {
        self.right.checked_sub(self.left).is_some() && self.bottom.checked_sub(self.top).is_some()
    }

    pub fn intersect(&mut self, other: &RectI) {
        self.left = self.left.max(other.left);
        self.top = self.top.max(other.top);
        self.right = self.right.min(other.right);
        self.bottom = self.bottom.min(other.bottom);
        if self.is_empty() {
            *self = RectI::new(self.left, self.top, self.left, self.top);
        }
    }
}
