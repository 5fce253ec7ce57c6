//! Device abstraction and path drawing dispatch.
//!
//! A [`RenderDevice`] wraps a backend [`DeviceDriver`] and routes each
//! draw call to the cheapest primitive the backend supports: cosmetic
//! lines, snapped rectangle fills, synthesized hairlines for
//! zero-area fills, native fill+stroke, or offscreen compositing,
//! before falling back to the generic path rasterizer.

use std::fmt;
use std::ops::{Deref, DerefMut};

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::dib::{Bitmap, Format};
use crate::geometry::{FloatRect, Matrix, PointF, RectI};
use crate::rendering::color::{Argb, argb_alpha, argb_encode};
use crate::rendering::fill_options::FillOptions;
use crate::rendering::graph_state::StrokeState;
use crate::rendering::path::{Path, Point, PointKind};
use crate::rendering::text::{GlyphSource, TextCharPos, TextOptions};
use crate::rendering::zero_area::zero_area_path;

/// Rendering failure. Driver methods report missing capabilities by
/// returning `false`; an error here means the whole operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderError {
    /// No backend capability covers the operation.
    Unsupported,
    /// A scratch bitmap could not be allocated.
    Allocation { width: i32, height: i32 },
    /// A device-space rectangle has overflowing extents.
    InvalidRect,
    /// The backend rejected the operation.
    Backend,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Unsupported => write!(f, "operation not supported by render backend"),
            RenderError::Allocation { width, height } => {
                write!(f, "failed to allocate {width}x{height} scratch bitmap")
            }
            RenderError::InvalidRect => write!(f, "device rectangle overflows"),
            RenderError::Backend => write!(f, "render backend rejected operation"),
        }
    }
}

impl std::error::Error for RenderError {}

pub type RenderResult<T> = Result<T, RenderError>;

/// Kind of output surface behind a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Display,
    Printer,
}

/// PDF blend modes a backend may support natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
}

bitflags! {
    /// Optional backend capabilities probed by the dispatcher.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RenderCaps: u32 {
        /// Pixels can be read back with `get_dibits`.
        const GET_BITS = 1 << 0;
        /// The surface carries an alpha channel.
        const ALPHA_OUTPUT = 1 << 1;
        /// The surface is an 8bpp coverage mask.
        const BYTEMASK_OUTPUT = 1 << 2;
        /// Fill and stroke can be rasterized in one call.
        const FILL_STROKE_PATH = 1 << 3;
        /// Non-normal blend modes are handled natively.
        const BLEND_MODE = 1 << 4;
    }
}

/// Backend interface. Boolean returns are capability probes: `false`
/// asks the device to fall back, it is not an error.
pub trait DeviceDriver {
    fn width(&self) -> i32;
    fn height(&self) -> i32;
    fn bits_per_pixel(&self) -> i32;
    fn render_caps(&self) -> RenderCaps;
    fn device_type(&self) -> DeviceType;

    /// True when synthesized hairlines should be snapped to pixel
    /// centers before stroking.
    fn adjust_hairlines(&self) -> bool {
        false
    }

    fn save_state(&mut self);
    fn restore_state(&mut self, keep_saved: bool);

    /// Current clip bounds, or `None` when the backend does not track
    /// a clip.
    fn clip_box(&self) -> Option<RectI>;
    fn set_clip_path_fill(&mut self, path: &Path, matrix: Option<&Matrix>, options: &FillOptions)
    -> bool;
    fn set_clip_path_stroke(&mut self, path: &Path, matrix: Option<&Matrix>, state: &StrokeState)
    -> bool;

    #[allow(clippy::too_many_arguments)]
    fn draw_path(
        &mut self,
        path: &Path,
        matrix: Option<&Matrix>,
        state: Option<&StrokeState>,
        fill_color: Argb,
        stroke_color: Argb,
        options: &FillOptions,
        blend: BlendMode,
    ) -> bool;

    fn draw_cosmetic_line(&mut self, _p1: PointF, _p2: PointF, _color: Argb, _blend: BlendMode) -> bool {
        false
    }

    fn fill_rect(&mut self, _rect: &RectI, _color: Argb, _blend: BlendMode) -> bool {
        false
    }

    fn get_dibits(&self, _bitmap: &mut Bitmap, _left: i32, _top: i32) -> bool {
        false
    }

    /// Writes `src_rect` of `bitmap` at `(dest_left, dest_top)`.
    /// `color` tints mask bitmaps and is ignored otherwise.
    fn set_dibits(
        &mut self,
        bitmap: &Bitmap,
        color: Argb,
        src_rect: &RectI,
        dest_left: i32,
        dest_top: i32,
        blend: BlendMode,
    ) -> bool;

    #[allow(clippy::too_many_arguments)]
    fn stretch_dibits(
        &mut self,
        _bitmap: &Bitmap,
        _color: Argb,
        _dest_left: i32,
        _dest_top: i32,
        _dest_width: i32,
        _dest_height: i32,
        _clip: &RectI,
        _blend: BlendMode,
    ) -> bool {
        false
    }

    /// Rasterizes a path into a caller-owned bitmap, for offscreen
    /// compositing of combined fill and stroke.
    #[allow(clippy::too_many_arguments)]
    fn draw_path_into(
        &mut self,
        _bitmap: &mut Bitmap,
        _path: &Path,
        _matrix: &Matrix,
        _state: Option<&StrokeState>,
        _fill_color: Argb,
        _stroke_color: Argb,
        _options: &FillOptions,
        _blend: BlendMode,
    ) -> bool {
        false
    }

    /// Platform text rendering, bypassing the glyph compositor.
    fn draw_device_text(
        &mut self,
        _chars: &[TextCharPos],
        _font: &dyn GlyphSource,
        _matrix: &Matrix,
        _font_size: f32,
        _color: Argb,
        _options: &TextOptions,
    ) -> bool {
        false
    }
}

/// Border appearance for [`RenderDevice::draw_border`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderStyle {
    Solid,
    Dash,
    Beveled,
    Inset,
    Underline,
}

/// High-level drawing surface dispatching over a boxed driver.
pub struct RenderDevice {
    driver: Box<dyn DeviceDriver>,
    width: i32,
    height: i32,
    bpp: i32,
    render_caps: RenderCaps,
    device_type: DeviceType,
    clip_box: RectI,
}

impl RenderDevice {
    pub fn new(driver: Box<dyn DeviceDriver>) -> Self {
        let width = driver.width();
        let height = driver.height();
        let mut device = RenderDevice {
            width,
            height,
            bpp: driver.bits_per_pixel(),
            render_caps: driver.render_caps(),
            device_type: driver.device_type(),
            clip_box: RectI::new(0, 0, width, height),
            driver,
        };
        device.update_clip_box();
        device
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn bits_per_pixel(&self) -> i32 {
        self.bpp
    }

    pub fn render_caps(&self) -> RenderCaps {
        self.render_caps
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn clip_box(&self) -> RectI {
        self.clip_box
    }

    pub fn driver(&self) -> &dyn DeviceDriver {
        self.driver.as_ref()
    }

    pub fn driver_mut(&mut self) -> &mut dyn DeviceDriver {
        self.driver.as_mut()
    }

    fn update_clip_box(&mut self) {
        self.clip_box = self
            .driver
            .clip_box()
            .unwrap_or_else(|| RectI::new(0, 0, self.width, self.height));
    }

    pub fn save_state(&mut self) {
        self.driver.save_state();
    }

    pub fn restore_state(&mut self, keep_saved: bool) {
        self.driver.restore_state(keep_saved);
        self.update_clip_box();
    }

    pub fn set_clip_path_fill(
        &mut self,
        path: &Path,
        matrix: Option<&Matrix>,
        options: &FillOptions,
    ) -> RenderResult<()> {
        if !self.driver.set_clip_path_fill(path, matrix, options) {
            return Err(RenderError::Backend);
        }
        self.update_clip_box();
        Ok(())
    }

    pub fn set_clip_path_stroke(
        &mut self,
        path: &Path,
        matrix: Option<&Matrix>,
        state: &StrokeState,
    ) -> RenderResult<()> {
        if !self.driver.set_clip_path_stroke(path, matrix, state) {
            return Err(RenderError::Backend);
        }
        self.update_clip_box();
        Ok(())
    }

    pub fn set_clip_rect(&mut self, rect: &RectI) -> RenderResult<()> {
        let mut path = Path::new();
        path.append_rect(
            rect.left as f32,
            rect.top as f32,
            rect.right as f32,
            rect.bottom as f32,
        );
        self.set_clip_path_fill(&path, None, &FillOptions::winding())
    }

    /// Allocates a bitmap matching the backend's preferred scratch
    /// format.
    pub fn create_compatible_bitmap(&self, width: i32, height: i32) -> Option<Bitmap> {
        let format = if self.render_caps.contains(RenderCaps::BYTEMASK_OUTPUT) {
            Format::Mask8
        } else if self.render_caps.contains(RenderCaps::ALPHA_OUTPUT) {
            Format::Argb
        } else if self.bpp == 8 {
            Format::Mask8
        } else {
            Format::Rgb32
        };
        Bitmap::new(width, height, format)
    }

    pub fn draw_path(
        &mut self,
        path: &Path,
        matrix: Option<&Matrix>,
        state: Option<&StrokeState>,
        fill_color: Argb,
        stroke_color: Argb,
        options: &FillOptions,
    ) -> RenderResult<()> {
        self.draw_path_with_blend(
            path,
            matrix,
            state,
            fill_color,
            stroke_color,
            options,
            BlendMode::Normal,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_path_with_blend(
        &mut self,
        path: &Path,
        matrix: Option<&Matrix>,
        state: Option<&StrokeState>,
        fill_color: Argb,
        stroke_color: Argb,
        options: &FillOptions,
        blend: BlendMode,
    ) -> RenderResult<()> {
        let fill = options.is_fill();
        let fill_alpha = if fill { argb_alpha(fill_color) } else { 0 };
        let stroke_alpha = if state.is_some() {
            argb_alpha(stroke_color)
        } else {
            0
        };
        let points = path.points();

        if stroke_alpha == 0 && points.len() == 2 {
            let mut p1 = points[0].pos;
            let mut p2 = points[1].pos;
            if let Some(m) = matrix {
                p1 = m.transform_point(p1);
                p2 = m.transform_point(p2);
            }
            let _ = self.draw_cosmetic_line(p1, p2, fill_color, options, blend);
            return Ok(());
        }

        if stroke_alpha == 0 && !options.rect_aa {
            if let Some(rect_f) = path.get_rect(matrix) {
                let mut rect_i = rect_f.outer_rect();
                if !rect_i.valid() {
                    return Err(RenderError::InvalidRect);
                }
                // Snap sub-pixel rectangles onto the pixel grid: spans
                // under a pixel are widened, and an over-wide snapped
                // axis gives the pixel back on the side with more
                // sub-pixel slack.
                let width = rect_f.width().ceil() as i32;
                if width < 1 && rect_i.left == rect_i.right {
                    rect_i.right += 1;
                }
                let width = width.max(1);
                let height = rect_f.height().ceil() as i32;
                if height < 1 && rect_i.top == rect_i.bottom {
                    rect_i.bottom += 1;
                }
                let height = height.max(1);
                if rect_i.width() >= width + 1 {
                    if rect_f.left - rect_i.left as f32 > rect_i.right as f32 - rect_f.right {
                        rect_i.left += 1;
                    } else {
                        rect_i.right -= 1;
                    }
                }
                if rect_i.height() >= height + 1 {
                    if rect_f.bottom - rect_i.top as f32 > rect_i.bottom as f32 - rect_f.top {
                        rect_i.top += 1;
                    } else {
                        rect_i.bottom -= 1;
                    }
                }
                if self.fill_rect_with_blend(&rect_i, fill_color, blend).is_ok() {
                    return Ok(());
                }
            }
        }

        if fill && stroke_alpha == 0 && !options.stroke && !options.text_mode {
            let adjust = self.driver.adjust_hairlines();
            let mut sub_path: SmallVec<[Point; 16]> = SmallVec::new();
            let mut i = 0usize;
            while i < points.len() {
                match points[i].kind {
                    PointKind::Move => {
                        if !sub_path.is_empty() {
                            self.draw_zero_area_subpath(
                                &sub_path,
                                matrix,
                                adjust,
                                options.aliased_path,
                                fill_color,
                                fill_alpha,
                                blend,
                            );
                            sub_path.clear();
                        }
                        sub_path.push(points[i]);
                    }
                    PointKind::Bezier => {
                        sub_path.push(points[i]);
                        sub_path.push(points[i + 1]);
                        sub_path.push(points[i + 2]);
                        i += 2;
                    }
                    PointKind::Line => sub_path.push(points[i]),
                }
                i += 1;
            }
            self.draw_zero_area_subpath(
                &sub_path,
                matrix,
                adjust,
                options.aliased_path,
                fill_color,
                fill_alpha,
                blend,
            );
        }

        if fill && fill_alpha != 0 && stroke_alpha < 255 && options.stroke {
            if self.render_caps.contains(RenderCaps::FILL_STROKE_PATH) {
                return self
                    .driver
                    .draw_path(path, matrix, state, fill_color, stroke_color, options, blend)
                    .then_some(())
                    .ok_or(RenderError::Backend);
            }
            return self.draw_fill_stroke_path(
                path,
                matrix,
                state,
                fill_color,
                stroke_color,
                options,
                blend,
            );
        }

        self.driver
            .draw_path(path, matrix, state, fill_color, stroke_color, options, blend)
            .then_some(())
            .ok_or(RenderError::Backend)
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_zero_area_subpath(
        &mut self,
        sub_path: &[Point],
        matrix: Option<&Matrix>,
        adjust: bool,
        aliased: bool,
        fill_color: Argb,
        fill_alpha: u8,
        blend: BlendMode,
    ) {
        if sub_path.is_empty() {
            return;
        }
        let Some(zero) = zero_area_path(sub_path, matrix, adjust) else {
            return;
        };
        let stroke = StrokeState {
            line_width: 0.0,
            ..StrokeState::default()
        };
        let stroke_color = if zero.thin {
            (u32::from(fill_alpha >> 2) << 24) | (fill_color & 0x00ff_ffff)
        } else {
            fill_color
        };
        let matrix = match matrix {
            Some(m) if !m.is_identity() && !zero.set_identity => Some(m),
            _ => None,
        };
        let options = FillOptions {
            zero_area: true,
            aliased_path: aliased,
            ..FillOptions::default()
        };
        self.driver
            .draw_path(&zero.path, matrix, Some(&stroke), 0, stroke_color, &options, blend);
    }

    /// Composites a combined fill and stroke offscreen when the
    /// backend cannot rasterize both in one pass.
    #[allow(clippy::too_many_arguments)]
    fn draw_fill_stroke_path(
        &mut self,
        path: &Path,
        matrix: Option<&Matrix>,
        state: Option<&StrokeState>,
        fill_color: Argb,
        stroke_color: Argb,
        options: &FillOptions,
        blend: BlendMode,
    ) -> RenderResult<()> {
        if !self.render_caps.contains(RenderCaps::GET_BITS) {
            return Err(RenderError::Unsupported);
        }
        let mut bbox = match state {
            Some(gs) => path.bounding_box_for_stroke(gs.line_width, gs.miter_limit),
            None => path.bounding_box(),
        };
        if let Some(m) = matrix {
            bbox = m.transform_rect(&bbox);
        }
        let rect = bbox.outer_rect();
        if !rect.valid() {
            return Err(RenderError::InvalidRect);
        }
        #[cfg(feature = "debug-logging")]
        eprintln!(
            "DEBUG: compositing fill+stroke offscreen ({}x{})",
            rect.width(),
            rect.height()
        );
        let mut bitmap = self
            .create_compatible_bitmap(rect.width(), rect.height())
            .ok_or(RenderError::Allocation {
                width: rect.width(),
                height: rect.height(),
            })?;
        if bitmap.has_alpha() {
            bitmap.clear(0);
        } else if !self.driver.get_dibits(&mut bitmap, rect.left, rect.top) {
            return Err(RenderError::Backend);
        }
        let mut local = matrix.cloned().unwrap_or_default();
        local.translate(-(rect.left as f32), -(rect.top as f32));
        if !self.driver.draw_path_into(
            &mut bitmap,
            path,
            &local,
            state,
            fill_color,
            stroke_color,
            options,
            blend,
        ) {
            return Err(RenderError::Unsupported);
        }
        let src = RectI::new(0, 0, rect.width(), rect.height());
        self.driver
            .set_dibits(&bitmap, 0, &src, rect.left, rect.top, BlendMode::Normal)
            .then_some(())
            .ok_or(RenderError::Backend)
    }

    pub fn fill_rect(&mut self, rect: &RectI, color: Argb) -> RenderResult<()> {
        self.fill_rect_with_blend(rect, color, BlendMode::Normal)
    }

    pub fn fill_rect_with_blend(
        &mut self,
        rect: &RectI,
        color: Argb,
        blend: BlendMode,
    ) -> RenderResult<()> {
        if self.driver.fill_rect(rect, color, blend) {
            return Ok(());
        }
        if !self.render_caps.contains(RenderCaps::GET_BITS) {
            return Err(RenderError::Unsupported);
        }
        let mut bitmap = self
            .create_compatible_bitmap(rect.width(), rect.height())
            .ok_or(RenderError::Allocation {
                width: rect.width(),
                height: rect.height(),
            })?;
        if !self.driver.get_dibits(&mut bitmap, rect.left, rect.top) {
            return Err(RenderError::Backend);
        }
        if !bitmap.composite_rect(0, 0, rect.width(), rect.height(), color) {
            return Err(RenderError::Backend);
        }
        let src = RectI::new(0, 0, rect.width(), rect.height());
        self.driver
            .set_dibits(&bitmap, 0, &src, rect.left, rect.top, BlendMode::Normal);
        Ok(())
    }

    /// Draws a device-space hairline. Opaque colors may use a backend
    /// primitive; anything else strokes a two-point path at width
    /// zero.
    pub fn draw_cosmetic_line(
        &mut self,
        p1: PointF,
        p2: PointF,
        color: Argb,
        options: &FillOptions,
        blend: BlendMode,
    ) -> RenderResult<()> {
        if argb_alpha(color) == 255 && self.driver.draw_cosmetic_line(p1, p2, color, blend) {
            return Ok(());
        }
        let state = StrokeState::default();
        let mut path = Path::new();
        path.append_point(p1, PointKind::Move);
        path.append_point(p2, PointKind::Line);
        self.driver
            .draw_path(&path, None, Some(&state), 0, color, options, blend)
            .then_some(())
            .ok_or(RenderError::Backend)
    }

    pub fn get_dibits(&self, bitmap: &mut Bitmap, left: i32, top: i32) -> bool {
        self.render_caps.contains(RenderCaps::GET_BITS)
            && self.driver.get_dibits(bitmap, left, top)
    }

    pub fn set_dibits(&mut self, bitmap: &Bitmap, left: i32, top: i32) -> bool {
        self.set_dibits_common(bitmap, 0, left, top)
    }

    /// Writes a mask bitmap tinted with `color`.
    pub fn set_bit_mask(&mut self, bitmap: &Bitmap, left: i32, top: i32, color: Argb) -> bool {
        self.set_dibits_common(bitmap, color, left, top)
    }

    fn set_dibits_common(&mut self, bitmap: &Bitmap, color: Argb, left: i32, top: i32) -> bool {
        let mut dest = RectI::new(left, top, left + bitmap.width(), top + bitmap.height());
        dest.intersect(&self.clip_box);
        if dest.is_empty() {
            return true;
        }
        let src = RectI::new(
            dest.left - left,
            dest.top - top,
            dest.left - left + dest.width(),
            dest.top - top + dest.height(),
        );
        self.driver
            .set_dibits(bitmap, color, &src, dest.left, dest.top, BlendMode::Normal)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn stretch_dibits(
        &mut self,
        bitmap: &Bitmap,
        color: Argb,
        left: i32,
        top: i32,
        dest_width: i32,
        dest_height: i32,
        blend: BlendMode,
    ) -> bool {
        let mut clip = RectI::new(left, top, left + dest_width, top + dest_height);
        clip.intersect(&self.clip_box);
        if clip.is_empty() {
            return true;
        }
        self.driver
            .stretch_dibits(bitmap, color, left, top, dest_width, dest_height, &clip, blend)
    }

    pub fn draw_fill_rect(&mut self, matrix: Option<&Matrix>, rect: &FloatRect, color: Argb) {
        let mut path = Path::new();
        path.append_float_rect(rect);
        let _ = self.draw_path(&path, matrix, None, color, 0, &FillOptions::winding());
    }

    /// Fills a polygon with the even-odd rule.
    pub fn draw_fill_area(&mut self, matrix: &Matrix, points: &[PointF], color: Argb) {
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        let mut path = Path::new();
        path.append_point(*first, PointKind::Move);
        for p in rest {
            path.append_point(*p, PointKind::Line);
        }
        let _ = self.draw_path(&path, Some(matrix), None, color, 0, &FillOptions::even_odd());
    }

    pub fn draw_stroke_rect(&mut self, matrix: &Matrix, rect: &FloatRect, color: Argb, width: f32) {
        let state = StrokeState {
            line_width: width,
            ..StrokeState::default()
        };
        let mut path = Path::new();
        path.append_float_rect(rect);
        let _ = self.draw_path(&path, Some(matrix), Some(&state), 0, color, &FillOptions::even_odd());
    }

    pub fn draw_stroke_line(
        &mut self,
        matrix: Option<&Matrix>,
        p1: PointF,
        p2: PointF,
        color: Argb,
        width: f32,
    ) {
        let state = StrokeState {
            line_width: width,
            ..StrokeState::default()
        };
        let mut path = Path::new();
        path.append_point(p1, PointKind::Move);
        path.append_point(p2, PointKind::Line);
        let _ = self.draw_path(&path, matrix, Some(&state), 0, color, &FillOptions::default());
    }

    /// Paints a linear gray ramp as a stack of stroked segments.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_shadow(
        &mut self,
        matrix: &Matrix,
        vertical: bool,
        horizontal: bool,
        rect: &FloatRect,
        alpha: u8,
        start_gray: i32,
        end_gray: i32,
    ) {
        const BORDER: f32 = 0.5;
        const SEGMENT_WIDTH: f32 = 1.0;
        const LINE_WIDTH: f32 = 1.5;

        if vertical {
            let step = (end_gray - start_gray) as f32 / rect.height();
            let mut y = rect.bottom + BORDER;
            while y <= rect.top - BORDER {
                let gray = (start_gray + (step * (y - rect.bottom)) as i32) as u32;
                let color = argb_encode(u32::from(alpha), gray, gray, gray);
                self.draw_stroke_line(
                    Some(matrix),
                    PointF::new(rect.left, y),
                    PointF::new(rect.right, y),
                    color,
                    LINE_WIDTH,
                );
                y += SEGMENT_WIDTH;
            }
        }
        if horizontal {
            let step = (end_gray - start_gray) as f32 / rect.width();
            let mut x = rect.left + BORDER;
            while x <= rect.right - BORDER {
                let gray = (start_gray + (step * (x - rect.left)) as i32) as u32;
                let color = argb_encode(u32::from(alpha), gray, gray, gray);
                self.draw_stroke_line(
                    Some(matrix),
                    PointF::new(x, rect.bottom),
                    PointF::new(x, rect.top),
                    color,
                    LINE_WIDTH,
                );
                x += SEGMENT_WIDTH;
            }
        }
    }

    /// Draws a widget border in one of the standard annotation styles.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_border(
        &mut self,
        matrix: Option<&Matrix>,
        rect: &FloatRect,
        width: f32,
        color: Argb,
        left_top_color: Argb,
        right_bottom_color: Argb,
        style: BorderStyle,
    ) {
        if width <= 0.0 {
            return;
        }
        let left = rect.left;
        let bottom = rect.bottom;
        let right = rect.right;
        let top = rect.top;
        let half = width / 2.0;

        match style {
            BorderStyle::Solid => {
                let mut path = Path::new();
                path.append_rect(left, bottom, right, top);
                path.append_rect(left + width, bottom + width, right - width, top - width);
                let _ = self.draw_path(&path, matrix, None, color, 0, &FillOptions::even_odd());
            }
            BorderStyle::Dash => {
                let state = StrokeState {
                    line_width: width,
                    dash_array: vec![3.0, 3.0],
                    dash_phase: 0.0,
                    ..StrokeState::default()
                };
                let mut path = Path::new();
                path.append_point(PointF::new(left + half, bottom + half), PointKind::Move);
                path.append_point(PointF::new(left + half, top - half), PointKind::Line);
                path.append_point(PointF::new(right - half, top - half), PointKind::Line);
                path.append_point(PointF::new(right - half, bottom + half), PointKind::Line);
                path.append_point_and_close(
                    PointF::new(left + half, bottom + half),
                    PointKind::Line,
                );
                let _ =
                    self.draw_path(&path, matrix, Some(&state), 0, color, &FillOptions::default());
            }
            BorderStyle::Beveled | BorderStyle::Inset => {
                let mut path_left_top = Path::new();
                path_left_top.append_point(PointF::new(left + half, bottom + half), PointKind::Move);
                path_left_top.append_point(PointF::new(left + half, top - half), PointKind::Line);
                path_left_top.append_point(PointF::new(right - half, top - half), PointKind::Line);
                path_left_top.append_point(PointF::new(right - width, top - width), PointKind::Line);
                path_left_top.append_point(PointF::new(left + width, top - width), PointKind::Line);
                path_left_top.append_point(PointF::new(left + width, bottom + width), PointKind::Line);
                path_left_top.append_point_and_close(
                    PointF::new(left + half, bottom + half),
                    PointKind::Line,
                );
                let _ = self.draw_path(
                    &path_left_top,
                    matrix,
                    None,
                    left_top_color,
                    0,
                    &FillOptions::even_odd(),
                );

                let mut path_right_bottom = Path::new();
                path_right_bottom
                    .append_point(PointF::new(right - half, top - half), PointKind::Move);
                path_right_bottom
                    .append_point(PointF::new(right - half, bottom + half), PointKind::Line);
                path_right_bottom
                    .append_point(PointF::new(left + half, bottom + half), PointKind::Line);
                path_right_bottom
                    .append_point(PointF::new(left + width, bottom + width), PointKind::Line);
                path_right_bottom
                    .append_point(PointF::new(right - width, bottom + width), PointKind::Line);
                path_right_bottom
                    .append_point(PointF::new(right - width, top - width), PointKind::Line);
                path_right_bottom.append_point_and_close(
                    PointF::new(right - half, top - half),
                    PointKind::Line,
                );
                let _ = self.draw_path(
                    &path_right_bottom,
                    matrix,
                    None,
                    right_bottom_color,
                    0,
                    &FillOptions::even_odd(),
                );

                let mut path = Path::new();
                path.append_rect(left, bottom, right, top);
                path.append_rect(left + half, bottom + half, right - half, top - half);
                let _ = self.draw_path(&path, matrix, None, color, 0, &FillOptions::even_odd());
            }
            BorderStyle::Underline => {
                let state = StrokeState {
                    line_width: width,
                    ..StrokeState::default()
                };
                let mut path = Path::new();
                path.append_point(PointF::new(left, bottom + half), PointKind::Move);
                path.append_point(PointF::new(right, bottom + half), PointKind::Line);
                let _ =
                    self.draw_path(&path, matrix, Some(&state), 0, color, &FillOptions::default());
            }
        }
    }
}

/// Saves the device state on construction and restores it on drop.
pub struct StateRestorer<'a> {
    device: &'a mut RenderDevice,
}

impl<'a> StateRestorer<'a> {
    pub fn new(device: &'a mut RenderDevice) -> Self {
        device.save_state();
        StateRestorer { device }
    }
}

impl Deref for StateRestorer<'_> {
    type Target = RenderDevice;

    fn deref(&self) -> &RenderDevice {
        self.device
    }
}

impl DerefMut for StateRestorer<'_> {
    fn deref_mut(&mut self) -> &mut RenderDevice {
        self.device
    }
}

impl Drop for StateRestorer<'_> {
    fn drop(&mut self) {
        self.device.restore_state(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every driver call; used to assert dispatch decisions.
    struct RecordingDriver {
        width: i32,
        height: i32,
        caps: RenderCaps,
        device_type: DeviceType,
        fill_rect_supported: bool,
        cosmetic_supported: bool,
        offscreen_supported: bool,
        clip: RefCell<Option<RectI>>,
        saved_clips: RefCell<Vec<Option<RectI>>>,
        ops: Rc<RefCell<Vec<String>>>,
        captured: Rc<RefCell<Option<Bitmap>>>,
    }

    impl RecordingDriver {
        fn new(width: i32, height: i32, caps: RenderCaps) -> Self {
            RecordingDriver {
                width,
                height,
                caps,
                device_type: DeviceType::Display,
                fill_rect_supported: true,
                cosmetic_supported: true,
                offscreen_supported: true,
                clip: RefCell::new(None),
                saved_clips: RefCell::new(Vec::new()),
                ops: Rc::new(RefCell::new(Vec::new())),
                captured: Rc::new(RefCell::new(None)),
            }
        }

        fn record(&self, op: impl Into<String>) {
            self.ops.borrow_mut().push(op.into());
        }
    }

    impl DeviceDriver for RecordingDriver {
        fn width(&self) -> i32 {
            self.width
        }

        fn height(&self) -> i32 {
            self.height
        }

        fn bits_per_pixel(&self) -> i32 {
            32
        }

        fn render_caps(&self) -> RenderCaps {
            self.caps
        }

        fn device_type(&self) -> DeviceType {
            self.device_type
        }

        fn save_state(&mut self) {
            self.saved_clips.borrow_mut().push(*self.clip.borrow());
            self.record("save_state");
        }

        fn restore_state(&mut self, keep_saved: bool) {
            if let Some(saved) = self.saved_clips.borrow_mut().pop() {
                *self.clip.borrow_mut() = saved;
                if keep_saved {
                    self.saved_clips.borrow_mut().push(saved);
                }
            }
            self.record(format!("restore_state({keep_saved})"));
        }

        fn clip_box(&self) -> Option<RectI> {
            *self.clip.borrow()
        }

        fn set_clip_path_fill(
            &mut self,
            path: &Path,
            matrix: Option<&Matrix>,
            _options: &FillOptions,
        ) -> bool {
            let mut bbox = path.bounding_box();
            if let Some(m) = matrix {
                bbox = m.transform_rect(&bbox);
            }
            let mut rect = bbox.outer_rect();
            rect.intersect(&RectI::new(0, 0, self.width, self.height));
            *self.clip.borrow_mut() = Some(rect);
            self.record("set_clip_fill");
            true
        }

        fn set_clip_path_stroke(
            &mut self,
            _path: &Path,
            _matrix: Option<&Matrix>,
            _state: &StrokeState,
        ) -> bool {
            self.record("set_clip_stroke");
            true
        }

        fn draw_path(
            &mut self,
            _path: &Path,
            _matrix: Option<&Matrix>,
            state: Option<&StrokeState>,
            _fill_color: Argb,
            stroke_color: Argb,
            options: &FillOptions,
            _blend: BlendMode,
        ) -> bool {
            if options.zero_area {
                self.record(format!("zero_area_path(color={stroke_color:#010x})"));
            } else if let Some(state) = state {
                self.record(format!("draw_path(stroke_width={})", state.line_width));
            } else {
                self.record("draw_path");
            }
            true
        }

        fn draw_cosmetic_line(&mut self, p1: PointF, p2: PointF, _color: Argb, _blend: BlendMode) -> bool {
            if !self.cosmetic_supported {
                return false;
            }
            self.record(format!(
                "cosmetic_line({},{})-({},{})",
                p1.x, p1.y, p2.x, p2.y
            ));
            true
        }

        fn fill_rect(&mut self, rect: &RectI, _color: Argb, _blend: BlendMode) -> bool {
            if !self.fill_rect_supported {
                return false;
            }
            self.record(format!(
                "fill_rect({},{},{},{})",
                rect.left, rect.top, rect.right, rect.bottom
            ));
            true
        }

        fn get_dibits(&self, bitmap: &mut Bitmap, _left: i32, _top: i32) -> bool {
            bitmap.clear(0xffff_ffff);
            self.record("get_dibits");
            true
        }

        fn set_dibits(
            &mut self,
            bitmap: &Bitmap,
            color: Argb,
            _src_rect: &RectI,
            dest_left: i32,
            dest_top: i32,
            _blend: BlendMode,
        ) -> bool {
            self.record(format!("set_dibits({dest_left},{dest_top},color={color:#010x})"));
            *self.captured.borrow_mut() = Some(bitmap.clone());
            true
        }

        fn draw_path_into(
            &mut self,
            _bitmap: &mut Bitmap,
            _path: &Path,
            _matrix: &Matrix,
            _state: Option<&StrokeState>,
            _fill_color: Argb,
            _stroke_color: Argb,
            _options: &FillOptions,
            _blend: BlendMode,
        ) -> bool {
            if !self.offscreen_supported {
                return false;
            }
            self.record("draw_path_into");
            true
        }
    }

    fn rect_path(left: f32, bottom: f32, right: f32, top: f32) -> Path {
        let mut path = Path::new();
        path.append_rect(left, bottom, right, top);
        path
    }

    #[test]
    fn test_rect_fill_uses_fill_rect_primitive() {
        let driver = RecordingDriver::new(16, 16, RenderCaps::GET_BITS);
        let ops = driver.ops.clone();
        let mut device = RenderDevice::new(Box::new(driver));
        let path = rect_path(2.0, 4.0, 14.0, 12.0);
        device
            .draw_path(&path, None, None, 0xff00_00ff, 0, &FillOptions::winding())
            .unwrap();
        assert_eq!(*ops.borrow(), vec!["fill_rect(2,4,14,12)".to_string()]);
    }

    #[test]
    fn test_rect_aa_skips_fast_path() {
        let driver = RecordingDriver::new(16, 16, RenderCaps::empty());
        let ops = driver.ops.clone();
        let mut device = RenderDevice::new(Box::new(driver));
        let path = rect_path(2.0, 4.0, 14.0, 12.0);
        let options = FillOptions {
            rect_aa: true,
            ..FillOptions::winding()
        };
        device
            .draw_path(&path, None, None, 0xff00_00ff, 0, &options)
            .unwrap();
        let ops = ops.borrow();
        assert!(!ops.iter().any(|op| op.starts_with("fill_rect")));
        assert_eq!(ops.last().unwrap(), "draw_path");
    }

    #[test]
    fn test_subpixel_rect_snaps_to_one_pixel() {
        let driver = RecordingDriver::new(16, 16, RenderCaps::empty());
        let ops = driver.ops.clone();
        let mut device = RenderDevice::new(Box::new(driver));
        // 0.4 pixels wide, spanning a pixel boundary on neither axis.
        let path = rect_path(3.1, 5.2, 3.5, 5.8);
        device
            .draw_path(&path, None, None, 0xff00_0000, 0, &FillOptions::winding())
            .unwrap();
        assert_eq!(*ops.borrow(), vec!["fill_rect(3,5,4,6)".to_string()]);
    }

    #[test]
    fn test_overwide_snap_shrinks_slack_side() {
        let driver = RecordingDriver::new(16, 16, RenderCaps::empty());
        let ops = driver.ops.clone();
        let mut device = RenderDevice::new(Box::new(driver));
        // Width 1.3 pixels crossing two boundaries: the outer rect is
        // 3 pixels wide and gives one back on the left, where the
        // sub-pixel slack is larger.
        let path = rect_path(2.9, 5.0, 4.2, 6.0);
        device
            .draw_path(&path, None, None, 0xff00_0000, 0, &FillOptions::winding())
            .unwrap();
        assert_eq!(*ops.borrow(), vec!["fill_rect(3,5,5,6)".to_string()]);
    }

    #[test]
    fn test_two_point_path_draws_cosmetic_line() {
        let driver = RecordingDriver::new(16, 16, RenderCaps::empty());
        let ops = driver.ops.clone();
        let mut device = RenderDevice::new(Box::new(driver));
        let mut path = Path::new();
        path.append_point(PointF::new(1.0, 1.0), PointKind::Move);
        path.append_point(PointF::new(9.0, 5.0), PointKind::Line);
        device
            .draw_path(&path, None, None, 0xffff_0000, 0, &FillOptions::winding())
            .unwrap();
        let ops = ops.borrow();
        assert_eq!(ops.len(), 1);
        assert!(ops[0].starts_with("cosmetic_line"));
    }

    #[test]
    fn test_translucent_cosmetic_line_strokes_generic() {
        let driver = RecordingDriver::new(16, 16, RenderCaps::empty());
        let ops = driver.ops.clone();
        let mut device = RenderDevice::new(Box::new(driver));
        let mut path = Path::new();
        path.append_point(PointF::new(1.0, 1.0), PointKind::Move);
        path.append_point(PointF::new(9.0, 5.0), PointKind::Line);
        device
            .draw_path(&path, None, None, 0x80ff_0000, 0, &FillOptions::winding())
            .unwrap();
        assert_eq!(*ops.borrow(), vec!["draw_path(stroke_width=1)".to_string()]);
    }

    #[test]
    fn test_zero_area_fill_emits_hairline_then_falls_through() {
        let driver = RecordingDriver::new(16, 16, RenderCaps::empty());
        let ops = driver.ops.clone();
        let mut device = RenderDevice::new(Box::new(driver));
        let mut path = Path::new();
        path.append_point(PointF::new(0.0, 0.0), PointKind::Move);
        path.append_point(PointF::new(5.0, 0.0), PointKind::Line);
        path.append_point(PointF::new(0.0, 0.0), PointKind::Line);
        device
            .draw_path(&path, None, None, 0xff11_2233, 0, &FillOptions::winding())
            .unwrap();
        let ops = ops.borrow();
        assert_eq!(ops.len(), 2);
        // Thin hairline carries quarter alpha of the fill color.
        assert_eq!(ops[0], "zero_area_path(color=0x3f112233)");
        assert_eq!(ops[1], "draw_path");
    }

    #[test]
    fn test_degenerate_dot_subpath_emits_nothing() {
        let driver = RecordingDriver::new(16, 16, RenderCaps::empty());
        let ops = driver.ops.clone();
        let mut device = RenderDevice::new(Box::new(driver));
        let mut path = Path::new();
        path.append_point(PointF::new(3.0, 3.0), PointKind::Move);
        path.append_point(PointF::new(3.0, 3.0), PointKind::Line);
        path.append_point(PointF::new(7.0, 7.0), PointKind::Move);
        path.append_point(PointF::new(7.0, 7.0), PointKind::Line);
        path.append_point(PointF::new(7.0, 7.0), PointKind::Line);
        device
            .draw_path(&path, None, None, 0xff00_0000, 0, &FillOptions::winding())
            .unwrap();
        let ops = ops.borrow();
        // Both dots produce empty hairline paths that still reach the
        // driver, then the generic fill runs.
        assert_eq!(ops.last().unwrap(), "draw_path");
        assert!(ops.iter().all(|op| !op.starts_with("cosmetic")));
    }

    #[test]
    fn test_fill_rect_fallback_composites_through_dibits() {
        let mut driver = RecordingDriver::new(16, 16, RenderCaps::GET_BITS);
        driver.fill_rect_supported = false;
        let ops = driver.ops.clone();
        let captured = driver.captured.clone();
        let mut device = RenderDevice::new(Box::new(driver));
        device.fill_rect(&RectI::new(2, 2, 6, 6), 0xff00_ff00).unwrap();
        assert_eq!(
            *ops.borrow(),
            vec![
                "get_dibits".to_string(),
                "set_dibits(2,2,color=0x00000000)".to_string()
            ]
        );
        let captured = captured.borrow();
        let bitmap = captured.as_ref().unwrap();
        assert_eq!(bitmap.pixel(0, 0), 0xff00_ff00);
    }

    #[test]
    fn test_fill_stroke_uses_native_cap() {
        let caps = RenderCaps::GET_BITS | RenderCaps::FILL_STROKE_PATH;
        let driver = RecordingDriver::new(16, 16, caps);
        let ops = driver.ops.clone();
        let mut device = RenderDevice::new(Box::new(driver));
        let path = rect_path(2.0, 2.0, 10.0, 10.0);
        let state = StrokeState::default();
        let options = FillOptions {
            stroke: true,
            ..FillOptions::winding()
        };
        device
            .draw_path(&path, None, Some(&state), 0xffff_ffff, 0x80ff_0000, &options)
            .unwrap();
        assert_eq!(*ops.borrow(), vec!["draw_path(stroke_width=1)".to_string()]);
    }

    #[test]
    fn test_fill_stroke_composites_offscreen() {
        let driver = RecordingDriver::new(32, 32, RenderCaps::GET_BITS);
        let ops = driver.ops.clone();
        let mut device = RenderDevice::new(Box::new(driver));
        let path = rect_path(4.0, 4.0, 12.0, 12.0);
        let state = StrokeState::default();
        let options = FillOptions {
            stroke: true,
            ..FillOptions::winding()
        };
        device
            .draw_path(&path, None, Some(&state), 0xffff_ffff, 0x80ff_0000, &options)
            .unwrap();
        let ops = ops.borrow();
        assert!(ops.contains(&"draw_path_into".to_string()));
        assert!(ops.last().unwrap().starts_with("set_dibits"));
    }

    #[test]
    fn test_opaque_stroke_skips_offscreen_composite() {
        let driver = RecordingDriver::new(32, 32, RenderCaps::GET_BITS);
        let ops = driver.ops.clone();
        let mut device = RenderDevice::new(Box::new(driver));
        let path = rect_path(4.0, 4.0, 12.0, 12.0);
        let state = StrokeState::default();
        let options = FillOptions {
            stroke: true,
            ..FillOptions::winding()
        };
        device
            .draw_path(&path, None, Some(&state), 0xffff_ffff, 0xffff_0000, &options)
            .unwrap();
        assert_eq!(*ops.borrow(), vec!["draw_path(stroke_width=1)".to_string()]);
    }

    #[test]
    fn test_clip_box_defaults_to_surface() {
        let driver = RecordingDriver::new(20, 30, RenderCaps::empty());
        let device = RenderDevice::new(Box::new(driver));
        assert_eq!(device.clip_box(), RectI::new(0, 0, 20, 30));
    }

    #[test]
    fn test_set_clip_rect_updates_clip_box() {
        let driver = RecordingDriver::new(20, 30, RenderCaps::empty());
        let mut device = RenderDevice::new(Box::new(driver));
        device.set_clip_rect(&RectI::new(2, 3, 10, 12)).unwrap();
        assert_eq!(device.clip_box(), RectI::new(2, 3, 10, 12));
    }

    #[test]
    fn test_state_restorer_balances_driver_calls() {
        let driver = RecordingDriver::new(16, 16, RenderCaps::empty());
        let ops = driver.ops.clone();
        let mut device = RenderDevice::new(Box::new(driver));
        {
            let mut scoped = StateRestorer::new(&mut device);
            scoped.set_clip_rect(&RectI::new(0, 0, 4, 4)).unwrap();
        }
        let ops = ops.borrow();
        assert_eq!(ops.first().unwrap(), "save_state");
        assert_eq!(ops.last().unwrap(), "restore_state(false)");
        // Clip reverts to the full surface once the driver clip is
        // forgotten on restore.
        assert_eq!(device.clip_box(), RectI::new(0, 0, 16, 16));
    }

    #[test]
    fn test_set_dibits_clips_to_clip_box() {
        let driver = RecordingDriver::new(8, 8, RenderCaps::empty());
        let ops = driver.ops.clone();
        let mut device = RenderDevice::new(Box::new(driver));
        let bitmap = Bitmap::new(4, 4, Format::Argb).unwrap();
        assert!(device.set_dibits(&bitmap, 20, 20));
        assert!(ops.borrow().is_empty());
    }

    #[test]
    fn test_stroke_rect_strokes_at_requested_width() {
        let driver = RecordingDriver::new(16, 16, RenderCaps::empty());
        let ops = driver.ops.clone();
        let mut device = RenderDevice::new(Box::new(driver));
        let rect = FloatRect::new(2.0, 2.0, 10.0, 10.0);
        device.draw_stroke_rect(&Matrix::identity(), &rect, 0xff00_0000, 2.0);
        assert_eq!(ops.borrow().as_slice(), ["draw_path(stroke_width=2)"]);
    }

    #[test]
    fn test_solid_border_fills_double_rect() {
        let driver = RecordingDriver::new(16, 16, RenderCaps::empty());
        let ops = driver.ops.clone();
        let mut device = RenderDevice::new(Box::new(driver));
        let rect = FloatRect::new(1.0, 1.0, 15.0, 15.0);
        device.draw_border(
            None,
            &rect,
            2.0,
            0xff00_0000,
            0xff80_8080,
            0xffc0_c0c0,
            BorderStyle::Solid,
        );
        assert_eq!(ops.borrow().as_slice(), ["draw_path"]);
    }

    #[test]
    fn test_beveled_border_fills_three_regions() {
        let driver = RecordingDriver::new(16, 16, RenderCaps::empty());
        let ops = driver.ops.clone();
        let mut device = RenderDevice::new(Box::new(driver));
        let rect = FloatRect::new(1.0, 1.0, 15.0, 15.0);
        device.draw_border(
            None,
            &rect,
            2.0,
            0xff00_0000,
            0xff80_8080,
            0xffc0_c0c0,
            BorderStyle::Beveled,
        );
        assert_eq!(ops.borrow().len(), 3);
    }

    #[test]
    fn test_shadow_paints_gray_ramp() {
        let driver = RecordingDriver::new(32, 32, RenderCaps::empty());
        let ops = driver.ops.clone();
        let mut device = RenderDevice::new(Box::new(driver));
        let rect = FloatRect::new(0.0, 0.0, 10.0, 10.0);
        device.draw_shadow(&Matrix::identity(), true, false, &rect, 255, 40, 200);
        // One stroked segment per unit of height inside the border.
        assert_eq!(ops.borrow().len(), 10);
        assert!(ops.borrow().iter().all(|op| op == "draw_path(stroke_width=1.5)"));
    }
}
