//! A tiny-skia based software backend.
//!
//! The driver owns a premultiplied RGBA [`Pixmap`] and keeps a clip
//! mask per saved state. Bitmap exchange with the device converts
//! between premultiplied RGBA and the straight BGRA layout of
//! [`Bitmap`].

use tiny_skia::{
    BlendMode as SkiaBlendMode, FillRule as SkiaFillRule, IntSize, LineCap as SkiaLineCap,
    LineJoin as SkiaLineJoin, Mask, Paint as SkiaPaint, Path as SkiaPath, PathBuilder,
    PathStroker, Pixmap, PixmapPaint, PremultipliedColorU8, Rect, Stroke, StrokeDash, Transform,
};

use crate::dib::{Bitmap, Format};
use crate::geometry::{Matrix, PointF, RectI};
use crate::rendering::color::{Argb, argb_decode};
use crate::rendering::device::{BlendMode, DeviceDriver, DeviceType, RenderCaps};
use crate::rendering::fill_options::{FillOptions, FillType};
use crate::rendering::graph_state::{LineCap, LineJoin, StrokeState};
use crate::rendering::path::{Path, PointKind};

// --- Conversion helpers ---

fn to_skia_color(color: Argb) -> tiny_skia::Color {
    let (a, r, g, b) = argb_decode(color);
    tiny_skia::Color::from_rgba8(r, g, b, a)
}

fn to_skia_paint(color: Argb, anti_alias: bool, blend: BlendMode) -> SkiaPaint<'static> {
    let mut paint = SkiaPaint::default();
    paint.set_color(to_skia_color(color));
    paint.anti_alias = anti_alias;
    paint.blend_mode = to_skia_blend_mode(blend);
    paint
}

fn to_skia_blend_mode(blend: BlendMode) -> SkiaBlendMode {
    match blend {
        BlendMode::Normal => SkiaBlendMode::SourceOver,
        BlendMode::Multiply => SkiaBlendMode::Multiply,
        BlendMode::Screen => SkiaBlendMode::Screen,
        BlendMode::Overlay => SkiaBlendMode::Overlay,
        BlendMode::Darken => SkiaBlendMode::Darken,
        BlendMode::Lighten => SkiaBlendMode::Lighten,
        BlendMode::ColorDodge => SkiaBlendMode::ColorDodge,
        BlendMode::ColorBurn => SkiaBlendMode::ColorBurn,
        BlendMode::HardLight => SkiaBlendMode::HardLight,
        BlendMode::SoftLight => SkiaBlendMode::SoftLight,
        BlendMode::Difference => SkiaBlendMode::Difference,
        BlendMode::Exclusion => SkiaBlendMode::Exclusion,
    }
}

fn to_skia_line_cap(cap: LineCap) -> SkiaLineCap {
    match cap {
        LineCap::Butt => SkiaLineCap::Butt,
        LineCap::Round => SkiaLineCap::Round,
        LineCap::Square => SkiaLineCap::Square,
    }
}

fn to_skia_line_join(join: LineJoin) -> SkiaLineJoin {
    match join {
        LineJoin::Miter => SkiaLineJoin::Miter,
        LineJoin::Round => SkiaLineJoin::Round,
        LineJoin::Bevel => SkiaLineJoin::Bevel,
    }
}

fn to_skia_fill_rule(fill_type: FillType) -> SkiaFillRule {
    match fill_type {
        FillType::EvenOdd => SkiaFillRule::EvenOdd,
        _ => SkiaFillRule::Winding,
    }
}

fn to_skia_stroke(state: &StrokeState) -> Stroke {
    Stroke {
        // Zero-width strokes mean thinnest-possible.
        width: if state.line_width <= 0.0 {
            1.0
        } else {
            state.line_width
        },
        miter_limit: state.miter_limit,
        line_cap: to_skia_line_cap(state.line_cap),
        line_join: to_skia_line_join(state.line_join),
        dash: if state.is_dashed() {
            StrokeDash::new(state.dash_array.clone(), state.dash_phase)
        } else {
            None
        },
    }
}

fn to_skia_transform(matrix: Option<&Matrix>) -> Transform {
    match matrix {
        Some(m) => Transform::from_row(m.a, m.b, m.c, m.d, m.e, m.f),
        None => Transform::identity(),
    }
}

fn to_skia_path(path: &Path) -> Option<SkiaPath> {
    let points = path.points();
    let mut builder = PathBuilder::new();
    let mut i = 0;
    while i < points.len() {
        let p = points[i];
        match p.kind {
            PointKind::Move => {
                builder.move_to(p.pos.x, p.pos.y);
                i += 1;
            }
            PointKind::Line => {
                builder.line_to(p.pos.x, p.pos.y);
                if p.close_figure {
                    builder.close();
                }
                i += 1;
            }
            PointKind::Bezier => {
                if i + 2 >= points.len() {
                    return None;
                }
                let c2 = points[i + 1];
                let end = points[i + 2];
                builder.cubic_to(p.pos.x, p.pos.y, c2.pos.x, c2.pos.y, end.pos.x, end.pos.y);
                if end.close_figure {
                    builder.close();
                }
                i += 3;
            }
        }
    }
    builder.finish()
}

/// Converts straight BGRA rows into a premultiplied RGBA pixmap.
fn to_pixmap(bitmap: &Bitmap) -> Option<Pixmap> {
    if bitmap.format() != Format::Rgb32 && bitmap.format() != Format::Argb {
        return None;
    }
    let has_alpha = bitmap.has_alpha();
    let mut data = Vec::with_capacity(bitmap.width() as usize * bitmap.height() as usize * 4);
    for y in 0..bitmap.height() {
        let row = bitmap.row(y);
        for x in 0..bitmap.width() as usize {
            let px = &row[x * 4..x * 4 + 4];
            let a = if has_alpha { px[3] } else { 255 };
            let c = tiny_skia::ColorU8::from_rgba(px[2], px[1], px[0], a).premultiply();
            data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
    }
    Pixmap::from_vec(
        data,
        IntSize::from_wh(bitmap.width() as u32, bitmap.height() as u32)?,
    )
}

fn full_rect(pixmap: &Pixmap) -> RectI {
    RectI::new(0, 0, pixmap.width() as i32, pixmap.height() as i32)
}

#[derive(Clone)]
struct SkiaState {
    clip_mask: Option<Mask>,
    clip_rect: RectI,
}

/// Software rasterizer over an owned RGBA surface.
pub struct SkiaDriver {
    pixmap: Pixmap,
    state: SkiaState,
    saved: Vec<SkiaState>,
}

impl SkiaDriver {
    pub fn new(width: u32, height: u32) -> Option<Self> {
        let pixmap = Pixmap::new(width, height)?;
        let clip_rect = full_rect(&pixmap);
        Some(SkiaDriver {
            pixmap,
            state: SkiaState {
                clip_mask: None,
                clip_rect,
            },
            saved: Vec::new(),
        })
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn into_pixmap(self) -> Pixmap {
        self.pixmap
    }

    fn clip_with(&mut self, path: &SkiaPath, rule: SkiaFillRule, transform: Transform) -> bool {
        match &mut self.state.clip_mask {
            Some(mask) => mask.intersect_path(path, rule, true, transform),
            None => {
                let Some(mut mask) =
                    Mask::new(self.pixmap.width(), self.pixmap.height())
                else {
                    return false;
                };
                mask.fill_path(path, rule, true, transform);
                self.state.clip_mask = Some(mask);
            }
        }
        if let Some(device_path) = path.clone().transform(transform) {
            let bounds = device_path.bounds();
            let mut rect = RectI::new(
                bounds.left().floor() as i32,
                bounds.top().floor() as i32,
                bounds.right().ceil() as i32,
                bounds.bottom().ceil() as i32,
            );
            rect.intersect(&full_rect(&self.pixmap));
            self.state.clip_rect.intersect(&rect);
        }
        true
    }

    fn blend_span(&mut self, x: i32, y: i32, b: u8, g: u8, r: u8, a: u8) {
        if a == 0 {
            return;
        }
        let width = self.pixmap.width() as i32;
        let height = self.pixmap.height() as i32;
        if x < 0 || y < 0 || x >= width || y >= height {
            return;
        }
        let idx = (y * width + x) as usize;
        let src = tiny_skia::ColorU8::from_rgba(r, g, b, a).premultiply();
        let pixels = self.pixmap.pixels_mut();
        let dst = pixels[idx];
        let inv = 255 - u32::from(a);
        let nr = u32::from(src.red()) + (u32::from(dst.red()) * inv + 127) / 255;
        let ng = u32::from(src.green()) + (u32::from(dst.green()) * inv + 127) / 255;
        let nb = u32::from(src.blue()) + (u32::from(dst.blue()) * inv + 127) / 255;
        let na = u32::from(src.alpha()) + (u32::from(dst.alpha()) * inv + 127) / 255;
        if let Some(px) =
            PremultipliedColorU8::from_rgba(nr.min(255) as u8, ng.min(255) as u8, nb.min(255) as u8, na.min(255) as u8)
        {
            pixels[idx] = px;
        }
    }
}

impl DeviceDriver for SkiaDriver {
    fn width(&self) -> i32 {
        self.pixmap.width() as i32
    }

    fn height(&self) -> i32 {
        self.pixmap.height() as i32
    }

    fn bits_per_pixel(&self) -> i32 {
        32
    }

    fn render_caps(&self) -> RenderCaps {
        RenderCaps::GET_BITS | RenderCaps::ALPHA_OUTPUT | RenderCaps::BLEND_MODE
    }

    fn device_type(&self) -> DeviceType {
        DeviceType::Display
    }

    fn save_state(&mut self) {
        self.saved.push(self.state.clone());
    }

    fn restore_state(&mut self, keep_saved: bool) {
        let Some(saved) = self.saved.last() else {
            return;
        };
        if keep_saved {
            self.state = saved.clone();
        } else if let Some(saved) = self.saved.pop() {
            self.state = saved;
        }
    }

    fn clip_box(&self) -> Option<RectI> {
        Some(self.state.clip_rect)
    }

    fn set_clip_path_fill(
        &mut self,
        path: &Path,
        matrix: Option<&Matrix>,
        options: &FillOptions,
    ) -> bool {
        let Some(spath) = to_skia_path(path) else {
            return false;
        };
        self.clip_with(
            &spath,
            to_skia_fill_rule(options.fill_type),
            to_skia_transform(matrix),
        )
    }

    fn set_clip_path_stroke(
        &mut self,
        path: &Path,
        matrix: Option<&Matrix>,
        state: &StrokeState,
    ) -> bool {
        let Some(spath) = to_skia_path(path) else {
            return false;
        };
        let mut stroker = PathStroker::new();
        let Some(stroked) = stroker.stroke(&spath, &to_skia_stroke(state), 1.0) else {
            return false;
        };
        self.clip_with(&stroked, SkiaFillRule::Winding, to_skia_transform(matrix))
    }

    fn draw_path(
        &mut self,
        path: &Path,
        matrix: Option<&Matrix>,
        state: Option<&StrokeState>,
        fill_color: Argb,
        stroke_color: Argb,
        options: &FillOptions,
        blend: BlendMode,
    ) -> bool {
        let Some(spath) = to_skia_path(path) else {
            return false;
        };
        let transform = to_skia_transform(matrix);
        let anti_alias = !options.aliased_path;
        let mask = self.state.clip_mask.as_ref();
        if options.is_fill() && argb_decode(fill_color).0 > 0 {
            let paint = to_skia_paint(fill_color, anti_alias, blend);
            self.pixmap.as_mut().fill_path(
                &spath,
                &paint,
                to_skia_fill_rule(options.fill_type),
                transform,
                mask,
            );
        }
        if let Some(state) = state {
            if argb_decode(stroke_color).0 > 0 {
                let paint = to_skia_paint(stroke_color, anti_alias, blend);
                self.pixmap.as_mut().stroke_path(
                    &spath,
                    &paint,
                    &to_skia_stroke(state),
                    transform,
                    mask,
                );
            }
        }
        true
    }

    fn draw_cosmetic_line(&mut self, p1: PointF, p2: PointF, color: Argb, blend: BlendMode) -> bool {
        let mut builder = PathBuilder::new();
        builder.move_to(p1.x, p1.y);
        builder.line_to(p2.x, p2.y);
        let Some(spath) = builder.finish() else {
            return false;
        };
        let paint = to_skia_paint(color, true, blend);
        let stroke = Stroke {
            width: 1.0,
            ..Stroke::default()
        };
        let mask = self.state.clip_mask.as_ref();
        self.pixmap
            .as_mut()
            .stroke_path(&spath, &paint, &stroke, Transform::identity(), mask);
        true
    }

    fn fill_rect(&mut self, rect: &RectI, color: Argb, blend: BlendMode) -> bool {
        let Some(r) = Rect::from_ltrb(
            rect.left as f32,
            rect.top as f32,
            rect.right as f32,
            rect.bottom as f32,
        ) else {
            return true;
        };
        let paint = to_skia_paint(color, false, blend);
        let mask = self.state.clip_mask.as_ref();
        self.pixmap
            .as_mut()
            .fill_rect(r, &paint, Transform::identity(), mask);
        true
    }

    fn get_dibits(&self, bitmap: &mut Bitmap, left: i32, top: i32) -> bool {
        if bitmap.format() != Format::Rgb32 && bitmap.format() != Format::Argb {
            return false;
        }
        let has_alpha = bitmap.has_alpha();
        for y in 0..bitmap.height() {
            let src_y = top + y;
            if src_y < 0 || src_y >= self.pixmap.height() as i32 {
                continue;
            }
            for x in 0..bitmap.width() {
                let src_x = left + x;
                if src_x < 0 || src_x >= self.pixmap.width() as i32 {
                    continue;
                }
                let Some(px) = self.pixmap.pixel(src_x as u32, src_y as u32) else {
                    continue;
                };
                let c = px.demultiply();
                let row = bitmap.row_mut(y);
                let dest = &mut row[x as usize * 4..x as usize * 4 + 4];
                dest[0] = c.blue();
                dest[1] = c.green();
                dest[2] = c.red();
                dest[3] = if has_alpha { c.alpha() } else { 255 };
            }
        }
        true
    }

    fn set_dibits(
        &mut self,
        bitmap: &Bitmap,
        color: Argb,
        src_rect: &RectI,
        dest_left: i32,
        dest_top: i32,
        _blend: BlendMode,
    ) -> bool {
        let (ca, cr, cg, cb) = argb_decode(color);
        for y in 0..src_rect.height() {
            let src_y = src_rect.top + y;
            if src_y < 0 || src_y >= bitmap.height() {
                continue;
            }
            for x in 0..src_rect.width() {
                let src_x = src_rect.left + x;
                if src_x < 0 || src_x >= bitmap.width() {
                    continue;
                }
                let dx = dest_left + x;
                let dy = dest_top + y;
                match bitmap.format() {
                    Format::Mask1 | Format::Mask8 => {
                        let coverage = bitmap.pixel(src_x, src_y) >> 24;
                        let a = (coverage * u32::from(ca) / 255) as u8;
                        self.blend_span(dx, dy, cb, cg, cr, a);
                    }
                    Format::Rgb32 => {
                        let row = bitmap.row(src_y);
                        let px = &row[src_x as usize * 4..src_x as usize * 4 + 4];
                        self.blend_span(dx, dy, px[0], px[1], px[2], 255);
                    }
                    Format::Argb => {
                        let row = bitmap.row(src_y);
                        let px = &row[src_x as usize * 4..src_x as usize * 4 + 4];
                        self.blend_span(dx, dy, px[0], px[1], px[2], px[3]);
                    }
                }
            }
        }
        true
    }

    fn stretch_dibits(
        &mut self,
        bitmap: &Bitmap,
        _color: Argb,
        dest_left: i32,
        dest_top: i32,
        dest_width: i32,
        dest_height: i32,
        _clip: &RectI,
        blend: BlendMode,
    ) -> bool {
        if dest_width == 0 || dest_height == 0 {
            return true;
        }
        let Some(src) = to_pixmap(bitmap) else {
            return false;
        };
        let sx = dest_width as f32 / bitmap.width() as f32;
        let sy = dest_height as f32 / bitmap.height() as f32;
        // Negative extents mirror the image.
        let tx = if dest_width < 0 {
            (dest_left + dest_width.abs()) as f32
        } else {
            dest_left as f32
        };
        let ty = if dest_height < 0 {
            (dest_top + dest_height.abs()) as f32
        } else {
            dest_top as f32
        };
        let transform = Transform::from_row(sx, 0.0, 0.0, sy, tx, ty);
        let paint = PixmapPaint {
            blend_mode: to_skia_blend_mode(blend),
            ..PixmapPaint::default()
        };
        let mask = self.state.clip_mask.as_ref();
        self.pixmap
            .as_mut()
            .draw_pixmap(0, 0, src.as_ref(), &paint, transform, mask);
        true
    }

    fn draw_path_into(
        &mut self,
        bitmap: &mut Bitmap,
        path: &Path,
        matrix: &Matrix,
        state: Option<&StrokeState>,
        fill_color: Argb,
        stroke_color: Argb,
        options: &FillOptions,
        blend: BlendMode,
    ) -> bool {
        if bitmap.format() != Format::Rgb32 && bitmap.format() != Format::Argb {
            return false;
        }
        let Some(spath) = to_skia_path(path) else {
            return false;
        };
        let Some(mut scratch) = to_pixmap(bitmap) else {
            return false;
        };
        let transform = to_skia_transform(Some(matrix));
        let anti_alias = !options.aliased_path;
        if options.is_fill() && argb_decode(fill_color).0 > 0 {
            let paint = to_skia_paint(fill_color, anti_alias, blend);
            scratch.as_mut().fill_path(
                &spath,
                &paint,
                to_skia_fill_rule(options.fill_type),
                transform,
                None,
            );
        }
        if let Some(state) = state {
            if argb_decode(stroke_color).0 > 0 {
                let paint = to_skia_paint(stroke_color, anti_alias, blend);
                scratch
                    .as_mut()
                    .stroke_path(&spath, &paint, &to_skia_stroke(state), transform, None);
            }
        }
        let has_alpha = bitmap.has_alpha();
        for y in 0..bitmap.height() {
            for x in 0..bitmap.width() {
                let Some(px) = scratch.pixel(x as u32, y as u32) else {
                    continue;
                };
                let c = px.demultiply();
                let row = bitmap.row_mut(y);
                let dest = &mut row[x as usize * 4..x as usize * 4 + 4];
                dest[0] = c.blue();
                dest[1] = c.green();
                dest[2] = c.red();
                if has_alpha {
                    dest[3] = c.alpha();
                }
            }
        }
        true
    }
}
