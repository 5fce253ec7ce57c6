//! Glyph compositing.
//!
//! Text is drawn by rasterizing each glyph into a small coverage
//! bitmap, merging the run into one scratch surface, and writing that
//! surface back through the device. LCD runs carry three horizontal
//! coverage samples per output pixel and go through a gamma-adjusted
//! per-channel merge; plain anti-aliased runs composite as an 8bpp
//! mask; mono runs OR into a 1bpp mask.

use std::rc::Rc;

use crate::dib::{Bitmap, Format};
use crate::geometry::{Matrix, PointF, PointI, RectI};
use crate::rendering::color::{Argb, alpha_merge, alpha_union, argb_alpha, argb_decode};
use crate::rendering::device::{
    DeviceType, RenderCaps, RenderDevice, RenderError, RenderResult,
};
use crate::rendering::fill_options::{FillOptions, FillType};
use crate::rendering::graph_state::StrokeState;
use crate::rendering::path::Path;

/// Glyph rasterization mode, in increasing quality order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AntiAliasMode {
    Mono,
    AntiAliased,
    Lcd,
}

/// Requested text smoothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAliasing {
    Aliased,
    #[default]
    AntiAliased,
    Lcd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextOptions {
    pub aliasing: TextAliasing,
    /// Let the backend draw text natively before falling back on the
    /// glyph compositor.
    pub native_text: bool,
    pub font_is_cid: bool,
}

impl Default for TextOptions {
    fn default() -> Self {
        TextOptions {
            aliasing: TextAliasing::AntiAliased,
            native_text: true,
            font_is_cid: false,
        }
    }
}

impl TextOptions {
    pub fn is_smooth(&self) -> bool {
        matches!(self.aliasing, TextAliasing::AntiAliased | TextAliasing::Lcd)
    }
}

/// One positioned character of a text run, in text space.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCharPos {
    pub origin: PointF,
    pub glyph_index: u32,
    pub font_char_width: i32,
    /// Extra per-glyph shear/scale applied before the text matrix.
    pub adjust_matrix: Option<[f32; 4]>,
    pub font_style: bool,
}

/// A rasterized glyph with its bearing relative to the pen position.
#[derive(Debug)]
pub struct GlyphBitmap {
    pub left: i32,
    pub top: i32,
    pub bitmap: Bitmap,
}

/// A loaded glyph placed on the device.
#[derive(Debug, Default)]
pub struct TextGlyphPos {
    pub glyph: Option<Rc<GlyphBitmap>>,
    pub origin: PointI,
    pub device_origin: PointF,
}

impl TextGlyphPos {
    /// Top-left of the glyph bitmap relative to `offset`, or `None`
    /// when there is no glyph or the position overflows.
    pub fn screen_origin(&self, offset: PointI) -> Option<PointI> {
        let glyph = self.glyph.as_deref()?;
        let left = self.origin.x.checked_add(glyph.left)?.checked_sub(offset.x)?;
        let top = self.origin.y.checked_sub(glyph.top)?.checked_sub(offset.y)?;
        Some(PointI::new(left, top))
    }
}

/// Source of glyph rasterizations and outlines.
pub trait GlyphSource {
    /// Rasterizes a glyph under `matrix`. LCD bitmaps are 8bpp masks
    /// three samples wide per output pixel.
    fn load_glyph_bitmap(
        &self,
        glyph_index: u32,
        font_style: bool,
        matrix: &Matrix,
        dest_width: i32,
        anti_alias: AntiAliasMode,
        options: &TextOptions,
    ) -> Option<Rc<GlyphBitmap>>;

    /// Glyph outline in font units, or `None` for bitmap-only glyphs.
    fn load_glyph_path(&self, glyph_index: u32, dest_width: i32) -> Option<Path>;

    /// True when the font carries vector outlines.
    fn has_outlines(&self) -> bool;

    /// True when the rasterizer applies hinting. Without hinting, LCD
    /// output looks worse than plain anti-aliasing.
    fn hinting_supported(&self) -> bool {
        true
    }

    fn postscript_name(&self) -> String {
        String::new()
    }
}

/// Whether a backend's native text path may be used for this font.
pub fn should_draw_device_text(font: &dyn GlyphSource, options: &TextOptions) -> bool {
    if cfg!(target_os = "macos") {
        // CoreGraphics misrenders these.
        if options.font_is_cid {
            return false;
        }
        let name = font.postscript_name();
        if name.contains("+ZJHL") || name == "CNAAJI+cmex10" {
            return false;
        }
    }
    true
}

const TEXT_GAMMA_ADJUST: [u8; 256] = [
    0, 2, 3, 4, 6, 7, 8, 10, 11, 12, 13, 15, 16, 17, 18, //
    19, 21, 22, 23, 24, 25, 26, 27, 29, 30, 31, 32, 33, 34, 35, //
    36, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48, 49, 51, 52, //
    53, 54, 55, 56, 57, 58, 59, 60, 61, 62, 63, 64, 65, 66, 67, //
    68, 69, 71, 72, 73, 74, 75, 76, 77, 78, 79, 80, 81, 82, 83, //
    84, 85, 86, 87, 88, 89, 90, 91, 92, 93, 94, 95, 96, 97, 98, //
    99, 100, 101, 102, 103, 104, 105, 106, 107, 108, 109, 110, 111, 112, 113, //
    114, 115, 116, 117, 118, 119, 120, 121, 122, 123, 124, 125, 126, 127, 128, //
    129, 129, 130, 131, 132, 133, 134, 135, 136, 137, 138, 139, 140, 141, 142, //
    143, 144, 145, 146, 147, 148, 149, 150, 151, 152, 153, 154, 155, 156, 156, //
    157, 158, 159, 160, 161, 162, 163, 164, 165, 166, 167, 168, 169, 170, 171, //
    172, 173, 174, 174, 175, 176, 177, 178, 179, 180, 181, 182, 183, 184, 185, //
    186, 187, 188, 189, 190, 190, 191, 192, 193, 194, 195, 196, 197, 198, 199, //
    200, 201, 202, 203, 204, 204, 205, 206, 207, 208, 209, 210, 211, 212, 213, //
    214, 215, 216, 217, 217, 218, 219, 220, 221, 222, 223, 224, 225, 226, 227, //
    228, 228, 229, 230, 231, 232, 233, 234, 235, 236, 237, 238, 239, 239, 240, //
    241, 242, 243, 244, 245, 246, 247, 248, 249, 250, 250, 251, 252, 253, 254, //
    255,
];

fn gamma_adjust(value: i32) -> i32 {
    debug_assert!((0..=255).contains(&value));
    i32::from(TEXT_GAMMA_ADJUST[value as usize])
}

fn calc_alpha(src: i32, alpha: i32) -> i32 {
    src * alpha / 255
}

fn merge_gamma_adjust(src: u8, channel: u8, alpha: i32, dest: &mut u8) {
    *dest = alpha_merge(*dest, channel, calc_alpha(gamma_adjust(i32::from(src)), alpha));
}

fn merge_gamma_adjust_rgb(src: &[u8], r: u8, g: u8, b: u8, a: i32, dest: &mut [u8]) {
    merge_gamma_adjust(src[2], b, a, &mut dest[0]);
    merge_gamma_adjust(src[1], g, a, &mut dest[1]);
    merge_gamma_adjust(src[0], r, a, &mut dest[2]);
}

fn average_rgb(src: &[u8]) -> i32 {
    (i32::from(src[0]) + i32::from(src[1]) + i32::from(src[2])) / 3
}

fn apply_alpha(dest: &mut [u8], b: u8, g: u8, r: u8, alpha: i32) {
    dest[0] = alpha_merge(dest[0], b, alpha);
    dest[1] = alpha_merge(dest[1], g, alpha);
    dest[2] = alpha_merge(dest[2], r, alpha);
}

fn apply_dest_alpha(back_alpha: u8, src_alpha: i32, r: u8, g: u8, b: u8, dest: &mut [u8]) {
    let dest_alpha = alpha_union(back_alpha, src_alpha);
    apply_alpha(dest, b, g, r, src_alpha * 255 / i32::from(dest_alpha));
    dest[3] = dest_alpha;
}

fn normalize_argb(r: u8, g: u8, b: u8, dest: &mut [u8], src_alpha: i32) {
    let back_alpha = dest[3];
    if back_alpha == 0 {
        dest[0] = b;
        dest[1] = g;
        dest[2] = r;
        dest[3] = src_alpha as u8;
    } else if src_alpha != 0 {
        apply_dest_alpha(back_alpha, src_alpha, r, g, b, dest);
    }
}

fn normalize_dest(has_alpha: bool, src_value: i32, r: u8, g: u8, b: u8, a: i32, dest: &mut [u8]) {
    let src_alpha = calc_alpha(gamma_adjust(src_value), a);
    if has_alpha {
        normalize_argb(r, g, b, dest, src_alpha);
        return;
    }
    if src_alpha == 0 {
        return;
    }
    apply_alpha(dest, b, g, r, src_alpha);
}

fn normalize_src(has_alpha: bool, src_value: i32, r: u8, g: u8, b: u8, a: i32, dest: &mut [u8]) {
    let src_alpha = calc_alpha(gamma_adjust(src_value), a);
    if !has_alpha {
        apply_alpha(dest, b, g, r, src_alpha);
        return;
    }
    if src_alpha != 0 {
        normalize_argb(r, g, b, dest, src_alpha);
    }
}

/// Merges one LCD glyph into the scratch surface. `x_subpixel` is the
/// sub-pixel phase of the glyph origin; phases 1 and 2 borrow samples
/// from the previous output column when one exists.
#[allow(clippy::too_many_arguments)]
fn draw_normal_text_helper(
    bitmap: &mut Bitmap,
    glyph: &Bitmap,
    nrows: i32,
    left: i32,
    top: i32,
    start_col: i32,
    end_col: i32,
    normalize: bool,
    x_subpixel: i32,
    a: i32,
    r: u8,
    g: u8,
    b: u8,
) {
    let has_alpha = bitmap.format() == Format::Argb;
    let bpp = if has_alpha {
        4
    } else {
        (bitmap.format().bits_per_pixel() / 8) as usize
    };
    let dest_height = bitmap.height();
    let dest_pitch = bitmap.pitch();
    let src_pitch = glyph.pitch();
    let src = glyph.buffer();
    let dest = bitmap.buffer_mut();
    for row in 0..nrows {
        let dest_row = row + top;
        if dest_row < 0 || dest_row >= dest_height {
            continue;
        }
        let mut si = row as usize * src_pitch + (start_col - left) as usize * 3;
        let mut di = dest_row as usize * dest_pitch + start_col as usize * bpp;
        if x_subpixel == 0 {
            for _ in start_col..end_col {
                if normalize {
                    let src_value = average_rgb(&src[si..si + 3]);
                    normalize_dest(has_alpha, src_value, r, g, b, a, &mut dest[di..di + 4]);
                } else {
                    merge_gamma_adjust_rgb(&src[si..si + 3], r, g, b, a, &mut dest[di..di + 3]);
                    if has_alpha {
                        dest[di + 3] = 255;
                    }
                }
                si += 3;
                di += bpp;
            }
            continue;
        }
        if x_subpixel == 1 {
            if normalize {
                let src_value = if start_col > left {
                    average_rgb(&src[si - 1..si + 2])
                } else {
                    (i32::from(src[si]) + i32::from(src[si + 1])) / 3
                };
                normalize_src(has_alpha, src_value, r, g, b, a, &mut dest[di..di + 4]);
            } else {
                if start_col > left {
                    merge_gamma_adjust(src[si - 1], r, a, &mut dest[di + 2]);
                }
                merge_gamma_adjust(src[si], g, a, &mut dest[di + 1]);
                merge_gamma_adjust(src[si + 1], b, a, &mut dest[di]);
                if has_alpha {
                    dest[di + 3] = 255;
                }
            }
            si += 3;
            di += bpp;
            for _ in start_col + 1..end_col {
                if normalize {
                    let src_value = average_rgb(&src[si - 1..si + 2]);
                    normalize_dest(has_alpha, src_value, r, g, b, a, &mut dest[di..di + 4]);
                } else {
                    merge_gamma_adjust_rgb(&src[si - 1..si + 2], r, g, b, a, &mut dest[di..di + 3]);
                    if has_alpha {
                        dest[di + 3] = 255;
                    }
                }
                si += 3;
                di += bpp;
            }
            continue;
        }
        if normalize {
            let src_value = if start_col > left {
                average_rgb(&src[si - 2..si + 1])
            } else {
                i32::from(src[si]) / 3
            };
            normalize_src(has_alpha, src_value, r, g, b, a, &mut dest[di..di + 4]);
        } else {
            if start_col > left {
                merge_gamma_adjust(src[si - 2], r, a, &mut dest[di + 2]);
                merge_gamma_adjust(src[si - 1], g, a, &mut dest[di + 1]);
            }
            merge_gamma_adjust(src[si], b, a, &mut dest[di]);
            if has_alpha {
                dest[di + 3] = 255;
            }
        }
        si += 3;
        di += bpp;
        for _ in start_col + 1..end_col {
            if normalize {
                let src_value = average_rgb(&src[si - 2..si + 1]);
                normalize_dest(has_alpha, src_value, r, g, b, a, &mut dest[di..di + 4]);
            } else {
                merge_gamma_adjust_rgb(&src[si - 2..si + 1], r, g, b, a, &mut dest[di..di + 3]);
                if has_alpha {
                    dest[di + 3] = 255;
                }
            }
            si += 3;
            di += bpp;
        }
    }
}

/// Evens out glyph spacing on a horizontal or vertical run when
/// rounding the origins drifted more than half a pixel from the
/// fractional positions.
fn adjust_glyph_space(glyphs: &mut [TextGlyphPos]) {
    debug_assert!(glyphs.len() > 1);
    let first = glyphs[0].origin;
    let last = glyphs[glyphs.len() - 1].origin;
    let vertical = last.x == first.x;
    if !vertical && last.y != first.y {
        return;
    }
    for i in (2..glyphs.len()).rev() {
        let next = &glyphs[i];
        let next_origin = if vertical { next.origin.y } else { next.origin.x };
        let next_origin_f = if vertical {
            next.device_origin.y
        } else {
            next.device_origin.x
        };
        let current = &glyphs[i - 1];
        let current_origin = if vertical {
            current.origin.y
        } else {
            current.origin.x
        };
        let current_origin_f = if vertical {
            current.device_origin.y
        } else {
            current.device_origin.x
        };

        let Some(space) = next_origin.checked_sub(current_origin) else {
            continue;
        };
        let space_f = next_origin_f - current_origin_f;
        let error = space_f.abs() - (space as f32).abs();
        if error <= 0.5 {
            continue;
        }

        let Some(adjusted) = current_origin.checked_add(if space > 0 { -1 } else { 1 }) else {
            continue;
        };
        let current = &mut glyphs[i - 1];
        if vertical {
            current.origin.y = adjusted;
        } else {
            current.origin.x = adjusted;
        }
    }
}

/// Device-space bounds of a glyph run, or `None` when no glyph loaded
/// or every position overflows.
fn glyphs_bbox(glyphs: &[TextGlyphPos], anti_alias: AntiAliasMode) -> Option<RectI> {
    let mut rect: Option<RectI> = None;
    for glyph in glyphs {
        let Some(g) = glyph.glyph.as_deref() else {
            continue;
        };
        let Some(char_left) = glyph.origin.x.checked_add(g.left) else {
            continue;
        };
        let mut char_width = g.bitmap.width();
        if anti_alias == AntiAliasMode::Lcd {
            char_width /= 3;
        }
        let Some(char_right) = char_left.checked_add(char_width) else {
            continue;
        };
        let Some(char_top) = glyph.origin.y.checked_sub(g.top) else {
            continue;
        };
        let Some(char_bottom) = char_top.checked_add(g.bitmap.height()) else {
            continue;
        };
        rect = Some(match rect {
            None => RectI::new(char_left, char_top, char_right, char_bottom),
            Some(r) => RectI::new(
                r.left.min(char_left),
                r.top.min(char_top),
                r.right.max(char_right),
                r.bottom.max(char_bottom),
            ),
        });
    }
    rect
}

impl RenderDevice {
    /// Draws a text run through the glyph compositor, choosing mono,
    /// anti-aliased or LCD rendering from the surface and options.
    pub fn draw_normal_text(
        &mut self,
        chars: &[TextCharPos],
        font: &dyn GlyphSource,
        font_size: f32,
        text_matrix: &Matrix,
        fill_color: Argb,
        options: &TextOptions,
    ) -> RenderResult<()> {
        let mut anti_alias = AntiAliasMode::Mono;
        let mut normalize = false;
        let is_smooth = options.is_smooth();
        let mut text_options = *options;
        if is_smooth && self.device_type() == DeviceType::Display && self.bits_per_pixel() > 1 {
            if !font.hinting_supported() {
                anti_alias = AntiAliasMode::AntiAliased;
                text_options.aliasing = TextAliasing::AntiAliased;
            } else if self.render_caps().contains(RenderCaps::ALPHA_OUTPUT) {
                anti_alias = AntiAliasMode::Lcd;
                normalize = true;
            } else if self.bits_per_pixel() < 16 {
                anti_alias = AntiAliasMode::AntiAliased;
            } else {
                anti_alias = AntiAliasMode::Lcd;
                normalize = !font.has_outlines() || options.aliasing != TextAliasing::Lcd;
            }
        }

        if self.device_type() != DeviceType::Display {
            if should_draw_device_text(font, options)
                && self.driver_mut().draw_device_text(
                    chars,
                    font,
                    text_matrix,
                    font_size,
                    fill_color,
                    &text_options,
                )
            {
                return Ok(());
            }
            if argb_alpha(fill_color) < 255 {
                return Err(RenderError::Unsupported);
            }
        } else if options.native_text
            && should_draw_device_text(font, options)
            && self.driver_mut().draw_device_text(
                chars,
                font,
                text_matrix,
                font_size,
                fill_color,
                &text_options,
            )
        {
            return Ok(());
        }

        let mut char2device = *text_matrix;
        char2device.scale(font_size, -font_size);
        if char2device.a.abs() + char2device.b.abs() > 50.0
            || self.device_type() == DeviceType::Printer
        {
            if font.has_outlines() {
                let path_options = FillOptions {
                    aliased_path: !is_smooth,
                    ..FillOptions::default()
                };
                return self.draw_text_path(
                    chars,
                    font,
                    font_size,
                    text_matrix,
                    None,
                    None,
                    fill_color,
                    0,
                    None,
                    &path_options,
                );
            }
        }

        let mut glyphs: Vec<TextGlyphPos> = Vec::with_capacity(chars.len());
        for charpos in chars {
            let device_origin = text_matrix.transform_point(charpos.origin);
            let origin = PointI::new(
                if anti_alias < AntiAliasMode::Lcd {
                    device_origin.x.round() as i32
                } else {
                    device_origin.x.floor() as i32
                },
                device_origin.y.round() as i32,
            );
            let glyph = match charpos.adjust_matrix {
                Some(adjust) => {
                    let mut m = Matrix::new(adjust[0], adjust[1], adjust[2], adjust[3], 0.0, 0.0);
                    m.concat(&char2device);
                    font.load_glyph_bitmap(
                        charpos.glyph_index,
                        charpos.font_style,
                        &m,
                        charpos.font_char_width,
                        anti_alias,
                        &text_options,
                    )
                }
                None => font.load_glyph_bitmap(
                    charpos.glyph_index,
                    charpos.font_style,
                    &char2device,
                    charpos.font_char_width,
                    anti_alias,
                    &text_options,
                ),
            };
            glyphs.push(TextGlyphPos {
                glyph,
                origin,
                device_origin,
            });
        }
        if anti_alias < AntiAliasMode::Lcd && glyphs.len() > 1 {
            adjust_glyph_space(&mut glyphs);
        }

        let Some(mut bmp_rect) = glyphs_bbox(&glyphs, anti_alias) else {
            return Ok(());
        };
        bmp_rect.intersect(&self.clip_box());
        if bmp_rect.is_empty() {
            return Ok(());
        }

        let pixel_width = bmp_rect.width();
        let pixel_height = bmp_rect.height();
        let pixel_left = bmp_rect.left;
        let pixel_top = bmp_rect.top;
        if anti_alias == AntiAliasMode::Mono {
            let Some(mut bitmap) = Bitmap::new(pixel_width, pixel_height, Format::Mask1) else {
                return Err(RenderError::Allocation {
                    width: pixel_width,
                    height: pixel_height,
                });
            };
            bitmap.clear(0);
            for glyph in &glyphs {
                let Some(g) = glyph.glyph.as_deref() else {
                    continue;
                };
                let Some(point) = glyph.screen_origin(PointI::new(pixel_left, pixel_top)) else {
                    continue;
                };
                bitmap.or_transfer(point.x, point.y, g.bitmap.width(), g.bitmap.height(), &g.bitmap);
            }
            if self.set_bit_mask(&bitmap, bmp_rect.left, bmp_rect.top, fill_color) {
                return Ok(());
            }
            return Err(RenderError::Backend);
        }

        let mut bitmap = if self.bits_per_pixel() == 8 {
            Bitmap::new(pixel_width, pixel_height, Format::Mask8)
        } else {
            self.create_compatible_bitmap(pixel_width, pixel_height)
        }
        .ok_or(RenderError::Allocation {
            width: pixel_width,
            height: pixel_height,
        })?;
        if !bitmap.has_alpha() && !bitmap.is_mask() {
            bitmap.clear(0xffff_ffff);
            if !self.get_dibits(&mut bitmap, bmp_rect.left, bmp_rect.top) {
                return Err(RenderError::Backend);
            }
        } else {
            bitmap.clear(0);
        }

        let dest_width = pixel_width;
        let (mut a, mut r, mut g, mut b) = (0i32, 0u8, 0u8, 0u8);
        if anti_alias == AntiAliasMode::Lcd {
            let (ca, cr, cg, cb) = argb_decode(fill_color);
            a = i32::from(ca);
            r = cr;
            g = cg;
            b = cb;
        }

        for glyph in &glyphs {
            let Some(gb) = glyph.glyph.as_deref() else {
                continue;
            };
            let Some(point) = glyph.screen_origin(PointI::new(pixel_left, pixel_top)) else {
                continue;
            };
            let mut ncols = gb.bitmap.width();
            let nrows = gb.bitmap.height();
            if anti_alias == AntiAliasMode::AntiAliased {
                if !bitmap.composite_mask(point.x, point.y, ncols, nrows, &gb.bitmap, fill_color) {
                    return Err(RenderError::Backend);
                }
                continue;
            }
            ncols /= 3;
            let x_subpixel = (glyph.device_origin.x * 3.0) as i32 % 3;
            let start_col = point.x.max(0);
            let Some(end_col) = point.x.checked_add(ncols) else {
                continue;
            };
            let end_col = end_col.min(dest_width);
            if start_col >= end_col {
                continue;
            }
            draw_normal_text_helper(
                &mut bitmap,
                &gb.bitmap,
                nrows,
                point.x,
                point.y,
                start_col,
                end_col,
                normalize,
                x_subpixel,
                a,
                r,
                g,
                b,
            );
        }
        if bitmap.is_mask() {
            self.set_bit_mask(&bitmap, bmp_rect.left, bmp_rect.top, fill_color);
        } else {
            self.set_dibits(&bitmap, bmp_rect.left, bmp_rect.top);
        }
        Ok(())
    }

    /// Draws a text run as outline paths, optionally accumulating the
    /// transformed outlines into `clipping_path`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_text_path(
        &mut self,
        chars: &[TextCharPos],
        font: &dyn GlyphSource,
        font_size: f32,
        text_matrix: &Matrix,
        user_matrix: Option<&Matrix>,
        state: Option<&StrokeState>,
        fill_color: Argb,
        stroke_color: Argb,
        mut clipping_path: Option<&mut Path>,
        options: &FillOptions,
    ) -> RenderResult<()> {
        for charpos in chars {
            let mut matrix = match charpos.adjust_matrix {
                Some(m) => Matrix::new(m[0], m[1], m[2], m[3], 0.0, 0.0),
                None => Matrix::identity(),
            };
            matrix.concat(&Matrix::new(
                font_size,
                0.0,
                0.0,
                font_size,
                charpos.origin.x,
                charpos.origin.y,
            ));
            let Some(mut path) = font.load_glyph_path(charpos.glyph_index, charpos.font_char_width)
            else {
                continue;
            };
            matrix.concat(text_matrix);
            path.transform(&matrix);
            if fill_color != 0 || stroke_color != 0 {
                let mut path_options = *options;
                if fill_color != 0 {
                    path_options.fill_type = FillType::Winding;
                }
                path_options.text_mode = true;
                self.draw_path(
                    &path,
                    user_matrix,
                    state,
                    fill_color,
                    stroke_color,
                    &path_options,
                )?;
            }
            if let Some(clip) = clipping_path.as_deref_mut() {
                clip.append(&path, user_matrix);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::color::argb_encode;

    #[test]
    fn test_gamma_table_is_monotonic() {
        assert_eq!(TEXT_GAMMA_ADJUST[0], 0);
        assert_eq!(TEXT_GAMMA_ADJUST[255], 255);
        for i in 1..256 {
            assert!(TEXT_GAMMA_ADJUST[i] >= TEXT_GAMMA_ADJUST[i - 1]);
        }
    }

    #[test]
    fn test_gamma_lifts_midtones() {
        // Coverage around 25% renders noticeably darker without the
        // adjustment.
        assert_eq!(gamma_adjust(64), 73);
        assert!(gamma_adjust(128) > 128);
    }

    #[test]
    fn test_calc_alpha_scales_by_fill_alpha() {
        assert_eq!(calc_alpha(255, 255), 255);
        assert_eq!(calc_alpha(255, 128), 128);
        assert_eq!(calc_alpha(0, 255), 0);
    }

    #[test]
    fn test_average_rgb() {
        assert_eq!(average_rgb(&[30, 60, 90]), 60);
    }

    #[test]
    fn test_normalize_argb_on_clear_backdrop_assigns() {
        let mut dest = [0u8; 4];
        normalize_argb(10, 20, 30, &mut dest, 200);
        assert_eq!(dest, [30, 20, 10, 200]);
    }

    #[test]
    fn test_normalize_argb_blends_over_backdrop() {
        let mut dest = [0u8, 0, 0, 255];
        normalize_argb(255, 255, 255, &mut dest, 255);
        assert_eq!(dest, [255, 255, 255, 255]);
    }

    #[test]
    fn test_screen_origin_applies_bearing_and_offset() {
        let glyph = GlyphBitmap {
            left: 2,
            top: 7,
            bitmap: Bitmap::new(4, 4, Format::Mask8).unwrap(),
        };
        let pos = TextGlyphPos {
            glyph: Some(Rc::new(glyph)),
            origin: PointI::new(10, 20),
            device_origin: PointF::new(10.0, 20.0),
        };
        let p = pos.screen_origin(PointI::new(3, 4)).unwrap();
        assert_eq!(p, PointI::new(9, 9));
    }

    #[test]
    fn test_screen_origin_without_glyph() {
        let pos = TextGlyphPos::default();
        assert!(pos.screen_origin(PointI::new(0, 0)).is_none());
    }

    #[test]
    fn test_adjust_glyph_space_pulls_drifted_glyph_back() {
        // Rounded origins put 11px between the last two glyphs while
        // the fractional positions are 12.2px apart.
        let mut glyphs = vec![
            TextGlyphPos {
                glyph: None,
                origin: PointI::new(0, 50),
                device_origin: PointF::new(0.0, 50.0),
            },
            TextGlyphPos {
                glyph: None,
                origin: PointI::new(12, 50),
                device_origin: PointF::new(11.6, 50.0),
            },
            TextGlyphPos {
                glyph: None,
                origin: PointI::new(23, 50),
                device_origin: PointF::new(23.8, 50.0),
            },
        ];
        adjust_glyph_space(&mut glyphs);
        assert_eq!(glyphs[1].origin.x, 11);
        assert_eq!(glyphs[0].origin.x, 0);
    }

    #[test]
    fn test_adjust_glyph_space_skips_diagonal_runs() {
        let mut glyphs = vec![
            TextGlyphPos {
                glyph: None,
                origin: PointI::new(0, 0),
                device_origin: PointF::new(0.0, 0.0),
            },
            TextGlyphPos {
                glyph: None,
                origin: PointI::new(12, 5),
                device_origin: PointF::new(10.2, 5.0),
            },
            TextGlyphPos {
                glyph: None,
                origin: PointI::new(24, 10),
                device_origin: PointF::new(22.2, 10.0),
            },
        ];
        adjust_glyph_space(&mut glyphs);
        assert_eq!(glyphs[1].origin.x, 12);
    }

    #[test]
    fn test_glyphs_bbox_unions_and_divides_lcd_width() {
        let make = |x: i32, y: i32, w: i32, h: i32| TextGlyphPos {
            glyph: Some(Rc::new(GlyphBitmap {
                left: 0,
                top: 0,
                bitmap: Bitmap::new(w, h, Format::Mask8).unwrap(),
            })),
            origin: PointI::new(x, y),
            device_origin: PointF::new(x as f32, y as f32),
        };
        let glyphs = [make(0, 0, 9, 5), make(10, 2, 6, 4)];
        let rect = glyphs_bbox(&glyphs, AntiAliasMode::Lcd).unwrap();
        assert_eq!(rect, RectI::new(0, 0, 12, 6));
        let rect = glyphs_bbox(&glyphs, AntiAliasMode::AntiAliased).unwrap();
        assert_eq!(rect, RectI::new(0, 0, 16, 6));
    }

    #[test]
    fn test_glyphs_bbox_empty_run() {
        assert!(glyphs_bbox(&[TextGlyphPos::default()], AntiAliasMode::Mono).is_none());
    }

    #[test]
    fn test_lcd_helper_full_coverage_writes_fill_color() {
        let mut surface = Bitmap::new(2, 1, Format::Rgb32).unwrap();
        surface.clear(0xffff_ffff);
        let mut glyph = Bitmap::new(6, 1, Format::Mask8).unwrap();
        glyph.buffer_mut()[..6].fill(255);
        let (a, r, g, b) = (255, 0x10, 0x20, 0x30);
        draw_normal_text_helper(&mut surface, &glyph, 1, 0, 0, 0, 2, false, 0, a, r, g, b);
        assert_eq!(surface.pixel(0, 0), argb_encode(255, 0x10, 0x20, 0x30));
        assert_eq!(surface.pixel(1, 0), argb_encode(255, 0x10, 0x20, 0x30));
    }

    #[test]
    fn test_lcd_helper_zero_coverage_leaves_backdrop() {
        let mut surface = Bitmap::new(2, 1, Format::Rgb32).unwrap();
        surface.clear(0xffff_ffff);
        let glyph = Bitmap::new(6, 1, Format::Mask8).unwrap();
        draw_normal_text_helper(&mut surface, &glyph, 1, 0, 0, 0, 2, false, 0, 255, 0, 0, 0);
        assert_eq!(surface.pixel(0, 0), 0xffff_ffff);
    }

    #[test]
    fn test_lcd_helper_normalize_fills_argb_surface() {
        let mut surface = Bitmap::new(2, 1, Format::Argb).unwrap();
        surface.clear(0);
        let mut glyph = Bitmap::new(6, 1, Format::Mask8).unwrap();
        glyph.buffer_mut()[..6].fill(255);
        draw_normal_text_helper(&mut surface, &glyph, 1, 0, 0, 0, 2, true, 0, 255, 0xff, 0, 0);
        assert_eq!(surface.pixel(0, 0), argb_encode(255, 0xff, 0, 0));
    }

    #[test]
    fn test_lcd_helper_clips_rows_outside_surface() {
        let mut surface = Bitmap::new(2, 1, Format::Rgb32).unwrap();
        surface.clear(0xffff_ffff);
        let mut glyph = Bitmap::new(6, 2, Format::Mask8).unwrap();
        glyph.buffer_mut().fill(255);
        draw_normal_text_helper(&mut surface, &glyph, 2, 0, -1, 0, 2, false, 0, 255, 0, 0, 0);
        assert_eq!(surface.pixel(0, 0), argb_encode(255, 0, 0, 0));
    }

    struct NamedSource(&'static str);

    impl GlyphSource for NamedSource {
        fn load_glyph_bitmap(
            &self,
            _glyph_index: u32,
            _font_style: bool,
            _matrix: &Matrix,
            _dest_width: i32,
            _anti_alias: AntiAliasMode,
            _options: &TextOptions,
        ) -> Option<Rc<GlyphBitmap>> {
            None
        }

        fn load_glyph_path(&self, _glyph_index: u32, _dest_width: i32) -> Option<Path> {
            None
        }

        fn has_outlines(&self) -> bool {
            false
        }

        fn postscript_name(&self) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn test_should_draw_device_text() {
        let options = TextOptions::default();
        assert!(should_draw_device_text(&NamedSource("Helvetica"), &options));
        if cfg!(target_os = "macos") {
            assert!(!should_draw_device_text(
                &NamedSource("ABCDEF+ZJHL"),
                &options
            ));
            assert!(!should_draw_device_text(
                &NamedSource("CNAAJI+cmex10"),
                &options
            ));
            let cid = TextOptions {
                font_is_cid: true,
                ..TextOptions::default()
            };
            assert!(!should_draw_device_text(&NamedSource("Helvetica"), &cid));
        }
    }

    #[test]
    fn test_anti_alias_mode_ordering() {
        assert!(AntiAliasMode::Mono < AntiAliasMode::AntiAliased);
        assert!(AntiAliasMode::AntiAliased < AntiAliasMode::Lcd);
    }
}
