//! Scratch bitmaps for compositing fallbacks and text rendering.
//!
//! This is deliberately small: just the formats and blend operations
//! the render device needs when a backend lacks a native primitive.
//! Color pixels are stored in BGRA byte order.

use crate::rendering::color::{Argb, alpha_merge, alpha_union, argb_decode, argb_encode};

/// Pixel format of a [`Bitmap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// 1 bit per pixel coverage mask, MSB first.
    Mask1,
    /// 8 bit per pixel coverage mask.
    Mask8,
    /// 32 bit BGRx, alpha byte ignored.
    Rgb32,
    /// 32 bit BGRA.
    Argb,
}

impl Format {
    pub fn bits_per_pixel(self) -> i32 {
        match self {
            Format::Mask1 => 1,
            Format::Mask8 => 8,
            Format::Rgb32 | Format::Argb => 32,
        }
    }

    pub fn is_mask(self) -> bool {
        matches!(self, Format::Mask1 | Format::Mask8)
    }

    pub fn has_alpha(self) -> bool {
        self == Format::Argb
    }
}

/// An owned pixel buffer with a row pitch rounded up to 4 bytes.
#[derive(Debug, Clone)]
pub struct Bitmap {
    width: i32,
    height: i32,
    format: Format,
    pitch: usize,
    buf: Vec<u8>,
}

impl Bitmap {
    /// Allocates a zeroed bitmap. Fails on non-positive dimensions and
    /// on buffer sizes the allocator cannot satisfy.
    pub fn new(width: i32, height: i32, format: Format) -> Option<Bitmap> {
        if width <= 0 || height <= 0 {
            return None;
        }
        let bits = (width as usize).checked_mul(format.bits_per_pixel() as usize)?;
        let pitch = bits.checked_add(31)? / 32 * 4;
        let size = pitch.checked_mul(height as usize)?;
        // try_reserve turns capacity overflow and allocator failure
        // into a recoverable error instead of a panic.
        let mut buf = Vec::new();
        buf.try_reserve_exact(size).ok()?;
        buf.resize(size, 0);
        Some(Bitmap {
            width,
            height,
            format,
            pitch,
            buf,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn is_mask(&self) -> bool {
        self.format.is_mask()
    }

    pub fn has_alpha(&self) -> bool {
        self.format.has_alpha()
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    pub fn row(&self, y: i32) -> &[u8] {
        let start = y as usize * self.pitch;
        &self.buf[start..start + self.pitch]
    }

    pub fn row_mut(&mut self, y: i32) -> &mut [u8] {
        let start = y as usize * self.pitch;
        &mut self.buf[start..start + self.pitch]
    }

    /// Fills the whole surface. Color formats take the ARGB value,
    /// masks take its low byte as coverage.
    pub fn clear(&mut self, color: Argb) {
        match self.format {
            Format::Mask1 | Format::Mask8 => {
                self.buf.fill(color as u8);
            }
            Format::Rgb32 | Format::Argb => {
                let (a, r, g, b) = argb_decode(color);
                for y in 0..self.height {
                    let row = self.row_mut(y);
                    for px in row.chunks_exact_mut(4) {
                        px[0] = b;
                        px[1] = g;
                        px[2] = r;
                        px[3] = a;
                    }
                }
            }
        }
    }

    fn mask1_bit(&self, x: i32, y: i32) -> bool {
        let row = self.row(y);
        row[(x >> 3) as usize] & (0x80 >> (x & 7)) != 0
    }

    fn set_mask1_bit(&mut self, x: i32, y: i32) {
        let row = self.row_mut(y);
        row[(x >> 3) as usize] |= 0x80 >> (x & 7);
    }

    /// Clips a dest/src overlap region; returns
    /// `(dest_x, dest_y, src_x, src_y, width, height)`.
    fn clip_transfer(
        &self,
        dest_left: i32,
        dest_top: i32,
        width: i32,
        height: i32,
        src_width: i32,
        src_height: i32,
    ) -> Option<(i32, i32, i32, i32, i32, i32)> {
        let mut src_x = 0;
        let mut src_y = 0;
        let mut dx = dest_left;
        let mut dy = dest_top;
        let mut w = width.min(src_width);
        let mut h = height.min(src_height);
        if dx < 0 {
            src_x -= dx;
            w += dx;
            dx = 0;
        }
        if dy < 0 {
            src_y -= dy;
            h += dy;
            dy = 0;
        }
        w = w.min(self.width - dx);
        h = h.min(self.height - dy);
        if w <= 0 || h <= 0 {
            return None;
        }
        Some((dx, dy, src_x, src_y, w, h))
    }

    /// ORs a 1bpp mask into a 1bpp destination.
    pub fn or_transfer(&mut self, dest_left: i32, dest_top: i32, width: i32, height: i32, src: &Bitmap) {
        if self.format != Format::Mask1 || src.format != Format::Mask1 {
            return;
        }
        let Some((dx, dy, sx, sy, w, h)) =
            self.clip_transfer(dest_left, dest_top, width, height, src.width, src.height)
        else {
            return;
        };
        for row in 0..h {
            for col in 0..w {
                if src.mask1_bit(sx + col, sy + row) {
                    self.set_mask1_bit(dx + col, dy + row);
                }
            }
        }
    }

    /// Blends an 8bpp coverage mask, tinted with `color`, over the
    /// destination.
    pub fn composite_mask(
        &mut self,
        dest_left: i32,
        dest_top: i32,
        width: i32,
        height: i32,
        mask: &Bitmap,
        color: Argb,
    ) -> bool {
        if mask.format != Format::Mask8 || self.format == Format::Mask1 {
            return false;
        }
        let Some((dx, dy, sx, sy, w, h)) =
            self.clip_transfer(dest_left, dest_top, width, height, mask.width, mask.height)
        else {
            return true;
        };
        let (a, r, g, b) = argb_decode(color);
        for row in 0..h {
            for col in 0..w {
                let cov = mask.row(sy + row)[(sx + col) as usize];
                let src_alpha = i32::from(cov) * i32::from(a) / 255;
                if src_alpha == 0 {
                    continue;
                }
                match self.format {
                    Format::Mask8 => {
                        let y = dy + row;
                        let px = &mut self.row_mut(y)[(dx + col) as usize];
                        *px = alpha_union(*px, src_alpha);
                    }
                    Format::Rgb32 => {
                        let y = dy + row;
                        let start = ((dx + col) * 4) as usize;
                        let px = &mut self.row_mut(y)[start..start + 4];
                        px[0] = alpha_merge(px[0], b, src_alpha);
                        px[1] = alpha_merge(px[1], g, src_alpha);
                        px[2] = alpha_merge(px[2], r, src_alpha);
                    }
                    Format::Argb => {
                        let y = dy + row;
                        let start = ((dx + col) * 4) as usize;
                        let px = &mut self.row_mut(y)[start..start + 4];
                        if px[3] == 0 {
                            px[0] = b;
                            px[1] = g;
                            px[2] = r;
                            px[3] = src_alpha as u8;
                        } else {
                            let dest_alpha = alpha_union(px[3], src_alpha);
                            let ratio = src_alpha * 255 / i32::from(dest_alpha);
                            px[0] = alpha_merge(px[0], b, ratio);
                            px[1] = alpha_merge(px[1], g, ratio);
                            px[2] = alpha_merge(px[2], r, ratio);
                            px[3] = dest_alpha;
                        }
                    }
                    Format::Mask1 => unreachable!(),
                }
            }
        }
        true
    }

    /// Blends a solid color over a rectangular region.
    pub fn composite_rect(&mut self, left: i32, top: i32, width: i32, height: i32, color: Argb) -> bool {
        if self.format == Format::Mask1 {
            return false;
        }
        let Some((dx, dy, _, _, w, h)) =
            self.clip_transfer(left, top, width, height, width, height)
        else {
            return true;
        };
        let (a, r, g, b) = argb_decode(color);
        for row in 0..h {
            let y = dy + row;
            match self.format {
                Format::Mask8 => {
                    let scan = self.row_mut(y);
                    for col in 0..w {
                        scan[(dx + col) as usize] = a;
                    }
                }
                Format::Rgb32 => {
                    let scan = self.row_mut(y);
                    for col in 0..w {
                        let start = ((dx + col) * 4) as usize;
                        let px = &mut scan[start..start + 4];
                        if a == 255 {
                            px[0] = b;
                            px[1] = g;
                            px[2] = r;
                        } else {
                            px[0] = alpha_merge(px[0], b, i32::from(a));
                            px[1] = alpha_merge(px[1], g, i32::from(a));
                            px[2] = alpha_merge(px[2], r, i32::from(a));
                        }
                    }
                }
                Format::Argb => {
                    let scan = self.row_mut(y);
                    for col in 0..w {
                        let start = ((dx + col) * 4) as usize;
                        let px = &mut scan[start..start + 4];
                        if a == 255 || px[3] == 0 {
                            px[0] = b;
                            px[1] = g;
                            px[2] = r;
                            px[3] = a;
                        } else {
                            let dest_alpha = alpha_union(px[3], i32::from(a));
                            let ratio = i32::from(a) * 255 / i32::from(dest_alpha);
                            px[0] = alpha_merge(px[0], b, ratio);
                            px[1] = alpha_merge(px[1], g, ratio);
                            px[2] = alpha_merge(px[2], r, ratio);
                            px[3] = dest_alpha;
                        }
                    }
                }
                Format::Mask1 => unreachable!(),
            }
        }
        true
    }

    /// Reads a pixel as ARGB. Masks report coverage in the alpha byte.
    pub fn pixel(&self, x: i32, y: i32) -> Argb {
        match self.format {
            Format::Mask1 => {
                if self.mask1_bit(x, y) {
                    0xff00_0000
                } else {
                    0
                }
            }
            Format::Mask8 => u32::from(self.row(y)[x as usize]) << 24,
            Format::Rgb32 => {
                let start = (x * 4) as usize;
                let px = &self.row(y)[start..start + 4];
                argb_encode(0xff, u32::from(px[2]), u32::from(px[1]), u32::from(px[0]))
            }
            Format::Argb => {
                let start = (x * 4) as usize;
                let px = &self.row(y)[start..start + 4];
                argb_encode(
                    u32::from(px[3]),
                    u32::from(px[2]),
                    u32::from(px[1]),
                    u32::from(px[0]),
                )
            }
        }
    }
}
