//! ARGB color packing and alpha blending helpers.

/// 32-bit color, packed as `0xAARRGGBB`.
pub type Argb = u32;

pub fn argb_encode(a: u32, r: u32, g: u32, b: u32) -> Argb {
    (a << 24) | (r << 16) | (g << 8) | b
}

/// Unpacks to `(alpha, red, green, blue)`.
pub fn argb_decode(argb: Argb) -> (u8, u8, u8, u8) {
    (
        (argb >> 24) as u8,
        (argb >> 16) as u8,
        (argb >> 8) as u8,
        argb as u8,
    )
}

pub fn argb_alpha(argb: Argb) -> u8 {
    (argb >> 24) as u8
}

/// Linear interpolation of a channel toward `source` by `alpha`/255.
pub fn alpha_merge(backdrop: u8, source: u8, alpha: i32) -> u8 {
    (i32::from(backdrop) + (i32::from(source) - i32::from(backdrop)) * alpha / 255) as u8
}

/// Alpha union of a backdrop and a source coverage value.
pub fn alpha_union(backdrop: u8, source: i32) -> u8 {
    (i32::from(backdrop) + source - i32::from(backdrop) * source / 255) as u8
}
