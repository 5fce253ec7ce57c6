//! # pdf-gfx
//!
//! Rasterization core for PDF rendering: vector path geometry, device
//! dispatch, and glyph compositing.
//!
//! The crate is backend-agnostic. A [`rendering::RenderDevice`] wraps
//! any [`rendering::DeviceDriver`] implementation and routes draw
//! calls to the cheapest primitive the backend supports; the optional
//! `rendering` feature provides a tiny-skia based software backend.
//!
//! Glyphs are supplied pre-rasterized (or as outlines) through the
//! [`rendering::GlyphSource`] trait; font parsing is out of scope.

pub mod dib;
pub mod geometry;
pub mod rendering;

pub use geometry::{FloatRect, Matrix, PointF, PointI, RectI};
pub use rendering::{RenderDevice, RenderError, RenderResult};
