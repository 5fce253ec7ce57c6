//! Rendering primitives: paths, stroke state, device dispatch, and
//! glyph compositing.

pub mod color;
pub mod device;
pub mod fill_options;
pub mod graph_state;
pub mod path;
pub mod text;
pub mod zero_area;

#[cfg(feature = "rendering")]
pub mod skia_driver;

pub use color::{Argb, argb_decode, argb_encode};
pub use device::{
    BlendMode, BorderStyle, DeviceDriver, DeviceType, RenderCaps, RenderDevice, RenderError,
    RenderResult, StateRestorer,
};
pub use fill_options::{FillOptions, FillType};
pub use graph_state::{GraphState, LineCap, LineJoin, StrokeState};
pub use path::{Path, Point, PointKind};
pub use text::{
    AntiAliasMode, GlyphBitmap, GlyphSource, TextAliasing, TextCharPos, TextGlyphPos, TextOptions,
};
pub use zero_area::{ZeroAreaPath, zero_area_path};

#[cfg(feature = "rendering")]
pub use skia_driver::SkiaDriver;
