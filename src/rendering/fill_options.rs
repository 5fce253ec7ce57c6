//! Fill rule and rasterization flags for path drawing.

/// Interior rule applied when filling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillType {
    /// Stroke-only drawing.
    #[default]
    NoFill,
    EvenOdd,
    Winding,
}

/// Per-call rendering flags accompanying a fill type.
#[derive(Debug, Clone, Copy, Default)]
pub struct FillOptions {
    pub fill_type: FillType,
    /// Widen hairline strokes slightly for legibility.
    pub adjust_stroke: bool,
    /// Rasterize without anti-aliasing.
    pub aliased_path: bool,
    /// Sample pixel centers as fully covered.
    pub full_cover: bool,
    /// Rectangles must take the anti-aliased path, not the snapped
    /// fill-rect fast path.
    pub rect_aa: bool,
    /// Stroke in addition to any fill.
    pub stroke: bool,
    /// Stroke using text rendering rules.
    pub stroke_text_mode: bool,
    /// The path is a text outline.
    pub text_mode: bool,
    /// The path is a synthesized zero-area hairline.
    pub zero_area: bool,
}

impl FillOptions {
    pub fn winding() -> Self {
        FillOptions {
            fill_type: FillType::Winding,
            ..FillOptions::default()
        }
    }

    pub fn even_odd() -> Self {
        FillOptions {
            fill_type: FillType::EvenOdd,
            ..FillOptions::default()
        }
    }

    pub fn is_fill(&self) -> bool {
        self.fill_type != FillType::NoFill
    }
}
