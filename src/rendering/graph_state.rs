//! Stroke state with copy-on-write sharing.

use std::rc::Rc;

/// Shape of a stroke's endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

/// Shape of a stroke's corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

/// Immutable stroke parameters handed to device drivers.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeState {
    pub line_width: f32,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f32,
    pub dash_phase: f32,
    pub dash_array: Vec<f32>,
}

impl Default for StrokeState {
    fn default() -> Self {
        StrokeState {
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 10.0,
            dash_phase: 0.0,
            dash_array: Vec::new(),
        }
    }
}

impl StrokeState {
    pub fn is_dashed(&self) -> bool {
        !self.dash_array.is_empty()
    }
}

/// Graphics-state handle whose stroke parameters are shared until
/// written. Cloning is cheap; setters copy the payload only when it
/// is shared.
#[derive(Debug, Clone, Default)]
pub struct GraphState {
    data: Rc<StrokeState>,
}

impl GraphState {
    pub fn new() -> Self {
        GraphState::default()
    }

    pub fn data(&self) -> &StrokeState {
        &self.data
    }

    pub fn set_line_width(&mut self, width: f32) {
        Rc::make_mut(&mut self.data).line_width = width;
    }

    pub fn set_line_cap(&mut self, cap: LineCap) {
        Rc::make_mut(&mut self.data).line_cap = cap;
    }

    pub fn set_line_join(&mut self, join: LineJoin) {
        Rc::make_mut(&mut self.data).line_join = join;
    }

    pub fn set_miter_limit(&mut self, limit: f32) {
        Rc::make_mut(&mut self.data).miter_limit = limit;
    }

    pub fn set_dash(&mut self, array: Vec<f32>, phase: f32) {
        let data = Rc::make_mut(&mut self.data);
        data.dash_array = array;
        data.dash_phase = phase;
    }
}
