use std::time::Duration;

use crate::color::Color;
use crate::effects::FrameOutput;

pub struct StaticColor {
    color: Color,
}

impl StaticColor {
    pub fn new(color: Color) -> StaticColor {
        StaticColor { color }
    }

    pub fn compose(&self, out: &mut impl FrameOutput) {
        out.emit(self.color, Duration::ZERO);
    }
}
