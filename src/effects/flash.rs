use crate::color::BLACK;
use crate::effects::{for_each_cycle, FrameOutput, Properties};

/// Alternates the color with black, one on/off pair per cycle.
pub struct Flash {
    properties: Properties,
}

impl Flash {
    pub fn new(properties: Properties) -> Flash {
        Flash { properties }
    }

    pub fn compose(&self, out: &mut impl FrameOutput) {
        let Properties {
            delay,
            color,
            repeat,
        } = self.properties;

        for_each_cycle(repeat, || out.emit(color, delay) && out.emit(BLACK, delay));
    }
}
