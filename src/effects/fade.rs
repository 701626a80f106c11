use crate::color::{peak, Color};
use crate::effects::{for_each_cycle, FrameOutput, Properties};

/// Frame count per ramp used for a black target, which has no peak to scale by.
const BLACK_RAMP_STEPS: u32 = 255;

/// Triangular brightness envelope in the hue of the target color. Each cycle
/// ramps up to the target and back down to black, `2 * peak` frames in total.
pub struct Fade {
    properties: Properties,
}

impl Fade {
    pub fn new(properties: Properties) -> Fade {
        Fade { properties }
    }

    /// Channel shares in percent of the peak channel.
    fn percentages(color: Color) -> [u32; 3] {
        let peak = u32::from(peak(color));
        if peak == 0 {
            return [0; 3];
        }

        let (r, g, b) = color.into_components();
        [r, g, b].map(|channel| u32::from(channel) * 100 / peak)
    }

    fn scaled(step: u32, percentages: [u32; 3]) -> Color {
        let [r, g, b] = percentages.map(|percent| (step * percent / 100).min(255) as u8);
        Color::new(r, g, b)
    }

    pub fn compose(&self, out: &mut impl FrameOutput) {
        let Properties {
            delay,
            color,
            repeat,
        } = self.properties;

        let percentages = Fade::percentages(color);
        let steps = match u32::from(peak(color)) {
            0 => BLACK_RAMP_STEPS,
            peak => peak,
        };

        for_each_cycle(repeat, || {
            let up = 1..=steps;
            let down = (0..steps).rev();
            up.chain(down)
                .all(|step| out.emit(Fade::scaled(step, percentages), delay))
        });
    }
}
