use std::time::Duration;

use crate::color::Color;
use crate::effects::FrameOutput;

const SAMPLES_PER_SECOND: f64 = 20.0;

/// Linear transition from `start` to `end`. Channel values accumulate a fixed
/// step per frame, so truncation drift carries over between frames.
pub struct Blend {
    start: Color,
    end: Color,
    duration: Duration,
}

impl Blend {
    pub fn new(start: Color, end: Color, duration: Duration) -> Blend {
        Blend {
            start,
            end,
            duration,
        }
    }

    pub fn sample_count(&self) -> u32 {
        let samples = (SAMPLES_PER_SECOND * self.duration.as_secs_f64()).round();
        samples.clamp(1.0, f64::from(u32::MAX)) as u32
    }

    pub fn compose(&self, out: &mut impl FrameOutput) {
        let samples = self.sample_count();
        let delay = self.duration / samples;

        let channels = |color: Color| {
            let (r, g, b) = color.into_components();
            [f64::from(r), f64::from(g), f64::from(b)]
        };
        let start = channels(self.start);
        let end = channels(self.end);

        let mut step = [0.0; 3];
        for i in 0..3 {
            step[i] = (end[i] - start[i]) / f64::from(samples);
        }

        let mut current = start;
        for _ in 0..samples {
            for i in 0..3 {
                current[i] += step[i];
            }

            let [r, g, b] = current.map(|value| value.clamp(0.0, 255.0) as u8);
            if !out.emit(Color::new(r, g, b), delay) {
                return;
            }
        }
    }
}
