use rand::Rng;

use crate::color::Color;
use crate::effects::{FrameOutput, Properties};

/// Curvature of the brightness parabola. Equals 255 / 512², so a run of 1024
/// frames starts and ends at darkness.
const FALLOFF: f64 = -255.0 / 262144.0;

/// Per channel: jitter bound and how much of the envelope makes it through.
const CHANNELS: [(i32, f64); 3] = [(50, 1.00), (70, 0.10), (80, 0.01)];

/// Red dominated flicker under a parabolic envelope peaking mid-run. Runs
/// `repeat` frames; the run length is also the width of the envelope.
pub struct Fire<R> {
    properties: Properties,
    rng: R,
}

impl<R: Rng> Fire<R> {
    pub fn new(properties: Properties, rng: R) -> Fire<R> {
        Fire { properties, rng }
    }

    fn sample(&mut self, t: i32, length: i32) -> Color {
        let offset = f64::from(t - length / 2);
        let envelope = FALLOFF * offset * offset + 255.0;

        let [r, g, b] = CHANNELS.map(|(jitter, factor)| {
            let jitter = self.rng.gen_range(-jitter..jitter);
            let value = factor * (envelope + f64::from(jitter));
            value.clamp(0.0, 255.0) as u8
        });
        Color::new(r, g, b)
    }

    pub fn compose(&mut self, out: &mut impl FrameOutput) {
        let length = self.properties.repeat.max(0);
        let delay = self.properties.delay;

        for t in 0..length {
            let color = self.sample(t, length);
            if !out.emit(color, delay) {
                return;
            }
        }
    }
}
