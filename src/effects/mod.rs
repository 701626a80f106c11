pub(crate) mod blend;
pub(crate) mod fade;
pub(crate) mod fire;
pub(crate) mod flash;
pub(crate) mod staticcolor;

use std::io;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::color::Color;

use blend::Blend;
use fade::Fade;
use fire::Fire;
use flash::Flash;
use staticcolor::StaticColor;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Properties {
    /// Pause after each frame.
    pub delay: Duration,
    pub color: Color,
    /// Negative loops until cancelled, zero produces nothing.
    pub repeat: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EffectKind {
    Solid(Color),
    Fade(Properties),
    Flash(Properties),
    Blend {
        start: Color,
        end: Color,
        duration: Duration,
    },
    Fire(Properties),
}

impl EffectKind {
    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::Solid(_) => "color",
            EffectKind::Fade(_) => "fade",
            EffectKind::Flash(_) => "flash",
            EffectKind::Blend { .. } => "blend",
            EffectKind::Fire(_) => "fire",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub color: Color,
    /// How long the color stays on before the next frame.
    pub delay: Duration,
}

#[derive(Debug, Error)]
pub enum EffectError {
    #[error("cannot start effect producer: {0}")]
    Spawn(#[from] io::Error),
}

/// Where an effect algorithm puts its frames. `emit` returns `false` once
/// nobody wants further frames, and the algorithm stops right there.
pub trait FrameOutput {
    fn emit(&mut self, color: Color, delay: Duration) -> bool;
}

#[cfg(test)]
impl FrameOutput for Vec<Frame> {
    fn emit(&mut self, color: Color, delay: Duration) -> bool {
        self.push(Frame { color, delay });
        true
    }
}

/// Producer half of a `FrameSequence`.
pub struct FrameEmitter {
    frames: Sender<Frame>,
    cancel: CancelToken,
}

impl FrameOutput for FrameEmitter {
    fn emit(&mut self, color: Color, delay: Duration) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        // Blocks while the previous frame is still waiting in the slot.
        self.frames.send(Frame { color, delay }).is_ok()
    }
}

/// Frames of one effect run, produced lazily by a background thread and
/// handed over through a single-slot channel.
pub struct FrameSequence {
    frames: Receiver<Frame>,
    cancel: CancelToken,
}

impl FrameSequence {
    fn channel() -> (FrameEmitter, FrameSequence) {
        let (tx, rx) = bounded(1);
        let cancel = CancelToken::new();
        let emitter = FrameEmitter {
            frames: tx,
            cancel: cancel.clone(),
        };
        (emitter, FrameSequence { frames: rx, cancel })
    }

    fn spawn<F>(name: &str, compose: F) -> Result<FrameSequence, EffectError>
    where
        F: FnOnce(&mut FrameEmitter) + Send + 'static,
    {
        let (mut emitter, sequence) = FrameSequence::channel();
        let thread_name = format!("effect-{name}");

        thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                compose(&mut emitter);
                log::trace!("{} producer done", thread_name);
            })?;

        Ok(sequence)
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

impl Iterator for FrameSequence {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.frames.recv().ok()
    }
}

impl Drop for FrameSequence {
    fn drop(&mut self) {
        // Lets a producer stuck in an endless loop notice nobody is listening.
        self.cancel.cancel();
    }
}

/// Runs `cycle` the number of times `repeat` asks for, forever if negative.
/// Stops early as soon as `cycle` returns `false`.
pub(crate) fn for_each_cycle(repeat: i32, mut cycle: impl FnMut() -> bool) {
    let mut remaining = repeat;
    while remaining != 0 {
        if !cycle() {
            return;
        }
        if remaining > 0 {
            remaining -= 1;
        }
    }
}

pub fn generate(effect: &EffectKind) -> Result<FrameSequence, EffectError> {
    generate_with_rng(effect, StdRng::from_entropy())
}

/// Starts producing the frames of `effect`. Only fire consumes `rng`.
pub fn generate_with_rng(effect: &EffectKind, rng: StdRng) -> Result<FrameSequence, EffectError> {
    match *effect {
        EffectKind::Solid(color) => {
            // One frame fits in the slot, no producer thread needed.
            let (mut emitter, sequence) = FrameSequence::channel();
            StaticColor::new(color).compose(&mut emitter);
            Ok(sequence)
        }
        EffectKind::Fade(properties) => {
            FrameSequence::spawn(effect.name(), move |out| Fade::new(properties).compose(out))
        }
        EffectKind::Flash(properties) => {
            FrameSequence::spawn(effect.name(), move |out| Flash::new(properties).compose(out))
        }
        EffectKind::Blend {
            start,
            end,
            duration,
        } => FrameSequence::spawn(effect.name(), move |out| {
            Blend::new(start, end, duration).compose(out)
        }),
        EffectKind::Fire(properties) => FrameSequence::spawn(effect.name(), move |out| {
            Fire::new(properties, rng).compose(out)
        }),
    }
}
