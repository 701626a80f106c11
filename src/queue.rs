use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::color::BLACK;
use crate::effects::{generate_with_rng, EffectError, EffectKind, FrameSequence};
use crate::pacer::Pacer;
use crate::sink::write_frame;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Effect(#[from] EffectError),
    #[error("cannot write to light driver: {0}")]
    Sink(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Completed { frames: usize },
    Interrupted { frames: usize },
    /// An interrupt or shutdown came after the push was requested, so the
    /// effect never started.
    Skipped,
}

/// Marks when a push was requested. A push holding a ticket older than the
/// latest interrupt is skipped instead of played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Default)]
struct Control {
    active: Mutex<Option<CancelToken>>,
    epoch: AtomicU64,
    closed: AtomicBool,
}

impl Control {
    fn ticket(&self) -> Ticket {
        Ticket(self.epoch.load(Ordering::SeqCst))
    }

    fn is_stale(&self, ticket: Ticket) -> bool {
        self.closed.load(Ordering::SeqCst) || self.ticket() != ticket
    }

    /// Bumps the epoch before touching the active slot, so a push that
    /// registers its token afterwards still sees the new epoch.
    fn interrupt(&self) -> (Ticket, bool) {
        let ticket = Ticket(self.epoch.fetch_add(1, Ordering::SeqCst) + 1);
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match active.as_ref() {
            Some(cancel) => {
                cancel.cancel();
                (ticket, true)
            }
            None => (ticket, false),
        }
    }
}

/// Stops whatever effect the queue is draining right now, without having to
/// wait for the queue itself.
#[derive(Clone)]
pub struct Interrupter {
    control: Arc<Control>,
}

impl Interrupter {
    /// Returns whether an effect was running. Pushes requested before this
    /// call with an older ticket are skipped as well.
    pub fn interrupt(&self) -> bool {
        self.control.interrupt().1
    }

    /// Interrupts everything requested so far and returns the ticket for the
    /// effect that replaces it.
    pub fn preempt(&self) -> Ticket {
        let (ticket, was_running) = self.control.interrupt();
        if was_running {
            log::info!("Interrupted running effect");
        }
        ticket
    }

    pub fn ticket(&self) -> Ticket {
        self.control.ticket()
    }

    /// Stops the running effect for good. Every later push is skipped, only
    /// `EffectQueue::turn_off` still reaches the driver.
    pub fn close(&self) {
        self.control.closed.store(true, Ordering::SeqCst);
        self.control.interrupt();
    }
}

/// Owns the light driver and plays one effect at a time on it.
pub struct EffectQueue<W: Write> {
    sink: W,
    rng: StdRng,
    control: Arc<Control>,
    pacer: Pacer,
}

impl<W: Write> EffectQueue<W> {
    pub fn new(sink: W) -> EffectQueue<W> {
        EffectQueue::with_rng(sink, StdRng::from_entropy())
    }

    pub fn with_rng(sink: W, rng: StdRng) -> EffectQueue<W> {
        EffectQueue {
            sink,
            rng,
            control: Arc::new(Control::default()),
            pacer: Pacer::new(),
        }
    }

    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            control: Arc::clone(&self.control),
        }
    }

    /// Plays `effect` to the end, or until interrupted. Blocks meanwhile.
    pub fn push(&mut self, effect: &EffectKind) -> Result<PushOutcome, QueueError> {
        let ticket = self.control.ticket();
        self.push_with(ticket, effect)
    }

    /// Like `push`, for a request that got `ticket` before waiting for the
    /// queue. Skips the effect if an interrupt came in since.
    pub fn push_with(
        &mut self,
        ticket: Ticket,
        effect: &EffectKind,
    ) -> Result<PushOutcome, QueueError> {
        if self.control.is_stale(ticket) {
            log::debug!("{} skipped, superseded while waiting", effect.name());
            return Ok(PushOutcome::Skipped);
        }

        let rng = StdRng::seed_from_u64(self.rng.gen());
        let mut sequence = generate_with_rng(effect, rng)?;
        let cancel = sequence.cancel_token();

        self.set_active(Some(cancel.clone()));
        if self.control.is_stale(ticket) {
            cancel.cancel();
        }
        let result = self.drain(&mut sequence, &cancel);
        self.set_active(None);

        match &result {
            Ok(outcome) => log::debug!("{} finished: {:?}", effect.name(), outcome),
            Err(err) => log::error!("{} aborted: {}", effect.name(), err),
        }
        result
    }

    /// Writes black straight to the driver, even after `Interrupter::close`.
    pub fn turn_off(&mut self) -> Result<(), QueueError> {
        write_frame(&mut self.sink, BLACK)?;
        Ok(())
    }

    fn drain(
        &mut self,
        sequence: &mut FrameSequence,
        cancel: &CancelToken,
    ) -> Result<PushOutcome, QueueError> {
        let mut frames = 0;

        for frame in sequence {
            write_frame(&mut self.sink, frame.color)?;
            let written_at = Instant::now();
            frames += 1;

            if !self.pacer.hold(written_at, frame.delay, cancel) {
                break;
            }
        }

        if cancel.is_cancelled() {
            Ok(PushOutcome::Interrupted { frames })
        } else {
            Ok(PushOutcome::Completed { frames })
        }
    }

    fn set_active(&self, cancel: Option<CancelToken>) {
        let mut active = self.control.active.lock().unwrap_or_else(PoisonError::into_inner);
        *active = cancel;
    }
}
