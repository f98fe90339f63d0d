//! One scheduling step of the look-ahead loop, free of threads and timers so
//! it can be driven by hand.
//!
//! Each step queues the sounds of one tick at a precomputed output-clock time,
//! then tells the caller how long to wait before announcing the tick and
//! before running the next step. Both delays are derived from the live output
//! clock on every step, so timer imprecision never accumulates.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::trace;

use crate::audio_api::{OutputContext, SampleBuffer};
use crate::pipeline::score::{Score, TimeSlice};
use crate::shared::Instrument;

/// Seconds between the output clock's "now" and the first tick after a start.
pub const DEFAULT_LOOK_AHEAD: f64 = 0.2;

/// Tempo used until someone sets one (400 ticks per minute).
pub const DEFAULT_TICK_DURATION: f64 = 60.0 / 400.0;

/// The outcome of one step.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    /// Score index that was played.
    pub index: usize,
    /// The slice found there, if any.
    pub slice: Option<TimeSlice>,
    /// Output-clock time the tick's sounds were queued for.
    pub tick_time: f64,
    /// Sounds actually queued (instruments without a buffer are skipped).
    pub emitted: usize,
    /// Wait before announcing this tick, so the announcement lines up with
    /// what is heard.
    pub notify_delay: f64,
    /// Wait before the next step.
    pub next_delay: f64,
}

pub struct Scheduler {
    score: Arc<Score>,
    tick_duration: f64,
    look_ahead: f64,
    cursor: usize,
    next_tick_time: f64,
    buffers: BTreeMap<Instrument, Arc<SampleBuffer>>,
}

impl Scheduler {
    pub fn new(look_ahead: f64) -> Self {
        Self {
            score: Arc::new(Score::default()),
            tick_duration: DEFAULT_TICK_DURATION,
            look_ahead,
            cursor: 0,
            next_tick_time: 0.0,
            buffers: BTreeMap::new(),
        }
    }

    pub fn set_score(&mut self, score: Arc<Score>) {
        self.score = score;
    }

    pub fn set_tick_duration(&mut self, seconds: f64) {
        if seconds.is_finite() && seconds > 0.0 {
            self.tick_duration = seconds;
        } else {
            log::warn!("ignoring invalid tick duration {seconds}");
        }
    }

    pub fn tick_duration(&self) -> f64 {
        self.tick_duration
    }

    pub fn set_buffer(&mut self, instrument: Instrument, buffer: Arc<SampleBuffer>) {
        self.buffers.insert(instrument, buffer);
    }

    /// Index the next step will read (before wrapping to the score length).
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// (Re)anchor the tick clock: the next step plays one look-ahead margin
    /// after `now`. The cursor is kept, so a resumed loop carries on from
    /// where it stopped.
    pub fn start(&mut self, now: f64) {
        self.next_tick_time = now + self.look_ahead;
    }

    pub fn step(&mut self, output: &mut dyn OutputContext) -> Step {
        let now = output.current_time();
        let len = self.score.len();
        let index = if self.score.is_empty() { 0 } else { self.cursor % len };

        // The time for this tick was fixed by the previous step, together with
        // the timer that woke us, so a tempo change only moves the ticks after
        // it. If we are already too late for it (the loop stalled), play as
        // soon as possible instead of bursting through every missed tick.
        let tick_time = self.next_tick_time.max(now);

        let slice = self.score.get(index).cloned();
        let mut emitted = 0;
        for instrument in slice.iter().flat_map(|s| s.instruments()) {
            match self.buffers.get(&instrument) {
                Some(buffer) => {
                    output.start_at(buffer, tick_time);
                    emitted += 1;
                }
                None => trace!("no sample for {}, skipping", instrument.code()),
            }
        }

        self.cursor = if self.score.is_empty() { 0 } else { (index + 1) % len };

        let next_tick_time = tick_time + self.tick_duration;
        self.next_tick_time = next_tick_time;
        let step = Step {
            index,
            slice,
            tick_time,
            emitted,
            notify_delay: (output.base_latency() + tick_time - now).max(0.0),
            next_delay: (next_tick_time - now - self.look_ahead).max(0.0),
        };
        trace!(
            "tick {} at {:.4}s (now {:.4}s), {} sound(s)",
            step.index, step.tick_time, now, step.emitted
        );
        step
    }
}
