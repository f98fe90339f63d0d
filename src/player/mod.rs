//! The playback scheduler.
//!
//! A [`Player`] owns one scheduler thread. That thread owns the audio output,
//! the decoded samples and every timer (the next step plus any pending tick
//! announcements), and runs them one at a time, so no two steps ever overlap.
//! The handle only sends it commands; a new score or tempo is always a whole
//! value, so a step sees either the old one or the new one.
//!
//! Transport: `Idle -> Initializing -> Playing <-> Paused`, and `Disposed` from
//! anywhere. Initializing opens (or resumes) the output and waits for the
//! sample fetch that started when the player was created.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Context;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};

mod error;
pub mod scheduler;

pub use error::PlayerError;
pub use scheduler::DEFAULT_LOOK_AHEAD;

use crate::audio_api::{OutputContext, OutputHost, SampleBuffer};
use crate::loader::sample_loader::{SampleFetch, SampleSource};
use crate::pipeline::score::{Score, TimeSlice};
use crate::shared::Instrument;
use scheduler::Scheduler;

/// Called with the index and contents of each tick, roughly when it is heard.
pub type TimeCallback = Box<dyn FnMut(usize, Option<&TimeSlice>) + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Initializing,
    Playing,
    Paused,
    Disposed,
}

enum Command {
    SetScore(Arc<Score>),
    SetTickDuration(f64),
    SetTimeCallback(Option<TimeCallback>),
    Play(Sender<Result<(), PlayerError>>),
    Pause(Sender<()>),
    Dispose,
}

pub struct Player {
    tx: Sender<Command>,
    state: Arc<RwLock<TransportState>>,
    thread: Option<JoinHandle<()>>,
}

impl Player {
    /// Starts fetching samples for `instruments` right away; nothing is
    /// opened on the output until the first [`play`](Self::play).
    pub fn new<S, H>(
        look_ahead: f64,
        instruments: Vec<Instrument>,
        source: S,
        host: H,
    ) -> anyhow::Result<Self>
    where
        S: SampleSource,
        H: OutputHost + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded::<Command>();
        let state = Arc::new(RwLock::new(TransportState::Idle));
        let fetch = SampleFetch::spawn(source, instruments);

        // The output is opened on the player thread and never leaves it.
        let driver_state = state.clone();
        let thread = thread::Builder::new()
            .name("player".into())
            .spawn(move || {
                let driver = Driver {
                    host: Box::new(host),
                    fetch: Some(fetch),
                    output: None,
                    scheduler: Scheduler::new(look_ahead),
                    callback: None,
                    state: driver_state,
                    next_step: None,
                    announcements: VecDeque::new(),
                };
                driver.run(rx)
            })
            .context("failed to start player thread")?;

        Ok(Self {
            tx,
            state,
            thread: Some(thread),
        })
    }

    pub fn state(&self) -> TransportState {
        self.state
            .read()
            .map(|s| *s)
            .unwrap_or(TransportState::Disposed)
    }

    pub fn is_playing(&self) -> bool {
        self.state() == TransportState::Playing
    }

    /// Takes effect on the next step. The cursor wraps if the new score is
    /// shorter than where playback was.
    pub fn set_score(&self, score: Arc<Score>) {
        let _ = self.tx.send(Command::SetScore(score));
    }

    /// Seconds per tick. Only ticks that haven't been queued yet move.
    pub fn set_tick_duration(&self, seconds: f64) {
        let _ = self.tx.send(Command::SetTickDuration(seconds));
    }

    pub fn set_time_callback(&self, callback: Option<TimeCallback>) {
        let _ = self.tx.send(Command::SetTimeCallback(callback));
    }

    /// Blocks until playback is running, or until opening the output failed.
    /// Call it from a user action: some platforms refuse audio otherwise.
    pub fn play(&self) -> Result<(), PlayerError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.tx
            .send(Command::Play(reply_tx))
            .map_err(|_| PlayerError::Disposed)?;
        reply_rx.recv().unwrap_or(Err(PlayerError::Disposed))
    }

    /// Idempotent. Announcements for ticks already queued may still arrive.
    pub fn pause(&self) {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if self.tx.send(Command::Pause(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Idempotent and final: releases the audio output.
    pub fn dispose(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.tx.send(Command::Dispose);
            if thread.join().is_err() {
                warn!("player thread panicked");
            }
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.dispose();
    }
}

// A tick announcement waiting for its moment.
struct Announcement {
    due: Instant,
    index: usize,
    slice: Option<TimeSlice>,
}

// Everything that lives on the scheduler thread.
struct Driver {
    host: Box<dyn OutputHost>,
    fetch: Option<SampleFetch>, // taken once the samples are decoded
    output: Option<Box<dyn OutputContext>>,
    scheduler: Scheduler,
    callback: Option<TimeCallback>,
    state: Arc<RwLock<TransportState>>,
    next_step: Option<Instant>,
    announcements: VecDeque<Announcement>, // in step order, due never decreasing
}

impl Driver {
    fn run(mut self, rx: Receiver<Command>) {
        loop {
            let received = match self.next_deadline() {
                Some(deadline) => rx.recv_deadline(deadline),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(Command::Dispose) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(cmd) => self.handle(cmd),
                Err(RecvTimeoutError::Timeout) => {}
            }
            self.fire_due();
        }
        self.dispose();
    }

    fn state(&self) -> TransportState {
        self.state
            .read()
            .map(|s| *s)
            .unwrap_or(TransportState::Disposed)
    }

    fn set_state(&self, state: TransportState) {
        match self.state.write() {
            Ok(mut s) => *s = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        let announcement = self.announcements.front().map(|a| a.due);
        match (self.next_step, announcement) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::SetScore(score) => self.scheduler.set_score(score),
            Command::SetTickDuration(seconds) => self.scheduler.set_tick_duration(seconds),
            Command::SetTimeCallback(callback) => self.callback = callback,
            Command::Play(reply) => {
                let _ = reply.send(self.play());
            }
            Command::Pause(ack) => {
                self.pause();
                let _ = ack.send(());
            }
            Command::Dispose => {}
        }
    }

    fn fire_due(&mut self) {
        let now = Instant::now();
        while self.announcements.front().is_some_and(|a| a.due <= now) {
            if let Some(a) = self.announcements.pop_front() {
                if let Some(callback) = self.callback.as_mut() {
                    callback(a.index, a.slice.as_ref());
                }
            }
        }
        if self.next_step.is_some_and(|due| due <= now) {
            self.next_step = None;
            self.step();
        }
    }

    fn play(&mut self) -> Result<(), PlayerError> {
        let previous = self.state();
        match previous {
            TransportState::Playing | TransportState::Initializing => return Ok(()),
            TransportState::Disposed => return Err(PlayerError::Disposed),
            TransportState::Idle | TransportState::Paused => {}
        }

        self.set_state(TransportState::Initializing);
        let now = match self.init() {
            Ok(now) => now,
            Err(e) => {
                warn!("could not start playback: {e}");
                self.set_state(previous);
                return Err(e);
            }
        };
        self.scheduler.start(now);
        self.set_state(TransportState::Playing);
        info!(
            "playing from tick {}, {:.3}s per tick",
            self.scheduler.cursor(),
            self.scheduler.tick_duration()
        );
        self.step();
        Ok(())
    }

    // Open or resume the output and decode samples on first use. Returns the
    // output clock's current time.
    fn init(&mut self) -> Result<f64, PlayerError> {
        let output = match self.output.take() {
            Some(mut output) => {
                output
                    .resume()
                    .map_err(|e| PlayerError::OutputUnavailable(format!("{e:#}")))?;
                output
            }
            None => {
                debug!("opening audio output");
                self.host
                    .open()
                    .map_err(|e| PlayerError::OutputUnavailable(format!("{e:#}")))?
            }
        };

        if let Some(fetch) = self.fetch.take() {
            self.decode_samples(fetch, output.sample_rate());
        }
        let now = output.current_time();
        self.output = Some(output);
        Ok(now)
    }

    fn decode_samples(&mut self, fetch: SampleFetch, sample_rate: u32) {
        for (instrument, fetched) in fetch.wait() {
            let decoded = fetched.and_then(|bytes| SampleBuffer::decode_wav(&bytes, sample_rate));
            match decoded {
                Ok(buffer) => {
                    debug!("{} loaded, {} frames", instrument.name(), buffer.len());
                    self.scheduler.set_buffer(instrument, Arc::new(buffer));
                }
                Err(e) => warn!("{} will be silent: {e:#}", instrument.name()),
            }
        }
    }

    fn step(&mut self) {
        if self.state() != TransportState::Playing {
            return;
        }
        let Some(output) = self.output.as_mut() else {
            return;
        };
        let step = self.scheduler.step(output.as_mut());
        let now = Instant::now();

        if self.callback.is_some() {
            // Latency and the output clock wobble between steps; never let a
            // tick be announced before the one queued ahead of it.
            let mut due = now + Duration::from_secs_f64(step.notify_delay);
            if let Some(last) = self.announcements.back() {
                due = due.max(last.due);
            }
            self.announcements.push_back(Announcement {
                due,
                index: step.index,
                slice: step.slice,
            });
        }
        self.next_step = Some(now + Duration::from_secs_f64(step.next_delay));
    }

    fn pause(&mut self) {
        if self.state() != TransportState::Playing {
            return;
        }
        if let Some(output) = self.output.as_mut() {
            output.suspend();
        }
        self.next_step = None;
        self.set_state(TransportState::Paused);
        info!("paused at tick {}", self.scheduler.cursor());
    }

    fn dispose(&mut self) {
        if self.state() == TransportState::Disposed {
            return;
        }
        self.pause();
        if let Some(mut output) = self.output.take() {
            output.close();
        }
        self.announcements.clear();
        self.set_state(TransportState::Disposed);
        info!("player disposed");
    }
}
