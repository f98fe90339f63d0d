use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};

use crate::audio_api::{AudioCommand, OutputContext, OutputHost};

mod engine;
mod frame;
pub(crate) mod sample_buffer;
mod voice;

pub use frame::StereoFrame;
pub use sample_buffer::SampleBuffer;

use engine::Engine;

// Used until the device reports real callback/playback timestamps.
const DEFAULT_BASE_LATENCY: f64 = 0.02;

// Shared between the output callback (writer) and the scheduler (reader).
#[derive(Default)]
struct OutputClock {
    frames: AtomicU64,
    latency_nanos: AtomicU64,
}

// Opens the default cpal output device on demand.
pub struct CpalHost {
    pub gain: f32,
    pub base_latency: Option<f64>, // overrides the measured latency
}

impl OutputHost for CpalHost {
    fn open(&self) -> anyhow::Result<Box<dyn OutputContext>> {
        let output = CpalOutput::start(self.gain, self.base_latency)?;
        Ok(Box::new(output))
    }
}

pub struct CpalOutput {
    tx: Sender<AudioCommand>,
    clock: Arc<OutputClock>,
    sample_rate: u32,
    gain: f32,
    latency_override: Option<f64>,
    stream: Option<cpal::Stream>, // None once closed
}

impl CpalOutput {
    pub fn start(gain: f32, latency_override: Option<f64>) -> anyhow::Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(1024);

        let host = cpal::default_host();
        let device = host.default_output_device().context("no default output device")?;
        let config = device.default_output_config().context("no default output config")?;

        let sample_rate = config.sample_rate();
        let channels = config.channels() as usize;
        let clock = Arc::new(OutputClock::default());

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                build_output_stream_f32(&device, &config.into(), rx, clock.clone(), channels)?
            }
            other => anyhow::bail!("unsupported sample format {other:?} (only f32 supported for now)"),
        };
        stream.play().context("failed to play output stream")?;
        info!("audio output running at {sample_rate} Hz, {channels} channel(s)");

        Ok(Self {
            tx,
            clock,
            sample_rate,
            gain,
            latency_override,
            stream: Some(stream),
        })
    }
}

impl OutputContext for CpalOutput {
    fn current_time(&self) -> f64 {
        self.clock.frames.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    fn base_latency(&self) -> f64 {
        if let Some(latency) = self.latency_override {
            return latency;
        }
        match self.clock.latency_nanos.load(Ordering::Relaxed) {
            0 => DEFAULT_BASE_LATENCY,
            nanos => nanos as f64 / 1e9,
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn resume(&mut self) -> anyhow::Result<()> {
        let stream = self.stream.as_ref().context("audio output already closed")?;
        stream.play().context("failed to resume output stream")?;
        Ok(())
    }

    fn suspend(&mut self) {
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.pause() {
                warn!("could not suspend output stream: {e}");
            }
        }
    }

    fn close(&mut self) {
        let _ = self.tx.try_send(AudioCommand::Silence);
        if self.stream.take().is_some() {
            debug!("audio output closed");
        }
    }

    fn start_at(&mut self, buffer: &Arc<SampleBuffer>, when: f64) {
        let at_frame = (when.max(0.0) * self.sample_rate as f64).round() as u64;
        let cmd = AudioCommand::Start {
            buffer: buffer.clone(),
            at_frame,
            gain: self.gain,
        };
        if self.tx.try_send(cmd).is_err() {
            warn!("audio command queue full, dropping a note");
        }
    }
}

// ── Output stream ─────────────────────────────────────────────────

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    clock: Arc<OutputClock>,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let mut engine = Engine::new();
    let mut scratch: Vec<StereoFrame> = Vec::with_capacity(4096);

    let err_fn = |err| error!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], info: &cpal::OutputCallbackInfo| {
            while let Ok(cmd) = rx.try_recv() {
                engine.handle_cmd(cmd);
            }

            let ts = info.timestamp();
            if let Some(latency) = ts.playback.duration_since(&ts.callback) {
                clock
                    .latency_nanos
                    .store(latency.as_nanos() as u64, Ordering::Relaxed);
            }

            let n_frames = data.len() / channels;
            scratch.resize(n_frames, StereoFrame::zero()); // only grows if the block does
            engine.render_block(&mut scratch[..n_frames]);

            for (out, frame) in data.chunks_exact_mut(channels).zip(scratch.iter()) {
                match out {
                    [mono] => *mono = 0.5 * (frame.left + frame.right),
                    [left, right, rest @ ..] => {
                        *left = frame.left;
                        *right = frame.right;
                        rest.iter_mut().for_each(|s| *s = 0.0);
                    }
                    [] => {}
                }
            }

            clock.frames.store(engine.clock(), Ordering::Release);
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
