use std::sync::Arc;

pub use crate::audio::SampleBuffer;

// Messages to the mixing engine inside the output callback.
#[derive(Clone, Debug)]
pub enum AudioCommand {
    // Start `buffer` when the output clock reaches `at_frame`. Starts in the
    // past begin at the next rendered frame.
    Start {
        buffer: Arc<SampleBuffer>,
        at_frame: u64,
        gain: f32,
    },
    // Cut every voice and drop pending starts (used when closing).
    Silence,
}

// An opened audio output. All times are seconds on the output clock, which
// only advances while the output is running.
pub trait OutputContext {
    fn current_time(&self) -> f64;

    // How long after being rendered a frame is actually heard.
    fn base_latency(&self) -> f64;

    fn sample_rate(&self) -> u32;

    fn resume(&mut self) -> anyhow::Result<()>;

    fn suspend(&mut self);

    fn close(&mut self);

    fn start_at(&mut self, buffer: &Arc<SampleBuffer>, when: f64);
}

// Something that can open an output. Opening may fail (no device, or the
// platform refuses), and that failure is reported to whoever asked to play.
pub trait OutputHost: Send {
    fn open(&self) -> anyhow::Result<Box<dyn OutputContext>>;
}
