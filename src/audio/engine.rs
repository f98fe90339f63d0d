use std::sync::Arc;

use crate::audio_api::AudioCommand;

use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;
use super::voice::Voice;

const MAX_VOICES: usize = 32; // hard cap so we don't malloc in the audio callback
const MAX_PENDING: usize = 256;

struct PendingStart {
    buffer: Arc<SampleBuffer>,
    at_frame: u64,
    gain: f32,
}

// Mixes scheduled sample starts into the output. Lives inside the output
// callback, so it only ever hears about the outside world through commands.
pub struct Engine {
    voices: Vec<Option<Voice>>, // fixed pool of voices
    pending: Vec<PendingStart>,
    clock: u64, // frames rendered so far
}

impl Engine {
    pub fn new() -> Self {
        Self {
            voices: (0..MAX_VOICES).map(|_| None).collect(),
            pending: Vec::with_capacity(MAX_PENDING),
            clock: 0,
        }
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Start {
                buffer,
                at_frame,
                gain,
            } => {
                if self.pending.len() < MAX_PENDING {
                    self.pending.push(PendingStart {
                        buffer,
                        at_frame,
                        gain,
                    });
                }
            }
            AudioCommand::Silence => {
                self.pending.clear();
                self.voices.iter_mut().for_each(|v| *v = None);
            }
        }
    }

    // Fill `out` (zeroing it first) and advance the clock by its length.
    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        out.iter_mut().for_each(|f| *f = StereoFrame::zero());

        let block_start = self.clock;
        let block_end = block_start + out.len() as u64;

        for voice in self.voices.iter_mut() {
            let finished = match voice {
                Some(v) => !v.render_into(out),
                None => false,
            };
            if finished {
                *voice = None;
            }
        }

        // start whatever falls inside this block at its exact frame
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].at_frame >= block_end {
                i += 1;
                continue;
            }
            let start = self.pending.swap_remove(i);
            let offset = start.at_frame.saturating_sub(block_start) as usize;
            let mut voice = Voice::new(start.buffer, start.gain, block_start + offset as u64);
            if voice.render_into(&mut out[offset..]) {
                let slot = self.free_slot();
                self.voices[slot] = Some(voice);
            }
        }

        self.clock = block_end;
    }

    // first free slot, or steal the oldest voice
    fn free_slot(&self) -> usize {
        if let Some(i) = self.voices.iter().position(|v| v.is_none()) {
            return i;
        }
        self.voices
            .iter()
            .enumerate()
            .min_by_key(|(_, v)| v.as_ref().map(|v| v.started_at).unwrap_or(0))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::Engine;
    use crate::audio::frame::StereoFrame;
    use crate::audio::sample_buffer::SampleBuffer;
    use crate::audio_api::AudioCommand;

    fn click(len: usize) -> Arc<SampleBuffer> {
        Arc::new(SampleBuffer {
            data: vec![StereoFrame::mono(1.0); len],
        })
    }

    #[test]
    fn starts_at_exact_frame() {
        let mut engine = Engine::new();
        engine.handle_cmd(AudioCommand::Start {
            buffer: click(2),
            at_frame: 5,
            gain: 1.0,
        });
        let mut out = [StereoFrame::mono(9.0); 4];
        engine.render_block(&mut out);
        assert!(out.iter().all(|f| *f == StereoFrame::zero()));
        assert_eq!(engine.clock(), 4);

        let mut out = [StereoFrame::zero(); 4];
        engine.render_block(&mut out);
        assert_eq!(
            out,
            [
                StereoFrame::zero(),
                StereoFrame::mono(1.0),
                StereoFrame::mono(1.0),
                StereoFrame::zero()
            ]
        );
    }

    #[test]
    fn voice_continues_into_next_block() {
        let mut engine = Engine::new();
        engine.handle_cmd(AudioCommand::Start {
            buffer: click(6),
            at_frame: 2,
            gain: 0.5,
        });
        let mut out = [StereoFrame::zero(); 4];
        engine.render_block(&mut out);
        assert_eq!(out[1], StereoFrame::zero());
        assert_eq!(out[2], StereoFrame::mono(0.5));

        let mut out = [StereoFrame::zero(); 4];
        engine.render_block(&mut out);
        assert!(out.iter().all(|f| *f == StereoFrame::mono(0.5)));

        let mut out = [StereoFrame::zero(); 4];
        engine.render_block(&mut out);
        assert!(out.iter().all(|f| *f == StereoFrame::zero()));
    }

    #[test]
    fn late_start_plays_immediately() {
        let mut engine = Engine::new();
        let mut out = [StereoFrame::zero(); 8];
        engine.render_block(&mut out);
        engine.handle_cmd(AudioCommand::Start {
            buffer: click(1),
            at_frame: 3,
            gain: 1.0,
        });
        engine.render_block(&mut out);
        assert_eq!(out[0], StereoFrame::mono(1.0));
        assert_eq!(out[1], StereoFrame::zero());
    }

    #[test]
    fn silence_drops_everything() {
        let mut engine = Engine::new();
        engine.handle_cmd(AudioCommand::Start {
            buffer: click(100),
            at_frame: 0,
            gain: 1.0,
        });
        let mut out = [StereoFrame::zero(); 4];
        engine.render_block(&mut out);
        engine.handle_cmd(AudioCommand::Silence);
        engine.render_block(&mut out);
        assert!(out.iter().all(|f| *f == StereoFrame::zero()));
    }
}
