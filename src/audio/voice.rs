use std::sync::Arc;

use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;

// One sample being played back from the start, at unity pitch.
#[derive(Clone, Debug)]
pub struct Voice {
    buffer: Arc<SampleBuffer>,
    pos: usize,
    gain: f32,
    pub started_at: u64, // output frame the voice began on, used for stealing
}

impl Voice {
    pub fn new(buffer: Arc<SampleBuffer>, gain: f32, started_at: u64) -> Self {
        Self {
            buffer,
            pos: 0,
            gain,
            started_at,
        }
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.buffer.data.len()
    }

    // Mix as much of the sample as fits into `out`, returns false once finished
    pub fn render_into(&mut self, out: &mut [StereoFrame]) -> bool {
        let remaining = &self.buffer.data[self.pos.min(self.buffer.data.len())..];
        let n = remaining.len().min(out.len());
        for (frame, sample) in out[..n].iter_mut().zip(remaining) {
            frame.add_scaled(*sample, self.gain);
        }
        self.pos += n;
        !self.is_done()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::Voice;
    use crate::audio::frame::StereoFrame;
    use crate::audio::sample_buffer::SampleBuffer;

    #[test]
    fn renders_across_blocks_then_finishes() {
        let buffer = Arc::new(SampleBuffer {
            data: vec![StereoFrame::mono(1.0); 5],
        });
        let mut voice = Voice::new(buffer, 0.5, 0);
        let mut out = [StereoFrame::zero(); 3];
        assert!(voice.render_into(&mut out));
        assert_eq!(out, [StereoFrame::mono(0.5); 3]);

        let mut out = [StereoFrame::zero(); 3];
        assert!(!voice.render_into(&mut out));
        assert_eq!(out[1], StereoFrame::mono(0.5));
        assert_eq!(out[2], StereoFrame::zero());
        assert!(voice.is_done());
    }
}
