use tracing::warn;

use super::{AudioReader, Frame, FrameFlags, Resampler, Sample};

/// Serves frames of any size from a fixed-chunk resampler
///
/// Upstream is passed to every `read` so the caller keeps ownership of the
/// stages before the resampler. Buffers are sized once from the
/// resampler's bounds.
pub struct ResamplerReader {
    resampler: Box<dyn Resampler>,
    channels: usize,
    input: Vec<Sample>,
    output: Vec<Sample>,
    /// Interleaved samples of `output` already handed out
    out_pos: usize,
    chunk_flags: FrameFlags,
    scaling: f64,
}

impl ResamplerReader {
    pub fn new(resampler: Box<dyn Resampler>, channels: usize) -> Self {
        let channels = channels.max(1);
        let input = Vec::with_capacity(resampler.input_frames_max() * channels);
        let output = vec![0.0; resampler.output_frames() * channels];
        let out_pos = output.len();
        Self {
            resampler,
            channels,
            input,
            output,
            out_pos,
            chunk_flags: FrameFlags::empty(),
            scaling: 1.0,
        }
    }

    pub fn scaling(&self) -> f64 {
        self.scaling
    }

    pub fn set_scaling(&mut self, scaling: f64) -> bool {
        if !self.resampler.set_scaling(scaling) {
            warn!("resampler reader: scaling {:.6} rejected", scaling);
            return false;
        }
        self.scaling = scaling;
        true
    }

    pub fn read(&mut self, frame: &mut Frame<'_>, upstream: &mut dyn AudioReader) -> bool {
        let mut flags = FrameFlags::empty();
        let total = frame.len();
        let mut pos = 0;

        while pos < total {
            if self.out_pos >= self.output.len() && !self.refill(upstream) {
                return false;
            }
            flags.insert(self.chunk_flags);

            let n = (total - pos).min(self.output.len() - self.out_pos);
            frame.samples_mut()[pos..pos + n]
                .copy_from_slice(&self.output[self.out_pos..self.out_pos + n]);
            pos += n;
            self.out_pos += n;
        }

        frame.set_flags(flags);
        true
    }

    fn refill(&mut self, upstream: &mut dyn AudioReader) -> bool {
        let frames = self.resampler.input_frames_next();
        self.input.resize(frames * self.channels, 0.0);

        let mut chunk = Frame::new(&mut self.input);
        if !upstream.read(&mut chunk) {
            return false;
        }
        self.chunk_flags = chunk.flags();

        if !self.resampler.process(&self.input, &mut self.output) {
            warn!("resampler reader: resampler rejected chunk of {} frames", frames);
            return false;
        }
        self.out_pos = 0;
        true
    }
}
