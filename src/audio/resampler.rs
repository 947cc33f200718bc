/// Resamplers with runtime scaling
///
/// Both backends produce a fixed number of output frames per `process` call
/// and report how many input frames the next call needs. The conversion
/// ratio is `output_rate / input_rate * scaling`; the latency monitor drives
/// `scaling` around 1.0 to absorb clock drift.

use rubato::{
    Resampler as _, SincFixedOut, SincInterpolationParameters, SincInterpolationType,
    WindowFunction,
};
use tracing::{debug, warn};

use super::Sample;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResamplerBackend {
    /// Streaming linear interpolation
    #[default]
    Builtin,
    /// Band-limited sinc interpolation from `rubato`
    Rubato,
}

impl ResamplerBackend {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "builtin" | "linear" => Some(ResamplerBackend::Builtin),
            "rubato" | "sinc" => Some(ResamplerBackend::Rubato),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResamplerConfig {
    /// Largest accepted deviation of the scaling factor from 1.0
    pub max_scaling_delta: f64,
    pub sinc_len: usize,
    pub oversampling_factor: usize,
    pub cutoff: f32,
}

impl Default for ResamplerConfig {
    fn default() -> Self {
        Self {
            max_scaling_delta: 0.05,
            sinc_len: 64,
            oversampling_factor: 128,
            cutoff: 0.95,
        }
    }
}

pub trait Resampler: Send {
    /// Returns false (and keeps the previous value) if `scaling` is out of range
    fn set_scaling(&mut self, scaling: f64) -> bool;

    /// Input frames per channel the next `process` call consumes
    fn input_frames_next(&self) -> usize;

    /// Upper bound of `input_frames_next` over any accepted scaling
    fn input_frames_max(&self) -> usize;

    /// Output frames per channel produced by every `process` call
    fn output_frames(&self) -> usize;

    /// Convert exactly `input_frames_next()` interleaved frames into
    /// `output_frames()` interleaved frames
    fn process(&mut self, input: &[Sample], output: &mut [Sample]) -> bool;
}

pub fn new_resampler(
    backend: ResamplerBackend,
    config: &ResamplerConfig,
    channels: usize,
    base_ratio: f64,
    chunk_frames: usize,
) -> Result<Box<dyn Resampler>, ConfigError> {
    if channels == 0 || chunk_frames == 0 {
        return Err(ConfigError::Resampler(format!(
            "invalid shape: channels={} chunk={}",
            channels, chunk_frames
        )));
    }
    if !base_ratio.is_finite() || base_ratio <= 0.0 {
        return Err(ConfigError::Resampler(format!("invalid ratio {}", base_ratio)));
    }

    match backend {
        ResamplerBackend::Builtin => Ok(Box::new(LinearResampler::new(
            config,
            channels,
            base_ratio,
            chunk_frames,
        ))),
        ResamplerBackend::Rubato => {
            match RubatoResampler::new(config, channels, base_ratio, chunk_frames) {
                Ok(resampler) => Ok(Box::new(resampler)),
                Err(e) => {
                    warn!("rubato resampler setup failed, falling back to linear: {}", e);
                    Ok(Box::new(LinearResampler::new(
                        config,
                        channels,
                        base_ratio,
                        chunk_frames,
                    )))
                }
            }
        }
    }
}

fn scaling_in_range(scaling: f64, max_delta: f64) -> bool {
    scaling.is_finite() && scaling > 0.0 && (scaling - 1.0).abs() <= max_delta
}

/// Linear interpolation over a two-frame history
///
/// The virtual input is `[h0, h1, in0, in1, ...]` and `pos` is the position
/// of the next output frame in it. Output frames are spaced `1 / ratio`
/// apart.
pub struct LinearResampler {
    channels: usize,
    chunk: usize,
    base_ratio: f64,
    scaling: f64,
    max_scaling_delta: f64,
    history: Vec<Sample>,
    next_history: Vec<Sample>,
    pos: f64,
}

impl LinearResampler {
    pub fn new(config: &ResamplerConfig, channels: usize, base_ratio: f64, chunk: usize) -> Self {
        Self {
            channels,
            chunk,
            base_ratio,
            scaling: 1.0,
            max_scaling_delta: config.max_scaling_delta.abs(),
            history: vec![0.0; 2 * channels],
            next_history: vec![0.0; 2 * channels],
            // First output lands on the first real input frame
            pos: 2.0,
        }
    }

    fn step(&self) -> f64 {
        1.0 / (self.base_ratio * self.scaling)
    }

    fn last_position(&self, step: f64) -> f64 {
        self.pos + (self.chunk - 1) as f64 * step
    }

    fn frame<'a>(&'a self, input: &'a [Sample], index: usize) -> &'a [Sample] {
        let ch = self.channels;
        if index < 2 {
            &self.history[index * ch..(index + 1) * ch]
        } else {
            &input[(index - 2) * ch..(index - 1) * ch]
        }
    }
}

impl Resampler for LinearResampler {
    fn set_scaling(&mut self, scaling: f64) -> bool {
        if !scaling_in_range(scaling, self.max_scaling_delta) {
            return false;
        }
        self.scaling = scaling;
        true
    }

    fn input_frames_next(&self) -> usize {
        self.last_position(self.step()).floor() as usize
    }

    fn input_frames_max(&self) -> usize {
        let max_step = 1.0 / (self.base_ratio * (1.0 - self.max_scaling_delta).max(f64::EPSILON));
        ((self.chunk + 1) as f64 * max_step).ceil() as usize + 2
    }

    fn output_frames(&self) -> usize {
        self.chunk
    }

    fn process(&mut self, input: &[Sample], output: &mut [Sample]) -> bool {
        let ch = self.channels;
        let step = self.step();
        let consumed = self.last_position(step).floor() as usize;
        if input.len() != consumed * ch || output.len() != self.chunk * ch {
            return false;
        }

        for (k, out) in output.chunks_exact_mut(ch).enumerate() {
            let t = self.pos + k as f64 * step;
            let index = t.floor() as usize;
            let frac = (t - index as f64) as Sample;
            let a = self.frame(input, index);
            let b = self.frame(input, index + 1);
            for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
                *o = x + (y - x) * frac;
            }
        }

        for i in 0..2 {
            let index = consumed + i;
            let src = if index < 2 {
                &self.history[index * ch..(index + 1) * ch]
            } else {
                &input[(index - 2) * ch..(index - 1) * ch]
            };
            self.next_history[i * ch..(i + 1) * ch].copy_from_slice(src);
        }
        std::mem::swap(&mut self.history, &mut self.next_history);
        self.pos += self.chunk as f64 * step - consumed as f64;
        true
    }
}

/// `rubato` sinc resampler over deinterleaved buffers
pub struct RubatoResampler {
    inner: SincFixedOut<f32>,
    channels: usize,
    max_scaling_delta: f64,
    planar_in: Vec<Vec<f32>>,
    planar_out: Vec<Vec<f32>>,
}

impl RubatoResampler {
    pub fn new(
        config: &ResamplerConfig,
        channels: usize,
        base_ratio: f64,
        chunk: usize,
    ) -> Result<Self, ConfigError> {
        let max_scaling_delta = config.max_scaling_delta.abs();
        if max_scaling_delta >= 1.0 {
            return Err(ConfigError::Resampler(format!(
                "max scaling delta {} leaves no positive lower bound",
                max_scaling_delta
            )));
        }
        // rubato accepts [1/max, max]; cover [1 - delta, 1 + delta]
        let max_relative = 1.0 / (1.0 - max_scaling_delta);
        let params = SincInterpolationParameters {
            sinc_len: config.sinc_len,
            f_cutoff: config.cutoff,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: config.oversampling_factor,
            window: WindowFunction::BlackmanHarris2,
        };
        let inner =
            SincFixedOut::<f32>::new(base_ratio, max_relative, params, chunk, channels)
                .map_err(|e| ConfigError::Resampler(e.to_string()))?;

        let max_in = inner.input_frames_max();
        debug!(
            "rubato resampler: ratio={:.5} chunk={} max_input={}",
            base_ratio, chunk, max_in
        );
        Ok(Self {
            inner,
            channels,
            max_scaling_delta,
            planar_in: vec![Vec::with_capacity(max_in); channels],
            planar_out: vec![vec![0.0; chunk]; channels],
        })
    }
}

impl Resampler for RubatoResampler {
    fn set_scaling(&mut self, scaling: f64) -> bool {
        if !scaling_in_range(scaling, self.max_scaling_delta) {
            return false;
        }
        match self.inner.set_resample_ratio_relative(scaling, true) {
            Ok(()) => true,
            Err(e) => {
                warn!("rubato resampler: can't set scaling {}: {}", scaling, e);
                false
            }
        }
    }

    fn input_frames_next(&self) -> usize {
        self.inner.input_frames_next()
    }

    fn input_frames_max(&self) -> usize {
        self.inner.input_frames_max()
    }

    fn output_frames(&self) -> usize {
        self.inner.output_frames_next()
    }

    fn process(&mut self, input: &[Sample], output: &mut [Sample]) -> bool {
        let ch = self.channels;
        let frames = self.inner.input_frames_next();
        let out_frames = self.inner.output_frames_next();
        if input.len() != frames * ch || output.len() != out_frames * ch {
            return false;
        }

        for (c, plane) in self.planar_in.iter_mut().enumerate() {
            plane.clear();
            plane.extend(input.iter().skip(c).step_by(ch));
        }
        for plane in &mut self.planar_out {
            plane.resize(out_frames, 0.0);
        }

        match self
            .inner
            .process_into_buffer(&self.planar_in, &mut self.planar_out, None)
        {
            Ok((_, written)) => {
                for (c, plane) in self.planar_out.iter().enumerate() {
                    for (i, &sample) in plane[..written.min(out_frames)].iter().enumerate() {
                        output[i * ch + c] = sample;
                    }
                }
                if written < out_frames {
                    output[written * ch..].fill(0.0);
                }
                true
            }
            Err(e) => {
                warn!("rubato resampler: process failed: {}", e);
                false
            }
        }
    }
}
