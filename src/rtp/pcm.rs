/// Linear PCM (L16) payload: big-endian signed 16-bit, interleaved channels

use super::PayloadDecoder;
use crate::audio::Sample;

const BYTES_PER_SAMPLE: usize = 2;

#[derive(Debug, Clone, Copy)]
pub struct L16Decoder {
    channels: usize,
}

impl L16Decoder {
    pub fn new(channels: usize) -> Self {
        Self {
            channels: channels.max(1),
        }
    }
}

impl PayloadDecoder for L16Decoder {
    fn samples_in(&self, payload_len: usize) -> usize {
        payload_len / (BYTES_PER_SAMPLE * self.channels)
    }

    fn decode(&mut self, payload: &[u8], offset: usize, out: &mut [Sample]) -> usize {
        let frame_bytes = BYTES_PER_SAMPLE * self.channels;
        let start = offset.saturating_mul(frame_bytes);
        let Some(rest) = payload.get(start..) else {
            return 0;
        };
        let frames = (rest.len() / frame_bytes).min(out.len() / self.channels);
        let n = frames * self.channels;
        for (dst, src) in out[..n].iter_mut().zip(rest.chunks_exact(BYTES_PER_SAMPLE)) {
            *dst = i16::from_be_bytes([src[0], src[1]]) as Sample / 32768.0;
        }
        frames
    }
}

/// Encode normalized samples as L16 (clamped), appending to `out`
pub fn encode_l16(samples: &[Sample], out: &mut Vec<u8>) {
    out.reserve(samples.len() * BYTES_PER_SAMPLE);
    for &sample in samples {
        let s = (sample * 32768.0).clamp(-32768.0, 32767.0) as i16;
        out.extend_from_slice(&s.to_be_bytes());
    }
}
