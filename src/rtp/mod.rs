pub mod format;
pub mod g711;
pub mod header;
pub mod parser;
pub mod pcm;
pub mod validator;

pub use format::{Encoding, Format, FormatMap};
pub use parser::Parser;
pub use validator::{Validation, Validator, ValidatorConfig};

use crate::audio::Sample;

/// Decodes one RTP payload encoding into interleaved samples
pub trait PayloadDecoder: Send {
    /// Samples per channel contained in a payload of `payload_len` bytes
    fn samples_in(&self, payload_len: usize) -> usize;

    /// Decode starting `offset` samples (per channel) into the payload,
    /// filling at most `out.len()` interleaved samples.
    /// Returns samples per channel written; the caller conceals the rest.
    fn decode(&mut self, payload: &[u8], offset: usize, out: &mut [Sample]) -> usize;
}
