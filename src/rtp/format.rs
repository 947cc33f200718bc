use super::g711::{G711Codec, G711Decoder};
use super::pcm::L16Decoder;
use super::PayloadDecoder;
use crate::audio::{ChannelMask, SampleSpec, CHANNEL_MASK_MONO, CHANNEL_MASK_STEREO};

pub const PAYLOAD_TYPE_PCMU: u8 = 0;
pub const PAYLOAD_TYPE_PCMA: u8 = 8;
pub const PAYLOAD_TYPE_L16_STEREO: u8 = 10;
pub const PAYLOAD_TYPE_L16_MONO: u8 = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    L16,
    Pcmu,
    Pcma,
}

/// Static description of one RTP payload type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    pub payload_type: u8,
    pub encoding: Encoding,
    pub sample_rate: u32,
    pub channels: ChannelMask,
}

impl Format {
    pub fn sample_spec(&self) -> SampleSpec {
        SampleSpec::new(self.sample_rate, self.channels)
    }

    pub fn new_decoder(&self) -> Box<dyn PayloadDecoder> {
        match self.encoding {
            Encoding::L16 => Box::new(L16Decoder::new(self.channels.count_ones() as usize)),
            Encoding::Pcmu => Box::new(G711Decoder::new(G711Codec::ULaw)),
            Encoding::Pcma => Box::new(G711Decoder::new(G711Codec::ALaw)),
        }
    }

    /// Samples per channel carried by a payload of `payload_len` bytes
    pub fn duration(&self, payload_len: usize) -> u32 {
        let bytes_per_frame = match self.encoding {
            Encoding::L16 => 2 * self.channels.count_ones() as usize,
            Encoding::Pcmu | Encoding::Pcma => 1,
        };
        (payload_len / bytes_per_frame.max(1)) as u32
    }
}

/// Payload type registry
#[derive(Debug, Clone)]
pub struct FormatMap {
    formats: Vec<Format>,
}

impl Default for FormatMap {
    fn default() -> Self {
        Self {
            formats: vec![
                Format {
                    payload_type: PAYLOAD_TYPE_PCMU,
                    encoding: Encoding::Pcmu,
                    sample_rate: 8000,
                    channels: CHANNEL_MASK_MONO,
                },
                Format {
                    payload_type: PAYLOAD_TYPE_PCMA,
                    encoding: Encoding::Pcma,
                    sample_rate: 8000,
                    channels: CHANNEL_MASK_MONO,
                },
                Format {
                    payload_type: PAYLOAD_TYPE_L16_STEREO,
                    encoding: Encoding::L16,
                    sample_rate: 44100,
                    channels: CHANNEL_MASK_STEREO,
                },
                Format {
                    payload_type: PAYLOAD_TYPE_L16_MONO,
                    encoding: Encoding::L16,
                    sample_rate: 44100,
                    channels: CHANNEL_MASK_MONO,
                },
            ],
        }
    }
}

impl FormatMap {
    pub fn empty() -> Self {
        Self {
            formats: Vec::new(),
        }
    }

    /// Register a format, replacing any previous entry for its payload type
    pub fn register(&mut self, format: Format) {
        self.formats.retain(|f| f.payload_type != format.payload_type);
        self.formats.push(format);
    }

    pub fn find(&self, payload_type: u8) -> Option<&Format> {
        self.formats.iter().find(|f| f.payload_type == payload_type)
    }
}
