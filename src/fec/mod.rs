//! Forward error correction
//!
//! Source packets are grouped into blocks of `k`; each block is followed by
//! `m` repair packets. The receiver restores up to `m` lost source packets
//! per block.

pub mod codec;
pub mod gf256;
pub mod header;
pub mod reader;
pub mod writer;

pub use codec::{BlockDecoder, BlockEncoder, BlockLayout};
pub use reader::{FecRead, FecReader, FecReaderConfig};
pub use writer::FecWriter;

use codec::{ReedSolomonDecoder, ReedSolomonEncoder, XorDecoder, XorEncoder};

/// Erasure code selector, resolved to a codec at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FecScheme {
    #[default]
    Disabled,
    ReedSolomon,
    Xor,
}

impl FecScheme {
    pub fn is_enabled(self) -> bool {
        self != FecScheme::Disabled
    }

    pub fn new_encoder(self) -> Option<Box<dyn BlockEncoder>> {
        match self {
            FecScheme::Disabled => None,
            FecScheme::ReedSolomon => Some(Box::new(ReedSolomonEncoder)),
            FecScheme::Xor => Some(Box::new(XorEncoder)),
        }
    }

    pub fn new_decoder(self) -> Option<Box<dyn BlockDecoder>> {
        match self {
            FecScheme::Disabled => None,
            FecScheme::ReedSolomon => Some(Box::new(ReedSolomonDecoder::default())),
            FecScheme::Xor => Some(Box::new(XorDecoder)),
        }
    }

    /// Parse a scheme name as used in configuration ("none", "rs", "xor")
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "disabled" => Some(FecScheme::Disabled),
            "rs" | "rs8m" | "reed-solomon" | "reedsolomon" => Some(FecScheme::ReedSolomon),
            "xor" | "parity" => Some(FecScheme::Xor),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(FecScheme::from_name("RS"), Some(FecScheme::ReedSolomon));
        assert_eq!(FecScheme::from_name(" xor "), Some(FecScheme::Xor));
        assert_eq!(FecScheme::from_name("none"), Some(FecScheme::Disabled));
        assert_eq!(FecScheme::from_name("ldpc"), None);
    }

    #[test]
    fn test_codec_resolution() {
        assert!(FecScheme::Disabled.new_decoder().is_none());
        assert!(FecScheme::ReedSolomon.new_decoder().is_some());
        assert!(FecScheme::Xor.new_encoder().is_some());
        assert!(!FecScheme::Disabled.is_enabled());
    }
}
