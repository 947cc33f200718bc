//! Error types for the receiver pipeline
//!
//! Data-path failures (malformed packets, unrecoverable FEC blocks) are
//! reported through these types and logged by the stage that hit them; they
//! never abort the audio path. Configuration errors make a session invalid.

use thiserror::Error;

/// Top-level library error
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("FEC error: {0}")]
    Fec(#[from] FecError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Invalid session or pipeline configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("target latency must be positive, got {0}ns")]
    InvalidLatency(i64),

    #[error("latency window [{min}ns, {max}ns] does not contain target {target}ns")]
    InvalidLatencyWindow { min: i64, target: i64, max: i64 },

    #[error("packet length must be positive, got {0}ns")]
    InvalidPacketLength(i64),

    #[error("frame length must be positive, got {0}ns")]
    InvalidFrameLength(i64),

    #[error("unsupported payload type: {0}")]
    UnsupportedPayloadType(u8),

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("invalid channel mask: {0:#x}")]
    InvalidChannelMask(u32),

    #[error("channel mask mismatch: stream {stream:#x}, output {output:#x}")]
    ChannelMismatch { stream: u32, output: u32 },

    #[error("sample rate mismatch with resampling disabled: stream {stream}, output {output}")]
    RateMismatch { stream: u32, output: u32 },

    #[error("invalid FEC configuration: {0}")]
    InvalidFec(#[from] FecError),

    #[error("resampler setup failed: {0}")]
    Resampler(String),
}

/// Malformed wire data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("packet too short: {0} bytes")]
    TooShort(usize),

    #[error("unsupported RTP version: {0}")]
    BadVersion(u8),

    #[error("header overruns packet: need {needed} bytes, have {len}")]
    HeaderOverrun { needed: usize, len: usize },

    #[error("invalid padding length {padding} for {len} byte payload")]
    BadPadding { padding: usize, len: usize },

    #[error("invalid FEC payload id: {0}")]
    BadPayloadId(&'static str),
}

/// Block codec failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FecError {
    #[error("invalid block layout: {source_len} source + {repair_len} repair symbols")]
    InvalidLayout { source_len: usize, repair_len: usize },

    #[error("symbol size mismatch: expected {expected} bytes, got {actual}")]
    SymbolSize { expected: usize, actual: usize },

    #[error("not enough symbols to repair block: have {have}, need {need}")]
    NotEnoughSymbols { have: usize, need: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
