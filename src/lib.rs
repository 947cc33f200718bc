//! netaudio - network audio receiver
//!
//! Receives RTP streams (optionally protected by block FEC) over UDP and
//! turns them into a continuous, latency-controlled audio signal.

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod fec;
pub mod net;
pub mod packet;
pub mod pipeline;
pub mod rtp;

pub use error::{ConfigError, Error, FecError, ParseError, Result};
