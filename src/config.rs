use anyhow::{bail, Context, Result};
#[cfg(test)]
use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::audio::ResamplerBackend;
use crate::fec::FecScheme;
use crate::packet::{Nanoseconds, MILLISECOND};
use crate::pipeline::{CommonConfig, SessionConfig};
use crate::rtp::FormatMap;

/// Receiver configuration loaded from `NETAUDIO_*` environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Where source (media) packets arrive
    pub source_addr: SocketAddr,
    /// Where FEC repair packets arrive; required when FEC is enabled
    pub repair_addr: Option<SocketAddr>,

    pub session: SessionConfig,
    pub common: CommonConfig,

    /// Raw s16le output file; audio is discarded when unset
    pub output_path: Option<String>,
}

fn parse_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key).filter(|s| !s.trim().is_empty()) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: '{}'", key, value)),
        None => Ok(default),
    }
}

fn parse_ms(get: &impl Fn(&str) -> Option<String>, key: &str, default: Nanoseconds) -> Result<Nanoseconds> {
    let ms: i64 = parse_or(get, key, default / MILLISECOND)?;
    ms.checked_mul(MILLISECOND)
        .with_context(|| format!("{} is out of range", key))
}

fn parse_bool(get: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> Result<bool> {
    let Some(value) = get(key).filter(|s| !s.trim().is_empty()) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{} must be a boolean, got '{}'", key, other),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env if present, ignore if missing
        Self::from_getter(|key| env::var(key).ok())
    }

    /// Parse config from a custom getter function (for testing)
    pub fn from_getter<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fec_name = get("NETAUDIO_FEC").unwrap_or_default();
        let fec_scheme = FecScheme::from_name(&fec_name)
            .with_context(|| format!("NETAUDIO_FEC must be one of none, rs, xor; got '{}'", fec_name))?;

        let backend_name = get("NETAUDIO_RESAMPLER").unwrap_or_default();
        let resampler_backend = ResamplerBackend::from_name(&backend_name).with_context(|| {
            format!("NETAUDIO_RESAMPLER must be builtin or rubato; got '{}'", backend_name)
        })?;

        let session_defaults = SessionConfig::default();
        let common_defaults = CommonConfig::default();

        let mut session = SessionConfig {
            target_latency: parse_ms(&get, "NETAUDIO_LATENCY_MS", session_defaults.target_latency)?,
            min_latency_factor: parse_or(
                &get,
                "NETAUDIO_MIN_LATENCY_FACTOR",
                session_defaults.min_latency_factor,
            )?,
            max_latency_factor: parse_or(
                &get,
                "NETAUDIO_MAX_LATENCY_FACTOR",
                session_defaults.max_latency_factor,
            )?,
            packet_length: parse_ms(&get, "NETAUDIO_PACKET_LENGTH_MS", session_defaults.packet_length)?,
            payload_type: parse_or(&get, "NETAUDIO_PAYLOAD_TYPE", session_defaults.payload_type)?,
            fec_scheme,
            resampler_backend,
            ..session_defaults
        };
        session.watchdog.no_playback_timeout = parse_ms(
            &get,
            "NETAUDIO_NO_PLAYBACK_TIMEOUT_MS",
            session.watchdog.no_playback_timeout,
        )?;
        session.watchdog.broken_playback_timeout = parse_ms(
            &get,
            "NETAUDIO_BROKEN_PLAYBACK_TIMEOUT_MS",
            session.watchdog.broken_playback_timeout,
        )?;
        // The stream's channel layout follows its payload type
        if let Some(format) = FormatMap::default().find(session.payload_type) {
            session.channels = format.channels;
        }

        let common = CommonConfig {
            output_sample_rate: parse_or(&get, "NETAUDIO_OUTPUT_RATE", common_defaults.output_sample_rate)?,
            output_channels: session.channels,
            internal_frame_length: parse_ms(
                &get,
                "NETAUDIO_FRAME_LENGTH_MS",
                common_defaults.internal_frame_length,
            )?,
            resampling: parse_bool(&get, "NETAUDIO_RESAMPLING", common_defaults.resampling)?,
            timing: parse_bool(&get, "NETAUDIO_TIMING", true)?,
            poisoning: parse_bool(&get, "NETAUDIO_POISON", common_defaults.poisoning)?,
            profiling: parse_bool(&get, "NETAUDIO_PROFILING", common_defaults.profiling)?,
            beeping: parse_bool(&get, "NETAUDIO_BEEP", common_defaults.beeping)?,
            max_sessions: parse_or(&get, "NETAUDIO_MAX_SESSIONS", common_defaults.max_sessions)?,
            ..common_defaults
        };

        let source_addr = parse_or(
            &get,
            "NETAUDIO_SOURCE_ADDR",
            SocketAddr::from(([0, 0, 0, 0], 10001)),
        )?;
        let repair_addr = match get("NETAUDIO_REPAIR_ADDR").filter(|s| !s.trim().is_empty()) {
            Some(addr) => Some(
                addr.trim()
                    .parse()
                    .with_context(|| format!("NETAUDIO_REPAIR_ADDR has an invalid value: '{}'", addr))?,
            ),
            None if fec_scheme.is_enabled() => {
                Some(SocketAddr::new(source_addr.ip(), source_addr.port().wrapping_add(1)))
            }
            None => None,
        };

        Ok(Config {
            source_addr,
            repair_addr,
            session,
            common,
            output_path: get("NETAUDIO_OUTPUT").filter(|s| !s.is_empty()),
        })
    }

    /// Create config from a HashMap (convenience for testing)
    #[cfg(test)]
    pub fn from_map(map: &HashMap<&str, &str>) -> Result<Self> {
        Self::from_getter(|key| map.get(key).map(|v| v.to_string()))
    }

    /// Validate configuration values at startup.
    /// Returns Ok(()) if all validations pass, or Err with details of what failed.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if let Err(e) = self.session.validate(&FormatMap::default()) {
            errors.push(format!("Session: {}", e));
        }
        if let Err(e) = self.common.validate() {
            errors.push(format!("Output: {}", e));
        }

        if !self.common.resampling {
            if let Ok(format) = self.session.format(&FormatMap::default()) {
                if format.sample_rate != self.common.output_sample_rate {
                    errors.push(format!(
                        "Stream rate {} differs from NETAUDIO_OUTPUT_RATE={}; set NETAUDIO_RESAMPLING=1.",
                        format.sample_rate, self.common.output_sample_rate
                    ));
                }
            }
        }

        match self.repair_addr {
            Some(repair) if repair == self.source_addr => {
                errors.push(format!("Source and repair endpoints are both {}.", repair));
            }
            None if self.session.fec_scheme.is_enabled() => {
                errors.push("FEC is enabled but NETAUDIO_REPAIR_ADDR is not set.".to_string());
            }
            _ => {}
        }

        if let Some(path) = &self.output_path {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    errors.push(format!("Output directory '{}' does not exist.", parent.display()));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )
        }
    }
}
