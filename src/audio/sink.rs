/// Audio sinks
///
/// Where pulled frames end up. Device backends are out of scope; the crate
/// ships a sink that discards and one that writes raw PCM to a file.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{Frame, Sample};

pub trait Sink: Send {
    fn write(&mut self, frame: &Frame<'_>) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Discards frames, counting samples
#[derive(Debug, Default)]
pub struct NullSink {
    samples: u64,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples_written(&self) -> u64 {
        self.samples
    }
}

impl Sink for NullSink {
    fn write(&mut self, frame: &Frame<'_>) -> Result<()> {
        self.samples += frame.len() as u64;
        Ok(())
    }
}

/// Raw interleaved signed 16-bit little-endian PCM
pub struct RawFileSink<W: Write + Send = BufWriter<File>> {
    out: W,
    path: Option<PathBuf>,
    samples: u64,
}

impl RawFileSink {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .context(format!("Failed to create output file: {:?}", path))?;
        info!("Writing raw s16le audio to {:?}", path);
        Ok(Self {
            out: BufWriter::new(file),
            path: Some(path.to_path_buf()),
            samples: 0,
        })
    }
}

impl<W: Write + Send> RawFileSink<W> {
    pub fn from_writer(out: W) -> Self {
        Self {
            out,
            path: None,
            samples: 0,
        }
    }

    pub fn samples_written(&self) -> u64 {
        self.samples
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn to_s16(sample: Sample) -> i16 {
    (sample * 32768.0).clamp(-32768.0, 32767.0) as i16
}

impl<W: Write + Send> Sink for RawFileSink<W> {
    fn write(&mut self, frame: &Frame<'_>) -> Result<()> {
        for &sample in frame.samples() {
            self.out
                .write_all(&to_s16(sample).to_le_bytes())
                .context("Failed to write audio samples")?;
        }
        self.samples += frame.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush().context("Failed to flush audio output")?;
        if let Some(path) = &self.path {
            debug!("Flushed {} samples to {:?}", self.samples, path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_sink_encoding() {
        let mut sink = RawFileSink::from_writer(Vec::new());
        let mut samples = [0.0, 0.5, -1.0, 2.0];
        let frame = Frame::new(&mut samples);
        sink.write(&frame).unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.samples_written(), 4);

        let bytes = sink.into_inner();
        let decoded: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(decoded, vec![0, 16384, -32768, 32767]);
    }

    #[test]
    fn test_raw_sink_file() {
        let path = std::env::temp_dir().join(format!("netaudio-sink-{}.raw", std::process::id()));
        {
            let mut sink = RawFileSink::create(&path).unwrap();
            let mut samples = [0.25; 6];
            sink.write(&Frame::new(&mut samples)).unwrap();
            sink.flush().unwrap();
        }
        let len = std::fs::metadata(&path).unwrap().len();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(len, 12);
    }

    #[test]
    fn test_null_sink_counts() {
        let mut sink = NullSink::new();
        let mut samples = [0.0; 10];
        sink.write(&Frame::new(&mut samples)).unwrap();
        assert_eq!(sink.samples_written(), 10);
    }
}
