use super::{AudioReader, Frame, Sample};

/// Sentinel written into frames before they are handed upstream
///
/// Outside the normalized range, so a stage that leaves part of a frame
/// unwritten shows up as an obviously wrong sample downstream.
pub const POISON_SAMPLE: Sample = 777.0;

/// Poisons every frame before delegating to the wrapped reader
pub struct PoisonReader<R> {
    reader: R,
}

impl<R: AudioReader> PoisonReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: AudioReader> AudioReader for PoisonReader<R> {
    fn read(&mut self, frame: &mut Frame<'_>) -> bool {
        frame.samples_mut().fill(POISON_SAMPLE);
        self.reader.read(frame)
    }
}
