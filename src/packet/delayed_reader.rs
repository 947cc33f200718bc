use tracing::debug;

use super::{PacketPtr, PacketReader, SortedQueue};

/// Holds back the stream until `delay` packets have accumulated
///
/// While buffering, every packet available upstream is moved into a local
/// sorted queue (so reordering inside the delay window is absorbed) and reads
/// return `None`. Once the threshold is reached the local queue drains first,
/// then packets pass straight through. The reader never re-buffers.
pub struct DelayedReader<R> {
    reader: R,
    queue: SortedQueue,
    delay: usize,
    started: bool,
}

impl<R: PacketReader> DelayedReader<R> {
    pub fn new(reader: R, delay: usize) -> Self {
        Self {
            reader,
            queue: SortedQueue::with_capacity(0, delay + 1),
            delay,
            started: false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Packets currently held locally
    pub fn buffered(&self) -> usize {
        self.queue.len()
    }

    fn fill(&mut self) {
        while let Some(packet) = self.reader.read() {
            self.queue.write(packet);
        }
    }
}

impl<R: PacketReader> PacketReader for DelayedReader<R> {
    fn read(&mut self) -> Option<PacketPtr> {
        if !self.started {
            self.fill();
            if self.queue.len() < self.delay {
                return None;
            }
            debug!(
                "delayed reader: starting, buffered={} delay={}",
                self.queue.len(),
                self.delay
            );
            self.started = true;
        }

        if let Some(packet) = self.queue.read() {
            return Some(packet);
        }
        self.reader.read()
    }
}
