/// Sorted packet queue
///
/// Keeps packets of one stream role ordered by `Packet::compare`. Arrivals are
/// mostly in order, so insertion scans from the tail. Duplicates are dropped
/// (first write wins) and, when a maximum size is set, the oldest packets are
/// evicted to make room.

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{trace, warn};

use super::{PacketPtr, PacketReader, PacketWriter};

/// Queue counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub packets_written: u64,
    pub packets_duplicate: u64,
    pub packets_evicted: u64,
}

#[derive(Debug)]
pub struct SortedQueue {
    packets: VecDeque<PacketPtr>,
    /// 0 means unbounded
    max_size: usize,
    /// Newest packet ever written, even if already read or evicted
    latest: Option<PacketPtr>,
    stats: QueueStats,
}

impl SortedQueue {
    /// Bounded queue; `max_size == 0` disables the bound
    pub fn new(max_size: usize) -> Self {
        Self::with_capacity(max_size, max_size)
    }

    pub fn with_capacity(max_size: usize, capacity: usize) -> Self {
        Self {
            packets: VecDeque::with_capacity(capacity),
            max_size,
            latest: None,
            stats: QueueStats::default(),
        }
    }

    /// Insert a packet at its ordered position
    /// Returns false if an equal packet is already queued
    pub fn write(&mut self, packet: PacketPtr) -> bool {
        let mut pos = self.packets.len();
        while pos > 0 {
            match self.packets[pos - 1].compare(&packet) {
                Ordering::Less => break,
                Ordering::Greater => pos -= 1,
                Ordering::Equal => {
                    trace!("sorted queue: dropping duplicate packet");
                    self.stats.packets_duplicate += 1;
                    return false;
                }
            }
        }

        let newer = match &self.latest {
            Some(latest) => latest.compare(&packet) == Ordering::Less,
            None => true,
        };
        if newer {
            self.latest = Some(packet.clone());
        }

        self.packets.insert(pos, packet);
        self.stats.packets_written += 1;

        if self.max_size > 0 {
            while self.packets.len() > self.max_size {
                if self.packets.pop_front().is_some() {
                    self.stats.packets_evicted += 1;
                    warn!(
                        "sorted queue: overflow, evicted oldest packet (max_size={})",
                        self.max_size
                    );
                }
            }
        }

        true
    }

    /// Remove and return the oldest packet
    pub fn read(&mut self) -> Option<PacketPtr> {
        self.packets.pop_front()
    }

    /// Oldest queued packet without removing it
    pub fn head(&self) -> Option<&PacketPtr> {
        self.packets.front()
    }

    /// Newest packet ever written to this queue
    pub fn latest(&self) -> Option<&PacketPtr> {
        self.latest.as_ref()
    }

    /// Drop the remembered newest packet after the stream restarted; the
    /// newest queued packet, if any, takes its place
    pub fn rebase_latest(&mut self) {
        self.latest = self.packets.back().cloned();
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }
}

impl PacketReader for SortedQueue {
    fn read(&mut self) -> Option<PacketPtr> {
        SortedQueue::read(self)
    }
}

impl PacketWriter for SortedQueue {
    fn write(&mut self, packet: PacketPtr) {
        SortedQueue::write(self, packet);
    }
}

/// Sorted queue shared between the network and audio contexts
///
/// Every operation takes the lock for a single push, pop or peek.
#[derive(Debug, Clone)]
pub struct SharedQueue {
    inner: Arc<Mutex<SortedQueue>>,
}

impl SharedQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SortedQueue::new(max_size))),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn latest(&self) -> Option<PacketPtr> {
        self.inner.lock().latest().cloned()
    }

    pub fn rebase_latest(&self) {
        self.inner.lock().rebase_latest();
    }

    pub fn stats(&self) -> QueueStats {
        self.inner.lock().stats()
    }
}

impl PacketReader for SharedQueue {
    fn read(&mut self) -> Option<PacketPtr> {
        self.inner.lock().read()
    }
}

impl PacketWriter for SharedQueue {
    fn write(&mut self, packet: PacketPtr) {
        self.inner.lock().write(packet);
    }
}
