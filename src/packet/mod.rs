//! Packet model and the network-side queueing stages
//!
//! Packets are routed by role into sorted queues, held back by the delayed
//! reader, and pulled downstream one at a time through `PacketReader`.

pub mod delayed_reader;
#[allow(clippy::module_inception)]
pub mod packet;
pub mod router;
pub mod sorted_queue;
pub mod units;

pub use delayed_reader::DelayedReader;
pub use packet::{Fec, Packet, PacketFlags, PacketPtr, Rtp, Udp};
pub use router::Router;
pub use sorted_queue::{QueueStats, SharedQueue, SortedQueue};
pub use units::*;

use std::collections::VecDeque;

/// Pull side of a packet stage
///
/// Returns `None` when nothing is available right now; that is never an
/// error and the caller simply tries again on its next frame.
pub trait PacketReader: Send {
    fn read(&mut self) -> Option<PacketPtr>;

    /// Bumped whenever the stream restarts upstream; packets read after a
    /// change no longer continue the previous timestamp sequence
    fn generation(&self) -> u64 {
        0
    }
}

/// Push side of a packet stage
pub trait PacketWriter: Send {
    fn write(&mut self, packet: PacketPtr);
}

impl<R: PacketReader + ?Sized> PacketReader for Box<R> {
    fn read(&mut self) -> Option<PacketPtr> {
        (**self).read()
    }

    fn generation(&self) -> u64 {
        (**self).generation()
    }
}

impl<W: PacketWriter + ?Sized> PacketWriter for Box<W> {
    fn write(&mut self, packet: PacketPtr) {
        (**self).write(packet)
    }
}

impl PacketReader for VecDeque<PacketPtr> {
    fn read(&mut self) -> Option<PacketPtr> {
        self.pop_front()
    }
}

impl PacketWriter for VecDeque<PacketPtr> {
    fn write(&mut self, packet: PacketPtr) {
        self.push_back(packet);
    }
}
