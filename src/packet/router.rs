use tracing::trace;

use super::{PacketFlags, PacketPtr, PacketWriter};

struct Route {
    flags: PacketFlags,
    writer: Box<dyn PacketWriter>,
}

/// Dispatches packets to per-role writers by their flags
///
/// The first route whose flags are all present on the packet wins. A packet
/// that matches no route (control traffic, or repair packets when FEC is
/// off) is rejected and the caller may offer it elsewhere.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&mut self, flags: PacketFlags, writer: Box<dyn PacketWriter>) {
        self.routes.push(Route { flags, writer });
    }

    pub fn route(&mut self, packet: PacketPtr) -> bool {
        match self
            .routes
            .iter_mut()
            .find(|route| packet.has_flags(route.flags))
        {
            Some(route) => {
                route.writer.write(packet);
                true
            }
            None => {
                trace!("router: no route for packet with {:?}", packet.flags());
                false
            }
        }
    }

    pub fn num_routes(&self) -> usize {
        self.routes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Packet, PacketReader, SharedQueue};
    use bytes::Bytes;

    fn packet(flags: PacketFlags) -> PacketPtr {
        Packet::new(flags, Bytes::new()).into_ptr()
    }

    #[test]
    fn test_routes_by_role() {
        let source = SharedQueue::new(0);
        let repair = SharedQueue::new(0);
        let mut router = Router::new();
        router.add_route(PacketFlags::SOURCE, Box::new(source.clone()));
        router.add_route(PacketFlags::REPAIR, Box::new(repair.clone()));

        assert!(router.route(packet(PacketFlags::SOURCE)));
        assert!(router.route(packet(PacketFlags::REPAIR)));
        assert_eq!(source.len(), 1);
        assert_eq!(repair.len(), 1);
    }

    #[test]
    fn test_unmatched_packets_rejected() {
        let source = SharedQueue::new(0);
        let mut router = Router::new();
        router.add_route(PacketFlags::SOURCE, Box::new(source.clone()));

        assert!(!router.route(packet(PacketFlags::CONTROL)));
        assert!(!router.route(packet(PacketFlags::REPAIR)));
        assert!(source.is_empty());
    }

    #[test]
    fn test_restored_source_still_matches_source_route() {
        let mut source = SharedQueue::new(0);
        let mut router = Router::new();
        router.add_route(PacketFlags::SOURCE, Box::new(source.clone()));

        assert!(router.route(packet(PacketFlags::SOURCE | PacketFlags::RESTORED)));
        assert!(source.read().is_some());
    }
}
