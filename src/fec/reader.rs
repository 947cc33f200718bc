/// FEC reader
///
/// Merges the source and repair streams block by block. Source packets of
/// the current block are emitted in symbol order as soon as they are
/// available. When the next one is missing and at least `k` packets of the
/// block (source + repair) have arrived, the block decoder restores the
/// missing symbols, which are parsed back into RTP packets flagged
/// `RESTORED`. When repair is impossible and a source packet of a later block
/// has arrived, the block is considered closed: each remaining hole is
/// reported as `FecRead::Lost` and the reader moves on.
///
/// The reader starts at the first packet with symbol id 0; anything before
/// that passes through untouched.

use bytes::BytesMut;
use tracing::{debug, trace, warn};

use super::codec::{BlockDecoder, BlockLayout, RS_MAX_BLOCK_LEN};
use crate::packet::{blknum_diff, Blknum, Fec, PacketFlags, PacketPtr, PacketReader};
use crate::rtp::Parser;

const ARENA_CAPACITY: usize = 16 * 1024;

#[derive(Debug, Clone)]
pub struct FecReaderConfig {
    /// Largest forward block number jump before the reader restarts
    pub max_sbn_jump: usize,
}

impl Default for FecReaderConfig {
    fn default() -> Self {
        Self { max_sbn_jump: 100 }
    }
}

/// One step of the FEC reader
#[derive(Debug)]
pub enum FecRead {
    Packet(PacketPtr),
    /// Source symbol `index` of `block` could not be received or restored
    Lost { block: Blknum, index: usize },
    /// Nothing can be emitted until more packets arrive
    Nothing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FecStats {
    pub packets_restored: u64,
    pub packets_lost: u64,
    pub late_source: u64,
    pub late_repair: u64,
    pub malformed: u64,
    pub restarts: u64,
}

pub struct FecReader<S, R> {
    config: FecReaderConfig,
    decoder: Box<dyn BlockDecoder>,
    parser: Parser,
    source_reader: S,
    repair_reader: R,

    started: bool,
    cur_sbn: Blknum,
    next_index: usize,
    source_block: Vec<Option<PacketPtr>>,
    repair_block: Vec<Option<PacketPtr>>,
    /// First packet seen from a later block on each stream
    pending_source: Option<PacketPtr>,
    pending_repair: Option<PacketPtr>,
    /// Decoding was already attempted with enough symbols for this block
    repair_attempted: bool,

    restored: Vec<Vec<u8>>,
    arena: BytesMut,
    stats: FecStats,
}

impl<S: PacketReader, R: PacketReader> FecReader<S, R> {
    pub fn new(
        config: FecReaderConfig,
        decoder: Box<dyn BlockDecoder>,
        parser: Parser,
        source_reader: S,
        repair_reader: R,
    ) -> Self {
        Self {
            config,
            decoder,
            parser,
            source_reader,
            repair_reader,
            started: false,
            cur_sbn: 0,
            next_index: 0,
            source_block: Vec::new(),
            repair_block: Vec::new(),
            pending_source: None,
            pending_repair: None,
            repair_attempted: false,
            restored: Vec::new(),
            arena: BytesMut::with_capacity(ARENA_CAPACITY),
            stats: FecStats::default(),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn stats(&self) -> FecStats {
        self.stats
    }

    pub fn read_next(&mut self) -> FecRead {
        loop {
            if !self.started {
                let Some(packet) = self.next_source() else {
                    return FecRead::Nothing;
                };
                match packet.fec().map(|f| (f.encoding_symbol_id, f.source_block_number)) {
                    Some((0, sbn)) => {
                        debug!("fec reader: got first packet in block, starting at sbn={}", sbn);
                        self.started = true;
                        self.reset_block(sbn);
                        self.pending_source = Some(packet);
                    }
                    _ => {
                        trace!("fec reader: not started, passing packet through");
                        return FecRead::Packet(packet);
                    }
                }
            }

            self.fill_source();
            self.fill_repair();

            if self.source_block.is_empty() {
                // Layout unknown: nothing of the current block has arrived
                let Some(next_sbn) = self.pending_sbn() else {
                    return FecRead::Nothing;
                };
                self.skip_to(next_sbn);
                continue;
            }

            if self.next_index >= self.source_block.len() {
                let next_sbn = self.cur_sbn.wrapping_add(1);
                self.skip_to(next_sbn);
                continue;
            }

            if let Some(packet) = self.take_next() {
                return FecRead::Packet(packet);
            }

            if self.try_repair() {
                if let Some(packet) = self.take_next() {
                    return FecRead::Packet(packet);
                }
            }

            if self.pending_source.is_none() {
                return FecRead::Nothing;
            }

            let index = self.next_index;
            self.next_index += 1;
            self.stats.packets_lost += 1;
            debug!("fec reader: lost packet, sbn={} esi={}", self.cur_sbn, index);
            return FecRead::Lost {
                block: self.cur_sbn,
                index,
            };
        }
    }

    fn next_source(&mut self) -> Option<PacketPtr> {
        self.pending_source
            .take()
            .or_else(|| self.source_reader.read())
    }

    fn next_repair(&mut self) -> Option<PacketPtr> {
        self.pending_repair
            .take()
            .or_else(|| self.repair_reader.read())
    }

    fn pending_sbn(&self) -> Option<Blknum> {
        self.pending_source
            .as_ref()
            .and_then(|p| p.fec())
            .map(|f| f.source_block_number)
    }

    fn take_next(&mut self) -> Option<PacketPtr> {
        let packet = self.source_block.get(self.next_index)?.clone()?;
        self.next_index += 1;
        Some(packet)
    }

    fn reset_block(&mut self, sbn: Blknum) {
        self.cur_sbn = sbn;
        self.next_index = 0;
        self.source_block.clear();
        self.repair_block.clear();
        self.repair_attempted = false;
    }

    fn skip_to(&mut self, sbn: Blknum) {
        let jump = blknum_diff(sbn, self.cur_sbn) as i64;
        if self.config.max_sbn_jump > 0 && jump > self.config.max_sbn_jump as i64 {
            warn!(
                "fec reader: too long sbn jump, restarting: cur={} next={} max={}",
                self.cur_sbn, sbn, self.config.max_sbn_jump
            );
            self.stats.restarts += 1;
            self.started = false;
            self.reset_block(sbn);
            return;
        }
        if jump > 1 {
            debug!("fec reader: skipping {} blocks without packets", jump - 1);
        }
        self.reset_block(sbn);
    }

    /// Size the block on first sight and check later packets agree
    fn update_layout(&mut self, source_len: usize, block_len: usize) -> bool {
        if source_len == 0 || source_len >= RS_MAX_BLOCK_LEN {
            return false;
        }
        if self.source_block.is_empty() {
            self.source_block.resize(source_len, None);
        } else if self.source_block.len() != source_len {
            return false;
        }

        if block_len > 0 {
            if block_len <= source_len || block_len > RS_MAX_BLOCK_LEN {
                return false;
            }
            let repair_len = block_len - source_len;
            if self.repair_block.is_empty() {
                self.repair_block.resize(repair_len, None);
            } else if self.repair_block.len() != repair_len {
                return false;
            }
        }
        true
    }

    fn fill_source(&mut self) {
        while let Some(packet) = self.next_source() {
            let Some(fec) = packet.fec() else {
                trace!("fec reader: dropping source packet without payload id");
                self.stats.malformed += 1;
                continue;
            };

            let diff = blknum_diff(fec.source_block_number, self.cur_sbn);
            if diff < 0 {
                trace!(
                    "fec reader: dropping late source packet, sbn={} cur={}",
                    fec.source_block_number,
                    self.cur_sbn
                );
                self.stats.late_source += 1;
                continue;
            }
            if diff > 0 {
                self.pending_source = Some(packet);
                return;
            }

            let source_len = fec.source_block_length as usize;
            let esi = fec.encoding_symbol_id as usize;
            if !self.update_layout(source_len, 0) || esi >= source_len {
                warn!(
                    "fec reader: dropping malformed source packet, sbn={} esi={} k={}",
                    self.cur_sbn, esi, source_len
                );
                self.stats.malformed += 1;
                continue;
            }
            if self.source_block[esi].is_none() {
                self.source_block[esi] = Some(packet);
            }
        }
    }

    fn fill_repair(&mut self) {
        while let Some(packet) = self.next_repair() {
            let Some(fec) = packet.fec() else {
                self.stats.malformed += 1;
                continue;
            };

            let diff = blknum_diff(fec.source_block_number, self.cur_sbn);
            if diff < 0 {
                trace!(
                    "fec reader: dropping late repair packet, sbn={} cur={}",
                    fec.source_block_number,
                    self.cur_sbn
                );
                self.stats.late_repair += 1;
                continue;
            }
            if diff > 0 {
                self.pending_repair = Some(packet);
                return;
            }

            let source_len = fec.source_block_length as usize;
            let block_len = fec.block_length as usize;
            let esi = fec.encoding_symbol_id as usize;
            if !self.update_layout(source_len, block_len) || esi < source_len || esi >= block_len {
                warn!(
                    "fec reader: dropping malformed repair packet, sbn={} esi={} k={} n={}",
                    self.cur_sbn, esi, source_len, block_len
                );
                self.stats.malformed += 1;
                continue;
            }
            let slot = esi - source_len;
            if self.repair_block[slot].is_none() {
                self.repair_block[slot] = Some(packet);
            }
        }
    }

    fn try_repair(&mut self) -> bool {
        if self.repair_attempted || self.repair_block.is_empty() {
            return false;
        }
        let source_len = self.source_block.len();
        let received = self.source_block.iter().flatten().count()
            + self.repair_block.iter().flatten().count();
        if received < source_len {
            return false;
        }
        self.repair_attempted = true;

        let layout = BlockLayout::new(source_len, self.repair_block.len());
        if self.restored.len() < source_len {
            self.restored.resize_with(source_len, Vec::new);
        }

        let symbols: Vec<Option<&[u8]>> = self
            .source_block
            .iter()
            .chain(self.repair_block.iter())
            .map(|slot| slot.as_ref().and_then(|p| p.fec()).map(|f| f.payload.as_ref()))
            .collect();
        let result = self
            .decoder
            .decode(layout, &symbols, &mut self.restored[..source_len]);
        drop(symbols);

        if let Err(e) = result {
            warn!("fec reader: can't repair block sbn={}: {}", self.cur_sbn, e);
            return false;
        }

        let mut repaired = 0;
        for index in self.next_index..source_len {
            if self.source_block[index].is_some() {
                continue;
            }
            if let Some(packet) = self.restore_packet(index, layout) {
                self.source_block[index] = Some(packet);
                repaired += 1;
            }
        }
        self.stats.packets_restored += repaired;
        debug!(
            "fec reader: repaired block sbn={}, restored {} packets",
            self.cur_sbn, repaired
        );
        repaired > 0
    }

    fn restore_packet(&mut self, index: usize, layout: BlockLayout) -> Option<PacketPtr> {
        self.arena.extend_from_slice(&self.restored[index]);
        let data = self.arena.split().freeze();

        match self.parser.parse(data.clone()) {
            Ok(packet) => Some(
                packet
                    .with_flags(PacketFlags::RESTORED)
                    .with_fec(Fec {
                        source_block_number: self.cur_sbn,
                        encoding_symbol_id: index as u16,
                        source_block_length: layout.source_len as u16,
                        block_length: layout.block_len() as u16,
                        payload: data,
                    })
                    .into_ptr(),
            ),
            Err(e) => {
                warn!(
                    "fec reader: restored packet is not valid RTP, sbn={} esi={}: {}",
                    self.cur_sbn, index, e
                );
                None
            }
        }
    }
}

impl<S: PacketReader, R: PacketReader> PacketReader for FecReader<S, R> {
    fn read(&mut self) -> Option<PacketPtr> {
        loop {
            match self.read_next() {
                FecRead::Packet(packet) => return Some(packet),
                FecRead::Lost { .. } => continue,
                FecRead::Nothing => return None,
            }
        }
    }
}
